use crate::config::NewsConfig;
use crate::db::Store;
use crate::error::{PipelineError, Result};
use crate::schema::{Article, ExternalArticle, NewsItem, SourceName, Verdict};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Characters of body text kept in a local item's description.
pub const PREVIEW_CHARS: usize = 200;

/// National and city listings are always requested in English; `lang`
/// only applies to the international feed.
const DOMESTIC_LANG: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewsFilter {
    #[default]
    International,
    National,
    Local,
    City,
}

impl NewsFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "international" => Some(NewsFilter::International),
            "national" => Some(NewsFilter::National),
            "local" => Some(NewsFilter::Local),
            "city" => Some(NewsFilter::City),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub filter: NewsFilter,
    pub lang: String,
    pub category: String,
    pub city: Option<String>,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            filter: NewsFilter::International,
            lang: "en".to_string(),
            category: "general".to_string(),
            city: None,
        }
    }
}

impl ListingQuery {
    /// Unknown or missing values fall back to the defaults.
    pub fn from_params(
        filter: Option<&str>,
        lang: Option<&str>,
        category: Option<&str>,
        city: Option<&str>,
    ) -> Self {
        let defaults = Self::default();
        let present = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            filter: filter.and_then(NewsFilter::parse).unwrap_or_default(),
            lang: present(lang).unwrap_or(defaults.lang),
            category: present(category).unwrap_or(defaults.category),
            city: present(city),
        }
    }

    fn topic(&self) -> &str {
        if self.category == "top" {
            "general"
        } else {
            &self.category
        }
    }
}

pub fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn has_title(title: &str) -> bool {
    !title.trim().is_empty()
}

pub fn local_item(article: &Article) -> NewsItem {
    NewsItem {
        id: Some(article.id.clone()),
        author_id: Some(article.author.clone()),
        is_local: true,
        title: article.title.clone(),
        description: preview(&article.body),
        url: None,
        url_to_image: None,
        source: SourceName {
            name: article.author.clone(),
        },
        published_at: Some(article.created_at.clone()),
        verdict: article.verdict.clone(),
    }
}

/// `None` for items without a usable title.
pub fn external_item(article: ExternalArticle) -> Option<NewsItem> {
    let title = article.title.filter(|t| has_title(t))?;
    Some(NewsItem {
        id: None,
        author_id: None,
        is_local: false,
        title,
        description: article.description.unwrap_or_default(),
        url: article.url,
        url_to_image: article.image,
        source: article.source.unwrap_or_else(|| SourceName {
            name: "Unknown".to_string(),
        }),
        published_at: article.published_at,
        verdict: Verdict::Pending,
    })
}

/// Local articles in the order given (newest first from the store).
pub fn local_items(articles: &[Article]) -> Vec<NewsItem> {
    articles
        .iter()
        .filter(|article| has_title(&article.title))
        .map(local_item)
        .collect()
}

pub fn external_items(articles: Vec<ExternalArticle>) -> Vec<NewsItem> {
    articles.into_iter().filter_map(external_item).collect()
}

/// Third-party listing source.
#[async_trait]
pub trait NewsListing: Send + Sync {
    async fn fetch(&self, query: &ListingQuery) -> Result<Vec<ExternalArticle>>;
}

#[derive(Debug, Deserialize)]
struct GNewsResponse {
    #[serde(default)]
    articles: Vec<ExternalArticle>,
}

pub struct GNewsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    country: String,
}

impl GNewsClient {
    pub fn new(config: &NewsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PipelineError::Configuration(format!("news http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            country: config.country.clone(),
        })
    }

    pub fn listing_url(&self, api_key: &str, query: &ListingQuery) -> Result<Url> {
        let city = query.city.as_deref().filter(|_| query.filter == NewsFilter::City);
        let (path, params): (&str, Vec<(&str, &str)>) = match (query.filter, city) {
            (NewsFilter::National, _) => (
                "top-headlines",
                vec![
                    ("apikey", api_key),
                    ("lang", DOMESTIC_LANG),
                    ("country", self.country.as_str()),
                    ("topic", query.topic()),
                ],
            ),
            (NewsFilter::City, Some(city)) => (
                "search",
                vec![
                    ("q", city),
                    ("country", self.country.as_str()),
                    ("lang", DOMESTIC_LANG),
                    ("apikey", api_key),
                ],
            ),
            _ => (
                "top-headlines",
                vec![
                    ("apikey", api_key),
                    ("lang", query.lang.as_str()),
                    ("topic", query.topic()),
                ],
            ),
        };
        Url::parse_with_params(&format!("{}/{path}", self.base_url), &params)
            .map_err(|e| PipelineError::Configuration(format!("invalid news base url: {e}")))
    }
}

#[async_trait]
impl NewsListing for GNewsClient {
    async fn fetch(&self, query: &ListingQuery) -> Result<Vec<ExternalArticle>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            PipelineError::Configuration("news listing API key is not configured".to_string())
        })?;
        let url = self.listing_url(api_key, query)?;
        debug!(filter = ?query.filter, "fetching external news listing");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Upstream(e.without_url().to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Upstream(format!(
                "listing responded with HTTP {status}"
            )));
        }
        let body: GNewsResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Upstream(format!("unreadable listing: {e}")))?;
        Ok(body.articles)
    }
}

/// Builds unified listings from stored articles and the upstream source.
/// Read-only with respect to verdicts.
pub struct NewsDesk {
    store: Store,
    upstream: Arc<dyn NewsListing>,
}

impl NewsDesk {
    pub fn new(store: Store, upstream: Arc<dyn NewsListing>) -> Self {
        Self { store, upstream }
    }

    pub async fn listing(&self, query: &ListingQuery) -> Result<Vec<NewsItem>> {
        match query.filter {
            NewsFilter::Local => {
                let articles = self.store.run(|store| store.articles()).await?;
                Ok(local_items(&articles))
            }
            _ => Ok(external_items(self.upstream.fetch(query).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::articles;
    use crate::schema::NewArticle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client() -> GNewsClient {
        GNewsClient::new(&NewsConfig::default()).unwrap()
    }

    fn external(title: Option<&str>) -> ExternalArticle {
        ExternalArticle {
            title: title.map(str::to_string),
            description: Some("desc".to_string()),
            url: Some("https://example.org/story".to_string()),
            image: None,
            published_at: Some("2024-03-01T10:00:00Z".to_string()),
            source: Some(SourceName {
                name: "Example Times".to_string(),
            }),
        }
    }

    #[test]
    fn preview_truncates_with_marker_only_when_needed() {
        let short = "a".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&short), short);

        let long = "é".repeat(PREVIEW_CHARS + 1);
        let cut = preview(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn untitled_external_items_are_dropped() {
        let items = external_items(vec![
            external(Some("Kept")),
            external(Some("   ")),
            external(None),
        ]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Kept");
        assert!(!items[0].is_local);
        assert_eq!(items[0].verdict, Verdict::Pending);
    }

    #[test]
    fn query_params_fall_back_to_defaults() {
        let query = ListingQuery::from_params(Some("bogus"), None, Some(" "), Some(""));
        assert_eq!(query, ListingQuery::default());

        let query = ListingQuery::from_params(Some("City"), Some("hi"), Some("top"), Some("Pune"));
        assert_eq!(query.filter, NewsFilter::City);
        assert_eq!(query.topic(), "general");
        assert_eq!(query.city.as_deref(), Some("Pune"));
    }

    #[test]
    fn listing_urls_follow_filter() {
        let client = client();

        let national = ListingQuery {
            filter: NewsFilter::National,
            category: "sports".to_string(),
            ..ListingQuery::default()
        };
        let url = client.listing_url("k", &national).unwrap();
        assert_eq!(url.path(), "/api/v4/top-headlines");
        assert!(url.query().unwrap().contains("country=in"));
        assert!(url.query().unwrap().contains("topic=sports"));

        let city = ListingQuery::from_params(Some("city"), None, None, Some("New Delhi"));
        let url = client.listing_url("k", &city).unwrap();
        assert_eq!(url.path(), "/api/v4/search");
        assert!(url.query().unwrap().contains("q=New+Delhi"));
        assert!(url.query().unwrap().contains("lang=en"));

        let city_without_name = ListingQuery::from_params(Some("city"), None, None, None);
        let url = client.listing_url("k", &city_without_name).unwrap();
        assert_eq!(url.path(), "/api/v4/top-headlines");
        assert!(!url.query().unwrap().contains("country="));
    }

    #[test]
    fn only_international_listing_honours_lang() {
        let client = client();
        let lang_of = |filter: &str| {
            let query = ListingQuery::from_params(Some(filter), Some("hi"), None, Some("Pune"));
            let url = client.listing_url("k", &query).unwrap();
            url.query_pairs()
                .find(|(key, _)| key == "lang")
                .map(|(_, value)| value.into_owned())
        };
        assert_eq!(lang_of("international").as_deref(), Some("hi"));
        assert_eq!(lang_of("national").as_deref(), Some("en"));
        assert_eq!(lang_of("city").as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn missing_api_key_is_a_configuration_error() {
        let err = client().fetch(&ListingQuery::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    struct CountingUpstream {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NewsListing for CountingUpstream {
        async fn fetch(&self, _query: &ListingQuery) -> Result<Vec<ExternalArticle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![external(Some("Wire story")), external(Some(""))])
        }
    }

    #[tokio::test]
    async fn local_filter_reads_store_and_skips_upstream() {
        let store = Store::open_in_memory().unwrap();
        let body = "x".repeat(250);
        articles::publish(
            &store,
            "alice@example.com",
            NewArticle {
                title: "Local story".to_string(),
                body,
                location: None,
            },
        )
        .unwrap();

        let upstream = Arc::new(CountingUpstream {
            calls: AtomicUsize::new(0),
        });
        let desk = NewsDesk::new(store, upstream.clone());

        let local = ListingQuery::from_params(Some("local"), None, None, None);
        let items = desk.listing(&local).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_local);
        assert_eq!(items[0].author_id.as_deref(), Some("alice@example.com"));
        assert_eq!(items[0].source.name, "alice@example.com");
        assert!(items[0].description.ends_with("..."));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);

        let items = desk.listing(&ListingQuery::default()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Wire story");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }
}
