use crate::config::OracleConfig;
use crate::error::{PipelineError, Result};
use crate::schema::{Assessment, Rating, Report};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleMode {
    Live,
    StandIn,
}

impl fmt::Display for OracleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            OracleMode::Live => "live",
            OracleMode::StandIn => "stand-in",
        };
        write!(f, "{value}")
    }
}

/// External fact-checking service. Stateless request/response.
#[async_trait]
pub trait FactChecker: Send + Sync {
    fn mode(&self) -> OracleMode;

    async fn check(&self, title: &str, body: &str) -> Result<Assessment>;
}

/// Builds the checker selected by `config.stand_in`.
pub fn from_config(config: &OracleConfig) -> Result<Arc<dyn FactChecker>> {
    if config.stand_in {
        return Ok(Arc::new(StandInOracle::new(Duration::from_millis(
            config.stand_in_delay_ms,
        ))));
    }
    if config.api_key.is_none() {
        warn!("no oracle credential configured; live verification requests will fail");
    }
    Ok(Arc::new(GeminiOracle::new(config)?))
}

fn validate_input(title: &str, body: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(PipelineError::InvalidArticle(
            "title must not be empty".to_string(),
        ));
    }
    if body.trim().is_empty() {
        return Err(PipelineError::InvalidArticle(
            "body must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub const STAND_IN_EXPLANATION: &str = "This article appears to be well-sourced and aligns with \
     reports from major independent news outlets. (Stand-in verdict.)";

/// Deterministic checker for offline use: always `Reliable` with two canned
/// reports, after a fixed delay.
pub struct StandInOracle {
    delay: Duration,
}

impl StandInOracle {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn canned() -> Assessment {
        Assessment::new(
            Rating::Reliable,
            STAND_IN_EXPLANATION,
            vec![
                Report {
                    title: "Stand-in Report 1: Similar Story".to_string(),
                    url: "#".to_string(),
                    source: "Stand-in Wire".to_string(),
                },
                Report {
                    title: "Stand-in Report 2: Corroboration".to_string(),
                    url: "#".to_string(),
                    source: "Stand-in Media".to_string(),
                },
            ],
        )
    }
}

#[async_trait]
impl FactChecker for StandInOracle {
    fn mode(&self) -> OracleMode {
        OracleMode::StandIn
    }

    async fn check(&self, title: &str, body: &str) -> Result<Assessment> {
        validate_input(title, body)?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Self::canned())
    }
}

const SYSTEM_PROMPT: &str = "You are a news fact-checker. Analyze the article you are given.\n\
1. Classify it as \"Reliable\", \"Unreliable\" or \"Misleading\".\n\
2. Explain the classification in one concise sentence.\n\
3. Only when the article is \"Reliable\", list 2-3 articles from other outlets that corroborate the main story.\n\
Answer with JSON matching the response schema.";

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "status": { "type": "STRING", "enum": ["Reliable", "Unreliable", "Misleading"] },
            "explanation": { "type": "STRING" },
            "reports": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "url": { "type": "STRING" },
                        "source": { "type": "STRING" }
                    },
                    "required": ["title", "url", "source"]
                }
            }
        },
        "required": ["status", "explanation"]
    })
}

/// Live checker backed by the Gemini `generateContent` endpoint.
pub struct GeminiOracle {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| PipelineError::Configuration(format!("oracle http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
        })
    }

    fn request_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn payload(title: &str, body: &str) -> Value {
        let query = format!("Article Title: \"{title}\"\nArticle Content: \"{body}\"");
        json!({
            "contents": [{ "parts": [{ "text": query }] }],
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "tools": [{ "google_search": {} }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema()
            }
        })
    }
}

#[async_trait]
impl FactChecker for GeminiOracle {
    fn mode(&self) -> OracleMode {
        OracleMode::Live
    }

    async fn check(&self, title: &str, body: &str) -> Result<Assessment> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            PipelineError::Configuration("no credential configured for the fact-check oracle".to_string())
        })?;
        validate_input(title, body)?;

        debug!(model = %self.model, "calling fact-check oracle");
        let response = self
            .http
            .post(self.request_url())
            .query(&[("key", api_key)])
            .json(&Self::payload(title, body))
            .send()
            .await
            .map_err(|e| PipelineError::RemoteOracle(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(300).collect();
            return Err(PipelineError::RemoteOracle(format!(
                "oracle responded with HTTP {status}: {snippet}"
            )));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Validation(format!("response is not JSON: {e}")))?;
        parse_generate_content(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OracleVerdict {
    status: Option<String>,
    explanation: Option<String>,
    #[serde(default)]
    reports: Vec<OracleReport>,
}

#[derive(Debug, Deserialize)]
struct OracleReport {
    title: Option<String>,
    url: Option<String>,
    source: Option<String>,
}

fn parse_rating(raw: &str) -> Result<Rating> {
    match raw.trim() {
        "Reliable" => Ok(Rating::Reliable),
        "Unreliable" => Ok(Rating::Unreliable),
        "Misleading" => Ok(Rating::Misleading),
        other => Err(PipelineError::Validation(format!(
            "unknown verdict status {other:?}"
        ))),
    }
}

/// Extracts the verdict JSON carried in the first candidate's first part.
pub fn parse_generate_content(raw: &Value) -> Result<Assessment> {
    let response: GenerateContentResponse = serde_json::from_value(raw.clone())
        .map_err(|e| PipelineError::Validation(format!("unexpected response shape: {e}")))?;
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or_else(|| PipelineError::Validation("response carries no candidate text".to_string()))?;

    let verdict: OracleVerdict = serde_json::from_str(&text)
        .map_err(|e| PipelineError::Validation(format!("candidate text is not a verdict: {e}")))?;

    let status = verdict
        .status
        .ok_or_else(|| PipelineError::Validation("verdict is missing status".to_string()))?;
    let rating = parse_rating(&status)?;
    let explanation = verdict
        .explanation
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| PipelineError::Validation("verdict is missing explanation".to_string()))?;

    let mut reports = Vec::with_capacity(verdict.reports.len());
    for (index, report) in verdict.reports.into_iter().enumerate() {
        match (report.title, report.url, report.source) {
            (Some(title), Some(url), Some(source)) => reports.push(Report { title, url, source }),
            _ => {
                return Err(PipelineError::Validation(format!(
                    "report {index} is missing title, url or source"
                )));
            }
        }
    }

    Ok(Assessment::new(rating, explanation, reports))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    #[test]
    fn parses_reliable_verdict_with_reports() {
        let raw = wrap(
            r#"{"status":"Reliable","explanation":"Widely reported.","reports":[
                {"title":"A","url":"https://a.example","source":"A News"},
                {"title":"B","url":"https://b.example","source":"B News"}]}"#,
        );
        let assessment = parse_generate_content(&raw).unwrap();
        assert_eq!(assessment.rating, Rating::Reliable);
        assert_eq!(assessment.explanation, "Widely reported.");
        assert_eq!(assessment.reports.len(), 2);
    }

    #[test]
    fn reports_are_dropped_for_misleading_verdicts() {
        let raw = wrap(
            r#"{"status":"Misleading","explanation":"Out of context.","reports":[
                {"title":"A","url":"https://a.example","source":"A News"}]}"#,
        );
        let assessment = parse_generate_content(&raw).unwrap();
        assert_eq!(assessment.rating, Rating::Misleading);
        assert!(assessment.reports.is_empty());
    }

    #[test]
    fn malformed_responses_are_validation_errors() {
        let cases = [
            json!({ "candidates": [] }),
            wrap("not json at all"),
            wrap(r#"{"status":"Probably","explanation":"?"}"#),
            wrap(r#"{"status":"Reliable"}"#),
            wrap(r#"{"status":"Reliable","explanation":"ok","reports":[{"title":"A"}]}"#),
        ];
        for raw in cases {
            let err = parse_generate_content(&raw).unwrap_err();
            assert!(matches!(err, PipelineError::Validation(_)), "{raw}: {err}");
            assert!(err.is_retryable());
        }
    }

    #[tokio::test]
    async fn stand_in_is_deterministic() {
        let oracle = StandInOracle::new(Duration::ZERO);
        let first = oracle.check("T", "B").await.unwrap();
        let second = oracle.check("Other", "Text").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.rating, Rating::Reliable);
        assert_eq!(first.reports.len(), 2);
    }

    #[tokio::test]
    async fn stand_in_waits_for_its_delay() {
        let oracle = StandInOracle::new(Duration::from_millis(50));
        let started = std::time::Instant::now();
        oracle.check("T", "B").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn live_oracle_without_credential_is_a_configuration_error() {
        let oracle = GeminiOracle::new(&OracleConfig::default()).unwrap();
        let err = oracle.check("T", "B").await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let oracle = StandInOracle::new(Duration::ZERO);
        let err = oracle.check("", "B").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArticle(_)));
    }

    #[test]
    fn stand_in_flag_selects_checker() {
        let config = OracleConfig {
            stand_in: true,
            ..OracleConfig::default()
        };
        assert_eq!(from_config(&config).unwrap().mode(), OracleMode::StandIn);
        assert_eq!(
            from_config(&OracleConfig::default()).unwrap().mode(),
            OracleMode::Live
        );
    }
}
