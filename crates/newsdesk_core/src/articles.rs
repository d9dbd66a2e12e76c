use crate::db::Store;
use crate::error::{PipelineError, Result};
use crate::schema::{Article, NewArticle, Verdict};
use anyhow::Context;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::info;

/// UTC, millisecond precision, so stored timestamps sort lexicographically.
pub fn timestamp_now() -> anyhow::Result<String> {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    OffsetDateTime::now_utc()
        .format(&format)
        .context("failed to format timestamp")
}

/// Stores a new local article. Verdicts always start Pending.
pub fn publish(store: &Store, author: &str, draft: NewArticle) -> Result<Article> {
    if author.trim().is_empty() {
        return Err(PipelineError::InvalidArticle(
            "author identity is required".to_string(),
        ));
    }
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(PipelineError::InvalidArticle("title is required".to_string()));
    }
    if draft.body.trim().is_empty() {
        return Err(PipelineError::InvalidArticle("content is required".to_string()));
    }

    let article = Article {
        id: uuid::Uuid::new_v4().to_string(),
        title: title.to_string(),
        body: draft.body,
        location: draft.location.filter(|value| !value.trim().is_empty()),
        author: author.to_string(),
        created_at: timestamp_now()?,
        verdict: Verdict::Pending,
    };
    store.insert_article(&article)?;
    info!(article_id = %article.id, author, "article published");
    Ok(article)
}

/// Only the author may delete an article.
pub fn delete(store: &Store, article_id: &str, caller: &str) -> Result<()> {
    let article = store
        .article(article_id)?
        .ok_or_else(|| PipelineError::NotFound(article_id.to_string()))?;
    if article.author != caller {
        return Err(PipelineError::Unauthorized {
            article_id: article_id.to_string(),
            caller: caller.to_string(),
        });
    }
    if !store.delete_article(article_id)? {
        return Err(PipelineError::NotFound(article_id.to_string()));
    }
    info!(article_id, "article deleted");
    Ok(())
}
