/// Failures surfaced by the verdict pipeline, the ledger and the news listing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("fact-check oracle call failed: {0}")]
    RemoteOracle(String),

    /// Malformed oracle response. Handled like `RemoteOracle` by callers.
    #[error("fact-check oracle returned a malformed verdict: {0}")]
    Validation(String),

    #[error("article not found: {0}")]
    NotFound(String),

    #[error("caller {caller} is not the author of article {article_id}")]
    Unauthorized { article_id: String, caller: String },

    #[error("invalid article: {0}")]
    InvalidArticle(String),

    #[error("news listing upstream failed: {0}")]
    Upstream(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl PipelineError {
    /// Safe to re-issue `verify`: the article is still Pending.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::RemoteOracle(_) | PipelineError::Validation(_)
        )
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
