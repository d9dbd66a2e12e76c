use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use newsdesk_core::PipelineError;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    MissingCredential,
    InvalidCredential,
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Pipeline(PipelineError::Storage(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCredential | ApiError::InvalidCredential => StatusCode::UNAUTHORIZED,
            ApiError::Pipeline(err) => match err {
                PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
                PipelineError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                PipelineError::InvalidArticle(_) => StatusCode::BAD_REQUEST,
                PipelineError::Configuration(_)
                | PipelineError::RemoteOracle(_)
                | PipelineError::Validation(_)
                | PipelineError::Upstream(_)
                | PipelineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Client-facing text. Server-side failures stay generic; the detail
    /// goes to the log.
    pub fn message(&self) -> String {
        match self {
            ApiError::MissingCredential => "No token, authorization denied.".to_string(),
            ApiError::InvalidCredential => "Token is not valid.".to_string(),
            ApiError::Pipeline(err) => match err {
                PipelineError::NotFound(_) => "Article not found.".to_string(),
                PipelineError::Unauthorized { .. } => "User not authorized.".to_string(),
                PipelineError::InvalidArticle(reason) => reason.clone(),
                PipelineError::RemoteOracle(_) | PipelineError::Validation(_) => {
                    "Server error during verification.".to_string()
                }
                PipelineError::Upstream(_) => "Failed to fetch data.".to_string(),
                PipelineError::Configuration(_) | PipelineError::Storage(_) => {
                    "Server error.".to_string()
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            if let ApiError::Pipeline(err) = &self {
                error!(error = %err, retryable = err.is_retryable(), "request failed");
            }
        }
        (status, Json(json!({ "message": self.message() }))).into_response()
    }
}
