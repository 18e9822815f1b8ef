use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use voice_core::PipelineError;

/// Errors surfaced to the demo user. The first four are the recoverable
/// request errors; engine failures map to 500 for the current request only.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Please accept the Terms & Condition!")]
    ConsentRequired,

    #[error("Please give a longer prompt text")]
    PromptTooShort,

    #[error("Text length limited to 200 characters for this demo, please try shorter text")]
    PromptTooLong,

    #[error("Get target tone color error: {0}")]
    EmbeddingExtraction(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Synthesis error: {0}")]
    Engine(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Extraction(msg) => ApiError::EmbeddingExtraction(msg),
            PipelineError::Engine(e) => ApiError::Engine(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::ConsentRequired
            | ApiError::PromptTooShort
            | ApiError::PromptTooLong
            | ApiError::EmbeddingExtraction(_)
            | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(e) => {
                tracing::error!("engine error: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });
        (status, body).into_response()
    }
}
