use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chess_core::PgnError;
use serde_json::json;

use crate::stockfish::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Unable to fetch game data: {0}")]
    Fetch(String),

    #[error("Failed to parse PGN data: {0}")]
    Parse(#[from] PgnError),

    #[error("{0}")]
    Launch(String),

    #[error("Engine analysis failed: {0}")]
    Engine(String),

    #[error("Unexpected error during analysis: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        if e.is_launch() {
            AppError::Launch(e.to_string())
        } else {
            AppError::Engine(e.to_string())
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Fetch(_) | AppError::Parse(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Launch(_) | AppError::Engine(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        // Engine failures answer with {"error"}, everything else with {"message"}
        let body = match &self {
            AppError::Validation(_) | AppError::Fetch(_) | AppError::Parse(_) => {
                tracing::warn!("Rejected request: {message}");
                json!({ "message": message })
            }
            AppError::Launch(_) | AppError::Engine(_) => {
                tracing::error!("Engine error: {message}");
                json!({ "error": message })
            }
            AppError::Unexpected(e) => {
                tracing::error!("Unexpected error: {e:?}");
                json!({ "message": message })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Turns a panic inside a handler into an `Unexpected` response.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    AppError::Unexpected(anyhow::anyhow!(detail)).into_response()
}
