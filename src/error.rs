//! # API Errors
//!
//! Error taxonomy shared by every HTTP handler. Each variant maps to a status
//! code and is rendered as `{ "error": ..., "response": ... }` so the chat UI
//! can always show the `response` text to the user.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

/// Fixed apology returned to the user whenever a request fails unexpectedly.
pub const APOLOGY: &str =
    "Desculpe, ocorreu um erro ao processar sua solicitação. Tente novamente em alguns instantes.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, response) = match &self {
            ApiError::Unauthorized(msg) => (msg.clone(), "Não autorizado.".to_string()),
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => (msg.clone(), msg.clone()),
            ApiError::Unavailable(msg) => (msg.clone(), APOLOGY.to_string()),
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                (err.to_string(), APOLOGY.to_string())
            }
        };

        (status, Json(json!({ "error": error, "response": response }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
