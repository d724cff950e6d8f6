use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures talking to the hosted identity provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Identity provider is not configured")]
    NotConfigured,
    #[error("Identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Identity provider returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Identity provider returned an invalid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Identity provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Authentication failed")]
    AuthError,
    #[error("Not found")]
    NotFound,
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Provider(e) => {
                tracing::error!(error = %e, "Identity provider error");
                (StatusCode::BAD_GATEWAY, "Authentication service unavailable".to_string())
            }
            Self::AuthError => {
                tracing::debug!("Authentication failed");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            Self::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            Self::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, msg)
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
