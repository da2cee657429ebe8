use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::occupancy::OccupancyError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Settings error: {0}")]
    Config(#[from] config::ConfigError),

    /// A backend, context or provider is wired up incorrectly
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Occupancy cache error: {0}")]
    Occupancy(#[from] OccupancyError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) | AppError::Configuration(_) => "configuration",
            AppError::Auth(_) => "auth",
            AppError::Validation(_) => "validation",
            AppError::Transport(_) => "transport",
            AppError::Occupancy(_) => "occupancy",
            AppError::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

fn redacted(detail: String, generic: &str) -> String {
    if is_production() {
        generic.to_string()
    } else {
        detail
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let log_message = self.to_string();
        let (status, code, client_message) = match &self {
            AppError::Config(_) | AppError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                redacted(log_message.clone(), "Configuration error"),
            ),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Transport(_) => (
                StatusCode::BAD_GATEWAY,
                "TRANSPORT_ERROR",
                redacted(log_message.clone(), "Delivery service unavailable"),
            ),
            AppError::Occupancy(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "OCCUPANCY_ERROR",
                redacted(log_message.clone(), "Service temporarily unavailable"),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                redacted(log_message.clone(), "Internal server error"),
            ),
        };

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
