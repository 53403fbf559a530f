use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

// Startup configuration problems. All of these abort the process.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_requests must be greater than zero")]
    ZeroMaxRequests,

    #[error("window must be greater than zero")]
    ZeroWindow,

    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("malformed limit override '{0}', expected name=max/window_ms")]
    MalformedOverride(String),

    #[error("cleanup probability {0} is outside [0, 1]")]
    InvalidProbability(f64),
}

// Errors surfaced by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limited, retry in {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        message: String,
    },
}

// Malformed or incomplete bodies get the same error shape as everything else
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

// Retry-After is whole seconds; round up so clients never retry early
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX);
    ms.div_ceil(1000).max(1)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::UnknownPreset(name) => error_body(
                StatusCode::NOT_FOUND,
                "UNKNOWN_PRESET",
                format!("preset '{}' is not configured", name),
            ),
            ApiError::InvalidRequest(msg) => {
                error_body(StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg)
            }
            ApiError::RateLimited {
                retry_after,
                message,
            } => {
                let body = Json(json!({
                    "error": {
                        "code": "RATE_LIMITED",
                        "message": message,
                        "resetIn": u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                    }
                }));
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after_secs(retry_after).to_string())],
                    body,
                )
                    .into_response()
            }
        }
    }
}

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    let body = Json(json!({
        "error": {
            "code": code,
            "message": message,
        }
    }));
    (status, body).into_response()
}
