use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::keys::{limit_key, raw_key};
use crate::metrics::{REGISTRY_SIZE, REQUEST_LATENCY, REQUEST_TOTAL, record_decision};
use crate::models::{ConsumeRequest, DecisionResponse};
use crate::presets::{Preset, PresetView};
use crate::state::AppState;

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

fn resolve(name: &str) -> Result<Preset, ApiError> {
    name.parse()
        .map_err(|_| ApiError::UnknownPreset(name.to_string()))
}

fn key_for(preset: Preset, req: &ConsumeRequest) -> Result<String, ApiError> {
    let subject = req.subject.trim();
    if subject.is_empty() {
        return Err(ApiError::InvalidRequest("subject must not be empty".to_string()));
    }
    Ok(if req.hashed {
        limit_key(preset.scope(), subject)
    } else {
        raw_key(preset.scope(), subject)
    })
}

pub async fn list_presets_handler(State(state): State<Arc<AppState>>) -> Json<Vec<PresetView>> {
    Json(state.presets.views())
}

// Consume one request from the subject's window, 429 once it is used up
pub async fn consume_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<ConsumeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let preset = resolve(&name)?;
    let Json(payload) = payload?;
    let key = key_for(preset, &payload)?;
    let config = state.presets.get(preset);

    let decision = state.limiter.check_and_consume(&key, &config);

    record_decision(preset.name(), decision.success);
    REGISTRY_SIZE.set(state.limiter.len() as i64);
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    if !decision.success {
        warn!(
            preset = %preset,
            reset_in_ms = decision.reset_in_ms(),
            "request throttled"
        );
        return Err(ApiError::RateLimited {
            retry_after: decision.reset_in,
            message: payload.language.denial_message(preset).to_string(),
        });
    }

    debug!(preset = %preset, remaining = decision.remaining, "request allowed");

    let headers = [
        (LIMIT_HEADER, HeaderValue::from(config.max_requests())),
        (REMAINING_HEADER, HeaderValue::from(decision.remaining)),
        (RESET_HEADER, HeaderValue::from(decision.reset_in_ms())),
    ];
    Ok((headers, Json(DecisionResponse::from(decision))).into_response())
}

// Drop the subject's window, e.g. once a magic link has been redeemed
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<ConsumeRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    REQUEST_TOTAL.inc();

    let preset = resolve(&name)?;
    let Json(payload) = payload?;
    let key = key_for(preset, &payload)?;

    if state.limiter.reset(&key) {
        debug!(preset = %preset, "rate limit window reset");
    }
    REGISTRY_SIZE.set(state.limiter.len() as i64);
    Ok(StatusCode::NO_CONTENT)
}
