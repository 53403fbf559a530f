mod health;
mod limits;
mod metrics;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::state::AppState;

pub use health::health_handler;
pub use limits::{consume_handler, list_presets_handler, reset_handler};
pub use metrics::metrics_handler;

// Every route the service exposes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/limits", get(list_presets_handler))
        .route("/api/limits/{preset}/consume", post(consume_handler))
        .route("/api/limits/{preset}/reset", post(reset_handler))
        .with_state(state)
}
