use std::sync::Arc;

use crate::config::Settings;
use crate::presets::PresetTable;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub limiter: Arc<RateLimiter>, // shared with the sweeper task
    pub presets: PresetTable,
}

impl AppState {
    pub fn new(limiter: Arc<RateLimiter>, presets: PresetTable) -> Self {
        Self { limiter, presets }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(RateLimiter::new(settings.cleanup)),
            settings.presets.clone(),
        )
    }
}
