use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::rate_limit::RateLimiter;

// Periodic cleanup of expired windows - runs for the life of the process
pub async fn run_sweeper(limiter: Arc<RateLimiter>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval = ?every, "rate limit sweeper started");

    loop {
        ticker.tick().await;

        let removed = limiter.sweep_expired();
        if removed > 0 {
            debug!(removed, live = limiter.len(), "sweeper pass");
        }
    }
}
