pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod keys;
pub mod metrics;
pub mod models;
pub mod presets;
pub mod rate_limit;
pub mod state;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ApiError, ConfigError};
pub use keys::{limit_key, raw_key};
pub use presets::{Preset, PresetTable};
pub use rate_limit::{CleanupPolicy, Decision, RateLimitConfig, RateLimiter};
