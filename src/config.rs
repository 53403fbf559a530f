use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::error::ConfigError;
use crate::presets::PresetTable;
use crate::rate_limit::CleanupPolicy;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "parish-throttle")]
#[command(about = "In-memory request throttle for the parish application")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Chance that a request also sweeps expired entries (0 disables)
    #[arg(long, default_value_t = 0.01)]
    pub cleanup_probability: f64,

    // Background sweep interval in seconds (0 disables)
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    // Preset override, repeatable
    // Example: --limit chat=40/60000 --limit magic-link=5/900000
    #[arg(long = "limit", value_name = "NAME=MAX/WINDOW_MS")]
    pub limits: Vec<String>,

    // Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

// Validated runtime settings derived from `Args`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub cleanup: CleanupPolicy,
    pub sweep_interval: Option<Duration>,
    pub presets: PresetTable,
    pub log_format: LogFormat,
}

impl Args {
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let cleanup = if self.cleanup_probability == 0.0 {
            CleanupPolicy::Disabled
        } else {
            CleanupPolicy::probabilistic(self.cleanup_probability)?
        };

        let sweep_interval =
            (self.sweep_interval > 0).then(|| Duration::from_secs(self.sweep_interval));

        let presets = PresetTable::new().with_overrides(&self.limits)?;

        Ok(Settings {
            port: self.port,
            cleanup,
            sweep_interval,
            presets,
            log_format: self.log_format,
        })
    }
}
