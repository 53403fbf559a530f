use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    // Passwordless login link requests, per e-mail
    MagicLink,
    // Parishioner portal chat messages, per person
    Chat,
    // Staff assistant chat messages, per staff user; follows Chat unless overridden
    StaffChat,
    // Notification feed polling, per user
    Notifications,
    // Calendar data fetches, per user
    Calendar,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::MagicLink,
        Preset::Chat,
        Preset::StaffChat,
        Preset::Notifications,
        Preset::Calendar,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::MagicLink => "magicLink",
            Preset::Chat => "chat",
            Preset::StaffChat => "staffChat",
            Preset::Notifications => "notifications",
            Preset::Calendar => "calendar",
        }
    }

    // Prefix for registry keys guarded by this preset
    pub fn scope(&self) -> &'static str {
        match self {
            Preset::MagicLink => "magiclink",
            Preset::Chat => "chat",
            Preset::StaffChat => "staff-chat",
            Preset::Notifications => "notifications",
            Preset::Calendar => "calendar",
        }
    }

    // Preset whose effective limit this one uses when not overridden itself
    pub fn inherits(&self) -> Option<Preset> {
        match self {
            Preset::StaffChat => Some(Preset::Chat),
            _ => None,
        }
    }

    pub const fn default_config(&self) -> RateLimitConfig {
        match self {
            Preset::MagicLink => RateLimitConfig::preset(3, 15 * 60 * 1000),
            Preset::Chat | Preset::StaffChat => RateLimitConfig::preset(20, 60 * 1000),
            Preset::Notifications => RateLimitConfig::preset(30, 60 * 1000),
            Preset::Calendar => RateLimitConfig::preset(60, 60 * 1000),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    // "magicLink", "magic-link" and "MAGIC_LINK" all name the same preset
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        Preset::ALL
            .into_iter()
            .find(|p| p.name().to_lowercase() == normalized)
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

// Effective limits, built-in defaults plus any startup overrides.
#[derive(Debug, Clone)]
pub struct PresetTable {
    limits: HashMap<Preset, RateLimitConfig>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresetView {
    pub name: &'static str,
    pub max_requests: u32,
    pub window_ms: u64,
}

impl PresetTable {
    pub fn new() -> Self {
        let limits = Preset::ALL
            .into_iter()
            .filter(|p| p.inherits().is_none())
            .map(|p| (p, p.default_config()))
            .collect();
        Self { limits }
    }

    // Apply overrides of the form `name=max/window_ms`.
    pub fn with_overrides<I, S>(mut self, overrides: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for raw in overrides {
            let (preset, config) = parse_override(raw.as_ref())?;
            self.limits.insert(preset, config);
        }
        Ok(self)
    }

    pub fn get(&self, preset: Preset) -> RateLimitConfig {
        match (self.limits.get(&preset), preset.inherits()) {
            (Some(config), _) => *config,
            (None, Some(parent)) => self.get(parent),
            (None, None) => preset.default_config(),
        }
    }

    pub fn views(&self) -> Vec<PresetView> {
        Preset::ALL
            .into_iter()
            .map(|p| {
                let cfg = self.get(p);
                PresetView {
                    name: p.name(),
                    max_requests: cfg.max_requests(),
                    window_ms: cfg.window_ms(),
                }
            })
            .collect()
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_override(raw: &str) -> Result<(Preset, RateLimitConfig), ConfigError> {
    let malformed = || ConfigError::MalformedOverride(raw.to_string());

    let (name, limit) = raw.split_once('=').ok_or_else(malformed)?;
    let (max, window) = limit.split_once('/').ok_or_else(malformed)?;

    let preset: Preset = name.parse()?;
    let max: u32 = max.trim().parse().map_err(|_| malformed())?;
    let window_ms: u64 = window.trim().parse().map_err(|_| malformed())?;

    Ok((preset, RateLimitConfig::from_millis(max, window_ms)?))
}
