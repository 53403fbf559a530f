use serde::{Deserialize, Serialize};

use crate::presets::Preset;
use crate::rate_limit::Decision;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
}

impl Language {
    // What the guarded action tells the user when it is throttled
    pub fn denial_message(&self, preset: Preset) -> &'static str {
        match (self, preset) {
            (Language::En, Preset::MagicLink) => "Too many requests. Please try again later.",
            (Language::Es, Preset::MagicLink) => {
                "Demasiadas solicitudes. Por favor, inténtalo más tarde."
            }
            (Language::En, Preset::Chat) => {
                "You have sent too many messages. Please wait a moment."
            }
            (Language::Es, Preset::Chat) => {
                "Has enviado demasiados mensajes. Por favor espera un momento."
            }
            (Language::En, Preset::StaffChat) => {
                "Too many messages. Please wait a moment before sending another."
            }
            (Language::Es, Preset::StaffChat) => {
                "Demasiados mensajes. Por favor espera un momento antes de enviar otro."
            }
            (Language::En, _) => "Too many requests. Please wait a moment and try again.",
            (Language::Es, _) => {
                "Demasiadas solicitudes. Por favor espera un momento e inténtalo de nuevo."
            }
        }
    }
}

// Consume/reset request body
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ConsumeRequest {
    // Who is being throttled: e-mail, user id, IP address
    pub subject: String,
    // Hash the subject before keying (default); set false for opaque ids
    #[serde(default = "default_hashed")]
    pub hashed: bool,
    #[serde(default)]
    pub language: Language,
}

fn default_hashed() -> bool {
    true
}

// Successful decision body
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub success: bool,
    pub remaining: u32,
    pub reset_in: u64,
}

impl From<Decision> for DecisionResponse {
    fn from(d: Decision) -> Self {
        Self {
            success: d.success,
            remaining: d.remaining,
            reset_in: d.reset_in_ms(),
        }
    }
}
