use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{RailsafeError, Result};
use crate::settings::AccessibilitySettings;
use crate::types::{default_contacts, EmergencyContact};

/// Top-level configuration for the Railsafe companion.
///
/// Loaded from `~/.railsafe/config.toml` by default. Each section corresponds
/// to one collaborator of the alert core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailsafeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub voice: VoiceListenerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub display: AccessibilitySettings,
    #[serde(default)]
    pub demo: DemoConfig,
    #[serde(default = "default_contacts")]
    pub contacts: Vec<EmergencyContact>,
}

impl Default for RailsafeConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            voice: VoiceListenerConfig::default(),
            dispatch: DispatchConfig::default(),
            display: AccessibilitySettings::default(),
            demo: DemoConfig::default(),
            contacts: default_contacts(),
        }
    }
}

impl RailsafeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RailsafeConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RailsafeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Location label attached to dispatched alerts. GPS is out of scope, so
    /// this is whatever the rider (or the host app) last reported.
    pub location_label: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            location_label: "Unknown location".to_string(),
        }
    }
}

/// Voice keyword listener configuration.
///
/// Owned by the settings surface. Only `enabled` changes at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceListenerConfig {
    /// Whether the listener should be running.
    pub enabled: bool,
    /// Phrases whose appearance in a transcript triggers an alert.
    pub trigger_phrases: Vec<String>,
    /// BCP 47 locale handed to the recognizer.
    pub locale: String,
}

impl Default for VoiceListenerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            trigger_phrases: vec!["help".to_string(), "bachao".to_string()],
            locale: "en-US".to_string(),
        }
    }
}

/// Alert dispatch retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Retries after the first failed attempt before giving up.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub backoff_ms: u64,
    /// Factor applied to the delay after every retry.
    pub backoff_multiplier: u32,
    /// Responder recorded on alerts sent by the simulated dispatcher.
    pub responder: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 500,
            backoff_multiplier: 2,
            responder: "Railway Protection Force".to_string(),
        }
    }
}

impl DispatchConfig {
    /// Backoff before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> std::time::Duration {
        let factor =
            u64::from(self.backoff_multiplier.max(1)).saturating_pow(retry.saturating_sub(1));
        std::time::Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Demo-only behavior. Everything here is off unless explicitly enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Fire a manual trigger as soon as the dashboard comes up.
    pub auto_trigger_on_start: bool,
    /// Start the session with the sample alert history.
    pub seed_history: bool,
}
