pub mod config;
pub mod error;
pub mod events;
pub mod settings;
pub mod types;

pub use config::RailsafeConfig;
pub use error::{RailsafeError, Result};
pub use settings::{AccessibilitySettings, DisplayPreferences, DisplaySurface, SettingsStore};
pub use types::*;
