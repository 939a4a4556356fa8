//! Accessibility settings and the voice-listener toggle.
//!
//! The settings surface owns two things: the rider's display preferences and
//! the `VoiceListenerConfig`. Display preferences are applied to a
//! [`DisplaySurface`] through one idempotent `apply` call. The voice config is
//! published on a `watch` channel; the settings store is its only writer and
//! the listener supervisor its only reader.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::VoiceListenerConfig;

/// Root font size step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    #[default]
    Normal,
    Large,
    XLarge,
}

impl FontSize {
    /// Root font scale in percent.
    pub fn scale_percent(&self) -> u16 {
        match self {
            FontSize::Normal => 100,
            FontSize::Large => 120,
            FontSize::XLarge => 140,
        }
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontSize::Normal => write!(f, "normal"),
            FontSize::Large => write!(f, "large"),
            FontSize::XLarge => write!(f, "xlarge"),
        }
    }
}

impl std::str::FromStr for FontSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(FontSize::Normal),
            "large" => Ok(FontSize::Large),
            "xlarge" => Ok(FontSize::XLarge),
            other => Err(format!("unknown font size: {}", other)),
        }
    }
}

/// Rider-facing accessibility toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessibilitySettings {
    pub font_size: FontSize,
    pub high_contrast: bool,
    pub dark_mode: bool,
    pub reduced_motion: bool,
    pub voice_over: bool,
}

impl AccessibilitySettings {
    /// The concrete display state these settings call for.
    pub fn display_preferences(&self) -> DisplayPreferences {
        DisplayPreferences {
            font_scale_percent: self.font_size.scale_percent(),
            high_contrast: self.high_contrast,
            dark: self.dark_mode,
            animation_duration: self.reduced_motion.then(|| "0s".to_string()),
        }
    }
}

/// Anything that can render display preferences (a document root, a
/// terminal theme, a test double).
pub trait DisplaySurface {
    fn set_font_scale(&mut self, percent: u16);
    fn set_class(&mut self, class: &str, enabled: bool);
    /// `None` removes any override.
    fn set_animation_duration(&mut self, duration: Option<&str>);
}

/// Resolved display state, applied as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPreferences {
    pub font_scale_percent: u16,
    pub high_contrast: bool,
    pub dark: bool,
    pub animation_duration: Option<String>,
}

impl DisplayPreferences {
    pub const HIGH_CONTRAST_CLASS: &'static str = "high-contrast";
    pub const DARK_CLASS: &'static str = "dark";

    /// Push every preference onto `surface`.
    ///
    /// Only absolute setters are used, so applying the same value twice
    /// leaves the surface unchanged.
    pub fn apply(&self, surface: &mut dyn DisplaySurface) {
        surface.set_font_scale(self.font_scale_percent);
        surface.set_class(Self::HIGH_CONTRAST_CLASS, self.high_contrast);
        surface.set_class(Self::DARK_CLASS, self.dark);
        surface.set_animation_duration(self.animation_duration.as_deref());
    }
}

/// One discrete toggle forwarded from the settings view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingChange {
    FontSize(FontSize),
    HighContrast(bool),
    DarkMode(bool),
    ReducedMotion(bool),
    VoiceOver(bool),
    VoiceCommands(bool),
}

/// Owner of the accessibility settings and the voice listener config.
pub struct SettingsStore {
    accessibility: AccessibilitySettings,
    voice: watch::Sender<VoiceListenerConfig>,
}

impl SettingsStore {
    pub fn new(accessibility: AccessibilitySettings, voice: VoiceListenerConfig) -> Self {
        let (voice, _) = watch::channel(voice);
        Self {
            accessibility,
            voice,
        }
    }

    pub fn accessibility(&self) -> &AccessibilitySettings {
        &self.accessibility
    }

    pub fn display_preferences(&self) -> DisplayPreferences {
        self.accessibility.display_preferences()
    }

    /// Current voice listener config (a copy).
    pub fn voice_config(&self) -> VoiceListenerConfig {
        self.voice.borrow().clone()
    }

    /// Receiver side of the voice config channel, for the listener supervisor.
    pub fn subscribe_voice(&self) -> watch::Receiver<VoiceListenerConfig> {
        self.voice.subscribe()
    }

    /// Apply one change. Returns `true` if anything actually changed.
    pub fn update(&mut self, change: SettingChange) -> bool {
        let a = &mut self.accessibility;
        let changed = match change {
            SettingChange::FontSize(size) => replace(&mut a.font_size, size),
            SettingChange::HighContrast(on) => replace(&mut a.high_contrast, on),
            SettingChange::DarkMode(on) => replace(&mut a.dark_mode, on),
            SettingChange::ReducedMotion(on) => replace(&mut a.reduced_motion, on),
            SettingChange::VoiceOver(on) => replace(&mut a.voice_over, on),
            SettingChange::VoiceCommands(on) => self.voice.send_if_modified(|cfg| {
                let modified = cfg.enabled != on;
                cfg.enabled = on;
                modified
            }),
        };
        if changed {
            tracing::info!(change = ?change, "Setting updated");
        }
        changed
    }

    /// Restore default accessibility settings and switch voice commands off.
    pub fn reset(&mut self) {
        self.accessibility = AccessibilitySettings::default();
        self.voice.send_if_modified(|cfg| {
            let modified = cfg.enabled;
            cfg.enabled = false;
            modified
        });
        tracing::info!("Settings reset to defaults");
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
