//! CLI argument definitions for the Railsafe application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Railsafe - a personal-safety companion for train riders with a panic
/// button and voice-activated distress alerts.
#[derive(Parser, Debug)]
#[command(name = "railsafe", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Location attached to dispatched alerts, e.g. "Coach B4, Train 12951".
    #[arg(long = "location")]
    pub location: Option<String>,

    /// Fire a manual trigger as soon as the console starts (demo only).
    #[arg(long = "demo-auto-trigger")]
    pub demo_auto_trigger: bool,

    /// Never start the voice listener, even if enabled in config.
    #[arg(long = "no-voice")]
    pub no_voice: bool,

    /// Make the first N simulated dispatch attempts fail.
    #[arg(long = "simulate-dispatch-failures", default_value_t = 0)]
    pub simulate_dispatch_failures: u32,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > RAILSAFE_CONFIG env var > platform default (~/.railsafe/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("RAILSAFE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > RUST_LOG env var > config file value.
    pub fn resolve_log_filter(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Ok(filter) = std::env::var("RUST_LOG") {
            if !filter.trim().is_empty() {
                return filter;
            }
        }
        config_level.to_string()
    }

    /// Resolve the alert location label.
    ///
    /// Priority: --location flag > RAILSAFE_LOCATION env var > config file value.
    pub fn resolve_location(&self, config_location: &str) -> String {
        if let Some(ref location) = self.location {
            return location.clone();
        }
        if let Ok(location) = std::env::var("RAILSAFE_LOCATION") {
            if !location.trim().is_empty() {
                return location;
            }
        }
        config_location.to_string()
    }

    /// Whether to fire the demo trigger: --demo-auto-trigger flag or config.
    pub fn resolve_auto_trigger(&self, config_auto_trigger: bool) -> bool {
        self.demo_auto_trigger || config_auto_trigger
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".railsafe").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".railsafe").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let args = CliArgs::try_parse_from(["railsafe"]).unwrap();
        assert!(args.config.is_none());
        assert!(!args.demo_auto_trigger);
        assert!(!args.no_voice);
        assert_eq!(args.simulate_dispatch_failures, 0);
    }

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::try_parse_from([
            "railsafe",
            "--config",
            "/tmp/railsafe.toml",
            "--log-level",
            "debug",
            "--location",
            "Coach B4",
            "--demo-auto-trigger",
            "--no-voice",
            "--simulate-dispatch-failures",
            "2",
        ])
        .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/railsafe.toml"));
        assert_eq!(args.resolve_log_filter("info"), "debug");
        assert_eq!(args.resolve_location("Unknown location"), "Coach B4");
        assert!(args.resolve_auto_trigger(false));
        assert!(args.no_voice);
        assert_eq!(args.simulate_dispatch_failures, 2);
    }

    #[test]
    fn test_auto_trigger_from_config() {
        let args = CliArgs::try_parse_from(["railsafe"]).unwrap();
        assert!(args.resolve_auto_trigger(true));
        assert!(!args.resolve_auto_trigger(false));
    }
}
