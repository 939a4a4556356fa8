//! Line-oriented demo console.
//!
//! Stands in for the presentation layer: each input line becomes one
//! discrete command forwarded to the orchestrator, the settings store, or the
//! simulated speech feed.

use railsafe_alert::AlertEvent;
use tokio::io::{AsyncBufRead, Lines};
use railsafe_core::settings::{FontSize, SettingChange};
use railsafe_core::types::ContactKind;

pub const HELP: &str = "\
Commands:
  menu | close             open / close the emergency menu
  trigger                  press the panic button
  cancel                   cancel the countdown
  dismiss                  close the acknowledgment
  call <police|women|emergency|ambulance>
  say <text>               speak into the simulated microphone
  voice on|off             toggle voice commands
  font normal|large|xlarge
  contrast on|off | dark on|off | motion on|off | voiceover on|off
  reset                    restore default settings
  status | history | contacts | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Alert(AlertEvent),
    Setting(SettingChange),
    ResetSettings,
    Say(String),
    Status,
    History,
    Contacts,
    Help,
    Quit,
}

/// Parse one input line. `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "menu" => ConsoleCommand::Alert(AlertEvent::OpenMenu),
        "close" => ConsoleCommand::Alert(AlertEvent::CloseMenu),
        "trigger" | "panic" | "sos" => ConsoleCommand::Alert(AlertEvent::ManualTrigger),
        "cancel" => ConsoleCommand::Alert(AlertEvent::Cancel),
        "dismiss" => ConsoleCommand::Alert(AlertEvent::Dismiss),
        "call" => ConsoleCommand::Alert(AlertEvent::CallContact(rest.parse::<ContactKind>()?)),
        "say" if rest.is_empty() => return Err("say needs some text".to_string()),
        "say" => ConsoleCommand::Say(rest.to_string()),
        "voice" => ConsoleCommand::Setting(SettingChange::VoiceCommands(parse_switch(rest)?)),
        "font" => ConsoleCommand::Setting(SettingChange::FontSize(rest.parse::<FontSize>()?)),
        "contrast" => ConsoleCommand::Setting(SettingChange::HighContrast(parse_switch(rest)?)),
        "dark" => ConsoleCommand::Setting(SettingChange::DarkMode(parse_switch(rest)?)),
        "motion" => ConsoleCommand::Setting(SettingChange::ReducedMotion(parse_switch(rest)?)),
        "voiceover" => ConsoleCommand::Setting(SettingChange::VoiceOver(parse_switch(rest)?)),
        "reset" => ConsoleCommand::ResetSettings,
        "status" => ConsoleCommand::Status,
        "history" => ConsoleCommand::History,
        "contacts" => ConsoleCommand::Contacts,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };
    Ok(Some(command))
}

/// Next input line. `None` at end of input, or after logging a read error,
/// so the caller always reaches its shutdown path.
pub async fn read_line<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>) -> Option<String> {
    match lines.next_line().await {
        Ok(line) => line,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read console input");
            None
        }
    }
}

/// Short relative age for the history view, e.g. "2m ago".
pub fn format_age(secs: u64) -> String {
    match secs {
        0..=59 => "now".to_string(),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

fn parse_switch(arg: &str) -> Result<bool, String> {
    match arg.to_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => Err(format!("expected on/off, got '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_alert_commands() {
        assert_eq!(
            parse_command("trigger"),
            Ok(Some(ConsoleCommand::Alert(AlertEvent::ManualTrigger)))
        );
        assert_eq!(
            parse_command("MENU"),
            Ok(Some(ConsoleCommand::Alert(AlertEvent::OpenMenu)))
        );
        assert_eq!(
            parse_command("call police"),
            Ok(Some(ConsoleCommand::Alert(AlertEvent::CallContact(
                ContactKind::RailwayPolice
            ))))
        );
        assert!(parse_command("call plumber").is_err());
    }

    #[test]
    fn test_say_keeps_original_text() {
        assert_eq!(
            parse_command("say  please HELP me now"),
            Ok(Some(ConsoleCommand::Say("please HELP me now".to_string())))
        );
        assert!(parse_command("say").is_err());
    }

    #[test]
    fn test_setting_commands() {
        assert_eq!(
            parse_command("voice on"),
            Ok(Some(ConsoleCommand::Setting(SettingChange::VoiceCommands(true))))
        );
        assert_eq!(
            parse_command("font xlarge"),
            Ok(Some(ConsoleCommand::Setting(SettingChange::FontSize(
                FontSize::XLarge
            ))))
        );
        assert_eq!(
            parse_command("motion off"),
            Ok(Some(ConsoleCommand::Setting(SettingChange::ReducedMotion(false))))
        );
        assert!(parse_command("dark maybe").is_err());
    }

    #[tokio::test]
    async fn test_read_line_until_end_of_input() {
        let mut lines = BufReader::new(&b"trigger\ncancel\n"[..]).lines();
        assert_eq!(read_line(&mut lines).await.as_deref(), Some("trigger"));
        assert_eq!(read_line(&mut lines).await.as_deref(), Some("cancel"));
        assert_eq!(read_line(&mut lines).await, None);
    }

    #[tokio::test]
    async fn test_read_error_ends_input() {
        let mut lines = BufReader::new(&b"\xff\xfe\n"[..]).lines();
        assert_eq!(read_line(&mut lines).await, None);
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(5), "now");
        assert_eq!(format_age(120), "2m ago");
        assert_eq!(format_age(15 * 60 + 30), "15m ago");
        assert_eq!(format_age(7200), "2h ago");
        assert_eq!(format_age(3 * 86_400), "3d ago");
    }

    #[test]
    fn test_unknown_command() {
        let err = parse_command("teleport").unwrap_err();
        assert!(err.contains("teleport"));
    }
}
