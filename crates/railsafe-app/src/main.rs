//! Railsafe application binary - composition root.
//!
//! Ties together all Railsafe crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Spawn the alert orchestrator with the simulated dispatcher
//! 3. Build the settings store and apply display preferences
//! 4. Start the voice listener supervisor (keyword -> orchestrator)
//! 5. Run the line-oriented console that stands in for the UI

mod cli;
mod console;
mod terminal;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use railsafe_alert::{AlertEvent, AlertOrchestrator, OrchestratorConfig, SimulatedDispatcher};
use railsafe_core::config::RailsafeConfig;
use railsafe_core::events::DomainEvent;
use railsafe_core::settings::SettingsStore;
use railsafe_core::types::{demo_alerts, EmergencyContact, Timestamp};
use railsafe_voice::{
    keyword_listener_for, spawn_listener_supervisor, ChannelRecognizer, KeywordCallback,
    KeywordDetection,
};

use crate::cli::CliArgs;
use crate::console::{format_age, parse_command, read_line, ConsoleCommand, HELP};
use crate::terminal::TerminalSurface;

/// Simulated network round trip for each dispatch attempt.
const DISPATCH_LATENCY: Duration = Duration::from_millis(800);

/// Print domain events for the rider and log them.
fn spawn_event_printer(rx: broadcast::Receiver<DomainEvent>) {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(rx);
        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Event printer fell behind");
                    continue;
                }
            };
            tracing::debug!(event = event.event_name(), "Domain event");
            match event {
                DomainEvent::AlertTriggered { source, countdown_secs, .. } => {
                    println!(
                        "!! Alert ({}) in {}s. Type 'cancel' to stop.",
                        source.category(),
                        countdown_secs
                    );
                }
                DomainEvent::CountdownTicked { remaining_secs, .. } => {
                    println!("   {}...", remaining_secs);
                }
                DomainEvent::AlertCancelled { remaining_secs, .. } => {
                    println!("Alert cancelled with {}s left.", remaining_secs);
                }
                DomainEvent::DispatchAttemptFailed { attempt, reason, .. } => {
                    println!("Dispatch attempt {} failed ({}), retrying.", attempt, reason);
                }
                DomainEvent::AlertDispatched { record, attempts, .. } => {
                    println!(
                        "Alert sent to {} after {} attempt(s). Location: {}",
                        record.responder, attempts, record.location
                    );
                }
                DomainEvent::AlertUndeliverable { attempts, reason, .. } => {
                    println!(
                        "!! ALERT COULD NOT BE SENT after {} attempts: {}. Call 139 or 112 directly.",
                        attempts, reason
                    );
                }
                DomainEvent::AlertAcknowledged { .. } => println!("Back to the dashboard."),
                DomainEvent::ContactCallRequested { name, number, .. } => {
                    println!("Calling {} on {}...", name, number);
                }
                DomainEvent::KeywordDetected { phrase, .. } => {
                    println!("Heard \"{}\".", phrase);
                }
                DomainEvent::ListenerStarted { locale, .. } => {
                    println!("Voice commands on ({}).", locale);
                }
                DomainEvent::ListenerStopped { reason, .. } => {
                    println!("Voice commands off ({}).", reason);
                }
                _ => {}
            }
        }
    });
}

/// Owns everything the console commands act on.
struct Console {
    orchestrator: AlertOrchestrator,
    settings: SettingsStore,
    surface: TerminalSurface,
    recognizer: Option<Arc<ChannelRecognizer>>,
    contacts: Vec<EmergencyContact>,
}

impl Console {
    async fn execute(&mut self, command: ConsoleCommand) {
        match command {
            ConsoleCommand::Alert(event) => {
                let snapshot = self.orchestrator.dispatch_event(event).await;
                println!("[{}]", snapshot.state);
            }
            ConsoleCommand::Setting(change) => {
                if self.settings.update(change) {
                    self.settings.display_preferences().apply(&mut self.surface);
                }
                println!("Display: {}", self.surface.describe());
            }
            ConsoleCommand::ResetSettings => {
                self.settings.reset();
                self.settings.display_preferences().apply(&mut self.surface);
                println!("Settings reset. Display: {}", self.surface.describe());
            }
            ConsoleCommand::Say(text) => self.say(text).await,
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::History => self.print_history(),
            ConsoleCommand::Contacts => {
                let mut contacts: Vec<&EmergencyContact> = self.contacts.iter().collect();
                contacts.sort_by_key(|c| c.priority);
                for contact in contacts {
                    println!("  {:<20} {}", contact.name, contact.number);
                }
            }
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {}
        }
    }

    async fn say(&self, text: String) {
        let Some(recognizer) = self.recognizer.as_ref() else {
            println!("Speech recognition is unavailable (started with --no-voice).");
            return;
        };
        let delivered = match recognizer.feed() {
            Some(feed) => feed.push(text).await,
            None => false,
        };
        if !delivered {
            println!("Voice commands are off. Type 'voice on' first.");
        }
    }

    fn print_status(&self) {
        let snapshot = self.orchestrator.snapshot();
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!(error = %e, "Failed to render status"),
        }
        println!(
            "Voice commands: {}",
            if self.settings.voice_config().enabled { "on" } else { "off" }
        );
        println!("Display: {}", self.surface.describe());
    }

    fn print_history(&self) {
        let mut empty = true;
        for record in self.orchestrator.history().list() {
            empty = false;
            println!(
                "  {} ({:>6})  {:<15} {:<8} {}  ({})",
                record.occurred_at.to_datetime().format("%Y-%m-%d %H:%M:%S"),
                format_age(record.occurred_at.age_secs()),
                record.category,
                record.resolution_status,
                record.location,
                record.responder
            );
        }
        if empty {
            println!("  No alerts this session.");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply.
    let config_file = args.resolve_config_path();
    let loaded = RailsafeConfig::load(&config_file);
    let config_level = loaded
        .as_ref()
        .map(|c| c.general.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(args.resolve_log_filter(&config_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Railsafe v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %config_file.display(),
                error = %e,
                "Config not loaded, using defaults"
            );
            RailsafeConfig::default()
        }
    };

    // Orchestrator.
    let mut orchestrator_config = OrchestratorConfig::from(&config);
    orchestrator_config.location = args.resolve_location(&config.general.location_label);
    let dispatcher = SimulatedDispatcher::new(config.contacts.clone())
        .with_latency(DISPATCH_LATENCY)
        .failing_first(args.simulate_dispatch_failures);
    tracing::info!(
        location = %orchestrator_config.location,
        max_retries = orchestrator_config.dispatch.max_retries,
        "Alert dispatch configured (simulated)"
    );
    let orchestrator = AlertOrchestrator::spawn(orchestrator_config, Arc::new(dispatcher));
    spawn_event_printer(orchestrator.events());
    if config.demo.seed_history {
        for record in demo_alerts(Timestamp::now()) {
            orchestrator.history().record(record);
        }
        tracing::info!(records = orchestrator.history().len(), "Seeded demo alert history");
    }

    // Settings and display.
    let settings = SettingsStore::new(config.display.clone(), config.voice.clone());
    let mut surface = TerminalSurface::default();
    settings.display_preferences().apply(&mut surface);

    // Voice listener.
    let recognizer = if args.no_voice {
        tracing::info!("Voice listener disabled by --no-voice");
        None
    } else {
        Some(Arc::new(ChannelRecognizer::new()))
    };
    let listener = keyword_listener_for(recognizer.clone(), Some(orchestrator.event_sender()));
    let target = orchestrator.clone();
    let on_keyword: KeywordCallback = Arc::new(move |detection: KeywordDetection| {
        if let Err(e) = target.post(AlertEvent::KeywordDetected {
            phrase: detection.phrase,
        }) {
            tracing::warn!(error = %e, "Keyword dropped");
        }
    });
    let supervisor = spawn_listener_supervisor(listener, settings.subscribe_voice(), on_keyword);

    let mut console = Console {
        orchestrator: orchestrator.clone(),
        settings,
        surface,
        recognizer,
        contacts: config.contacts.clone(),
    };

    if args.resolve_auto_trigger(config.demo.auto_trigger_on_start) {
        tracing::info!("Demo auto-trigger enabled");
        console.execute(ConsoleCommand::Alert(AlertEvent::ManualTrigger)).await;
    }

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = read_line(&mut lines) => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(command)) => console.execute(command).await,
            Err(e) => println!("{} (type 'help')", e),
        }
    }

    // Dropping the settings store closes the voice config channel, which
    // stops the listener supervisor.
    drop(console);
    let _ = supervisor.await;
    orchestrator.shutdown().await;
    tracing::info!("Railsafe stopped");

    Ok(())
}
