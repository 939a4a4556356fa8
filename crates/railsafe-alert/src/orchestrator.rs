//! Emergency alert orchestrator.
//!
//! One task owns the [`AlertSession`] and consumes a single command queue.
//! User commands, countdown ticks, dispatch results, and retry and display
//! timeouts all arrive on that queue, so transitions are applied one at a
//! time and each transition's effects (timers started or cancelled, dispatch
//! tasks spawned, history appended) happen before the next command is read.
//!
//! Timer and dispatch callbacks only enqueue. Each carries the session
//! generation it was started under; anything from an older generation is
//! discarded.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use railsafe_core::config::{DispatchConfig, RailsafeConfig};
use railsafe_core::events::DomainEvent;
use railsafe_core::types::{
    default_contacts, find_contact, AlertRecord, ContactKind, EmergencyContact, ResolutionStatus,
    Timestamp, TriggerSource,
};

use crate::dispatch::{DispatchReceipt, Dispatcher};
use crate::error::{AlertError, DispatchError};
use crate::history::AlertHistory;
use crate::state::{AlertEvent, AlertSession, AlertSnapshot, AlertState, Countdown, Delivery, Phase};
use crate::timer::CountdownTimer;

/// Seconds between trigger and dispatch.
pub const COUNTDOWN_SECS: u32 = 10;

/// Seconds the acknowledgment stays up before returning to idle.
pub const DISPLAY_TIMEOUT_SECS: u32 = 5;

const EVENT_CAPACITY: usize = 256;

/// Orchestrator settings, usually derived from [`RailsafeConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub countdown_secs: u32,
    pub display_timeout_secs: u32,
    /// Location attached to dispatched alerts.
    pub location: String,
    pub dispatch: DispatchConfig,
    pub contacts: Vec<EmergencyContact>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            countdown_secs: COUNTDOWN_SECS,
            display_timeout_secs: DISPLAY_TIMEOUT_SECS,
            location: "Unknown location".to_string(),
            dispatch: DispatchConfig::default(),
            contacts: default_contacts(),
        }
    }
}

impl From<&RailsafeConfig> for OrchestratorConfig {
    fn from(config: &RailsafeConfig) -> Self {
        Self {
            location: config.general.location_label.clone(),
            dispatch: config.dispatch.clone(),
            contacts: config.contacts.clone(),
            ..Self::default()
        }
    }
}

/// Internal follow-ups produced by timers and dispatch tasks.
#[derive(Debug)]
enum Signal {
    CountdownTick {
        generation: u64,
        remaining: u32,
    },
    CountdownExpired {
        generation: u64,
    },
    DispatchFinished {
        generation: u64,
        attempt: u32,
        result: Result<DispatchReceipt, DispatchError>,
    },
    RetryDue {
        generation: u64,
    },
    DisplayTimeoutExpired {
        generation: u64,
    },
}

enum Command {
    Event {
        event: AlertEvent,
        reply: Option<oneshot::Sender<AlertSnapshot>>,
    },
    Signal(Signal),
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Handle to the orchestrator task. Cheap to clone.
#[derive(Clone)]
pub struct AlertOrchestrator {
    tx: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<AlertSnapshot>,
    events: broadcast::Sender<DomainEvent>,
    history: AlertHistory,
}

impl AlertOrchestrator {
    /// Spawn the orchestrator task on the current tokio runtime.
    pub fn spawn(config: OrchestratorConfig, dispatcher: Arc<dyn Dispatcher>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(AlertSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let history = AlertHistory::new();

        let core = AlertCore {
            session: AlertSession::default(),
            generation: 0,
            countdown: CountdownTimer::new(),
            display: CountdownTimer::new(),
            pending: None,
            config,
            dispatcher,
            history: history.clone(),
            events: events.clone(),
            snapshot: snapshot_tx,
            tx: tx.clone(),
        };
        tokio::spawn(core.run(rx));
        info!("Alert orchestrator started");

        Self {
            tx,
            snapshot,
            events,
            history,
        }
    }

    /// Apply one event and return the resulting snapshot.
    ///
    /// Events that make no sense in the current state are logged and leave
    /// the session unchanged. If the orchestrator has shut down, the last
    /// published snapshot is returned.
    pub async fn dispatch_event(&self, event: AlertEvent) -> AlertSnapshot {
        match self.try_dispatch_event(event).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Event dropped: {}", e);
                self.snapshot()
            }
        }
    }

    pub async fn try_dispatch_event(&self, event: AlertEvent) -> Result<AlertSnapshot, AlertError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Event {
                event,
                reply: Some(reply),
            })
            .map_err(|_| AlertError::OrchestratorStopped)?;
        rx.await.map_err(|_| AlertError::OrchestratorStopped)
    }

    /// Enqueue an event without waiting. Safe to call from sync callbacks.
    pub fn post(&self, event: AlertEvent) -> Result<(), AlertError> {
        self.tx
            .send(Command::Event { event, reply: None })
            .map_err(|_| AlertError::OrchestratorStopped)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> AlertSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AlertSnapshot> {
        self.snapshot.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }

    /// Sender other components (the voice listener) publish their events on.
    pub fn event_sender(&self) -> broadcast::Sender<DomainEvent> {
        self.events.clone()
    }

    pub fn history(&self) -> &AlertHistory {
        &self.history
    }

    /// Stop the orchestrator task, cancelling any running timers.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { done }).is_ok() {
            let _ = rx.await;
        }
    }
}

/// State owned by the orchestrator task.
struct AlertCore {
    session: AlertSession,
    /// Bumped on every countdown start.
    generation: u64,
    countdown: CountdownTimer,
    display: CountdownTimer,
    /// In-flight dispatch attempt or retry backoff.
    pending: Option<JoinHandle<()>>,
    config: OrchestratorConfig,
    dispatcher: Arc<dyn Dispatcher>,
    history: AlertHistory,
    events: broadcast::Sender<DomainEvent>,
    snapshot: watch::Sender<AlertSnapshot>,
    tx: mpsc::UnboundedSender<Command>,
}

impl AlertCore {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Event { event, reply } => {
                    self.handle_event(event);
                    let snapshot = self.publish_snapshot();
                    if let Some(reply) = reply {
                        let _ = reply.send(snapshot);
                    }
                }
                Command::Signal(signal) => {
                    self.handle_signal(signal);
                    self.publish_snapshot();
                }
                Command::Shutdown { done } => {
                    self.stop_all();
                    info!("Alert orchestrator stopped");
                    let _ = done.send(());
                    return;
                }
            }
        }
    }

    fn publish_snapshot(&self) -> AlertSnapshot {
        let snapshot = self.session.snapshot();
        self.snapshot.send_replace(snapshot.clone());
        snapshot
    }

    fn publish(&self, event: DomainEvent) {
        debug!(event = event.event_name(), "Publishing domain event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // =========================================================================
    // External events
    // =========================================================================

    fn handle_event(&mut self, event: AlertEvent) {
        let state = self.session.state();
        match (state, event) {
            (AlertState::Idle, AlertEvent::OpenMenu) => self.session.enter(Phase::MenuOpen),
            (AlertState::MenuOpen, AlertEvent::CloseMenu) => self.session.enter(Phase::Idle),

            (AlertState::Idle | AlertState::MenuOpen, AlertEvent::ManualTrigger) => {
                self.begin_countdown(TriggerSource::Manual)
            }
            (
                AlertState::Idle | AlertState::MenuOpen | AlertState::Acknowledged,
                AlertEvent::KeywordDetected { phrase },
            ) => {
                info!(phrase = %phrase, from = %state, "Keyword pre-empts current state");
                self.begin_countdown(TriggerSource::Voice { phrase })
            }
            (
                AlertState::CountingDown,
                event @ (AlertEvent::ManualTrigger | AlertEvent::KeywordDetected { .. }),
            ) => {
                debug!(event = %event, "Countdown already running, trigger ignored");
            }

            (AlertState::CountingDown, AlertEvent::Cancel) => self.cancel_countdown(),
            (AlertState::Acknowledged, AlertEvent::Dismiss) => self.close_acknowledgment(true),

            (AlertState::Idle | AlertState::MenuOpen, AlertEvent::CallContact(kind)) => {
                self.call_contact(kind)
            }

            (state, event) => {
                info!(state = %state, event = %event, "Event ignored in current state");
            }
        }
    }

    fn begin_countdown(&mut self, source: TriggerSource) {
        // A keyword heard on the acknowledgment screen replaces it.
        self.display.cancel();

        self.generation += 1;
        let generation = self.generation;
        let alert_id = Uuid::new_v4();
        let countdown_secs = self.config.countdown_secs;

        let tick_tx = self.tx.clone();
        let expire_tx = self.tx.clone();
        let started = self.countdown.start(
            countdown_secs,
            move |remaining| {
                let _ = tick_tx.send(Command::Signal(Signal::CountdownTick {
                    generation,
                    remaining,
                }));
            },
            move || {
                let _ = expire_tx.send(Command::Signal(Signal::CountdownExpired { generation }));
            },
        );
        if let Err(e) = started {
            debug_assert!(false, "countdown started twice: {}", e);
            error!(error = %e, "Countdown timer already running, trigger dropped");
            return;
        }

        info!(
            alert_id = %alert_id,
            category = %source.category(),
            countdown_secs,
            "Alert countdown started"
        );
        self.session.last_failure = None;
        self.session.enter(Phase::CountingDown(Countdown {
            alert_id,
            source: source.clone(),
            started_at: Utc::now(),
            started: Instant::now(),
            remaining: countdown_secs,
        }));
        self.publish(DomainEvent::AlertTriggered {
            alert_id,
            source,
            countdown_secs,
            timestamp: Timestamp::now(),
        });
    }

    fn cancel_countdown(&mut self) {
        self.countdown.cancel();
        if let Phase::CountingDown(countdown) = &self.session.phase {
            info!(
                alert_id = %countdown.alert_id,
                remaining = countdown.remaining,
                "Alert cancelled"
            );
            self.publish(DomainEvent::AlertCancelled {
                alert_id: countdown.alert_id,
                remaining_secs: countdown.remaining,
                timestamp: Timestamp::now(),
            });
        }
        self.session.enter(Phase::Idle);
    }

    fn close_acknowledgment(&mut self, dismissed_by_user: bool) {
        self.display.cancel();
        if let Phase::Acknowledged { delivery, .. } = &self.session.phase {
            self.publish(DomainEvent::AlertAcknowledged {
                alert_id: delivery.record.id,
                dismissed_by_user,
                timestamp: Timestamp::now(),
            });
        }
        self.session.enter(Phase::Idle);
    }

    fn call_contact(&mut self, kind: ContactKind) {
        let Some(contact) = find_contact(&self.config.contacts, kind) else {
            warn!(kind = %kind, "No emergency contact configured for this kind");
            return;
        };
        info!(name = %contact.name, number = %contact.number, "Calling emergency contact");
        self.publish(DomainEvent::ContactCallRequested {
            kind,
            name: contact.name.clone(),
            number: contact.number.clone(),
            timestamp: Timestamp::now(),
        });
        self.session.enter(Phase::Idle);
    }

    // =========================================================================
    // Internal signals
    // =========================================================================

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::CountdownTick {
                generation,
                remaining,
            } if generation == self.generation => self.apply_tick(remaining),
            Signal::CountdownExpired { generation } if generation == self.generation => {
                self.countdown.cancel();
                self.begin_dispatch();
            }
            Signal::DispatchFinished {
                generation,
                attempt,
                result,
            } if generation == self.generation => {
                self.finish_attempt(attempt, result);
            }
            Signal::RetryDue { generation } if generation == self.generation => {
                self.retry_dispatch();
            }
            Signal::DisplayTimeoutExpired { generation } if generation == self.generation => {
                if self.session.state() == AlertState::Acknowledged {
                    self.close_acknowledgment(false);
                }
            }
            stale => debug!(signal = ?stale, current = self.generation, "Stale signal discarded"),
        }
    }

    /// Apply a timer tick, clamped to the time actually elapsed since the
    /// countdown started. A stalled timer never holds the alert past its
    /// deadline.
    fn apply_tick(&mut self, tick: u32) {
        let countdown_secs = self.config.countdown_secs;
        let Phase::CountingDown(countdown) = &mut self.session.phase else {
            return;
        };
        let elapsed = countdown.started.elapsed().as_secs();
        let by_clock = u64::from(countdown_secs).saturating_sub(elapsed) as u32;
        if by_clock < tick {
            warn!(
                alert_id = %countdown.alert_id,
                tick,
                by_clock,
                "Countdown timer behind the clock"
            );
        }
        countdown.remaining = countdown.remaining.min(tick).min(by_clock);
        let (alert_id, remaining) = (countdown.alert_id, countdown.remaining);

        debug!(alert_id = %alert_id, remaining, "Countdown tick");
        self.publish(DomainEvent::CountdownTicked {
            alert_id,
            remaining_secs: remaining,
            timestamp: Timestamp::now(),
        });

        // Tick 0 is followed by the regular expiry.
        if by_clock == 0 && tick > 0 {
            warn!(alert_id = %alert_id, "Countdown deadline passed, dispatching now");
            self.countdown.cancel();
            self.begin_dispatch();
        }
    }

    fn begin_dispatch(&mut self) {
        let Phase::CountingDown(countdown) = &self.session.phase else {
            return;
        };
        let record = AlertRecord {
            id: countdown.alert_id,
            category: countdown.source.category(),
            location: self.config.location.clone(),
            occurred_at: Timestamp::from_datetime(countdown.started_at),
            resolution_status: ResolutionStatus::Active,
            responder: self.config.dispatch.responder.clone(),
        };
        let delivery = Delivery {
            record,
            source: countdown.source.clone(),
            started_at: countdown.started_at,
            attempt: 1,
        };
        info!(alert_id = %delivery.record.id, "Countdown expired, dispatching alert");
        self.session.enter(Phase::Dispatching(delivery));
        self.send_attempt();
    }

    fn send_attempt(&mut self) {
        let Phase::Dispatching(delivery) = &self.session.phase else {
            return;
        };
        let record = delivery.record.clone();
        let attempt = delivery.attempt;
        let generation = self.generation;
        let dispatcher = Arc::clone(&self.dispatcher);
        let tx = self.tx.clone();

        debug!(alert_id = %record.id, attempt, "Dispatch attempt");
        self.pending = Some(tokio::spawn(async move {
            let result = dispatcher.dispatch(&record).await;
            let _ = tx.send(Command::Signal(Signal::DispatchFinished {
                generation,
                attempt,
                result,
            }));
        }));
    }

    fn finish_attempt(&mut self, attempt: u32, result: Result<DispatchReceipt, DispatchError>) {
        let delivery = match &self.session.phase {
            Phase::Dispatching(delivery) if delivery.attempt == attempt => delivery.clone(),
            _ => {
                debug!(attempt, "Dispatch result for an attempt no longer current");
                return;
            }
        };
        self.pending = None;

        match result {
            Ok(receipt) => self.acknowledge(delivery, receipt),
            Err(e) if e.is_retryable() && attempt <= self.config.dispatch.max_retries => {
                let reason = e.to_string();
                let backoff = self.config.dispatch.backoff_for(attempt);
                warn!(
                    alert_id = %delivery.record.id,
                    attempt,
                    error = %e,
                    backoff_ms = backoff.as_millis() as u64,
                    "Dispatch attempt failed, retrying"
                );
                self.publish(DomainEvent::DispatchAttemptFailed {
                    alert_id: delivery.record.id,
                    attempt,
                    reason: reason.clone(),
                    timestamp: Timestamp::now(),
                });
                self.session
                    .enter(Phase::DispatchFailed { delivery, reason });

                let generation = self.generation;
                let tx = self.tx.clone();
                self.pending = Some(tokio::spawn(async move {
                    tokio::time::sleep(backoff).await;
                    let _ = tx.send(Command::Signal(Signal::RetryDue { generation }));
                }));
            }
            Err(e) => self.give_up(delivery, e),
        }
    }

    fn retry_dispatch(&mut self) {
        let Phase::DispatchFailed { delivery, .. } = &self.session.phase else {
            return;
        };
        let mut delivery = delivery.clone();
        delivery.attempt += 1;
        info!(alert_id = %delivery.record.id, attempt = delivery.attempt, "Retrying dispatch");
        self.session.enter(Phase::Dispatching(delivery));
        self.send_attempt();
    }

    fn acknowledge(&mut self, delivery: Delivery, receipt: DispatchReceipt) {
        info!(
            alert_id = %delivery.record.id,
            attempts = delivery.attempt,
            responder = %delivery.record.responder,
            "Alert dispatched"
        );
        self.history.record(delivery.record.clone());
        self.publish(DomainEvent::AlertDispatched {
            record: delivery.record.clone(),
            attempts: delivery.attempt,
            timestamp: Timestamp::now(),
        });
        self.session.enter(Phase::Acknowledged { delivery, receipt });

        let generation = self.generation;
        let tx = self.tx.clone();
        let started = self.display.start(
            self.config.display_timeout_secs,
            |_| {},
            move || {
                let _ = tx.send(Command::Signal(Signal::DisplayTimeoutExpired { generation }));
            },
        );
        if let Err(e) = started {
            debug_assert!(false, "display timeout started twice: {}", e);
            error!(error = %e, "Display timeout already running");
        }
    }

    fn give_up(&mut self, delivery: Delivery, err: DispatchError) {
        let reason = err.to_string();
        error!(
            alert_id = %delivery.record.id,
            attempts = delivery.attempt,
            error = %err,
            "Alert could not be delivered"
        );
        let record = AlertRecord {
            resolution_status: ResolutionStatus::Failed,
            ..delivery.record
        };
        self.history.record(record.clone());
        self.publish(DomainEvent::AlertUndeliverable {
            record,
            attempts: delivery.attempt,
            reason: reason.clone(),
            timestamp: Timestamp::now(),
        });
        self.session.last_failure = Some(reason);
        self.session.enter(Phase::Idle);
    }

    fn stop_all(&mut self) {
        self.countdown.cancel();
        self.display.cancel();
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
