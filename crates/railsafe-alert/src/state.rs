//! Alert session state.
//!
//! The session lifecycle:
//! - Idle -> MenuOpen (open the emergency menu)
//! - MenuOpen -> Idle (close the menu, or call a contact)
//! - Idle / MenuOpen / Acknowledged -> CountingDown (manual trigger or keyword)
//! - CountingDown -> Idle (cancel)
//! - CountingDown -> Dispatching (countdown expired)
//! - Dispatching -> Acknowledged (dispatch complete)
//! - Dispatching -> DispatchFailed (attempt failed, retry pending)
//! - DispatchFailed -> Dispatching (retry)
//! - DispatchFailed -> Idle (retries exhausted)
//! - Acknowledged -> Idle (dismiss or display timeout)
//!
//! Per-state data lives inside [`Phase`], so a countdown value exists exactly
//! while the session is counting down.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use railsafe_core::types::{AlertRecord, ContactKind, TriggerSource};

use crate::dispatch::DispatchReceipt;

/// Observable state of the alert session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Idle,
    MenuOpen,
    CountingDown,
    Dispatching,
    /// A dispatch attempt failed and a retry is scheduled.
    DispatchFailed,
    Acknowledged,
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertState::Idle => write!(f, "Idle"),
            AlertState::MenuOpen => write!(f, "MenuOpen"),
            AlertState::CountingDown => write!(f, "CountingDown"),
            AlertState::Dispatching => write!(f, "Dispatching"),
            AlertState::DispatchFailed => write!(f, "DispatchFailed"),
            AlertState::Acknowledged => write!(f, "Acknowledged"),
        }
    }
}

impl AlertState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &AlertState) -> bool {
        matches!(
            (self, target),
            (AlertState::Idle, AlertState::MenuOpen)
                | (AlertState::MenuOpen, AlertState::Idle)
                | (AlertState::Idle, AlertState::CountingDown)
                | (AlertState::MenuOpen, AlertState::CountingDown)
                | (AlertState::Acknowledged, AlertState::CountingDown)
                | (AlertState::CountingDown, AlertState::Idle)
                | (AlertState::CountingDown, AlertState::Dispatching)
                | (AlertState::Dispatching, AlertState::Acknowledged)
                | (AlertState::Dispatching, AlertState::DispatchFailed)
                | (AlertState::DispatchFailed, AlertState::Dispatching)
                | (AlertState::DispatchFailed, AlertState::Idle)
                | (AlertState::Acknowledged, AlertState::Idle)
        )
    }

    /// Whether the simulated audio/video capture is on.
    pub fn is_recording(&self) -> bool {
        matches!(
            self,
            AlertState::CountingDown | AlertState::Dispatching | AlertState::DispatchFailed
        )
    }
}

/// Commands the presentation layer and the voice listener send in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    OpenMenu,
    CloseMenu,
    ManualTrigger,
    Cancel,
    Dismiss,
    KeywordDetected { phrase: String },
    CallContact(ContactKind),
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertEvent::OpenMenu => write!(f, "OpenMenu"),
            AlertEvent::CloseMenu => write!(f, "CloseMenu"),
            AlertEvent::ManualTrigger => write!(f, "ManualTrigger"),
            AlertEvent::Cancel => write!(f, "Cancel"),
            AlertEvent::Dismiss => write!(f, "Dismiss"),
            AlertEvent::KeywordDetected { phrase } => write!(f, "KeywordDetected({})", phrase),
            AlertEvent::CallContact(kind) => write!(f, "CallContact({})", kind),
        }
    }
}

/// A running countdown.
#[derive(Debug, Clone)]
pub(crate) struct Countdown {
    pub alert_id: Uuid,
    pub source: TriggerSource,
    pub started_at: DateTime<Utc>,
    /// Monotonic start, for measuring drift against the tick count.
    pub started: Instant,
    pub remaining: u32,
}

/// An alert on its way out. The record is fixed for every attempt.
#[derive(Debug, Clone)]
pub(crate) struct Delivery {
    pub record: AlertRecord,
    pub source: TriggerSource,
    pub started_at: DateTime<Utc>,
    /// 1-based number of the current (or last failed) attempt.
    pub attempt: u32,
}

#[derive(Debug, Clone)]
pub(crate) enum Phase {
    Idle,
    MenuOpen,
    CountingDown(Countdown),
    Dispatching(Delivery),
    DispatchFailed { delivery: Delivery, reason: String },
    Acknowledged {
        delivery: Delivery,
        receipt: DispatchReceipt,
    },
}

impl Phase {
    pub fn state(&self) -> AlertState {
        match self {
            Phase::Idle => AlertState::Idle,
            Phase::MenuOpen => AlertState::MenuOpen,
            Phase::CountingDown(_) => AlertState::CountingDown,
            Phase::Dispatching(_) => AlertState::Dispatching,
            Phase::DispatchFailed { .. } => AlertState::DispatchFailed,
            Phase::Acknowledged { .. } => AlertState::Acknowledged,
        }
    }
}

/// The orchestrator's session: current phase plus the outcome of the last
/// undeliverable alert, kept until the next trigger.
#[derive(Debug, Clone)]
pub(crate) struct AlertSession {
    pub phase: Phase,
    pub last_failure: Option<String>,
}

impl Default for AlertSession {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            last_failure: None,
        }
    }
}

impl AlertSession {
    pub fn state(&self) -> AlertState {
        self.phase.state()
    }

    /// Move to `next`, logging the transition.
    pub fn enter(&mut self, next: Phase) {
        let (from, to) = (self.phase.state(), next.state());
        debug_assert!(
            from == to || from.can_transition_to(&to),
            "invalid alert transition {} -> {}",
            from,
            to
        );
        if from != to {
            tracing::debug!("Alert state: {} -> {}", from, to);
        }
        self.phase = next;
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        let state = self.phase.state();
        let mut snapshot = AlertSnapshot {
            state,
            recording: state.is_recording(),
            last_failure: self.last_failure.clone(),
            ..AlertSnapshot::default()
        };
        match &self.phase {
            Phase::Idle | Phase::MenuOpen => {}
            Phase::CountingDown(countdown) => {
                snapshot.remaining_seconds = Some(countdown.remaining);
                snapshot.started_at = Some(countdown.started_at);
                snapshot.alert_id = Some(countdown.alert_id);
                snapshot.trigger = Some(countdown.source.clone());
            }
            Phase::Dispatching(delivery) => {
                snapshot.started_at = Some(delivery.started_at);
                snapshot.alert_id = Some(delivery.record.id);
                snapshot.trigger = Some(delivery.source.clone());
                snapshot.dispatch_attempt = Some(delivery.attempt);
            }
            Phase::DispatchFailed { delivery, reason } => {
                snapshot.started_at = Some(delivery.started_at);
                snapshot.alert_id = Some(delivery.record.id);
                snapshot.trigger = Some(delivery.source.clone());
                snapshot.dispatch_attempt = Some(delivery.attempt);
                snapshot.dispatch_error = Some(reason.clone());
            }
            Phase::Acknowledged { delivery, receipt } => {
                snapshot.started_at = Some(delivery.started_at);
                snapshot.alert_id = Some(delivery.record.id);
                snapshot.trigger = Some(delivery.source.clone());
                snapshot.dispatch_attempt = Some(delivery.attempt);
                snapshot.receipt = Some(receipt.clone());
            }
        }
        snapshot
    }
}

/// Read-only view of the session handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSnapshot {
    pub state: AlertState,
    /// Present exactly while `state` is `CountingDown`.
    pub remaining_seconds: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub alert_id: Option<Uuid>,
    pub trigger: Option<TriggerSource>,
    pub recording: bool,
    pub dispatch_attempt: Option<u32>,
    /// Error from the failed attempt while a retry is pending.
    pub dispatch_error: Option<String>,
    pub receipt: Option<DispatchReceipt>,
    /// Why the last alert could not be delivered.
    pub last_failure: Option<String>,
}

impl Default for AlertSnapshot {
    fn default() -> Self {
        Self {
            state: AlertState::Idle,
            remaining_seconds: None,
            started_at: None,
            alert_id: None,
            trigger: None,
            recording: false,
            dispatch_attempt: None,
            dispatch_error: None,
            receipt: None,
            last_failure: None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
