use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AlertRecord, ContactKind, Timestamp, TriggerSource};

/// All domain events that can occur in the Railsafe system.
///
/// Events are published by the alert orchestrator and the voice listener
/// after state changes and consumed by:
/// - The presentation layer (toasts, banners, call sheets)
/// - The application log
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DomainEvent {
    // =========================================================================
    // Alert Lifecycle Events
    // =========================================================================
    /// A countdown began for a new alert.
    AlertTriggered {
        alert_id: Uuid,
        source: TriggerSource,
        countdown_secs: u32,
        timestamp: Timestamp,
    },

    /// One second of the countdown elapsed.
    CountdownTicked {
        alert_id: Uuid,
        remaining_secs: u32,
        timestamp: Timestamp,
    },

    /// The rider cancelled during the countdown.
    AlertCancelled {
        alert_id: Uuid,
        remaining_secs: u32,
        timestamp: Timestamp,
    },

    /// The alert reached responders.
    AlertDispatched {
        record: AlertRecord,
        attempts: u32,
        timestamp: Timestamp,
    },

    /// One dispatch attempt failed; another may follow.
    DispatchAttemptFailed {
        alert_id: Uuid,
        attempt: u32,
        reason: String,
        timestamp: Timestamp,
    },

    /// Every dispatch attempt failed. The rider must be told.
    AlertUndeliverable {
        record: AlertRecord,
        attempts: u32,
        reason: String,
        timestamp: Timestamp,
    },

    /// The acknowledgment screen closed (dismissed or timed out).
    AlertAcknowledged {
        alert_id: Uuid,
        dismissed_by_user: bool,
        timestamp: Timestamp,
    },

    /// The rider asked to call a helpline from the emergency menu.
    ContactCallRequested {
        kind: ContactKind,
        name: String,
        number: String,
        timestamp: Timestamp,
    },

    // =========================================================================
    // Voice Listener Events
    // =========================================================================
    /// A trigger phrase was heard.
    KeywordDetected {
        phrase: String,
        transcript: String,
        timestamp: Timestamp,
    },

    /// The recognition stream started.
    ListenerStarted { locale: String, timestamp: Timestamp },

    /// The recognition stream stopped.
    ListenerStopped { reason: String, timestamp: Timestamp },
}

impl DomainEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            DomainEvent::AlertTriggered { timestamp, .. }
            | DomainEvent::CountdownTicked { timestamp, .. }
            | DomainEvent::AlertCancelled { timestamp, .. }
            | DomainEvent::AlertDispatched { timestamp, .. }
            | DomainEvent::DispatchAttemptFailed { timestamp, .. }
            | DomainEvent::AlertUndeliverable { timestamp, .. }
            | DomainEvent::AlertAcknowledged { timestamp, .. }
            | DomainEvent::ContactCallRequested { timestamp, .. }
            | DomainEvent::KeywordDetected { timestamp, .. }
            | DomainEvent::ListenerStarted { timestamp, .. }
            | DomainEvent::ListenerStopped { timestamp, .. } => *timestamp,
        }
    }

    /// Returns a human-readable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            DomainEvent::AlertTriggered { .. } => "alert_triggered",
            DomainEvent::CountdownTicked { .. } => "countdown_ticked",
            DomainEvent::AlertCancelled { .. } => "alert_cancelled",
            DomainEvent::AlertDispatched { .. } => "alert_dispatched",
            DomainEvent::DispatchAttemptFailed { .. } => "dispatch_attempt_failed",
            DomainEvent::AlertUndeliverable { .. } => "alert_undeliverable",
            DomainEvent::AlertAcknowledged { .. } => "alert_acknowledged",
            DomainEvent::ContactCallRequested { .. } => "contact_call_requested",
            DomainEvent::KeywordDetected { .. } => "keyword_detected",
            DomainEvent::ListenerStarted { .. } => "listener_started",
            DomainEvent::ListenerStopped { .. } => "listener_stopped",
        }
    }
}
