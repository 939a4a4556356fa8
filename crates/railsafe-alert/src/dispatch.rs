//! Alert dispatch.
//!
//! A [`Dispatcher`] delivers one alert record to responders. The orchestrator
//! owns retries; a dispatcher only reports how a single attempt went.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use railsafe_core::types::{AlertRecord, ContactKind, EmergencyContact, Timestamp};

use crate::error::DispatchError;

/// What a successful dispatch did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub location_shared: bool,
    pub contacts_notified: Vec<String>,
    pub recording_started: bool,
    pub police_alerted: bool,
    pub dispatched_at: Timestamp,
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Deliver `record`. Called again with the same record on retry.
    async fn dispatch(&self, record: &AlertRecord) -> Result<DispatchReceipt, DispatchError>;
}

/// Dispatcher that pretends to reach every configured contact.
///
/// No network or telephony is involved. `failing_first` makes the first
/// attempts fail so the retry path can be exercised.
pub struct SimulatedDispatcher {
    contacts: Vec<EmergencyContact>,
    latency: Duration,
    failures_left: AtomicU32,
}

impl SimulatedDispatcher {
    pub fn new(contacts: Vec<EmergencyContact>) -> Self {
        Self {
            contacts,
            latency: Duration::ZERO,
            failures_left: AtomicU32::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next `attempts` dispatches with `Unreachable`.
    pub fn failing_first(self, attempts: u32) -> Self {
        self.failures_left.store(attempts, Ordering::SeqCst);
        self
    }

    fn take_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Dispatcher for SimulatedDispatcher {
    async fn dispatch(&self, record: &AlertRecord) -> Result<DispatchReceipt, DispatchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.take_failure() {
            tracing::warn!(alert_id = %record.id, "Simulated dispatch failure");
            return Err(DispatchError::Unreachable(
                "simulated network outage".to_string(),
            ));
        }

        if self.contacts.is_empty() {
            tracing::warn!(alert_id = %record.id, "No emergency contacts to notify");
            return Err(DispatchError::Rejected(
                "no emergency contacts configured".to_string(),
            ));
        }

        let police_alerted = self.contacts.iter().any(|c| {
            matches!(
                c.kind,
                ContactKind::RailwayPolice | ContactKind::EmergencyServices
            )
        });
        let contacts_notified: Vec<String> =
            self.contacts.iter().map(|c| c.name.clone()).collect();

        tracing::info!(
            alert_id = %record.id,
            category = %record.category,
            location = %record.location,
            contacts = contacts_notified.len(),
            "Alert dispatched (simulated)"
        );

        Ok(DispatchReceipt {
            location_shared: !record.location.is_empty(),
            contacts_notified,
            recording_started: true,
            police_alerted,
            dispatched_at: Timestamp::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railsafe_core::types::{
        default_contacts, AlertCategory, ContactPriority, ResolutionStatus,
    };
    use uuid::Uuid;

    fn make_record() -> AlertRecord {
        AlertRecord {
            id: Uuid::new_v4(),
            category: AlertCategory::Panic,
            location: "Coach B4".to_string(),
            occurred_at: Timestamp::now(),
            resolution_status: ResolutionStatus::Active,
            responder: "RPF".to_string(),
        }
    }

    #[tokio::test]
    async fn test_simulated_dispatch_receipt() {
        let dispatcher = SimulatedDispatcher::new(default_contacts());
        let receipt = dispatcher.dispatch(&make_record()).await.unwrap();

        assert!(receipt.location_shared);
        assert!(receipt.recording_started);
        assert!(receipt.police_alerted);
        assert_eq!(receipt.contacts_notified.len(), 4);
        assert_eq!(receipt.contacts_notified[0], "Railway Police");
    }

    #[tokio::test]
    async fn test_no_police_contact() {
        let contacts = vec![EmergencyContact::new(
            "Ambulance",
            "108",
            ContactKind::Ambulance,
            ContactPriority::Primary,
        )];
        let dispatcher = SimulatedDispatcher::new(contacts);
        let receipt = dispatcher.dispatch(&make_record()).await.unwrap();
        assert!(!receipt.police_alerted);
        assert_eq!(receipt.contacts_notified, vec!["Ambulance"]);
    }

    #[tokio::test]
    async fn test_failing_first_then_succeeds() {
        let dispatcher = SimulatedDispatcher::new(default_contacts()).failing_first(2);
        let record = make_record();

        assert!(matches!(
            dispatcher.dispatch(&record).await,
            Err(DispatchError::Unreachable(_))
        ));
        assert!(dispatcher.dispatch(&record).await.is_err());
        assert!(dispatcher.dispatch(&record).await.is_ok());
        assert!(dispatcher.dispatch(&record).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_contacts_is_rejected() {
        let dispatcher = SimulatedDispatcher::new(Vec::new());
        let err = dispatcher.dispatch(&make_record()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Rejected(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let dispatcher =
            SimulatedDispatcher::new(default_contacts()).with_latency(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        dispatcher.dispatch(&make_record()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
