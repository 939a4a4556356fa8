use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Category of an emergency alert as shown in the history view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    /// Panic button pressed by the rider.
    Panic,
    /// Distress keyword heard by the voice listener.
    VoiceDistress,
    /// Harassment report.
    Harassment,
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCategory::Panic => write!(f, "panic"),
            AlertCategory::VoiceDistress => write!(f, "voice_distress"),
            AlertCategory::Harassment => write!(f, "harassment"),
        }
    }
}

/// Resolution status of a recorded alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Alert delivered; responders engaged.
    Active,
    /// Responders closed the incident.
    Resolved,
    /// Delivery failed after all retries.
    Failed,
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStatus::Active => write!(f, "active"),
            ResolutionStatus::Resolved => write!(f, "resolved"),
            ResolutionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What started an alert session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum TriggerSource {
    /// The rider pressed the panic button.
    Manual,
    /// The voice listener matched a trigger phrase.
    Voice { phrase: String },
}

impl TriggerSource {
    /// The history category an alert started from this source is filed under.
    pub fn category(&self) -> AlertCategory {
        match self {
            TriggerSource::Manual => AlertCategory::Panic,
            TriggerSource::Voice { .. } => AlertCategory::VoiceDistress,
        }
    }
}

/// Which helpline an emergency contact reaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    RailwayPolice,
    WomenHelpline,
    EmergencyServices,
    Ambulance,
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactKind::RailwayPolice => write!(f, "railway_police"),
            ContactKind::WomenHelpline => write!(f, "women_helpline"),
            ContactKind::EmergencyServices => write!(f, "emergency_services"),
            ContactKind::Ambulance => write!(f, "ambulance"),
        }
    }
}

impl std::str::FromStr for ContactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "police" | "railway_police" => Ok(ContactKind::RailwayPolice),
            "women" | "women_helpline" => Ok(ContactKind::WomenHelpline),
            "emergency" | "emergency_services" => Ok(ContactKind::EmergencyServices),
            "ambulance" => Ok(ContactKind::Ambulance),
            other => Err(format!("unknown contact kind: {}", other)),
        }
    }
}

/// Display priority of an emergency contact. Primary contacts sort first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactPriority {
    Primary,
    #[default]
    Secondary,
}

// =============================================================================
// Newtype Wrappers - Temporal
// =============================================================================

/// Unix timestamp in seconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }

    /// Seconds elapsed between this timestamp and now. Never negative.
    pub fn age_secs(&self) -> u64 {
        (Timestamp::now().0 - self.0).max(0) as u64
    }
}

// =============================================================================
// Structs
// =============================================================================

/// One delivered (or undeliverable) emergency alert.
///
/// Immutable once created: the history log only ever appends these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub category: AlertCategory,
    /// Human-readable location, e.g. "Coach B4, Train 12951".
    pub location: String,
    pub occurred_at: Timestamp,
    pub resolution_status: ResolutionStatus,
    /// Team that received the alert, e.g. "RPF Team Delhi".
    pub responder: String,
}

/// Static emergency contact reference data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub number: String,
    pub kind: ContactKind,
    #[serde(default)]
    pub priority: ContactPriority,
}

impl EmergencyContact {
    pub fn new(name: &str, number: &str, kind: ContactKind, priority: ContactPriority) -> Self {
        Self {
            name: name.to_string(),
            number: number.to_string(),
            kind,
            priority,
        }
    }
}

/// The built-in helpline directory, primary contact first.
pub fn default_contacts() -> Vec<EmergencyContact> {
    vec![
        EmergencyContact::new(
            "Railway Police",
            "139",
            ContactKind::RailwayPolice,
            ContactPriority::Primary,
        ),
        EmergencyContact::new(
            "Women Helpline",
            "1091",
            ContactKind::WomenHelpline,
            ContactPriority::Secondary,
        ),
        EmergencyContact::new(
            "Emergency Services",
            "112",
            ContactKind::EmergencyServices,
            ContactPriority::Secondary,
        ),
        EmergencyContact::new(
            "Ambulance",
            "108",
            ContactKind::Ambulance,
            ContactPriority::Secondary,
        ),
    ]
}

/// Sample history shown by the demo dashboard, oldest first, relative to `now`.
pub fn demo_alerts(now: Timestamp) -> Vec<AlertRecord> {
    vec![
        AlertRecord {
            id: Uuid::new_v4(),
            category: AlertCategory::Harassment,
            location: "Platform 3, New Delhi".to_string(),
            occurred_at: Timestamp(now.0 - 15 * 60),
            resolution_status: ResolutionStatus::Resolved,
            responder: "Station Security".to_string(),
        },
        AlertRecord {
            id: Uuid::new_v4(),
            category: AlertCategory::Panic,
            location: "Coach B4, Train 12951".to_string(),
            occurred_at: Timestamp(now.0 - 2 * 60),
            resolution_status: ResolutionStatus::Active,
            responder: "RPF Team Delhi".to_string(),
        },
    ]
}

/// Look up the contact for `kind`, preferring primary entries.
pub fn find_contact(contacts: &[EmergencyContact], kind: ContactKind) -> Option<&EmergencyContact> {
    contacts
        .iter()
        .filter(|c| c.kind == kind)
        .min_by_key(|c| c.priority)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_roundtrip_datetime() {
        let now = Utc::now();
        let ts = Timestamp::from_datetime(now);
        assert_eq!(ts.to_datetime().timestamp(), now.timestamp());
    }

    #[test]
    fn test_timestamp_age_never_negative() {
        let future = Timestamp(Timestamp::now().0 + 3600);
        assert_eq!(future.age_secs(), 0);

        let past = Timestamp(Timestamp::now().0 - 120);
        assert!(past.age_secs() >= 120);
    }

    #[test]
    fn test_trigger_source_category() {
        assert_eq!(TriggerSource::Manual.category(), AlertCategory::Panic);
        let voice = TriggerSource::Voice {
            phrase: "bachao".to_string(),
        };
        assert_eq!(voice.category(), AlertCategory::VoiceDistress);
    }

    #[test]
    fn test_category_and_status_display() {
        assert_eq!(AlertCategory::Panic.to_string(), "panic");
        assert_eq!(AlertCategory::VoiceDistress.to_string(), "voice_distress");
        assert_eq!(ResolutionStatus::Active.to_string(), "active");
        assert_eq!(ResolutionStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_contact_kind_parse() {
        assert_eq!("police".parse::<ContactKind>(), Ok(ContactKind::RailwayPolice));
        assert_eq!(" Women ".parse::<ContactKind>(), Ok(ContactKind::WomenHelpline));
        assert_eq!("ambulance".parse::<ContactKind>(), Ok(ContactKind::Ambulance));
        assert!("firebrigade".parse::<ContactKind>().is_err());
    }

    #[test]
    fn test_default_contacts() {
        let contacts = default_contacts();
        assert_eq!(contacts.len(), 4);
        assert_eq!(contacts[0].name, "Railway Police");
        assert_eq!(contacts[0].number, "139");
        assert_eq!(contacts[0].priority, ContactPriority::Primary);
        assert!(contacts[1..]
            .iter()
            .all(|c| c.priority == ContactPriority::Secondary));
    }

    #[test]
    fn test_find_contact_prefers_primary() {
        let mut contacts = default_contacts();
        contacts.push(EmergencyContact::new(
            "Zonal RPF Desk",
            "182",
            ContactKind::RailwayPolice,
            ContactPriority::Secondary,
        ));
        let found = find_contact(&contacts, ContactKind::RailwayPolice).unwrap();
        assert_eq!(found.number, "139");
        assert_eq!(
            find_contact(&contacts, ContactKind::Ambulance).unwrap().number,
            "108"
        );
        assert!(find_contact(&[], ContactKind::Ambulance).is_none());
    }

    #[test]
    fn test_demo_alerts_oldest_first() {
        let now = Timestamp(1_700_000_000);
        let alerts = demo_alerts(now);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].category, AlertCategory::Harassment);
        assert_eq!(alerts[0].resolution_status, ResolutionStatus::Resolved);
        assert_eq!(alerts[0].occurred_at, Timestamp(now.0 - 900));
        assert_eq!(alerts[1].category, AlertCategory::Panic);
        assert_eq!(alerts[1].resolution_status, ResolutionStatus::Active);
        assert!(alerts[0].occurred_at < alerts[1].occurred_at);
    }

    #[test]
    fn test_alert_record_serialization() {
        let record = AlertRecord {
            id: Uuid::new_v4(),
            category: AlertCategory::Harassment,
            location: "Platform 3, New Delhi".to_string(),
            occurred_at: Timestamp::now(),
            resolution_status: ResolutionStatus::Resolved,
            responder: "Station Security".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"harassment\""));
        assert!(json.contains("\"resolved\""));
        let rt: AlertRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rt, record);
    }
}
