use chrono::{DateTime, Utc};
use fpgate_core::constants::UNKNOWN_NAME;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome recorded in an access log entry.
///
/// Stored as text in the `status` column.
///
/// # Examples
///
/// ```
/// use fpgate_storage::models::AccessStatus;
///
/// assert_eq!(AccessStatus::AccessGranted.as_str(), "ACCESS_GRANTED");
/// assert_eq!("DELETED".parse::<AccessStatus>(), Ok(AccessStatus::Deleted));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessStatus {
    AccessGranted,
    AccessDenied,
    Deleted,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessGranted => "ACCESS_GRANTED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCESS_GRANTED" => Ok(Self::AccessGranted),
            "ACCESS_DENIED" => Ok(Self::AccessDenied),
            "DELETED" => Ok(Self::Deleted),
            other => Err(format!("unknown access status: {other}")),
        }
    }
}

/// One row of the audit trail, joined with the identity name.
///
/// # Fields
///
/// * `log_id` - Auto-increment primary key
/// * `fingerprint_id` - Sensor slot, `0` for denied attempts
/// * `name` - Name of the identity currently holding the slot, or `"Unknown"`
/// * `timestamp` - When the outcome was recorded
/// * `confidence` - Match confidence reported by the sensor, `0` otherwise
/// * `status` - `ACCESS_GRANTED`, `ACCESS_DENIED` or `DELETED`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessLogEntry {
    pub log_id: i64,
    pub fingerprint_id: i64,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: i32,
    pub status: String,
}

impl AccessLogEntry {
    /// Parsed status, `None` if the column holds something unexpected.
    pub fn access_status(&self) -> Option<AccessStatus> {
        self.status.parse().ok()
    }

    pub fn was_granted(&self) -> bool {
        self.access_status() == Some(AccessStatus::AccessGranted)
    }

    /// Whether no enrolled identity holds the slot any more.
    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AccessStatus::AccessGranted, "ACCESS_GRANTED")]
    #[case(AccessStatus::AccessDenied, "ACCESS_DENIED")]
    #[case(AccessStatus::Deleted, "DELETED")]
    fn test_status_text(#[case] status: AccessStatus, #[case] text: &str) {
        assert_eq!(status.as_str(), text);
        assert_eq!(status.to_string(), text);
        assert_eq!(text.parse::<AccessStatus>(), Ok(status));
    }

    #[test]
    fn test_unknown_status_text() {
        assert!("GRANTED".parse::<AccessStatus>().is_err());
    }

    #[test]
    fn test_entry_helpers() {
        let entry = AccessLogEntry {
            log_id: 1,
            fingerprint_id: 0,
            name: "Unknown".to_string(),
            timestamp: Utc::now(),
            confidence: 0,
            status: "ACCESS_DENIED".to_string(),
        };
        assert_eq!(entry.access_status(), Some(AccessStatus::AccessDenied));
        assert!(!entry.was_granted());
        assert!(entry.is_unknown());
    }
}
