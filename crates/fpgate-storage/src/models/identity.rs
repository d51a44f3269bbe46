use chrono::{DateTime, Utc};
use fpgate_core::FingerprintId;
use serde::{Deserialize, Serialize};

/// A person whose template occupies a sensor slot.
///
/// Maps to the `enrolled_identities` table. The primary key is the sensor
/// slot number, so a row exists only for slots the sensor confirmed as
/// enrolled.
///
/// # Examples
///
/// ```
/// use fpgate_storage::models::EnrolledIdentity;
/// use fpgate_core::FingerprintId;
/// use chrono::Utc;
///
/// let identity = EnrolledIdentity::new(FingerprintId::new(12).unwrap(), "Ana", Utc::now());
///
/// assert_eq!(identity.id, 12);
/// assert_eq!(identity.registered_at, identity.last_access_at);
/// assert_eq!(identity.fingerprint_id().unwrap().as_u8(), 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EnrolledIdentity {
    /// Sensor slot, 1-127
    pub id: i64,

    /// Display name
    pub name: String,

    /// When the enrollment was confirmed
    pub registered_at: DateTime<Utc>,

    /// Last successful verify, initially equal to `registered_at`
    pub last_access_at: DateTime<Utc>,
}

impl EnrolledIdentity {
    /// Identity freshly enrolled at `now`.
    pub fn new(id: FingerprintId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.as_i64(),
            name: name.into(),
            registered_at: now,
            last_access_at: now,
        }
    }

    /// The stored id as a validated slot number.
    pub fn fingerprint_id(&self) -> fpgate_core::Result<FingerprintId> {
        FingerprintId::new(self.id)
    }
}
