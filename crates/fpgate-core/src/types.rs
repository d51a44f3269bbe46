use crate::{
    Result,
    constants::{MAX_FINGERPRINT_ID, MIN_FINGERPRINT_ID},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Template slot on the sensor (1-127).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct FingerprintId(u8);

impl FingerprintId {
    /// Create a new fingerprint id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidFingerprintId` if the id is outside the valid range (1-127).
    pub fn new(id: i64) -> Result<Self> {
        if !(i64::from(MIN_FINGERPRINT_ID)..=i64::from(MAX_FINGERPRINT_ID)).contains(&id) {
            return Err(Error::InvalidFingerprintId { id });
        }
        Ok(FingerprintId(id as u8))
    }

    /// Get the raw id as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Get the id widened for storage.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        i64::from(self.0)
    }
}

impl fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for FingerprintId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id: i64 = s.trim().parse().map_err(|_| Error::InvalidFingerprintIdText {
            text: s.to_string(),
        })?;
        FingerprintId::new(id)
    }
}

impl TryFrom<i64> for FingerprintId {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        FingerprintId::new(value)
    }
}

impl From<FingerprintId> for i64 {
    fn from(id: FingerprintId) -> Self {
        id.as_i64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1)]
    #[case(42)]
    #[case(127)]
    fn test_valid_ids(#[case] raw: i64) {
        let id = FingerprintId::new(raw).unwrap();
        assert_eq!(id.as_i64(), raw);
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(128)]
    #[case(1000)]
    fn test_invalid_ids(#[case] raw: i64) {
        let err = FingerprintId::new(raw).unwrap_err();
        assert!(matches!(err, Error::InvalidFingerprintId { id } if id == raw));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("12".parse::<FingerprintId>().unwrap().as_u8(), 12);
        assert_eq!(" 7 ".parse::<FingerprintId>().unwrap().as_u8(), 7);
        assert!(matches!(
            "abc".parse::<FingerprintId>(),
            Err(Error::InvalidFingerprintIdText { .. })
        ));
        assert!("200".parse::<FingerprintId>().is_err());
    }

    #[test]
    fn test_display_has_no_padding() {
        assert_eq!(FingerprintId::new(5).unwrap().to_string(), "5");
    }

    #[test]
    fn test_ordering_follows_slot_number() {
        let a = FingerprintId::new(3).unwrap();
        let b = FingerprintId::new(90).unwrap();
        assert!(a < b);
    }
}
