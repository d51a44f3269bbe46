//! Core constants for the fingerprint sensor serial protocol.
//!
//! The sensor firmware speaks a small line-oriented ASCII protocol over a
//! serial link. The host writes one command per exchange and the firmware
//! answers with free-form diagnostic lines plus structured response lines.
//!
//! # Protocol Structure
//!
//! Outbound command (no delimiter, no trailing newline):
//!
//! ```text
//! <OPCODE>[PARAM]        e.g. E12, V, D5, C
//! ```
//!
//! Inbound response line:
//!
//! ```text
//! R,<kind>,<id>,<confidence>,<message...>
//! ```
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `R` | Response marker |
//! | `kind` | `S` success, `F` failure, `Y` ready, `R` report |
//! | `id` | Subject fingerprint id (or template count for `C`) |
//! | `confidence` | Match confidence reported by the sensor |
//! | `message` | Free text, may itself contain commas |
//!
//! Every other line is a diagnostic message (`Place finger to verify...`).
//!
//! # Usage
//!
//! ```
//! use fpgate_core::constants::*;
//!
//! assert_eq!(OPCODE_ENROLL, 'E');
//! assert!((MIN_FINGERPRINT_ID..=MAX_FINGERPRINT_ID).contains(&42));
//! ```

// ============================================================================
// Command Opcodes
// ============================================================================

/// Enroll a new fingerprint template at the given slot.
pub const OPCODE_ENROLL: char = 'E';

/// Capture a finger and search the template library.
pub const OPCODE_VERIFY: char = 'V';

/// Delete the template stored at the given slot.
pub const OPCODE_DELETE: char = 'D';

/// Ask the sensor for its stored template count.
pub const OPCODE_COUNT: char = 'C';

// ============================================================================
// Response Framing
// ============================================================================

/// First byte of every structured response line.
pub const RESPONSE_MARKER: u8 = b'R';

/// Separator between response fields.
pub const FIELD_SEPARATOR: char = ',';

/// Minimum number of comma separated fields in a response line.
///
/// `R`, kind, id, confidence and at least one message field.
pub const MIN_RESPONSE_FIELDS: usize = 5;

/// Kind letter: the command succeeded.
pub const KIND_SUCCESS: char = 'S';

/// Kind letter: the command failed.
pub const KIND_FAILURE: char = 'F';

/// Kind letter: the sensor is ready for the next command.
pub const KIND_READY: char = 'Y';

/// Kind letter: informational report (the firmware answers `C` with it).
pub const KIND_REPORT: char = 'R';

/// Line terminator used by the firmware (`println` adds `\r\n`).
pub const LINE_TERMINATOR: u8 = b'\n';

// ============================================================================
// Identifier Range
// ============================================================================

/// Lowest template slot accepted by the sensor.
pub const MIN_FINGERPRINT_ID: u8 = 1;

/// Highest template slot accepted by the sensor.
pub const MAX_FINGERPRINT_ID: u8 = 127;

/// Fingerprint id recorded for denied or unidentified accesses.
pub const UNKNOWN_FINGERPRINT_ID: i64 = 0;

/// Result of a template count that could not be obtained.
pub const COUNT_UNAVAILABLE: i32 = -1;

/// Display name used when a matched id has no stored identity.
pub const UNKNOWN_NAME: &str = "Unknown";

// ============================================================================
// Timing and Limits
// ============================================================================

/// Default time a command may take to be answered, in milliseconds.
///
/// Enrollment requires two finger placements, so the window is generous.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 10_000;

/// Idle interval of the background read loop, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Lines longer than this many bytes are discarded.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 256;

/// Default serial baud rate of the sensor board.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Delay after opening the port while the board resets, in milliseconds.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;

/// Default number of log entries returned by a recent-log listing.
pub const DEFAULT_RECENT_LOG_LIMIT: i64 = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcodes_are_distinct_ascii_letters() {
        let opcodes = [OPCODE_ENROLL, OPCODE_VERIFY, OPCODE_DELETE, OPCODE_COUNT];
        for (i, a) in opcodes.iter().enumerate() {
            assert!(a.is_ascii_uppercase());
            for b in &opcodes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_kind_letters_are_distinct() {
        let kinds = [KIND_SUCCESS, KIND_FAILURE, KIND_READY, KIND_REPORT];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_report_kind_matches_marker() {
        assert_eq!(KIND_REPORT as u8, RESPONSE_MARKER);
    }

    #[test]
    fn test_id_range() {
        assert!(MIN_FINGERPRINT_ID < MAX_FINGERPRINT_ID);
        assert_eq!(UNKNOWN_FINGERPRINT_ID, 0);
    }
}
