//! Outbound sensor commands.
//!
//! A command is a single ASCII opcode letter, optionally followed by the
//! decimal template slot it applies to. There is no delimiter and no
//! trailing newline: the firmware reads the opcode byte and then parses an
//! integer from whatever follows.
//!
//! | Command | Wire |
//! |---------|------|
//! | `Enroll(12)` | `E12` |
//! | `Verify` | `V` |
//! | `Delete(5)` | `D5` |
//! | `Count` | `C` |

use fpgate_core::FingerprintId;
use fpgate_core::constants::{OPCODE_COUNT, OPCODE_DELETE, OPCODE_ENROLL, OPCODE_VERIFY};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A command the host can issue to the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Capture a finger twice and store the model at the slot.
    Enroll(FingerprintId),

    /// Capture a finger and search the template library.
    Verify,

    /// Remove the model stored at the slot.
    Delete(FingerprintId),

    /// Report how many templates the sensor holds.
    Count,
}

impl Command {
    /// Opcode letter sent on the wire.
    pub fn opcode(&self) -> char {
        match self {
            Command::Enroll(_) => OPCODE_ENROLL,
            Command::Verify => OPCODE_VERIFY,
            Command::Delete(_) => OPCODE_DELETE,
            Command::Count => OPCODE_COUNT,
        }
    }

    /// Template slot parameter, if the command takes one.
    pub fn param(&self) -> Option<FingerprintId> {
        match self {
            Command::Enroll(id) | Command::Delete(id) => Some(*id),
            Command::Verify | Command::Count => None,
        }
    }

    /// Encode the command into its wire representation.
    ///
    /// # Example
    ///
    /// ```
    /// use fpgate_core::FingerprintId;
    /// use fpgate_protocol::Command;
    ///
    /// let id = FingerprintId::new(12).unwrap();
    /// assert_eq!(Command::Enroll(id).encode(), "E12");
    /// assert_eq!(Command::Verify.encode(), "V");
    /// ```
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Short lowercase operation name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Enroll(_) => "enroll",
            Command::Verify => "verify",
            Command::Delete(_) => "delete",
            Command::Count => "count",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.param() {
            Some(id) => write!(f, "{}{}", self.opcode(), id),
            None => write!(f, "{}", self.opcode()),
        }
    }
}
