//! Typed inbound events produced from sensor output lines.

use fpgate_core::constants::{KIND_FAILURE, KIND_READY, KIND_REPORT, KIND_SUCCESS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome class of a response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// `S`: the command succeeded.
    Success,
    /// `F`: the command failed.
    Failure,
    /// `Y`: the sensor will accept the next command.
    Ready,
    /// `R`: informational answer (template count).
    Report,
}

impl ResponseKind {
    /// Map a kind letter to its variant.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            KIND_SUCCESS => Some(ResponseKind::Success),
            KIND_FAILURE => Some(ResponseKind::Failure),
            KIND_READY => Some(ResponseKind::Ready),
            KIND_REPORT => Some(ResponseKind::Report),
            _ => None,
        }
    }

    /// Kind letter used on the wire.
    pub fn as_char(self) -> char {
        match self {
            ResponseKind::Success => KIND_SUCCESS,
            ResponseKind::Failure => KIND_FAILURE,
            ResponseKind::Ready => KIND_READY,
            ResponseKind::Report => KIND_REPORT,
        }
    }

    #[inline]
    pub fn is_ready(self) -> bool {
        matches!(self, ResponseKind::Ready)
    }

    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, ResponseKind::Success)
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseKind::Success => write!(f, "Success"),
            ResponseKind::Failure => write!(f, "Failure"),
            ResponseKind::Ready => write!(f, "Ready"),
            ResponseKind::Report => write!(f, "Report"),
        }
    }
}

/// A structured `R,<kind>,<id>,<confidence>,<message>` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub kind: ResponseKind,

    /// Fingerprint id the response refers to, or the template count for `C`.
    pub subject_id: i32,

    /// Match confidence; `0` for everything but a successful verify.
    pub confidence: i32,

    /// Free text, commas preserved.
    pub message: String,
}

impl Response {
    pub fn new(
        kind: ResponseKind,
        subject_id: i32,
        confidence: i32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            subject_id,
            confidence,
            message: message.into(),
        }
    }

    /// Render the response back into its wire line (without terminator).
    pub fn to_line(&self) -> String {
        format!(
            "R,{},{},{},{}",
            self.kind.as_char(),
            self.subject_id,
            self.confidence,
            self.message
        )
    }
}

/// One parsed line of sensor output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Response(Response),
    InfoMessage { text: String },
}

/// Why a line was dropped instead of becoming an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscardReason {
    /// Response marker present but fewer than five fields.
    TooFewFields { line: String, fields: usize },
    /// Kind field is not one of the known letters.
    UnknownKind { line: String },
    /// Id or confidence field is not a base-10 integer.
    BadNumber { line: String },
    /// Line exceeded the configured length bound.
    TooLong { length: usize },
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::TooFewFields { line, fields } => {
                write!(f, "response with {fields} fields: {line:?}")
            }
            DiscardReason::UnknownKind { line } => write!(f, "unknown response kind: {line:?}"),
            DiscardReason::BadNumber { line } => write!(f, "non-numeric id/confidence: {line:?}"),
            DiscardReason::TooLong { length } => write!(f, "line of {length} bytes exceeds bound"),
        }
    }
}

/// Result of feeding one line to the frame parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Event(Event),
    Discard(DiscardReason),
}

impl ParseOutcome {
    /// The event, if the line produced one.
    pub fn into_event(self) -> Option<Event> {
        match self {
            ParseOutcome::Event(event) => Some(event),
            ParseOutcome::Discard(_) => None,
        }
    }
}
