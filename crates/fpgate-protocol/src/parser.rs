//! Frame parser: one line of sensor output in, one [`ParseOutcome`] out.
//!
//! # Rules
//!
//! - A line whose first byte is the response marker `R` is a response
//!   candidate. It must split into at least five comma separated fields:
//!   `R`, kind, id, confidence, message. Everything after the fourth comma is
//!   the message, commas included.
//! - The kind field must be exactly one of `S`, `F`, `Y`, `R`.
//! - Id and confidence must parse as base-10 integers.
//! - Any candidate violating these rules is discarded, never propagated.
//! - Every other line is an [`Event::InfoMessage`] carrying the text.
//!
//! Note that a diagnostic line that merely starts with `R` (the firmware
//! prints `Remove finger` during enrollment) is a response candidate with a
//! single field and is therefore discarded.

use fpgate_core::constants::{FIELD_SEPARATOR, MIN_RESPONSE_FIELDS, RESPONSE_MARKER};

use crate::event::{DiscardReason, Event, ParseOutcome, Response, ResponseKind};

/// Parse one line (without its terminator) into an event or a discard.
///
/// Trailing `\r` and surrounding whitespace are ignored. Invalid UTF-8 is
/// replaced lossily.
///
/// # Example
///
/// ```
/// use fpgate_protocol::{parse_line, Event, ParseOutcome, Response, ResponseKind};
///
/// let outcome = parse_line(b"R,S,42,0,enrolled\r");
/// assert_eq!(
///     outcome,
///     ParseOutcome::Event(Event::Response(Response::new(ResponseKind::Success, 42, 0, "enrolled")))
/// );
/// ```
pub fn parse_line(raw: &[u8]) -> ParseOutcome {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();

    if line.as_bytes().first() == Some(&RESPONSE_MARKER) {
        return parse_response(line);
    }

    ParseOutcome::Event(Event::InfoMessage {
        text: line.to_string(),
    })
}

fn parse_response(line: &str) -> ParseOutcome {
    let fields: Vec<&str> = line.splitn(MIN_RESPONSE_FIELDS, FIELD_SEPARATOR).collect();
    if fields.len() < MIN_RESPONSE_FIELDS {
        return ParseOutcome::Discard(DiscardReason::TooFewFields {
            line: line.to_string(),
            fields: fields.len(),
        });
    }

    let mut kind_chars = fields[1].trim().chars();
    let kind = match (kind_chars.next(), kind_chars.next()) {
        (Some(c), None) => ResponseKind::from_char(c),
        _ => None,
    };
    let Some(kind) = kind else {
        return ParseOutcome::Discard(DiscardReason::UnknownKind {
            line: line.to_string(),
        });
    };

    let (Ok(subject_id), Ok(confidence)) = (
        fields[2].trim().parse::<i32>(),
        fields[3].trim().parse::<i32>(),
    ) else {
        return ParseOutcome::Discard(DiscardReason::BadNumber {
            line: line.to_string(),
        });
    };

    ParseOutcome::Event(Event::Response(Response {
        kind,
        subject_id,
        confidence,
        message: fields[4].to_string(),
    }))
}
