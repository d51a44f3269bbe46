//! Tokio codec for the sensor line protocol.
//!
//! The sensor writes newline terminated ASCII lines and reads bare commands.
//! `SensorLineCodec` implements:
//! - [`Decoder`]: splits the inbound byte stream into lines and runs each
//!   through [`parse_line`], yielding a [`ParseOutcome`] per non-blank line
//! - [`Encoder<Command>`]: writes the opcode and optional parameter
//!
//! # Architecture
//!
//! ```text
//! Serial bytes -> Decoder -> ParseOutcome (Event | Discard)
//! Command -> Encoder -> Serial bytes ("E12", "V", ...)
//! ```
//!
//! # Length Bound
//!
//! A line longer than `max_line_length` bytes is never buffered in full.
//! Once the bound is crossed the codec drops what it holds, skips input up
//! to the next terminator and yields a single
//! [`DiscardReason::TooLong`] for the whole line. A malfunctioning sensor
//! that never prints a newline therefore cannot grow the buffer without
//! limit.

use bytes::BytesMut;
use fpgate_core::constants::{DEFAULT_MAX_LINE_LENGTH, LINE_TERMINATOR};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::event::{DiscardReason, ParseOutcome};
use crate::{Command, parse_line};

/// Line codec for sensor traffic.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use tokio_util::codec::Decoder;
/// use fpgate_protocol::{Event, ParseOutcome, SensorLineCodec};
///
/// let mut codec = SensorLineCodec::new();
/// let mut buffer = BytesMut::from(&b"Image taken\r\nR,Y,0,0,Ready for next command\r\n"[..]);
///
/// let first = codec.decode(&mut buffer).unwrap();
/// assert!(matches!(first, Some(ParseOutcome::Event(Event::InfoMessage { .. }))));
///
/// let second = codec.decode(&mut buffer).unwrap();
/// assert!(matches!(second, Some(ParseOutcome::Event(Event::Response(_)))));
/// ```
#[derive(Debug, Clone)]
pub struct SensorLineCodec {
    /// Lines longer than this many bytes are discarded.
    max_line_length: usize,

    /// Where to resume the terminator search in the buffer.
    next_index: usize,

    /// Set while skipping the rest of an over-long line.
    discarding: bool,

    /// Bytes of the current over-long line already dropped.
    discarded_len: usize,
}

impl SensorLineCodec {
    /// Create a new codec with the default line bound.
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a new codec with a custom line bound.
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
            discarding: false,
            discarded_len: 0,
        }
    }

    /// Get the current line bound.
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    fn finish_discard(&mut self, tail_len: usize) -> ParseOutcome {
        let length = self.discarded_len + tail_len;
        self.discarding = false;
        self.discarded_len = 0;
        ParseOutcome::Discard(DiscardReason::TooLong { length })
    }
}

impl Default for SensorLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SensorLineCodec {
    type Item = ParseOutcome;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        loop {
            let search_from = self.next_index.min(src.len());
            let Some(offset) = src[search_from..]
                .iter()
                .position(|&b| b == LINE_TERMINATOR)
            else {
                if src.len() > self.max_line_length {
                    self.discarded_len += src.len();
                    self.discarding = true;
                    src.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let end = search_from + offset;
            let line = src.split_to(end + 1);
            self.next_index = 0;

            if self.discarding {
                return Ok(Some(self.finish_discard(end)));
            }

            let body = &line[..end];
            if body.len() > self.max_line_length {
                return Ok(Some(ParseOutcome::Discard(DiscardReason::TooLong {
                    length: body.len(),
                })));
            }

            if body.trim_ascii().is_empty() {
                continue;
            }

            return Ok(Some(parse_line(body)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        if let Some(outcome) = self.decode(src)? {
            return Ok(Some(outcome));
        }

        if self.discarding {
            let tail = src.len();
            src.clear();
            return Ok(Some(self.finish_discard(tail)));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let rest = src.split();
        self.next_index = 0;
        if rest.trim_ascii().is_empty() {
            return Ok(None);
        }
        Ok(Some(parse_line(&rest)))
    }
}

impl Encoder<Command> for SensorLineCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> io::Result<()> {
        dst.extend_from_slice(item.encode().as_bytes());
        Ok(())
    }
}
