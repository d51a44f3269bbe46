//! Property-based tests for the sensor line protocol.
//!
//! These tests use proptest to throw arbitrary and structured input at the
//! frame parser and the line codec and check that the parsing rules hold
//! for every input, not just the handful of firmware strings we know.

use bytes::BytesMut;
use fpgate_core::FingerprintId;
use proptest::prelude::*;
use tokio_util::codec::Decoder;

use fpgate_protocol::{
    Command, DiscardReason, Event, ParseOutcome, Response, ResponseKind, SensorLineCodec,
    parse_line,
};

/// Strategy for the four response kinds.
fn response_kind() -> impl Strategy<Value = ResponseKind> {
    prop_oneof![
        Just(ResponseKind::Success),
        Just(ResponseKind::Failure),
        Just(ResponseKind::Ready),
        Just(ResponseKind::Report),
    ]
}

/// Strategy for message text as the firmware prints it: printable, may
/// contain commas, no line breaks, no surrounding whitespace.
fn message_text() -> impl Strategy<Value = String> {
    prop::string::string_regex("([A-Za-z0-9#.,!-]([A-Za-z0-9 #.,!-]{0,40}[A-Za-z0-9#.,!-])?)?")
        .expect("Failed to create message regex strategy")
}

/// Strategy for diagnostic lines that do not start with the response marker.
fn info_text() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-QS-Za-z0-9][A-Za-z0-9 .,#!-]{0,60}")
        .expect("Failed to create info regex strategy")
}

/// Strategy for a stream of well-formed sensor lines.
fn sensor_stream() -> impl Strategy<Value = Vec<String>> {
    let line = prop_oneof![
        info_text(),
        (response_kind(), -200i32..200, 0i32..300, message_text())
            .prop_map(|(k, id, c, m)| Response::new(k, id, c, m).to_line()),
    ];
    prop::collection::vec(line, 1..12)
}

fn decode_all(codec: &mut SensorLineCodec, buffer: &mut BytesMut) -> Vec<ParseOutcome> {
    let mut out = Vec::new();
    while let Some(outcome) = codec.decode(buffer).expect("decode never errors") {
        out.push(outcome);
    }
    out
}

proptest! {
    /// Property: The parser accepts any byte sequence without panicking.
    #[test]
    fn prop_parse_line_never_panics(raw in prop::collection::vec(any::<u8>(), 0..300)) {
        let _ = parse_line(&raw);
    }

    /// Property: A well-formed response line yields exactly the fields it carries.
    #[test]
    fn prop_response_fields_preserved(
        kind in response_kind(),
        id in any::<i32>(),
        confidence in any::<i32>(),
        message in message_text(),
    ) {
        let line = format!("R,{},{},{},{}\r", kind.as_char(), id, confidence, message);
        let outcome = parse_line(line.as_bytes());
        prop_assert_eq!(
            outcome,
            ParseOutcome::Event(Event::Response(Response::new(kind, id, confidence, message)))
        );
    }

    /// Property: A line without the response marker is always an info message.
    #[test]
    fn prop_non_marker_lines_are_info(text in info_text()) {
        match parse_line(text.as_bytes()) {
            ParseOutcome::Event(Event::InfoMessage { text: parsed }) => {
                prop_assert_eq!(parsed, text.trim());
            }
            other => prop_assert!(false, "Expected info message, got {:?}", other),
        }
    }

    /// Property: A marker line with fewer than five fields is discarded.
    #[test]
    fn prop_short_marker_lines_are_discarded(
        fields in prop::collection::vec("[A-Za-z0-9]{0,6}", 0..4),
    ) {
        let mut line = String::from("R");
        for field in &fields {
            line.push(',');
            line.push_str(field);
        }
        let is_too_few_fields = matches!(
            parse_line(line.as_bytes()),
            ParseOutcome::Discard(DiscardReason::TooFewFields { .. })
        );
        prop_assert!(is_too_few_fields);
    }

    /// Property: Decoding is independent of how the stream is chunked.
    #[test]
    fn prop_chunking_does_not_change_outcomes(
        lines in sensor_stream(),
        split in any::<prop::sample::Index>(),
    ) {
        let stream: String = lines.iter().map(|l| format!("{l}\r\n")).collect();
        let bytes = stream.as_bytes();

        let mut whole_codec = SensorLineCodec::new();
        let mut whole = BytesMut::from(bytes);
        let expected = decode_all(&mut whole_codec, &mut whole);

        let at = split.index(bytes.len() + 1);
        let mut chunked_codec = SensorLineCodec::new();
        let mut buffer = BytesMut::from(&bytes[..at]);
        let mut actual = decode_all(&mut chunked_codec, &mut buffer);
        buffer.extend_from_slice(&bytes[at..]);
        actual.extend(decode_all(&mut chunked_codec, &mut buffer));

        prop_assert_eq!(actual.len(), lines.len());
        prop_assert_eq!(actual, expected);
    }

    /// Property: Slot commands encode as opcode plus the decimal id.
    #[test]
    fn prop_slot_commands_encode_decimal(raw in 1i64..=127) {
        let id = FingerprintId::new(raw).expect("id in range");
        prop_assert_eq!(Command::Enroll(id).encode(), format!("E{raw}"));
        prop_assert_eq!(Command::Delete(id).encode(), format!("D{raw}"));
    }
}
