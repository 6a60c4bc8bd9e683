//! Window decoder tests
//!
//! Round-trips through the encoder in `encode`, plus hand-crafted frames
//! for the guard and corruption paths.

use serde_json::Value;

use crate::{
    compressed_block, data_frame, decompress_block, ProtocolError, WindowBuilder, WindowDecoder,
    VERSION_2,
};

/// Strip the `2C` header from an encoded block and inflate it
fn inflate(stream: &[u8]) -> Vec<u8> {
    assert_eq!(&stream[..2], b"2C");
    let plen = u32::from_be_bytes([stream[2], stream[3], stream[4], stream[5]]) as usize;
    assert_eq!(stream.len(), 6 + plen);
    decompress_block(&stream[6..]).expect("inflate")
}

#[test]
fn test_decode_data_frames_in_order() {
    let mut inner = Vec::new();
    for i in 0..5u32 {
        let line = format!("msg-{i}");
        inner.extend_from_slice(&data_frame(
            10 + i,
            &[("host", "web-1"), ("file", "/var/log/app"), ("line", &line)],
        ));
    }
    let block = inflate(&compressed_block(&inner));

    let mut decoder = WindowDecoder::new(&block, 5);
    for i in 0..5u64 {
        let event = decoder.next_event().expect("decode").expect("event");
        assert_eq!(event.source, "lumberjack://web-1/var/log/app");
        assert_eq!(event.line, 10 + i);
        assert_eq!(event.text.as_deref(), Some(format!("msg-{i}").as_str()));
    }
    assert!(decoder.next_event().expect("decode").is_none());
    assert_eq!(decoder.max_seq(), 14);
}

#[test]
fn test_decode_inserts_timestamp_when_absent() {
    let inner = data_frame(1, &[("host", "h"), ("file", "/f"), ("line", "x")]);
    let mut decoder = WindowDecoder::new(&inner, 1);
    let event = decoder.next_event().unwrap().unwrap();

    let ts = event.field_str("timestamp").expect("timestamp field");
    // RFC3339 with nanosecond precision
    assert!(ts.contains('T'));
    assert!(ts.ends_with('Z'));
}

#[test]
fn test_decode_keeps_agent_timestamp() {
    let inner = data_frame(1, &[("timestamp", "2024-01-01T00:00:00Z"), ("line", "x")]);
    let mut decoder = WindowDecoder::new(&inner, 1);
    let event = decoder.next_event().unwrap().unwrap();

    assert_eq!(event.field_str("timestamp"), Some("2024-01-01T00:00:00Z"));
}

#[test]
fn test_decode_offset_parse_failure_is_zero() {
    let inner = data_frame(1, &[("offset", "not-a-number"), ("line", "x")]);
    let mut decoder = WindowDecoder::new(&inner, 1);
    let event = decoder.next_event().unwrap().unwrap();
    assert_eq!(event.offset, 0);

    let inner = data_frame(2, &[("offset", "4096"), ("line", "x")]);
    let mut decoder = WindowDecoder::new(&inner, 1);
    let event = decoder.next_event().unwrap().unwrap();
    assert_eq!(event.offset, 4096);
}

#[test]
fn test_decode_json_frame() {
    let body = br#"{"host":"h","file":"/f","offset":42,"message":"hello"}"#;
    let stream = WindowBuilder::new(7).push_json(body).finish();
    let block = inflate(&stream[6..]);

    let mut decoder = WindowDecoder::new(&block, 1);
    let event = decoder.next_event().unwrap().unwrap();

    assert_eq!(event.source, "lumberjack://h/f");
    assert_eq!(event.offset, 42);
    assert_eq!(event.line, 7);
    assert_eq!(event.text.as_deref(), Some("hello"));
    assert_eq!(decoder.max_seq(), 7);
}

#[test]
fn test_decode_json_keeps_number_precision() {
    let body = br#"{"offset":9007199254740993,"message":"m"}"#;
    let frame = crate::json_frame(1, body);
    let mut decoder = WindowDecoder::new(&frame, 1);
    let event = decoder.next_event().unwrap().unwrap();

    // 2^53 + 1 survives the round-trip untouched
    assert_eq!(event.offset, 9_007_199_254_740_993);
    match event.fields.get("offset") {
        Some(Value::Number(n)) => assert_eq!(n.to_string(), "9007199254740993"),
        other => panic!("expected number, got {other:?}"),
    }
}

#[test]
fn test_key_size_guard_aborts() {
    // Frame header claiming a 150 MiB key with no body behind it
    let mut inner = Vec::new();
    inner.push(VERSION_2);
    inner.push(b'D');
    inner.extend_from_slice(&1u32.to_be_bytes()); // seq
    inner.extend_from_slice(&1u32.to_be_bytes()); // count
    inner.extend_from_slice(&(150 * 1024 * 1024u32).to_be_bytes()); // klen

    let mut decoder = WindowDecoder::new(&inner, 1);
    let err = decoder.next_event().unwrap_err();
    assert!(matches!(err, ProtocolError::KeyTooLong(_)));
    assert!(err.to_string().contains("key exceeds max len"));
}

#[test]
fn test_value_size_guard_aborts() {
    let mut inner = Vec::new();
    inner.push(VERSION_2);
    inner.push(b'D');
    inner.extend_from_slice(&1u32.to_be_bytes());
    inner.extend_from_slice(&1u32.to_be_bytes());
    inner.extend_from_slice(&1u32.to_be_bytes()); // klen = 1
    inner.push(b'k');
    inner.extend_from_slice(&(251 * 1024 * 1024u32).to_be_bytes()); // vlen

    let mut decoder = WindowDecoder::new(&inner, 1);
    let err = decoder.next_event().unwrap_err();
    assert!(matches!(err, ProtocolError::ValueTooLong(_)));
}

#[test]
fn test_unknown_frame_tag_aborts() {
    let inner = [VERSION_2, b'X', 0, 0, 0, 1];
    let mut decoder = WindowDecoder::new(&inner, 1);
    assert!(matches!(
        decoder.next_event().unwrap_err(),
        ProtocolError::UnknownFrame(b'2', b'X')
    ));
}

#[test]
fn test_truncated_block_aborts() {
    // Window announces two frames but the block holds one
    let inner = data_frame(1, &[("line", "only")]);
    let mut decoder = WindowDecoder::new(&inner, 2);

    assert!(decoder.next_event().unwrap().is_some());
    assert!(matches!(
        decoder.next_event().unwrap_err(),
        ProtocolError::Truncated(_)
    ));
}

#[test]
fn test_corrupted_zlib_payload_yields_no_events() {
    let stream = WindowBuilder::new(1).push(&[("line", "x")]).finish();
    let block = &stream[6..];
    let plen = u32::from_be_bytes([block[2], block[3], block[4], block[5]]) as usize;

    // Drop the trailing half of the compressed payload
    let truncated = &block[6..6 + plen / 2];
    let err = decompress_block(truncated).unwrap_err();
    assert!(matches!(err, ProtocolError::Decompress(_)));
}

#[test]
fn test_v1_data_frame_accepted() {
    let mut inner = data_frame(3, &[("host", "h"), ("file", "/f"), ("line", "v1")]);
    inner[0] = b'1';

    let mut decoder = WindowDecoder::new(&inner, 1);
    let event = decoder.next_event().unwrap().unwrap();
    assert_eq!(event.text.as_deref(), Some("v1"));
    assert_eq!(event.line, 3);
}
