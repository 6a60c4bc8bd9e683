//! Parser tests
//!
//! Drive the connection parser over in-memory duplex pipes: round trips
//! with acks, size-guard aborts, corrupt blocks, and both protocol
//! versions.

use std::sync::Arc;

use logship_protocol::{compressed_block, window_frame, Event, WindowBuilder, VERSION_2};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::common::InputMetrics;
use crate::{InputError, Parser};

/// Spawn a parser over one side of a duplex pipe
fn spawn_parser(
    capacity: usize,
) -> (
    DuplexStream,
    mpsc::Receiver<Event>,
    JoinHandle<crate::Result<()>>,
) {
    let (client, server) = tokio::io::duplex(1 << 16);
    let (tx, rx) = mpsc::channel(capacity);
    let metrics = Arc::new(InputMetrics::new());
    let task = tokio::spawn(Parser::new(server, "test-peer", tx, metrics).run());
    (client, rx, task)
}

#[tokio::test]
async fn test_round_trip_window_with_ack() {
    let (mut client, mut rx, task) = spawn_parser(256);

    const N: u32 = 20;
    let mut builder = WindowBuilder::new(5);
    for i in 0..N {
        let line = format!("msg-{i}");
        builder = builder.push(&[("host", "h"), ("file", "/f"), ("line", &line)]);
    }
    client.write_all(&builder.finish()).await.unwrap();

    // Events arrive in order with consecutive sequence numbers
    for i in 0..N {
        let event = rx.recv().await.expect("event");
        assert_eq!(event.line, u64::from(5 + i));
        assert_eq!(event.source, "lumberjack://h/f");
        assert_eq!(event.text.as_deref(), Some(format!("msg-{i}").as_str()));
    }

    // One ack carrying the highest seq in the block
    let mut ack = [0u8; 6];
    client.read_exact(&mut ack).await.unwrap();
    assert_eq!(&ack[..2], b"2A");
    assert_eq!(u32::from_be_bytes([ack[2], ack[3], ack[4], ack[5]]), 5 + N - 1);

    drop(client);
    task.await.unwrap().expect("clean EOF");
}

#[tokio::test]
async fn test_full_window_gets_exactly_one_ack() {
    let (mut client, mut rx, task) = spawn_parser(256);

    let mut builder = WindowBuilder::new(1);
    for i in 0..50 {
        let line = format!("l{i}");
        builder = builder.push(&[("line", &line)]);
    }
    client.write_all(&builder.finish()).await.unwrap();

    for _ in 0..50 {
        rx.recv().await.expect("event");
    }

    let mut ack = [0u8; 6];
    client.read_exact(&mut ack).await.unwrap();
    assert_eq!(&ack[..2], b"2A");
    assert_eq!(u32::from_be_bytes([ack[2], ack[3], ack[4], ack[5]]), 50);

    // Nothing else follows the single ack
    drop(client);
    task.await.unwrap().unwrap();
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_oversized_key_aborts_without_events() {
    let (mut client, mut rx, task) = spawn_parser(16);

    // Inner frame claiming a 150 MiB key
    let mut inner = Vec::new();
    inner.push(VERSION_2);
    inner.push(b'D');
    inner.extend_from_slice(&1u32.to_be_bytes());
    inner.extend_from_slice(&1u32.to_be_bytes());
    inner.extend_from_slice(&(150 * 1024 * 1024u32).to_be_bytes());

    let mut stream = Vec::new();
    stream.extend_from_slice(&window_frame(1));
    stream.extend_from_slice(&compressed_block(&inner));
    client.write_all(&stream).await.unwrap();

    let err = task.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("key exceeds max len"));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_truncated_zlib_aborts_without_events() {
    let (mut client, mut rx, task) = spawn_parser(16);

    let stream = WindowBuilder::new(1).push(&[("line", "x")]).finish();
    let payload = &stream[12..];
    let half = payload.len() / 2;

    let mut bad = Vec::new();
    bad.extend_from_slice(&stream[..6]); // window frame
    bad.push(VERSION_2);
    bad.push(b'C');
    bad.extend_from_slice(&(half as u32).to_be_bytes());
    bad.extend_from_slice(&payload[..half]);
    client.write_all(&bad).await.unwrap();
    drop(client);

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, InputError::Protocol(_)));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_json_frame_synthesis() {
    let (mut client, mut rx, task) = spawn_parser(16);

    let body = br#"{"host":"h","file":"/f","offset":42,"message":"hello"}"#;
    let stream = WindowBuilder::new(1).push_json(body).finish();
    client.write_all(&stream).await.unwrap();

    let event = rx.recv().await.expect("event");
    assert_eq!(event.source, "lumberjack://h/f");
    assert_eq!(event.offset, 42);
    assert_eq!(event.text.as_deref(), Some("hello"));

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_v1_block_gets_ackmsg() {
    let (mut client, mut rx, task) = spawn_parser(16);

    let mut stream = WindowBuilder::new(1).push(&[("line", "x")]).finish();
    stream[0] = b'1'; // window tag version
    stream[6] = b'1'; // compressed tag version
    client.write_all(&stream).await.unwrap();

    rx.recv().await.expect("event");

    let mut ack = [0u8; 6];
    client.read_exact(&mut ack).await.unwrap();
    assert_eq!(&ack, b"ACKMSG");

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unknown_outer_tag_aborts() {
    let (mut client, _rx, task) = spawn_parser(16);

    client.write_all(b"2Xtrailing").await.unwrap();

    let err = task.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("unknown frame type"));
}

#[tokio::test]
async fn test_multiple_windows_each_acked() {
    let (mut client, mut rx, task) = spawn_parser(64);

    for round in 0..3u32 {
        let first = round * 10 + 1;
        let mut builder = WindowBuilder::new(first);
        for i in 0..10 {
            let line = format!("r{round}-{i}");
            builder = builder.push(&[("line", &line)]);
        }
        client.write_all(&builder.finish()).await.unwrap();

        for _ in 0..10 {
            rx.recv().await.expect("event");
        }
        let mut ack = [0u8; 6];
        client.read_exact(&mut ack).await.unwrap();
        assert_eq!(
            u32::from_be_bytes([ack[2], ack[3], ack[4], ack[5]]),
            first + 9
        );
    }

    drop(client);
    task.await.unwrap().unwrap();
}
