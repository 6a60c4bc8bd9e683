//! End-to-end pipeline tests
//!
//! Drive a full in-process server from configuration: Lumberjack frames
//! in over a socket, lines out of tcp sinks. Covers fan-out, slow-sink
//! isolation, field filtering, acks, and graceful stop.

use std::str::FromStr;
use std::time::Duration;

use logship::{Registry, RunningServer, Server};
use logship_config::Config;
use logship_protocol::WindowBuilder;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Start a server from a TOML snippet
async fn start_server(toml: &str) -> RunningServer {
    let config = Config::from_str(toml).expect("valid config");
    Server::new(config, Registry::builtin())
        .start()
        .await
        .expect("server starts")
}

/// Connect with retries while a listener is still binding
async fn connect(port: u16) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on {port}");
}

/// Connect a sink client and give its subscription a moment to register
async fn connect_sink(port: u16) -> BufReader<TcpStream> {
    let stream = connect(port).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    BufReader::new(stream)
}

/// A filebeat-style agent speaking Lumberjack v2
struct Agent {
    stream: TcpStream,
}

impl Agent {
    async fn connect(port: u16) -> Self {
        Self {
            stream: connect(port).await,
        }
    }

    /// Send one window of events and consume the ack
    ///
    /// Each event carries host/file plus `line` and any extra pairs.
    /// Returns the acked sequence number.
    async fn send_window(
        &mut self,
        first_seq: u32,
        lines: &[String],
        extra: &[(&str, &str)],
    ) -> u32 {
        let mut builder = WindowBuilder::new(first_seq);
        for line in lines {
            let mut pairs: Vec<(&str, &str)> =
                vec![("host", "h"), ("file", "/f"), ("line", line)];
            pairs.extend_from_slice(extra);
            builder = builder.push(&pairs);
        }
        self.stream
            .write_all(&builder.finish())
            .await
            .expect("window written");

        let mut ack = [0u8; 6];
        timeout(Duration::from_secs(10), self.stream.read_exact(&mut ack))
            .await
            .expect("ack in time")
            .expect("ack read");
        assert_eq!(&ack[..2], b"2A");
        u32::from_be_bytes([ack[2], ack[3], ack[4], ack[5]])
    }
}

fn numbered_lines(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("msg-{i}")).collect()
}

#[tokio::test]
async fn test_filebeat_to_tcp_delivers_all_lines() {
    let server = start_server(
        r#"
[[inputs]]
name = "beats"
type = "filebeat"
host = "127.0.0.1:52301"

[[outputs]]
name = "sink"
type = "tcp"
host = "127.0.0.1:52302"

[[routes]]
name = "beats-to-sink"
input = "beats"
output = "sink"
"#,
    )
    .await;

    let sink = connect_sink(52302).await;
    let mut agent = Agent::connect(52301).await;

    let lines = numbered_lines(1000);
    for (chunk, start) in lines.chunks(250).zip((1u32..).step_by(250)) {
        agent.send_window(start, chunk, &[]).await;
    }

    let mut received = sink.lines();
    for i in 0..1000 {
        let line = timeout(Duration::from_secs(10), received.next_line())
            .await
            .expect("line in time")
            .unwrap()
            .expect("line");
        assert_eq!(line, format!("lumberjack://h/f msg-{i}"));
    }

    timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("clean shutdown");
}

#[tokio::test]
async fn test_fan_out_to_two_sinks() {
    let server = start_server(
        r#"
[[inputs]]
name = "beats"
type = "filebeat"
host = "127.0.0.1:52311"

[[outputs]]
name = "sink-a"
type = "tcp"
host = "127.0.0.1:52312"

[[outputs]]
name = "sink-b"
type = "tcp"
host = "127.0.0.1:52313"

[[routes]]
name = "to-a"
input = "beats"
output = "sink-a"

[[routes]]
name = "to-b"
input = "beats"
output = "sink-b"
"#,
    )
    .await;

    let mut sink_a = connect_sink(52312).await.lines();
    let mut sink_b = connect_sink(52313).await.lines();
    let mut agent = Agent::connect(52311).await;

    let lines = numbered_lines(1000);
    for (chunk, start) in lines.chunks(200).zip((1u32..).step_by(200)) {
        agent.send_window(start, chunk, &[]).await;
    }

    for i in 0..1000 {
        let expected = format!("lumberjack://h/f msg-{i}");
        let a = timeout(Duration::from_secs(10), sink_a.next_line())
            .await
            .expect("sink-a line in time")
            .unwrap()
            .expect("sink-a line");
        let b = timeout(Duration::from_secs(10), sink_b.next_line())
            .await
            .expect("sink-b line in time")
            .unwrap()
            .expect("sink-b line");
        assert_eq!(a, expected);
        assert_eq!(b, expected);
    }

    timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("clean shutdown");
}

#[tokio::test]
async fn test_slow_sink_does_not_starve_fast_sink() {
    let server = start_server(
        r#"
[[inputs]]
name = "beats"
type = "filebeat"
host = "127.0.0.1:52321"

[[outputs]]
name = "fast"
type = "tcp"
host = "127.0.0.1:52322"

[[outputs]]
name = "slow"
type = "tcp"
host = "127.0.0.1:52323"

[[routes]]
name = "to-fast"
input = "beats"
output = "fast"

[[routes]]
name = "to-slow"
input = "beats"
output = "slow"
"#,
    )
    .await;

    const N: usize = 10_000;

    let fast = connect_sink(52322).await;
    // The slow sink connects but never reads during the flood
    let slow = connect_sink(52323).await;

    // Count the fast sink's lines concurrently with the flood
    let fast_reader = tokio::spawn(async move {
        let mut lines = fast.lines();
        let mut count = 0usize;
        while count < N {
            match lines.next_line().await {
                Ok(Some(_)) => count += 1,
                _ => break,
            }
        }
        count
    });

    let mut agent = Agent::connect(52321).await;
    let lines = numbered_lines(N);
    for (chunk, start) in lines.chunks(500).zip((1u32..).step_by(500)) {
        agent.send_window(start, chunk, &[]).await;
    }

    // The producer finished all windows (acks flowed), and the fast sink
    // sees every event despite its stalled peer
    let fast_count = timeout(Duration::from_secs(30), fast_reader)
        .await
        .expect("fast sink drained in time")
        .expect("reader task");
    assert_eq!(fast_count, N);

    // The slow sink still holds at least its channel's worth of events
    let mut slow_count = 0usize;
    let mut slow_lines = slow.lines();
    while let Ok(Ok(Some(_))) =
        timeout(Duration::from_millis(200), slow_lines.next_line()).await
    {
        slow_count += 1;
    }
    assert!(
        slow_count >= 100,
        "slow sink received {slow_count} events, expected at least its queue capacity"
    );

    timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("clean shutdown");
}

#[tokio::test]
async fn test_field_filter_selects_matching_events() {
    let server = start_server(
        r#"
[[inputs]]
name = "beats"
type = "filebeat"
host = "127.0.0.1:52331"

[[outputs]]
name = "sink"
type = "tcp"
host = "127.0.0.1:52332"

[[routes]]
name = "access-only"
input = "beats"
output = "sink"
[routes.rules]
type = "access"
"#,
    )
    .await;

    let mut sink = connect_sink(52332).await.lines();
    let mut agent = Agent::connect(52331).await;

    // Alternate access and error events, one window each
    let mut seq = 1;
    for i in 0..500 {
        let access = vec![format!("acc-{i}")];
        let error = vec![format!("err-{i}")];
        agent
            .send_window(seq, &access, &[("type", "access")])
            .await;
        agent
            .send_window(seq + 1, &error, &[("type", "error")])
            .await;
        seq += 2;
    }

    // Only the access half arrives
    for i in 0..500 {
        let line = timeout(Duration::from_secs(10), sink.next_line())
            .await
            .expect("line in time")
            .unwrap()
            .expect("line");
        assert_eq!(line, format!("lumberjack://h/f acc-{i}"));
    }

    timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("clean shutdown");
}

#[tokio::test]
async fn test_graceful_stop_while_events_flow() {
    let server = start_server(
        r#"
[[inputs]]
name = "beats"
type = "filebeat"
host = "127.0.0.1:52341"

[[outputs]]
name = "sink"
type = "tcp"
host = "127.0.0.1:52342"

[[routes]]
name = "beats-to-sink"
input = "beats"
output = "sink"
"#,
    )
    .await;

    let _sink = connect_sink(52342).await;

    // Keep shipping in the background until the server goes away
    let flood = tokio::spawn(async move {
        let mut agent = Agent::connect(52341).await;
        let lines = numbered_lines(100);
        let mut seq = 1u32;
        loop {
            let mut builder = WindowBuilder::new(seq);
            for line in &lines {
                builder = builder.push(&[("host", "h"), ("file", "/f"), ("line", line)]);
            }
            if agent.stream.write_all(&builder.finish()).await.is_err() {
                break;
            }
            let mut ack = [0u8; 6];
            if agent.stream.read_exact(&mut ack).await.is_err() {
                break;
            }
            seq += 100;
        }
    });

    tokio::time::sleep(Duration::from_millis(300)).await;

    // Stop order is inputs, outputs, buffers; everything joins in bounds
    timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("graceful stop within bound");

    timeout(Duration::from_secs(5), flood)
        .await
        .expect("agent task ends once the listener is gone")
        .expect("agent task did not panic");
}

#[tokio::test]
async fn test_full_window_acked_once_with_final_seq() {
    let server = start_server(
        r#"
[[inputs]]
name = "beats"
type = "filebeat"
host = "127.0.0.1:52351"

[[outputs]]
name = "sink"
type = "tcp"
host = "127.0.0.1:52352"

[[routes]]
name = "beats-to-sink"
input = "beats"
output = "sink"
"#,
    )
    .await;

    let mut agent = Agent::connect(52351).await;
    let acked = agent.send_window(1, &numbered_lines(50), &[]).await;
    assert_eq!(acked, 50);

    // No second ack follows
    let mut extra = [0u8; 1];
    assert!(
        timeout(Duration::from_millis(300), agent.stream.read_exact(&mut extra))
            .await
            .is_err()
    );

    timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("clean shutdown");
}

#[tokio::test]
async fn test_bind_conflict_surfaces_as_fatal_failure() {
    // Occupy the port before the server starts
    let blocker = tokio::net::TcpListener::bind("127.0.0.1:52361")
        .await
        .expect("test listener");

    let server = start_server(
        r#"
[[inputs]]
name = "beats"
type = "filebeat"
host = "127.0.0.1:52361"

[[outputs]]
name = "sink"
type = "tcp"
host = "127.0.0.1:52362"

[[routes]]
name = "beats-to-sink"
input = "beats"
output = "sink"
"#,
    )
    .await;

    let result = timeout(Duration::from_secs(5), server.run_until_signal())
        .await
        .expect("failure surfaces in time");
    assert!(result.is_err());

    drop(blocker);
}
