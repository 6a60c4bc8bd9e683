//! WebSocket output - live event broadcaster
//!
//! Accepts WebSocket connections and pushes each event's payload as a text
//! message. A client may narrow the stream to one origin with a
//! `?source=<source>` query on the handshake URI. Like the tcp output,
//! every client is its own subscriber.

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::common::{run_unrouted, Binding, OutputMetrics};
use crate::{OutputError, Result};

/// WebSocket output configuration
#[derive(Debug, Clone)]
pub struct WebsocketConfig {
    /// Listen address, `<addr:port>`
    pub host: String,
}

/// WebSocket broadcaster output
pub struct WebsocketOutput {
    name: String,
    config: WebsocketConfig,
    binding: Option<Binding>,
    metrics: Arc<OutputMetrics>,
}

impl WebsocketOutput {
    /// Create a websocket output; `binding` is `None` when no route
    /// selected it
    pub fn new(name: impl Into<String>, config: WebsocketConfig, binding: Option<Binding>) -> Self {
        Self {
            name: name.into(),
            config,
            binding,
            metrics: Arc::new(OutputMetrics::new()),
        }
    }

    /// Shared metrics for this output
    pub fn metrics(&self) -> Arc<OutputMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Listen and serve until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Some(binding) = self.binding else {
            run_unrouted(&self.name, "websocket", cancel).await;
            return Ok(());
        };

        let listener =
            TcpListener::bind(&self.config.host)
                .await
                .map_err(|e| OutputError::Bind {
                    address: self.config.host.clone(),
                    source: e,
                })?;

        tracing::info!(
            output = %self.name,
            address = %self.config.host,
            input = %binding.route.input,
            "websocket output listening"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = listener.accept() => match result {
                    Ok((stream, peer)) => {
                        let binding = binding.clone();
                        let name = self.name.clone();
                        let metrics = Arc::clone(&self.metrics);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                serve_client(&name, binding, stream, peer.to_string(), &metrics, cancel)
                                    .await
                            {
                                metrics.error();
                                tracing::debug!(output = %name, peer = %peer, error = %e, "websocket client error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(output = %self.name, error = %e, "accept error");
                        self.metrics.error();
                    }
                },
            }
        }

        tracing::info!(output = %self.name, "websocket output stopped");
        Ok(())
    }
}

/// Handshake one client, subscribe it, and stream events until it closes
async fn serve_client(
    output: &str,
    binding: Binding,
    stream: TcpStream,
    peer: String,
    metrics: &Arc<OutputMetrics>,
    cancel: CancellationToken,
) -> Result<()> {
    // The handshake callback is the only place the request URI is visible
    let source_filter = Arc::new(Mutex::new(None::<String>));
    let filter_slot = Arc::clone(&source_filter);
    let callback = move |req: &Request, resp: Response| {
        let filter = req.uri().query().and_then(source_filter_from_query);
        *filter_slot.lock().expect("filter slot poisoned") = filter;
        Ok(resp)
    };

    let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    let source_filter = source_filter.lock().expect("filter slot poisoned").take();
    let (mut sink, mut from_client) = ws.split();

    tracing::info!(
        output = %output,
        peer = %peer,
        source = source_filter.as_deref().unwrap_or("*"),
        "accepting websocket connection"
    );

    let subscriber = format!("{output}/{peer}");
    let mut rx = binding.subscribe(&subscriber).await?;

    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            // Drain client frames so close handshakes are noticed
            incoming = from_client.next() => match incoming {
                Some(Ok(_)) => continue,
                Some(Err(e)) => break Err(OutputError::Websocket(e)),
                None => break Ok(()),
            },
            event = rx.recv() => {
                let Some(event) = event else { break Ok(()) };
                metrics.event_received();

                if !binding.accepts(&event) {
                    metrics.event_filtered();
                    continue;
                }
                if let Some(ref wanted) = source_filter {
                    if event.source != *wanted {
                        metrics.event_filtered();
                        continue;
                    }
                }
                let Some(payload) = event.text_or_json() else {
                    metrics.event_filtered();
                    continue;
                };

                if let Err(e) = sink.send(Message::Text(payload.into())).await {
                    break Err(OutputError::Websocket(e));
                }
                metrics.event_written();
            }
        }
    };

    binding.unsubscribe(&subscriber).await;
    tracing::info!(output = %output, peer = %peer, "closing websocket connection");
    result
}

/// Pull the `source` parameter out of a handshake query string
fn source_filter_from_query(query: &str) -> Option<String> {
    query
        .split('&')
        .find_map(|kv| kv.strip_prefix("source="))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
