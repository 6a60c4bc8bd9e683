//! S3 output - object-storage gzip batcher
//!
//! Appends event payloads to an in-memory gzip stream and uploads one
//! object per flush interval to an S3-compatible endpoint
//! (`PUT <endpoint>/<bucket>/<key>`). Upload failures retry a fixed
//! number of times before the object is dropped; spooling continues
//! regardless.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio_util::sync::CancellationToken;

use crate::common::{run_unrouted, Binding, OutputMetrics};
use crate::{OutputError, Result, FLUSH_RETRIES};

/// Delay between upload attempts
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// S3 output configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3-compatible endpoint, e.g. `http://127.0.0.1:9000`
    pub endpoint: String,

    /// Bucket name
    pub bucket: String,

    /// Key prefix for uploaded objects
    pub prefix: String,

    /// Interval between uploads
    pub flush_interval: Duration,
}

/// Object-storage batcher output
pub struct S3Output {
    name: String,
    config: S3Config,
    binding: Option<Binding>,
    client: reqwest::Client,
    metrics: Arc<OutputMetrics>,
}

impl S3Output {
    /// Create an s3 output; `binding` is `None` when no route selected it
    pub fn new(name: impl Into<String>, config: S3Config, binding: Option<Binding>) -> Self {
        Self {
            name: name.into(),
            config,
            binding,
            client: reqwest::Client::new(),
            metrics: Arc::new(OutputMetrics::new()),
        }
    }

    /// Shared metrics for this output
    pub fn metrics(&self) -> Arc<OutputMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Spool and upload until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Some(ref binding) = self.binding else {
            run_unrouted(&self.name, "s3", cancel).await;
            return Ok(());
        };

        let mut rx = binding.subscribe(&self.name).await?;
        tracing::info!(
            output = %self.name,
            endpoint = %self.config.endpoint,
            bucket = %self.config.bucket,
            input = %binding.route.input,
            "s3 output started"
        );

        let mut spool = Spool::new();
        let mut object_seq: u64 = 0;
        let mut tick = tokio::time::interval(self.config.flush_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => self.upload(&mut spool, &mut object_seq).await,
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    self.metrics.event_received();

                    if !binding.accepts(&event) {
                        self.metrics.event_filtered();
                        continue;
                    }
                    let Some(payload) = event.text_or_json() else {
                        self.metrics.event_filtered();
                        continue;
                    };
                    spool.append(&payload);
                }
            }
        }

        self.upload(&mut spool, &mut object_seq).await;
        binding.unsubscribe(&self.name).await;
        tracing::info!(output = %self.name, "s3 output stopped");
        Ok(())
    }

    /// Upload the spooled object, retrying before dropping it
    async fn upload(&self, spool: &mut Spool, object_seq: &mut u64) {
        let Some((body, events)) = spool.take() else {
            return;
        };

        let key = object_key(&self.config.prefix, *object_seq);
        *object_seq += 1;
        let url = format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket,
            key
        );
        tracing::debug!(output = %self.name, key = %key, events, bytes = body.len(), "uploading object");

        for attempt in 0..FLUSH_RETRIES {
            match self.put_object(&url, body.clone()).await {
                Ok(()) => {
                    self.metrics.batch_flushed();
                    for _ in 0..events {
                        self.metrics.event_written();
                    }
                    return;
                }
                Err(e) => {
                    self.metrics.error();
                    tracing::warn!(
                        output = %self.name,
                        key = %key,
                        attempt = attempt + 1,
                        error = %e,
                        "object upload failed"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }

        tracing::error!(output = %self.name, key = %key, events, "dropping object after retries");
    }

    /// One `PUT` of a finished gzip object
    async fn put_object(&self, url: &str, body: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .put(url)
            .header("content-type", "application/gzip")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OutputError::BulkRejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// In-memory gzip spool
struct Spool {
    encoder: GzEncoder<Vec<u8>>,
    events: usize,
}

impl Spool {
    fn new() -> Self {
        Self {
            encoder: GzEncoder::new(Vec::new(), Compression::default()),
            events: 0,
        }
    }

    /// Append one payload line
    fn append(&mut self, payload: &str) {
        // Writes into a Vec cannot fail
        let _ = self.encoder.write_all(payload.as_bytes());
        let _ = self.encoder.write_all(b"\n");
        self.events += 1;
    }

    /// Finish the stream and hand back the object, or `None` when empty
    fn take(&mut self) -> Option<(Vec<u8>, usize)> {
        if self.events == 0 {
            return None;
        }
        let events = self.events;
        let done = std::mem::replace(
            self,
            Self {
                encoder: GzEncoder::new(Vec::new(), Compression::default()),
                events: 0,
            },
        );
        let body = done.encoder.finish().unwrap_or_default();
        Some((body, events))
    }
}

/// Timestamped object key, `<prefix><UTC stamp>-<seq>.gz`
fn object_key(prefix: &str, seq: u64) -> String {
    format!("{}{}-{}.gz", prefix, Utc::now().format("%Y%m%dT%H%M%S"), seq)
}
