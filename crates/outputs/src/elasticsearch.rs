//! Elasticsearch output - bulk indexer
//!
//! Buffers index actions and flushes them to `/_bulk` when the batch
//! fills or the flush timer fires. A failing flush is retried a fixed
//! number of times across the configured hosts, then the batch is dropped
//! with an error log.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use logship_protocol::Event;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::common::{run_unrouted, Binding, OutputMetrics};
use crate::{OutputError, Result, BATCH_SIZE, FLUSH_RETRIES};

/// Delay between flush attempts
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Elasticsearch output configuration
#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    /// Cluster base URLs
    pub hosts: Vec<String>,

    /// Index name prefix; the UTC date is appended per day
    pub index_prefix: String,

    /// Flush interval for partial batches
    pub flush_interval: Duration,
}

/// Search-cluster bulk indexer output
pub struct ElasticsearchOutput {
    name: String,
    config: ElasticsearchConfig,
    binding: Option<Binding>,
    client: reqwest::Client,
    metrics: Arc<OutputMetrics>,
}

/// Accumulates newline-delimited bulk actions
struct BulkBuffer {
    body: String,
    events: usize,
}

impl BulkBuffer {
    fn new() -> Self {
        Self {
            body: String::new(),
            events: 0,
        }
    }

    /// Append one index action and its document
    fn append(&mut self, index: &str, doc: &Value) {
        self.body
            .push_str(&format!("{{\"index\":{{\"_index\":\"{index}\"}}}}\n"));
        self.body.push_str(&doc.to_string());
        self.body.push('\n');
        self.events += 1;
    }

    fn is_empty(&self) -> bool {
        self.events == 0
    }

    fn take(&mut self) -> (String, usize) {
        let events = self.events;
        self.events = 0;
        (std::mem::take(&mut self.body), events)
    }
}

impl ElasticsearchOutput {
    /// Create an elasticsearch output; `binding` is `None` when no route
    /// selected it
    pub fn new(
        name: impl Into<String>,
        config: ElasticsearchConfig,
        binding: Option<Binding>,
    ) -> Self {
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

    /// Consume events and bulk-index until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Some(ref binding) = self.binding else {
            run_unrouted(&self.name, "elasticsearch", cancel).await;
            return Ok(());
        };

        let mut rx = binding.subscribe(&self.name).await?;
        tracing::info!(
            output = %self.name,
            hosts = ?self.config.hosts,
            input = %binding.route.input,
            "elasticsearch output started"
        );

        let mut bulk = BulkBuffer::new();
        let mut tick = tokio::time::interval(self.config.flush_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => self.flush(&mut bulk).await,
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    self.metrics.event_received();

                    if !binding.accepts(&event) {
                        self.metrics.event_filtered();
                        continue;
                    }

                    let index = index_name(&self.config.index_prefix);
                    bulk.append(&index, &index_document(&event));
                    if bulk.events >= BATCH_SIZE {
                        self.flush(&mut bulk).await;
                    }
                }
            }
        }

        // Drain what the route already accepted
        self.flush(&mut bulk).await;
        binding.unsubscribe(&self.name).await;
        tracing::info!(output = %self.name, "elasticsearch output stopped");
        Ok(())
    }

    /// Send the buffered actions, retrying across hosts before dropping
    async fn flush(&self, bulk: &mut BulkBuffer) {
        if bulk.is_empty() {
            return;
        }
        let (body, events) = bulk.take();
        tracing::debug!(output = %self.name, events, "flushing to elasticsearch");

        for attempt in 0..FLUSH_RETRIES {
            let host = &self.config.hosts[attempt as usize % self.config.hosts.len()];
            match self.bulk_send(host, body.clone()).await {
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
                        host = %host,
                        attempt = attempt + 1,
                        error = %e,
                        "bulk index failed"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }

        tracing::error!(output = %self.name, events, "dropping batch after retries");
    }

    /// One `/_bulk` request
    async fn bulk_send(&self, host: &str, body: String) -> Result<()> {
        let response = self
            .client
            .post(format!("{host}/_bulk"))
            .header("content-type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OutputError::BulkRejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Daily index name, `<prefix>-YYYY.MM.DD`
pub(crate) fn index_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().format("%Y.%m.%d"))
}

/// Shape an event into the indexed document
///
/// Routing metadata moves to `@`-prefixed keys; the remaining fields ride
/// along under `@fields`.
pub(crate) fn index_document(event: &Event) -> Value {
    let mut fields = event.fields.clone();
    let host = fields.remove("host").unwrap_or(Value::Null);
    let file = fields.remove("file").unwrap_or(Value::Null);
    let timestamp = fields.remove("timestamp").unwrap_or(Value::Null);
    fields.remove("line");

    json!({
        "@type": fields.get("type").cloned().unwrap_or(Value::Null),
        "@message": event.text_or_json(),
        "@source_path": file,
        "@source_host": host,
        "@timestamp": timestamp,
        "@fields": fields,
        "@source": event.source,
    })
}
