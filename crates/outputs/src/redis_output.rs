//! Redis output - broker list producer
//!
//! Buffers event payloads and pushes them to every configured list key
//! with RPUSH, on the flush timer or when the batch fills. Broker errors
//! retry a fixed number of times, then the batch is dropped; the
//! connection is rebuilt on the next flush.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;

use crate::common::{run_unrouted, Binding, OutputMetrics};
use crate::{Result, BATCH_SIZE, FLUSH_RETRIES};

/// Delay between flush attempts
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Redis producer configuration
#[derive(Debug, Clone)]
pub struct RedisOutputConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: String,
    /// List keys each payload is pushed to
    pub keys: Vec<String>,
    /// Flush interval for partial batches
    pub flush_interval: Duration,
}

impl RedisOutputConfig {
    /// Connection URL for the broker
    fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

/// Broker queue producer output
pub struct RedisOutput {
    name: String,
    config: RedisOutputConfig,
    binding: Option<Binding>,
    metrics: Arc<OutputMetrics>,
}

impl RedisOutput {
    /// Create a redis output; `binding` is `None` when no route selected it
    pub fn new(
        name: impl Into<String>,
        config: RedisOutputConfig,
        binding: Option<Binding>,
    ) -> Self {
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

    /// Consume events and push batches until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Some(ref binding) = self.binding else {
            run_unrouted(&self.name, "redis", cancel).await;
            return Ok(());
        };

        let mut rx = binding.subscribe(&self.name).await?;
        tracing::info!(
            output = %self.name,
            host = %self.config.host,
            keys = ?self.config.keys,
            input = %binding.route.input,
            "redis output started"
        );

        let client = redis::Client::open(self.config.url())
            .map_err(crate::OutputError::Redis)?;
        let mut conn: Option<MultiplexedConnection> = None;

        let mut batch: Vec<String> = Vec::new();
        let mut tick = tokio::time::interval(self.config.flush_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => self.flush(&client, &mut conn, &mut batch).await,
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
                    batch.push(payload);
                    if batch.len() >= BATCH_SIZE {
                        self.flush(&client, &mut conn, &mut batch).await;
                    }
                }
            }
        }

        self.flush(&client, &mut conn, &mut batch).await;
        binding.unsubscribe(&self.name).await;
        tracing::info!(output = %self.name, "redis output stopped");
        Ok(())
    }

    /// Push the batch to every key, retrying before dropping it
    async fn flush(
        &self,
        client: &redis::Client,
        conn: &mut Option<MultiplexedConnection>,
        batch: &mut Vec<String>,
    ) {
        if batch.is_empty() {
            return;
        }
        let payloads = std::mem::take(batch);
        tracing::debug!(output = %self.name, events = payloads.len(), "flushing to redis");

        for attempt in 0..FLUSH_RETRIES {
            match self.push_all(client, conn, &payloads).await {
                Ok(()) => {
                    self.metrics.batch_flushed();
                    for _ in 0..payloads.len() {
                        self.metrics.event_written();
                    }
                    return;
                }
                Err(e) => {
                    self.metrics.error();
                    // Force a reconnect on the next attempt
                    *conn = None;
                    tracing::warn!(
                        output = %self.name,
                        attempt = attempt + 1,
                        error = %e,
                        "redis push failed"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }

        tracing::error!(output = %self.name, events = payloads.len(), "dropping batch after retries");
    }

    /// RPUSH the whole batch to every configured key
    async fn push_all(
        &self,
        client: &redis::Client,
        conn: &mut Option<MultiplexedConnection>,
        payloads: &[String],
    ) -> std::result::Result<(), redis::RedisError> {
        if conn.is_none() {
            *conn = Some(client.get_multiplexed_async_connection().await?);
        }
        let connection = conn.as_mut().expect("connection just established");

        for key in &self.config.keys {
            connection.rpush::<_, _, ()>(key, payloads).await?;
        }
        Ok(())
    }
}
