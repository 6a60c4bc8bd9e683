//! Redis input - broker list consumer
//!
//! Pops payloads from a list key with BRPOP and turns each one into an
//! event. Broker errors are not fatal: the input logs, sleeps, and
//! reconnects, the way a shipper should ride out a broker restart.

use std::sync::Arc;
use std::time::Duration;

use logship_buffer::EventSender;
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;

use crate::common::{event_from_payload, InputMetrics};
use crate::{InputError, Result};

/// Delay before reconnecting after a broker error
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// BRPOP poll timeout in seconds; bounds how long cancellation waits
const POP_TIMEOUT_SECS: f64 = 1.0;

/// Redis consumer configuration
#[derive(Debug, Clone)]
pub struct RedisInputConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: String,
    /// List key to consume from
    pub input_queue: String,
    /// Decode each payload as a JSON object into the event fields
    pub json_decode: bool,
}

impl RedisInputConfig {
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

/// Broker queue consumer input
pub struct RedisInput {
    name: String,
    config: RedisInputConfig,
    events: EventSender,
    metrics: Arc<InputMetrics>,
}

impl RedisInput {
    /// Create a redis input feeding the given buffer sender
    pub fn new(name: impl Into<String>, config: RedisInputConfig, events: EventSender) -> Self {
        Self {
            name: name.into(),
            config,
            events,
            metrics: Arc::new(InputMetrics::new()),
        }
    }

    /// Shared metrics for this input
    pub fn metrics(&self) -> Arc<InputMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Consume the queue until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(
            input = %self.name,
            host = %self.config.host,
            queue = %self.config.input_queue,
            "redis input started"
        );

        let client = redis::Client::open(self.config.url())?;

        while !cancel.is_cancelled() {
            let mut conn = match client.get_multiplexed_async_connection().await {
                Ok(conn) => conn,
                Err(e) => {
                    self.metrics.error();
                    tracing::warn!(input = %self.name, error = %e, "broker connect failed, retrying");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => continue,
                    }
                }
            };

            loop {
                let popped: std::result::Result<Option<(String, String)>, redis::RedisError> = tokio::select! {
                    _ = cancel.cancelled() => return self.finish(),
                    result = conn.brpop(&self.config.input_queue, POP_TIMEOUT_SECS) => result,
                };

                match popped {
                    Ok(Some((_key, payload))) => {
                        let Some(event) =
                            event_from_payload(&payload, self.config.json_decode)
                        else {
                            self.metrics.error();
                            continue;
                        };
                        self.metrics.event_received(payload.len() as u64);
                        self.events
                            .send(event)
                            .await
                            .map_err(|_| InputError::ChannelClosed)?;
                    }
                    Ok(None) => {} // poll timeout, loop to check cancellation
                    Err(e) => {
                        self.metrics.error();
                        tracing::warn!(input = %self.name, error = %e, "broker read failed, reconnecting");
                        tokio::select! {
                            _ = cancel.cancelled() => return self.finish(),
                            _ = tokio::time::sleep(RETRY_DELAY) => break,
                        }
                    }
                }
            }
        }

        self.finish()
    }

    fn finish(&self) -> Result<()> {
        tracing::info!(input = %self.name, "redis input stopped");
        Ok(())
    }
}
