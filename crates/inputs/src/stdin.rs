//! Stdin input - newline-delimited events on standard input

use std::sync::Arc;

use logship_buffer::EventSender;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::common::{event_from_payload, InputMetrics};
use crate::{InputError, Result};

/// Stdin input configuration
#[derive(Debug, Clone, Default)]
pub struct StdinConfig {
    /// Decode each line as a JSON object into the event fields
    pub json_decode: bool,
}

/// Line reader on standard input
pub struct StdinInput {
    name: String,
    config: StdinConfig,
    events: EventSender,
    metrics: Arc<InputMetrics>,
}

impl StdinInput {
    /// Create a stdin input feeding the given buffer sender
    pub fn new(name: impl Into<String>, config: StdinConfig, events: EventSender) -> Self {
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

    /// Read lines until EOF or cancellation
    ///
    /// Lines that fail JSON decoding (when enabled) are skipped.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        tracing::info!(input = %self.name, json_decode = self.config.json_decode, "stdin input started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let Some(event) = event_from_payload(&line, self.config.json_decode)
                        else {
                            self.metrics.error();
                            continue;
                        };
                        self.metrics.event_received(line.len() as u64);
                        self.events
                            .send(event)
                            .await
                            .map_err(|_| InputError::ChannelClosed)?;
                    }
                    Ok(None) => break, // EOF
                    Err(e) => return Err(InputError::Io(e)),
                },
            }
        }

        tracing::info!(input = %self.name, "stdin input stopped");
        Ok(())
    }
}
