//! Filebeat input - Lumberjack server over TLS
//!
//! Accepts connections from filebeat-style agents and runs one
//! [`Parser`](crate::Parser) task per connection. The listener terminates
//! TLS when a certificate and key are configured; with both left empty it
//! speaks plaintext (useful behind a TLS-terminating proxy and in tests).

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use logship_buffer::EventSender;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use crate::common::InputMetrics;
use crate::parser::Parser;
use crate::{InputError, Result};

/// Filebeat listener configuration
#[derive(Debug, Clone)]
pub struct FilebeatConfig {
    /// Listen address, `<addr:port>`
    pub host: String,

    /// PEM certificate path; empty together with `ssl_key` for plaintext
    pub ssl_crt: String,

    /// PEM private key path
    pub ssl_key: String,

    /// Reserved; sampling happens on outputs
    pub sample_size: Option<u8>,
}

/// Lumberjack server input
pub struct FilebeatInput {
    name: String,
    config: FilebeatConfig,
    events: EventSender,
    metrics: Arc<InputMetrics>,
}

impl FilebeatInput {
    /// Create a filebeat input feeding the given buffer sender
    pub fn new(name: impl Into<String>, config: FilebeatConfig, events: EventSender) -> Self {
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

    /// Bind, listen, and accept until cancelled
    ///
    /// Certificate or key problems and bind failures are fatal here;
    /// per-accept errors are logged and the loop continues.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let acceptor = if self.config.ssl_crt.is_empty() {
            None
        } else {
            Some(tls_acceptor(&self.config.ssl_crt, &self.config.ssl_key)?)
        };

        let listener =
            TcpListener::bind(&self.config.host)
                .await
                .map_err(|e| InputError::Bind {
                    address: self.config.host.clone(),
                    source: e,
                })?;

        if let Some(sample) = self.config.sample_size {
            tracing::info!(input = %self.name, sample_size = sample, "sample size configured");
        }
        tracing::info!(
            input = %self.name,
            address = %self.config.host,
            tls = acceptor.is_some(),
            "lumberjack listener started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = listener.accept() => match result {
                    Ok((stream, peer)) => {
                        self.metrics.connection_opened();
                        let acceptor = acceptor.clone();
                        let events = self.events.clone();
                        let metrics = Arc::clone(&self.metrics);
                        let input = self.name.clone();
                        tokio::spawn(async move {
                            handle_connection(input, acceptor, stream, peer.to_string(), events, &metrics)
                                .await;
                            metrics.connection_closed();
                        });
                    }
                    Err(e) => {
                        tracing::warn!(input = %self.name, error = %e, "accept error");
                        self.metrics.error();
                    }
                },
            }
        }

        tracing::info!(input = %self.name, "lumberjack listener stopped");
        Ok(())
    }
}

/// Run the parser over one accepted connection, TLS-wrapped if configured
async fn handle_connection(
    input: String,
    acceptor: Option<TlsAcceptor>,
    stream: TcpStream,
    peer: String,
    events: EventSender,
    metrics: &Arc<InputMetrics>,
) {
    tracing::info!(input = %input, peer = %peer, "accepting lumberjack connection");

    let result = match acceptor {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => {
                Parser::new(tls_stream, peer.clone(), events, Arc::clone(metrics))
                    .run()
                    .await
            }
            Err(e) => {
                metrics.error();
                tracing::warn!(input = %input, peer = %peer, error = %e, "TLS handshake failed");
                return;
            }
        },
        None => {
            Parser::new(stream, peer.clone(), events, Arc::clone(metrics))
                .run()
                .await
        }
    };

    if let Err(e) = result {
        metrics.error();
        tracing::warn!(input = %input, peer = %peer, error = %e, "connection error");
    }
    tracing::info!(input = %input, peer = %peer, "closing lumberjack connection");
}

/// Build a TLS acceptor from PEM certificate and key files
fn tls_acceptor(crt_path: &str, key_path: &str) -> Result<TlsAcceptor> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(open(crt_path)?))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| InputError::TlsLoad {
            path: crt_path.to_string(),
            source: e,
        })?;

    let key = rustls_pemfile::private_key(&mut BufReader::new(open(key_path)?))
        .map_err(|e| InputError::TlsLoad {
            path: key_path.to_string(),
            source: e,
        })?
        .ok_or_else(|| InputError::NoPrivateKey {
            path: key_path.to_string(),
        })?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &str) -> Result<File> {
    File::open(path).map_err(|e| InputError::TlsLoad {
        path: path.to_string(),
        source: e,
    })
}
