//! Streaming Lumberjack connection parser
//!
//! Drives one already-accepted connection: reads frame tags, inflates
//! compressed blocks, hands each decoded event to the buffer, and writes
//! the acknowledgement back once a whole block is consumed.
//!
//! The event send **blocks** while the buffer's input queue is full. That
//! is deliberate: a stalled pipeline stops acking, and the upstream agent
//! stops sending.
//!
//! Any decode error, size-guard violation, or I/O error ends the
//! connection; there are no retries at this layer. Events already emitted
//! from a failing window are kept.

use std::sync::Arc;

use logship_buffer::EventSender;
use logship_protocol::{
    ack_frame, decompress_block, ProtocolError, WindowDecoder, ACKMSG_V1, FRAME_COMPRESSED,
    FRAME_WINDOW, VERSION_1, VERSION_2,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::InputMetrics;
use crate::{InputError, Result};

/// Parser state for one connection
///
/// Generic over the stream so the same code runs on plaintext TCP, TLS,
/// and in-memory test pipes.
pub struct Parser<S> {
    stream: S,
    peer: String,
    events: EventSender,
    metrics: Arc<InputMetrics>,
    wlen: u32,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Parser<S> {
    /// Create a parser for an accepted connection
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        events: EventSender,
        metrics: Arc<InputMetrics>,
    ) -> Self {
        Self {
            stream,
            peer: peer.into(),
            events,
            metrics,
            wlen: 0,
        }
    }

    /// Run the read loop until EOF or an error
    ///
    /// A clean peer close returns `Ok(())`; everything else surfaces as an
    /// error for the caller to log before dropping the connection.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let mut tag = [0u8; 2];
            match self.stream.read_exact(&mut tag).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(InputError::Io(e)),
            }

            match (tag[0], tag[1]) {
                (VERSION_1 | VERSION_2, FRAME_WINDOW) => {
                    self.wlen = self.read_u32().await?;
                    tracing::trace!(peer = %self.peer, wlen = self.wlen, "window announced");
                }
                (version @ (VERSION_1 | VERSION_2), FRAME_COMPRESSED) => {
                    let seq = self.read_block().await?;
                    self.ack(version, seq).await?;
                }
                (v, t) => return Err(ProtocolError::UnknownFrame(v, t).into()),
            }
        }
    }

    /// Consume one compressed block and emit its events
    ///
    /// Returns the highest sequence number observed, for the ack.
    async fn read_block(&mut self) -> Result<u32> {
        let plen = self.read_u32().await?;
        let mut payload = vec![0u8; plen as usize];
        self.stream.read_exact(&mut payload).await?;
        self.metrics
            .bytes_received
            .fetch_add(u64::from(plen), std::sync::atomic::Ordering::Relaxed);

        let block = decompress_block(&payload)?;
        let mut decoder = WindowDecoder::new(&block, self.wlen);

        while let Some(event) = decoder.next_event()? {
            self.metrics
                .events_received
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.events
                .send(event)
                .await
                .map_err(|_| InputError::ChannelClosed)?;
        }

        Ok(decoder.max_seq())
    }

    /// Acknowledge a consumed block in the peer's protocol version
    async fn ack(&mut self, version: u8, seq: u32) -> Result<()> {
        tracing::trace!(peer = %self.peer, seq, "sending ack");
        if version == VERSION_1 {
            self.stream.write_all(ACKMSG_V1).await?;
        } else {
            self.stream.write_all(&ack_frame(seq)).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    #[inline]
    async fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.stream.read_exact(&mut buf).await?;
        Ok(u32::from_be_bytes(buf))
    }
}
