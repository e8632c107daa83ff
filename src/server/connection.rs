//! Connection handling
//!
//! Manages individual client connections, parsing RESP commands
//! and sending responses.

use super::engine::{EngineClosed, EngineHandle};
use crate::protocol::{RespEncoder, RespError, RespParser, RespValue};
use bytes::{Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Why a connection was closed by the server
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] RespError),

    #[error("reply of {0} bytes exceeds the client output limit")]
    OutputLimit(usize),

    #[error(transparent)]
    EngineClosed(#[from] EngineClosed),
}

/// Per-connection limits taken from the server configuration
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub max_bulk_len: usize,
    pub max_multibulk_len: usize,
    /// Pending reply bytes after which the client is dropped
    pub output_limit: usize,
}

fn is_quit(argv: &[Bytes]) -> bool {
    argv.first()
        .map_or(false, |name| name.eq_ignore_ascii_case(b"QUIT"))
}

/// Connection handler
pub struct Connection<S> {
    stream: S,

    client_id: u64,

    parser: RespParser,

    output_limit: usize,

    /// Read buffer
    read_buffer: BytesMut,

    /// Write buffer
    write_buffer: BytesMut,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new connection handler
    pub fn new(stream: S, client_id: u64, limits: ConnectionLimits) -> Self {
        Connection {
            stream,
            client_id,
            parser: RespParser::with_limits(limits.max_bulk_len, limits.max_multibulk_len),
            output_limit: limits.output_limit,
            read_buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Handle the connection
    ///
    /// Reads commands from the client, sends every complete request of a
    /// read to the engine as one batch, and writes the replies back.
    /// Returns when the client disconnects or sends QUIT; a framing error
    /// is answered once and then closes the connection.
    pub async fn handle(&mut self, engine: &EngineHandle) -> Result<(), ConnectionError> {
        loop {
            let n = self.stream.read_buf(&mut self.read_buffer).await?;
            if n == 0 {
                if !self.read_buffer.is_empty() {
                    debug!(
                        client = self.client_id,
                        "Discarding {} bytes of a partial request",
                        self.read_buffer.len()
                    );
                }
                return Ok(());
            }

            debug!("Read {} bytes", n);

            let mut batch = Vec::new();
            let mut protocol_error = None;
            loop {
                match self.parser.parse_command(&mut self.read_buffer) {
                    Ok(Some(argv)) if argv.is_empty() => continue,
                    Ok(Some(argv)) => batch.push(argv),
                    Ok(None) | Err(RespError::Incomplete) => break,
                    Err(e) => {
                        protocol_error = Some(e);
                        break;
                    }
                }
            }

            // Nothing after QUIT is executed
            let quit = batch.iter().position(|argv| is_quit(argv));
            if let Some(index) = quit {
                batch.truncate(index + 1);
            }

            if !batch.is_empty() {
                let replies = engine.execute(self.client_id, batch).await?;
                for reply in &replies {
                    RespEncoder::encode_to(&mut self.write_buffer, reply);
                }
                if self.write_buffer.len() > self.output_limit {
                    return Err(ConnectionError::OutputLimit(self.write_buffer.len()));
                }
                self.flush().await?;
            }

            if quit.is_some() {
                return Ok(());
            }

            if let Some(e) = protocol_error {
                warn!(client = self.client_id, "Protocol error: {}", e);
                let reply = RespValue::error(format!("ERR Protocol error: {}", e));
                RespEncoder::encode_to(&mut self.write_buffer, &reply);
                self.flush().await?;
                return Err(e.into());
            }
        }
    }

    /// Write out the pending replies
    async fn flush(&mut self) -> io::Result<()> {
        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;
        self.write_buffer.clear();
        Ok(())
    }
}
