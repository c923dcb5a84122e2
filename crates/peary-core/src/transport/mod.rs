//! Byte-stream transports a [`crate::Session`] can drive.
//!
//! The session never constructs, connects, or closes a socket.  It is handed
//! something that implements [`Transport`] and only ever writes one request
//! frame and reads one response frame per round trip.
//!
//! Two implementations ship with the crate:
//!
//! - [`TcpTransport`] wraps a connected `tokio::net::TcpStream`.
//! - [`mock::ScriptedTransport`] is an in-memory stand-in for tests that
//!   records every frame written and plays back scripted replies.

pub mod mock;

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use crate::protocol::frame::{declared_length, LENGTH_PREFIX_SIZE};

/// A connected, bidirectional byte stream carrying whole frames.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send {
    /// Writes `frame` once and reports how many bytes were accepted.
    ///
    /// Implementations must not loop until everything is written: a count
    /// below `frame.len()` is how a partial write is signalled.
    async fn send(&mut self, frame: &[u8]) -> io::Result<usize>;

    /// Reads one complete frame, returning at most `max_len` bytes of it.
    async fn recv(&mut self, max_len: usize) -> io::Result<Vec<u8>>;

    /// Shuts the connection down in both directions.
    ///
    /// Every later `send` or `recv` fails with `NotConnected`.  Closing an
    /// already-closed transport succeeds.
    async fn close(&mut self) -> io::Result<()>;
}

/// [`Transport`] over a connected TCP stream.
#[derive(Debug)]
pub struct TcpTransport {
    /// `None` once the connection has been closed.
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Wraps an already-connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Address of the remote daemon.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.as_ref().ok_or_else(not_connected)?.peer_addr()
    }

    /// Returns `true` once [`Transport::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(not_connected)
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "transport is closed")
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        let written = self.stream()?.write(frame).await?;
        trace!("wrote {written}/{} frame bytes", frame.len());
        Ok(written)
    }

    async fn recv(&mut self, max_len: usize) -> io::Result<Vec<u8>> {
        let stream = self.stream()?;

        // Read the length prefix first, then the body it announces.
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        stream.read_exact(&mut prefix).await?;

        let total = LENGTH_PREFIX_SIZE.saturating_add(declared_length(prefix));
        let keep = total.min(max_len.max(LENGTH_PREFIX_SIZE));

        let mut frame = Vec::with_capacity(keep);
        frame.extend_from_slice(&prefix);
        frame.resize(keep, 0);
        stream.read_exact(&mut frame[LENGTH_PREFIX_SIZE..]).await?;

        if keep < total {
            // The decoder will reject the short frame as a length mismatch.
            trace!("truncated {total}-byte frame to {keep}-byte receive buffer");
        } else {
            trace!("read {total}-byte frame");
        }
        Ok(frame)
    }

    async fn close(&mut self) -> io::Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        // A peer that has already gone away is not an error.
        match stream.into_std()?.shutdown(std::net::Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}
