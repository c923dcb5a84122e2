//! Request/response session over one connected transport.
//!
//! A [`Session`] turns a command name plus string arguments into exactly one
//! round trip on the socket:
//!
//! ```text
//! request("add_device", ["alpha"])
//!   ├─ payload  = "add_device alpha"
//!   ├─ sequence = next counter value (then advance)
//!   ├─ send     encode_frame(payload, sequence, STATUS_OK)
//!   ├─ recv     one frame, at most buffer_size bytes
//!   ├─ check    status == STATUS_OK        else ResponseStatus
//!   ├─ check    sequence matches            else ResponseSequence
//!   └─ return   payload bytes, uninterpreted
//! ```
//!
//! # One request at a time
//!
//! The socket has no multiplexing: a response can only be attributed to a
//! request by strict FIFO ordering.  The whole round trip therefore runs
//! while holding a single `tokio::sync::Mutex` guard over the transport and
//! the counter.  Sharing an `Arc<Session<_>>` between tasks is safe; their
//! requests are serialised, never interleaved.
//!
//! # Version handshake
//!
//! [`Session::connect`] sends `protocol_version` through the ordinary request
//! path before returning.  If the daemon answers with anything other than
//! [`PROTOCOL_VERSION`] the constructor fails and no session value exists.
//!
//! # Failed writes and closing
//!
//! A request frame that was only partly written (or whose write failed)
//! leaves the daemon holding an unknown prefix of it.  The session marks
//! itself poisoned and every later request fails with
//! [`SessionError::Poisoned`] without touching the socket.  A sequence
//! mismatch does not poison; it is left to the caller.
//!
//! [`Session::close`] shuts the transport down in place, so it works while
//! other handles to the session are still alive.  Later requests fail with
//! [`SessionError::Closed`].
//!
//! # Cancellation
//!
//! No timeout is applied internally.  A caller that wraps a request in
//! `tokio::time::timeout` and hits it must treat the connection as lost: the
//! counter has advanced and a late response may still be in flight.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, debug_span, info, trace, warn, Instrument};
use uuid::Uuid;

use crate::protocol::frame::MAX_PAYLOAD_SIZE;
use crate::protocol::{
    decode_frame, encode_frame, FrameError, IntegrityMode, SequenceCounter, DEFAULT_BUFFER_SIZE,
    PROTOCOL_VERSION, STATUS_OK,
};
use crate::transport::Transport;

/// Command used for the version handshake.
pub const VERSION_COMMAND: &str = "protocol_version";

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures a request (or the handshake) can raise.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The request frame was not fully written.  The connection is in an
    /// undefined state and must be discarded.
    #[error("failed to send request: wrote {sent} of {expected} bytes")]
    RequestSend { sent: usize, expected: usize },

    /// A response frame could not be parsed or failed its integrity check.
    #[error("corrupt response frame: {0}")]
    FrameCorruption(#[from] FrameError),

    /// The daemon received the request and reported a failure.
    #[error("failed response status {status}")]
    ResponseStatus { status: u16 },

    /// The response carried a different sequence number than the request.
    #[error("received out of order response from daemon: expected sequence {expected}, got {received}")]
    ResponseSequence { expected: u16, received: u16 },

    /// The daemon speaks a different protocol version.
    #[error("unsupported protocol version: {version:?}")]
    IncompatibleProtocol { version: String },

    /// Every sequence number on this connection has been used.
    #[error("sequence numbers exhausted; reconnect to continue")]
    SequenceExhausted,

    /// The request payload does not fit in a frame.
    #[error("request payload of {len} bytes is too large to frame")]
    RequestTooLarge { len: usize },

    /// The transport reported an I/O error.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// An earlier request frame was not fully written, so the stream is out
    /// of sync.  Nothing was sent.
    #[error("connection unusable after an earlier failed write; reconnect")]
    Poisoned,

    /// [`Session::close`] has been called.  Nothing was sent.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// `true` for failures of the byte stream itself rather than of the request.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            SessionError::RequestSend { .. }
                | SessionError::FrameCorruption(_)
                | SessionError::Io(_)
                | SessionError::Poisoned
        )
    }

    /// `true` when the connection can no longer be trusted and must be
    /// re-established.  Only a daemon-reported status (and an oversized
    /// request that was never sent) leave the stream in sync.
    pub fn requires_reconnect(&self) -> bool {
        !matches!(
            self,
            SessionError::ResponseStatus { .. } | SessionError::RequestTooLarge { .. }
        )
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Settings fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Whether every frame carries and is checked against a CRC-32.
    #[serde(default)]
    pub integrity: IntegrityMode,
    /// Largest response frame, in bytes, read by [`Session::request`].
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            integrity: IntegrityMode::default(),
            buffer_size: default_buffer_size(),
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Whether the transport may still be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Open,
    Poisoned,
    Closed,
}

/// Everything mutated during a round trip, kept behind one lock.
struct SessionState<T> {
    transport: T,
    sequence: SequenceCounter,
    link: Link,
}

/// A negotiated request/response session owning one transport.
pub struct Session<T> {
    id: Uuid,
    config: SessionConfig,
    state: Mutex<SessionState<T>>,
}

impl<T: Transport> Session<T> {
    /// Wraps `transport` and performs the version handshake.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IncompatibleProtocol`] if the daemon reports a
    /// different version, or any other [`SessionError`] raised by the
    /// handshake request itself.
    pub async fn connect(transport: T, config: SessionConfig) -> Result<Self, SessionError> {
        let session = Self::unnegotiated(transport, config);
        session.negotiate().await?;
        Ok(session)
    }

    fn unnegotiated(transport: T, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            state: Mutex::new(SessionState {
                transport,
                sequence: SequenceCounter::new(),
                link: Link::Open,
            }),
        }
    }

    async fn negotiate(&self) -> Result<(), SessionError> {
        let version = self.request(VERSION_COMMAND, &[]).await?;
        if version != PROTOCOL_VERSION.as_bytes() {
            let version = String::from_utf8_lossy(&version).into_owned();
            warn!(session = %self.id, "daemon speaks unsupported protocol version {version:?}");
            return Err(SessionError::IncompatibleProtocol { version });
        }
        info!(
            session = %self.id,
            integrity = %self.config.integrity,
            "negotiated protocol version {PROTOCOL_VERSION}"
        );
        Ok(())
    }

    /// Sends `command` with `args` and returns the daemon's payload.
    ///
    /// An empty `command` with no arguments is a keep-alive probe.
    ///
    /// # Errors
    ///
    /// See [`SessionError`].  No error is retried internally.
    pub async fn request(&self, command: &str, args: &[&str]) -> Result<Vec<u8>, SessionError> {
        self.request_with_buffer(command, args, self.config.buffer_size)
            .await
    }

    /// Like [`Session::request`] but reads at most `buffer_size` bytes of
    /// response.  A larger response is truncated and rejected as corrupt.
    ///
    /// # Errors
    ///
    /// See [`SessionError`].
    pub async fn request_with_buffer(
        &self,
        command: &str,
        args: &[&str],
        buffer_size: usize,
    ) -> Result<Vec<u8>, SessionError> {
        let span = debug_span!("peary_session", session = %self.id);
        self.round_trip(compose_payload(command, args), buffer_size)
            .instrument(span)
            .await
    }

    async fn round_trip(&self, payload: Vec<u8>, buffer_size: usize) -> Result<Vec<u8>, SessionError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(SessionError::RequestTooLarge { len: payload.len() });
        }
        let mode = self.config.integrity;

        // Held until the response is validated.
        let mut state = self.state.lock().await;

        match state.link {
            Link::Open => {}
            Link::Poisoned => return Err(SessionError::Poisoned),
            Link::Closed => return Err(SessionError::Closed),
        }

        let sequence = state
            .sequence
            .next()
            .ok_or(SessionError::SequenceExhausted)?;
        let frame = encode_frame(&payload, sequence, STATUS_OK, mode)
            .map_err(|_| SessionError::RequestTooLarge { len: payload.len() })?;

        let written = state.transport.send(&frame).await;
        let sent = match written {
            Ok(sent) => sent,
            Err(e) => {
                warn!(sequence, "write failed: {e}");
                state.link = Link::Poisoned;
                return Err(e.into());
            }
        };
        if sent < frame.len() {
            warn!(sequence, "partial write: {sent} of {} bytes", frame.len());
            state.link = Link::Poisoned;
            return Err(SessionError::RequestSend {
                sent,
                expected: frame.len(),
            });
        }
        debug!(sequence, "sent {:?}", String::from_utf8_lossy(&payload));

        let raw = state.transport.recv(buffer_size).await?;
        trace!(sequence, "received {} bytes", raw.len());
        let response = decode_frame(&raw, mode)?;

        if response.status != STATUS_OK {
            warn!(sequence, status = response.status, "daemon reported failure");
            return Err(SessionError::ResponseStatus {
                status: response.status,
            });
        }
        if response.sequence != sequence {
            warn!(
                expected = sequence,
                received = response.sequence,
                "response stream desynchronised"
            );
            return Err(SessionError::ResponseSequence {
                expected: sequence,
                received: response.sequence,
            });
        }

        debug!(sequence, "accepted {}-byte response", response.payload.len());
        Ok(response.payload)
    }

    /// The sequence number the next request will carry, or `None` if the
    /// connection has used them all.
    pub async fn next_sequence(&self) -> Option<u16> {
        self.state.lock().await.sequence.peek()
    }

    /// Shuts the transport down and refuses every later request.
    ///
    /// Waits for an in-flight request to finish first.  Closing twice is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the transport fails to shut down.
    /// The session counts as closed either way.
    pub async fn close(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        if state.link == Link::Closed {
            return Ok(());
        }
        state.link = Link::Closed;
        state.transport.close().await?;
        info!(session = %self.id, "session closed");
        Ok(())
    }

    /// Returns `true` once [`Session::close`] has been called.
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.link == Link::Closed
    }
}

impl<T> Session<T> {
    /// Identifier used to correlate this session's log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The integrity mode chosen at construction.
    pub fn integrity_mode(&self) -> IntegrityMode {
        self.config.integrity
    }

    /// The settings chosen at construction.
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Ends the session and hands the transport back to its owner, who is
    /// responsible for shutting it down.
    pub fn into_transport(self) -> T {
        self.state.into_inner().transport
    }
}

impl<T> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Joins `command` and `args` with single spaces.
fn compose_payload(command: &str, args: &[&str]) -> Vec<u8> {
    let mut payload = command.as_bytes().to_vec();
    for arg in args {
        payload.push(b' ');
        payload.extend_from_slice(arg.as_bytes());
    }
    payload
}

// ── Tests ─────────────────────────────────────────────────────────────────────
