//! In-memory transport for unit and integration testing.
//!
//! # Why a scripted transport?
//!
//! A real daemon needs hardware, a network, and a running `pearyd`.  The
//! `ScriptedTransport` replaces all of that with two in-memory queues:
//!
//! - every frame the session writes is recorded, so tests can assert on the
//!   exact bytes (and decoded sequence numbers) the daemon would observe;
//! - every read is answered from a queue of scripted replies, or by a
//!   responder closure that plays the daemon's role.
//!
//! Clones share the same script, so a test can keep one handle for
//! inspection while the session owns the other.
//!
//! # Usage in tests
//!
//! ```
//! use peary_core::protocol::{Frame, IntegrityMode, PROTOCOL_VERSION};
//! use peary_core::transport::mock::ScriptedTransport;
//! use peary_core::{Session, SessionConfig};
//!
//! # tokio_test::block_on(async {
//! let transport = ScriptedTransport::new(IntegrityMode::None);
//! transport.respond_with(|request| match request.payload.as_slice() {
//!     b"protocol_version" => Frame::ok(PROTOCOL_VERSION, request.sequence),
//!     _ => Frame::ok("3", request.sequence),
//! });
//!
//! let session = Session::connect(transport.clone(), SessionConfig::default()).await.unwrap();
//! assert_eq!(session.request("add_device", &["alpha"]).await.unwrap(), b"3");
//! assert_eq!(transport.sent_sequences(), vec![1, 2]);
//! # });
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::Transport;
use crate::protocol::{decode_frame, Frame, IntegrityMode};

type Responder = Box<dyn FnMut(&Frame) -> Frame + Send>;

#[derive(Default)]
struct Script {
    replies: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    recv_calls: usize,
    short_write_by: Option<usize>,
    responder: Option<Responder>,
    closed: bool,
}

/// A [`Transport`] that records writes and plays back scripted replies.
#[derive(Clone)]
pub struct ScriptedTransport {
    mode: IntegrityMode,
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// Creates an empty script.  `mode` is used to decode recorded requests
    /// and to encode replies produced by [`ScriptedTransport::push_reply`]
    /// and [`ScriptedTransport::respond_with`].
    pub fn new(mode: IntegrityMode) -> Self {
        Self {
            mode,
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a reply frame, encoded in this transport's mode.
    ///
    /// Replies whose payload does not fit a frame are queued as empty bytes,
    /// which the session will reject as corrupt.
    pub fn push_reply(&self, frame: Frame) {
        let bytes = frame.encode(self.mode).unwrap_or_default();
        self.push_raw(bytes);
    }

    /// Queues raw bytes to be returned by the next unanswered read.
    pub fn push_raw(&self, bytes: Vec<u8>) {
        self.script().replies.push_back(bytes);
    }

    /// Installs a closure that answers each request as it is written.
    ///
    /// The reply is queued behind any replies already pushed.
    pub fn respond_with<F>(&self, responder: F)
    where
        F: FnMut(&Frame) -> Frame + Send + 'static,
    {
        self.script().responder = Some(Box::new(responder));
    }

    /// Makes the next write report `by` fewer bytes than the frame length.
    pub fn short_write_by(&self, by: usize) {
        self.script().short_write_by = Some(by);
    }

    /// Raw bytes of every frame written so far.
    pub fn sent_bytes(&self) -> Vec<Vec<u8>> {
        self.script().sent.clone()
    }

    /// Every frame written so far, decoded.  Undecodable writes are skipped.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.script()
            .sent
            .iter()
            .filter_map(|bytes| decode_frame(bytes, self.mode).ok())
            .collect()
    }

    /// Sequence numbers the daemon would have observed, in order.
    pub fn sent_sequences(&self) -> Vec<u16> {
        self.sent_frames().iter().map(|f| f.sequence).collect()
    }

    /// Number of times a read was attempted.
    pub fn recv_calls(&self) -> usize {
        self.script().recv_calls
    }

    /// Number of replies still waiting to be read.
    pub fn pending_replies(&self) -> usize {
        self.script().replies.len()
    }

    /// Returns `true` once [`Transport::close`] has been called on any clone.
    pub fn is_closed(&self) -> bool {
        self.script().closed
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "scripted transport is closed")
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        let mode = self.mode;
        let mut script = self.script();
        if script.closed {
            return Err(closed_error());
        }
        script.sent.push(frame.to_vec());

        if let Some(by) = script.short_write_by.take() {
            return Ok(frame.len().saturating_sub(by));
        }

        let request = decode_frame(frame, mode).ok();
        if let (Some(request), Some(responder)) = (request, script.responder.as_mut()) {
            let reply = responder(&request);
            let bytes = reply.encode(mode).unwrap_or_default();
            script.replies.push_back(bytes);
        }
        Ok(frame.len())
    }

    async fn recv(&mut self, max_len: usize) -> io::Result<Vec<u8>> {
        let mut script = self.script();
        if script.closed {
            return Err(closed_error());
        }
        script.recv_calls += 1;
        match script.replies.pop_front() {
            Some(mut bytes) => {
                bytes.truncate(max_len);
                Ok(bytes)
            }
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "scripted transport has no reply queued",
            )),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.script().closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let script = self.script();
        f.debug_struct("ScriptedTransport")
            .field("mode", &self.mode)
            .field("sent", &script.sent.len())
            .field("pending_replies", &script.replies.len())
            .field("closed", &script.closed)
            .finish()
    }
}
