//! # peary-core
//!
//! Wire protocol codec and request/response session for talking to a peary
//! device-control daemon.
//!
//! This crate knows nothing about devices, configuration files, or the
//! command line.  It turns a command string into one framed request on a
//! byte stream and hands back the daemon's raw response payload.
//!
//! # Architecture overview (for beginners)
//!
//! The daemon (`pearyd`) manages lab hardware and listens on a TCP port.  A
//! client sends it short text commands such as `add_device alpha` and gets a
//! reply payload back.  Every exchange is one request frame followed by one
//! response frame on the same socket.
//!
//! - **`protocol`** – How bytes travel over the network.  A frame is a 4-byte
//!   length prefix, a 16-bit sequence number, a 16-bit status code, the
//!   payload, and (optionally) a CRC-32 trailer.
//!
//! - **`session`** – One negotiated connection.  It numbers requests,
//!   checks each response's status and sequence number, and performs the
//!   `protocol_version` handshake before it can be used.
//!
//! - **`transport`** – The byte stream underneath.  [`TcpTransport`] wraps a
//!   connected socket; tests use an in-memory scripted transport instead.

pub mod protocol;
pub mod session;
pub mod transport;

// Re-export the most-used types at the crate root so callers can write
// `peary_core::Session` instead of `peary_core::session::Session`.
pub use protocol::{
    decode_frame, encode_frame, Frame, FrameError, IntegrityMode, DEFAULT_BUFFER_SIZE,
    PROTOCOL_VERSION, STATUS_OK,
};
pub use session::{Session, SessionConfig, SessionError};
pub use transport::{TcpTransport, Transport};
