//! Error type for proxy and client operations.

use peary_core::SessionError;
use thiserror::Error;

/// Failures raised above the protocol session: device bookkeeping and
/// connection setup.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A device with this name was already added through this proxy.
    #[error("device {0:?} already exists")]
    DeviceExists(String),

    /// No device with this name was added through this proxy.
    #[error("unknown device {0:?}")]
    UnknownDevice(String),

    /// The daemon's reply to `add_device` was not a device index.
    #[error("daemon returned invalid device index {0:?}")]
    InvalidDeviceIndex(String),

    /// The TCP connection to the daemon could not be established.
    #[error("failed to connect to daemon at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The TCP connection was not established within the configured timeout.
    #[error("timed out connecting to daemon at {addr} after {secs}s")]
    ConnectTimeout { addr: String, secs: u64 },

    /// A request failed at the protocol level.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Configuring the local socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// `true` when the underlying connection must be discarded.
    pub fn requires_reconnect(&self) -> bool {
        match self {
            ClientError::Session(e) => e.requires_reconnect(),
            ClientError::Io(_) => true,
            _ => false,
        }
    }
}
