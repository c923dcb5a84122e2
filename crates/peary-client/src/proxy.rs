//! Proxy for the daemon's device registry.
//!
//! # What does the proxy do? (for beginners)
//!
//! The daemon keeps its own list of devices.  A client asks it to
//! `add_device alpha` and gets back the index the daemon chose.  The proxy
//! remembers that index under the name `alpha` so later code can ask for the
//! device by name without another round trip.
//!
//! The local map only knows about devices added through this proxy.  Devices
//! added by other clients are visible only through
//! [`Proxy::list_remote_devices`], which asks the daemon directly.
//!
//! # Ownership of the connection
//!
//! The proxy and every [`Device`] it hands out share one
//! `Arc<Session<T>>`.  [`Proxy::close`] shuts the socket down even while
//! device handles are alive; their later requests fail with
//! `SessionError::Closed`.  The transport itself can only be taken back with
//! [`Proxy::into_transport`] once every device handle has been dropped.

use std::sync::Arc;

use peary_core::{Session, Transport};
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::ClientError;

/// Client-side view of the daemon's device registry.
pub struct Proxy<T> {
    session: Arc<Session<T>>,
    /// Devices added through this proxy, in insertion order.
    devices: Vec<(String, Device<T>)>,
}

impl<T: Transport> Proxy<T> {
    /// Wraps an already-negotiated session.
    pub fn new(session: Session<T>) -> Self {
        Self {
            session: Arc::new(session),
            devices: Vec::new(),
        }
    }

    /// The shared session all requests go through.
    pub fn session(&self) -> &Arc<Session<T>> {
        &self.session
    }

    /// Sends an arbitrary command and returns the raw payload.
    pub async fn request(&self, command: &str, args: &[&str]) -> Result<Vec<u8>, ClientError> {
        Ok(self.session.request(command, args).await?)
    }

    /// Sends an empty request to check the connection is alive.
    pub async fn keep_alive(&self) -> Result<Vec<u8>, ClientError> {
        self.request("", &[]).await
    }

    /// Asks the daemon to add device `name` and remembers its index.
    ///
    /// # Errors
    ///
    /// - [`ClientError::DeviceExists`] if `name` was already added here; no
    ///   request is sent in that case.
    /// - [`ClientError::InvalidDeviceIndex`] if the reply is not an integer.
    /// - [`ClientError::Session`] if the request fails.
    pub async fn add_device(&mut self, name: &str) -> Result<Device<T>, ClientError> {
        if self.find(name).is_some() {
            return Err(ClientError::DeviceExists(name.to_string()));
        }

        let reply = self.request("add_device", &[name]).await?;
        let text = String::from_utf8_lossy(&reply);
        let index: u32 = text
            .trim()
            .parse()
            .map_err(|_| ClientError::InvalidDeviceIndex(text.clone().into_owned()))?;

        let device = Device::new(index, Arc::clone(&self.session));
        self.devices.push((name.to_string(), device.clone()));
        info!(session = %self.session.id(), "added device {name:?} at index {index}");
        Ok(device)
    }

    /// Returns the device previously added under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownDevice`] if no such device was added.
    pub fn get_device(&self, name: &str) -> Result<Device<T>, ClientError> {
        self.find(name)
            .cloned()
            .ok_or_else(|| ClientError::UnknownDevice(name.to_string()))
    }

    /// Asks the daemon to drop all devices, then forgets them locally.
    ///
    /// The local map is left untouched if the request fails.
    pub async fn clear_devices(&mut self) -> Result<(), ClientError> {
        self.request("clear_devices", &[]).await?;
        debug!(session = %self.session.id(), "cleared {} devices", self.devices.len());
        self.devices.clear();
        Ok(())
    }

    /// Names of devices added through this proxy, in insertion order.
    pub fn list_devices(&self) -> Vec<String> {
        self.devices.iter().map(|(name, _)| name.clone()).collect()
    }

    /// The daemon's own device listing, uninterpreted.
    pub async fn list_remote_devices(&self) -> Result<Vec<u8>, ClientError> {
        self.request("list_devices", &[]).await
    }

    /// Forgets all devices and takes the transport back.
    ///
    /// Returns `None` (and leaves the connection open) if a [`Device`]
    /// handle obtained from this proxy is still alive.
    pub fn into_transport(mut self) -> Option<T> {
        self.devices.clear();
        match Arc::try_unwrap(self.session) {
            Ok(session) => Some(session.into_transport()),
            Err(session) => {
                warn!(
                    session = %session.id(),
                    "device handles still alive ({} references); leaving connection open",
                    Arc::strong_count(&session) - 1
                );
                None
            }
        }
    }

    /// Forgets all devices and shuts the connection down in both directions.
    ///
    /// Device handles that outlive the proxy stay valid values, but every
    /// request they make afterwards fails with `SessionError::Closed`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Session`] if the transport could not be shut
    /// down.  The session is closed regardless.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.devices.clear();
        let live = Arc::strong_count(&self.session) - 1;
        if live > 0 {
            debug!("closing with {live} device handles still alive");
        }
        self.session.close().await?;
        info!(session = %self.session.id(), "connection closed");
        Ok(())
    }

    fn find(&self, name: &str) -> Option<&Device<T>> {
        self.devices
            .iter()
            .find(|(known, _)| known == name)
            .map(|(_, device)| device)
    }
}

impl<T> std::fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("session", &self.session.id())
            .field("devices", &self.devices.len())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
