//! Handle to one device registered with the daemon.
//!
//! A [`Device`] is just an index plus a shared reference to the proxy's
//! session.  Every device command goes out as `device.<command> <index> ...`
//! on the same connection as everything else, so device handles obey the
//! same one-request-at-a-time ordering as the proxy itself.

use std::sync::Arc;

use peary_core::{Session, Transport};

use crate::error::ClientError;

/// A device added through a [`crate::Proxy`].
pub struct Device<T> {
    index: u32,
    session: Arc<Session<T>>,
}

impl<T> Clone for Device<T> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            session: Arc::clone(&self.session),
        }
    }
}

impl<T> std::fmt::Debug for Device<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("index", &self.index)
            .field("session", &self.session.id())
            .finish()
    }
}

impl<T: Transport> Device<T> {
    pub(crate) fn new(index: u32, session: Arc<Session<T>>) -> Self {
        Self { index, session }
    }

    /// Index the daemon assigned when the device was added.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Sends `device.<command>` with this device's index as first argument.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Session`] if the request fails.
    pub async fn request(&self, command: &str, args: &[&str]) -> Result<Vec<u8>, ClientError> {
        let command = format!("device.{command}");
        let index = self.index.to_string();
        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(index.as_str());
        full_args.extend_from_slice(args);
        Ok(self.session.request(&command, &full_args).await?)
    }

    /// The device's type name as reported by the daemon.
    pub async fn name(&self) -> Result<String, ClientError> {
        let payload = self.request("name", &[]).await?;
        Ok(String::from_utf8_lossy(&payload).into_owned())
    }

    pub async fn power_on(&self) -> Result<Vec<u8>, ClientError> {
        self.request("power_on", &[]).await
    }

    pub async fn power_off(&self) -> Result<Vec<u8>, ClientError> {
        self.request("power_off", &[]).await
    }

    pub async fn reset(&self) -> Result<Vec<u8>, ClientError> {
        self.request("reset", &[]).await
    }

    pub async fn configure(&self) -> Result<Vec<u8>, ClientError> {
        self.request("configure", &[]).await
    }

    /// Starts data acquisition on the device.
    pub async fn daq_start(&self) -> Result<Vec<u8>, ClientError> {
        self.request("daq_start", &[]).await
    }

    /// Stops data acquisition on the device.
    pub async fn daq_stop(&self) -> Result<Vec<u8>, ClientError> {
        self.request("daq_stop", &[]).await
    }
}
