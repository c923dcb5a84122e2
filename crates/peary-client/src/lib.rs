//! # peary-client
//!
//! Client-side proxy for a peary device-control daemon, built on the
//! `peary-core` session.
//!
//! ```text
//! PearyClient::connect(&config)
//!       ↓  TCP connect + protocol_version handshake
//! Proxy<TcpTransport>          add_device / get_device / list_devices ...
//!       ↓  add_device("alpha")
//! Device<TcpTransport>         power_on / configure / daq_start ...
//! ```
//!
//! The proxy and its devices share one session, so every request from any
//! of them is serialised on the same connection.

pub mod client;
pub mod config;
pub mod device;
pub mod error;
pub mod proxy;

pub use client::PearyClient;
pub use config::{load_config, save_config, ClientConfig, ConfigError};
pub use device::Device;
pub use error::ClientError;
pub use proxy::Proxy;
