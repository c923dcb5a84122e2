//! TOML-based configuration for the peary client.
//!
//! # What goes in the file? (for beginners)
//!
//! Everything needed to reach a daemon and talk to it:
//!
//! ```toml
//! host = "lab-daq-01"
//! port = 12345
//! connect_timeout_secs = 5
//! log_level = "info"
//!
//! [session]
//! integrity = "crc32"
//! buffer_size = 4096
//! ```
//!
//! Every field has a serde default, so an empty file (or no file at all)
//! yields a config pointing at `localhost:12345` without integrity checks.
//! Command-line flags override whatever the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use peary_core::SessionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema ─────────────────────────────────────────────────────────────

/// Connection and session settings for one daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Hostname or IP address of the daemon.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port the daemon listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long to wait for the TCP connection to be established.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// `tracing` log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Framing options fixed for the lifetime of each session.
    #[serde(default)]
    pub session: SessionConfig,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    12345
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            log_level: default_log_level(),
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// Loads a `ClientConfig` from `path`, returning `ClientConfig::default()`
/// if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path` as pretty TOML, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use peary_core::IntegrityMode;

    #[test]
    fn test_client_config_defaults() {
        // Arrange / Act
        let cfg = ClientConfig::default();

        // Assert
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 12345);
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.session.integrity, IntegrityMode::None);
        assert_eq!(cfg.session.buffer_size, 4096);
    }

    #[test]
    fn test_address_joins_host_and_port() {
        let cfg = ClientConfig {
            host: "10.0.0.7".to_string(),
            port: 4000,
            ..ClientConfig::default()
        };
        assert_eq!(cfg.address(), "10.0.0.7:4000");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: ClientConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn test_partial_session_section_keeps_other_defaults() {
        // Arrange
        let toml_str = r#"
port = 9999

[session]
integrity = "crc32"
"#;

        // Act
        let cfg: ClientConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.port, 9999);
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.session.integrity, IntegrityMode::Crc32);
        assert_eq!(cfg.session.buffer_size, 4096);
    }

    #[test]
    fn test_unknown_integrity_mode_is_rejected() {
        let result: Result<ClientConfig, toml::de::Error> =
            toml::from_str("[session]\nintegrity = \"md5\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.toml");

        // Act
        let cfg = load_config(&path).expect("missing file is not an error");

        // Assert
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        // Arrange – nested path exercises directory creation
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("peary.toml");
        let mut cfg = ClientConfig::default();
        cfg.host = "daq-host".to_string();
        cfg.session.integrity = IntegrityMode::Crc32;
        cfg.session.buffer_size = 65536;

        // Act
        save_config(&path, &cfg).expect("save");
        let restored = load_config(&path).expect("load");

        // Assert
        assert_eq!(restored, cfg);
    }

    #[test]
    fn test_load_malformed_file_returns_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[[[ not valid toml").expect("write");

        let result = load_config(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
