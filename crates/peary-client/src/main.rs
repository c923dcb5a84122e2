//! `peary`: command-line client for a peary device-control daemon.
//!
//! # Usage
//!
//! ```text
//! peary [OPTIONS] <COMMAND>
//!
//! Commands:
//!   keep-alive                          Check the connection
//!   list-remote-devices                 Devices known to the daemon
//!   add-device <NAME>                   Add a device, print its index
//!   device <NAME> <COMMAND> [ARGS]...   Add a device, then send it a command
//!   request <COMMAND> [ARGS]...         Send a raw command
//!
//! Options:
//!   --config    <PATH>   TOML config file [default: peary.toml]
//!   --host      <HOST>   Daemon host (overrides config)
//!   --port      <PORT>   Daemon port (overrides config)
//!   --integrity <MODE>   none | crc32 (overrides config)
//! ```
//!
//! Each command prints the daemon's reply payload on stdout.
//!
//! # Environment variable overrides
//!
//! | Variable          | Flag          |
//! |-------------------|---------------|
//! | `PEARY_CONFIG`    | `--config`    |
//! | `PEARY_HOST`      | `--host`      |
//! | `PEARY_PORT`      | `--port`      |
//! | `PEARY_INTEGRITY` | `--integrity` |
//!
//! `RUST_LOG` takes precedence over the configured `log_level`.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use peary_client::{load_config, ClientConfig, ClientError, PearyClient, Proxy};
use peary_core::{IntegrityMode, TcpTransport};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Command-line client for a peary device-control daemon.
#[derive(Debug, Parser)]
#[command(name = "peary", version)]
struct Cli {
    /// Path to the TOML config file.  A missing file means defaults.
    #[arg(long, default_value = "peary.toml", env = "PEARY_CONFIG")]
    config: PathBuf,

    /// Hostname or IP address of the daemon.
    #[arg(long, env = "PEARY_HOST")]
    host: Option<String>,

    /// TCP port of the daemon.
    #[arg(long, env = "PEARY_PORT")]
    port: Option<u16>,

    /// Frame integrity check.  Must match the daemon's setting.
    #[arg(long, value_enum, env = "PEARY_INTEGRITY")]
    integrity: Option<Integrity>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Integrity {
    None,
    Crc32,
}

impl From<Integrity> for IntegrityMode {
    fn from(value: Integrity) -> Self {
        match value {
            Integrity::None => IntegrityMode::None,
            Integrity::Crc32 => IntegrityMode::Crc32,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send an empty request to check the connection.
    KeepAlive,
    /// Print the daemon's device listing.
    ListRemoteDevices,
    /// Add a device and print the index the daemon assigned.
    AddDevice { name: String },
    /// Add a device, then send it `device.<command>`.
    Device {
        name: String,
        command: String,
        args: Vec<String>,
    },
    /// Send a raw command with arguments.
    Request { command: String, args: Vec<String> },
}

impl Cli {
    /// Applies command-line overrides on top of the file config.
    fn apply_overrides(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(integrity) = self.integrity {
            config.session.integrity = integrity.into();
        }
        config
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    let config = cli.apply_overrides(config);

    // `RUST_LOG` wins; otherwise use the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(?config, "starting");

    let mut proxy = PearyClient::connect(&config)
        .await
        .with_context(|| format!("failed to connect to {}", config.address()))?;

    let result = run(&mut proxy, cli.command).await;
    let closed = proxy.close().await;

    let payload = finish(result, closed)?;
    println!("{}", String::from_utf8_lossy(&payload));
    Ok(())
}

/// Executes one subcommand and returns the payload to print.
async fn run(proxy: &mut Proxy<TcpTransport>, command: Command) -> anyhow::Result<Vec<u8>> {
    let payload = match command {
        Command::KeepAlive => proxy.keep_alive().await?,
        Command::ListRemoteDevices => proxy.list_remote_devices().await?,
        Command::AddDevice { name } => {
            let device = proxy
                .add_device(&name)
                .await
                .with_context(|| format!("failed to add device {name:?}"))?;
            device.index().to_string().into_bytes()
        }
        Command::Device {
            name,
            command,
            args,
        } => {
            let device = proxy
                .add_device(&name)
                .await
                .with_context(|| format!("failed to add device {name:?}"))?;
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            device
                .request(&command, &args)
                .await
                .with_context(|| format!("device.{command} failed"))?
        }
        Command::Request { command, args } => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            proxy.request(&command, &args).await?
        }
    };
    Ok(payload)
}

/// Combines the command outcome with the close outcome.  A command failure
/// wins; a close failure alongside it is only logged.
fn finish(
    result: anyhow::Result<Vec<u8>>,
    closed: Result<(), ClientError>,
) -> anyhow::Result<Vec<u8>> {
    match (result, closed) {
        (Err(e), Err(close_err)) => {
            warn!("failed to close connection: {close_err}");
            Err(e)
        }
        (result, closed) => {
            closed.context("failed to close connection")?;
            result
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_device_command_with_args() {
        // Arrange / Act
        let cli = Cli::parse_from(["peary", "device", "alpha", "set_register", "vthr", "12"]);

        // Assert
        match cli.command {
            Command::Device {
                name,
                command,
                args,
            } => {
                assert_eq!(name, "alpha");
                assert_eq!(command, "set_register");
                assert_eq!(args, vec!["vthr", "12"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_overrides_replace_config_values() {
        let cli = Cli::parse_from([
            "peary",
            "--host",
            "daq-01",
            "--port",
            "4000",
            "--integrity",
            "crc32",
            "keep-alive",
        ]);

        let config = cli.apply_overrides(ClientConfig::default());

        assert_eq!(config.host, "daq-01");
        assert_eq!(config.port, 4000);
        assert_eq!(config.session.integrity, IntegrityMode::Crc32);
    }

    #[test]
    fn test_cli_without_overrides_keeps_config() {
        let cli = Cli::parse_from(["peary", "list-remote-devices"]);
        let file_config = ClientConfig {
            host: "from-file".to_string(),
            ..ClientConfig::default()
        };

        let config = cli.apply_overrides(file_config.clone());

        assert_eq!(config, file_config);
    }

    fn close_error() -> ClientError {
        ClientError::Io(std::io::Error::new(std::io::ErrorKind::Other, "shutdown failed"))
    }

    #[test]
    fn test_finish_keeps_command_error_when_close_also_fails() {
        // Arrange
        let result = Err(anyhow::anyhow!("device.reset failed"));

        // Act
        let err = finish(result, Err(close_error())).unwrap_err();

        // Assert
        assert_eq!(err.to_string(), "device.reset failed");
    }

    #[test]
    fn test_finish_reports_close_error_after_successful_command() {
        let err = finish(Ok(b"ok".to_vec()), Err(close_error())).unwrap_err();

        assert_eq!(err.to_string(), "failed to close connection");
        assert!(err.downcast_ref::<ClientError>().is_some());
    }

    #[test]
    fn test_finish_returns_payload_when_both_succeed() {
        let payload = finish(Ok(b"3".to_vec()), Ok(())).unwrap();

        assert_eq!(payload, b"3");
    }
}
