//! Connection setup: TCP connect, version handshake, proxy.

use tokio::net::TcpStream;
use tracing::{debug, info};

use peary_core::{Session, SessionConfig, TcpTransport};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::proxy::Proxy;

/// Entry point for talking to a daemon over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct PearyClient;

impl PearyClient {
    /// Connects to the daemon described by `config` and negotiates a session.
    ///
    /// The TCP connect is bounded by `config.connect_timeout_secs`; the
    /// handshake itself is not.
    ///
    /// # Errors
    ///
    /// - [`ClientError::ConnectTimeout`] if the connection is not established in time.
    /// - [`ClientError::Connect`] if the address cannot be reached.
    /// - [`ClientError::Session`] if the handshake fails.
    pub async fn connect(config: &ClientConfig) -> Result<Proxy<TcpTransport>, ClientError> {
        let addr = config.address();
        debug!("connecting to {addr}");

        let stream = tokio::time::timeout(config.connect_timeout(), TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout {
                addr: addr.clone(),
                secs: config.connect_timeout_secs,
            })?
            .map_err(|source| ClientError::Connect {
                addr: addr.clone(),
                source,
            })?;

        let proxy = Self::from_stream(stream, config.session).await?;
        info!(session = %proxy.session().id(), "connected to daemon at {addr}");
        Ok(proxy)
    }

    /// Negotiates a session over an already-connected stream.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Session`] if the handshake fails.
    pub async fn from_stream(
        stream: TcpStream,
        session_config: SessionConfig,
    ) -> Result<Proxy<TcpTransport>, ClientError> {
        // Request/response round trips are tiny; don't let Nagle batch them.
        stream.set_nodelay(true)?;
        let session = Session::connect(TcpTransport::new(stream), session_config).await?;
        Ok(Proxy::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_to_closed_port_fails_with_connect_error() {
        // Arrange – bind then drop to obtain a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let config = ClientConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..ClientConfig::default()
        };

        // Act
        let err = PearyClient::connect(&config).await.unwrap_err();

        // Assert
        assert!(matches!(err, ClientError::Connect { ref addr, .. } if *addr == config.address()));
    }

    #[tokio::test]
    async fn test_handshake_failure_surfaces_as_session_error() {
        // Arrange – a peer that accepts and hangs up immediately
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });
        let stream = TcpStream::connect(addr).await.unwrap();

        // Act
        let err = PearyClient::from_stream(stream, SessionConfig::default())
            .await
            .unwrap_err();

        // Assert
        assert!(matches!(err, ClientError::Session(_)));
        assert!(err.requires_reconnect());
    }
}
