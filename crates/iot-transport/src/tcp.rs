//! TCP transport implementation
//!
//! The production connector: one plain TCP stream to the server. Framing is
//! handled above this layer, so the stream is handed out raw.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Connector;

/// TCP configuration
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Keep-alive interval in seconds (0 = disabled)
    pub keepalive_secs: u64,
    /// Disable Nagle so small replies go out immediately
    pub nodelay: bool,
    /// Bound on a single connect attempt; `None` waits for the OS
    pub connect_timeout: Option<Duration>,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: 30,
            nodelay: true,
            connect_timeout: None,
        }
    }
}

/// TCP connector
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    config: TcpConfig,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TcpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    fn configure(&self, stream: &TcpStream) {
        if self.config.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                debug!("TCP_NODELAY: {}", e);
            }
        }

        if self.config.keepalive_secs > 0 {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(self.config.keepalive_secs));
            if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
                debug!("TCP keepalive: {}", e);
            }
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&mut self, host: &str, port: u16) -> Result<TcpStream> {
        debug!("Connecting to TCP: {}:{}", host, port);

        let attempt = TcpStream::connect((host, port));
        let stream = match self.config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| TransportError::Timeout)?,
            None => attempt.await,
        }
        .map_err(|e| TransportError::ConnectionFailed(format!("{host}:{port}: {e}")))?;

        self.configure(&stream);
        info!("TCP connected to {}:{}", host, port);
        Ok(stream)
    }
}
