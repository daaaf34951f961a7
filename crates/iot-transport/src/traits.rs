//! Transport trait definitions

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// Opens the single outbound stream a device keeps to its server
#[async_trait]
pub trait Connector: Send {
    /// Stream produced by a successful connect
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Make one connection attempt
    async fn connect(&mut self, host: &str, port: u16) -> Result<Self::Stream>;
}
