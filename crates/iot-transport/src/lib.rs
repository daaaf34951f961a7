//! iotclient Transport Layer
//!
//! Outbound connection plumbing for a device:
//! - [`Connector`] abstraction over "open a byte stream to host:port"
//! - [`TcpConnector`], the production connector
//! - [`RetryPolicy`] and [`connect_with_retry`] for the blocking reconnect loop

pub mod error;
pub mod retry;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use retry::{connect_with_retry, MaxRetries, RetryPolicy};
pub use tcp::{TcpConfig, TcpConnector};
pub use traits::Connector;
