//! Connection manager
//!
//! Brings the session from Disconnected to Connected, blocking the loop
//! through the retry policy while it does.

use iot_transport::{connect_with_retry, Connector, RetryPolicy, TransportError};
use tracing::{debug, warn};

use crate::session::{Session, SessionState};

/// Owns the connector and the retry policy
pub struct ConnectionManager<C: Connector> {
    connector: C,
    policy: RetryPolicy,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, policy: RetryPolicy) -> Self {
        Self { connector, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Make sure `session` holds a live stream.
    ///
    /// A no-op when it already does. Otherwise any stale stream is dropped
    /// and a new one is opened per the retry policy. Returns the number of
    /// attempts made (0 when already connected).
    pub async fn ensure_connected(
        &mut self,
        session: &mut Session<C::Stream>,
    ) -> Result<u32, TransportError> {
        if session.is_alive() {
            return Ok(0);
        }

        if session.state() != SessionState::Disconnected {
            session.disconnect("stale connection");
        }

        session.begin_connect();
        let host = session.host().to_string();
        let port = session.port();
        debug!("Connecting session to {}:{}", host, port);

        match connect_with_retry(&mut self.connector, &host, port, &self.policy).await {
            Ok((stream, attempts)) => {
                session.attach(stream);
                Ok(attempts)
            }
            Err(e) => {
                warn!("Could not connect to {}:{}: {}", host, port, e);
                session.disconnect("connect failed");
                Err(e)
            }
        }
    }
}

impl<C: Connector + std::fmt::Debug> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connector", &self.connector)
            .field("policy", &self.policy)
            .finish()
    }
}
