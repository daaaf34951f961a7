//! The one outbound session
//!
//! A session owns the stream (when there is one), the receive buffer and the
//! device identity sent on identify. There is never more than one.

use bytes::BytesMut;
use iot_core::IdentifyBody;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, info, trace};

use iot_transport::TransportError;

/// Read chunk size
const READ_CHUNK: usize = 256;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Session with the server
pub struct Session<S> {
    host: String,
    port: u16,
    state: SessionState,
    identity: IdentifyBody,
    rx: BytesMut,
    rx_capacity: usize,
    stream: Option<S>,
    connects: u64,
    eof: bool,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a disconnected session. `rx_capacity` bounds the receive buffer
    /// and should be at least one frame's wire size.
    pub fn new(host: &str, port: u16, identity: IdentifyBody, rx_capacity: usize) -> Self {
        Self {
            host: host.to_string(),
            port,
            state: SessionState::Disconnected,
            identity,
            rx: BytesMut::with_capacity(rx_capacity),
            rx_capacity: rx_capacity.max(1),
            stream: None,
            connects: 0,
            eof: false,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> &IdentifyBody {
        &self.identity
    }

    /// Number of successful connects over the session's lifetime
    pub fn connects(&self) -> u64 {
        self.connects
    }

    /// Connected with a usable stream
    pub fn is_alive(&self) -> bool {
        self.state == SessionState::Connected && self.stream.is_some() && !self.eof
    }

    /// Peer closed its side
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    pub(crate) fn begin_connect(&mut self) {
        self.state = SessionState::Connecting;
    }

    /// Install a freshly connected stream
    pub fn attach(&mut self, stream: S) {
        self.stream = Some(stream);
        self.state = SessionState::Connected;
        self.rx.clear();
        self.eof = false;
        self.connects += 1;
        info!("Session connected to {}:{}", self.host, self.port);
    }

    /// Drop the stream and any buffered bytes
    pub fn disconnect(&mut self, reason: &str) {
        if self.stream.take().is_some() {
            info!("Session closed: {}", reason);
        }
        self.state = SessionState::Disconnected;
        self.rx.clear();
        self.eof = false;
    }

    /// Buffered, not yet decoded bytes
    pub fn rx_mut(&mut self) -> &mut BytesMut {
        &mut self.rx
    }

    /// Read whatever arrives within `window`, up to the buffer's capacity.
    /// Stops early once `ready` accepts the buffered bytes. Returns the number
    /// of bytes appended.
    pub async fn fill(
        &mut self,
        window: Duration,
        ready: impl Fn(&[u8]) -> bool,
    ) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let deadline = Instant::now() + window;
        let mut chunk = [0u8; READ_CHUNK];
        let mut total = 0;

        while self.rx.len() < self.rx_capacity && !ready(&self.rx) {
            let room = (self.rx_capacity - self.rx.len()).min(READ_CHUNK);
            match tokio::time::timeout_at(deadline, stream.read(&mut chunk[..room])).await {
                Err(_) => break,
                Ok(Ok(0)) => {
                    debug!("Peer closed the stream");
                    self.eof = true;
                    break;
                }
                Ok(Ok(n)) => {
                    trace!("rx {:02X?}", &chunk[..n]);
                    self.rx.extend_from_slice(&chunk[..n]);
                    total += n;
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    /// Write one encoded frame
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        trace!("tx {:02X?}", bytes);
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state)
            .field("buffered", &self.rx.len())
            .field("connects", &self.connects)
            .finish()
    }
}
