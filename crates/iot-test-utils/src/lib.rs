//! Common test helpers for iotclient tests
//!
//! - An in-memory connector whose server side is handed to the test
//! - Recording actuators and a recording device
//! - Fake network provisioning and updater

use async_trait::async_trait;
use bytes::BytesMut;
use iot_client::device::light::{LightOutput, LightState};
use iot_client::device::lock::LockActuator;
use iot_client::device::{ActionArgs, Device};
use iot_client::{DeviceConfig, DeviceError, Network, Updater};
use iot_core::{Decoded, Frame, FrameCodec};
use iot_transport::{Connector, TransportError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait before concluding that nothing was sent
pub const QUIET_PERIOD: Duration = Duration::from_millis(50);

/// Device record pointing at a mock server
pub fn test_device_config(device_type: &str) -> DeviceConfig {
    let mut config = DeviceConfig::defaults(device_type);
    config.uuid = "abc-123".to_string();
    config.payload = "{}".to_string();
    config
}

// ============================================================================
// Mock Connector
// ============================================================================

/// Connector that fails a set number of times, then hands out in-memory
/// streams. The server end of every stream goes to the paired [`PeerQueue`].
pub struct MockConnector {
    failures_left: u32,
    attempts: Arc<AtomicU32>,
    codec: FrameCodec,
    peers: mpsc::UnboundedSender<ServerPeer>,
}

/// Server ends of the streams a [`MockConnector`] handed out
pub struct PeerQueue {
    peers: mpsc::UnboundedReceiver<ServerPeer>,
}

impl MockConnector {
    /// Connector that succeeds on the first attempt
    pub fn new(codec: FrameCodec) -> (Self, PeerQueue) {
        Self::failing(codec, 0)
    }

    /// Connector whose first `failures` attempts are refused
    pub fn failing(codec: FrameCodec, failures: u32) -> (Self, PeerQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                failures_left: failures,
                attempts: Arc::new(AtomicU32::new(0)),
                codec,
                peers: tx,
            },
            PeerQueue { peers: rx },
        )
    }

    /// Shared count of connect attempts
    pub fn attempts(&self) -> Arc<AtomicU32> {
        self.attempts.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Stream = DuplexStream;

    async fn connect(&mut self, host: &str, port: u16) -> Result<DuplexStream, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(TransportError::ConnectionFailed(format!(
                "{host}:{port}: connection refused"
            )));
        }

        let (device_end, server_end) = tokio::io::duplex(4096);
        let peer = ServerPeer::new(server_end, self.codec.clone());
        self.peers
            .send(peer)
            .map_err(|_| TransportError::ConnectionFailed("peer queue closed".into()))?;
        Ok(device_end)
    }
}

impl PeerQueue {
    /// Next accepted connection, if any
    pub fn next(&mut self) -> Option<ServerPeer> {
        self.peers.try_recv().ok()
    }
}

/// Server side of one mock connection
pub struct ServerPeer {
    stream: DuplexStream,
    codec: FrameCodec,
    rx: BytesMut,
}

impl ServerPeer {
    pub fn new(stream: DuplexStream, codec: FrameCodec) -> Self {
        Self {
            stream,
            codec,
            rx: BytesMut::new(),
        }
    }

    /// Encode and send a frame
    pub async fn send_frame(&mut self, frame: &Frame) {
        let bytes = self.codec.encode_frame(frame).unwrap();
        self.send_raw(&bytes).await;
    }

    /// Send bytes as-is
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Next frame from the device, or `None` if nothing arrives in `max_wait`
    pub async fn recv_frame_within(&mut self, max_wait: Duration) -> Option<Frame> {
        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            if let Decoded::Frame(frame) = self.codec.decode(&mut self.rx).unwrap() {
                return Some(frame);
            }
            let mut chunk = [0u8; 512];
            match tokio::time::timeout_at(deadline, self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) | Err(_) => return None,
                Ok(Ok(n)) => self.rx.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => panic!("peer read failed: {e}"),
            }
        }
    }

    /// Next frame from the device; panics after [`DEFAULT_TIMEOUT`]
    pub async fn recv_frame(&mut self) -> Frame {
        self.recv_frame_within(DEFAULT_TIMEOUT)
            .await
            .expect("no frame from device")
    }

    /// Read raw bytes the device sent, waiting at most `max_wait`
    pub async fn recv_raw_within(&mut self, max_wait: Duration) -> Vec<u8> {
        let mut out = self.rx.split().to_vec();
        let mut chunk = [0u8; 512];
        if let Ok(Ok(n)) = tokio::time::timeout(max_wait, self.stream.read(&mut chunk)).await {
            out.extend_from_slice(&chunk[..n]);
        }
        out
    }

    /// Whether the device closed its end
    pub async fn is_closed(&mut self) -> bool {
        let mut chunk = [0u8; 64];
        matches!(
            tokio::time::timeout(QUIET_PERIOD, self.stream.read(&mut chunk)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }
}

// ============================================================================
// Recording Devices
// ============================================================================

/// Lock actuator that records every command
#[derive(Clone, Default)]
pub struct RecordingLock {
    commands: Arc<Mutex<Vec<bool>>>,
}

impl RecordingLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engaged flags in call order
    pub fn commands(&self) -> Vec<bool> {
        self.commands.lock().clone()
    }
}

impl LockActuator for RecordingLock {
    fn set_engaged(&mut self, engaged: bool) {
        self.commands.lock().push(engaged);
    }
}

/// Light output that records every rendered state
#[derive(Clone, Default)]
pub struct RecordingLight {
    frames: Arc<Mutex<Vec<LightState>>>,
}

impl RecordingLight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<LightState> {
        self.frames.lock().clone()
    }

    pub fn last(&self) -> Option<LightState> {
        self.frames.lock().last().copied()
    }
}

impl LightOutput for RecordingLight {
    fn render(&mut self, state: &LightState) {
        self.frames.lock().push(*state);
    }
}

/// One recorded device call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Action { action: u8, args: Vec<u8> },
    EndSession,
    LinkChange(bool),
}

/// Device with a fixed number of actions that records its calls
#[derive(Clone)]
pub struct RecordingDevice {
    actions: usize,
    calls: Arc<Mutex<Vec<DeviceCall>>>,
}

impl RecordingDevice {
    pub fn new(actions: usize) -> Self {
        Self {
            actions,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().clone()
    }

    /// Only the action calls
    pub fn actions(&self) -> Vec<(u8, Vec<u8>)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Action { action, args } => Some((*action, args.clone())),
                _ => None,
            })
            .collect()
    }
}

impl Device for RecordingDevice {
    fn device_type(&self) -> &'static str {
        "lock"
    }

    fn action_count(&self) -> usize {
        self.actions
    }

    fn handle(&mut self, action: u8, mut args: ActionArgs<'_>) -> Result<(), DeviceError> {
        let mut bytes = Vec::with_capacity(args.len());
        while args.remaining() > 0 {
            bytes.push(args.next_u8("arg")?);
        }
        self.calls.lock().push(DeviceCall::Action {
            action,
            args: bytes,
        });
        Ok(())
    }

    fn end_session(&mut self) {
        self.calls.lock().push(DeviceCall::EndSession);
    }

    fn on_link_change(&mut self, up: bool) {
        self.calls.lock().push(DeviceCall::LinkChange(up));
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Network whose link state the test controls
#[derive(Clone)]
pub struct FakeNetwork {
    up: Arc<AtomicBool>,
    provision_result: bool,
    provisions: Arc<AtomicU32>,
}

impl FakeNetwork {
    /// Link starts `up`; provisioning brings it up when `provision_result`
    pub fn new(up: bool, provision_result: bool) -> Self {
        Self {
            up: Arc::new(AtomicBool::new(up)),
            provision_result,
            provisions: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub fn provisions(&self) -> u32 {
        self.provisions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    fn is_link_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn ensure_link_up(&mut self) -> bool {
        self.provisions.fetch_add(1, Ordering::SeqCst);
        self.up.store(self.provision_result, Ordering::SeqCst);
        self.provision_result
    }
}

/// Updater that counts polls
#[derive(Clone, Default)]
pub struct CountingUpdater {
    polls: Arc<AtomicU32>,
}

impl CountingUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

impl Updater for CountingUpdater {
    fn poll(&mut self) {
        self.polls.fetch_add(1, Ordering::SeqCst);
    }
}
