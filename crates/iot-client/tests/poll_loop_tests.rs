//! Poll loop tests over in-memory connections

use iot_client::{
    ClientConfig, ConfigStore, Exit, MemoryConfigStore, Outcome, PollLoop, PollLoopBuilder,
    Rejection, SessionState, Tick,
};
use iot_core::{cmd, Frame, FramingStrategy};
use iot_transport::MaxRetries;
use iot_test_utils::{
    test_device_config, CountingUpdater, DeviceCall, FakeNetwork, MockConnector, PeerQueue,
    RecordingDevice, DEFAULT_TIMEOUT, QUIET_PERIOD,
};
use std::sync::atomic::Ordering;
use std::time::Duration;

fn client_config(framing: FramingStrategy) -> ClientConfig {
    ClientConfig {
        framing,
        retry_backoff_ms: 1,
        read_window_ms: 20,
        tick_interval_ms: 1,
        ..ClientConfig::default()
    }
}

fn recording(
    framing: FramingStrategy,
) -> (PollLoop<MockConnector, RecordingDevice>, PeerQueue, RecordingDevice) {
    let device = RecordingDevice::new(2);
    let config = client_config(framing);
    let (connector, peers) = MockConnector::new(config.codec());
    let poll = PollLoopBuilder::new(connector, device.clone(), test_device_config("lock"))
        .client_config(config)
        .build();
    (poll, peers, device)
}

#[tokio::test]
async fn test_identify_over_the_wire_length_prefixed() {
    let (mut poll, mut peers, _) = recording(FramingStrategy::LengthPrefixed);

    assert_eq!(poll.tick().await, Tick::Continue);
    let mut server = peers.next().expect("device should connect");
    assert_eq!(poll.session().state(), SessionState::Connected);

    server.send_raw(&[0x00, 0x01, cmd::IDENTIFY]).await;
    poll.tick().await;

    let raw = server.recv_raw_within(DEFAULT_TIMEOUT).await;
    let mut expected = vec![0x00, 18, cmd::IDENTIFY];
    expected.extend_from_slice(b"abc-123##lock##{}");
    assert_eq!(raw, expected);
}

#[tokio::test]
async fn test_identify_over_the_wire_delimited() {
    let (mut poll, mut peers, _) = recording(FramingStrategy::Delimited);

    poll.tick().await;
    let mut server = peers.next().unwrap();

    server.send_frame(&Frame::command_only(cmd::IDENTIFY)).await;
    poll.tick().await;

    let reply = server.recv_frame().await;
    assert_eq!(reply.command, cmd::IDENTIFY);
    assert_eq!(reply.payload.as_ref(), b"abc-123##lock##{}");
}

#[tokio::test]
async fn test_device_frame_dispatched_without_reply() {
    let (mut poll, mut peers, device) = recording(FramingStrategy::Delimited);

    poll.tick().await;
    let mut server = peers.next().unwrap();

    server.send_raw(&[0x64, 0x01, 0xFF]).await;
    poll.tick().await;

    assert_eq!(device.actions(), vec![(1, vec![])]);
    assert!(server.recv_frame_within(QUIET_PERIOD).await.is_none());
}

#[tokio::test]
async fn test_one_frame_per_tick() {
    let (mut poll, mut peers, _) = recording(FramingStrategy::Delimited);

    poll.tick().await;
    let mut server = peers.next().unwrap();

    server.send_raw(&[cmd::HEARTBEAT, 0xFF, cmd::HEARTBEAT, 0xFF]).await;
    poll.tick().await;
    assert_eq!(poll.stats().frames, 1);
    assert!(server.recv_frame_within(QUIET_PERIOD).await.is_some());
    assert!(server.recv_frame_within(QUIET_PERIOD).await.is_none());

    poll.tick().await;
    assert_eq!(poll.stats().frames, 2);
    assert!(server.recv_frame_within(QUIET_PERIOD).await.is_some());
}

#[tokio::test]
async fn test_truncated_frame_keeps_session() {
    let (mut poll, mut peers, device) = recording(FramingStrategy::LengthPrefixed);

    poll.tick().await;
    let mut server = peers.next().unwrap();

    // Declares 10 bytes, only 6 follow
    server.send_raw(&[0x00, 0x0A, 0x64, 0x01, 0x02, 0x03, 0x04, 0x05]).await;
    poll.tick().await;

    assert_eq!(poll.stats().framing_errors, 1);
    assert!(device.calls().is_empty());
    assert!(poll.session().is_alive());
    assert!(server.recv_frame_within(QUIET_PERIOD).await.is_none());

    // The late tail is dropped even though it parses as an action frame
    server.send_raw(&[0x00, 0x02, 0x64, 0x00]).await;
    server.send_frame(&Frame::heartbeat()).await;
    poll.tick().await;
    assert_eq!(server.recv_frame().await, Frame::heartbeat());
    assert!(device.calls().is_empty());
    assert_eq!(poll.stats().framing_errors, 1);
    assert_eq!(poll.session().connects(), 1);
}

#[tokio::test]
async fn test_oversize_frame_body_never_dispatched() {
    let (mut poll, mut peers, device) = recording(FramingStrategy::LengthPrefixed);

    poll.tick().await;
    let mut server = peers.next().unwrap();

    // 2000-byte body, well past the receive buffer, made of valid-looking
    // action frames
    let mut oversize = vec![0x07, 0xD0];
    for _ in 0..500 {
        oversize.extend_from_slice(&[0x00, 0x02, 0x64, 0x00]);
    }
    server.send_raw(&oversize).await;
    server.send_frame(&Frame::heartbeat()).await;

    for _ in 0..6 {
        poll.tick().await;
    }

    assert!(device.calls().is_empty());
    assert_eq!(poll.stats().framing_errors, 1);
    assert_eq!(server.recv_frame().await, Frame::heartbeat());
    assert!(server.recv_frame_within(QUIET_PERIOD).await.is_none());
    assert!(poll.session().is_alive());
}

#[tokio::test]
async fn test_out_of_range_action_rejected() {
    let (mut poll, mut peers, device) = recording(FramingStrategy::Delimited);

    poll.tick().await;
    let mut server = peers.next().unwrap();

    server.send_raw(&[0x64, 0x02, 0xFF]).await;
    poll.tick().await;

    assert!(device.calls().is_empty());
    assert_eq!(
        poll.last_outcome(),
        Some(&Outcome::Rejected(Rejection::InvalidAction { action: 2, count: 2 }))
    );
    assert!(poll.session().is_alive());
}

#[tokio::test]
async fn test_reconnect_converges() {
    let device = RecordingDevice::new(2);
    let config = client_config(FramingStrategy::Delimited);
    let (connector, mut peers) = MockConnector::failing(config.codec(), 3);
    let attempts = connector.attempts();
    let mut poll = PollLoopBuilder::new(connector, device, test_device_config("lock"))
        .client_config(config)
        .build();

    poll.tick().await;

    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    assert_eq!(poll.session().state(), SessionState::Connected);
    assert_eq!(poll.session().connects(), 1);
    assert!(peers.next().is_some());
    assert!(peers.next().is_none());
}

#[tokio::test]
async fn test_bounded_retry_gives_up_and_tries_again() {
    let device = RecordingDevice::new(2);
    let config = ClientConfig {
        max_retries: MaxRetries::Limited(2),
        ..client_config(FramingStrategy::Delimited)
    };
    let (connector, _peers) = MockConnector::failing(config.codec(), 100);
    let attempts = connector.attempts();
    let updater = CountingUpdater::new();
    let mut poll = PollLoopBuilder::new(connector, device, test_device_config("lock"))
        .client_config(config)
        .updater(updater.clone())
        .build();

    assert_eq!(poll.tick().await, Tick::Continue);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(poll.session().state(), SessionState::Disconnected);

    poll.tick().await;
    assert_eq!(attempts.load(Ordering::SeqCst), 6);
    assert_eq!(updater.polls(), 2);
}

#[tokio::test]
async fn test_end_session_then_reconnect() {
    let (mut poll, mut peers, device) = recording(FramingStrategy::Delimited);

    poll.tick().await;
    let mut server = peers.next().unwrap();

    server.send_frame(&Frame::command_only(cmd::END_SESSION)).await;
    poll.tick().await;

    assert_eq!(device.calls(), vec![DeviceCall::EndSession]);
    assert_eq!(poll.session().state(), SessionState::Disconnected);
    assert!(server.is_closed().await);

    poll.tick().await;
    assert!(peers.next().is_some());
    assert_eq!(poll.session().connects(), 2);
}

#[tokio::test]
async fn test_server_close_triggers_reconnect() {
    let (mut poll, mut peers, _) = recording(FramingStrategy::Delimited);

    poll.tick().await;
    drop(peers.next().unwrap());

    poll.tick().await;
    assert_eq!(poll.session().state(), SessionState::Disconnected);

    poll.tick().await;
    assert_eq!(poll.session().connects(), 2);
}

#[tokio::test]
async fn test_reset_erases_store_and_restarts() {
    let device = RecordingDevice::new(2);
    let config = client_config(FramingStrategy::Delimited);
    let (connector, _peers) = MockConnector::new(config.codec());
    let record = test_device_config("lock");
    let mut poll = PollLoopBuilder::new(connector, device, record.clone())
        .client_config(config)
        .store(MemoryConfigStore::with_record(record))
        .build();

    poll.tick().await;
    assert!(poll.context().store.is_valid());

    poll.reset_hook().trigger();
    assert_eq!(poll.tick().await, Tick::Restart);
    assert!(!poll.context().store.is_valid());
    assert_eq!(poll.session().state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_run_exits_on_reset() {
    let device = RecordingDevice::new(2);
    let config = client_config(FramingStrategy::Delimited);
    let (connector, _peers) = MockConnector::new(config.codec());
    let mut poll = PollLoopBuilder::new(connector, device, test_device_config("lock"))
        .client_config(config)
        .build();

    let hook = poll.reset_hook();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        hook.trigger();
    });

    let exit = tokio::time::timeout(DEFAULT_TIMEOUT, poll.run()).await.unwrap();
    assert_eq!(exit, Exit::Restart);
}

#[tokio::test]
async fn test_run_until_shutdown() {
    let (mut poll, _peers, _) = recording(FramingStrategy::Delimited);

    let exit = poll
        .run_until(tokio::time::sleep(Duration::from_millis(30)))
        .await;
    assert_eq!(exit, Exit::Shutdown);
    assert_eq!(poll.session().state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_link_down_runs_provisioning() {
    let device = RecordingDevice::new(2);
    let config = client_config(FramingStrategy::Delimited);
    let (connector, mut peers) = MockConnector::new(config.codec());
    let attempts = connector.attempts();
    let network = FakeNetwork::new(false, true);
    let mut poll = PollLoopBuilder::new(connector, device.clone(), test_device_config("lock"))
        .client_config(config)
        .network(network.clone())
        .build();

    poll.tick().await;
    assert_eq!(network.provisions(), 1);
    assert_eq!(device.calls(), vec![DeviceCall::LinkChange(true)]);
    assert_eq!(attempts.load(Ordering::SeqCst), 0);

    poll.tick().await;
    assert!(peers.next().is_some());
    assert_eq!(network.provisions(), 1);
}

#[tokio::test]
async fn test_failed_provisioning_reported() {
    let device = RecordingDevice::new(2);
    let config = client_config(FramingStrategy::Delimited);
    let (connector, _peers) = MockConnector::new(config.codec());
    let network = FakeNetwork::new(false, false);
    let mut poll = PollLoopBuilder::new(connector, device.clone(), test_device_config("lock"))
        .client_config(config)
        .network(network.clone())
        .build();

    poll.tick().await;
    poll.tick().await;
    assert_eq!(network.provisions(), 2);
    assert_eq!(
        device.calls(),
        vec![DeviceCall::LinkChange(false), DeviceCall::LinkChange(false)]
    );
}

#[tokio::test]
async fn test_link_loss_drops_session() {
    let device = RecordingDevice::new(2);
    let config = client_config(FramingStrategy::Delimited);
    let (connector, mut peers) = MockConnector::new(config.codec());
    let network = FakeNetwork::new(true, true);
    let mut poll = PollLoopBuilder::new(connector, device, test_device_config("lock"))
        .client_config(config)
        .network(network.clone())
        .build();

    poll.tick().await;
    let mut server = peers.next().unwrap();

    network.set_up(false);
    poll.tick().await;
    assert_eq!(poll.session().state(), SessionState::Disconnected);
    assert!(server.is_closed().await);
}
