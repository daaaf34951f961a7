//! Command interpreter tests

use iot_client::device::light::{Effect, LightDevice, Rgb};
use iot_client::device::lock::LockDevice;
use iot_client::device::{AnyDevice, Device, DEVICE_FAMILY_TAG};
use iot_client::{DeviceError, Interpreter, Outcome, Rejection};
use iot_core::{cmd, Frame, FrameCodec, IdentifyBody};
use iot_test_utils::{DeviceCall, RecordingDevice, RecordingLight, RecordingLock};

fn identity() -> IdentifyBody {
    IdentifyBody::new("abc-123", "lock", "{}")
}

fn lock() -> (AnyDevice, RecordingLock) {
    let actuator = RecordingLock::new();
    let device = LockDevice::new(Box::new(actuator.clone())).unwrap();
    (AnyDevice::Lock(device), actuator)
}

fn light() -> (AnyDevice, RecordingLight) {
    let output = RecordingLight::new();
    let device = LightDevice::new(Box::new(output.clone())).unwrap();
    (AnyDevice::Light(device), output)
}

#[test]
fn test_identify_reply_delimited() {
    let mut interpreter = Interpreter::new();
    let (mut device, _) = lock();

    let frame = Frame::command_only(cmd::IDENTIFY);
    let outcome = interpreter.interpret(&frame, &identity(), &mut device);
    let Outcome::Reply(reply) = outcome else {
        panic!("expected a reply, got {outcome:?}");
    };
    assert_eq!(reply.payload.as_ref(), b"abc-123##lock##{}");

    let wire = FrameCodec::delimited().encode_frame(&reply).unwrap();
    let mut expected = vec![cmd::IDENTIFY];
    expected.extend_from_slice(b"abc-123##lock##{}");
    expected.push(0xFF);
    assert_eq!(wire.as_ref(), expected.as_slice());
}

#[test]
fn test_identify_reply_length_prefixed() {
    let mut interpreter = Interpreter::new();
    let (mut device, _) = lock();

    let frame = Frame::command_only(cmd::IDENTIFY);
    let outcome = interpreter.interpret(&frame, &identity(), &mut device);
    let Outcome::Reply(reply) = outcome else {
        panic!("expected a reply, got {outcome:?}");
    };

    let wire = FrameCodec::length_prefixed().encode_frame(&reply).unwrap();
    // Length covers the command byte and the whole body text
    assert_eq!(&wire[..2], &[0x00, 18]);
    assert_eq!(wire[2], cmd::IDENTIFY);
    assert_eq!(&wire[3..], b"abc-123##lock##{}");
}

#[test]
fn test_heartbeat_always_answered() {
    let mut interpreter = Interpreter::new();
    let (mut device, _) = lock();

    // Interleave other traffic so earlier history varies
    interpreter.interpret(&Frame::new(DEVICE_FAMILY_TAG, vec![0x07]), &identity(), &mut device);
    interpreter.interpret(&Frame::command_only(0x42), &identity(), &mut device);

    for _ in 0..5 {
        let outcome = interpreter.interpret(&Frame::heartbeat(), &identity(), &mut device);
        assert_eq!(outcome, Outcome::Reply(Frame::heartbeat()));
    }
    assert_eq!(interpreter.stats().replies, 5);
}

#[test]
fn test_device_action_invoked_once_without_reply() {
    let mut interpreter = Interpreter::new();
    let (mut device, actuator) = lock();

    let frame = Frame::from_body(&[0x64, 0x01]).unwrap();
    let outcome = interpreter.interpret(&frame, &identity(), &mut device);

    assert_eq!(outcome, Outcome::Executed { action: 1 });
    assert_eq!(actuator.commands(), vec![true]);
}

#[test]
fn test_lock_release() {
    let mut interpreter = Interpreter::new();
    let (mut device, actuator) = lock();

    interpreter.interpret(&Frame::new(0x64, vec![0x01]), &identity(), &mut device);
    interpreter.interpret(&Frame::new(0x64, vec![0x00]), &identity(), &mut device);
    assert_eq!(actuator.commands(), vec![true, false]);
}

#[test]
fn test_out_of_range_action_never_invoked() {
    let mut interpreter = Interpreter::new();
    let mut device = RecordingDevice::new(4);

    for action in 4..=u8::MAX {
        let outcome = interpreter.interpret(
            &Frame::new(DEVICE_FAMILY_TAG, vec![action, 0x01, 0x02]),
            &identity(),
            &mut device,
        );
        assert_eq!(
            outcome,
            Outcome::Rejected(Rejection::InvalidAction { action, count: 4 })
        );
    }

    assert!(device.calls().is_empty());
    assert_eq!(interpreter.stats().invalid_actions, 252);
}

#[test]
fn test_unknown_command_ignored() {
    let mut interpreter = Interpreter::new();
    let mut device = RecordingDevice::new(2);

    let outcome = interpreter.interpret(&Frame::new(0x42, vec![0x01]), &identity(), &mut device);
    assert_eq!(outcome, Outcome::Ignored { command: 0x42 });
    assert!(device.calls().is_empty());
}

#[test]
fn test_end_session_runs_cleanup() {
    let mut interpreter = Interpreter::new();
    let mut device = RecordingDevice::new(2);

    let frame = Frame::command_only(cmd::END_SESSION);
    let outcome = interpreter.interpret(&frame, &identity(), &mut device);
    assert_eq!(outcome, Outcome::EndSession);
    assert_eq!(device.calls(), vec![DeviceCall::EndSession]);
}

#[test]
fn test_light_solid() {
    let mut interpreter = Interpreter::new();
    let (mut device, output) = light();

    let frame = Frame::new(DEVICE_FAMILY_TAG, vec![0x00, 9, 128, 0x12, 0x34, 0x56]);
    let outcome = interpreter.interpret(&frame, &identity(), &mut device);
    assert_eq!(outcome, Outcome::Executed { action: 0 });

    let state = output.last().unwrap();
    assert_eq!(state.effect, Effect::Solid);
    assert_eq!(state.brightness, 128);
    assert_eq!(state.primary, Rgb::new(0x12, 0x34, 0x56));
}

#[test]
fn test_light_alternate_reads_all_args() {
    let mut interpreter = Interpreter::new();
    let (mut device, output) = light();

    let frame = Frame::new(DEVICE_FAMILY_TAG, vec![0x02, 40, 200, 1, 2, 3, 4, 5, 6]);
    interpreter.interpret(&frame, &identity(), &mut device);

    let state = output.last().unwrap();
    assert_eq!(state.effect, Effect::Alternate);
    assert_eq!(state.speed, 40);
    assert_eq!(state.primary, Rgb::new(1, 2, 3));
    assert_eq!(state.secondary, Rgb::new(4, 5, 6));
}

#[test]
fn test_light_short_frame_fails_without_rendering() {
    let mut interpreter = Interpreter::new();
    let (mut device, output) = light();

    // Pulse needs speed, brightness and three colour bytes
    let frame = Frame::new(DEVICE_FAMILY_TAG, vec![0x01, 40, 200, 1]);
    let outcome = interpreter.interpret(&frame, &identity(), &mut device);

    assert_eq!(
        outcome,
        Outcome::Rejected(Rejection::ActionFailed(DeviceError::MissingArgument {
            name: "primary green",
            offset: 3,
            available: 3,
        }))
    );
    assert!(output.frames().is_empty());
    assert_eq!(interpreter.stats().failed_actions, 1);
}

#[test]
fn test_light_off_takes_no_args() {
    let mut interpreter = Interpreter::new();
    let (mut device, output) = light();

    interpreter.interpret(&Frame::new(DEVICE_FAMILY_TAG, vec![0x03]), &identity(), &mut device);
    assert_eq!(output.last().unwrap().effect, Effect::Off);
}

#[test]
fn test_link_change_colours() {
    let (mut device, output) = light();

    device.on_link_change(true);
    assert_eq!(output.last().unwrap().primary, Rgb::GREEN);

    device.on_link_change(false);
    assert_eq!(output.last().unwrap().primary, Rgb::RED);
}

#[test]
fn test_device_action_counts() {
    let (lock, _) = lock();
    let (light, _) = light();
    assert_eq!(lock.action_count(), 2);
    assert_eq!(light.action_count(), 4);
    assert_eq!(lock.device_type(), "lock");
    assert_eq!(light.device_type(), "rgb_light");
}
