//! Tests for the live SAR command protocol against the emulated driver

mod common;

use common::*;
use sartool_lib::WifiSar;

fn one_pair() -> LiveSarState {
    LiveSarState::new(BackoffStatus::Enabled, 0, vec![AntennaBackoff::new(0x1, 5)])
}

#[test]
fn test_set_request_layout() {
    let bytes = one_pair().encode();
    assert_eq!(bytes.len(), SAR_STATE_HEADER_SIZE + ANTENNA_CONFIG_SIZE);
    assert_eq!(bytes, fixture("01000000 00000000 01000000 01000000 05000000"));
}

#[test]
fn test_element_count_drives_length() {
    let empty = LiveSarState::new(BackoffStatus::Disabled, 0, vec![]);
    assert_eq!(empty.encode().len(), SAR_STATE_HEADER_SIZE);
    assert_eq!(LiveSarState::decode(&empty.encode()).unwrap().antennas.len(), 0);

    let two = LiveSarState::new(
        BackoffStatus::Enabled,
        0x3,
        vec![AntennaBackoff::new(0x1, 1), AntennaBackoff::new(0x2, 0)],
    );
    assert_eq!(two.encode().len(), SAR_STATE_HEADER_SIZE + 16);
}

#[test]
fn test_get_decodes_only_declared_entries() {
    // Room for two entries, header says one; the second slot is garbage
    let raw = fixture("01000000 00000000 01000000 02000000 07000000 ffffffff ffffffff");
    let state = LiveSarState::decode(&raw).unwrap();
    assert_eq!(state.antennas, vec![AntennaBackoff::new(0x2, 7)]);
}

#[test]
fn test_get_with_short_reply_is_truncated() {
    let raw = fixture("01000000 00000000 02000000 01000000 05000000");
    assert!(matches!(
        LiveSarState::decode(&raw),
        Err(SarError::TruncatedInput { expected: 28, actual: 20 })
    ));
}

#[test]
fn test_set_then_get_through_emulator() {
    let wlan = EmulatedWlan::new();
    let (status, state) = WifiSar::with_session(wlan.clone(), |device| {
        let status = device.set_sar_state(&one_pair())?;
        Ok((status, device.get_sar_state()?))
    })
    .unwrap();

    assert!(status.is_success());
    assert_eq!(state, one_pair());
    assert!(!wlan.is_open());
    assert_eq!(wlan.close_count(), 1);

    let commands = wlan.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].opcode, u32::from(Opcode::SetSarState));
    assert_eq!(commands[0].interface, EMULATED_INTERFACE);
    assert_eq!(commands[0].service, SAR_DEVICE_SERVICE);
    assert_eq!(commands[1].opcode, u32::from(Opcode::GetSarState));
    assert!(commands[1].input.is_empty());
    assert_eq!(commands[1].output_capacity, LiveSarState::wire_size(2));
}

#[test]
fn test_rejected_set_is_structured_status() {
    let wlan = EmulatedWlan::new();
    let bad = LiveSarState::new(BackoffStatus::Enabled, 0, vec![AntennaBackoff::new(0x8, 40)]);

    let status = WifiSar::with_session(wlan.clone(), |device| device.set_sar_state(&bad)).unwrap();
    assert_eq!(status.bits(), 3);
    assert!(status.contains(StatusCode::INVALID_ANTENNA_INDEX));
    assert!(status.contains(StatusCode::INVALID_TABLE_INDEX));
    assert!(!status.is_success());

    // Nothing was applied
    assert_eq!(wlan.current(), LiveSarState::default());
}

#[test]
fn test_short_set_reply_is_truncated() {
    let wlan = EmulatedWlan::new();
    wlan.limit_replies(2);

    let result = WifiSar::with_session(wlan, |device| device.set_sar_state(&one_pair()));
    assert!(matches!(result, Err(SarError::TruncatedInput { expected: 4, actual: 2 })));
}

#[test]
fn test_too_many_entries_is_invalid_argument() {
    let wlan = EmulatedWlan::new();
    let three = LiveSarState::new(BackoffStatus::Enabled, 0x3, vec![AntennaBackoff::default(); 3]);

    let result = WifiSar::with_session(wlan.clone(), |device| device.set_sar_state(&three));
    assert!(matches!(result, Err(SarError::InvalidArgument(_))));
    assert!(wlan.commands().is_empty());
}

#[test]
fn test_open_failure_is_fatal() {
    let wlan = EmulatedWlan::new();
    wlan.fail(WlanOperation::Open, code::ERROR_NOT_SUPPORTED);

    match WifiSar::open(wlan) {
        Err(err @ SarError::TransportFailure { operation: "WlanOpenHandle", .. }) => assert!(err.is_fatal()),
        Err(other) => panic!("expected TransportFailure, got {:?}", other),
        Ok(_) => panic!("open should fail"),
    }
}

#[test]
fn test_no_interfaces_closes_channel() {
    let wlan = EmulatedWlan::with_interfaces(vec![]);
    let result = WifiSar::open(wlan.clone());

    assert!(matches!(
        result,
        Err(SarError::TransportFailure { code: code::ERROR_NOT_FOUND, .. })
    ));
    assert!(!wlan.is_open());
    assert_eq!(wlan.close_count(), 1);
}

#[test]
fn test_command_failure_still_closes() {
    let wlan = EmulatedWlan::new();
    wlan.fail(WlanOperation::Command, code::ERROR_DEVICE_NOT_AVAILABLE);

    let result = WifiSar::with_session(wlan.clone(), |device| device.get_sar_state());
    assert!(matches!(
        result,
        Err(SarError::TransportFailure {
            operation: "WlanDeviceServiceCommand",
            code: failed,
        }) if failed == code::ERROR_DEVICE_NOT_AVAILABLE
    ));
    assert_eq!(wlan.close_count(), 1);
}

#[test]
fn test_interface_version_query() {
    let wlan = EmulatedWlan::new();
    let version = WifiSar::with_session(wlan.clone(), |device| device.interface_version()).unwrap();
    assert_eq!(version, InterfaceVersion::new(1, 3));
    assert!(version.is_compatible());

    wlan.set_version(InterfaceVersion::new(2, 0));
    let newer = WifiSar::with_session(wlan, |device| device.interface_version()).unwrap();
    assert!(!newer.is_compatible());
}

#[test]
fn test_dropping_open_handle_closes() {
    let wlan = EmulatedWlan::new();
    {
        let _device = WifiSar::open(wlan.clone()).unwrap();
        assert!(wlan.is_open());
    }
    assert!(!wlan.is_open());
}

#[test]
fn test_live_state_extremes_round_trip() {
    let state = LiveSarState::new(
        BackoffStatus::Unknown(u32::MAX),
        u32::MAX,
        vec![AntennaBackoff::new(u32::MAX, u32::MAX), AntennaBackoff::new(0, 0)],
    );
    let encoded = state.encode();
    assert_eq!(encoded.len(), LiveSarState::wire_size(2));
    assert_eq!(&encoded[..8], &[0xff; 8]);
    assert_eq!(&encoded[8..12], &[0x02, 0x00, 0x00, 0x00]);

    let decoded = LiveSarState::decode(&encoded).expect("two entries should decode");
    assert_eq!(decoded, state);
    assert_eq!(decoded.backoff_status, BackoffStatus::Unknown(u32::MAX));

    let zeroed = LiveSarState::decode(&[0u8; 12]).expect("empty state should decode");
    assert_eq!(zeroed, LiveSarState::default());
    assert_eq!(zeroed.encode().as_ref(), &[0u8; 12]);
}

#[test]
fn test_interface_version_extremes_round_trip() {
    for word in [0u32, u32::MAX] {
        let version = InterfaceVersion::new(word, word);
        let decoded = InterfaceVersion::decode(&version.encode()).unwrap();
        assert_eq!(decoded, version);
        assert_eq!(decoded.major.get(), word);
    }
}

#[test]
fn test_status_word_extremes_round_trip() {
    let all = StatusCode::decode(&[0xff; 4]).unwrap();
    assert_eq!(all.bits(), u32::MAX);
    assert!(!all.is_success());
    assert!(all.contains(StatusCode::STATE_ERROR | StatusCode::MIMO_NOT_SET));
    assert_eq!(all.encode(), [0xff; 4]);

    let none = StatusCode::decode(&[0x00; 4]).unwrap();
    assert!(none.is_success());
    assert_eq!(none.encode(), [0x00; 4]);
}
