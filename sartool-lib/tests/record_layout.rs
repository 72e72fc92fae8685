//! Tests for the fixed provisioning record layouts

mod common;

use common::*;
use sartool_lib::provisioning::ProvisioningSet;

#[test]
fn test_record_sizes() {
    assert_eq!(ConfigHeader::SIZE, 16);
    assert_eq!(ConfigValues::SIZE, 19);
    assert_eq!(RegionConfig::SIZE, 12);
    assert_eq!(PowerTable::SIZE, 60);
    assert_eq!(ConfigHeader::canonical_size(), 54);
}

#[test]
fn test_canonical_records_encode_to_fixtures() {
    let set = ProvisioningSet::canonical();
    assert_eq!(set.header.encode(), fixture(CANONICAL_HEADER));
    assert_eq!(set.values.encode(), fixture(CANONICAL_VALUES));
    assert_eq!(set.region.encode(), fixture(CANONICAL_REGION));
    assert_eq!(set.table.encode().len(), POWER_TABLE_SIZE);
}

#[test]
fn test_boundary_values_survive_decode() {
    for byte in [0x00u8, 0xff] {
        let raw = vec![byte; ConfigValues::SIZE];
        let values = ConfigValues::decode(&raw).expect("19 bytes should decode");
        let expected_word = if byte == 0 { 0 } else { u32::MAX };
        assert_eq!(values.safety_timer_ms.get(), expected_word);
        assert_eq!(values.sleep_mode_state_index_table, byte);
        assert_eq!(values.encode().as_ref(), raw.as_slice());
    }
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let mut raw = fixture(CANONICAL_HEADER).to_vec();
    raw.extend_from_slice(&[0xee; 8]);

    let header = ConfigHeader::decode(&raw).expect("over-long buffer should decode");
    assert_eq!(header.size, 54);
    assert_eq!(header.reserved, [0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f]);
}

#[test]
fn test_short_buffers_are_truncated() {
    let cases: Vec<(usize, Result<(), SarError>)> = vec![
        (16, ConfigHeader::decode(&[0u8; 15]).map(|_| ())),
        (19, ConfigValues::decode(&[0u8; 18]).map(|_| ())),
        (12, RegionConfig::decode(&[0u8; 10]).map(|_| ())),
        (60, PowerTable::decode(&[]).map(|_| ())),
    ];

    for (size, result) in cases {
        match result {
            Err(SarError::TruncatedInput { expected, .. }) => assert_eq!(expected, size),
            other => panic!("expected TruncatedInput for {}-byte record, got {:?}", size, other),
        }
    }
}

#[test]
fn test_size_field_is_not_validated_by_decode() {
    let mut raw = fixture(CANONICAL_VALUES).to_vec();
    raw[0] = 0x42;
    let values = ConfigValues::decode(&raw).expect("decode is structural only");
    assert_eq!(values.size, 0x42);
    assert!(!values.is_size_consistent());
}

#[test]
fn test_power_table_fixed_point() {
    let mut table = PowerTable::default();
    table.values[3][2] = 24;

    assert_eq!(table.backoff(3, 2), Some(3.0));
    assert_eq!(table.backoff(12, 0), None);
    let rendered = table.to_string();
    assert!(rendered.lines().nth(3).unwrap().contains(" 3.000"));
}

fn filled<R: Record>(byte: u8) -> Vec<u8> {
    vec![byte; R::SIZE]
}

#[test]
fn test_header_boundaries_round_trip() {
    for byte in [0x00u8, 0xff] {
        let raw = filled::<ConfigHeader>(byte);
        let header = ConfigHeader::decode(&raw).expect("16 bytes should decode");
        assert_eq!(header.size, byte);
        assert_eq!(header.timer_format, byte);
        assert_eq!(header.reserved, [byte; 6]);
        assert_eq!(header.encode().as_ref(), raw.as_slice());
        assert_eq!(ConfigHeader::decode(&header.encode()).unwrap(), header);
    }
}

#[test]
fn test_region_boundaries_round_trip() {
    for byte in [0x00u8, 0xff] {
        let raw = filled::<RegionConfig>(byte);
        let region = RegionConfig::decode(&raw).expect("12 bytes should decode");
        let expected_word = if byte == 0 { 0 } else { u32::MAX };
        assert_eq!(region.geo_location_value.get(), expected_word);
        assert_eq!(region.country_code.get(), u16::from_le_bytes([byte, byte]));
        assert_eq!(region.tail_padding, [byte; 2]);
        assert_eq!(region.encode().as_ref(), raw.as_slice());
        assert_eq!(RegionConfig::decode(&region.encode()).unwrap(), region);
    }
}

#[test]
fn test_power_table_boundaries_round_trip() {
    for byte in [0x00u8, 0xff] {
        let raw = filled::<PowerTable>(byte);
        let table = PowerTable::decode(&raw).expect("60 bytes should decode");
        assert!(table.values.iter().flatten().all(|&cell| cell == byte));
        assert_eq!(table.encode().as_ref(), raw.as_slice());
        assert_eq!(PowerTable::decode(&table.encode()).unwrap(), table);
    }
}
