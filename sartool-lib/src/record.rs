//! Fixed-layout provisioning records.
//!
//! Every record here is byte-packed and little-endian, matching what the WLAN
//! driver reads out of UEFI. Field order and width are the contract: the
//! layouts are checked against the sizes in [`crate::constants`] at compile time.
//!
//! Decoding is purely structural. A `size` field that disagrees with the
//! record width is decoded as-is; checking it is up to the caller.

use bytes::Bytes;
use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use std::fmt;
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::constants::*;
use crate::error::SarError;

/// Shared encode/decode for every fixed-size wire record.
pub trait Record: FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned + Sized {
    const SIZE: usize = std::mem::size_of::<Self>();

    fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }

    /// Decode from the front of `bytes`. Trailing bytes are ignored.
    fn decode(bytes: &[u8]) -> Result<Self, SarError> {
        Self::read_from_prefix(bytes)
            .map(|(record, _rest)| record)
            .map_err(|_| SarError::truncated(Self::SIZE, bytes.len()))
    }
}

const _: () = assert!(std::mem::size_of::<ConfigHeader>() == CONFIG_HEADER_SIZE);
const _: () = assert!(std::mem::size_of::<ConfigValues>() == CONFIG_VALUES_SIZE);
const _: () = assert!(std::mem::size_of::<RegionConfig>() == REGION_CONFIG_SIZE);
const _: () = assert!(std::mem::size_of::<PowerTable>() == POWER_TABLE_SIZE);

#[cfg(feature = "serde")]
mod le {
    use serde::Serializer;
    use zerocopy::byteorder::little_endian::{U16, U32};

    pub fn u16<S: Serializer>(value: &U16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(value.get())
    }

    pub fn u32<S: Serializer>(value: &U32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(value.get())
    }
}

/// Wi-Fi generation flags carried in `ConfigHeader::radio_technology`.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioTechnology {
    pub ac: bool,
    pub ax: bool,
    pub ad: bool,
    #[skip]
    unused: B5,
}

impl RadioTechnology {
    pub fn from_byte(raw: u8) -> Self {
        Self::from_bytes([raw])
    }

    pub fn to_byte(self) -> u8 {
        self.into_bytes()[0]
    }
}

impl fmt::Display for RadioTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [(self.ac(), "802.11ac"), (self.ax(), "802.11ax"), (self.ad(), "802.11ad")]
            .into_iter()
            .filter_map(|(set, name)| set.then_some(name))
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// Describes a provisioning blob: two value blocks follow at the given offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(C)]
pub struct ConfigHeader {
    /// Header plus all value blocks, in bytes
    pub size: u8,
    pub values_offset1: u8,
    pub values_offset2: u8,
    /// `RadioTechnology` bits
    pub radio_technology: u8,
    pub product_id: u8,
    pub version: u8,
    pub revision: u8,
    pub table_count: u8,
    pub tables_compressed: u8,
    pub timer_format: u8,
    /// Round-tripped verbatim, never interpreted
    pub reserved: [u8; 6],
}

impl Record for ConfigHeader {}

impl Default for ConfigHeader {
    fn default() -> Self {
        Self::new_zeroed()
    }
}

impl ConfigHeader {
    /// Size of the canonical blob: header plus two value blocks.
    pub const fn canonical_size() -> usize {
        CONFIG_HEADER_SIZE + 2 * CONFIG_VALUES_SIZE
    }

    pub fn technology(&self) -> RadioTechnology {
        RadioTechnology::from_byte(self.radio_technology)
    }

    /// Offsets of the two value blocks. These are authoritative over any
    /// assumption about the blob layout.
    pub fn value_offsets(&self) -> [usize; 2] {
        [self.values_offset1 as usize, self.values_offset2 as usize]
    }

    /// Value-block offsets of the canonical blob: right after the header, then back to back.
    pub const fn canonical_offsets() -> [usize; 2] {
        [CONFIG_HEADER_SIZE, CONFIG_HEADER_SIZE + CONFIG_VALUES_SIZE]
    }

    pub fn has_canonical_layout(&self) -> bool {
        self.size as usize == Self::canonical_size() && self.value_offsets() == Self::canonical_offsets()
    }
}

impl fmt::Display for ConfigHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "size = 0x{:02x}", self.size)?;
        writeln!(f, "values_offset1 = 0x{:02x}", self.values_offset1)?;
        writeln!(f, "values_offset2 = 0x{:02x}", self.values_offset2)?;
        writeln!(f, "radio_technology = 0x{:02x} ({})", self.radio_technology, self.technology())?;
        writeln!(f, "product_id = 0x{:02x}", self.product_id)?;
        writeln!(f, "version = 0x{:02x}", self.version)?;
        writeln!(f, "revision = 0x{:02x}", self.revision)?;
        writeln!(f, "table_count = 0x{:02x}", self.table_count)?;
        writeln!(f, "tables_compressed = 0x{:02x}", self.tables_compressed)?;
        writeln!(f, "timer_format = 0x{:02x}", self.timer_format)?;
        for (i, byte) in self.reserved.iter().enumerate() {
            writeln!(f, "reserved[{}] = 0x{:02x}", i, byte)?;
        }
        Ok(())
    }
}

/// One SAR timing/state policy block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(C)]
pub struct ConfigValues {
    /// Self-describing length, 19 when well formed
    pub size: u8,
    #[cfg_attr(feature = "serde", serde(serialize_with = "le::u32"))]
    pub safety_timer_ms: U32,
    #[cfg_attr(feature = "serde", serde(serialize_with = "le::u32"))]
    pub safety_response_timeout_ms: U32,
    #[cfg_attr(feature = "serde", serde(serialize_with = "le::u32"))]
    pub unsolicited_update_timer_ms: U32,
    pub sar_state: u8,
    // 8-bit on the wire. The vendor architecture document describes a 32-bit
    // 0xFFFFFFFF flag here; the driver reads one byte.
    pub sleep_mode_state: u8,
    pub power_on_state: u8,
    pub power_on_state_after_failure: u8,
    pub safety_table_index: u8,
    pub sleep_mode_state_index_table: u8,
}

impl Record for ConfigValues {}

impl Default for ConfigValues {
    fn default() -> Self {
        Self::new_zeroed()
    }
}

impl ConfigValues {
    /// True when the embedded `size` matches the record width.
    pub fn is_size_consistent(&self) -> bool {
        self.size as usize == CONFIG_VALUES_SIZE
    }
}

impl fmt::Display for ConfigValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "size = 0x{:02x}", self.size)?;
        writeln!(f, "safety_timer_ms = 0x{:08x}", self.safety_timer_ms.get())?;
        writeln!(f, "safety_response_timeout_ms = 0x{:08x}", self.safety_response_timeout_ms.get())?;
        writeln!(f, "unsolicited_update_timer_ms = 0x{:08x}", self.unsolicited_update_timer_ms.get())?;
        writeln!(f, "sar_state = 0x{:02x}", self.sar_state)?;
        writeln!(f, "sleep_mode_state = 0x{:02x}", self.sleep_mode_state)?;
        writeln!(f, "power_on_state = 0x{:02x}", self.power_on_state)?;
        writeln!(f, "power_on_state_after_failure = 0x{:02x}", self.power_on_state_after_failure)?;
        writeln!(f, "safety_table_index = 0x{:02x}", self.safety_table_index)?;
        writeln!(f, "sleep_mode_state_index_table = 0x{:02x}", self.sleep_mode_state_index_table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum DynamicGeoState {
    Disabled = 0,
    Enabled = 1,
    #[num_enum(catch_all)]
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum DynamicGeoType {
    /// Determine the region at runtime only (e.g. 802.11d)
    DynamicOnly = 0,
    /// Use the static value unless it is 0xFFFFFFFF, then go dynamic
    StaticThenDynamic = 1,
    /// Prefer a dynamic result, fall back to the static value
    DynamicThenStatic = 2,
    Unassigned = 3,
    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Geo/region policy, read only by the WLAN driver.
///
/// The driver compiles this record with natural alignment, so it is 12 bytes
/// on the wire: the ten bytes of fields plus two bytes of tail padding, which
/// are carried explicitly and round-tripped like reserved bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(C)]
pub struct RegionConfig {
    /// Two ASCII characters, first character in the high byte
    #[cfg_attr(feature = "serde", serde(serialize_with = "le::u16"))]
    pub country_code: U16,
    #[cfg_attr(feature = "serde", serde(serialize_with = "le::u16"))]
    pub reserved: U16,
    #[cfg_attr(feature = "serde", serde(serialize_with = "le::u32"))]
    pub geo_location_value: U32,
    pub dynamic_geo_state: u8,
    pub dynamic_geo_type: u8,
    pub tail_padding: [u8; 2],
}

impl Record for RegionConfig {}

impl Default for RegionConfig {
    fn default() -> Self {
        Self::new_zeroed()
    }
}

impl RegionConfig {
    /// Pack a two-letter ASCII country code (`"PH"` becomes `0x5048`).
    pub fn pack_country(code: &str) -> Result<U16, SarError> {
        match code.as_bytes() {
            [first, second] if first.is_ascii() && second.is_ascii() => {
                Ok(U16::new(u16::from_be_bytes([*first, *second])))
            }
            _ => Err(SarError::InvalidArgument(format!(
                "country code must be two ASCII characters, got {code:?}"
            ))),
        }
    }

    /// The two country characters. Non-printable bytes come back as `?`.
    pub fn country(&self) -> String {
        self.country_code
            .get()
            .to_be_bytes()
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
            .collect()
    }

    pub fn geo_state(&self) -> DynamicGeoState {
        DynamicGeoState::from_primitive(self.dynamic_geo_state)
    }

    pub fn geo_type(&self) -> DynamicGeoType {
        DynamicGeoType::from_primitive(self.dynamic_geo_type)
    }
}

impl fmt::Display for RegionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "country_code = 0x{:04x} ({})", self.country_code.get(), self.country())?;
        writeln!(f, "geo_location_value = 0x{:08x}", self.geo_location_value.get())?;
        writeln!(f, "dynamic_geo_state = 0x{:02x} ({:?})", self.dynamic_geo_state, self.geo_state())?;
        writeln!(f, "dynamic_geo_type = 0x{:02x} ({:?})", self.dynamic_geo_type, self.geo_type())
    }
}

/// 12 tables of 5 backoff indices. Each cell is fixed point with 3 fractional bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(C)]
pub struct PowerTable {
    pub values: [[u8; POWER_TABLE_COLUMNS]; POWER_TABLE_ROWS],
}

impl Record for PowerTable {}

impl Default for PowerTable {
    fn default() -> Self {
        Self::new_zeroed()
    }
}

impl PowerTable {
    /// Cell value in human units (`raw / 8.0`), `None` outside the grid.
    pub fn backoff(&self, row: usize, column: usize) -> Option<f64> {
        self.values
            .get(row)
            .and_then(|r| r.get(column))
            .map(|&raw| raw as f64 / POWER_TABLE_SCALE)
    }

    pub fn format_cell(raw: u8) -> String {
        format!("{:6.3}", raw as f64 / POWER_TABLE_SCALE)
    }
}

impl fmt::Display for PowerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.values {
            let cells: Vec<String> = row.iter().map(|&raw| Self::format_cell(raw)).collect();
            writeln!(f, "{}", cells.join(" - "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_technology_bit_positions() {
        assert_eq!(RadioTechnology::new().with_ac(true).to_byte(), 1);
        assert_eq!(RadioTechnology::new().with_ax(true).to_byte(), 2);
        assert_eq!(RadioTechnology::new().with_ad(true).to_byte(), 4);

        let mixed = RadioTechnology::from_byte(0x05);
        assert!(mixed.ac() && mixed.ad() && !mixed.ax());
        assert_eq!(mixed.to_string(), "802.11ac|802.11ad");
    }

    #[test]
    fn test_geo_enums_keep_unknown_values() {
        assert_eq!(DynamicGeoType::from_primitive(2), DynamicGeoType::DynamicThenStatic);
        assert_eq!(DynamicGeoType::from_primitive(9), DynamicGeoType::Unknown(9));
        assert_eq!(u8::from(DynamicGeoState::Unknown(7)), 7);
    }

    #[test]
    fn test_country_code_packing() {
        let packed = RegionConfig::pack_country("PH").unwrap();
        assert_eq!(packed.get(), 0x5048);

        let region = RegionConfig {
            country_code: packed,
            ..RegionConfig::default()
        };
        assert_eq!(region.country(), "PH");
        assert_eq!(&region.as_bytes()[..2], &[0x48, 0x50]);

        assert!(RegionConfig::pack_country("PHL").is_err());
        assert!(RegionConfig::pack_country("é").is_err());
    }

    #[test]
    fn test_power_table_cell_rendering() {
        assert_eq!(PowerTable::format_cell(24), " 3.000");
        assert_eq!(PowerTable::format_cell(1), " 0.125");
        assert_eq!(PowerTable::format_cell(255), "31.875");
    }
}
