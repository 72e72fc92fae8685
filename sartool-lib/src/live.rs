//! Messages exchanged over the live SAR device service.
//!
//! A SAR state is a 12-byte header followed by `element_count` antenna
//! entries of 8 bytes each, packed with no gap. The count travels in the
//! header, so neither side knows the full message length until the header
//! has been read.

use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use std::fmt;
use strum_macros::Display;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::constants::*;
use crate::error::SarError;
use crate::record::Record;

/// Device-service opcodes understood by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Opcode {
    #[strum(to_string = "SET_SAR_STATE")]
    SetSarState = 0x01,
    #[strum(to_string = "GET_SAR_STATE")]
    GetSarState = 0x02,
    #[strum(to_string = "GET_GEO_STATE")]
    GetGeoState = 0x10,
    /// Reply is two u32 words: major, minor
    #[strum(to_string = "GET_INTERFACE_VERSION")]
    GetInterfaceVersion = 0x80,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u32)]
pub enum BackoffStatus {
    Disabled = 0,
    Enabled = 1,
    #[num_enum(catch_all)]
    Unknown(u32),
}

impl Default for BackoffStatus {
    fn default() -> Self {
        BackoffStatus::Disabled
    }
}

impl fmt::Display for BackoffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffStatus::Disabled => write!(f, "disabled"),
            BackoffStatus::Enabled => write!(f, "enabled"),
            BackoffStatus::Unknown(raw) => write!(f, "unknown ({raw:#x})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct SarStateHeader {
    pub backoff_status: U32,
    /// Antenna selection bit mask
    pub mimo_config_type: U32,
    pub element_count: U32,
}

impl Record for SarStateHeader {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct AntennaConfig {
    pub antenna_index: U32,
    pub backoff_index: U32,
}

impl Record for AntennaConfig {}

const _: () = assert!(std::mem::size_of::<SarStateHeader>() == SAR_STATE_HEADER_SIZE);
const _: () = assert!(std::mem::size_of::<AntennaConfig>() == ANTENNA_CONFIG_SIZE);

/// One antenna mapped to one power table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AntennaBackoff {
    pub antenna_index: u32,
    pub backoff_index: u32,
}

impl AntennaBackoff {
    pub fn new(antenna_index: u32, backoff_index: u32) -> Self {
        Self {
            antenna_index,
            backoff_index,
        }
    }
}

impl From<AntennaConfig> for AntennaBackoff {
    fn from(raw: AntennaConfig) -> Self {
        Self::new(raw.antenna_index.get(), raw.backoff_index.get())
    }
}

impl From<AntennaBackoff> for AntennaConfig {
    fn from(pair: AntennaBackoff) -> Self {
        Self {
            antenna_index: U32::new(pair.antenna_index),
            backoff_index: U32::new(pair.backoff_index),
        }
    }
}

/// Live SAR state: used as the SET request and the GET reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveSarState {
    pub backoff_status: BackoffStatus,
    pub mimo_config_type: u32,
    pub antennas: Vec<AntennaBackoff>,
}

impl LiveSarState {
    pub fn new(backoff_status: BackoffStatus, mimo_config_type: u32, antennas: Vec<AntennaBackoff>) -> Self {
        Self {
            backoff_status,
            mimo_config_type,
            antennas,
        }
    }

    /// Bytes needed for a message carrying `entries` antenna entries.
    pub const fn wire_size(entries: usize) -> usize {
        SAR_STATE_HEADER_SIZE + entries * ANTENNA_CONFIG_SIZE
    }

    pub fn encoded_len(&self) -> usize {
        Self::wire_size(self.antennas.len())
    }

    pub fn header(&self) -> SarStateHeader {
        SarStateHeader {
            backoff_status: U32::new(self.backoff_status.into()),
            mimo_config_type: U32::new(self.mimo_config_type),
            element_count: U32::new(self.antennas.len() as u32),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(self.header().as_bytes());
        for pair in &self.antennas {
            buf.put_slice(AntennaConfig::from(*pair).as_bytes());
        }
        buf.freeze()
    }

    /// Decode the header, then exactly `element_count` entries. Bytes past
    /// the last entry are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, SarError> {
        let header = SarStateHeader::decode(bytes)?;
        let count = header.element_count.get() as usize;

        let needed = count
            .checked_mul(ANTENNA_CONFIG_SIZE)
            .and_then(|n| n.checked_add(SAR_STATE_HEADER_SIZE))
            .ok_or(SarError::truncated(usize::MAX, bytes.len()))?;
        if bytes.len() < needed {
            return Err(SarError::truncated(needed, bytes.len()));
        }

        let antennas = bytes[SAR_STATE_HEADER_SIZE..needed]
            .chunks_exact(ANTENNA_CONFIG_SIZE)
            .map(|chunk| AntennaConfig::decode(chunk).map(AntennaBackoff::from))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            backoff_status: BackoffStatus::from_primitive(header.backoff_status.get()),
            mimo_config_type: header.mimo_config_type.get(),
            antennas,
        })
    }
}

impl fmt::Display for LiveSarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "backoff {}, mimo_config_type = {:#x}, elements = {}",
            self.backoff_status,
            self.mimo_config_type,
            self.antennas.len()
        )?;
        for pair in &self.antennas {
            writeln!(
                f,
                "    antenna_index {:#x}, backoff_index = {}",
                pair.antenna_index, pair.backoff_index
            )?;
        }
        Ok(())
    }
}

/// Reply to `GET_INTERFACE_VERSION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct InterfaceVersion {
    pub major: U32,
    pub minor: U32,
}

impl Record for InterfaceVersion {}

const _: () = assert!(std::mem::size_of::<InterfaceVersion>() == INTERFACE_VERSION_SIZE);

impl InterfaceVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            major: U32::new(major),
            minor: U32::new(minor),
        }
    }

    pub fn current() -> Self {
        Self::new(SAR_INTERFACE_VERSION_MAJOR, SAR_INTERFACE_VERSION_MINOR)
    }

    /// Both ends must agree on the major version; minor bumps are additive.
    pub fn is_compatible(&self) -> bool {
        self.major.get() == SAR_INTERFACE_VERSION_MAJOR
    }
}

impl fmt::Display for InterfaceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major.get(), self.minor.get())
    }
}
