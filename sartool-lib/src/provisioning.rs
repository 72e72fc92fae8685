//! Best-effort transfer of the four provisioning variables between records and a store.
//!
//! Each variable is handled on its own: one failure is logged and recorded,
//! and the rest are still attempted. The caller decides the exit status from
//! the returned [`ProvisioningOutcome`].

use std::fmt;
use tracing::{debug, info, warn};
use zerocopy::byteorder::little_endian::U32;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::constants::*;
use crate::error::SarError;
use crate::guid::Guid;
use crate::record::{ConfigHeader, ConfigValues, DynamicGeoState, DynamicGeoType, PowerTable, Record, RegionConfig};
use crate::store::VariableStore;

/// The four named variables, in write order (common scope first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    SarHeader,
    SarConfig,
    RegionConfig,
    SarTable,
}

impl Variable {
    pub const ALL: [Variable; 4] = [
        Variable::SarHeader,
        Variable::SarConfig,
        Variable::RegionConfig,
        Variable::SarTable,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variable::SarHeader => VAR_SAR_HEADER,
            Variable::SarConfig => VAR_SAR_CONFIG,
            Variable::RegionConfig => VAR_REGION_CONFIG,
            Variable::SarTable => VAR_SAR_TABLE,
        }
    }

    pub fn scope(self) -> Guid {
        match self {
            Variable::SarHeader | Variable::SarConfig => UEFI_COMMON_SCOPE,
            Variable::RegionConfig | Variable::SarTable => UEFI_IHV_SCOPE,
        }
    }

    /// Size of the record stored under this variable.
    pub fn size(self) -> usize {
        match self {
            Variable::SarHeader => ConfigHeader::SIZE,
            Variable::SarConfig => ConfigValues::SIZE,
            Variable::RegionConfig => RegionConfig::SIZE,
            Variable::SarTable => PowerTable::SIZE,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// All four provisioning records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ProvisioningSet {
    pub header: ConfigHeader,
    pub values: ConfigValues,
    pub region: RegionConfig,
    pub table: PowerTable,
}

impl ProvisioningSet {
    /// The built-in example values written by `setconfig`.
    pub fn canonical() -> Self {
        let header = ConfigHeader {
            size: ConfigHeader::canonical_size() as u8,
            values_offset1: CONFIG_HEADER_SIZE as u8,
            values_offset2: (CONFIG_HEADER_SIZE + CONFIG_VALUES_SIZE) as u8,
            radio_technology: 4,
            product_id: 4,
            version: 5,
            revision: 6,
            table_count: 7,
            tables_compressed: 8,
            timer_format: 9,
            reserved: [0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f],
        };

        let values = ConfigValues {
            size: CONFIG_VALUES_SIZE as u8,
            safety_timer_ms: U32::new(0xABCD_EF01),
            safety_response_timeout_ms: U32::new(0xBBBB_BBBB),
            unsolicited_update_timer_ms: U32::new(0xCCCC_CCCC),
            sar_state: 0x55,
            sleep_mode_state: 0x44,
            power_on_state: 0x33,
            power_on_state_after_failure: 0x22,
            safety_table_index: 0x11,
            sleep_mode_state_index_table: 0x05,
        };

        let region = RegionConfig {
            // "PH" packed high byte first
            country_code: 0x5048u16.into(),
            reserved: 0u16.into(),
            geo_location_value: U32::new(0x1111_1111),
            dynamic_geo_state: DynamicGeoState::Enabled.into(),
            dynamic_geo_type: DynamicGeoType::DynamicThenStatic.into(),
            tail_padding: [0; 2],
        };

        let mut table = PowerTable::default();
        for (r, row) in table.values.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (1 + c + POWER_TABLE_COLUMNS * r) as u8;
            }
        }

        Self {
            header,
            values,
            region,
            table,
        }
    }

    fn encoded(&self, variable: Variable) -> bytes::Bytes {
        match variable {
            Variable::SarHeader => self.header.encode(),
            Variable::SarConfig => self.values.encode(),
            Variable::RegionConfig => self.region.encode(),
            Variable::SarTable => self.table.encode(),
        }
    }

    fn populate(&mut self, variable: Variable, bytes: &[u8]) -> Result<(), SarError> {
        match variable {
            Variable::SarHeader => self.header = ConfigHeader::decode(bytes)?,
            Variable::SarConfig => self.values = ConfigValues::decode(bytes)?,
            Variable::RegionConfig => self.region = RegionConfig::decode(bytes)?,
            Variable::SarTable => self.table = PowerTable::decode(bytes)?,
        }
        Ok(())
    }
}

impl fmt::Display for ProvisioningSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IHV record layout {}.{}", SAR_IHV_VERSION_MAJOR, SAR_IHV_VERSION_MINOR)?;
        writeln!(f)?;
        writeln!(f, "SAR config header:")?;
        write!(f, "{}", self.header)?;
        writeln!(f)?;
        writeln!(f, "SAR config values:")?;
        write!(f, "{}", self.values)?;
        writeln!(f)?;
        writeln!(f, "Region config:")?;
        write!(f, "{}", self.region)?;
        writeln!(f)?;
        writeln!(f, "SAR power table:")?;
        write!(f, "{}", self.table)
    }
}

#[derive(Debug)]
pub struct VariableFailure {
    pub variable: Variable,
    pub error: SarError,
}

impl fmt::Display for VariableFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.variable, self.error)
    }
}

/// Per-variable failures of one read or write pass.
#[derive(Debug, Default)]
pub struct ProvisioningOutcome {
    pub failures: Vec<VariableFailure>,
}

impl ProvisioningOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed(&self, variable: Variable) -> bool {
        self.failures.iter().any(|f| f.variable == variable)
    }

    fn record(&mut self, variable: Variable, operation: &str, error: SarError) {
        warn!("Failed to {} {}: {}", operation, variable, error);
        self.failures.push(VariableFailure { variable, error });
    }
}

fn acquire<S: VariableStore + ?Sized>(store: &mut S) {
    if let Err(e) = store.acquire_privilege() {
        warn!("Could not acquire store privilege, continuing: {}", e);
    }
}

/// Write all four variables of `set` to `store`, common scope first.
pub fn write_provisioning<S: VariableStore + ?Sized>(store: &mut S, set: &ProvisioningSet) -> ProvisioningOutcome {
    info!("Writing provisioning to {}", store.describe());
    acquire(store);

    let mut outcome = ProvisioningOutcome::default();
    for variable in Variable::ALL {
        let bytes = set.encoded(variable);
        match store.write(&variable.scope(), variable.name(), &bytes) {
            Ok(()) => info!("Wrote {} ({} bytes)", variable, bytes.len()),
            Err(e) => outcome.record(variable, "write", e),
        }
    }
    outcome
}

/// Read all four variables. A variable that cannot be read in full stays zeroed.
pub fn read_provisioning<S: VariableStore + ?Sized>(store: &mut S) -> (ProvisioningSet, ProvisioningOutcome) {
    info!("Reading provisioning from {}", store.describe());
    acquire(store);

    let mut set = ProvisioningSet::default();
    let mut outcome = ProvisioningOutcome::default();

    for variable in Variable::ALL {
        let size = variable.size();
        let mut buf = vec![0u8; size];

        let read = store
            .read(&variable.scope(), variable.name(), &mut buf)
            .and_then(|n| if n >= size { Ok(n) } else { Err(SarError::truncated(size, n)) })
            .and_then(|_| set.populate(variable, &buf));

        match read {
            Ok(()) => {
                debug!("Read {} ({} bytes)", variable, size);
                if variable == Variable::SarTable {
                    for row in buf.chunks(12) {
                        debug!("  {}", hex::encode(row));
                    }
                }
            }
            Err(e) => outcome.record(variable, "read", e),
        }
    }

    if !outcome.failed(Variable::SarHeader) && !set.header.has_canonical_layout() {
        warn!(
            "Header describes a {}-byte blob with values at {:?}, expected {} bytes at {:?}; the header offsets win",
            set.header.size,
            set.header.value_offsets(),
            ConfigHeader::canonical_size(),
            ConfigHeader::canonical_offsets()
        );
    }

    (set, outcome)
}
