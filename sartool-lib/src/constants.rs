// Wire constants shared with the WLAN driver counterpart

use crate::guid::Guid;

/// Interface version of the live device-service protocol (major)
pub const SAR_INTERFACE_VERSION_MAJOR: u32 = 1;

/// Interface version of the live device-service protocol (minor)
pub const SAR_INTERFACE_VERSION_MINOR: u32 = 3;

/// Version of the IHV-only UEFI record layouts (major)
pub const SAR_IHV_VERSION_MAJOR: u32 = 1;

/// Version of the IHV-only UEFI record layouts (minor)
pub const SAR_IHV_VERSION_MINOR: u32 = 3;

/// Device service carrying SAR commands and unsolicited SAR requests
pub const SAR_DEVICE_SERVICE: Guid = Guid::from_fields(
    0x504304b4,
    0x1941,
    0x4a95,
    [0xb8, 0x19, 0xa2, 0x10, 0x2b, 0x69, 0xe5, 0xcd],
);

/// UEFI scope read by both the host SAR manager and the WLAN driver
pub const UEFI_COMMON_SCOPE: Guid = Guid::from_fields(
    0x4290aa92,
    0xcace,
    0x449d,
    [0x88, 0x7b, 0xad, 0xc6, 0x1b, 0x49, 0xe0, 0x5d],
);

/// UEFI scope read only by the WLAN driver
pub const UEFI_IHV_SCOPE: Guid = Guid::from_fields(
    0x8949533b,
    0x7eda,
    0x4d90,
    [0xa8, 0x76, 0xbf, 0x16, 0x21, 0x5b, 0x0c, 0x9c],
);

/// Variable holding the `ConfigHeader` (common scope)
pub const VAR_SAR_HEADER: &str = "WifiSARHeader";

/// Variable holding the `ConfigValues` block (common scope)
pub const VAR_SAR_CONFIG: &str = "WifiSARConfig";

/// Variable holding the `RegionConfig` (IHV scope)
pub const VAR_REGION_CONFIG: &str = "WifiRegionConfig";

/// Variable holding the `PowerTable` (IHV scope)
pub const VAR_SAR_TABLE: &str = "WifiSARTable";

/// Size of the provisioning header (16 bytes)
pub const CONFIG_HEADER_SIZE: usize = 16;

/// Size of one SAR timing/state block (19 bytes)
pub const CONFIG_VALUES_SIZE: usize = 19;

/// Size of the region record as compiled by the driver (12 bytes, last 2 are tail padding)
pub const REGION_CONFIG_SIZE: usize = 12;

/// Number of power tables in a `PowerTable`
pub const POWER_TABLE_ROWS: usize = 12;

/// Number of power values per table
pub const POWER_TABLE_COLUMNS: usize = 5;

/// Size of the power table grid (60 bytes)
pub const POWER_TABLE_SIZE: usize = POWER_TABLE_ROWS * POWER_TABLE_COLUMNS;

/// Power table cells are fixed point with 3 fractional bits
pub const POWER_TABLE_SCALE: f64 = 8.0;

/// Size of the live SAR state header (12 bytes)
pub const SAR_STATE_HEADER_SIZE: usize = 12;

/// Size of one antenna/backoff entry following the live header (8 bytes)
pub const ANTENNA_CONFIG_SIZE: usize = 8;

/// Most antenna entries this tool sends or expects back
pub const MAX_ANTENNA_ENTRIES: usize = 2;

/// Size of the status word returned by a live SET
pub const STATUS_CODE_SIZE: usize = 4;

/// Size of the interface version reply
pub const INTERFACE_VERSION_SIZE: usize = 8;

/// Client version requested when opening the WLAN channel
pub const WLAN_CLIENT_VERSION: u32 = 2;

/// efivarfs attribute word: NON_VOLATILE | BOOTSERVICE_ACCESS | RUNTIME_ACCESS
pub const EFI_VARIABLE_DEFAULT_ATTRIBUTES: u32 = 0x0000_0007;

/// Size of the attribute prefix on every efivarfs file
pub const EFI_VARIABLE_ATTRIBUTES_SIZE: usize = 4;

/// Default mount point of efivarfs on Linux
pub const DEFAULT_EFIVARS_ROOT: &str = "/sys/firmware/efi/efivars";

/// Wi-Fi notification monitoring stops after this many notifications
pub const DEFAULT_MAX_NOTIFICATIONS: u32 = 128;

/// Coarse polling interval of the monitor loop (seconds)
pub const MONITOR_POLL_INTERVAL_SECS: u64 = 5;

/// Default monitoring period (seconds)
pub const DEFAULT_MONITOR_PERIOD_SECS: u64 = 60;

/// Default transmission-state hysteresis for the cellular modem (seconds)
pub const DEFAULT_HYSTERESIS_SECS: u64 = 2;

/// Accepted hysteresis range of the cellular modem (seconds, inclusive)
pub const HYSTERESIS_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=5;
