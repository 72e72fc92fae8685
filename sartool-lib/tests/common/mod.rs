//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use sartool_lib::constants::*;
#[allow(unused_imports)]
pub use sartool_lib::emulator::{EMULATED_INTERFACE, EmulatedModem, EmulatedWlan, ModemOperation, WlanOperation};
#[allow(unused_imports)]
pub use sartool_lib::error::{SarError, code};
#[allow(unused_imports)]
pub use sartool_lib::live::{AntennaBackoff, BackoffStatus, InterfaceVersion, LiveSarState, Opcode};
#[allow(unused_imports)]
pub use sartool_lib::record::{ConfigHeader, ConfigValues, PowerTable, Record, RegionConfig};
#[allow(unused_imports)]
pub use sartool_lib::status::StatusCode;

use parking_lot::Mutex;
use std::sync::Arc;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Canonical `WifiSARHeader` as written by `setconfig`
#[allow(dead_code)]
pub const CANONICAL_HEADER: &str = "36102304040506070809 0a0b0c0d0e0f";

/// Canonical `WifiSARConfig` as written by `setconfig`
#[allow(dead_code)]
pub const CANONICAL_VALUES: &str = "13 01efcdab bbbbbbbb cccccccc 55 44 33 22 11 05";

/// Canonical `WifiRegionConfig` as written by `setconfig`
#[allow(dead_code)]
pub const CANONICAL_REGION: &str = "4850 0000 11111111 01 02 0000";

/// Hex fixture with whitespace allowed for readability
#[allow(dead_code)]
pub fn fixture(spaced_hex: &str) -> Bytes {
    let compact: String = spaced_hex.chars().filter(|c| !c.is_whitespace()).collect();
    hex_to_bytes(&compact)
}

/// Shared sink a callback can push into from another thread
#[allow(dead_code)]
pub fn collector<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |item: T| sink.lock().push(item))
}
