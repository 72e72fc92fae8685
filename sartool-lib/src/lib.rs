pub mod constants;
pub mod device;
pub mod emulator;
pub mod error;
pub mod guid;
pub mod live;
pub mod modem;
pub mod notification;
pub mod provisioning;
pub mod record;
pub mod status;
pub mod store;
pub mod transport;

// Re-export the main handles for easy access
pub use device::WifiSar;
pub use error::SarError;
pub use guid::Guid;
pub use live::{AntennaBackoff, BackoffStatus, LiveSarState};
pub use modem::LteSar;
pub use provisioning::{ProvisioningSet, read_provisioning, write_provisioning};
pub use status::StatusCode;
