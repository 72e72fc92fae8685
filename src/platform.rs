//! Native radio backends.
//!
//! The WLAN device-service and mobile-broadband SAR APIs only exist on
//! Windows. On other hosts every call reports `ERROR_NOT_SUPPORTED`, so the
//! CLI fails the same way it would on a machine without the radio.

use std::time::Duration;

use sartool_lib::error::{SarError, code};
use sartool_lib::guid::Guid;
use sartool_lib::modem::{ModemAntenna, ModemSarManager, TransmissionStateCallback};
use sartool_lib::notification::NotificationCallback;
use sartool_lib::transport::DeviceServiceTransport;

fn unsupported<T>(operation: &'static str) -> Result<T, SarError> {
    Err(SarError::TransportFailure {
        operation,
        code: code::ERROR_NOT_SUPPORTED,
    })
}

#[derive(Debug, Default)]
pub struct PlatformWlan;

impl DeviceServiceTransport for PlatformWlan {
    fn open(&mut self, _max_version: u32) -> Result<u32, SarError> {
        unsupported("WlanOpenHandle")
    }

    fn interfaces(&self) -> Result<Vec<Guid>, SarError> {
        unsupported("WlanEnumInterfaces")
    }

    fn command(
        &mut self,
        _interface: &Guid,
        _service: &Guid,
        _opcode: u32,
        _input: &[u8],
        _output: &mut [u8],
    ) -> Result<usize, SarError> {
        unsupported("WlanDeviceServiceCommand")
    }

    fn register_notifications(&mut self, _service: &Guid, _callback: NotificationCallback) -> Result<(), SarError> {
        unsupported("WlanRegisterDeviceServiceNotification")
    }

    fn close(&mut self) -> Result<(), SarError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PlatformModem;

impl ModemSarManager for PlatformModem {
    fn is_backoff_enabled(&self) -> Result<bool, SarError> {
        unsupported("MobileBroadbandModem::GetDefault")
    }

    fn antennas(&self) -> Result<Vec<ModemAntenna>, SarError> {
        unsupported("MobileBroadbandModem::GetDefault")
    }

    fn set_configuration(&mut self, _antennas: &[ModemAntenna]) -> Result<(), SarError> {
        unsupported("MobileBroadbandModem::GetDefault")
    }

    fn set_transmission_state_hysteresis(&mut self, _hysteresis: Duration) -> Result<(), SarError> {
        unsupported("MobileBroadbandModem::GetDefault")
    }

    fn subscribe_transmission_state(&mut self, _callback: TransmissionStateCallback) -> Result<(), SarError> {
        unsupported("MobileBroadbandModem::GetDefault")
    }

    fn start_transmission_state_monitoring(&mut self) -> Result<(), SarError> {
        unsupported("MobileBroadbandModem::GetDefault")
    }

    fn stop_transmission_state_monitoring(&mut self) -> Result<(), SarError> {
        unsupported("MobileBroadbandModem::GetDefault")
    }
}
