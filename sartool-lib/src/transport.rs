//! Seam to the platform WLAN device-service API.

use crate::error::SarError;
use crate::guid::Guid;
use crate::notification::NotificationCallback;

/// One open channel to the WLAN stack. Implementations report every failure
/// as `SarError::TransportFailure` with the failing operation and its code.
pub trait DeviceServiceTransport {
    /// Open the channel, asking for at most `max_version`. Returns the negotiated version.
    fn open(&mut self, max_version: u32) -> Result<u32, SarError>;

    /// Radio interfaces, in enumeration order.
    fn interfaces(&self) -> Result<Vec<Guid>, SarError>;

    /// Synchronous device-service command. `input` and `output` never alias;
    /// returns how many bytes of `output` the driver filled in.
    fn command(
        &mut self,
        interface: &Guid,
        service: &Guid,
        opcode: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, SarError>;

    /// Deliver device-service notifications to `callback` from a thread the caller does not own.
    fn register_notifications(&mut self, service: &Guid, callback: NotificationCallback) -> Result<(), SarError>;

    fn close(&mut self) -> Result<(), SarError>;
}

impl<T: DeviceServiceTransport + ?Sized> DeviceServiceTransport for Box<T> {
    fn open(&mut self, max_version: u32) -> Result<u32, SarError> {
        (**self).open(max_version)
    }

    fn interfaces(&self) -> Result<Vec<Guid>, SarError> {
        (**self).interfaces()
    }

    fn command(
        &mut self,
        interface: &Guid,
        service: &Guid,
        opcode: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, SarError> {
        (**self).command(interface, service, opcode, input, output)
    }

    fn register_notifications(&mut self, service: &Guid, callback: NotificationCallback) -> Result<(), SarError> {
        (**self).register_notifications(service, callback)
    }

    fn close(&mut self) -> Result<(), SarError> {
        (**self).close()
    }
}
