use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};

use crate::constants::*;
use crate::error::{SarError, code};
use crate::guid::Guid;
use crate::live::{InterfaceVersion, LiveSarState, Opcode};
use crate::notification::{MonitorEvent, MonitorLimits, MonitorSession, MonitorSummary, NotificationEvent};
use crate::record::Record;
use crate::status::StatusCode;
use crate::transport::DeviceServiceTransport;

/// An open WLAN channel bound to the first radio interface.
///
/// The channel is closed by [`WifiSar::close`]; dropping an unclosed handle
/// closes it too and only logs a failure.
pub struct WifiSar<T: DeviceServiceTransport> {
    transport: T,
    interface: Guid,
    negotiated_version: u32,
    closed: bool,
}

impl<T: DeviceServiceTransport> WifiSar<T> {
    /// Open the channel and pick the first enumerated interface
    pub fn open(mut transport: T) -> Result<Self, SarError> {
        info!("Opening WLAN channel...");
        let negotiated_version = transport.open(WLAN_CLIENT_VERSION)?;
        debug!("Negotiated WLAN client version {}", negotiated_version);

        let first = transport
            .interfaces()
            .and_then(|list| {
                list.first()
                    .copied()
                    .ok_or(SarError::transport("WlanEnumInterfaces", code::ERROR_NOT_FOUND))
            });
        let interface = match first {
            Ok(interface) => interface,
            Err(e) => {
                if let Err(close_err) = transport.close() {
                    warn!("Closing WLAN channel after failed enumeration: {}", close_err);
                }
                return Err(e);
            }
        };

        info!("Using interface {}", interface);
        Ok(Self {
            transport,
            interface,
            negotiated_version,
            closed: false,
        })
    }

    /// Run `f` against a freshly opened channel. Close is always attempted;
    /// an error from `f` wins over an error from close.
    pub fn with_session<R>(transport: T, f: impl FnOnce(&mut Self) -> Result<R, SarError>) -> Result<R, SarError> {
        let mut device = Self::open(transport)?;
        let result = f(&mut device);
        let closed = device.close();

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!("Closing WLAN channel also failed: {}", close_err);
                Err(e)
            }
        }
    }

    pub fn interface(&self) -> &Guid {
        &self.interface
    }

    pub fn negotiated_version(&self) -> u32 {
        self.negotiated_version
    }

    /// Send one command with a response buffer of `capacity` bytes and return
    /// only the bytes the driver filled in.
    fn command(&mut self, opcode: Opcode, input: &[u8], capacity: usize) -> Result<Bytes, SarError> {
        debug!("{} request ({} bytes): {}", opcode, input.len(), hex::encode(input));

        let mut output = BytesMut::zeroed(capacity);
        let returned = self.transport.command(
            &self.interface,
            &SAR_DEVICE_SERVICE,
            opcode.into(),
            input,
            &mut output,
        )?;
        output.truncate(returned.min(capacity));

        debug!("{} reply ({} bytes): {}", opcode, output.len(), hex::encode(&output));
        Ok(output.freeze())
    }

    /// Query the live SAR state. Room is made for two antenna entries; only
    /// `element_count` of them are decoded.
    pub fn get_sar_state(&mut self) -> Result<LiveSarState, SarError> {
        let reply = self.command(Opcode::GetSarState, &[], LiveSarState::wire_size(MAX_ANTENNA_ENTRIES))?;
        let state = LiveSarState::decode(&reply)?;
        info!("Live SAR state: backoff {}, {} antenna entries", state.backoff_status, state.antennas.len());
        Ok(state)
    }

    /// Apply a live SAR state. A non-success status is returned, not raised.
    pub fn set_sar_state(&mut self, state: &LiveSarState) -> Result<StatusCode, SarError> {
        if state.antennas.len() > MAX_ANTENNA_ENTRIES {
            return Err(SarError::InvalidArgument(format!(
                "at most {} antenna entries are supported, got {}",
                MAX_ANTENNA_ENTRIES,
                state.antennas.len()
            )));
        }

        let request = state.encode();
        let reply = self.command(Opcode::SetSarState, &request, STATUS_CODE_SIZE)?;
        if reply.len() != STATUS_CODE_SIZE {
            return Err(SarError::truncated(STATUS_CODE_SIZE, reply.len()));
        }

        let status = StatusCode::decode(&reply)?;
        if status.is_success() {
            info!("SET_SAR_STATE accepted");
        } else {
            warn!("SET_SAR_STATE returned {}", status);
        }
        Ok(status)
    }

    pub fn interface_version(&mut self) -> Result<InterfaceVersion, SarError> {
        let reply = self.command(Opcode::GetInterfaceVersion, &[], INTERFACE_VERSION_SIZE)?;
        let version = InterfaceVersion::decode(&reply)?;
        if version.is_compatible() {
            info!("Driver SAR interface version {}", version);
        } else {
            warn!(
                "Driver SAR interface version {} does not match ours ({})",
                version,
                InterfaceVersion::current()
            );
        }
        Ok(version)
    }

    /// Register for SAR device-service notifications and wait out `limits`.
    pub async fn monitor_notifications<F>(
        &mut self,
        limits: &MonitorLimits,
        handler: F,
    ) -> Result<MonitorSummary, SarError>
    where
        F: Fn(MonitorEvent<Result<NotificationEvent, SarError>>) + Send + Sync + 'static,
    {
        let session = MonitorSession::new();
        self.transport
            .register_notifications(&SAR_DEVICE_SERVICE, session.notification_callback(handler))?;
        info!("Registered for {} notifications", SAR_DEVICE_SERVICE);
        Ok(session.wait(limits).await)
    }

    pub fn close(mut self) -> Result<(), SarError> {
        self.closed = true;
        info!("Closing WLAN channel");
        self.transport.close()
    }
}

impl<T: DeviceServiceTransport> Drop for WifiSar<T> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.transport.close() {
                warn!("Closing WLAN channel on drop failed: {}", e);
            }
        }
    }
}
