//! In-process stand-ins for the WLAN driver and the cellular modem.
//!
//! Both are cheap to clone; clones share state, so a test can keep one handle
//! for inspection while the other is owned by `WifiSar` or `LteSar`.

use bytes::Bytes;
use std::collections::HashMap;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

use crate::constants::*;
use crate::error::{SarError, code};
use crate::guid::Guid;
use crate::live::{BackoffStatus, InterfaceVersion, LiveSarState, Opcode};
use crate::modem::{ModemAntenna, ModemSarManager, TransmissionStateCallback};
use crate::notification::{Notification, NotificationCallback};
use crate::record::Record;
use crate::status::StatusCode;
use crate::transport::DeviceServiceTransport;

/// Interface reported by a default [`EmulatedWlan`].
pub const EMULATED_INTERFACE: Guid = Guid::from_fields(
    0x1c2e3d4f,
    0x5a6b,
    0x4c7d,
    [0x8e, 0x9f, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WlanOperation {
    Open,
    EnumInterfaces,
    Command,
    RegisterNotifications,
    Close,
}

impl WlanOperation {
    fn api_name(self) -> &'static str {
        match self {
            WlanOperation::Open => "WlanOpenHandle",
            WlanOperation::EnumInterfaces => "WlanEnumInterfaces",
            WlanOperation::Command => "WlanDeviceServiceCommand",
            WlanOperation::RegisterNotifications => "WlanRegisterDeviceServiceNotification",
            WlanOperation::Close => "WlanCloseHandle",
        }
    }
}

/// A command as the emulated driver received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub interface: Guid,
    pub service: Guid,
    pub opcode: u32,
    pub input: Bytes,
    pub output_capacity: usize,
}

type SharedNotificationCallback = Arc<dyn Fn(Notification) + Send + Sync + 'static>;

struct WlanState {
    open: bool,
    interfaces: Vec<Guid>,
    current: LiveSarState,
    version: InterfaceVersion,
    failures: HashMap<WlanOperation, u32>,
    reply_limit: Option<usize>,
    commands: Vec<RecordedCommand>,
    callbacks: Vec<SharedNotificationCallback>,
    close_count: usize,
}

#[derive(Clone)]
pub struct EmulatedWlan {
    state: Arc<Mutex<WlanState>>,
}

impl Default for EmulatedWlan {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatedWlan {
    pub fn new() -> Self {
        Self::with_interfaces(vec![EMULATED_INTERFACE])
    }

    pub fn with_interfaces(interfaces: Vec<Guid>) -> Self {
        Self {
            state: Arc::new(Mutex::new(WlanState {
                open: false,
                interfaces,
                current: LiveSarState::default(),
                version: InterfaceVersion::current(),
                failures: HashMap::new(),
                reply_limit: None,
                commands: Vec::new(),
                callbacks: Vec::new(),
                close_count: 0,
            })),
        }
    }

    /// Make every call to `operation` fail with `code` from now on.
    pub fn fail(&self, operation: WlanOperation, code: u32) {
        self.state.lock().failures.insert(operation, code);
    }

    /// Report at most `limit` reply bytes, as a misbehaving driver might.
    pub fn limit_replies(&self, limit: usize) {
        self.state.lock().reply_limit = Some(limit);
    }

    pub fn set_version(&self, version: InterfaceVersion) {
        self.state.lock().version = version;
    }

    pub fn set_current(&self, state: LiveSarState) {
        self.state.lock().current = state;
    }

    /// The last SET the driver accepted.
    pub fn current(&self) -> LiveSarState {
        self.state.lock().current.clone()
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.state.lock().commands.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    /// Deliver `notification` to every registered callback on the calling thread.
    pub fn inject_notification(&self, notification: Notification) {
        let callbacks = self.state.lock().callbacks.clone();
        trace!("Injecting notification to {} callbacks", callbacks.len());
        for callback in callbacks {
            callback(notification.clone());
        }
    }

    /// Deliver `notifications` from a background thread, `interval` apart.
    pub fn spawn_notifications(&self, notifications: Vec<Notification>, interval: Duration) -> JoinHandle<()> {
        let wlan = self.clone();
        thread::spawn(move || {
            for notification in notifications {
                thread::sleep(interval);
                wlan.inject_notification(notification);
            }
        })
    }

    fn check(state: &WlanState, operation: WlanOperation) -> Result<(), SarError> {
        match state.failures.get(&operation) {
            Some(&code) => Err(SarError::transport(operation.api_name(), code)),
            None => Ok(()),
        }
    }

    fn require_open(state: &WlanState, operation: WlanOperation) -> Result<(), SarError> {
        Self::check(state, operation)?;
        if state.open {
            Ok(())
        } else {
            Err(SarError::transport(operation.api_name(), code::ERROR_INVALID_HANDLE))
        }
    }
}

/// Status the driver reports for a SET request.
pub fn validate_sar_state(state: &LiveSarState) -> StatusCode {
    let mut status = StatusCode::SUCCESS;

    for pair in &state.antennas {
        if !matches!(pair.antenna_index, 0x1 | 0x2) {
            status |= StatusCode::INVALID_ANTENNA_INDEX;
        }
        if pair.backoff_index as usize >= POWER_TABLE_ROWS {
            status |= StatusCode::INVALID_TABLE_INDEX;
        }
    }

    match state.backoff_status {
        BackoffStatus::Enabled if state.antennas.is_empty() => status |= StatusCode::STATE_ERROR,
        BackoffStatus::Enabled if state.antennas.len() == MAX_ANTENNA_ENTRIES && state.mimo_config_type == 0 => {
            status |= StatusCode::MIMO_NOT_SET
        }
        BackoffStatus::Unknown(_) => status |= StatusCode::STATE_ERROR,
        _ => {}
    }

    status
}

fn reply(state: &WlanState, output: &mut [u8], bytes: &[u8]) -> Result<usize, SarError> {
    if output.len() < bytes.len() {
        return Err(SarError::transport(
            WlanOperation::Command.api_name(),
            code::ERROR_INSUFFICIENT_BUFFER,
        ));
    }
    let n = state.reply_limit.map_or(bytes.len(), |limit| limit.min(bytes.len()));
    output[..n].copy_from_slice(&bytes[..n]);
    Ok(n)
}

impl DeviceServiceTransport for EmulatedWlan {
    fn open(&mut self, max_version: u32) -> Result<u32, SarError> {
        let mut state = self.state.lock();
        Self::check(&state, WlanOperation::Open)?;
        state.open = true;
        debug!("Emulated WLAN opened");
        Ok(max_version.min(WLAN_CLIENT_VERSION))
    }

    fn interfaces(&self) -> Result<Vec<Guid>, SarError> {
        let state = self.state.lock();
        Self::require_open(&state, WlanOperation::EnumInterfaces)?;
        Ok(state.interfaces.clone())
    }

    fn command(
        &mut self,
        interface: &Guid,
        service: &Guid,
        opcode: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, SarError> {
        let mut state = self.state.lock();
        Self::require_open(&state, WlanOperation::Command)?;
        state.commands.push(RecordedCommand {
            interface: *interface,
            service: *service,
            opcode,
            input: Bytes::copy_from_slice(input),
            output_capacity: output.len(),
        });

        let api = WlanOperation::Command.api_name();
        if !state.interfaces.contains(interface) {
            return Err(SarError::transport(api, code::ERROR_NOT_FOUND));
        }
        if *service != SAR_DEVICE_SERVICE {
            return Err(SarError::transport(api, code::ERROR_NOT_SUPPORTED));
        }

        match Opcode::try_from(opcode) {
            Ok(Opcode::SetSarState) => {
                let request =
                    LiveSarState::decode(input).map_err(|_| SarError::transport(api, code::ERROR_INVALID_PARAMETER))?;
                let status = validate_sar_state(&request);
                if status.is_success() {
                    state.current = request;
                }
                reply(&state, output, &status.encode())
            }
            Ok(Opcode::GetSarState) => {
                let encoded = state.current.encode();
                reply(&state, output, &encoded)
            }
            Ok(Opcode::GetInterfaceVersion) => {
                let encoded = state.version.encode();
                reply(&state, output, &encoded)
            }
            Ok(Opcode::GetGeoState) | Err(_) => Err(SarError::transport(api, code::ERROR_NOT_SUPPORTED)),
        }
    }

    fn register_notifications(&mut self, service: &Guid, callback: NotificationCallback) -> Result<(), SarError> {
        let mut state = self.state.lock();
        Self::require_open(&state, WlanOperation::RegisterNotifications)?;
        debug!("Emulated WLAN registered callback for {}", service);
        state.callbacks.push(Arc::from(callback));
        Ok(())
    }

    fn close(&mut self) -> Result<(), SarError> {
        let mut state = self.state.lock();
        state.close_count += 1;
        Self::check(&state, WlanOperation::Close)?;
        state.open = false;
        state.callbacks.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModemOperation {
    Query,
    SetConfiguration,
    SetHysteresis,
    Subscribe,
    StartMonitoring,
    StopMonitoring,
}

type SharedTransmissionCallback = Arc<dyn Fn(bool) + Send + Sync + 'static>;

#[derive(Default)]
struct ModemState {
    backoff_enabled: bool,
    antennas: Vec<ModemAntenna>,
    hysteresis: Option<Duration>,
    monitoring: bool,
    stop_count: usize,
    failures: HashMap<ModemOperation, u32>,
    callbacks: Vec<SharedTransmissionCallback>,
}

#[derive(Clone, Default)]
pub struct EmulatedModem {
    state: Arc<Mutex<ModemState>>,
}

impl EmulatedModem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, operation: ModemOperation, code: u32) {
        self.state.lock().failures.insert(operation, code);
    }

    pub fn hysteresis(&self) -> Option<Duration> {
        self.state.lock().hysteresis
    }

    pub fn is_monitoring(&self) -> bool {
        self.state.lock().monitoring
    }

    pub fn stop_count(&self) -> usize {
        self.state.lock().stop_count
    }

    /// Raise a transmission-state change. Dropped unless monitoring is running.
    pub fn emit_transmission_state(&self, transmitting: bool) {
        let callbacks = {
            let state = self.state.lock();
            if !state.monitoring {
                return;
            }
            state.callbacks.clone()
        };
        for callback in callbacks {
            callback(transmitting);
        }
    }

    pub fn spawn_transmission_states(&self, states: Vec<bool>, interval: Duration) -> JoinHandle<()> {
        let modem = self.clone();
        thread::spawn(move || {
            for transmitting in states {
                thread::sleep(interval);
                modem.emit_transmission_state(transmitting);
            }
        })
    }

    fn check(&self, operation: ModemOperation, api: &'static str) -> Result<MutexGuard<'_, ModemState>, SarError> {
        let state = self.state.lock();
        match state.failures.get(&operation) {
            Some(&code) => Err(SarError::transport(api, code)),
            None => Ok(state),
        }
    }
}

impl ModemSarManager for EmulatedModem {
    fn is_backoff_enabled(&self) -> Result<bool, SarError> {
        Ok(self.check(ModemOperation::Query, "IsBackoffEnabled")?.backoff_enabled)
    }

    fn antennas(&self) -> Result<Vec<ModemAntenna>, SarError> {
        Ok(self.check(ModemOperation::Query, "Antennas")?.antennas.clone())
    }

    fn set_configuration(&mut self, antennas: &[ModemAntenna]) -> Result<(), SarError> {
        let mut state = self.check(ModemOperation::SetConfiguration, "SetConfigurationAsync")?;
        state.antennas = antennas.to_vec();
        state.backoff_enabled = true;
        Ok(())
    }

    fn set_transmission_state_hysteresis(&mut self, hysteresis: Duration) -> Result<(), SarError> {
        let mut state = self.check(ModemOperation::SetHysteresis, "SetTransmissionStateChangedHysteresisAsync")?;
        state.hysteresis = Some(hysteresis);
        Ok(())
    }

    fn subscribe_transmission_state(&mut self, callback: TransmissionStateCallback) -> Result<(), SarError> {
        let mut state = self.check(ModemOperation::Subscribe, "TransmissionStateChanged")?;
        state.callbacks.push(Arc::from(callback));
        Ok(())
    }

    fn start_transmission_state_monitoring(&mut self) -> Result<(), SarError> {
        let mut state = self.check(ModemOperation::StartMonitoring, "StartTransmissionStateMonitoring")?;
        state.monitoring = true;
        Ok(())
    }

    fn stop_transmission_state_monitoring(&mut self) -> Result<(), SarError> {
        let mut state = self.state.lock();
        state.stop_count += 1;
        if let Some(&code) = state.failures.get(&ModemOperation::StopMonitoring) {
            return Err(SarError::transport("StopTransmissionStateMonitoring", code));
        }
        state.monitoring = false;
        state.callbacks.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::AntennaBackoff;

    #[test]
    fn test_validation_flags() {
        let ok = LiveSarState::new(BackoffStatus::Enabled, 0, vec![AntennaBackoff::new(0x1, 5)]);
        assert!(validate_sar_state(&ok).is_success());

        let bad = LiveSarState::new(BackoffStatus::Enabled, 0x3, vec![AntennaBackoff::new(0x4, 12)]);
        assert_eq!(
            validate_sar_state(&bad),
            StatusCode::INVALID_ANTENNA_INDEX | StatusCode::INVALID_TABLE_INDEX
        );

        let empty = LiveSarState::new(BackoffStatus::Enabled, 0, vec![]);
        assert_eq!(validate_sar_state(&empty), StatusCode::STATE_ERROR);

        let no_mimo = LiveSarState::new(
            BackoffStatus::Enabled,
            0,
            vec![AntennaBackoff::new(0x1, 1), AntennaBackoff::new(0x2, 2)],
        );
        assert_eq!(validate_sar_state(&no_mimo), StatusCode::MIMO_NOT_SET);

        let off = LiveSarState::new(BackoffStatus::Disabled, 0, vec![]);
        assert!(validate_sar_state(&off).is_success());
    }

    #[test]
    fn test_command_requires_open_handle() {
        let mut wlan = EmulatedWlan::new();
        let mut out = [0u8; 8];
        let result = wlan.command(
            &EMULATED_INTERFACE,
            &SAR_DEVICE_SERVICE,
            Opcode::GetInterfaceVersion.into(),
            &[],
            &mut out,
        );
        assert!(matches!(
            result,
            Err(SarError::TransportFailure { code: code::ERROR_INVALID_HANDLE, .. })
        ));
    }

    #[test]
    fn test_modem_drops_events_when_not_monitoring() {
        let mut modem = EmulatedModem::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        modem
            .subscribe_transmission_state(Box::new(move |t| sink.lock().push(t)))
            .unwrap();

        modem.emit_transmission_state(true);
        modem.start_transmission_state_monitoring().unwrap();
        modem.emit_transmission_state(false);

        assert_eq!(*seen.lock(), vec![false]);
    }

    #[test]
    fn test_state_survives_panicking_holder() {
        let wlan = EmulatedWlan::new();
        let shared = wlan.clone();
        let holder = thread::spawn(move || {
            let _guard = shared.state.lock();
            panic!("handler failed while holding driver state");
        });
        assert!(holder.join().is_err());

        assert!(!wlan.is_open());
        assert!(wlan.commands().is_empty());
    }
}
