//! Cellular SAR control through the platform mobile-broadband SAR manager.

use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::*;
use crate::error::SarError;
use crate::notification::{MonitorEvent, MonitorLimits, MonitorSession, MonitorSummary};

/// One antenna mapped to one backoff index, as the modem API types it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModemAntenna {
    pub antenna_index: i32,
    pub backoff_index: i32,
}

impl ModemAntenna {
    pub fn new(antenna_index: i32, backoff_index: i32) -> Self {
        Self {
            antenna_index,
            backoff_index,
        }
    }
}

pub type TransmissionStateCallback = Box<dyn Fn(bool) + Send + Sync + 'static>;

/// Seam to the modem's SAR manager. Failures are `TransportFailure`.
pub trait ModemSarManager {
    fn is_backoff_enabled(&self) -> Result<bool, SarError>;

    fn antennas(&self) -> Result<Vec<ModemAntenna>, SarError>;

    fn set_configuration(&mut self, antennas: &[ModemAntenna]) -> Result<(), SarError>;

    fn set_transmission_state_hysteresis(&mut self, hysteresis: Duration) -> Result<(), SarError>;

    /// `callback` receives `true` while transmitting, from a thread the caller does not own.
    fn subscribe_transmission_state(&mut self, callback: TransmissionStateCallback) -> Result<(), SarError>;

    fn start_transmission_state_monitoring(&mut self) -> Result<(), SarError>;

    fn stop_transmission_state_monitoring(&mut self) -> Result<(), SarError>;
}

impl<M: ModemSarManager + ?Sized> ModemSarManager for Box<M> {
    fn is_backoff_enabled(&self) -> Result<bool, SarError> {
        (**self).is_backoff_enabled()
    }

    fn antennas(&self) -> Result<Vec<ModemAntenna>, SarError> {
        (**self).antennas()
    }

    fn set_configuration(&mut self, antennas: &[ModemAntenna]) -> Result<(), SarError> {
        (**self).set_configuration(antennas)
    }

    fn set_transmission_state_hysteresis(&mut self, hysteresis: Duration) -> Result<(), SarError> {
        (**self).set_transmission_state_hysteresis(hysteresis)
    }

    fn subscribe_transmission_state(&mut self, callback: TransmissionStateCallback) -> Result<(), SarError> {
        (**self).subscribe_transmission_state(callback)
    }

    fn start_transmission_state_monitoring(&mut self) -> Result<(), SarError> {
        (**self).start_transmission_state_monitoring()
    }

    fn stop_transmission_state_monitoring(&mut self) -> Result<(), SarError> {
        (**self).stop_transmission_state_monitoring()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModemSarState {
    pub backoff_enabled: bool,
    pub antennas: Vec<ModemAntenna>,
}

impl fmt::Display for ModemSarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Backoff is {}", if self.backoff_enabled { "enabled" } else { "disabled" })?;
        for antenna in &self.antennas {
            writeln!(
                f,
                "AntennaIndex 0x{:08x} configured to use BackoffIndex {}",
                antenna.antenna_index, antenna.backoff_index
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionState {
    pub transmitting: bool,
}

impl fmt::Display for TransmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = if self.transmitting { "transmitting" } else { "not transmitting" };
        write!(f, "TransmissionStateChanged: {}", text)
    }
}

pub struct LteSar<M: ModemSarManager> {
    manager: M,
}

impl<M: ModemSarManager> LteSar<M> {
    pub fn new(manager: M) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn get_state(&self) -> Result<ModemSarState, SarError> {
        let state = ModemSarState {
            backoff_enabled: self.manager.is_backoff_enabled()?,
            antennas: self.manager.antennas()?,
        };
        info!("Modem backoff enabled: {}, {} antennas", state.backoff_enabled, state.antennas.len());
        Ok(state)
    }

    /// Apply one or two antenna/backoff pairs.
    pub fn set_configuration(&mut self, antennas: &[ModemAntenna]) -> Result<(), SarError> {
        if !(1..=MAX_ANTENNA_ENTRIES).contains(&antennas.len()) {
            return Err(SarError::InvalidArgument(format!(
                "expected 1 or 2 antenna/backoff pairs, got {}",
                antennas.len()
            )));
        }

        for antenna in antennas {
            info!(
                "Setting AntennaIndex={} PowerTableIndex={}",
                antenna.antenna_index, antenna.backoff_index
            );
        }
        self.manager.set_configuration(antennas)
    }

    /// Watch transmission-state changes until `limits` runs out. Monitoring is
    /// stopped once started, whatever ends the wait.
    pub async fn monitor_transmission_state<F>(
        &mut self,
        hysteresis: Duration,
        limits: &MonitorLimits,
        handler: F,
    ) -> Result<MonitorSummary, SarError>
    where
        F: Fn(MonitorEvent<TransmissionState>) + Send + Sync + 'static,
    {
        let range =
            Duration::from_secs(*HYSTERESIS_RANGE_SECS.start())..=Duration::from_secs(*HYSTERESIS_RANGE_SECS.end());
        if !range.contains(&hysteresis) {
            return Err(SarError::InvalidArgument(format!(
                "hysteresis must be between {} and {} seconds, got {:?}",
                HYSTERESIS_RANGE_SECS.start(),
                HYSTERESIS_RANGE_SECS.end(),
                hysteresis
            )));
        }

        self.manager.set_transmission_state_hysteresis(hysteresis)?;
        debug!("Transmission-state hysteresis set to {:?}", hysteresis);

        let session = MonitorSession::new();
        let stamped = session.counter().stamp(handler);
        self.manager
            .subscribe_transmission_state(Box::new(move |transmitting| stamped(TransmissionState { transmitting })))?;

        self.manager.start_transmission_state_monitoring()?;
        let summary = session.wait(limits).await;

        if let Err(e) = self.manager.stop_transmission_state_monitoring() {
            warn!("Stopping transmission-state monitoring failed: {}", e);
            return Err(e);
        }
        Ok(summary)
    }
}
