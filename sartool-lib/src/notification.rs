//! Unsolicited notifications and the session that counts them.
//!
//! The external event source calls back on a thread we do not own. The only
//! state shared with the waiting side is the session counter, which is atomic.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::constants::*;
use crate::error::SarError;
use crate::guid::Guid;

/// Envelope of a device-service notification as delivered by the WLAN API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub service: Guid,
    pub code: u32,
    pub data: Bytes,
}

impl Notification {
    pub fn new(service: Guid, code: u32, data: impl Into<Bytes>) -> Self {
        Self {
            service,
            code,
            data: data.into(),
        }
    }

    /// A SAR status request as the driver sends it.
    pub fn sar_status_request(status: u16) -> Self {
        Self::new(SAR_DEVICE_SERVICE, 0, Bytes::copy_from_slice(&status.to_le_bytes()))
    }
}

/// Interpretation of one notification. Purely descriptive: nothing here acts on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// The driver asks for updated SAR status
    SarStatusRequest { status: u16 },
    /// Any other device service
    Other(Notification),
}

impl NotificationEvent {
    pub fn decode(notification: Notification) -> Result<Self, SarError> {
        if notification.service != SAR_DEVICE_SERVICE {
            return Ok(NotificationEvent::Other(notification));
        }

        match notification.data.get(..2) {
            Some(&[lo, hi]) => Ok(NotificationEvent::SarStatusRequest {
                status: u16::from_le_bytes([lo, hi]),
            }),
            _ => Err(SarError::truncated(2, notification.data.len())),
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationEvent::SarStatusRequest { status } => {
                write!(f, "SAR unsolicited request 0x{:x}", status)
            }
            NotificationEvent::Other(n) => {
                writeln!(f, "{}", n.service)?;
                writeln!(f, "opcode 0x{:x}", n.code)?;
                writeln!(f, "data size {}", n.data.len())?;
                let dump: Vec<String> = n.data.iter().map(|b| format!("0x{:02x}", b)).collect();
                write!(f, "{}", dump.join(" "))
            }
        }
    }
}

/// What the monitor hands to the caller for each received notification.
#[derive(Debug)]
pub struct MonitorEvent<T> {
    /// 1-based position in the session
    pub sequence: u32,
    pub received_at: DateTime<Utc>,
    pub payload: T,
}

impl<T: fmt::Display> fmt::Display for MonitorEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.received_at.format("%H:%M:%S%.3f"), self.payload)
    }
}

pub type NotificationCallback = Box<dyn Fn(Notification) + Send + Sync + 'static>;

/// Cheap, cloneable handle onto the session counter.
#[derive(Debug, Clone)]
pub struct MonitorCounter(Arc<AtomicU32>);

impl MonitorCounter {
    /// Count one event and return its sequence number.
    pub fn record(&self) -> u32 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    /// Wrap a handler so every call is counted and stamped first.
    pub fn stamp<T, F>(&self, handler: F) -> impl Fn(T) + Send + Sync + 'static
    where
        F: Fn(MonitorEvent<T>) + Send + Sync + 'static,
    {
        let counter = self.clone();
        move |payload: T| {
            let sequence = counter.record();
            handler(MonitorEvent {
                sequence,
                received_at: Utc::now(),
                payload,
            });
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorLimits {
    pub duration: Duration,
    pub max_events: u32,
    pub poll_interval: Duration,
}

impl Default for MonitorLimits {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(DEFAULT_MONITOR_PERIOD_SECS),
            max_events: DEFAULT_MAX_NOTIFICATIONS,
            poll_interval: Duration::from_secs(MONITOR_POLL_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Elapsed,
    LimitReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSummary {
    pub received: u32,
    pub reason: StopReason,
}

/// Owns the received-notification counter for one monitoring call.
#[derive(Debug, Default)]
pub struct MonitorSession {
    counter: Arc<AtomicU32>,
}

impl MonitorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> MonitorCounter {
        MonitorCounter(Arc::clone(&self.counter))
    }

    pub fn received(&self) -> u32 {
        self.counter.load(Ordering::Acquire)
    }

    /// Build the callback the WLAN event source invokes once per notification.
    pub fn notification_callback<F>(&self, handler: F) -> NotificationCallback
    where
        F: Fn(MonitorEvent<Result<NotificationEvent, SarError>>) + Send + Sync + 'static,
    {
        let stamped = self.counter().stamp(handler);
        Box::new(move |notification: Notification| stamped(NotificationEvent::decode(notification)))
    }

    /// Poll the counter until the period elapses or the cap is reached.
    /// Resolution is the poll interval; there is no precise deadline.
    pub async fn wait(&self, limits: &MonitorLimits) -> MonitorSummary {
        let start = Instant::now();
        info!(
            "Monitoring for up to {:?} or {} notifications",
            limits.duration, limits.max_events
        );

        loop {
            let received = self.received();
            if received >= limits.max_events {
                info!("Notification limit reached after {} callbacks", received);
                return MonitorSummary {
                    received,
                    reason: StopReason::LimitReached,
                };
            }

            let elapsed = start.elapsed();
            if elapsed >= limits.duration {
                info!("Monitoring period elapsed, called back {} times", received);
                return MonitorSummary {
                    received,
                    reason: StopReason::Elapsed,
                };
            }

            let nap = limits.poll_interval.min(limits.duration - elapsed);
            debug!("{} notifications so far, sleeping {:?}", received, nap);
            sleep(nap).await;
        }
    }
}
