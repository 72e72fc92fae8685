use std::io;
use thiserror::Error;

use crate::status::StatusCode;

/// Win32-style codes reported through `SarError::TransportFailure`.
pub mod code {
    pub const ERROR_INVALID_HANDLE: u32 = 6;
    pub const ERROR_NOT_SUPPORTED: u32 = 50;
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    pub const ERROR_NOT_FOUND: u32 = 1168;
    pub const ERROR_DEVICE_NOT_AVAILABLE: u32 = 4319;
}

/// The primary error type for the `sartool-lib` library.
#[derive(Error, Debug)]
pub enum SarError {
    #[error("{operation} failed with error code {code:#010x}")]
    TransportFailure { operation: &'static str, code: u32 },

    #[error("Failed to {operation} {target}: {source}")]
    StoreAccessFailure {
        operation: &'static str,
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("Truncated input: expected at least {expected} bytes, got {actual}")]
    TruncatedInput { expected: usize, actual: usize },

    #[error("Device rejected SAR request: {0}")]
    ProtocolStatus(StatusCode),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SarError {
    pub(crate) fn transport(operation: &'static str, code: u32) -> Self {
        SarError::TransportFailure { operation, code }
    }

    pub(crate) fn truncated(expected: usize, actual: usize) -> Self {
        SarError::TruncatedInput { expected, actual }
    }

    pub(crate) fn store(operation: &'static str, target: impl Into<String>, source: io::Error) -> Self {
        SarError::StoreAccessFailure {
            operation,
            target: target.into(),
            source,
        }
    }

    /// True for failures that end the current invocation rather than one sub-operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SarError::TransportFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failure_shows_operation_and_code() {
        let err = SarError::transport("WlanOpenHandle", code::ERROR_NOT_SUPPORTED);
        assert_eq!(err.to_string(), "WlanOpenHandle failed with error code 0x00000032");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_store_failure_keeps_os_error() {
        let err = SarError::store("read", "WifiSARHeader", io::Error::from_raw_os_error(2));
        let text = err.to_string();
        assert!(text.starts_with("Failed to read WifiSARHeader"), "got: {}", text);
        assert!(text.contains("os error 2"), "got: {}", text);
        assert!(!err.is_fatal());
    }
}
