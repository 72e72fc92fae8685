use bitflags::bitflags;
use std::fmt;

use crate::constants::STATUS_CODE_SIZE;
use crate::error::SarError;

bitflags! {
    /// Result word of a live SET. Flags combine, so test with `contains`;
    /// only success is a plain comparison (`is_success`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusCode: u32 {
        const INVALID_ANTENNA_INDEX = 0x1;
        const INVALID_TABLE_INDEX = 0x2;
        const STATE_ERROR = 0x4;
        const MIMO_NOT_SET = 0x8;
    }
}

impl StatusCode {
    pub const SUCCESS: Self = Self::empty();

    pub fn is_success(&self) -> bool {
        self.bits() == 0
    }

    /// Decode the 4-byte little-endian status word. Unknown bits are kept.
    pub fn decode(bytes: &[u8]) -> Result<Self, SarError> {
        let word: [u8; STATUS_CODE_SIZE] = bytes
            .get(..STATUS_CODE_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(SarError::truncated(STATUS_CODE_SIZE, bytes.len()))?;
        Ok(Self::from_bits_retain(u32::from_le_bytes(word)))
    }

    pub fn encode(&self) -> [u8; STATUS_CODE_SIZE] {
        self.bits().to_le_bytes()
    }

    /// `Ok(())` on success, otherwise `SarError::ProtocolStatus` for callers that want `?`.
    pub fn into_result(self) -> Result<(), SarError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(SarError::ProtocolStatus(self))
        }
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            return write!(f, "SUCCESS (0)");
        }

        let mut names: Vec<String> = self.iter_names().map(|(name, _)| name.to_string()).collect();
        let unknown = self.bits() & !Self::all().bits();
        if unknown != 0 {
            names.push(format!("UNKNOWN({unknown:#x})"));
        }
        write!(f, "{} ({})", names.join(" | "), self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_flags_test_individually() {
        let status = StatusCode::from_bits_retain(3);
        assert!(status.contains(StatusCode::INVALID_ANTENNA_INDEX));
        assert!(status.contains(StatusCode::INVALID_TABLE_INDEX));
        assert!(!status.contains(StatusCode::STATE_ERROR));
        assert!(!status.is_success());
        assert_ne!(status, StatusCode::SUCCESS);
    }

    #[test]
    fn test_display_lists_flag_names() {
        let status = StatusCode::INVALID_ANTENNA_INDEX | StatusCode::MIMO_NOT_SET;
        assert_eq!(status.to_string(), "INVALID_ANTENNA_INDEX | MIMO_NOT_SET (9)");
        assert_eq!(StatusCode::SUCCESS.to_string(), "SUCCESS (0)");
        assert_eq!(StatusCode::from_bits_retain(0x12).to_string(), "INVALID_TABLE_INDEX | UNKNOWN(0x10) (18)");
    }

    #[test]
    fn test_decode_requires_four_bytes() {
        assert!(matches!(
            StatusCode::decode(&[0x01, 0x00]),
            Err(SarError::TruncatedInput { expected: 4, actual: 2 })
        ));
        let status = StatusCode::decode(&[0x04, 0x00, 0x00, 0x00, 0xff]).unwrap();
        assert_eq!(status, StatusCode::STATE_ERROR);
    }

    #[test]
    fn test_into_result() {
        assert!(StatusCode::SUCCESS.into_result().is_ok());
        assert!(matches!(
            StatusCode::STATE_ERROR.into_result(),
            Err(SarError::ProtocolStatus(status)) if status == StatusCode::STATE_ERROR
        ));
    }
}
