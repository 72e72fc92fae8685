use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SarError;

/// A 128-bit identifier in the mixed-endian layout used by UEFI and the WLAN API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid(Uuid);

impl Guid {
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self(Uuid::from_fields(data1, data2, data3, &data4))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Binary form: the first three fields little-endian, `data4` as-is.
    pub fn to_bytes_le(&self) -> [u8; 16] {
        self.0.to_bytes_le()
    }

    pub fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes_le(bytes))
    }

    /// Lower-case, brace-less form used as the suffix of efivarfs file names.
    pub fn to_efivar_string(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0.braced())
    }
}

/// Accepts `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` or the same without braces,
/// in either case.
impl FromStr for Guid {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SarError::InvalidArgument(format!("not a GUID: {s:?}"));

        let body = match (s.strip_prefix('{'), s.strip_suffix('}')) {
            (Some(_), Some(_)) => &s[1..s.len() - 1],
            (None, None) => s,
            _ => return Err(invalid()),
        };
        // Leave out the simple and urn forms Uuid also understands
        if body.len() != 36 {
            return Err(invalid());
        }
        Uuid::try_parse(body).map(Self).map_err(|_| invalid())
    }
}
