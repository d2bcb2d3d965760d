//! Color Peripheral Protocol
//!
//! Identifiers, limits and ATT result codes shared by the peripheral and
//! the platform adapter.

use anyhow::Result;
use std::fmt;
use uuid::Uuid;

/// Default primary service UUID (16-bit form)
pub const DEFAULT_SERVICE_UUID: &str = "180D";

/// Default color characteristic UUID (16-bit form)
pub const DEFAULT_COLOR_CHAR_UUID: &str = "2A37";

/// Default advertised local name
pub const DEFAULT_LOCAL_NAME: &str = "Color Peripheral";

/// Longest local name that fits a legacy advertising payload
/// (31 bytes minus the 2-byte AD structure header)
pub const MAX_LOCAL_NAME_LEN: usize = 29;

/// Bluetooth Base UUID, `00000000-0000-1000-8000-00805F9B34FB`.
/// Short UUIDs occupy the top 32 bits.
pub const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// Expand a 16- or 32-bit assigned number over the Base UUID
pub const fn uuid_from_short(short: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Parse a UUID string
///
/// Accepts 4 or 8 hex digit short forms (`"180D"`, `"0000180D"`) as well as
/// full 128-bit UUIDs with or without hyphens.
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid> {
    let trimmed = uuid_str.trim();
    let compact = trimmed.replace('-', "");

    match compact.len() {
        4 | 8 if compact.bytes().all(|b| b.is_ascii_hexdigit()) => {
            let short = u32::from_str_radix(&compact, 16)?;
            Ok(uuid_from_short(short))
        }
        32 => Ok(Uuid::parse_str(trimmed)?),
        _ => Err(anyhow::anyhow!("Invalid UUID format: {:?}", uuid_str)),
    }
}

/// Opaque identifier of a connected central
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CentralId(pub String);

impl fmt::Display for CentralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CentralId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Platform handle used to answer a specific ATT request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// A read or write request addressed to one characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttRequest {
    pub id: RequestId,
    pub central: CentralId,
    pub characteristic_id: Uuid,
    pub offset: usize,
}

/// ATT result codes used when answering requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttStatus {
    Success,
    InvalidHandle,
    InvalidOffset,
    InvalidAttributeValueLength,
    UnlikelyError,
}

impl AttStatus {
    /// Raw error code as carried in an ATT Error Response
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::InvalidHandle => 0x01,
            Self::InvalidOffset => 0x07,
            Self::InvalidAttributeValueLength => 0x0D,
            Self::UnlikelyError => 0x0E,
        }
    }
}

/// Slice a value for a (possibly long) read at `offset`
pub fn read_at_offset(value: &[u8], offset: usize) -> std::result::Result<Vec<u8>, AttStatus> {
    value
        .get(offset..)
        .map(<[u8]>::to_vec)
        .ok_or(AttStatus::InvalidOffset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_uuid() {
        let uuid = parse_uuid(DEFAULT_SERVICE_UUID).unwrap();
        assert_eq!(uuid.to_string(), "0000180d-0000-1000-8000-00805f9b34fb");
        assert_eq!(parse_uuid("0000180D").unwrap(), uuid);
        assert_eq!(uuid_from_short(0x180D), uuid);
    }

    #[test]
    fn test_parse_full_uuid() {
        let uuid = parse_uuid("4f63756c-7573-2054-6872-65656d6f7465").unwrap();
        assert_eq!(uuid.as_u128() >> 96, 0x4f63756c);
        assert_eq!(parse_uuid("4f63756c75732054687265656d6f7465").unwrap(), uuid);
    }

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        assert!(parse_uuid("").is_err());
        assert!(parse_uuid("18G0").is_err());
        assert!(parse_uuid("180D1").is_err());
    }

    #[test]
    fn test_att_codes() {
        assert_eq!(AttStatus::Success.code(), 0x00);
        assert_eq!(AttStatus::InvalidHandle.code(), 0x01);
        assert_eq!(AttStatus::InvalidOffset.code(), 0x07);
        assert_eq!(AttStatus::InvalidAttributeValueLength.code(), 0x0D);
        assert_eq!(AttStatus::UnlikelyError.code(), 0x0E);
    }

    #[test]
    fn test_read_at_offset() {
        assert_eq!(read_at_offset(b"00FF00", 0).unwrap(), b"00FF00");
        assert_eq!(read_at_offset(b"00FF00", 4).unwrap(), b"00");
        assert_eq!(read_at_offset(b"00FF00", 6).unwrap(), b"");
        assert_eq!(read_at_offset(b"00FF00", 7), Err(AttStatus::InvalidOffset));
    }
}
