use std::fmt;
use std::str::FromStr;

/// Represents a 128-bit Bluetooth UUID.
///
/// Handles conversion between the 16-bit SIG-assigned shorthand and the full
/// 128-bit form. Internally the UUID is always stored as a 128-bit value in
/// little-endian byte order, matching how UUIDs travel inside ATT PDUs.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uuid {
    bytes: [u8; 16],
}

/// The base UUID used for promoting 16-bit values to 128 bits.
/// Defined as "00000000-0000-1000-8000-00805F9B34FB" (little-endian representation).
const BASE_UUID_BYTES: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Offset within the base UUID where the 16-bit value is inserted.
const BASE_OFFSET: usize = 12;

impl Uuid {
    /// Creates a 128-bit UUID directly from 16 bytes (little-endian).
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Uuid { bytes }
    }

    /// Creates a 128-bit UUID from its numeric value, as written in the
    /// canonical dashed form (most significant byte first).
    pub const fn from_u128(value: u128) -> Self {
        Uuid {
            bytes: value.to_le_bytes(),
        }
    }

    /// Creates a 128-bit UUID from a 16-bit SIG-assigned value.
    /// Formula: `value * 2^96 + BASE_UUID`
    pub const fn from_u16(uuid16: u16) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[BASE_OFFSET] = uuid16 as u8;
        bytes[BASE_OFFSET + 1] = (uuid16 >> 8) as u8;
        Uuid { bytes }
    }

    /// Tries to create a UUID from a byte slice in little-endian order.
    ///
    /// Accepts slices of length 2 (16-bit shorthand) or 16 (full UUID).
    /// Returns `None` for any other length.
    pub fn try_from_slice_le(slice: &[u8]) -> Option<Self> {
        match slice.len() {
            2 => {
                let uuid16 = u16::from_le_bytes([slice[0], slice[1]]);
                Some(Uuid::from_u16(uuid16))
            }
            16 => {
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(slice);
                Some(Uuid::from_bytes_le(bytes))
            }
            _ => None,
        }
    }

    /// Returns the 16-bit shorthand if this UUID lies in the SIG base range.
    pub fn as_u16(&self) -> Option<u16> {
        let mut base = BASE_UUID_BYTES;
        base[BASE_OFFSET] = self.bytes[BASE_OFFSET];
        base[BASE_OFFSET + 1] = self.bytes[BASE_OFFSET + 1];

        if base == self.bytes {
            Some(u16::from_le_bytes([
                self.bytes[BASE_OFFSET],
                self.bytes[BASE_OFFSET + 1],
            ]))
        } else {
            None
        }
    }

    /// Returns the UUID bytes in little-endian order, as transmitted in PDUs.
    pub fn bytes_le(&self) -> [u8; 16] {
        self.bytes
    }

    /// Serializes the UUID in its shortest wire form: 2 bytes for
    /// SIG-assigned values, 16 bytes otherwise.
    pub fn to_wire(&self) -> Vec<u8> {
        match self.as_u16() {
            Some(uuid16) => uuid16.to_le_bytes().to_vec(),
            None => self.bytes.to_vec(),
        }
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bytes;
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            b[15], b[14], b[13], b[12],
            b[11], b[10],
            b[9], b[8],
            b[7], b[6],
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug shows the canonical dashed form, not a byte list.
        fmt::Display::fmt(self, f)
    }
}

/// Errors produced when parsing a UUID from its dashed string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseUuidError;

impl fmt::Display for ParseUuidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid UUID string")
    }
}

impl std::error::Error for ParseUuidError {}

impl FromStr for Uuid {
    type Err = ParseUuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_str: String = s.chars().filter(|c| *c != '-').collect();
        if hex_str.len() != 32 {
            return Err(ParseUuidError);
        }

        let decoded = hex::decode(&hex_str).map_err(|_| ParseUuidError)?;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&decoded);
        bytes.reverse(); // canonical form is big-endian, storage is little-endian
        Ok(Uuid { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u16_expands_over_base() {
        let uuid = Uuid::from_u16(0x2800);
        assert_eq!(uuid.as_u16(), Some(0x2800));
        assert_eq!(uuid.to_string(), "00002800-0000-1000-8000-00805F9B34FB");
    }

    #[test]
    fn test_from_u128_matches_canonical_form() {
        let uuid = Uuid::from_u128(0xB670003C_0079_465C_9BA7_6C0539CCD67F);
        assert_eq!(uuid.to_string(), "B670003C-0079-465C-9BA7-6C0539CCD67F");
        assert_eq!(uuid.as_u16(), None);
    }

    #[test]
    fn test_from_str_round_trip() {
        let text = "F4186B06-D796-4327-AF39-AC22C50BDCA8";
        let uuid = Uuid::from_str(text).unwrap();
        assert_eq!(uuid.to_string(), text);
        assert_eq!(uuid, Uuid::from_u128(0xF4186B06_D796_4327_AF39_AC22C50BDCA8));
    }

    #[test]
    fn test_from_str_rejects_malformed_input() {
        assert!(Uuid::from_str("not-a-uuid").is_err());
        assert!(Uuid::from_str("F4186B06").is_err());
    }

    #[test]
    fn test_wire_form_lengths() {
        assert_eq!(Uuid::from_u16(0x2803).to_wire(), vec![0x03, 0x28]);
        assert_eq!(Uuid::from_u128(1).to_wire().len(), 16);
    }

    #[test]
    fn test_slice_round_trip() {
        let uuid = Uuid::from_u128(0xB670003C_0079_465C_9BA7_6C0539CCD67F);
        let bytes = uuid.bytes_le();
        assert_eq!(Uuid::try_from_slice_le(&bytes), Some(uuid));
        assert_eq!(Uuid::try_from_slice_le(&[1, 2, 3]), None);
    }
}
