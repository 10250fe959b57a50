//! Type definitions for the ATT protocol
use super::constants::*;
use super::error::{AttError, AttErrorCode, AttResult};
use crate::uuid::Uuid;
use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

bitflags! {
    /// ATT attribute permission flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttPermissions: u16 {
        const READ = 0x0001;
        const WRITE = 0x0002;
        const READ_ENCRYPTED = 0x0004;
        const WRITE_ENCRYPTED = 0x0008;
        const READ_AUTHENTICATED = 0x0010;
        const WRITE_AUTHENTICATED = 0x0020;
    }
}

impl AttPermissions {
    /// Readable on any link
    pub fn read_only() -> Self {
        AttPermissions::READ
    }

    /// Writable only over an encrypted link
    pub fn write_encrypted() -> Self {
        AttPermissions::WRITE | AttPermissions::WRITE_ENCRYPTED
    }

    /// Minimum security level required for reading
    pub fn read_security_level(&self) -> SecurityLevel {
        if self.contains(AttPermissions::READ_AUTHENTICATED) {
            SecurityLevel::EncryptionWithAuthentication
        } else if self.contains(AttPermissions::READ_ENCRYPTED) {
            SecurityLevel::EncryptionOnly
        } else {
            SecurityLevel::None
        }
    }

    /// Minimum security level required for writing
    pub fn write_security_level(&self) -> SecurityLevel {
        if self.contains(AttPermissions::WRITE_AUTHENTICATED) {
            SecurityLevel::EncryptionWithAuthentication
        } else if self.contains(AttPermissions::WRITE_ENCRYPTED) {
            SecurityLevel::EncryptionOnly
        } else {
            SecurityLevel::None
        }
    }

    /// Check if the permissions allow reading at the given security level
    pub fn allows_read_with_security(&self, level: SecurityLevel) -> bool {
        self.contains(AttPermissions::READ) && level >= self.read_security_level()
    }

    /// Check if the permissions allow writing at the given security level
    pub fn allows_write_with_security(&self, level: SecurityLevel) -> bool {
        self.contains(AttPermissions::WRITE) && level >= self.write_security_level()
    }
}

/// Security level of the link an ATT operation arrives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    /// No security (unencrypted)
    None,
    /// Encryption without authentication
    EncryptionOnly,
    /// Encryption with authentication
    EncryptionWithAuthentication,
}

/// ATT packet formats
pub trait AttPacket: Sized {
    /// Opcode for this packet
    fn opcode() -> u8;

    /// Parse packet from bytes
    fn parse(data: &[u8]) -> AttResult<Self>;

    /// Serialize packet to bytes
    fn serialize(&self) -> Vec<u8>;
}

/// Error response packet
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    /// Request opcode in error
    pub request_opcode: u8,
    /// Attribute handle in error
    pub handle: u16,
    /// Error code
    pub error_code: AttErrorCode,
}

impl AttPacket for ErrorResponse {
    fn opcode() -> u8 {
        ATT_ERROR_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 5 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let request_opcode = data[1];

        let mut cursor = Cursor::new(&data[2..]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        let error_code = data[4].into();

        Ok(Self {
            request_opcode,
            handle,
            error_code,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5);

        packet.push(Self::opcode());
        packet.push(self.request_opcode);
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.push(self.error_code.into());

        packet
    }
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(request_opcode: u8, handle: u16, error_code: AttErrorCode) -> Self {
        Self {
            request_opcode,
            handle,
            error_code,
        }
    }
}

/// Exchange MTU Request packet
#[derive(Debug, Clone)]
pub struct ExchangeMtuRequest {
    /// Client Rx MTU size
    pub client_mtu: u16,
}

impl AttPacket for ExchangeMtuRequest {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 3 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let client_mtu = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        Ok(Self { client_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.client_mtu.to_le_bytes());

        packet
    }
}

/// Exchange MTU Response packet
#[derive(Debug, Clone)]
pub struct ExchangeMtuResponse {
    /// Server Rx MTU size
    pub server_mtu: u16,
}

impl AttPacket for ExchangeMtuResponse {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 3 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let server_mtu = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        Ok(Self { server_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.server_mtu.to_le_bytes());

        packet
    }
}

/// Find Information Request packet
#[derive(Debug, Clone)]
pub struct FindInformationRequest {
    /// First requested handle
    pub start_handle: u16,
    /// Last requested handle
    pub end_handle: u16,
}

impl AttPacket for FindInformationRequest {
    fn opcode() -> u8 {
        ATT_FIND_INFO_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 5 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let start_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        let end_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        Ok(Self {
            start_handle,
            end_handle,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5);

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.start_handle.to_le_bytes());
        packet.extend_from_slice(&self.end_handle.to_le_bytes());

        packet
    }
}

/// Handle-UUID pair in a Find Information Response
#[derive(Debug, Clone)]
pub enum HandleUuidPair {
    /// 16-bit UUID
    Uuid16(u16, u16),
    /// 128-bit UUID
    Uuid128(u16, Uuid),
}

/// Find Information Response packet
#[derive(Debug, Clone)]
pub struct FindInformationResponse {
    /// Format of information data
    pub format: u8,
    /// List of handle-UUID pairs
    pub information_data: Vec<HandleUuidPair>,
}

impl AttPacket for FindInformationResponse {
    fn opcode() -> u8 {
        ATT_FIND_INFO_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 2 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let format = data[1];
        let entry_len = match format {
            ATT_FIND_INFO_RSP_FORMAT_16BIT => 4,
            ATT_FIND_INFO_RSP_FORMAT_128BIT => 18,
            _ => return Err(AttError::InvalidPdu),
        };

        let mut information_data = Vec::new();
        for chunk in data[2..].chunks(entry_len) {
            if chunk.len() != entry_len {
                return Err(AttError::InvalidPdu);
            }
            let handle = u16::from_le_bytes([chunk[0], chunk[1]]);
            if format == ATT_FIND_INFO_RSP_FORMAT_16BIT {
                let uuid16 = u16::from_le_bytes([chunk[2], chunk[3]]);
                information_data.push(HandleUuidPair::Uuid16(handle, uuid16));
            } else {
                let uuid = Uuid::try_from_slice_le(&chunk[2..]).ok_or(AttError::InvalidPdu)?;
                information_data.push(HandleUuidPair::Uuid128(handle, uuid));
            }
        }

        Ok(Self {
            format,
            information_data,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode(), self.format];

        for pair in &self.information_data {
            match pair {
                HandleUuidPair::Uuid16(handle, uuid16) => {
                    packet.extend_from_slice(&handle.to_le_bytes());
                    packet.extend_from_slice(&uuid16.to_le_bytes());
                }
                HandleUuidPair::Uuid128(handle, uuid) => {
                    packet.extend_from_slice(&handle.to_le_bytes());
                    packet.extend_from_slice(&uuid.bytes_le());
                }
            }
        }

        packet
    }
}

/// Read By Type Request packet
#[derive(Debug, Clone)]
pub struct ReadByTypeRequest {
    /// First requested handle
    pub start_handle: u16,
    /// Last requested handle
    pub end_handle: u16,
    /// Attribute type to read
    pub attribute_type: Uuid,
}

impl AttPacket for ReadByTypeRequest {
    fn opcode() -> u8 {
        ATT_READ_BY_TYPE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        // 16-bit or 128-bit type UUID
        if (data.len() != 7 && data.len() != 21) || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let start_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        let end_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        let attribute_type = Uuid::try_from_slice_le(&data[5..]).ok_or(AttError::InvalidPdu)?;

        Ok(Self {
            start_handle,
            end_handle,
            attribute_type,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(7);

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.start_handle.to_le_bytes());
        packet.extend_from_slice(&self.end_handle.to_le_bytes());
        packet.extend_from_slice(&self.attribute_type.to_wire());

        packet
    }
}

/// Handle-value entry in a Read By Type Response
#[derive(Debug, Clone)]
pub struct HandleValue {
    /// Attribute handle
    pub handle: u16,
    /// Attribute value
    pub value: Vec<u8>,
}

/// Read By Type Response packet
#[derive(Debug, Clone)]
pub struct ReadByTypeResponse {
    /// Length of each entry (handle + value)
    pub length: u8,
    /// List of handle-value entries
    pub data: Vec<HandleValue>,
}

impl AttPacket for ReadByTypeResponse {
    fn opcode() -> u8 {
        ATT_READ_BY_TYPE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 2 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let length = data[1] as usize;
        if length < 3 {
            return Err(AttError::InvalidPdu);
        }

        let mut entries = Vec::new();
        for chunk in data[2..].chunks(length) {
            if chunk.len() != length {
                return Err(AttError::InvalidPdu);
            }
            entries.push(HandleValue {
                handle: u16::from_le_bytes([chunk[0], chunk[1]]),
                value: chunk[2..].to_vec(),
            });
        }

        Ok(Self {
            length: length as u8,
            data: entries,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode(), self.length];

        for entry in &self.data {
            packet.extend_from_slice(&entry.handle.to_le_bytes());
            packet.extend_from_slice(&entry.value);
        }

        packet
    }
}

/// Read By Group Type Request packet
#[derive(Debug, Clone)]
pub struct ReadByGroupTypeRequest {
    /// First requested handle
    pub start_handle: u16,
    /// Last requested handle
    pub end_handle: u16,
    /// Group type to read
    pub group_type: Uuid,
}

impl AttPacket for ReadByGroupTypeRequest {
    fn opcode() -> u8 {
        ATT_READ_BY_GROUP_TYPE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if (data.len() != 7 && data.len() != 21) || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let start_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        let end_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        let group_type = Uuid::try_from_slice_le(&data[5..]).ok_or(AttError::InvalidPdu)?;

        Ok(Self {
            start_handle,
            end_handle,
            group_type,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(7);

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.start_handle.to_le_bytes());
        packet.extend_from_slice(&self.end_handle.to_le_bytes());
        packet.extend_from_slice(&self.group_type.to_wire());

        packet
    }
}

/// Group entry in a Read By Group Type Response
#[derive(Debug, Clone)]
pub struct AttributeData {
    /// Group start handle
    pub handle: u16,
    /// Group end handle
    pub end_group_handle: u16,
    /// Group value (the service UUID)
    pub value: Vec<u8>,
}

/// Read By Group Type Response packet
#[derive(Debug, Clone)]
pub struct ReadByGroupTypeResponse {
    /// Length of each entry (handles + value)
    pub length: u8,
    /// List of group entries
    pub data: Vec<AttributeData>,
}

impl AttPacket for ReadByGroupTypeResponse {
    fn opcode() -> u8 {
        ATT_READ_BY_GROUP_TYPE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 2 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let length = data[1] as usize;
        if length < 5 {
            return Err(AttError::InvalidPdu);
        }

        let mut entries = Vec::new();
        for chunk in data[2..].chunks(length) {
            if chunk.len() != length {
                return Err(AttError::InvalidPdu);
            }
            entries.push(AttributeData {
                handle: u16::from_le_bytes([chunk[0], chunk[1]]),
                end_group_handle: u16::from_le_bytes([chunk[2], chunk[3]]),
                value: chunk[4..].to_vec(),
            });
        }

        Ok(Self {
            length: length as u8,
            data: entries,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode(), self.length];

        for entry in &self.data {
            packet.extend_from_slice(&entry.handle.to_le_bytes());
            packet.extend_from_slice(&entry.end_group_handle.to_le_bytes());
            packet.extend_from_slice(&entry.value);
        }

        packet
    }
}

/// Read Request packet
#[derive(Debug, Clone)]
pub struct ReadRequest {
    /// Handle to read
    pub handle: u16,
}

impl AttPacket for ReadRequest {
    fn opcode() -> u8 {
        ATT_READ_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 3 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        Ok(Self { handle })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());

        packet
    }
}

/// Read Response packet
#[derive(Debug, Clone)]
pub struct ReadResponse {
    /// Attribute value
    pub value: Vec<u8>,
}

impl AttPacket for ReadResponse {
    fn opcode() -> u8 {
        ATT_READ_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.is_empty() || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        Ok(Self {
            value: data[1..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + self.value.len());

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.value);

        packet
    }
}

/// Write Request packet
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Handle to write
    pub handle: u16,
    /// Value to write
    pub value: Vec<u8>,
}

impl AttPacket for WriteRequest {
    fn opcode() -> u8 {
        ATT_WRITE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 3 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        let value = data[3..].to_vec();

        Ok(Self { handle, value })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3 + self.value.len());

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);

        packet
    }
}

/// Write Response packet
#[derive(Debug, Clone)]
pub struct WriteResponse;

impl AttPacket for WriteResponse {
    fn opcode() -> u8 {
        ATT_WRITE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.is_empty() || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        Ok(Self)
    }

    fn serialize(&self) -> Vec<u8> {
        vec![Self::opcode()]
    }
}

/// Write Command packet
#[derive(Debug, Clone)]
pub struct WriteCommand {
    /// Handle to write
    pub handle: u16,
    /// Value to write
    pub value: Vec<u8>,
}

impl AttPacket for WriteCommand {
    fn opcode() -> u8 {
        ATT_WRITE_CMD
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 3 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        let value = data[3..].to_vec();

        Ok(Self { handle, value })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3 + self.value.len());

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);

        packet
    }
}

/// Prepare Write Request packet
#[derive(Debug, Clone)]
pub struct PrepareWriteRequest {
    /// Handle to write
    pub handle: u16,
    /// Offset to write at
    pub offset: u16,
    /// Part of the value to write
    pub value: Vec<u8>,
}

impl AttPacket for PrepareWriteRequest {
    fn opcode() -> u8 {
        ATT_PREPARE_WRITE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 5 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        let offset = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        let value = data[5..].to_vec();

        Ok(Self {
            handle,
            offset,
            value,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5 + self.value.len());

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.offset.to_le_bytes());
        packet.extend_from_slice(&self.value);

        packet
    }
}

/// Prepare Write Response packet
#[derive(Debug, Clone)]
pub struct PrepareWriteResponse {
    /// Handle being written
    pub handle: u16,
    /// Offset being written
    pub offset: u16,
    /// Part of the value being written
    pub value: Vec<u8>,
}

impl AttPacket for PrepareWriteResponse {
    fn opcode() -> u8 {
        ATT_PREPARE_WRITE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 5 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        let offset = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;

        let value = data[5..].to_vec();

        Ok(Self {
            handle,
            offset,
            value,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5 + self.value.len());

        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.offset.to_le_bytes());
        packet.extend_from_slice(&self.value);

        packet
    }
}

/// Execute Write Request packet
#[derive(Debug, Clone)]
pub struct ExecuteWriteRequest {
    /// Flags (commit or cancel)
    pub flags: u8,
}

impl AttPacket for ExecuteWriteRequest {
    fn opcode() -> u8 {
        ATT_EXECUTE_WRITE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 2 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        Ok(Self { flags: data[1] })
    }

    fn serialize(&self) -> Vec<u8> {
        vec![Self::opcode(), self.flags]
    }
}

/// Execute Write Response packet
#[derive(Debug, Clone)]
pub struct ExecuteWriteResponse;

impl AttPacket for ExecuteWriteResponse {
    fn opcode() -> u8 {
        ATT_EXECUTE_WRITE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.is_empty() || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }

        Ok(Self)
    }

    fn serialize(&self) -> Vec<u8> {
        vec![Self::opcode()]
    }
}
