//! HCI packet structures and parsing
//!
//! Typed HCI commands for the peripheral role, plus parsing of the event
//! and ACL data packets the controller sends back.

use crate::hci::constants::*;

/// Maximum length of the advertising / scan response data payload.
pub const ADV_DATA_MAX_LEN: usize = 31;

/// HCI commands used by the peripheral
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum HciCommand {
    // Host Controller Commands (OGF: 0x03)
    Reset,
    SetEventMask {
        event_mask: u64,
    },

    // Informational Parameters (OGF: 0x04)
    ReadBdAddr,

    // LE Commands (OGF: 0x08)
    LeSetEventMask {
        event_mask: u64,
    },
    LeSetAdvertisingParameters {
        interval_min: u16,
        interval_max: u16,
        adv_type: u8,
        own_address_type: u8,
        channel_map: u8,
        filter_policy: u8,
    },
    LeSetAdvertisingData {
        data: Vec<u8>,
    },
    LeSetScanResponseData {
        data: Vec<u8>,
    },
    LeSetAdvertisingEnable {
        enable: bool,
    },
}

impl HciCommand {
    /// Get the OGF and OCF for this command
    pub fn opcode_parts(&self) -> (u8, u16) {
        match self {
            Self::Reset => (OGF_HOST_CTL, OCF_RESET),
            Self::SetEventMask { .. } => (OGF_HOST_CTL, OCF_SET_EVENT_MASK),
            Self::ReadBdAddr => (OGF_INFO_PARAM, OCF_READ_BD_ADDR),
            Self::LeSetEventMask { .. } => (OGF_LE, OCF_LE_SET_EVENT_MASK),
            Self::LeSetAdvertisingParameters { .. } => {
                (OGF_LE, OCF_LE_SET_ADVERTISING_PARAMETERS)
            }
            Self::LeSetAdvertisingData { .. } => (OGF_LE, OCF_LE_SET_ADVERTISING_DATA),
            Self::LeSetScanResponseData { .. } => (OGF_LE, OCF_LE_SET_SCAN_RESPONSE_DATA),
            Self::LeSetAdvertisingEnable { .. } => (OGF_LE, OCF_LE_SET_ADVERTISING_ENABLE),
        }
    }

    /// Get the 16-bit opcode for this command
    pub fn opcode(&self) -> u16 {
        let (ogf, ocf) = self.opcode_parts();
        opcode(ogf, ocf)
    }

    /// Convert the command to its raw parameter bytes
    fn parameters(&self) -> Vec<u8> {
        match self {
            Self::Reset | Self::ReadBdAddr => vec![],

            Self::SetEventMask { event_mask } | Self::LeSetEventMask { event_mask } => {
                event_mask.to_le_bytes().to_vec()
            }

            Self::LeSetAdvertisingParameters {
                interval_min,
                interval_max,
                adv_type,
                own_address_type,
                channel_map,
                filter_policy,
            } => {
                let mut params = Vec::with_capacity(15);
                params.extend_from_slice(&interval_min.to_le_bytes());
                params.extend_from_slice(&interval_max.to_le_bytes());
                params.push(*adv_type);
                params.push(*own_address_type);
                params.push(0x00); // Peer address type (unused for undirected)
                params.extend_from_slice(&[0u8; 6]); // Peer address (unused)
                params.push(*channel_map);
                params.push(*filter_policy);
                params
            }

            Self::LeSetAdvertisingData { data } | Self::LeSetScanResponseData { data } => {
                // Fixed 32-byte parameter block: significant length + padded payload
                let len = std::cmp::min(data.len(), ADV_DATA_MAX_LEN);
                let mut params = Vec::with_capacity(1 + ADV_DATA_MAX_LEN);
                params.push(len as u8);
                params.extend_from_slice(&data[..len]);
                params.resize(1 + ADV_DATA_MAX_LEN, 0);
                params
            }

            Self::LeSetAdvertisingEnable { enable } => vec![*enable as u8],
        }
    }

    /// Convert the command to a raw HCI packet
    pub fn to_packet(&self) -> Vec<u8> {
        let params = self.parameters();
        debug_assert!(params.len() <= HCI_MAX_PARAM_LEN);

        let mut packet = vec![HCI_COMMAND_PKT];
        packet.extend_from_slice(&self.opcode().to_le_bytes());
        packet.push(params.len() as u8);
        packet.extend_from_slice(&params);
        packet
    }
}

/// HCI Event packet
#[derive(Debug, Clone)]
pub struct HciEvent {
    pub event_code: u8,
    pub parameter_total_length: u8,
    pub parameters: Vec<u8>,
}

impl HciEvent {
    /// Parse an HCI event from raw bytes (after the packet type byte)
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }

        let event_code = data[0];
        let parameter_total_length = data[1];

        if data.len() < (parameter_total_length as usize + 2) {
            return None;
        }

        let parameters = data[2..(parameter_total_length as usize + 2)].to_vec();

        Some(HciEvent {
            event_code,
            parameter_total_length,
            parameters,
        })
    }

    /// Check whether this is a Command Complete event for the given opcode
    pub fn is_command_complete(&self, opcode: u16) -> bool {
        self.event_code == EVT_CMD_COMPLETE
            && self.parameters.len() >= 3
            && u16::from_le_bytes([self.parameters[1], self.parameters[2]]) == opcode
    }

    /// Status byte of a Command Complete event, if present
    pub fn command_status(&self) -> Option<u8> {
        if self.event_code == EVT_CMD_COMPLETE {
            self.parameters.get(3).copied()
        } else {
            None
        }
    }

    /// Return parameters of a Command Complete event after the status byte
    pub fn return_parameters(&self) -> &[u8] {
        if self.event_code == EVT_CMD_COMPLETE && self.parameters.len() > 4 {
            &self.parameters[4..]
        } else {
            &[]
        }
    }
}

/// ACL data packet
#[derive(Debug, Clone)]
pub struct AclData {
    /// Connection handle (12 bits)
    pub handle: u16,
    /// Packet boundary flag
    pub pb_flag: u8,
    /// Broadcast flag
    pub bc_flag: u8,
    /// Payload (one or part of one L2CAP frame)
    pub data: Vec<u8>,
}

impl AclData {
    /// Parse an ACL data packet from raw bytes (after the packet type byte)
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }

        let header = u16::from_le_bytes([data[0], data[1]]);
        let handle = header & 0x0FFF;
        let pb_flag = ((header >> 12) & 0x03) as u8;
        let bc_flag = ((header >> 14) & 0x03) as u8;

        let length = u16::from_le_bytes([data[2], data[3]]) as usize;
        if data.len() < 4 + length {
            return None;
        }

        Some(AclData {
            handle,
            pb_flag,
            bc_flag,
            data: data[4..4 + length].to_vec(),
        })
    }

    /// Convert the ACL data to a raw HCI packet
    pub fn to_packet(&self) -> Vec<u8> {
        let header = (self.handle & 0x0FFF)
            | ((self.pb_flag as u16 & 0x03) << 12)
            | ((self.bc_flag as u16 & 0x03) << 14);

        let mut packet = Vec::with_capacity(5 + self.data.len());
        packet.push(HCI_ACL_PKT);
        packet.extend_from_slice(&header.to_le_bytes());
        packet.extend_from_slice(&(self.data.len() as u16).to_le_bytes());
        packet.extend_from_slice(&self.data);
        packet
    }
}

/// A packet read from the HCI socket
#[derive(Debug, Clone)]
pub enum HciPacket {
    Event(HciEvent),
    AclData(AclData),
}

impl HciPacket {
    /// Parse a raw packet including its leading packet type byte
    pub fn parse(raw: &[u8]) -> Option<Self> {
        match raw.first()? {
            &HCI_EVENT_PKT => HciEvent::parse(&raw[1..]).map(HciPacket::Event),
            &HCI_ACL_PKT => AclData::parse(&raw[1..]).map(HciPacket::AclData),
            _ => None,
        }
    }
}
