//! L2CAP basic-mode frame handling
//!
//! The peripheral only speaks over the ATT fixed channel, so this module is
//! limited to basic-mode framing: header build/parse, reassembly of inbound
//! ACL fragments, and fragmentation of outbound frames to the controller's
//! ACL payload size.

use crate::hci::constants::{ACL_PB_CONTINUING, ACL_PB_FIRST_NON_FLUSHABLE};
use crate::hci::packet::AclData;
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Size of the basic L2CAP header: length (2) + channel ID (2)
pub const L2CAP_HEADER_LEN: usize = 4;

/// L2CAP errors
#[derive(Error, Debug)]
pub enum L2capError {
    #[error("Invalid L2CAP frame")]
    InvalidFrame,

    #[error("Continuation fragment without a frame in progress")]
    UnexpectedContinuation,

    #[error("Fragment overruns the announced frame length")]
    FrameOverrun,
}

/// A complete L2CAP basic-mode frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2capFrame {
    /// Channel ID
    pub cid: u16,
    /// Frame payload
    pub payload: Vec<u8>,
}

impl L2capFrame {
    /// Create a new frame for the given channel
    pub fn new(cid: u16, payload: Vec<u8>) -> Self {
        Self { cid, payload }
    }

    /// Serialize header + payload
    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(L2CAP_HEADER_LEN + self.payload.len());
        data.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        data.extend_from_slice(&self.cid.to_le_bytes());
        data.extend_from_slice(&self.payload);
        data
    }

    /// Split a serialized frame into ACL packets no larger than `acl_mtu`.
    /// Host-to-controller LE data must start non-automatically-flushable.
    pub fn fragments(&self, handle: u16, acl_mtu: usize) -> Vec<AclData> {
        let data = self.serialize();
        let mut packets = Vec::new();

        for (i, chunk) in data.chunks(acl_mtu).enumerate() {
            packets.push(AclData {
                handle,
                pb_flag: if i == 0 {
                    ACL_PB_FIRST_NON_FLUSHABLE
                } else {
                    ACL_PB_CONTINUING
                },
                bc_flag: 0,
                data: chunk.to_vec(),
            });
        }

        packets
    }
}

/// Reassembles L2CAP frames from ACL fragments.
///
/// Holds at most one frame in progress; a new first fragment discards any
/// unfinished predecessor, which is what the controller guarantees anyway
/// for a single link.
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: Vec<u8>,
}

impl Reassembler {
    /// Create a new, empty reassembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any partially assembled frame
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Feed one ACL packet; returns a frame once its final fragment arrives
    pub fn feed(&mut self, acl: &AclData) -> Result<Option<L2capFrame>, L2capError> {
        if acl.pb_flag == ACL_PB_CONTINUING {
            if self.buffer.is_empty() {
                return Err(L2capError::UnexpectedContinuation);
            }
            self.buffer.extend_from_slice(&acl.data);
        } else {
            self.buffer.clear();
            self.buffer.extend_from_slice(&acl.data);
        }

        // The header itself may span fragments; wait for it
        if self.buffer.len() < L2CAP_HEADER_LEN {
            return Ok(None);
        }

        let payload_len = LittleEndian::read_u16(&self.buffer[0..2]) as usize;
        let total = L2CAP_HEADER_LEN + payload_len;

        if self.buffer.len() < total {
            return Ok(None);
        }
        if self.buffer.len() > total {
            self.buffer.clear();
            return Err(L2capError::FrameOverrun);
        }

        let cid = LittleEndian::read_u16(&self.buffer[2..4]);
        let payload = self.buffer.split_off(L2CAP_HEADER_LEN);
        self.buffer.clear();

        Ok(Some(L2capFrame { cid, payload }))
    }
}
