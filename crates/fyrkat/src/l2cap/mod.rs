//! L2CAP (Logical Link Control and Adaptation Protocol) framing
//!
//! Basic-mode framing only: the ATT fixed channel is the single consumer on
//! this peripheral, so there is no dynamic channel management.

pub mod packet;


pub use packet::{L2capError, L2capFrame, Reassembler, L2CAP_HEADER_LEN};
