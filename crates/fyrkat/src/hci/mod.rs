//! Bluetooth HCI (Host Controller Interface) implementation
//!
//! This module provides the raw transport the peripheral runs on: a socket
//! to the controller, typed commands, and event/ACL packet parsing.

pub mod constants;
pub mod packet;
pub mod socket;

#[cfg(test)]
mod tests;

pub use packet::{AclData, HciCommand, HciEvent, HciPacket};
pub use socket::HciSocket;
