//! Error types for the fyrkat library
//!
//! Each layer carries its own error enum; this module defines the HCI
//! socket errors and the crate-level umbrella used by binaries.

use thiserror::Error;

/// Errors that can occur when working with HCI sockets
#[derive(Error, Debug)]
pub enum HciError {
    #[error("Failed to open HCI socket: {0}")]
    SocketError(#[from] std::io::Error),

    #[error("Failed to bind to HCI device: {0}")]
    BindError(std::io::Error),

    #[error("Failed to apply HCI packet filter: {0}")]
    FilterError(std::io::Error),

    #[error("Failed to send HCI packet: {0}")]
    SendError(std::io::Error),

    #[error("Failed to receive HCI packet: {0}")]
    ReceiveError(std::io::Error),

    #[error("Invalid HCI packet format")]
    InvalidPacketFormat,

    #[error("Command {0:#06x} failed with status {1:#04x}")]
    CommandFailed(u16, u8),

    #[error("No completion event received for command {0:#06x}")]
    CommandTimeout(u16),
}

/// Crate-level error
#[derive(Error, Debug)]
pub enum Error {
    #[error("HCI error: {0}")]
    Hci(#[from] HciError),

    #[error("L2CAP error: {0}")]
    L2cap(#[from] crate::l2cap::L2capError),

    #[error("ATT error: {0}")]
    Att(#[from] crate::att::AttError),

    #[error("Keystroke injection error: {0}")]
    Inject(#[from] crate::keys::InjectError),
}
