//! fyrkat - a Bluetooth Low Energy numeric keypad for Linux
//!
//! The peripheral advertises one GATT service with a single write-only
//! characteristic. A connected central writes a short digit string to it
//! over an encrypted link; the device assembles and validates the write
//! transaction and types the digits, terminated by Enter, into whatever
//! currently holds keyboard focus, via a virtual uinput keyboard.
//!
//! The stack is self-contained: a raw HCI socket at the bottom, L2CAP
//! basic-mode framing on the ATT fixed channel, an ATT/GATT server above
//! it, and the keypad write-batch handler at the top.

pub mod att;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod hci;
pub mod keypad;
pub mod keys;
pub mod l2cap;
pub mod peripheral;
pub mod uuid;

// Re-export common types for convenience
pub use att::{AttError, AttErrorCode, AttServer};
pub use error::{Error, HciError};
pub use gap::{Advertiser, BdAddr, PowerState};
pub use gatt::ServiceBuilder;
pub use hci::{HciCommand, HciEvent, HciSocket};
pub use keypad::{BatchError, KeypadHandler, MAXLEN};
pub use keys::{KeyCode, KeyEventSink, UinputKeyboard};
pub use l2cap::{L2capError, L2capFrame};
pub use peripheral::{Peripheral, PeripheralConfig};
pub use uuid::Uuid;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_hci_socket() {
        // Only passes with sufficient privileges and a Bluetooth adapter;
        // environments without either skip silently.
        if let Ok(socket) = HciSocket::open(0) {
            assert!(socket.as_raw_fd() > 0);
        }
    }
}
