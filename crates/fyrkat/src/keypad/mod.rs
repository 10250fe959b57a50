//! The keypad profile
//!
//! One primary service with one write-only characteristic. A central writes
//! a digit string to the characteristic over an encrypted link; the handler
//! assembles and validates the write transaction and types the digits,
//! terminated by Enter, into whatever holds keyboard focus.

pub mod buffer;
pub mod handler;

#[cfg(test)]
mod tests;

pub use buffer::{InputBuffer, Slot, MAXLEN};
pub use handler::{BatchError, KeypadHandler};

use crate::att::error::AttResult;
use crate::att::types::AttPermissions;
use crate::gatt::server::ServiceBuilder;
use crate::gatt::types::CharacteristicProperties;
use crate::uuid::Uuid;

/// UUID of the keypad service.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0xB670003C_0079_465C_9BA7_6C0539CCD67F);

/// UUID of the write-only input characteristic.
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0xF4186B06_D796_4327_AF39_AC22C50BDCA8);

/// Register the keypad service; returns the characteristic value handle
/// write batches must address.
pub fn register(builder: &mut ServiceBuilder) -> AttResult<u16> {
    builder.add_service(SERVICE_UUID, true)?;
    builder.add_characteristic(
        CHARACTERISTIC_UUID,
        CharacteristicProperties::WRITE,
        AttPermissions::write_encrypted(),
        Vec::new(),
    )
}
