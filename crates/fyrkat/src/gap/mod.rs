//! GAP (Generic Access Profile) support for the peripheral role

pub mod advertiser;
pub mod constants;
pub mod types;

pub use advertiser::Advertiser;
pub use constants::*;
pub use types::{AddressType, BdAddr, PowerState};
