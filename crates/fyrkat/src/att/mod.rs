//! Attribute Protocol (ATT) implementation
//!
//! The server side of the ATT protocol: PDU types, the attribute database,
//! and a request dispatcher that hands complete write transactions to a
//! [`server::WriteSink`].

pub mod constants;
pub mod database;
pub mod error;
pub mod server;
pub mod types;

#[cfg(test)]
mod tests;

pub use self::constants::*;
pub use self::database::{Attribute, AttributeDatabase};
pub use self::error::{AttError, AttErrorCode, AttResult};
pub use self::server::{AttServer, AttServerConfig, WriteFragment, WriteSink};
pub use self::types::*;
