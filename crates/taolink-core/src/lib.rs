//! TaoLink Core Crate
//!
//! Shared foundations for the TaoLink platform: the datapoint value model
//! and the device-session contract the schema engine calls into.
//!
//! ## Architecture
//!
//! - **DpValue / DpType**: scalar values as they appear on the wire and in
//!   schemas, with the type-compatibility and coercion rules used by
//!   matching and by the write path
//! - **DpSnapshot**: an observed raw property map, the input of every
//!   engine operation
//! - **DeviceSession**: async transport-side collaborator; the engine
//!   computes complete write sets, the session applies them as one batch

pub mod session;
pub mod value;

pub use session::{DeviceSession, DpSnapshot, SessionError};
pub use value::{DpType, DpValue};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
