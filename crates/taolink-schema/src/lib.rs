//! TaoLink Schema Engine
//!
//! Identifies and interprets devices that expose only a flat set of small
//! integer-keyed raw properties ("dps") with no self-describing schema.
//! Observed snapshots are matched against a catalog of declarative device
//! schemas, and raw protocol values are translated to semantic values and
//! back, honoring scaling, stepping, range limits, conditional overrides
//! and indirection between dps.
//!
//! ## Architecture
//!
//! - **SchemaCatalog**: holds all loaded schemas; matching and scoring
//! - **DeviceSchema / EntitySchema**: one catalog entry and its
//!   user-facing device functions
//! - **DpSchema + MappingRule + MappingCondition**: one raw datapoint and
//!   its declarative translation rules
//! - **DpHandle / EntityHandle**: borrowed views carrying the back-
//!   references the engine needs for sibling lookups
//!
//! Schemas deserialize from JSON documents, are validated once at
//! registration, and are immutable afterwards; every engine operation is
//! a pure function of a schema and a [`taolink_core::DpSnapshot`]. Raw
//! reads and writes stay behind the [`taolink_core::DeviceSession`]
//! collaborator, which receives each semantic write as one pre-merged
//! batch.

pub mod builtin;
pub mod catalog;
pub mod dps;
pub mod error;
pub mod schema;

pub use builtin::builtin_documents;
pub use catalog::SchemaCatalog;
pub use dps::{DpHandle, DpRange, DpSchema, MappingCondition, MappingRule};
pub use error::SchemaError;
pub use schema::{DeviceSchema, EntityHandle, EntityKind, EntitySchema};

// Re-exports for convenience
pub use taolink_core::{DeviceSession, DpSnapshot, DpType, DpValue, SessionError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
