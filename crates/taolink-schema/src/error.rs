//! Errors raised by schema loading and by the value-mapping engine.
//!
//! Load failures are fatal for the one schema being registered only; the
//! rest of the catalog stays usable. All write-side validation errors are
//! raised before any property write is handed to the device session.

use taolink_core::{DpValue, SessionError};

/// Errors that can occur loading schemas or mapping values.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema document could not be parsed
    #[error("Malformed schema document '{source_id}': {source}")]
    Document {
        source_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The document parsed but violates a structural rule
    #[error("Invalid schema '{schema}': {detail}")]
    Validation { schema: String, detail: String },

    /// A redirect or constraint names a dp that does not exist in its entity
    #[error("Invalid schema '{schema}': dp '{dp}' references unknown dp '{target}'")]
    UnknownReference {
        schema: String,
        dp: String,
        target: String,
    },

    /// The redirect/constraint reference graph loops back on itself
    #[error("Invalid schema '{schema}': cyclic redirect or constraint reference involving dp '{dp}'")]
    CyclicReference { schema: String, dp: String },

    /// Write attempted on a read-only dp
    #[error("{name} is read only")]
    ReadOnly { name: String },

    /// The requested value is flagged invalid under the current device state
    #[error("{name} cannot be set at this time")]
    InvalidState { name: String },

    /// The computed raw value falls outside the declared range
    #[error("{name} ({value}) must be between {min} and {max}")]
    RangeViolation {
        name: String,
        value: DpValue,
        min: f64,
        max: f64,
    },

    /// A dp name lookup failed while resolving a write
    #[error("Unknown dp: {0}")]
    UnknownProperty(String),

    /// The device session reported a failure applying the write set
    #[error(transparent)]
    Session(#[from] SessionError),
}
