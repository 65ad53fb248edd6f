//! Built-in device schema library.
//!
//! Integrations normally load schema documents from their own storage; a
//! small set of known devices ships with the crate for out-of-the-box
//! identification and as realistic material for tests.

use crate::catalog::SchemaCatalog;

/// Built-in schema documents as `(source_id, json)` pairs.
pub fn builtin_documents() -> Vec<(&'static str, &'static str)> {
    vec![
        ("smartplug", include_str!("../schemas/smartplug.json")),
        ("heater", include_str!("../schemas/heater.json")),
        ("dimmer", include_str!("../schemas/dimmer.json")),
    ]
}

impl SchemaCatalog {
    /// Catalog preloaded with the built-in schema library.
    pub fn with_builtin() -> Self {
        let mut catalog = Self::new();
        let errors = catalog.register_all(builtin_documents());
        debug_assert!(errors.is_empty(), "builtin schemas must load: {:?}", errors);
        catalog
    }
}
