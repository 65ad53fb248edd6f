//! Schema catalog: registration, matching and scoring across all loaded
//! device schemas.
//!
//! The catalog is built once, single-threaded, at load time; afterwards it
//! is immutable and every lookup is a pure function of the catalog and an
//! observed snapshot, so shared references can be used from any number of
//! threads without synchronization.

use tracing::{debug, warn};

use taolink_core::DpSnapshot;

use crate::error::SchemaError;
use crate::schema::DeviceSchema;

/// All loaded device schemas, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: Vec<DeviceSchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one parsed schema under the given catalog key.
    ///
    /// The schema is validated before it is stored; registering a second
    /// schema under the same key replaces the first in place.
    pub fn register(
        &mut self,
        source_id: impl Into<String>,
        mut schema: DeviceSchema,
    ) -> Result<(), SchemaError> {
        schema.source_id = source_id.into();
        schema.validate()?;
        debug!("Loaded device schema {}", schema.source_id);
        if let Some(existing) = self
            .schemas
            .iter_mut()
            .find(|s| s.source_id == schema.source_id)
        {
            *existing = schema;
        } else {
            self.schemas.push(schema);
        }
        Ok(())
    }

    /// Parse and register one JSON schema document.
    pub fn register_json(
        &mut self,
        source_id: impl Into<String>,
        json: &str,
    ) -> Result<(), SchemaError> {
        let source_id = source_id.into();
        let schema: DeviceSchema = serde_json::from_str(json).map_err(|source| {
            SchemaError::Document {
                source_id: source_id.clone(),
                source,
            }
        })?;
        self.register(source_id, schema)
    }

    /// Register a batch of JSON documents.
    ///
    /// A malformed document is fatal for that one schema only: it is
    /// logged, reported in the returned list and skipped, and the rest of
    /// the catalog loads.
    pub fn register_all<'a, I>(&mut self, documents: I) -> Vec<SchemaError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut errors = Vec::new();
        for (source_id, json) in documents {
            if let Err(err) = self.register_json(source_id, json) {
                warn!("Skipping schema '{}': {}", source_id, err);
                errors.push(err);
            }
        }
        errors
    }

    /// All loaded schemas, in catalog order.
    pub fn enumerate(&self) -> impl Iterator<Item = &DeviceSchema> {
        self.schemas.iter()
    }

    /// Schema registered under the given catalog key.
    pub fn get(&self, source_id: &str) -> Option<&DeviceSchema> {
        self.schemas.iter().find(|s| s.source_id == source_id)
    }

    /// Schemas whose declared dps are all present in `raw` with
    /// type-compatible values.
    pub fn find_exact_matches<'s>(
        &'s self,
        raw: &'s DpSnapshot,
    ) -> impl Iterator<Item = &'s DeviceSchema> + 's {
        self.schemas.iter().filter(move |schema| schema.matches(raw))
    }

    /// Every schema paired with its match quality for the snapshot.
    pub fn score<'s>(
        &'s self,
        raw: &'s DpSnapshot,
    ) -> impl Iterator<Item = (&'s DeviceSchema, u8)> + 's {
        self.schemas
            .iter()
            .map(move |schema| (schema, schema.match_quality(raw)))
    }

    /// Highest-scoring schema for the snapshot, with its score.
    ///
    /// Schemas scoring 0 are ruled out entirely; ties keep catalog order.
    pub fn best_match<'a>(&'a self, raw: &'a DpSnapshot) -> Option<(&'a DeviceSchema, u8)> {
        let mut best: Option<(&DeviceSchema, u8)> = None;
        for (schema, quality) in self.score(raw) {
            if quality > 0 && best.map_or(true, |(_, q)| quality > q) {
                best = Some((schema, quality));
            }
        }
        best
    }

    /// First schema whose legacy alias equals `alias`.
    ///
    /// Linear scan over the whole catalog; acceptable since this is only
    /// used for one-time migration lookups.
    pub fn find_by_legacy_alias(&self, alias: &str) -> Option<&DeviceSchema> {
        self.schemas.iter().find(|s| s.legacy_alias() == alias)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn switch_doc(name: &str, dp_id: u32) -> String {
        json!({
            "name": name,
            "primary_entity": {
                "entity": "switch",
                "dps": [{"id": dp_id, "type": "boolean", "name": "switch"}]
            }
        })
        .to_string()
    }

    #[test]
    fn test_register_and_enumerate_in_order() {
        let mut catalog = SchemaCatalog::new();
        catalog.register_json("plug_a", &switch_doc("Plug A", 1)).unwrap();
        catalog.register_json("plug_b", &switch_doc("Plug B", 20)).unwrap();

        let names: Vec<&str> = catalog.enumerate().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Plug A", "Plug B"]);
        assert_eq!(catalog.get("plug_b").unwrap().name, "Plug B");
        assert!(catalog.get("plug_c").is_none());
    }

    #[test]
    fn test_reregistering_replaces_in_place() {
        let mut catalog = SchemaCatalog::new();
        catalog.register_json("plug", &switch_doc("Plug v1", 1)).unwrap();
        catalog.register_json("plug", &switch_doc("Plug v2", 1)).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("plug").unwrap().name, "Plug v2");
    }

    #[test]
    fn test_register_all_skips_bad_documents() {
        let good = switch_doc("Plug", 1);
        let unknown_kind = json!({
            "name": "Weird",
            "primary_entity": {"entity": "teleporter", "dps": []}
        })
        .to_string();

        let mut catalog = SchemaCatalog::new();
        let errors = catalog.register_all(vec![
            ("plug", good.as_str()),
            ("weird", unknown_kind.as_str()),
            ("broken", "{not json"),
        ]);

        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, SchemaError::Document { .. })));
        // The bad documents are fatal for themselves only.
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("plug").unwrap().name, "Plug");
    }

    #[test]
    fn test_find_exact_matches_and_score() {
        let mut catalog = SchemaCatalog::new();
        catalog.register_json("plug_a", &switch_doc("Plug A", 1)).unwrap();
        catalog.register_json("plug_b", &switch_doc("Plug B", 20)).unwrap();

        let raw = serde_json::from_value(json!({"1": true})).unwrap();
        let matches: Vec<&str> = catalog
            .find_exact_matches(&raw)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(matches, vec!["Plug A"]);

        let scores: Vec<(&str, u8)> = catalog
            .score(&raw)
            .map(|(s, q)| (s.name.as_str(), q))
            .collect();
        assert_eq!(scores, vec![("Plug A", 100), ("Plug B", 0)]);

        let (best, quality) = catalog.best_match(&raw).unwrap();
        assert_eq!(best.name, "Plug A");
        assert_eq!(quality, 100);
    }

    #[test]
    fn test_best_match_ties_keep_catalog_order() {
        let mut catalog = SchemaCatalog::new();
        catalog.register_json("plug_a", &switch_doc("Plug A", 1)).unwrap();
        catalog.register_json("plug_a2", &switch_doc("Plug A2", 1)).unwrap();

        let raw = serde_json::from_value(json!({"1": true})).unwrap();
        let (best, _) = catalog.best_match(&raw).unwrap();
        assert_eq!(best.name, "Plug A");
    }

    #[test]
    fn test_best_match_none_when_everything_scores_zero() {
        let mut catalog = SchemaCatalog::new();
        catalog.register_json("plug", &switch_doc("Plug", 1)).unwrap();
        let raw = serde_json::from_value(json!({"9": true})).unwrap();
        assert!(catalog.best_match(&raw).is_none());
    }

    #[test]
    fn test_find_by_legacy_alias() {
        let aliased = json!({
            "name": "Old plug",
            "legacy_type": "classic_plug",
            "primary_entity": {
                "entity": "switch",
                "dps": [{"id": 1, "type": "boolean", "name": "switch"}]
            }
        })
        .to_string();

        let mut catalog = SchemaCatalog::new();
        catalog.register_json("oldplug", &aliased).unwrap();
        catalog.register_json("plug", &switch_doc("Plug", 1)).unwrap();

        assert_eq!(
            catalog.find_by_legacy_alias("classic_plug").unwrap().name,
            "Old plug"
        );
        // Without a declared alias the source id stands in.
        assert_eq!(catalog.find_by_legacy_alias("plug").unwrap().name, "Plug");
        assert!(catalog.find_by_legacy_alias("missing").is_none());
    }
}
