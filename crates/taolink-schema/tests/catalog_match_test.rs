//! Identification tests over the built-in schema catalog.

use taolink_schema::{DpSnapshot, SchemaCatalog};

fn snapshot(json: &str) -> DpSnapshot {
    serde_json::from_str(json).unwrap()
}

#[test]
fn test_smartplug_snapshot_matches_exactly() {
    let catalog = SchemaCatalog::with_builtin();
    let raw = snapshot(r#"{"1": true, "9": 0, "4": 1210, "5": 2342, "6": 2371}"#);

    let matches: Vec<&str> = catalog
        .find_exact_matches(&raw)
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(matches, vec!["Smart plug"]);

    let (best, quality) = catalog.best_match(&raw).unwrap();
    assert_eq!(best.name, "Smart plug");
    assert_eq!(quality, 100);
}

#[test]
fn test_heater_snapshot_identified_with_updated_at_ignored() {
    let catalog = SchemaCatalog::with_builtin();
    let raw = snapshot(
        r#"{"1": true, "2": 22, "3": 19, "4": "c", "5": 18, "104": false,
            "updated_at": 1720000000}"#,
    );

    let (best, quality) = catalog.best_match(&raw).unwrap();
    assert_eq!(best.name, "Panel heater");
    assert_eq!(quality, 100);
}

#[test]
fn test_unexplained_keys_dilute_quality() {
    let catalog = SchemaCatalog::with_builtin();
    // The dimmer explains dps 1 and 2, but not the two extra keys.
    let raw = snapshot(r#"{"1": true, "2": "500", "101": 3, "102": 4}"#);

    let dimmer = catalog.get("dimmer").unwrap();
    assert_eq!(dimmer.match_quality(&raw), 50);
}

#[test]
fn test_missing_dp_invalidates_schema_entirely() {
    let catalog = SchemaCatalog::with_builtin();
    // dp 2 is missing: no partial credit even though dp 1 matched.
    let raw = snapshot(r#"{"1": true, "3": 9}"#);

    let dimmer = catalog.get("dimmer").unwrap();
    assert_eq!(dimmer.match_quality(&raw), 0);
    assert!(!dimmer.matches(&raw));
    assert!(catalog.best_match(&raw).is_none());
}

#[test]
fn test_enumerate_is_restartable() {
    let catalog = SchemaCatalog::with_builtin();
    let first: Vec<&str> = catalog.enumerate().map(|s| s.source_id.as_str()).collect();
    let second: Vec<&str> = catalog.enumerate().map(|s| s.source_id.as_str()).collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), catalog.len());
}

#[test]
fn test_legacy_alias_lookup() {
    let catalog = SchemaCatalog::with_builtin();
    assert_eq!(
        catalog.find_by_legacy_alias("kogan_switch").unwrap().name,
        "Smart plug"
    );
    assert!(catalog.find_by_legacy_alias("unknown_type").is_none());
}
