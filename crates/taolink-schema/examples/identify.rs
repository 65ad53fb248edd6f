//! Identify a device from a raw snapshot and drive values through the
//! engine.
//!
//! Run with: `RUST_LOG=debug cargo run --example identify`

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use taolink_schema::{DeviceSession, DpSnapshot, DpValue, SchemaCatalog, SessionError};

/// Stand-in transport that prints the batches it would send.
struct PrintingSession;

#[async_trait]
impl DeviceSession for PrintingSession {
    async fn get_property(&self, _id: &str) -> Option<DpValue> {
        None
    }

    async fn set_properties(
        &self,
        updates: HashMap<String, DpValue>,
    ) -> Result<(), SessionError> {
        println!("-> writing batch: {:?}", updates);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let catalog = SchemaCatalog::with_builtin();

    // A snapshot as a smart plug would report it.
    let snapshot: DpSnapshot = serde_json::from_str(
        r#"{"1": true, "9": 0, "4": 1210, "5": 2342, "6": 2371, "updated_at": 1720000000}"#,
    )?;

    println!("match quality per schema:");
    for (schema, quality) in catalog.score(&snapshot) {
        println!("  {:<16} {:>3}%", schema.source_id, quality);
    }

    let (schema, quality) = catalog
        .best_match(&snapshot)
        .expect("no schema explains this snapshot");
    println!("identified as '{}' ({}%)", schema.name, quality);

    for entity in schema.entities() {
        println!("{} ({}):", entity.name(), entity.kind());
        for dp in entity.dps() {
            println!("  {} = {:?}", dp.name(), dp.get_value(&snapshot));
        }
    }

    // Switch the plug off: validation plus one batched write.
    let switch = schema
        .primary()
        .find_dps("switch")
        .expect("plug schema declares a switch dp");
    switch
        .set_value(&snapshot, &PrintingSession, DpValue::Boolean(false))
        .await?;

    Ok(())
}
