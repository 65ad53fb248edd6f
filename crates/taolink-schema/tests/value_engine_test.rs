//! Read-path and resolution tests over the built-in schemas.

use taolink_schema::{DpRange, DpSnapshot, DpValue, SchemaCatalog};

fn snapshot(json: &str) -> DpSnapshot {
    serde_json::from_str(json).unwrap()
}

#[test]
fn test_plug_power_readings_scale_down() {
    let catalog = SchemaCatalog::with_builtin();
    let plug = catalog.get("smartplug").unwrap();
    let raw = snapshot(r#"{"1": true, "9": 0, "4": 1210, "5": 2342, "6": 2371}"#);

    let sensor = plug.secondary().next().unwrap();
    assert_eq!(sensor.name(), "Smart plug power");
    assert_eq!(
        sensor.find_dps("current").unwrap().get_value(&raw),
        Some(DpValue::Float(1.21))
    );
    assert_eq!(
        sensor.find_dps("power").unwrap().get_value(&raw),
        Some(DpValue::Float(234.2))
    );
    assert_eq!(
        sensor.find_dps("voltage").unwrap().get_value(&raw),
        Some(DpValue::Float(237.1))
    );
}

#[test]
fn test_heater_mode_mapping_and_icons() {
    let catalog = SchemaCatalog::with_builtin();
    let heater = catalog.get("heater").unwrap();
    let climate = heater.primary();

    let raw = snapshot(r#"{"1": true, "2": 22, "3": 19, "4": "c", "5": 18, "104": false}"#);
    let mode = climate.find_dps("hvac_mode").unwrap();
    assert_eq!(mode.get_value(&raw), Some(DpValue::from("heat")));
    assert_eq!(climate.icon(&raw), Some("mdi:radiator"));

    let raw = snapshot(r#"{"1": false, "2": 22, "3": 19, "4": "af", "5": 18, "104": false}"#);
    assert_eq!(mode.get_value(&raw), Some(DpValue::from("off")));
    // The away-preset icon (priority 7) loses to the hvac rule (priority 4).
    assert_eq!(climate.icon(&raw), Some("mdi:radiator-disabled"));
}

#[test]
fn test_heater_eco_preset_redirects_temperature() {
    let catalog = SchemaCatalog::with_builtin();
    let heater = catalog.get("heater").unwrap();
    let climate = heater.primary();
    let temperature = climate.find_dps("temperature").unwrap();

    // Comfort preset: the dp reads its own raw value.
    let raw = snapshot(r#"{"1": true, "2": 22, "3": 19, "4": "c", "5": 18, "104": false}"#);
    assert_eq!(temperature.get_value(&raw), Some(DpValue::Integer(22)));
    assert_eq!(
        temperature.range(&raw),
        Some(DpRange { min: 5.0, max: 35.0 })
    );

    // Eco preset: reads delegate to the eco setpoint dp.
    let raw = snapshot(r#"{"1": true, "2": 22, "3": 19, "4": "eco", "5": 18, "104": false}"#);
    assert_eq!(temperature.get_value(&raw), Some(DpValue::Integer(18)));

    // Anti-freeze preset: the setpoint is unusable.
    let raw = snapshot(r#"{"1": true, "2": 22, "3": 19, "4": "af", "5": 18, "104": false}"#);
    assert_eq!(temperature.get_value(&raw), None);
    assert!(temperature.invalid_for(&DpValue::Integer(20), &raw));
}

#[test]
fn test_heater_eco_write_goes_to_eco_setpoint() {
    let catalog = SchemaCatalog::with_builtin();
    let heater = catalog.get("heater").unwrap();
    let temperature = heater.primary().find_dps("temperature").unwrap();

    let raw = snapshot(r#"{"1": true, "2": 22, "3": 19, "4": "eco", "5": 18, "104": false}"#);
    let writes = temperature
        .get_values_to_set(&raw, &DpValue::Integer(20))
        .unwrap();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes.get("5"), Some(&DpValue::Integer(20)));

    // The eco setpoint range applies to the delegated write.
    let err = temperature
        .get_values_to_set(&raw, &DpValue::Integer(30))
        .unwrap_err();
    assert!(matches!(
        err,
        taolink_schema::SchemaError::RangeViolation { .. }
    ));
}

#[test]
fn test_dimmer_brightness_round_trip() {
    let catalog = SchemaCatalog::with_builtin();
    let dimmer = catalog.get("dimmer").unwrap();
    let brightness = dimmer.primary().find_dps("brightness").unwrap();

    let raw = snapshot(r#"{"1": true, "2": "500"}"#);
    assert_eq!(brightness.get_value(&raw), Some(DpValue::Float(50.0)));
    assert_eq!(brightness.step(&raw), 1.0);

    let writes = brightness
        .get_values_to_set(&raw, &DpValue::Float(72.0))
        .unwrap();
    assert_eq!(writes.get("2"), Some(&DpValue::from("720")));
}

#[test]
fn test_possible_values_enumeration() {
    let catalog = SchemaCatalog::with_builtin();
    let heater = catalog.get("heater").unwrap();
    let preset = heater.primary().find_dps("preset_mode").unwrap();

    assert_eq!(
        preset.values(),
        Some(vec![
            DpValue::from("comfort"),
            DpValue::from("eco"),
            DpValue::from("away"),
        ])
    );

    let current = heater.primary().find_dps("current_temperature").unwrap();
    assert_eq!(current.values(), None);
}
