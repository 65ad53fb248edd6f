//! Device and entity schemas.
//!
//! A [`DeviceSchema`] is one catalog entry: a friendly name, one primary
//! entity and any number of secondary entities, each grouping the dps that
//! make up one user-facing device function. Schemas deserialize straight
//! from their source documents and are validated once at registration;
//! after that they are immutable and safe to share across threads.
//!
//! Back-references (entity to device, dp to entity) are carried by the
//! borrowed [`EntityHandle`] / [`DpHandle`] views instead of owning
//! pointers, so the tree itself stays a plain acyclic value.

use serde::{Deserialize, Serialize};
use tracing::debug;

use taolink_core::DpSnapshot;

use crate::dps::{DpHandle, DpRange, DpSchema};
use crate::error::SchemaError;

/// Closed set of device-function categories an entity can declare.
///
/// The set is fixed at compile time; a document declaring any other kind
/// fails to parse and is rejected when it is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    BinarySensor,
    Climate,
    Cover,
    Fan,
    Humidifier,
    Light,
    Lock,
    Number,
    Select,
    Sensor,
    Switch,
    Vacuum,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::BinarySensor => "binary_sensor",
            Self::Climate => "climate",
            Self::Cover => "cover",
            Self::Fan => "fan",
            Self::Humidifier => "humidifier",
            Self::Light => "light",
            Self::Lock => "lock",
            Self::Number => "number",
            Self::Select => "select",
            Self::Sensor => "sensor",
            Self::Switch => "switch",
            Self::Vacuum => "vacuum",
        };
        write!(f, "{}", name)
    }
}

fn default_icon_priority() -> i64 {
    100
}

/// A named grouping of dps representing one user-facing device function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Device-function category
    #[serde(rename = "entity")]
    pub kind: EntityKind,

    /// Display-name override, appended to the device name
    #[serde(default)]
    pub name: Option<String>,

    /// Device-class tag passed through to the host platform
    #[serde(default, rename = "class")]
    pub device_class: Option<String>,

    /// Default icon, overridable by dp icon rules
    #[serde(default)]
    pub icon: Option<String>,

    /// Priority of the default icon (numerically smaller wins)
    #[serde(default = "default_icon_priority")]
    pub icon_priority: i64,

    /// Replacement text when this entity is deprecated
    #[serde(default)]
    pub deprecated: Option<String>,

    /// Declared datapoints, in document order
    #[serde(default)]
    pub dps: Vec<DpSchema>,
}

/// One catalog entry: a supported device's declarative description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSchema {
    /// Friendly device name
    pub name: String,

    /// Alias pre-catalog configurations used for this device; defaults to
    /// the source id
    #[serde(default)]
    pub legacy_type: Option<String>,

    /// The device's main function
    pub primary_entity: EntitySchema,

    /// Additional functions, in document order
    #[serde(default)]
    pub secondary_entities: Vec<EntitySchema>,

    /// Catalog key, assigned at registration
    #[serde(skip)]
    pub source_id: String,
}

impl DeviceSchema {
    /// The alias used by legacy configurations for one-time migration.
    pub fn legacy_alias(&self) -> &str {
        self.legacy_type.as_deref().unwrap_or(&self.source_id)
    }

    /// Handle on the primary entity.
    pub fn primary(&self) -> EntityHandle<'_> {
        EntityHandle {
            device: self,
            entity: &self.primary_entity,
        }
    }

    /// Handles on the secondary entities, in declaration order.
    pub fn secondary(&self) -> impl Iterator<Item = EntityHandle<'_>> {
        self.secondary_entities
            .iter()
            .map(move |entity| EntityHandle {
                device: self,
                entity,
            })
    }

    /// All entities: primary first, then secondaries in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = EntityHandle<'_>> {
        std::iter::once(self.primary()).chain(self.secondary())
    }

    /// Whether every declared dp is present in `raw` with a
    /// type-compatible value. Short-circuits on the first failure.
    pub fn matches(&self, raw: &DpSnapshot) -> bool {
        for entity in self.entities() {
            for dp in entity.dps() {
                let compatible = raw
                    .get(dp.id())
                    .map(|value| dp.dp_type().matches_value(value))
                    .unwrap_or(false);
                if !compatible {
                    return false;
                }
            }
        }
        debug!("Matched schema for {}", self.name);
        true
    }

    /// How well this schema explains the snapshot, as a 0-100 percentage.
    ///
    /// The literal `updated_at` key never counts. A dp shared between two
    /// entities is counted once without penalty, but any dp that is
    /// missing or type-incompatible zeroes the whole schema; partial
    /// credit only accrues over unclaimed snapshot keys.
    pub fn match_quality(&self, raw: &DpSnapshot) -> u8 {
        let mut keys: Vec<&str> = raw.keys().filter(|key| *key != "updated_at").collect();
        let total = keys.len();
        if total == 0 {
            return 0;
        }
        let mut matched: Vec<&str> = Vec::new();
        for entity in self.entities() {
            if !entity_match_analyse(entity, &mut keys, &mut matched, raw) {
                return 0;
            }
        }
        (((total - keys.len()) * 100) as f64 / total as f64).round() as u8
    }

    /// Validate the schema tree. Called once at registration; a schema
    /// that passes can be resolved without runtime reference failures and
    /// its redirect/constraint recursion is finite.
    pub(crate) fn validate(&self) -> Result<(), SchemaError> {
        for entity in std::iter::once(&self.primary_entity).chain(self.secondary_entities.iter()) {
            self.validate_entity(entity)?;
        }
        Ok(())
    }

    fn validate_entity(&self, entity: &EntitySchema) -> Result<(), SchemaError> {
        for dp in &entity.dps {
            let defaults = dp.mapping.iter().filter(|r| r.dps_val.is_none()).count();
            if defaults > 1 {
                return Err(SchemaError::Validation {
                    schema: self.source_id.clone(),
                    detail: format!(
                        "dp '{}' declares {} default mapping rules, at most one is allowed",
                        dp.name, defaults
                    ),
                });
            }

            let check_range = |range: &Option<DpRange>| {
                if let Some(range) = range {
                    if range.min > range.max {
                        return Err(SchemaError::Validation {
                            schema: self.source_id.clone(),
                            detail: format!(
                                "dp '{}': min ({}) cannot be greater than max ({})",
                                dp.name, range.min, range.max
                            ),
                        });
                    }
                }
                Ok(())
            };
            check_range(&dp.range)?;
            for rule in &dp.mapping {
                check_range(&rule.range)?;
                for cond in &rule.conditions {
                    check_range(&cond.range)?;
                }
            }

            for rule in &dp.mapping {
                let targets = rule
                    .constraint
                    .iter()
                    .chain(rule.redirect.iter())
                    .chain(rule.conditions.iter().filter_map(|c| c.redirect.as_ref()));
                for target in targets {
                    if !entity.dps.iter().any(|other| &other.name == target) {
                        return Err(SchemaError::UnknownReference {
                            schema: self.source_id.clone(),
                            dp: dp.name.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }

        if let Some(dp_name) = find_reference_cycle(entity) {
            return Err(SchemaError::CyclicReference {
                schema: self.source_id.clone(),
                dp: dp_name,
            });
        }
        Ok(())
    }
}

fn entity_match_analyse<'a>(
    entity: EntityHandle<'a>,
    keys: &mut Vec<&'a str>,
    matched: &mut Vec<&'a str>,
    raw: &DpSnapshot,
) -> bool {
    for dp in entity.dps() {
        let id = dp.id();
        let known = keys.contains(&id) || matched.contains(&id);
        let compatible = raw
            .get(id)
            .map(|value| dp.dp_type().matches_value(value))
            .unwrap_or(false);
        if !known || !compatible {
            return false;
        }
        if let Some(pos) = keys.iter().position(|key| *key == id) {
            matched.push(id);
            keys.remove(pos);
        }
    }
    true
}

/// Detect loops in the redirect/constraint reference graph of one entity.
///
/// Constraint edges are included because the write path recurses through
/// them for condition side effects, not only through redirects.
fn find_reference_cycle(entity: &EntitySchema) -> Option<String> {
    use std::collections::HashMap;

    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, dp) in entity.dps.iter().enumerate() {
        index.entry(dp.name.as_str()).or_insert(i);
    }

    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); entity.dps.len()];
    for (i, dp) in entity.dps.iter().enumerate() {
        for rule in &dp.mapping {
            let targets = rule
                .constraint
                .iter()
                .chain(rule.redirect.iter())
                .chain(rule.conditions.iter().filter_map(|c| c.redirect.as_ref()));
            for target in targets {
                if let Some(&j) = index.get(target.as_str()) {
                    edges[i].push(j);
                }
            }
        }
    }

    fn visit(node: usize, edges: &[Vec<usize>], state: &mut [u8]) -> Option<usize> {
        state[node] = 1;
        for &next in &edges[node] {
            match state[next] {
                1 => return Some(next),
                0 => {
                    if let Some(hit) = visit(next, edges, state) {
                        return Some(hit);
                    }
                }
                _ => {}
            }
        }
        state[node] = 2;
        None
    }

    let mut state = vec![0u8; entity.dps.len()];
    for node in 0..entity.dps.len() {
        if state[node] == 0 {
            if let Some(hit) = visit(node, &edges, &mut state) {
                return Some(entity.dps[hit].name.clone());
            }
        }
    }
    None
}

/// Borrowed view of one entity together with its owning device.
#[derive(Clone, Copy)]
pub struct EntityHandle<'a> {
    device: &'a DeviceSchema,
    entity: &'a EntitySchema,
}

impl<'a> EntityHandle<'a> {
    pub fn device(&self) -> &'a DeviceSchema {
        self.device
    }

    pub fn schema(&self) -> &'a EntitySchema {
        self.entity
    }

    pub fn kind(&self) -> EntityKind {
        self.entity.kind
    }

    /// Display name: the device name, extended with this entity's own
    /// name when one is declared.
    pub fn name(&self) -> String {
        match &self.entity.name {
            Some(own_name) => format!("{} {}", self.device.name, own_name),
            None => self.device.name.clone(),
        }
    }

    pub fn device_class(&self) -> Option<&'a str> {
        self.entity.device_class.as_deref()
    }

    pub fn deprecated(&self) -> bool {
        self.entity.deprecated.is_some()
    }

    /// Human-readable deprecation warning for this entity.
    pub fn deprecation_message(&self) -> String {
        let replacement = self
            .entity
            .deprecated
            .as_deref()
            .unwrap_or("nothing, this warning has been raised in error");
        format!(
            "The use of {} for {} is deprecated and should be replaced by {}.",
            self.entity.kind, self.device.name, replacement
        )
    }

    /// Declared dps, in document order.
    pub fn dps(&self) -> impl Iterator<Item = DpHandle<'a>> + 'a {
        let handle = *self;
        self.entity.dps.iter().map(move |dp| DpHandle::new(handle, dp))
    }

    /// First dp with the given display name.
    pub fn find_dps(&self, name: &str) -> Option<DpHandle<'a>> {
        self.dps().find(|dp| dp.name() == name)
    }

    /// Icon for the current device state: the entity default, overridden
    /// by any dp icon rule with a strictly lower priority value. Ties keep
    /// the earlier winner.
    pub fn icon(&self, raw: &DpSnapshot) -> Option<&'a str> {
        let mut icon = self.entity.icon.as_deref();
        let mut priority = self.entity.icon_priority;
        for dp in self.dps() {
            let (rule_icon, rule_priority) = dp.icon_rule(raw);
            if rule_priority < priority {
                icon = rule_icon;
                priority = rule_priority;
            }
        }
        icon
    }
}
