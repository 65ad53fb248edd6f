//! Datapoint schemas and the raw/semantic value-mapping engine.
//!
//! A [`DpSchema`] declares one raw datapoint: its type, mutability, range,
//! and an ordered list of mapping rules. Rules translate between raw
//! protocol values and semantic values; a rule may be guarded by conditions
//! on a sibling constraint dp, may redirect the whole operation to another
//! dp, and may carry scale/step arithmetic.
//!
//! All operations are pure functions of the schema and an observed
//! [`DpSnapshot`]; the engine performs no I/O. One semantic write can fan
//! out into several raw writes (condition side effects), so the write path
//! returns the complete set pre-merged into a single map.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use taolink_core::{DeviceSession, DpSnapshot, DpType, DpValue};

use crate::error::SchemaError;
use crate::schema::EntityHandle;

// Hand-written documents declare dps ids as bare numbers as often as
// strings; the raw protocol keys them as strings either way.
fn dp_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Number(i64),
        Text(String),
    }
    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Number(n) => n.to_string(),
        IdRepr::Text(s) => s,
    })
}

/// An inclusive raw value range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpRange {
    pub min: f64,
    pub max: f64,
}

/// Declaration of one raw datapoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DpSchema {
    /// Key of this dp in the raw property snapshot
    #[serde(deserialize_with = "dp_id")]
    pub id: String,

    /// Declared raw type (`bitfield` documents map to integer)
    #[serde(rename = "type")]
    pub dp_type: DpType,

    /// Display name, also the key sibling dps use for redirects and
    /// constraints
    pub name: String,

    /// Writes are rejected when set
    #[serde(default)]
    pub readonly: bool,

    /// Hidden from host-facing surfaces; carries no engine semantics
    #[serde(default)]
    pub hidden: bool,

    /// The raw value is carried as a string regardless of `type`
    #[serde(default)]
    pub stringify: bool,

    /// Default raw range, overridable per rule and per condition
    #[serde(default)]
    pub range: Option<DpRange>,

    /// Default scale, used when resolving the effective step granularity
    #[serde(default)]
    pub scale: Option<f64>,

    /// Default step, used when resolving the effective step granularity
    #[serde(default)]
    pub step: Option<f64>,

    /// Ordered translation rules; at most one may omit `dps_val` (the
    /// catch-all default)
    #[serde(default)]
    pub mapping: Vec<MappingRule>,
}

/// One raw-to-semantic translation entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRule {
    /// Raw value this rule translates; absent marks the catch-all default
    #[serde(default)]
    pub dps_val: Option<DpValue>,

    /// Semantic value override
    #[serde(default)]
    pub value: Option<DpValue>,

    /// Divisor on read, multiplier on write
    #[serde(default)]
    pub scale: Option<f64>,

    /// Raw write quantization granularity
    #[serde(default)]
    pub step: Option<f64>,

    /// Name of a sibling dp to delegate the whole operation to
    #[serde(default, rename = "value-redirect")]
    pub redirect: Option<String>,

    /// Raw range while this rule is active
    #[serde(default)]
    pub range: Option<DpRange>,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub icon_priority: Option<i64>,

    /// Name of the sibling dp whose raw value gates `conditions`
    #[serde(default)]
    pub constraint: Option<String>,

    /// Overrides active while the constraint dp holds a condition's
    /// `dps_val`
    #[serde(default)]
    pub conditions: Vec<MappingCondition>,
}

/// A rule fragment active only while the constraint dp holds `dps_val`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingCondition {
    /// Raw value the constraint dp must hold for this condition to apply
    pub dps_val: DpValue,

    /// Semantic value override, taking precedence over the rule's own
    #[serde(default)]
    pub value: Option<DpValue>,

    /// The dp is unusable while this condition is active
    #[serde(default)]
    pub invalid: bool,

    #[serde(default)]
    pub scale: Option<f64>,

    #[serde(default)]
    pub step: Option<f64>,

    #[serde(default, rename = "value-redirect")]
    pub redirect: Option<String>,

    #[serde(default)]
    pub range: Option<DpRange>,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub icon_priority: Option<i64>,

    /// Second-order translation applied to the already-resolved value
    #[serde(default)]
    pub mapping: Vec<MappingRule>,
}

/// Borrowed view of one dp together with its owning entity and device.
///
/// The engine needs the entity context to resolve redirects and
/// constraints against sibling dps, and the device context for log
/// messages; the handle carries both without any owning back-pointers in
/// the schema tree itself.
#[derive(Clone, Copy)]
pub struct DpHandle<'a> {
    entity: EntityHandle<'a>,
    dp: &'a DpSchema,
}

impl<'a> DpHandle<'a> {
    pub(crate) fn new(entity: EntityHandle<'a>, dp: &'a DpSchema) -> Self {
        Self { entity, dp }
    }

    pub fn id(&self) -> &'a str {
        &self.dp.id
    }

    pub fn name(&self) -> &'a str {
        &self.dp.name
    }

    pub fn dp_type(&self) -> DpType {
        self.dp.dp_type
    }

    pub fn readonly(&self) -> bool {
        self.dp.readonly
    }

    pub fn hidden(&self) -> bool {
        self.dp.hidden
    }

    pub fn stringify(&self) -> bool {
        self.dp.stringify
    }

    pub fn entity(&self) -> EntityHandle<'a> {
        self.entity
    }

    pub fn schema(&self) -> &'a DpSchema {
        self.dp
    }

    /// Semantic value of this dp for the given snapshot.
    ///
    /// Returns `None` when the device has not reported the dp (and no
    /// default rule supplies a value) or when the active condition flags
    /// the dp invalid. Range and step are never applied on the read path.
    pub fn get_value(&self, raw: &DpSnapshot) -> Option<DpValue> {
        let value = raw.get(self.id()).cloned();

        // Stringified dps carry their value as a string; recover the
        // declared type when the string form parses, keep the raw value
        // verbatim otherwise.
        let value = match value {
            Some(v) if self.dp.stringify => {
                Some(self.dp.dp_type.parse_str(&v.to_string()).unwrap_or(v))
            }
            v => v,
        };

        let mut result = value.clone();
        if let Some(rule) = self.find_rule_for_raw(value.as_ref()) {
            let mut scale = rule.scale.unwrap_or(1.0);
            let mut redirect = rule.redirect.as_deref();
            if rule.value.is_some() {
                result = rule.value.clone();
            }

            if let Some(cond) = self.active_condition(rule, raw) {
                if cond.invalid {
                    return None;
                }
                if cond.value.is_some() {
                    result = cond.value.clone();
                }
                scale = cond.scale.unwrap_or(scale);
                if cond.redirect.is_some() {
                    redirect = cond.redirect.as_deref();
                }

                // Second-order translation over the already-resolved value.
                for nested in &cond.mapping {
                    if let (Some(nested_raw), Some(current)) = (&nested.dps_val, &result) {
                        if nested_raw.eq_as_string(current) && nested.value.is_some() {
                            result = nested.value.clone();
                        }
                    }
                }
            }

            if let Some(target) = redirect {
                debug!("Redirecting {} to {}", self.name(), target);
                match self.entity.find_dps(target) {
                    Some(target_dps) => return target_dps.get_value(raw),
                    None => warn!("{}: redirect target '{}' not found", self.name(), target),
                }
            }

            if scale != 1.0 {
                if let Some(n) = result.as_ref().and_then(DpValue::as_f64) {
                    result = Some(DpValue::Float(n / scale));
                }
            }

            if result != value {
                debug!(
                    "{}: mapped dp {} value from {:?} to {:?}",
                    self.entity.device().name,
                    self.id(),
                    value,
                    result,
                );
            }
        }

        result
    }

    /// The complete set of raw writes needed to set this dp to `value`,
    /// keyed by dp id. Condition side effects can add entries for sibling
    /// dps; a redirect delegates the whole computation to the target dp.
    pub fn get_values_to_set(
        &self,
        raw: &DpSnapshot,
        value: &DpValue,
    ) -> Result<HashMap<String, DpValue>, SchemaError> {
        let mut updates = HashMap::new();
        let mut result = value.clone();

        if let Some(rule) = self.find_rule_for_semantic(value) {
            let mut scale = rule.scale.unwrap_or(1.0);
            let mut step = rule.step;
            let mut redirect = rule.redirect.as_deref();
            if let Some(raw_val) = &rule.dps_val {
                result = raw_val.clone();
            }

            // A condition whose semantic value matches the request means the
            // write also has to move the constraint dp to the condition's
            // activation value.
            if let Some(cond) = self.active_condition(rule, raw) {
                if cond.value.as_ref() == Some(value) {
                    let constraint = rule.constraint.as_deref().unwrap_or_default();
                    let constraint_dps = self
                        .entity
                        .find_dps(constraint)
                        .ok_or_else(|| SchemaError::UnknownProperty(constraint.to_string()))?;
                    updates.extend(constraint_dps.get_values_to_set(raw, &cond.dps_val)?);
                }
                scale = cond.scale.unwrap_or(scale);
                step = cond.step.or(step);
                if cond.redirect.is_some() {
                    redirect = cond.redirect.as_deref();
                }
            }

            if let Some(target) = redirect {
                debug!("Redirecting {} to {}", self.name(), target);
                let target_dps = self
                    .entity
                    .find_dps(target)
                    .ok_or_else(|| SchemaError::UnknownProperty(target.to_string()))?;
                return target_dps.get_values_to_set(raw, value);
            }

            if scale != 1.0 {
                if let Some(n) = result.as_f64() {
                    debug!("Scaling {} by {}", n, scale);
                    result = DpValue::Float(n * scale);
                }
            }

            if let Some(step) = step {
                if let Some(n) = result.as_f64() {
                    debug!("Stepping {} to {}", n, step);
                    result = DpValue::Float(step * (n / step).round());
                }
            }
        }

        // Validate before any write is produced.
        if let Some(range) = self.range(raw) {
            if let Some(n) = result.as_f64() {
                if n < range.min || n > range.max {
                    return Err(SchemaError::RangeViolation {
                        name: self.name().to_string(),
                        value: value.clone(),
                        min: range.min,
                        max: range.max,
                    });
                }
            }
        }

        let mut result = self.dp.dp_type.coerce(result);
        if self.dp.stringify {
            result = DpValue::String(result.to_string());
        }

        updates.insert(self.id().to_string(), result);
        Ok(updates)
    }

    /// Validate and submit a semantic write through the device session.
    ///
    /// The full write set is computed first and handed over as one batch;
    /// nothing is written when validation fails.
    pub async fn set_value<S: DeviceSession + ?Sized>(
        &self,
        raw: &DpSnapshot,
        session: &S,
        value: DpValue,
    ) -> Result<(), SchemaError> {
        if self.readonly() {
            return Err(SchemaError::ReadOnly {
                name: self.name().to_string(),
            });
        }
        if self.invalid_for(&value, raw) {
            return Err(SchemaError::InvalidState {
                name: self.name().to_string(),
            });
        }
        let updates = self.get_values_to_set(raw, &value)?;
        session.set_properties(updates).await?;
        Ok(())
    }

    /// Whether setting `value` is currently rejected because the rule it
    /// selects is flagged invalid under the active condition.
    pub fn invalid_for(&self, value: &DpValue, raw: &DpSnapshot) -> bool {
        self.find_rule_for_semantic(value)
            .and_then(|rule| self.active_condition(rule, raw))
            .map(|cond| cond.invalid)
            .unwrap_or(false)
    }

    /// Effective raw range for the current device state, if any is
    /// declared: active condition first, then the active rule, then the
    /// dp's own default.
    pub fn range(&self, raw: &DpSnapshot) -> Option<DpRange> {
        if let Some(rule) = self.find_rule_for_raw(raw.get(self.id())) {
            let cond = self.active_condition(rule, raw);
            if let Some(range) = cond.and_then(|c| c.range.as_ref()) {
                debug!("Conditional range returned for {}", self.name());
                return Some(range.clone());
            }
            if let Some(range) = &rule.range {
                debug!("Mapped range returned for {}", self.name());
                return Some(range.clone());
            }
        }
        self.dp.range.clone()
    }

    /// Effective semantic quantization granularity for the current device
    /// state: the resolved raw step divided by the resolved scale.
    pub fn step(&self, raw: &DpSnapshot) -> f64 {
        let mut step = self.dp.step.unwrap_or(1.0);
        let mut scale = self.dp.scale.unwrap_or(1.0);
        if let Some(rule) = self.find_rule_for_raw(raw.get(self.id())) {
            step = rule.step.unwrap_or(step);
            scale = rule.scale.unwrap_or(scale);
            if let Some(cond) = self.active_condition(rule, raw) {
                step = cond.step.unwrap_or(step);
                scale = cond.scale.unwrap_or(scale);
            }
        }
        if step != 1.0 || scale != 1.0 {
            debug!("Step for {} is {} with scale {}", self.name(), step, scale);
        }
        step / scale
    }

    /// The semantic values this dp can take, collected from every rule and
    /// condition override. `None` when the dp has no mapping.
    pub fn values(&self) -> Option<Vec<DpValue>> {
        let mut out: Vec<DpValue> = Vec::new();
        for rule in &self.dp.mapping {
            if let Some(v) = &rule.value {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
            for cond in &rule.conditions {
                if let Some(v) = &cond.value {
                    if !out.contains(v) {
                        out.push(v.clone());
                    }
                }
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    /// Icon contributed by this dp for the current device state, with its
    /// priority (numerically smaller wins).
    pub fn icon_rule(&self, raw: &DpSnapshot) -> (Option<&'a str>, i64) {
        let mut icon: Option<&'a str> = None;
        let mut priority = 100;
        if let Some(rule) = self.find_rule_for_raw(raw.get(self.id())) {
            icon = rule.icon.as_deref().or(icon);
            priority = rule
                .icon_priority
                .unwrap_or(if icon.is_some() { 10 } else { 100 });
            if let Some(cond) = self.active_condition(rule, raw) {
                if cond.icon_priority.unwrap_or(10) < priority {
                    icon = cond.icon.as_deref().or(icon);
                    priority = cond
                        .icon_priority
                        .unwrap_or(if icon.is_some() { 10 } else { 100 });
                }
            }
        }
        (icon, priority)
    }

    /// Find the rule translating the given raw value: first rule whose
    /// `dps_val` matches (compared as strings), else the default rule.
    fn find_rule_for_raw(&self, value: Option<&DpValue>) -> Option<&'a MappingRule> {
        let mut default = None;
        for rule in &self.dp.mapping {
            match &rule.dps_val {
                None => {
                    if default.is_none() {
                        default = Some(rule);
                    }
                }
                Some(raw_val) => {
                    if let Some(v) = value {
                        if raw_val.eq_as_string(v) {
                            return Some(rule);
                        }
                    }
                }
            }
        }
        default
    }

    /// Find the rule selected for a semantic write: first rule whose own
    /// `value` override, or any of its conditions' overrides, matches the
    /// requested value (compared as strings), else the default rule.
    fn find_rule_for_semantic(&self, value: &DpValue) -> Option<&'a MappingRule> {
        let mut default = None;
        for rule in &self.dp.mapping {
            if rule.dps_val.is_none() && default.is_none() {
                default = Some(rule);
            }
            if let Some(v) = &rule.value {
                if v.eq_as_string(value) {
                    return Some(rule);
                }
            }
            for cond in &rule.conditions {
                if let Some(v) = &cond.value {
                    if v.eq_as_string(value) {
                        return Some(rule);
                    }
                }
            }
        }
        default
    }

    /// The first condition, in declared order, whose constraint dp
    /// currently holds the condition's activation value.
    fn active_condition(
        &self,
        rule: &'a MappingRule,
        raw: &DpSnapshot,
    ) -> Option<&'a MappingCondition> {
        let constraint = rule.constraint.as_deref()?;
        if rule.conditions.is_empty() {
            return None;
        }
        let constraint_dps = self.entity.find_dps(constraint)?;
        let constraint_val = raw.get(constraint_dps.id())?;
        rule.conditions
            .iter()
            .find(|cond| cond.dps_val == *constraint_val)
    }
}
