//! Raw datapoint value model.
//!
//! Tuya-style devices expose their state as a flat set of raw properties
//! ("dps"), each keyed by a small identifier and carrying an untyped scalar.
//! `DpValue` is the common currency for both the raw protocol side and the
//! semantic side of the mapping engine; `DpType` is the declared type of a
//! datapoint in a device schema.

use serde::{Deserialize, Serialize};

/// A scalar datapoint value, raw or semantic.
///
/// Raw snapshots arrive as bare JSON scalars, so the enum deserializes
/// untagged. Variant order matters: booleans and integers must be tried
/// before floats so that `true` and `5` keep their native types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DpValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl DpValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this value is numeric (integer or float).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// Truthiness, used when coercing a write to a boolean datapoint:
    /// zero and the empty string are false, everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Boolean(v) => *v,
            Self::Integer(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            Self::String(v) => !v.is_empty(),
        }
    }

    /// Compare two values by their canonical string form.
    ///
    /// Mapping rules are written against raw values of uncertain type
    /// (`1`, `"1"` and `1.0` all appear in the wild for the same dp), so
    /// rule lookup compares string forms rather than native values.
    pub fn eq_as_string(&self, other: &DpValue) -> bool {
        self.to_string() == other.to_string()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }
}

// Raw integer and float datapoints are interchangeable on the wire, so
// equality is numeric across the two. Booleans stay distinct from integers.
impl PartialEq for DpValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Integer(a), Self::Float(b)) | (Self::Float(b), Self::Integer(a)) => {
                *a as f64 == *b
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for DpValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for DpValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for DpValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for DpValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for DpValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for DpValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// Declared type of a datapoint in a device schema.
///
/// The document keyword `bitfield` declares a raw bitmask and maps to
/// `Integer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DpType {
    Boolean,
    #[serde(alias = "bitfield")]
    Integer,
    Float,
    String,
}

impl DpType {
    /// Whether an observed raw value is compatible with this declared type.
    ///
    /// Boolean and Integer are disjoint: a boolean never satisfies an
    /// integer declaration even though the wire encoding could coerce.
    /// A string satisfies a non-boolean declaration when it parses as that
    /// type (`"42"` is an acceptable integer, `"abc"` is not); booleans are
    /// excluded because every string would pass a truthiness parse.
    pub fn matches_value(&self, value: &DpValue) -> bool {
        match (self, value) {
            (Self::Boolean, DpValue::Boolean(_)) => true,
            (Self::Integer, DpValue::Integer(_)) => true,
            (Self::Float, DpValue::Float(_)) => true,
            (Self::String, DpValue::String(_)) => true,
            (Self::Integer, DpValue::String(s)) => s.trim().parse::<i64>().is_ok(),
            (Self::Float, DpValue::String(s)) => s.trim().parse::<f64>().is_ok(),
            _ => false,
        }
    }

    /// Parse a string into this type, for datapoints whose raw value is
    /// carried in string form. Returns `None` when the string does not
    /// parse.
    pub fn parse_str(&self, s: &str) -> Option<DpValue> {
        match self {
            Self::Boolean => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Some(DpValue::Boolean(true)),
                "false" | "0" | "off" | "no" => Some(DpValue::Boolean(false)),
                _ => None,
            },
            Self::Integer => s.trim().parse::<i64>().ok().map(DpValue::Integer),
            Self::Float => s.trim().parse::<f64>().ok().map(DpValue::Float),
            Self::String => Some(DpValue::String(s.to_string())),
        }
    }

    /// Coerce a computed value into this type for a raw write.
    ///
    /// Integers round to the nearest whole number, booleans coerce by
    /// truthiness, floats cast numerically, strings stringify. A value
    /// that cannot be coerced numerically is passed through unchanged.
    pub fn coerce(&self, value: DpValue) -> DpValue {
        match self {
            Self::Integer => match &value {
                DpValue::Integer(_) => value,
                DpValue::Float(v) => DpValue::Integer(v.round() as i64),
                DpValue::Boolean(v) => DpValue::Integer(*v as i64),
                DpValue::String(s) => match s.trim().parse::<f64>() {
                    Ok(v) => DpValue::Integer(v.round() as i64),
                    Err(_) => value,
                },
            },
            Self::Boolean => DpValue::Boolean(value.is_truthy()),
            Self::Float => match &value {
                DpValue::Float(_) => value,
                DpValue::Integer(v) => DpValue::Float(*v as f64),
                DpValue::Boolean(v) => DpValue::Float(*v as i64 as f64),
                DpValue::String(s) => match s.trim().parse::<f64>() {
                    Ok(v) => DpValue::Float(v),
                    Err(_) => value,
                },
            },
            Self::String => DpValue::String(value.to_string()),
        }
    }
}

impl std::fmt::Display for DpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
        }
    }
}
