//! Parameter value types
//!
//! A closed set of value types (string, float, integer, boolean) with clamped
//! numeric ranges, plus the factory that builds a default value from a type tag.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Value types an argument or registry entry can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Float,
    Int,
    Bool,
}

impl ValueType {
    /// All value types, in factory registration order
    pub fn all() -> &'static [ValueType] {
        &[ValueType::String, ValueType::Float, ValueType::Int, ValueType::Bool]
    }

    /// Parse a declarative type descriptor ("int", "Integer", "bool", ...)
    pub fn from_descriptor(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "string" | "str" | "s" => Some(ValueType::String),
            "float" | "f" => Some(ValueType::Float),
            "int" | "integer" | "i" => Some(ValueType::Int),
            "bool" | "boolean" | "b" => Some(ValueType::Bool),
            _ => None,
        }
    }

    /// Tag written into serialized records and understood by [`ValueFactory`]
    pub fn factory_tag(&self) -> &'static str {
        match self {
            ValueType::String => "String",
            ValueType::Float => "Float",
            ValueType::Int => "Integer",
            ValueType::Bool => "Boolean",
        }
    }

    /// Default value used when an argument is created from a type descriptor
    pub fn default_value(&self) -> ParameterValue {
        match self {
            ValueType::String => ParameterValue::String("example".to_string()),
            ValueType::Float => ParameterValue::Float(Ranged::new(0.0, 0.0, 1.0)),
            ValueType::Int => ParameterValue::Int(Ranged::new(0, -1000, 1000)),
            ValueType::Bool => ParameterValue::Bool(false),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Float => write!(f, "float"),
            ValueType::Int => write!(f, "int"),
            ValueType::Bool => write!(f, "bool"),
        }
    }
}

/// A numeric value clamped to `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranged<T> {
    value: T,
    min: T,
    max: T,
}

impl<T: PartialOrd + Copy> Ranged<T> {
    /// Create a ranged value; `value` is clamped into the range.
    /// Swapped bounds are reordered.
    pub fn new(value: T, min: T, max: T) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let mut ranged = Self { value: min, min, max };
        ranged.set(value);
        ranged
    }

    pub fn get(&self) -> T {
        self.value
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    /// Set the value, clamping into range. Returns true if the stored value changed.
    ///
    /// Values that do not compare (NaN) are ignored.
    pub fn set(&mut self, value: T) -> bool {
        if value.partial_cmp(&value).is_none() {
            return false;
        }
        let clamped = if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        };
        let changed = clamped != self.value;
        self.value = clamped;
        changed
    }
}

/// Tagged value of a parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    String(String),
    Float(Ranged<f64>),
    Int(Ranged<i64>),
    Bool(bool),
}

impl ParameterValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            ParameterValue::String(_) => ValueType::String,
            ParameterValue::Float(_) => ValueType::Float,
            ParameterValue::Int(_) => ValueType::Int,
            ParameterValue::Bool(_) => ValueType::Bool,
        }
    }

    /// Current value as JSON
    pub fn to_json(&self) -> Value {
        match self {
            ParameterValue::String(s) => json!(s),
            ParameterValue::Float(r) => json!(r.get()),
            ParameterValue::Int(r) => json!(r.get()),
            ParameterValue::Bool(b) => json!(b),
        }
    }

    /// Assign from a JSON value, converting where it makes sense.
    ///
    /// Numbers are clamped by the range. Returns false when the JSON value
    /// cannot be converted to this type (the stored value is left untouched).
    pub fn set_json(&mut self, value: &Value) -> bool {
        match self {
            ParameterValue::String(s) => match value {
                Value::String(v) => *s = v.clone(),
                Value::Number(n) => *s = n.to_string(),
                Value::Bool(b) => *s = b.to_string(),
                _ => return false,
            },
            ParameterValue::Float(r) => match value.as_f64() {
                Some(v) => {
                    r.set(v);
                }
                None => return false,
            },
            ParameterValue::Int(r) => match value.as_i64().or_else(|| value.as_f64().map(|f| f.round() as i64)) {
                Some(v) => {
                    r.set(v);
                }
                None => return false,
            },
            ParameterValue::Bool(b) => match value {
                Value::Bool(v) => *b = *v,
                Value::Number(n) => *b = n.as_f64().map(|f| f != 0.0).unwrap_or(false),
                _ => return false,
            },
        }
        true
    }

    /// Assign from a normalized mapping input
    ///
    /// Floats and integers are clamped, booleans are true at 0.5 and above,
    /// strings receive the formatted number. NaN is ignored and returns false.
    pub fn set_from_f64(&mut self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        match self {
            ParameterValue::String(s) => *s = value.to_string(),
            ParameterValue::Float(r) => {
                r.set(value);
            }
            ParameterValue::Int(r) => {
                r.set(value.round() as i64);
            }
            ParameterValue::Bool(b) => *b = value >= 0.5,
        }
        true
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(r) => Some(r.get()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(r) => Some(r.get()),
            ParameterValue::Int(r) => Some(r.get() as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Write `minValue`/`maxValue` for ranged types
    fn write_range(&self, record: &mut Map<String, Value>) {
        match self {
            ParameterValue::Float(r) => {
                record.insert("minValue".into(), json!(r.min()));
                record.insert("maxValue".into(), json!(r.max()));
            }
            ParameterValue::Int(r) => {
                record.insert("minValue".into(), json!(r.min()));
                record.insert("maxValue".into(), json!(r.max()));
            }
            _ => {}
        }
    }

    /// Restore `minValue`/`maxValue` if the record carries them
    fn read_range(&mut self, record: &Value) {
        match self {
            ParameterValue::Float(r) => {
                let min = record.get("minValue").and_then(Value::as_f64).unwrap_or(r.min());
                let max = record.get("maxValue").and_then(Value::as_f64).unwrap_or(r.max());
                *r = Ranged::new(r.get(), min, max);
            }
            ParameterValue::Int(r) => {
                let min = record.get("minValue").and_then(Value::as_i64).unwrap_or(r.min());
                let max = record.get("maxValue").and_then(Value::as_i64).unwrap_or(r.max());
                *r = Ranged::new(r.get(), min, max);
            }
            _ => {}
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::String(s) => write!(f, "{}", s),
            ParameterValue::Float(r) => write!(f, "{}", r.get()),
            ParameterValue::Int(r) => write!(f, "{}", r.get()),
            ParameterValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// A named value with its display metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Display name (also the identity inside its container)
    pub name: String,
    /// Human readable description
    pub description: String,
    pub value: ParameterValue,
    /// Whether a user may delete this parameter from its container
    pub removable_by_user: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, description: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            value,
            removable_by_user: false,
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    /// Serialize to a record: `type`, `niceName`, `value` and the range if any
    pub fn to_record(&self) -> Value {
        let mut record = Map::new();
        record.insert("type".into(), json!(self.value_type().factory_tag()));
        record.insert("niceName".into(), json!(self.name));
        record.insert("value".into(), self.value.to_json());
        self.value.write_range(&mut record);
        Value::Object(record)
    }

    /// Restore range, name and value from a record produced by [`Parameter::to_record`]
    ///
    /// Missing fields keep their current values.
    pub fn load_record(&mut self, record: &Value) {
        self.value.read_range(record);
        if let Some(name) = record.get("niceName").and_then(Value::as_str) {
            if !name.is_empty() {
                self.name = name.to_string();
            }
        }
        if let Some(value) = record.get("value") {
            self.value.set_json(value);
        }
    }
}

type Constructor = fn() -> ParameterValue;

fn new_string() -> ParameterValue {
    ParameterValue::String(String::new())
}

fn new_float() -> ParameterValue {
    ParameterValue::Float(Ranged::new(0.0, 0.0, 1.0))
}

fn new_int() -> ParameterValue {
    ParameterValue::Int(Ranged::new(0, -1000, 1000))
}

fn new_bool() -> ParameterValue {
    ParameterValue::Bool(false)
}

/// Builds default values from serialized type tags
///
/// The set of tags is closed: one constructor per [`ValueType`], keyed by its
/// [`ValueType::factory_tag`]. Lookups are exact.
pub struct ValueFactory {
    constructors: Vec<(&'static str, Constructor)>,
}

impl ValueFactory {
    pub fn new() -> Self {
        Self {
            constructors: vec![
                ("String", new_string as Constructor),
                ("Float", new_float),
                ("Integer", new_int),
                ("Boolean", new_bool),
            ],
        }
    }

    /// Create a default value for `tag`, or None if the tag is unknown
    pub fn create(&self, tag: &str) -> Option<ParameterValue> {
        self.constructors
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|(_, ctor)| ctor())
    }

    /// Known tags, in registration order
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.iter().map(|(name, _)| *name)
    }
}

impl Default for ValueFactory {
    fn default() -> Self {
        Self::new()
    }
}
