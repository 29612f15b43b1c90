//! Custom OSC command
//!
//! An OSC address plus a user-defined argument list. The argument flagged for
//! mapping receives the mapped value before the message is built.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, warn};

use crate::arguments::{Argument, ArgumentManager};
use crate::error::ItemError;
use crate::value::ParameterValue;

/// One OSC argument, in OSC's own type set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OscArg {
    String(String),
    Float(f32),
    Int(i32),
    Bool(bool),
}

impl From<&ParameterValue> for OscArg {
    fn from(value: &ParameterValue) -> Self {
        match value {
            ParameterValue::String(s) => OscArg::String(s.clone()),
            ParameterValue::Float(r) => OscArg::Float(r.get() as f32),
            ParameterValue::Int(r) => OscArg::Int(r.get().clamp(i32::MIN as i64, i32::MAX as i64) as i32),
            ParameterValue::Bool(b) => OscArg::Bool(*b),
        }
    }
}

impl fmt::Display for OscArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArg::String(s) => write!(f, "\"{}\"", s),
            OscArg::Float(v) => write!(f, "{}f", v),
            OscArg::Int(v) => write!(f, "{}i", v),
            OscArg::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// An OSC message ready for a transport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl fmt::Display for OscMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// OSC command with custom arguments
pub struct CustomOscCommand {
    pub address: String,
    pub arguments: ArgumentManager,
}

impl CustomOscCommand {
    /// Empty command with mapping enabled
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            arguments: ArgumentManager::new(true),
        }
    }

    /// Build a command from type descriptors ("int", "float", ...)
    pub fn with_argument_types<S: AsRef<str>>(address: impl Into<String>, types: &[S]) -> Result<Self, ItemError> {
        let mut command = Self::new(address);
        for tag in types {
            command.arguments.add_from_type(tag.as_ref(), None, false)?;
        }
        Ok(command)
    }

    /// Write a mapped input into the argument flagged for mapping
    ///
    /// Returns false if no argument is flagged or the value is NaN.
    pub fn set_mapped_value(&mut self, value: f64) -> bool {
        let Some(argument) = self.arguments.mapping_argument_mut() else {
            debug!("{}: no mapping argument, value {} dropped", self.address, value);
            return false;
        };
        argument.value_mut().set_from_f64(value)
    }

    pub fn mapping_argument(&self) -> Option<&Argument> {
        self.arguments.mapping_argument()
    }

    /// Snapshot of the current address and argument values
    pub fn build_message(&self) -> OscMessage {
        OscMessage {
            address: self.address.clone(),
            args: self.arguments.iter().map(|a| OscArg::from(a.value())).collect(),
        }
    }

    pub fn to_record(&self) -> Value {
        json!({
            "address": self.address,
            "arguments": self.arguments.to_record(),
        })
    }

    /// Restore address and arguments; bad argument entries are skipped
    pub fn load_record(&mut self, record: &Value) {
        if let Some(address) = record.get("address").and_then(Value::as_str) {
            self.address = address.to_string();
        }
        let arguments = record.get("arguments").cloned().unwrap_or(Value::Null);
        let expected = arguments.as_array().map(Vec::len).unwrap_or(0);
        let loaded = self.arguments.load_record(&arguments);
        if loaded != expected {
            warn!("{}: loaded {} of {} arguments", self.address, loaded, expected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::Item;

    #[test]
    fn test_build_message_uses_current_values() {
        let mut command = CustomOscCommand::with_argument_types("/mixer/fader", &["string", "float"]).unwrap();
        command.arguments.get_mut(0).unwrap().value_mut().set_json(&json!("ch1"));

        assert!(command.set_mapped_value(0.25));
        let message = command.build_message();

        assert_eq!(message.address, "/mixer/fader");
        assert_eq!(message.args, vec![OscArg::String("ch1".into()), OscArg::Float(0.25)]);
        assert_eq!(message.to_string(), "/mixer/fader \"ch1\" 0.25f");
    }

    #[test]
    fn test_mapped_value_conversion() {
        let mut command = CustomOscCommand::with_argument_types("/x", &["int", "int"]).unwrap();
        command.set_mapped_value(2000.0);
        assert_eq!(command.build_message().args[1], OscArg::Int(1000));

        command.arguments.set_use_for_mapping(0, true);
        command.set_mapped_value(0.6);
        assert_eq!(command.build_message().args[0], OscArg::Int(1));
    }

    #[test]
    fn test_bool_mapping_threshold() {
        let mut command = CustomOscCommand::with_argument_types("/toggle", &["int", "bool"]).unwrap();
        command.set_mapped_value(0.49);
        assert_eq!(command.build_message().args[1], OscArg::Bool(false));
        command.set_mapped_value(0.5);
        assert_eq!(command.build_message().args[1], OscArg::Bool(true));
    }

    #[test]
    fn test_nan_mapped_value_is_dropped() {
        let mut command = CustomOscCommand::with_argument_types("/mixer/fader", &["string", "float"]).unwrap();
        assert!(command.set_mapped_value(0.25));
        assert!(!command.set_mapped_value(f64::NAN));
        assert_eq!(command.build_message().args[1], OscArg::Float(0.25));
    }

    #[test]
    fn test_single_argument_has_no_mapping_target() {
        let mut command = CustomOscCommand::with_argument_types("/go", &["float"]).unwrap();
        assert!(!command.set_mapped_value(1.0));
        assert!(command.mapping_argument().is_none());
    }

    #[test]
    fn test_unknown_argument_type() {
        let result = CustomOscCommand::with_argument_types("/x", &["int", "blob"]);
        assert!(matches!(result, Err(ItemError::UnresolvedType(t)) if t == "blob"));
    }

    #[test]
    fn test_record_round_trip() {
        let mut command = CustomOscCommand::with_argument_types("/cue", &["string", "int", "bool"]).unwrap();
        command.arguments.set_use_for_mapping(2, true);
        command.set_mapped_value(1.0);

        let record = command.to_record();
        let mut restored = CustomOscCommand::new("");
        restored.load_record(&record);

        assert_eq!(restored.address, "/cue");
        assert_eq!(restored.build_message(), command.build_message());
        assert_eq!(restored.mapping_argument().unwrap().name(), "#3");
    }
}
