//! Dynamic value registry
//!
//! Maps inbound message identities to integer values in [0, 127]. The key of
//! an entry is `"[channel] label"`, e.g. `"[2] CC10"` or `"[1] C5"`. Entries
//! are created on first sight when auto-create is on, and the registry is kept
//! sorted by key, ignoring case, after every creation or load.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::value::{Parameter, ParameterValue, Ranged};

/// Lowest value an entry can hold
pub const VALUE_MIN: i64 = 0;
/// Highest value an entry can hold
pub const VALUE_MAX: i64 = 127;

/// Build the registry key for a channel and message label
pub fn make_key(channel: u8, label: &str) -> String {
    format!("[{}] {}", channel, label)
}

/// Outcome of feeding an inbound value to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryUpdate {
    /// An existing entry was set (it may have held the same value already)
    Updated,
    /// A new entry was created
    Created,
    /// Unknown key with auto-create off; nothing changed
    Ignored,
}

/// Ordered set of dynamically created values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRegistry {
    entries: Vec<Parameter>,
}

impl ValueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an inbound value
    pub fn update(&mut self, channel: u8, label: &str, value: i64, auto_create: bool) -> RegistryUpdate {
        let key = make_key(channel, label);

        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == key) {
            entry.value.set_json(&Value::from(value));
            return RegistryUpdate::Updated;
        }

        if !auto_create {
            return RegistryUpdate::Ignored;
        }

        debug!("Registry: new value '{}' = {}", key, value);
        let description = format!("Channel {} : {}", channel, label);
        self.entries.push(new_entry(key, description, value));
        self.sort();
        RegistryUpdate::Created
    }

    /// Flat `{ key: value }` record of every entry
    pub fn to_record(&self) -> Value {
        let mut record = Map::new();
        for entry in &self.entries {
            record.insert(entry.name.clone(), entry.value.to_json());
        }
        Value::Object(record)
    }

    /// Replace all entries with the ones in `record`, then sort
    ///
    /// Non-numeric values are skipped. A non-object record leaves the registry
    /// empty.
    pub fn load_record(&mut self, record: &Value) {
        self.entries.clear();

        let Some(values) = record.as_object() else {
            if !record.is_null() {
                warn!("Registry: ignoring non-object values record");
            }
            return;
        };

        for (key, value) in values {
            let Some(v) = value.as_i64().or_else(|| value.as_f64().map(|f| f.round() as i64)) else {
                warn!("Registry: skipping '{}' (not a number: {})", key, value);
                continue;
            };
            let description = describe_key(key);
            self.entries.push(new_entry(key.clone(), description, v));
        }
        self.sort();
    }

    /// Remove a user-removable entry; returns it if it existed
    pub fn remove(&mut self, key: &str) -> Option<Parameter> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name == key && e.removable_by_user)?;
        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, key: &str) -> Option<&Parameter> {
        self.entries.iter().find(|e| e.name == key)
    }

    pub fn value(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|e| e.value.as_i64())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive key order; keys differing only in case keep byte order
    fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
    }
}

fn new_entry(key: String, description: String, value: i64) -> Parameter {
    let mut entry = Parameter::new(
        key,
        description,
        ParameterValue::Int(Ranged::new(value, VALUE_MIN, VALUE_MAX)),
    );
    entry.removable_by_user = true;
    entry
}

/// Rebuild the description of a key loaded from a record
fn describe_key(key: &str) -> String {
    key.strip_prefix('[')
        .and_then(|rest| rest.split_once("] "))
        .map(|(channel, label)| format!("Channel {} : {}", channel, label))
        .unwrap_or_else(|| key.to_string())
}
