//! Typed argument lists for outgoing commands
//!
//! An [`ArgumentManager`] is an [`ItemManager`] of [`Argument`]s. When created
//! with mapping enabled, at most one argument carries the "use for mapping"
//! flag: that argument receives the mapped value when the command fires.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::ItemError;
use crate::items::{Item, ItemManager, ListenerHandle, ManagerListener};
use crate::value::{Parameter, ParameterValue, ValueFactory, ValueType};

/// One typed argument of a command
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    param: Parameter,
    use_for_mapping: bool,
    mapping_enabled: bool,
}

impl Argument {
    fn new(param: Parameter, mapping_enabled: bool) -> Self {
        Self {
            param,
            use_for_mapping: false,
            mapping_enabled,
        }
    }

    pub fn param(&self) -> &Parameter {
        &self.param
    }

    pub fn value(&self) -> &ParameterValue {
        &self.param.value
    }

    pub fn value_mut(&mut self) -> &mut ParameterValue {
        &mut self.param.value
    }

    pub fn value_type(&self) -> ValueType {
        self.param.value_type()
    }

    pub fn use_for_mapping(&self) -> bool {
        self.use_for_mapping
    }
}

impl Item for Argument {
    fn name(&self) -> &str {
        &self.param.name
    }

    fn set_name(&mut self, name: String) {
        self.param.name = name;
    }

    fn to_record(&self) -> Value {
        let mut record = self.param.to_record();
        if self.mapping_enabled {
            record["useForMapping"] = json!(self.use_for_mapping);
        }
        record
    }

    fn load_record(&mut self, record: &Value) {
        self.param.load_record(record);
        if self.mapping_enabled {
            if let Some(flag) = record.get("useForMapping").and_then(Value::as_bool) {
                self.use_for_mapping = flag;
            }
        }
    }
}

/// Observer of mapping-flag changes
pub trait ArgumentManagerListener: Send + Sync {
    /// The mapping flag of `argument` changed, or `argument` was removed
    fn on_mapping_flag_changed(&self, argument: &Argument);
}

/// Manager of command arguments
pub struct ArgumentManager {
    items: ItemManager<Argument>,
    mapping_enabled: bool,
    factory: ValueFactory,
    listeners: Vec<(ListenerHandle, Arc<dyn ArgumentManagerListener>)>,
    next_handle: u64,
}

impl ArgumentManager {
    pub fn new(mapping_enabled: bool) -> Self {
        Self {
            items: ItemManager::new("arguments"),
            mapping_enabled,
            factory: ValueFactory::new(),
            listeners: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn mapping_enabled(&self) -> bool {
        self.mapping_enabled
    }

    /// Wrap `param` into a new argument named `#` + (count + 1)
    ///
    /// With mapping enabled, the argument added while exactly one argument
    /// exists gets the mapping flag. `data`, if given, is restored into the
    /// argument and may override that flag.
    pub fn add_from_value(&mut self, mut param: Parameter, data: Option<&Value>, undoable: bool) -> &mut Argument {
        let auto_name = self.items.next_auto_name();
        param.name = auto_name.clone();

        let mut argument = Argument::new(param, self.mapping_enabled);
        if self.mapping_enabled && self.items.len() == 1 {
            argument.use_for_mapping = true;
        }
        if let Some(data) = data {
            argument.load_record(data);
            if argument.is_auto_named() {
                argument.set_name(auto_name);
            }
        }

        if argument.use_for_mapping {
            self.clear_flags_except(None);
            self.notify_flag_changed(&argument);
        }
        self.items.add(argument, None, undoable)
    }

    /// Create an argument with the default value of a type descriptor
    pub fn add_from_type(&mut self, tag: &str, data: Option<&Value>, undoable: bool) -> Result<&mut Argument, ItemError> {
        let value_type = ValueType::from_descriptor(tag).ok_or_else(|| ItemError::UnresolvedType(tag.to_string()))?;

        let id = self.items.len() + 1;
        let param = Parameter::new(
            format!("#{}", id),
            format!("Argument #{}, type {}", id, value_type),
            value_type.default_value(),
        );
        Ok(self.add_from_value(param, data, undoable))
    }

    /// Create an argument from a serialized record carrying a `type` field
    pub fn add_from_data(&mut self, data: &Value, undoable: bool) -> Result<&mut Argument, ItemError> {
        let tag = data.get("type").and_then(Value::as_str).unwrap_or_default();
        if tag.is_empty() {
            error!("Error loading custom argument: missing type");
            return Err(ItemError::MissingTypeField);
        }

        let Some(value) = self.factory.create(tag) else {
            error!("Error loading custom argument: unknown type '{}'", tag);
            return Err(ItemError::UnresolvedType(tag.to_string()));
        };

        let param = Parameter::new("", "", value);
        Ok(self.add_from_value(param, Some(data), undoable))
    }

    /// Remove the argument at `index`; listeners are told its mapping
    /// eligibility changed
    pub fn remove(&mut self, index: usize) -> Option<Argument> {
        let removed = self.items.remove(index)?;
        self.notify_flag_changed(&removed);
        Some(removed)
    }

    /// Set the mapping flag of the argument at `index`
    ///
    /// Setting it clears the flag on every other argument, so at most one
    /// argument is flagged. Returns false if mapping is disabled or the index
    /// is out of range.
    pub fn set_use_for_mapping(&mut self, index: usize, value: bool) -> bool {
        if !self.mapping_enabled {
            return false;
        }
        let Some(argument) = self.items.get_mut(index) else {
            return false;
        };
        if argument.use_for_mapping == value {
            return true;
        }

        argument.use_for_mapping = value;
        if value {
            self.clear_flags_except(Some(index));
        }
        if let Some(argument) = self.items.get(index) {
            self.notify_flag_changed(argument);
        }
        true
    }

    fn clear_flags_except(&mut self, keep: Option<usize>) {
        let mut cleared = Vec::new();
        for (i, argument) in self.items.iter_mut().enumerate() {
            if Some(i) != keep && argument.use_for_mapping {
                argument.use_for_mapping = false;
                cleared.push(i);
            }
        }
        for i in cleared {
            debug!("Mapping flag moved away from argument #{}", i + 1);
            if let Some(argument) = self.items.get(i) {
                self.notify_flag_changed(argument);
            }
        }
    }

    /// The argument flagged for mapping, if any
    pub fn mapping_argument(&self) -> Option<&Argument> {
        self.items.iter().find(|a| a.use_for_mapping)
    }

    pub fn mapping_argument_mut(&mut self) -> Option<&mut Argument> {
        self.items.iter_mut().find(|a| a.use_for_mapping)
    }

    fn notify_flag_changed(&self, argument: &Argument) {
        for (_, listener) in &self.listeners {
            listener.on_mapping_flag_changed(argument);
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ArgumentManagerListener>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle);
        self.next_handle += 1;
        self.listeners.push((handle, listener));
        handle
    }

    pub fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(h, _)| *h != handle);
        self.listeners.len() != before
    }

    /// Register an observer of structural changes (add/remove)
    pub fn add_manager_listener(&mut self, listener: Arc<dyn ManagerListener<Argument>>) -> ListenerHandle {
        self.items.add_listener(listener)
    }

    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Argument> {
        self.items.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Argument> {
        self.items.iter()
    }

    /// Serialize every argument, in order
    pub fn to_record(&self) -> Value {
        self.items.to_record()
    }

    /// Replace all arguments with the ones in `record`
    ///
    /// Entries that fail to load are skipped (and logged). Returns the number
    /// of arguments loaded.
    pub fn load_record(&mut self, record: &Value) -> usize {
        self.items.clear();
        let Some(entries) = record.as_array() else {
            return 0;
        };

        let mut loaded = 0;
        for entry in entries {
            if self.add_from_data(entry, false).is_ok() {
                loaded += 1;
            }
        }
        loaded
    }
}
