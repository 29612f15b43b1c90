//! MIDI devices (endpoints) and device selection
//!
//! Endpoints are owned by a [`DeviceTable`] outside the module. A module only
//! holds [`DeviceId`] handles into that table and attaches/detaches itself
//! through the [`InputEndpoint`] / [`OutputEndpoint`] traits.

pub mod binding;
pub mod midir_ports;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EndpointError;
use crate::midi::MidiMessage;

pub use binding::{Availability, DeviceBinding};

/// Identifier of an endpoint in a [`DeviceTable`] (the OS port name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key under which a listener is attached to an input endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey(pub String);

/// Receiver of decoded messages from an input endpoint
///
/// Called on the endpoint's thread; implementations should hand the message
/// off (e.g. into a channel) rather than do work inline.
pub trait InputListener: Send + Sync {
    fn on_message(&self, device: &DeviceId, message: &MidiMessage);
}

/// A device that delivers messages
pub trait InputEndpoint: Send + Sync {
    fn id(&self) -> &DeviceId;

    /// Attach a listener; attaching an existing key replaces its listener
    fn add_listener(&self, key: ListenerKey, listener: Arc<dyn InputListener>) -> Result<(), EndpointError>;

    fn remove_listener(&self, key: &ListenerKey);
}

/// A device that accepts messages
pub trait OutputEndpoint: Send + Sync {
    fn id(&self) -> &DeviceId;

    fn open(&self) -> Result<(), EndpointError>;

    fn close(&self);

    /// Send raw bytes; the endpoint must be open
    fn send(&self, bytes: &[u8]) -> Result<(), EndpointError>;

    fn send_message(&self, message: &MidiMessage) -> Result<(), EndpointError> {
        self.send(&message.encode())
    }
}

/// The value of a device selector: which input and output a module uses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSelector {
    pub input: Option<DeviceId>,
    pub output: Option<DeviceId>,
}

impl DeviceSelector {
    pub fn new(input: Option<DeviceId>, output: Option<DeviceId>) -> Self {
        Self { input, output }
    }
}

/// Externally owned table of available endpoints
#[derive(Default, Clone)]
pub struct DeviceTable {
    inputs: BTreeMap<DeviceId, Arc<dyn InputEndpoint>>,
    outputs: BTreeMap<DeviceId, Arc<dyn OutputEndpoint>>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_input(&mut self, endpoint: Arc<dyn InputEndpoint>) {
        self.inputs.insert(endpoint.id().clone(), endpoint);
    }

    pub fn insert_output(&mut self, endpoint: Arc<dyn OutputEndpoint>) {
        self.outputs.insert(endpoint.id().clone(), endpoint);
    }

    pub fn input(&self, id: &DeviceId) -> Option<&Arc<dyn InputEndpoint>> {
        self.inputs.get(id)
    }

    pub fn output(&self, id: &DeviceId) -> Option<&Arc<dyn OutputEndpoint>> {
        self.outputs.get(id)
    }

    pub fn input_ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.inputs.keys()
    }

    pub fn output_ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.outputs.keys()
    }

    /// First input whose name contains `pattern` (case-insensitive)
    pub fn find_input(&self, pattern: &str) -> Option<DeviceId> {
        find_by_substring(self.inputs.keys(), pattern)
    }

    /// First output whose name contains `pattern` (case-insensitive)
    pub fn find_output(&self, pattern: &str) -> Option<DeviceId> {
        find_by_substring(self.outputs.keys(), pattern)
    }

    /// Resolve a pair of name patterns into a selector
    pub fn select(&self, input: Option<&str>, output: Option<&str>) -> DeviceSelector {
        DeviceSelector {
            input: input.and_then(|p| self.find_input(p)),
            output: output.and_then(|p| self.find_output(p)),
        }
    }
}

fn find_by_substring<'a>(ids: impl Iterator<Item = &'a DeviceId>, pattern: &str) -> Option<DeviceId> {
    let pattern = pattern.to_lowercase();
    if pattern.is_empty() {
        return None;
    }
    ids.into_iter()
        .find(|id| id.as_str().to_lowercase().contains(&pattern))
        .cloned()
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory endpoints that journal every call

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    pub type Journal = Arc<Mutex<Vec<String>>>;

    pub struct FakeInput {
        id: DeviceId,
        journal: Journal,
        listeners: Mutex<HashMap<ListenerKey, Arc<dyn InputListener>>>,
        pub fail_attach: bool,
    }

    impl FakeInput {
        pub fn new(name: &str, journal: &Journal) -> Arc<Self> {
            Arc::new(Self {
                id: DeviceId::new(name),
                journal: journal.clone(),
                listeners: Mutex::new(HashMap::new()),
                fail_attach: false,
            })
        }

        pub fn failing(name: &str, journal: &Journal) -> Arc<Self> {
            Arc::new(Self {
                id: DeviceId::new(name),
                journal: journal.clone(),
                listeners: Mutex::new(HashMap::new()),
                fail_attach: true,
            })
        }

        pub fn listener_count(&self) -> usize {
            self.listeners.lock().len()
        }

        /// Deliver a message to every attached listener
        pub fn emit(&self, message: &MidiMessage) {
            let listeners: Vec<_> = self.listeners.lock().values().cloned().collect();
            for listener in listeners {
                listener.on_message(&self.id, message);
            }
        }
    }

    impl InputEndpoint for FakeInput {
        fn id(&self) -> &DeviceId {
            &self.id
        }

        fn add_listener(&self, key: ListenerKey, listener: Arc<dyn InputListener>) -> Result<(), EndpointError> {
            self.journal.lock().push(format!("attach {}", self.id));
            if self.fail_attach {
                return Err(EndpointError::PortNotFound(self.id.to_string()));
            }
            self.listeners.lock().insert(key, listener);
            Ok(())
        }

        fn remove_listener(&self, key: &ListenerKey) {
            self.journal.lock().push(format!("detach {}", self.id));
            self.listeners.lock().remove(key);
        }
    }

    pub struct FakeOutput {
        id: DeviceId,
        journal: Journal,
        open: Mutex<bool>,
        pub sent: Mutex<Vec<Vec<u8>>>,
    }

    impl FakeOutput {
        pub fn new(name: &str, journal: &Journal) -> Arc<Self> {
            Arc::new(Self {
                id: DeviceId::new(name),
                journal: journal.clone(),
                open: Mutex::new(false),
                sent: Mutex::new(Vec::new()),
            })
        }

        pub fn is_open(&self) -> bool {
            *self.open.lock()
        }
    }

    impl OutputEndpoint for FakeOutput {
        fn id(&self) -> &DeviceId {
            &self.id
        }

        fn open(&self) -> Result<(), EndpointError> {
            self.journal.lock().push(format!("open {}", self.id));
            *self.open.lock() = true;
            Ok(())
        }

        fn close(&self) {
            self.journal.lock().push(format!("close {}", self.id));
            *self.open.lock() = false;
        }

        fn send(&self, bytes: &[u8]) -> Result<(), EndpointError> {
            if !self.is_open() {
                return Err(EndpointError::NotOpen(self.id.to_string()));
            }
            self.sent.lock().push(bytes.to_vec());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_find_by_substring_is_case_insensitive() {
        let journal = Journal::default();
        let mut table = DeviceTable::new();
        table.insert_input(FakeInput::new("X-Touch INT", &journal));
        table.insert_output(FakeOutput::new("loopMIDI Port 1", &journal));

        assert_eq!(table.find_input("x-touch"), Some(DeviceId::new("X-Touch INT")));
        assert_eq!(table.find_output("LOOPMIDI"), Some(DeviceId::new("loopMIDI Port 1")));
        assert_eq!(table.find_input("nanoKONTROL"), None);
        assert_eq!(table.find_input(""), None);
    }

    #[test]
    fn test_select_resolves_each_axis() {
        let journal = Journal::default();
        let mut table = DeviceTable::new();
        table.insert_input(FakeInput::new("Launch Control", &journal));

        let selector = table.select(Some("launch"), Some("launch"));
        assert_eq!(selector.input, Some(DeviceId::new("Launch Control")));
        assert_eq!(selector.output, None);
    }
}
