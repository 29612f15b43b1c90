//! MIDI module
//!
//! Glues a device binding, a value registry and the send primitives together.
//! Inbound messages arrive on the endpoint's thread and are queued; the event
//! loop that owns the module drains the queue and calls
//! [`MidiModule::handle_inbound`]. Nothing in here locks: the module has a
//! single owner.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::activity::{ActivityDirection, ActivityTracker};
use crate::commands::MidiCommand;
use crate::devices::{Availability, DeviceBinding, DeviceId, DeviceSelector, DeviceTable, InputListener, ListenerKey};
use crate::error::DeviceError;
use crate::midi::MidiMessage;
use crate::registry::{make_key, RegistryUpdate, ValueRegistry};

/// Capacity of the inbound queue between endpoint threads and the event loop
pub const INBOUND_QUEUE_SIZE: usize = 1000;

fn default_true() -> bool {
    true
}

/// Per-module switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub log_incoming: bool,
    #[serde(default)]
    pub log_outgoing: bool,
    /// Feed note and CC messages into the value registry
    #[serde(default = "default_true")]
    pub use_generic_controls: bool,
    /// Create registry entries for unseen messages
    #[serde(default)]
    pub auto_add: bool,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_incoming: false,
            log_outgoing: false,
            use_generic_controls: true,
            auto_add: false,
        }
    }
}

/// Notification published to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleEvent {
    RegistryUpdated { key: String, value: i64, created: bool },
    AvailabilityChanged(Availability),
    Activity(ActivityDirection),
}

pub type EventCallback = Arc<dyn Fn(&ModuleEvent) + Send + Sync>;

/// A message queued by an input endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub device: DeviceId,
    pub message: MidiMessage,
}

/// Listener attached to the bound input; forwards into the module queue
struct QueueListener {
    module: String,
    tx: mpsc::Sender<InboundMessage>,
}

impl InputListener for QueueListener {
    fn on_message(&self, device: &DeviceId, message: &MidiMessage) {
        let inbound = InboundMessage {
            device: device.clone(),
            message: message.clone(),
        };
        if let Err(e) = self.tx.try_send(inbound) {
            warn!("{}: dropping inbound message: {}", self.module, e);
        }
    }
}

/// A MIDI module instance
pub struct MidiModule {
    name: String,
    settings: ModuleSettings,
    selector: DeviceSelector,
    binding: DeviceBinding,
    registry: ValueRegistry,
    activity: Arc<ActivityTracker>,
    subscribers: Vec<EventCallback>,
}

impl MidiModule {
    /// Create a module and the receiving end of its inbound queue
    pub fn new(
        name: impl Into<String>,
        settings: ModuleSettings,
        activity: Arc<ActivityTracker>,
    ) -> (Self, mpsc::Receiver<InboundMessage>) {
        let name = name.into();
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE_SIZE);
        let listener = Arc::new(QueueListener { module: name.clone(), tx });

        let module = Self {
            binding: DeviceBinding::new(ListenerKey(name.clone()), listener),
            name,
            settings,
            selector: DeviceSelector::default(),
            registry: ValueRegistry::new(),
            activity,
            subscribers: Vec::new(),
        };
        (module, rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &ModuleSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ModuleSettings) {
        if settings.enabled != self.settings.enabled {
            info!("{}: {}", self.name, if settings.enabled { "enabled" } else { "disabled" });
        }
        self.settings = settings;
    }

    pub fn selector(&self) -> &DeviceSelector {
        &self.selector
    }

    pub fn availability(&self) -> Availability {
        self.binding.availability()
    }

    pub fn registry(&self) -> &ValueRegistry {
        &self.registry
    }

    /// Register an event callback
    pub fn subscribe(&mut self, callback: EventCallback) {
        self.subscribers.push(callback);
    }

    fn publish(&self, event: ModuleEvent) {
        for callback in &self.subscribers {
            callback(&event);
        }
    }

    /// Point the module at a new input/output pair
    pub fn set_selector(&mut self, selector: DeviceSelector, devices: &DeviceTable) -> Result<Availability, DeviceError> {
        let before = self.binding.availability();
        let result = self
            .binding
            .on_selector_changed(&selector, devices, !self.registry.is_empty());
        self.selector = selector;
        self.publish_availability(before);
        result
    }

    /// Detach from the input and close the output
    pub fn shutdown(&mut self, devices: &DeviceTable) {
        let before = self.binding.availability();
        self.binding.release(devices, !self.registry.is_empty());
        self.publish_availability(before);
        info!("{}: released devices", self.name);
    }

    fn refresh_availability(&mut self) {
        let before = self.binding.availability();
        self.binding.recompute_availability(!self.registry.is_empty());
        self.publish_availability(before);
    }

    fn publish_availability(&self, before: Availability) {
        let now = self.binding.availability();
        if now != before {
            debug!("{}: availability {:?}", self.name, now);
            self.publish(ModuleEvent::AvailabilityChanged(now));
        }
    }

    /// Handle a queued message, dropping it if its input is no longer bound
    pub fn handle_inbound(&mut self, inbound: &InboundMessage) -> Option<RegistryUpdate> {
        if self.binding.input() != Some(&inbound.device) {
            trace!("{}: dropping message from unbound '{}'", self.name, inbound.device);
            return None;
        }
        self.handle_message(&inbound.message)
    }

    /// Process one inbound message
    ///
    /// Returns the registry outcome for notes and control changes, None when
    /// the module is disabled or the message does not touch the registry.
    pub fn handle_message(&mut self, message: &MidiMessage) -> Option<RegistryUpdate> {
        if !self.settings.enabled {
            return None;
        }

        self.activity.record(&self.name, ActivityDirection::Inbound);
        self.publish(ModuleEvent::Activity(ActivityDirection::Inbound));

        if self.settings.log_incoming {
            info!("{} <- {}", self.name, message);
        }

        if !self.settings.use_generic_controls {
            return None;
        }
        let (channel, label, value) = message.registry_identity()?;

        let update = self
            .registry
            .update(channel, &label, value as i64, self.settings.auto_add);

        let key = make_key(channel, &label);
        match update {
            RegistryUpdate::Ignored => {
                if self.settings.log_incoming {
                    debug!("{}: ignored '{}' (auto add is off)", self.name, key);
                }
            }
            RegistryUpdate::Created | RegistryUpdate::Updated => {
                let value = self.registry.value(&key).unwrap_or(value as i64);
                self.publish(ModuleEvent::RegistryUpdated {
                    key,
                    value,
                    created: update == RegistryUpdate::Created,
                });
                if update == RegistryUpdate::Created && self.registry.len() == 1 {
                    self.refresh_availability();
                }
            }
        }
        Some(update)
    }

    /// Send a note on (channel 1-16)
    pub fn send_note_on(&self, devices: &DeviceTable, pitch: u8, velocity: u8, channel: u8) {
        self.send(
            devices,
            MidiMessage::NoteOn {
                channel: self.wire_channel(channel),
                note: self.data_byte("pitch", pitch),
                velocity: self.data_byte("velocity", velocity),
            },
        );
    }

    /// Send a note off (channel 1-16)
    pub fn send_note_off(&self, devices: &DeviceTable, pitch: u8, channel: u8) {
        self.send(
            devices,
            MidiMessage::NoteOff {
                channel: self.wire_channel(channel),
                note: self.data_byte("pitch", pitch),
                velocity: 0,
            },
        );
    }

    /// Send a control change (channel 1-16)
    pub fn send_control_change(&self, devices: &DeviceTable, number: u8, value: u8, channel: u8) {
        self.send(
            devices,
            MidiMessage::ControlChange {
                channel: self.wire_channel(channel),
                cc: self.data_byte("controller", number),
                value: self.data_byte("value", value),
            },
        );
    }

    /// Send a system exclusive payload (without F0/F7)
    ///
    /// Payloads carrying a byte above 0x7F are not sent.
    pub fn send_sysex(&self, devices: &DeviceTable, data: &[u8]) {
        if let Some(byte) = data.iter().find(|b| **b > 0x7F) {
            warn!("{}: sysex payload contains status byte 0x{:02X}, not sent", self.name, byte);
            return;
        }
        self.send(devices, MidiMessage::SysEx { data: data.to_vec() });
    }

    /// Run a command definition against the bound output
    pub fn execute(&self, devices: &DeviceTable, command: &MidiCommand) {
        match command {
            MidiCommand::NoteOn { channel, pitch, velocity } => self.send_note_on(devices, *pitch, *velocity, *channel),
            MidiCommand::NoteOff { channel, pitch } => self.send_note_off(devices, *pitch, *channel),
            MidiCommand::FullNote { channel, pitch, velocity } => {
                self.send_note_on(devices, *pitch, *velocity, *channel);
                self.send_note_off(devices, *pitch, *channel);
            }
            MidiCommand::ControlChange { channel, number, value } => {
                self.send_control_change(devices, *number, *value, *channel)
            }
            MidiCommand::SysEx { data } => self.send_sysex(devices, data),
        }
    }

    fn send(&self, devices: &DeviceTable, message: MidiMessage) {
        if !self.settings.enabled {
            return;
        }
        let Some(id) = self.binding.output() else {
            return;
        };
        let Some(endpoint) = devices.output(id) else {
            warn!("{}: output '{}' is gone", self.name, id);
            return;
        };

        self.activity.record(&self.name, ActivityDirection::Outbound);
        self.publish(ModuleEvent::Activity(ActivityDirection::Outbound));

        if self.settings.log_outgoing {
            info!("{} -> {}", self.name, message);
        }

        if let Err(e) = endpoint.send_message(&message) {
            warn!("{}: send to '{}' failed: {}", self.name, id, e);
        }
    }

    /// Display channel (1-16) to wire channel (0-15)
    fn wire_channel(&self, channel: u8) -> u8 {
        if !(1..=16).contains(&channel) {
            warn!("{}: channel {} out of range, clamped to 1-16", self.name, channel);
        }
        channel.clamp(1, 16) - 1
    }

    fn data_byte(&self, what: &str, value: u8) -> u8 {
        if value > 0x7F {
            warn!("{}: {} {} out of range, clamped to 127", self.name, what, value);
            return 0x7F;
        }
        value
    }

    /// Persistent state: name, enabled flag and registry values
    pub fn to_record(&self) -> Value {
        json!({
            "name": self.name,
            "enabled": self.settings.enabled,
            "values": self.registry.to_record(),
        })
    }

    /// Restore the enabled flag and registry values
    pub fn load_record(&mut self, record: &Value) {
        if let Some(enabled) = record.get("enabled").and_then(Value::as_bool) {
            self.settings.enabled = enabled;
        }
        self.registry.load_record(record.get("values").unwrap_or(&Value::Null));
        debug!("{}: restored {} values", self.name, self.registry.len());
        self.refresh_availability();
    }
}
