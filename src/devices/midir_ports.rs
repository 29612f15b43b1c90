//! OS MIDI ports as endpoints (midir backend)
//!
//! An input port is opened when its first listener attaches and closed when the
//! last one detaches. An output port is opened/closed explicitly by the binding.

use midir::{MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, trace};

use super::{DeviceId, DeviceTable, InputEndpoint, InputListener, ListenerKey, OutputEndpoint};
use crate::error::EndpointError;
use crate::midi::{format_hex, MidiMessage};

type ListenerList = Arc<RwLock<Vec<(ListenerKey, Arc<dyn InputListener>)>>>;

/// Find a port by its exact name
fn find_port<T: MidiIO>(io: &T, name: &str) -> Option<T::Port> {
    io.ports()
        .into_iter()
        .find(|port| io.port_name(port).map(|n| n == name).unwrap_or(false))
}

/// Input port endpoint
pub struct MidirInputEndpoint {
    id: DeviceId,
    client_name: String,
    listeners: ListenerList,
    connection: Mutex<Option<MidiInputConnection<()>>>,
}

// Connections are only reached through the mutex
unsafe impl Send for MidirInputEndpoint {}
unsafe impl Sync for MidirInputEndpoint {}

impl MidirInputEndpoint {
    pub fn new(port_name: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(port_name),
            client_name: client_name.into(),
            listeners: Arc::new(RwLock::new(Vec::new())),
            connection: Mutex::new(None),
        }
    }

    pub fn is_open(&self) -> bool {
        self.connection.lock().is_some()
    }

    fn open(&self) -> Result<MidiInputConnection<()>, EndpointError> {
        let midi_in = MidiInput::new(&self.client_name).map_err(|e| EndpointError::Init(e.to_string()))?;
        let port = find_port(&midi_in, self.id.as_str())
            .ok_or_else(|| EndpointError::PortNotFound(self.id.to_string()))?;

        let listeners = self.listeners.clone();
        let device = self.id.clone();

        let connection = midi_in
            .connect(
                &port,
                &format!("{}-in", self.client_name),
                move |_timestamp, data, _| {
                    let Some(message) = MidiMessage::parse(data) else {
                        trace!("{} RX (undecoded): {}", device, format_hex(data));
                        return;
                    };
                    trace!("{} RX: {}", device, message);
                    for (_, listener) in listeners.read().iter() {
                        listener.on_message(&device, &message);
                    }
                },
                (),
            )
            .map_err(|e| EndpointError::Connect(e.to_string()))?;

        info!("MIDI input opened: '{}'", self.id);
        Ok(connection)
    }
}

impl InputEndpoint for MidirInputEndpoint {
    fn id(&self) -> &DeviceId {
        &self.id
    }

    fn add_listener(&self, key: ListenerKey, listener: Arc<dyn InputListener>) -> Result<(), EndpointError> {
        {
            let mut listeners = self.listeners.write();
            listeners.retain(|(k, _)| *k != key);
            listeners.push((key.clone(), listener));
        }

        let mut connection = self.connection.lock();
        if connection.is_none() {
            match self.open() {
                Ok(conn) => *connection = Some(conn),
                Err(e) => {
                    self.listeners.write().retain(|(k, _)| *k != key);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn remove_listener(&self, key: &ListenerKey) {
        let empty = {
            let mut listeners = self.listeners.write();
            listeners.retain(|(k, _)| k != key);
            listeners.is_empty()
        };

        if empty {
            if let Some(connection) = self.connection.lock().take() {
                connection.close();
                info!("MIDI input closed: '{}'", self.id);
            }
        }
    }
}

/// Output port endpoint
pub struct MidirOutputEndpoint {
    id: DeviceId,
    client_name: String,
    connection: Mutex<Option<MidiOutputConnection>>,
}

// Connections are only reached through the mutex
unsafe impl Send for MidirOutputEndpoint {}
unsafe impl Sync for MidirOutputEndpoint {}

impl MidirOutputEndpoint {
    pub fn new(port_name: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(port_name),
            client_name: client_name.into(),
            connection: Mutex::new(None),
        }
    }

    pub fn is_open(&self) -> bool {
        self.connection.lock().is_some()
    }
}

impl OutputEndpoint for MidirOutputEndpoint {
    fn id(&self) -> &DeviceId {
        &self.id
    }

    fn open(&self) -> Result<(), EndpointError> {
        let mut connection = self.connection.lock();
        if connection.is_some() {
            return Ok(());
        }

        let midi_out = MidiOutput::new(&self.client_name).map_err(|e| EndpointError::Init(e.to_string()))?;
        let port = find_port(&midi_out, self.id.as_str())
            .ok_or_else(|| EndpointError::PortNotFound(self.id.to_string()))?;
        let conn = midi_out
            .connect(&port, &format!("{}-out", self.client_name))
            .map_err(|e| EndpointError::Connect(e.to_string()))?;

        *connection = Some(conn);
        info!("MIDI output opened: '{}'", self.id);
        Ok(())
    }

    fn close(&self) {
        if let Some(conn) = self.connection.lock().take() {
            conn.close();
            info!("MIDI output closed: '{}'", self.id);
        }
    }

    fn send(&self, bytes: &[u8]) -> Result<(), EndpointError> {
        let mut connection = self.connection.lock();
        match connection.as_mut() {
            Some(conn) => {
                trace!("{} TX: {}", self.id, format_hex(bytes));
                conn.send(bytes).map_err(|e| EndpointError::Send(e.to_string()))
            }
            None => Err(EndpointError::NotOpen(self.id.to_string())),
        }
    }
}

/// Names of the input and output ports currently present
pub fn list_ports(client_name: &str) -> Result<(Vec<String>, Vec<String>), EndpointError> {
    let midi_in = MidiInput::new(client_name).map_err(|e| EndpointError::Init(e.to_string()))?;
    let midi_out = MidiOutput::new(client_name).map_err(|e| EndpointError::Init(e.to_string()))?;

    let inputs = midi_in
        .ports()
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect();
    let outputs = midi_out
        .ports()
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect();
    Ok((inputs, outputs))
}

/// Build a device table with one endpoint per OS port
pub fn scan_devices(client_name: &str) -> Result<DeviceTable, EndpointError> {
    let (inputs, outputs) = list_ports(client_name)?;
    let mut table = DeviceTable::new();

    for name in inputs {
        debug!("Found MIDI input: '{}'", name);
        table.insert_input(Arc::new(MidirInputEndpoint::new(name, client_name)));
    }
    for name in outputs {
        debug!("Found MIDI output: '{}'", name);
        table.insert_output(Arc::new(MidirOutputEndpoint::new(name, client_name)));
    }
    Ok(table)
}
