//! Device binding - follows a device selector
//!
//! Keeps at most one input and one output bound. The two axes are independent:
//! a selector change on one axis never touches the other. Within an axis the
//! previous endpoint is always released before the new one is attached, so
//! two inputs never feed the same module at once.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{DeviceId, DeviceSelector, DeviceTable, InputListener, ListenerKey};
use crate::error::DeviceError;

/// Capability flags published by a module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Availability {
    /// Something can feed values in: a bound input, or registry values
    pub can_receive: bool,
    /// An output is bound
    pub can_send: bool,
}

/// Binding of one listener to the endpoints named by a selector
pub struct DeviceBinding {
    key: ListenerKey,
    listener: Arc<dyn InputListener>,
    input: Option<DeviceId>,
    output: Option<DeviceId>,
    availability: Availability,
}

impl DeviceBinding {
    /// Create an unbound binding; `listener` is attached to whichever input
    /// gets bound, under `key`
    pub fn new(key: ListenerKey, listener: Arc<dyn InputListener>) -> Self {
        Self {
            key,
            listener,
            input: None,
            output: None,
            availability: Availability::default(),
        }
    }

    pub fn input(&self) -> Option<&DeviceId> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&DeviceId> {
        self.output.as_ref()
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    /// Rebind to the endpoints of `selector`
    ///
    /// Both axes are always processed. Endpoint failures are not retried: the
    /// failing axis stays unbound and the first failure is returned once
    /// availability has been recomputed.
    pub fn on_selector_changed(
        &mut self,
        selector: &DeviceSelector,
        devices: &DeviceTable,
        registry_has_entries: bool,
    ) -> Result<Availability, DeviceError> {
        let input_result = self.rebind_input(selector.input.as_ref(), devices);
        let output_result = self.rebind_output(selector.output.as_ref(), devices);
        let availability = self.recompute_availability(registry_has_entries);

        input_result.and(output_result).map(|_| availability)
    }

    /// Recompute capability flags from the current binding
    pub fn recompute_availability(&mut self, registry_has_entries: bool) -> Availability {
        self.availability = Availability {
            can_receive: self.input.is_some() || registry_has_entries,
            can_send: self.output.is_some(),
        };
        self.availability
    }

    /// Detach from the input and close the output
    pub fn release(&mut self, devices: &DeviceTable, registry_has_entries: bool) -> Availability {
        self.detach_input(devices);
        self.close_output(devices);
        self.recompute_availability(registry_has_entries)
    }

    fn rebind_input(&mut self, wanted: Option<&DeviceId>, devices: &DeviceTable) -> Result<(), DeviceError> {
        if self.input.as_ref() == wanted {
            return Ok(());
        }

        self.detach_input(devices);

        let Some(id) = wanted else {
            return Ok(());
        };
        let Some(endpoint) = devices.input(id) else {
            warn!("Input device '{}' is not available", id);
            return Ok(());
        };

        endpoint
            .add_listener(self.key.clone(), self.listener.clone())
            .map_err(|source| DeviceError::Attach {
                device: id.clone(),
                source,
            })?;
        debug!("Attached to input '{}'", id);
        self.input = Some(id.clone());
        Ok(())
    }

    fn rebind_output(&mut self, wanted: Option<&DeviceId>, devices: &DeviceTable) -> Result<(), DeviceError> {
        if self.output.as_ref() == wanted {
            return Ok(());
        }

        self.close_output(devices);

        let Some(id) = wanted else {
            return Ok(());
        };
        let Some(endpoint) = devices.output(id) else {
            warn!("Output device '{}' is not available", id);
            return Ok(());
        };

        endpoint.open().map_err(|source| DeviceError::Open {
            device: id.clone(),
            source,
        })?;
        debug!("Opened output '{}'", id);
        self.output = Some(id.clone());
        Ok(())
    }

    fn detach_input(&mut self, devices: &DeviceTable) {
        if let Some(previous) = self.input.take() {
            match devices.input(&previous) {
                Some(endpoint) => {
                    endpoint.remove_listener(&self.key);
                    debug!("Detached from input '{}'", previous);
                }
                None => warn!("Input device '{}' vanished before detach", previous),
            }
        }
    }

    fn close_output(&mut self, devices: &DeviceTable) {
        if let Some(previous) = self.output.take() {
            match devices.output(&previous) {
                Some(endpoint) => {
                    endpoint.close();
                    debug!("Closed output '{}'", previous);
                }
                None => warn!("Output device '{}' vanished before close", previous),
            }
        }
    }
}
