//! Error types for the module core
//!
//! None of these are fatal: they are returned to the caller, which decides
//! whether to skip the item or abort the surrounding load.

use thiserror::Error;

use crate::devices::DeviceId;

/// Failures while creating items from a type tag or a serialized record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// The requested type tag is not one the factory knows
    #[error("unresolved value type '{0}'")]
    UnresolvedType(String),

    /// The serialized record has no (or an empty) "type" field
    #[error("serialized item has no 'type' field")]
    MissingTypeField,
}

/// Failures reported by an endpoint (port) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("MIDI backend init failed: {0}")]
    Init(String),

    #[error("MIDI port '{0}' not found")]
    PortNotFound(String),

    #[error("MIDI connect failed: {0}")]
    Connect(String),

    #[error("MIDI send failed: {0}")]
    Send(String),

    #[error("MIDI port '{0}' is not open")]
    NotOpen(String),
}

/// Failures while rebinding a device selector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("failed to attach input '{device}': {source}")]
    Attach {
        device: DeviceId,
        #[source]
        source: EndpointError,
    },

    #[error("failed to open output '{device}': {source}")]
    Open {
        device: DeviceId,
        #[source]
        source: EndpointError,
    },
}
