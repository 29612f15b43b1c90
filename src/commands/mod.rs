//! Command definitions
//!
//! [`MidiCommand`] covers the outgoing messages a MIDI module offers (note on,
//! note off, full note, control change, sysex). [`custom_osc::CustomOscCommand`]
//! is an OSC message with a user-defined argument list.

pub mod custom_osc;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use custom_osc::{CustomOscCommand, OscArg, OscMessage};

fn default_channel() -> u8 {
    1
}

fn default_velocity() -> u8 {
    127
}

/// Outgoing MIDI command
///
/// Channels are 1-16, as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MidiCommand {
    NoteOn {
        #[serde(default = "default_channel")]
        channel: u8,
        pitch: u8,
        #[serde(default = "default_velocity")]
        velocity: u8,
    },
    NoteOff {
        #[serde(default = "default_channel")]
        channel: u8,
        pitch: u8,
    },
    /// Note on immediately followed by note off
    FullNote {
        #[serde(default = "default_channel")]
        channel: u8,
        pitch: u8,
        #[serde(default = "default_velocity")]
        velocity: u8,
    },
    ControlChange {
        #[serde(default = "default_channel")]
        channel: u8,
        number: u8,
        value: u8,
    },
    /// Payload without the F0/F7 framing
    #[serde(rename = "sysex")]
    SysEx { data: Vec<u8> },
}

impl MidiCommand {
    /// Display channel, None for SysEx
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiCommand::NoteOn { channel, .. }
            | MidiCommand::NoteOff { channel, .. }
            | MidiCommand::FullNote { channel, .. }
            | MidiCommand::ControlChange { channel, .. } => Some(channel),
            MidiCommand::SysEx { .. } => None,
        }
    }
}

impl fmt::Display for MidiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiCommand::NoteOn { channel, pitch, velocity } => {
                write!(f, "Note On ch:{} {} v:{}", channel, pitch, velocity)
            }
            MidiCommand::NoteOff { channel, pitch } => write!(f, "Note Off ch:{} {}", channel, pitch),
            MidiCommand::FullNote { channel, pitch, velocity } => {
                write!(f, "Full Note ch:{} {} v:{}", channel, pitch, velocity)
            }
            MidiCommand::ControlChange { channel, number, value } => {
                write!(f, "Controller Change ch:{} cc:{} v:{}", channel, number, value)
            }
            MidiCommand::SysEx { data } => write!(f, "Sysex {} bytes", data.len()),
        }
    }
}
