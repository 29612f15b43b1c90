//! MIDI message types
//!
//! Decodes the channel-voice and SysEx messages a module cares about, encodes
//! outgoing ones, and names inbound messages for the value registry.

use std::fmt;

/// Note names for pitch classes, sharps only
const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Octave number given to middle C (note 60)
const MIDDLE_C_OCTAVE: i32 = 5;

/// MIDI message types
///
/// Channels are 0-15 on the wire; use [`MidiMessage::display_channel`] for the
/// 1-16 numbering shown to users and used in registry keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Polyphonic Key Pressure: channel (0-15), note (0-127), pressure (0-127)
    PolyPressure { channel: u8, note: u8, pressure: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },

    /// Channel Pressure: channel (0-15), pressure (0-127)
    ChannelPressure { channel: u8, pressure: u8 },

    /// Pitch Bend: channel (0-15), value (0-16383, 14-bit)
    PitchBend { channel: u8, value: u16 },

    /// System Exclusive payload, without the F0/F7 framing
    SysEx { data: Vec<u8> },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    ///
    /// Running status and system common/realtime messages are not decoded.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        if status == 0xF0 {
            let end = rest.iter().position(|&b| b == 0xF7)?;
            return Some(MidiMessage::SysEx { data: rest[..end].to_vec() });
        }
        if !(0x80..0xF0).contains(&status) {
            return None;
        }

        let channel = status & 0x0F;
        let d1 = rest.first().map(|b| b & 0x7F);
        let d2 = rest.get(1).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff { channel, note: d1?, velocity: d2? }),
            0x90 => {
                let (note, velocity) = (d1?, d2?);
                // Velocity 0 is a note off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note, velocity: 0 })
                } else {
                    Some(MidiMessage::NoteOn { channel, note, velocity })
                }
            }
            0xA0 => Some(MidiMessage::PolyPressure { channel, note: d1?, pressure: d2? }),
            0xB0 => Some(MidiMessage::ControlChange { channel, cc: d1?, value: d2? }),
            0xC0 => Some(MidiMessage::ProgramChange { channel, program: d1? }),
            0xD0 => Some(MidiMessage::ChannelPressure { channel, pressure: d1? }),
            0xE0 => {
                let value = ((d2? as u16) << 7) | d1? as u16;
                Some(MidiMessage::PitchBend { channel, value })
            }
            _ => None,
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                vec![0xA0 | (channel & 0x0F), note & 0x7F, pressure & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), program & 0x7F]
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                vec![0xD0 | (channel & 0x0F), pressure & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                let lsb = (value & 0x7F) as u8;
                let msb = ((value >> 7) & 0x7F) as u8;
                vec![0xE0 | (channel & 0x0F), lsb, msb]
            }
            MidiMessage::SysEx { ref data } => {
                let mut result = Vec::with_capacity(data.len() + 2);
                result.push(0xF0);
                result.extend_from_slice(data);
                result.push(0xF7);
                result
            }
        }
    }

    /// Wire channel (0-15), None for SysEx
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::PolyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => Some(channel),
            MidiMessage::SysEx { .. } => None,
        }
    }

    /// User-facing channel (1-16)
    pub fn display_channel(&self) -> Option<u8> {
        self.channel().map(|ch| ch + 1)
    }

    /// Registry identity of this message: (display channel, label, value)
    ///
    /// Notes are labelled by their name ("C5"), control changes by "CC" and
    /// the controller number. Other messages have no registry identity.
    pub fn registry_identity(&self) -> Option<(u8, String, u8)> {
        let channel = self.display_channel()?;
        match *self {
            MidiMessage::NoteOn { note, velocity, .. } | MidiMessage::NoteOff { note, velocity, .. } => {
                Some((channel, note_name(note), velocity))
            }
            MidiMessage::ControlChange { cc, value, .. } => Some((channel, format!("CC{}", cc), value)),
            _ => None,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "Note Off ch:{} {} v:{}", channel + 1, note_name(note), velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "Note On ch:{} {} v:{}", channel + 1, note_name(note), velocity)
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                write!(f, "PolyPressure ch:{} {} p:{}", channel + 1, note_name(note), pressure)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "Control Change ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel + 1, program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                write!(f, "ChannelPressure ch:{} p:{}", channel + 1, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel + 1, value)
            }
            MidiMessage::SysEx { ref data } => write!(f, "SysEx {} bytes", data.len()),
        }
    }
}

/// Name of a MIDI note, e.g. 60 -> "C5", 61 -> "C#5"
pub fn note_name(note: u8) -> String {
    let note = note & 0x7F;
    let octave = (note / 12) as i32 + MIDDLE_C_OCTAVE - 5;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_parsing() {
        let msg = MidiMessage::parse(&[0x90, 60, 100]).unwrap();
        assert_eq!(msg, MidiMessage::NoteOn { channel: 0, note: 60, velocity: 100 });
    }

    #[test]
    fn test_note_on_velocity_zero() {
        let msg = MidiMessage::parse(&[0x90, 60, 0]).unwrap();
        assert_eq!(msg, MidiMessage::NoteOff { channel: 0, note: 60, velocity: 0 });
    }

    #[test]
    fn test_control_change() {
        let msg = MidiMessage::parse(&[0xB2, 7, 100]).unwrap();
        assert_eq!(msg, MidiMessage::ControlChange { channel: 2, cc: 7, value: 100 });
    }

    #[test]
    fn test_truncated_messages() {
        assert_eq!(MidiMessage::parse(&[]), None);
        assert_eq!(MidiMessage::parse(&[0xB0, 7]), None);
        assert_eq!(MidiMessage::parse(&[0xF0, 0x01, 0x02]), None);
        assert_eq!(MidiMessage::parse(&[0xF8]), None);
    }

    #[test]
    fn test_pitch_bend() {
        let msg = MidiMessage::parse(&[0xE0, 0x00, 0x40]).unwrap();
        assert_eq!(msg, MidiMessage::PitchBend { channel: 0, value: 8192 });
    }

    #[test]
    fn test_sysex_framing() {
        let msg = MidiMessage::SysEx { data: vec![0x7E, 0x01] };
        assert_eq!(msg.encode(), vec![0xF0, 0x7E, 0x01, 0xF7]);
        assert_eq!(MidiMessage::parse(&msg.encode()), Some(msg));
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(60), "C5");
        assert_eq!(note_name(61), "C#5");
        assert_eq!(note_name(0), "C0");
        assert_eq!(note_name(127), "G10");
    }

    #[test]
    fn test_registry_identity() {
        let cc = MidiMessage::ControlChange { channel: 1, cc: 10, value: 64 };
        assert_eq!(cc.registry_identity(), Some((2, "CC10".to_string(), 64)));

        let note = MidiMessage::NoteOff { channel: 0, note: 62, velocity: 0 };
        assert_eq!(note.registry_identity(), Some((1, "D5".to_string(), 0)));

        let pb = MidiMessage::PitchBend { channel: 0, value: 0 };
        assert_eq!(pb.registry_identity(), None);
    }
}
