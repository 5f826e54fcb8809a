// SPDX-License-Identifier: MIT OR Apache-2.0
//! MIDI messages exchanged between modules and the transport.
//!
//! The engine never talks to hardware: inbound events are handed to
//! [`crate::Patch::receive_midi`] by the host, and outbound control changes
//! queued by modules are drained once per frame into a [`MidiSink`].

use serde::{Deserialize, Serialize};

/// A control change message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlChange {
    /// MIDI channel (1-16)
    pub channel: u8,
    /// Controller number (0-127)
    pub control: u8,
    /// Controller value (0-127)
    pub value: u8,
}

impl ControlChange {
    /// Create a control change, clamping every field into range
    pub fn new(channel: u8, control: u8, value: u8) -> Self {
        Self {
            channel: channel.clamp(1, 16),
            control: control.min(127),
            value: value.min(127),
        }
    }

    /// Encode as a raw three-byte MIDI message
    pub fn to_bytes(self) -> [u8; 3] {
        [0xB0 | (self.channel - 1), self.control, self.value]
    }

    /// Value normalised to `0.0..=1.0`
    pub fn normalized(self) -> f32 {
        f32::from(self.value) / 127.0
    }
}

/// Inbound MIDI event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    /// Note On event
    NoteOn {
        /// MIDI channel (1-16)
        channel: u8,
        /// Note number (0-127)
        pitch: u8,
        /// Velocity (1-127)
        velocity: u8,
    },
    /// Note Off event
    NoteOff {
        /// MIDI channel (1-16)
        channel: u8,
        /// Note number (0-127)
        pitch: u8,
    },
    /// Control Change event
    ControlChange(ControlChange),
}

impl MidiEvent {
    /// Parse a MIDI event from raw bytes.
    /// Returns None for unsupported or malformed messages.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let &[status, first, second, ..] = data else {
            return None;
        };
        let channel = (status & 0x0F) + 1;

        match status & 0xF0 {
            // Note On with velocity 0 is a Note Off
            0x90 if second & 0x7F == 0 => Some(Self::NoteOff {
                channel,
                pitch: first & 0x7F,
            }),
            0x90 => Some(Self::NoteOn {
                channel,
                pitch: first & 0x7F,
                velocity: second & 0x7F,
            }),
            0x80 => Some(Self::NoteOff {
                channel,
                pitch: first & 0x7F,
            }),
            0xB0 => Some(Self::ControlChange(ControlChange::new(
                channel,
                first & 0x7F,
                second & 0x7F,
            ))),
            _ => None,
        }
    }

    /// Get the MIDI channel for this event
    pub fn channel(&self) -> u8 {
        match self {
            Self::NoteOn { channel, .. } | Self::NoteOff { channel, .. } => *channel,
            Self::ControlChange(cc) => cc.channel,
        }
    }

    /// Mapping key `"channel/number"` used by MIDI learn
    pub fn mapping(&self) -> String {
        match self {
            Self::NoteOn { channel, pitch, .. } | Self::NoteOff { channel, pitch } => {
                format!("{channel}/{pitch}")
            }
            Self::ControlChange(cc) => format!("{}/{}", cc.channel, cc.control),
        }
    }
}

/// Role implemented by modules that react to inbound MIDI
pub trait MidiListener {
    /// Handle one inbound event
    fn receive_midi(&mut self, event: &MidiEvent);
}

/// Error reported by an outbound transport
#[derive(Debug, thiserror::Error)]
#[error("MIDI transport error: {0}")]
pub struct MidiSinkError(pub String);

/// Outbound MIDI transport
pub trait MidiSink {
    /// Forward one control change verbatim
    fn send_control_change(&mut self, message: ControlChange) -> Result<(), MidiSinkError>;
}
