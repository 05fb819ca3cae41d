//! MIDI frame decoding
//!
//! Turns raw frames received on a monitor channel into typed events.

pub mod cc_names;

use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{Error, Result};

pub use cc_names::cc_name;

/// Minimum number of bytes the monitor channel guarantees per frame
pub const FRAME_LEN: usize = 3;

/// Decoded MIDI message, one payload shape per message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum EventKind {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Synthetic key press, folded like a note on. Never produced by `decode`.
    KeyPress { channel: u8, note: u8, velocity: u8 },

    /// Polyphonic aftertouch: channel, note, pressure value
    Aftertouch { channel: u8, note: u8, value: u8 },

    /// Control Change with its General MIDI name when known
    Controller {
        channel: u8,
        cc: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<&'static str>,
        value: u8,
    },

    /// Program Change: channel, program number
    ProgramChange { channel: u8, value: u8 },

    /// Pitch Bend: channel, 14-bit value (0-16383)
    PitchBend { channel: u8, value: u16 },

    /// Anything else, kept for diagnostics
    Unknown {
        #[serde(serialize_with = "serialize_hex")]
        raw: [u8; 3],
    },
}

impl EventKind {
    /// Type tag, as used on the wire and in listings
    pub fn tag(&self) -> &'static str {
        match self {
            EventKind::NoteOff { .. } => "note-off",
            EventKind::NoteOn { .. } => "note-on",
            EventKind::KeyPress { .. } => "key-press",
            EventKind::Aftertouch { .. } => "aftertouch",
            EventKind::Controller { .. } => "controller",
            EventKind::ProgramChange { .. } => "program-change",
            EventKind::PitchBend { .. } => "pitch-bend",
            EventKind::Unknown { .. } => "unknown",
        }
    }

    /// MIDI channel (0-15) for channel messages
    pub fn channel(&self) -> Option<u8> {
        match *self {
            EventKind::NoteOff { channel, .. }
            | EventKind::NoteOn { channel, .. }
            | EventKind::KeyPress { channel, .. }
            | EventKind::Aftertouch { channel, .. }
            | EventKind::Controller { channel, .. }
            | EventKind::ProgramChange { channel, .. }
            | EventKind::PitchBend { channel, .. } => Some(channel),
            EventKind::Unknown { .. } => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EventKind::NoteOff { channel, note, velocity }
            | EventKind::NoteOn { channel, note, velocity }
            | EventKind::KeyPress { channel, note, velocity } => {
                write!(f, "channel:{} note:{} velocity:{}", channel, note, velocity)
            }
            EventKind::Aftertouch { channel, note, value } => {
                write!(f, "channel:{} note:{} value:{}", channel, note, value)
            }
            EventKind::Controller { channel, cc, name, value } => {
                write!(f, "channel:{} cc:{} value:{}", channel, cc, value)?;
                if let Some(name) = name {
                    write!(f, " {}", name)?;
                }
                Ok(())
            }
            EventKind::ProgramChange { channel, value } => {
                write!(f, "channel:{} value:{}", channel, value)
            }
            EventKind::PitchBend { channel, value } => {
                write!(f, "channel:{} value:{}", channel, value)
            }
            EventKind::Unknown { raw } => write!(f, "raw:{}", format_hex(&raw)),
        }
    }
}

/// A decoded message with its log identifier
///
/// `id` is `Event::UNASSIGNED` until the event log numbers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub const UNASSIGNED: u64 = 0;

    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Self::UNASSIGNED,
            kind,
        }
    }
}

/// Decode one frame from the monitor channel
///
/// The high nibble of the status byte selects the message type and the low
/// nibble is the channel. Bytes past the third are ignored. Frames shorter
/// than three bytes break the channel contract and are rejected.
pub fn decode(frame: &[u8]) -> Result<Event> {
    if frame.len() < FRAME_LEN {
        return Err(Error::MalformedFrame {
            len: frame.len(),
            hex: format_hex(frame),
        });
    }

    let (status, d1, d2) = (frame[0], frame[1], frame[2]);
    let channel = status & 0x0F;

    let kind = match status & 0xF0 {
        0x80 => EventKind::NoteOff {
            channel,
            note: d1,
            velocity: d2,
        },
        0x90 => EventKind::NoteOn {
            channel,
            note: d1,
            velocity: d2,
        },
        0xA0 => EventKind::Aftertouch {
            channel,
            note: d1,
            value: d2,
        },
        0xB0 => EventKind::Controller {
            channel,
            cc: d1,
            name: cc_name(d1),
            value: d2,
        },
        0xC0 => EventKind::ProgramChange { channel, value: d1 },
        // LSB first, then MSB
        0xE0 => EventKind::PitchBend {
            channel,
            value: d2 as u16 * 128 + d1 as u16,
        },
        _ => EventKind::Unknown {
            raw: [status, d1, d2],
        },
    };

    Ok(Event::new(kind))
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn serialize_hex<S: Serializer>(raw: &[u8; 3], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_note_on_parsing() {
        let event = decode(&[0x92, 60, 100]).unwrap();

        assert_eq!(event.id, Event::UNASSIGNED);
        assert_eq!(
            event.kind,
            EventKind::NoteOn {
                channel: 2,
                note: 60,
                velocity: 100,
            }
        );
    }

    #[test]
    fn test_note_on_velocity_zero_stays_note_on() {
        let event = decode(&[0x90, 60, 0]).unwrap();
        assert_eq!(event.kind.tag(), "note-on");
    }

    #[test]
    fn test_control_change_named() {
        let event = decode(&[0xB0, 1, 127]).unwrap();

        assert_eq!(
            event.kind,
            EventKind::Controller {
                channel: 0,
                cc: 1,
                name: Some("Modulation"),
                value: 127,
            }
        );
    }

    #[test]
    fn test_control_change_unnamed() {
        let event = decode(&[0xB3, 20, 5]).unwrap();
        assert!(matches!(
            event.kind,
            EventKind::Controller { channel: 3, cc: 20, name: None, value: 5 }
        ));
    }

    #[test]
    fn test_pitch_bend() {
        let event = decode(&[0xE0, 0, 1]).unwrap();
        assert_eq!(event.kind, EventKind::PitchBend { channel: 0, value: 128 });

        let center = decode(&[0xE5, 0x00, 0x40]).unwrap();
        assert_eq!(center.kind, EventKind::PitchBend { channel: 5, value: 8192 });
    }

    #[test]
    fn test_program_change_uses_first_data_byte() {
        let event = decode(&[0xC9, 12, 99]).unwrap();
        assert_eq!(event.kind, EventKind::ProgramChange { channel: 9, value: 12 });
    }

    #[test]
    fn test_unknown_keeps_raw_bytes() {
        let event = decode(&[0xF8, 0x01, 0x02]).unwrap();
        assert_eq!(event.kind, EventKind::Unknown { raw: [0xF8, 0x01, 0x02] });
        assert_eq!(event.kind.channel(), None);
    }

    #[test]
    fn test_short_frame_is_rejected() {
        let err = decode(&[0x90, 60]).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { len: 2, .. }));
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_extra_bytes_are_ignored() {
        let event = decode(&[0x80, 61, 10, 0xFF]).unwrap();
        assert_eq!(
            event.kind,
            EventKind::NoteOff { channel: 0, note: 61, velocity: 10 }
        );
    }

    #[test]
    fn test_serialized_shape() {
        let mut event = decode(&[0x92, 60, 100]).unwrap();
        event.id = 7;
        assert_eq!(
            serde_json::to_value(event).unwrap(),
            json!({
                "id": 7,
                "type": "note-on",
                "data": {"channel": 2, "note": 60, "velocity": 100}
            })
        );

        let unknown = decode(&[0xF0, 0x7E, 0x0A]).unwrap();
        assert_eq!(
            serde_json::to_value(unknown).unwrap(),
            json!({"id": 0, "type": "unknown", "data": {"raw": "f07e0a"}})
        );
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x90, 0x3C, 0x64]), "90 3C 64");
    }

    proptest! {
        #[test]
        fn decode_is_total_over_three_byte_frames(status: u8, d1: u8, d2: u8) {
            let event = decode(&[status, d1, d2]).unwrap();
            let channel = status & 0x0F;

            match status >> 4 {
                0x8 => prop_assert_eq!(event.kind, EventKind::NoteOff { channel, note: d1, velocity: d2 }),
                0x9 => prop_assert_eq!(event.kind, EventKind::NoteOn { channel, note: d1, velocity: d2 }),
                0xA => prop_assert_eq!(event.kind, EventKind::Aftertouch { channel, note: d1, value: d2 }),
                0xB => prop_assert_eq!(event.kind, EventKind::Controller { channel, cc: d1, name: cc_name(d1), value: d2 }),
                0xC => prop_assert_eq!(event.kind, EventKind::ProgramChange { channel, value: d1 }),
                0xE => prop_assert_eq!(event.kind, EventKind::PitchBend { channel, value: d2 as u16 * 128 + d1 as u16 }),
                _ => prop_assert_eq!(event.kind, EventKind::Unknown { raw: [status, d1, d2] }),
            }
        }
    }
}
