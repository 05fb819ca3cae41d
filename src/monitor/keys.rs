//! Held-keys state for the visual keyboard

use std::collections::BTreeMap;

use crate::midi::{Event, EventKind};

/// Last known velocity per note
///
/// A note released by a note-off stays present with velocity 0, so
/// "released" and "never played" remain distinguishable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyState {
    velocities: BTreeMap<u8, u8>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the state
    pub fn fold(mut self, event: &Event) -> Self {
        match event.kind {
            EventKind::NoteOn { note, velocity, .. } | EventKind::KeyPress { note, velocity, .. } => {
                self.velocities.insert(note, velocity);
            }
            EventKind::NoteOff { note, .. } => {
                self.velocities.insert(note, 0);
            }
            _ => {}
        }
        self
    }

    /// Velocity for a note, `None` if it was never played
    pub fn velocity(&self, note: u8) -> Option<u8> {
        self.velocities.get(&note).copied()
    }

    pub fn is_held(&self, note: u8) -> bool {
        self.velocity(note).is_some_and(|v| v > 0)
    }

    /// Notes currently sounding, ascending
    pub fn held(&self) -> impl Iterator<Item = u8> + '_ {
        self.velocities
            .iter()
            .filter(|(_, &v)| v > 0)
            .map(|(&note, _)| note)
    }

    pub fn known_notes(&self) -> usize {
        self.velocities.len()
    }
}
