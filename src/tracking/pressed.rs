// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Live map of pressed pitch classes.

use tracing::trace;

use crate::midi::KeyboardEvent;
use crate::music::{Note, NoteMap};

/// Pressed state for every pitch class
pub type PressedNotesMap = NoteMap<bool>;

/// Tracks which pitch classes are held, at pitch-class granularity.
///
/// Releasing any octave of a pitch class clears it, even if another octave
/// of the same class is still down.
#[derive(Debug, Clone, Default)]
pub struct PressedNotesTracker {
    pressed: PressedNotesMap,
}

impl PressedNotesTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_on(&mut self, note: Note) {
        self.pressed[note] = true;
    }

    pub fn note_off(&mut self, note: Note) {
        self.pressed[note] = false;
    }

    /// Apply a keyboard event; returns whether it was a note event
    pub fn apply(&mut self, event: &KeyboardEvent) -> bool {
        match event {
            KeyboardEvent::NoteOn(midi) => {
                self.note_on(midi.note);
                true
            }
            KeyboardEvent::NoteOff(midi) => {
                self.note_off(midi.note);
                true
            }
            KeyboardEvent::Connected(_) | KeyboardEvent::Disconnected(_) => {
                trace!("pressed tracker ignores connection event");
                false
            }
        }
    }

    pub fn pressed(&self) -> &PressedNotesMap {
        &self.pressed
    }

    pub fn is_pressed(&self, note: Note) -> bool {
        self.pressed[note]
    }

    /// Pressed notes in canonical order
    pub fn pressed_notes(&self) -> Vec<Note> {
        self.pressed.set_notes()
    }
}
