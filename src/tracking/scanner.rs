// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Recently played notes, limited to a configurable count.

use crate::midi::KeyboardEvent;
use crate::music::{order_and_dedupe, Note, NoteMap};
use crate::timing::TimestampMs;

/// Notes kept when no limit is configured
pub const DEFAULT_MAXIMUM_NOTES: usize = 7;

/// Keeps the time each pitch class was last pressed and derives the set of
/// the most recent ones.
#[derive(Debug, Clone)]
pub struct RecencyScanner {
    stamps: NoteMap<Option<TimestampMs>>,
    maximum_notes: usize,
    last_emitted: Vec<Note>,
}

impl RecencyScanner {
    pub fn new(maximum_notes: usize) -> Self {
        Self {
            stamps: NoteMap::default(),
            maximum_notes,
            last_emitted: Vec::new(),
        }
    }

    /// Record a press of `note` at `now`
    pub fn stamp(&mut self, note: Note, now: TimestampMs) {
        self.stamps[note] = Some(now);
    }

    /// Stamp note-on events; other events leave the stamps alone
    pub fn apply(&mut self, event: &KeyboardEvent) -> bool {
        match event {
            KeyboardEvent::NoteOn(midi) => {
                self.stamp(midi.note, midi.time);
                true
            }
            _ => false,
        }
    }

    pub fn set_maximum_notes(&mut self, maximum_notes: usize) {
        self.maximum_notes = maximum_notes;
    }

    pub fn maximum_notes(&self) -> usize {
        self.maximum_notes
    }

    /// When `note` was last pressed, if ever
    pub fn last_pressed(&self, note: Note) -> Option<TimestampMs> {
        self.stamps[note]
    }

    /// The most recent `maximum_notes` pitch classes, in canonical order
    pub fn scanned(&self) -> Vec<Note> {
        let mut stamped: Vec<(Note, TimestampMs)> = self
            .stamps
            .iter()
            .filter_map(|(note, stamp)| stamp.map(|time| (note, time)))
            .collect();

        // Stable: equal stamps keep canonical order
        stamped.sort_by(|a, b| b.1.cmp(&a.1));
        stamped.truncate(self.maximum_notes);

        let recent: Vec<Note> = stamped.into_iter().map(|(note, _)| note).collect();
        order_and_dedupe(&recent)
    }

    /// Recompute the scanned set; `Some` only when it differs from the last
    /// one returned
    pub fn refresh(&mut self) -> Option<Vec<Note>> {
        let scanned = self.scanned();
        if scanned == self.last_emitted {
            return None;
        }
        self.last_emitted = scanned.clone();
        Some(scanned)
    }
}

impl Default for RecencyScanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAXIMUM_NOTES)
    }
}
