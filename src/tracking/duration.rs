// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Cumulative held time per pitch class.
//!
//! Held notes are tracked per MIDI number, so two octaves of one pitch class
//! accumulate independently into the same total. A periodic tick credits
//! every held note up to the tick time and moves its baseline forward, which
//! keeps totals live while keys stay down.

use tracing::{debug, trace};

use crate::midi::KeyboardEvent;
use crate::music::{MidiNumber, Note, NoteMap};
use crate::timing::TimestampMs;

/// Accumulated milliseconds for every pitch class
pub type DurationMap = NoteMap<u64>;

const MIDI_NUMBERS: usize = 128;

#[derive(Debug, Clone)]
pub struct DurationAccumulator {
    /// Baseline of each held note; `None` when released
    held: [Option<TimestampMs>; MIDI_NUMBERS],
    totals: DurationMap,
}

impl DurationAccumulator {
    pub fn new() -> Self {
        Self {
            held: [None; MIDI_NUMBERS],
            totals: DurationMap::default(),
        }
    }

    /// Start holding `number` at `time`. A press of a held note is ignored.
    pub fn note_on(&mut self, number: MidiNumber, time: TimestampMs) -> bool {
        let Some(slot) = self.held.get_mut(number as usize) else {
            trace!(number, "note on out of MIDI range");
            return false;
        };
        if slot.is_some() {
            trace!(number, "note on for a note already held");
            return false;
        }
        *slot = Some(time);
        true
    }

    /// Release `number` at `time`, crediting the time since its baseline.
    /// A release without a matching press changes nothing.
    pub fn note_off(&mut self, number: MidiNumber, time: TimestampMs) -> bool {
        let Some(since) = self.held.get_mut(number as usize).and_then(Option::take) else {
            trace!(number, "note off without matching note on");
            return false;
        };
        let Ok(note) = Note::from_midi_number(number) else {
            return false;
        };
        self.totals[note] += time.saturating_sub(since);
        true
    }

    /// Credit every held note up to `time`; returns whether anything is held
    pub fn tick(&mut self, time: TimestampMs) -> bool {
        let mut credited = false;
        for (number, slot) in self.held.iter_mut().enumerate() {
            let Some(since) = *slot else { continue };
            let Ok(note) = Note::from_midi_number(number as MidiNumber) else {
                continue;
            };
            // A tick older than the baseline credits nothing
            self.totals[note] += time.saturating_sub(since);
            *slot = Some(since.max(time));
            credited = true;
        }
        credited
    }

    /// Forget held notes and zero the totals
    pub fn reset(&mut self) -> bool {
        debug!("duration totals reset");
        *self = Self::new();
        true
    }

    /// Apply a note event; connection events are ignored
    pub fn apply(&mut self, event: &KeyboardEvent) -> bool {
        match event {
            KeyboardEvent::NoteOn(midi) => self.note_on(midi.number, midi.time),
            KeyboardEvent::NoteOff(midi) => self.note_off(midi.number, midi.time),
            KeyboardEvent::Connected(_) | KeyboardEvent::Disconnected(_) => false,
        }
    }

    pub fn totals(&self) -> &DurationMap {
        &self.totals
    }

    pub fn is_held(&self, number: MidiNumber) -> bool {
        matches!(self.held.get(number as usize), Some(Some(_)))
    }

    pub fn held_count(&self) -> usize {
        self.held.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Default for DurationAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
