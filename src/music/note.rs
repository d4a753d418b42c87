// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pitch classes and the note-set utilities built on them.
//!
//! Notes are ordered canonically from A (`A, A#, B, C, ... G#`), which is the
//! order used for sorting, deduplication and presentation. MIDI note numbers
//! are C-based, so conversion from a note number goes through
//! [`Note::C_BASED`].

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};

/// MIDI note number type (0-127)
pub type MidiNumber = u8;

/// Note names (pitch classes), declared in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Note {
    A,
    #[serde(rename = "A#")]
    As,
    B,
    C,
    #[serde(rename = "C#")]
    Cs,
    D,
    #[serde(rename = "D#")]
    Ds,
    E,
    F,
    #[serde(rename = "F#")]
    Fs,
    G,
    #[serde(rename = "G#")]
    Gs,
}

impl Note {
    /// All notes in canonical order (starting from A)
    pub const ALL: [Note; 12] = [
        Note::A,
        Note::As,
        Note::B,
        Note::C,
        Note::Cs,
        Note::D,
        Note::Ds,
        Note::E,
        Note::F,
        Note::Fs,
        Note::G,
        Note::Gs,
    ];

    /// All notes in chromatic order starting from C (MIDI order)
    pub const C_BASED: [Note; 12] = [
        Note::C,
        Note::Cs,
        Note::D,
        Note::Ds,
        Note::E,
        Note::F,
        Note::Fs,
        Note::G,
        Note::Gs,
        Note::A,
        Note::As,
        Note::B,
    ];

    /// Canonical index (A = 0, G# = 11)
    pub fn index(self) -> usize {
        self as usize
    }

    /// Get note from a canonical index, wrapping modulo 12
    pub fn from_index(index: usize) -> Self {
        Note::ALL[index % 12]
    }

    /// Offset from C in semitones (C = 0, B = 11)
    pub fn offset_from_c(self) -> usize {
        (self.index() + 9) % 12
    }

    /// Pitch class of a MIDI note number (60 = middle C)
    pub fn from_midi_number(number: MidiNumber) -> Result<Self> {
        if number > 127 {
            return Err(Error::InvalidNoteNumber(number));
        }
        Ok(Note::C_BASED[(number % 12) as usize])
    }

    /// Transpose by semitones; negative intervals wrap downward
    pub fn transpose(self, interval: i32) -> Self {
        let index = (self.index() as i32 + interval).rem_euclid(12);
        Note::ALL[index as usize]
    }

    /// Canonical name ("A", "A#", ...)
    pub fn name(self) -> &'static str {
        match self {
            Note::A => "A",
            Note::As => "A#",
            Note::B => "B",
            Note::C => "C",
            Note::Cs => "C#",
            Note::D => "D",
            Note::Ds => "D#",
            Note::E => "E",
            Note::F => "F",
            Note::Fs => "F#",
            Note::G => "G",
            Note::Gs => "G#",
        }
    }

    /// Whether this pitch class is an accidental (a black key)
    pub fn is_sharp(self) -> bool {
        self.name().len() > 1
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Note {
    type Err = Error;

    /// Only the 12 canonical sharp names are accepted. Flats, lowercase
    /// and padded names are rejected rather than coerced.
    fn from_str(s: &str) -> Result<Self> {
        Note::ALL
            .iter()
            .copied()
            .find(|note| note.name() == s)
            .ok_or_else(|| Error::InvalidNoteName(s.to_string()))
    }
}

/// Transpose a note; free-function form of [`Note::transpose`]
pub fn transpose(note: Note, interval: i32) -> Note {
    note.transpose(interval)
}

/// Sort notes canonically and drop duplicates
pub fn order_and_dedupe(notes: &[Note]) -> Vec<Note> {
    let mut ordered = notes.to_vec();
    ordered.sort();
    ordered.dedup();
    ordered
}

/// Sort and dedupe, then rotate so that `base` comes first
pub fn rotate_to_base(notes: &[Note], base: Note) -> Result<Vec<Note>> {
    let mut ordered = order_and_dedupe(notes);
    let position = ordered
        .iter()
        .position(|&n| n == base)
        .ok_or(Error::InvalidBase { base })?;
    ordered.rotate_left(position);
    Ok(ordered)
}

/// Rotate using the first note of the (unsorted) input as base
pub fn reorder_from_first(notes: &[Note]) -> Result<Vec<Note>> {
    match notes.first() {
        Some(&base) => rotate_to_base(notes, base),
        None => Ok(Vec::new()),
    }
}

/// A value for each of the 12 pitch classes, indexed by [`Note`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteMap<T>([T; 12]);

impl<T: Copy> NoteMap<T> {
    /// Map with every pitch class set to `value`
    pub fn filled(value: T) -> Self {
        Self([value; 12])
    }
}

impl<T> NoteMap<T> {
    /// Iterate `(note, value)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Note, &T)> {
        Note::ALL.iter().copied().zip(self.0.iter())
    }

    /// Values projected to C-based order (C, C#, ..., B)
    pub fn c_based(&self) -> [&T; 12] {
        Note::C_BASED.map(|note| &self.0[note.index()])
    }
}

impl NoteMap<bool> {
    /// Notes whose flag is set, in canonical order
    pub fn set_notes(&self) -> Vec<Note> {
        self.iter().filter(|(_, &set)| set).map(|(note, _)| note).collect()
    }
}

impl<T: Copy + Default> Default for NoteMap<T> {
    fn default() -> Self {
        Self([T::default(); 12])
    }
}

impl<T> Index<Note> for NoteMap<T> {
    type Output = T;

    fn index(&self, note: Note) -> &T {
        &self.0[note.index()]
    }
}

impl<T> IndexMut<Note> for NoteMap<T> {
    fn index_mut(&mut self, note: Note) -> &mut T {
        &mut self.0[note.index()]
    }
}
