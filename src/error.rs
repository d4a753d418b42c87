// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Domain errors for note decoding and note-set manipulation.

use thiserror::Error;

use crate::music::Note;

/// Errors raised by the note theory and event decoding layers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The transport delivered a pitch-class name outside the 12-note set
    #[error("invalid note name: {0:?}")]
    InvalidNoteName(String),

    /// A MIDI note number outside 0-127
    #[error("invalid MIDI note number: {0}")]
    InvalidNoteNumber(u8),

    /// Asked to rotate a note set to a base it does not contain
    #[error("base note {base} is not part of the note set")]
    InvalidBase { base: Note },
}

pub type Result<T> = std::result::Result<T, Error>;
