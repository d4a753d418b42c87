// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Music theory utilities.
//!
//! This module provides the 12-note pitch-class model, note-set ordering
//! helpers and the catalog of tonal scales.

pub mod note;
pub mod scale;

pub use note::{
    order_and_dedupe, reorder_from_first, rotate_to_base, transpose, MidiNumber, Note, NoteMap,
};
pub use scale::{Scale, ScaleCatalog, ScaleDefinition};
