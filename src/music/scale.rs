// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Scale definitions and the catalog of concrete scales.
//!
//! A [`ScaleDefinition`] is a step structure (semitones between successive
//! degrees). Applying one to each of the 12 roots yields the concrete
//! [`Scale`]s held by the [`ScaleCatalog`].

use std::fmt;

use lazy_static::lazy_static;

use super::note::{rotate_to_base, Note};
use crate::error::Result;

/// A scale structure (e.g. `major`) as steps in semitones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleDefinition {
    /// Name of the structure
    pub name: String,
    /// Successive intervals in semitones
    pub structure: Vec<i32>,
}

impl ScaleDefinition {
    pub fn new(name: &str, structure: &[i32]) -> Self {
        Self {
            name: name.to_string(),
            structure: structure.to_vec(),
        }
    }

    pub fn major() -> Self {
        Self::new("major", &[2, 2, 1, 2, 2, 2, 1])
    }

    /// Natural minor
    pub fn minor() -> Self {
        Self::new("minor", &[2, 1, 2, 2, 1, 2, 2])
    }

    pub fn melodic_minor() -> Self {
        Self::new("melodic minor", &[2, 1, 2, 2, 2, 2, 1])
    }

    pub fn harmonic_minor() -> Self {
        Self::new("harmonic minor", &[2, 1, 2, 2, 1, 3, 1])
    }

    /// The four tonal definitions of the standard catalog
    pub fn tonal() -> Vec<Self> {
        vec![
            Self::major(),
            Self::minor(),
            Self::melodic_minor(),
            Self::harmonic_minor(),
        ]
    }
}

/// A concrete scale, e.g. `C major`; the root is always first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scale {
    name: String,
    root: Note,
    notes: Vec<Note>,
}

impl Scale {
    /// Build a scale by walking the definition's steps from `root`
    pub fn new(root: Note, definition: &ScaleDefinition) -> Result<Self> {
        let mut walked = Vec::with_capacity(definition.structure.len() + 1);
        walked.push(root);
        for &interval in &definition.structure {
            let last = walked[walked.len() - 1];
            walked.push(last.transpose(interval));
        }

        Ok(Self {
            name: format!("{} {}", root, definition.name),
            root,
            notes: rotate_to_base(&walked, root)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Note {
        self.root
    }

    /// Notes in scale order, root first, without duplicates
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn contains(&self, note: Note) -> bool {
        self.notes.contains(&note)
    }

    /// Check that every given note belongs to this scale
    pub fn contains_all(&self, notes: &[Note]) -> bool {
        notes.iter().all(|&n| self.contains(n))
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

lazy_static! {
    static ref STANDARD_CATALOG: ScaleCatalog = ScaleCatalog::build(&ScaleDefinition::tonal())
        .expect("tonal definitions always contain their own root");
}

/// Read-only collection of scales for every (root, definition) pair
#[derive(Debug, Clone, Default)]
pub struct ScaleCatalog {
    scales: Vec<Scale>,
}

impl ScaleCatalog {
    /// Build scales for all 12 roots of each definition, definition-major
    pub fn build(definitions: &[ScaleDefinition]) -> Result<Self> {
        let mut scales = Vec::with_capacity(definitions.len() * 12);
        for definition in definitions {
            for root in Note::ALL {
                scales.push(Scale::new(root, definition)?);
            }
        }
        Ok(Self { scales })
    }

    /// The catalog of major, minor, melodic minor and harmonic minor scales
    pub fn standard() -> &'static ScaleCatalog {
        &STANDARD_CATALOG
    }

    pub fn all(&self) -> &[Scale] {
        &self.scales
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    /// Look up a scale by its full name (e.g. "F# harmonic minor")
    pub fn by_name(&self, name: &str) -> Option<&Scale> {
        self.scales.iter().find(|s| s.name() == name)
    }

    pub fn for_root(&self, root: Note) -> impl Iterator<Item = &Scale> {
        self.scales.iter().filter(move |s| s.root() == root)
    }

    /// Scales containing every one of `notes`; an empty set matches all
    pub fn consistent_with<'a>(&'a self, notes: &'a [Note]) -> impl Iterator<Item = &'a Scale> {
        self.scales.iter().filter(move |s| s.contains_all(notes))
    }
}
