// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Krumhansl-Schmuckler key finding.
//!
//! Held durations per pitch class are correlated against 24 key profiles
//! (12 major, 12 minor). Each profile is the Krumhansl-Kessler probe-tone
//! template rotated to its tonic. Templates and samples are laid out in
//! C-based order (`C, C#, ..., B`).
//!
//! See <http://rnhart.net/articles/key-finding/>.

use std::fmt;

use lazy_static::lazy_static;
use tracing::{debug, warn};

use super::correlation::pearson_slices;
use crate::music::{Note, NoteMap};

/// Major probe-tone ratings, tonic first
pub const MAJOR_TEMPLATE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Minor probe-tone ratings, tonic first
pub const MINOR_TEMPLATE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Key mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reference profile for one (tonic, mode) pair
#[derive(Debug, Clone, PartialEq)]
pub struct KeyProfile {
    pub tonic: Note,
    pub mode: Mode,
    /// 12 weights in C-based order
    pub template: [f64; 12],
}

impl KeyProfile {
    /// Rotate the tonic-first template so the tonic lands on its C-based slot
    pub fn new(tonic: Note, mode: Mode) -> Self {
        let base = match mode {
            Mode::Major => &MAJOR_TEMPLATE,
            Mode::Minor => &MINOR_TEMPLATE,
        };
        let offset = tonic.offset_from_c();
        let mut template = [0.0; 12];
        for (i, weight) in template.iter_mut().enumerate() {
            *weight = base[(i + 12 - offset) % 12];
        }
        Self {
            tonic,
            mode,
            template,
        }
    }

    /// Correlation of this profile against a C-based sample vector
    pub fn score(&self, sample: &[f64; 12]) -> f64 {
        pearson_slices(&self.template, sample)
    }
}

lazy_static! {
    static ref KEY_PROFILES: Vec<KeyProfile> = [Mode::Major, Mode::Minor]
        .iter()
        .flat_map(|&mode| Note::ALL.iter().map(move |&tonic| KeyProfile::new(tonic, mode)))
        .collect();
}

/// All 24 profiles: majors then minors, tonics in canonical order
pub fn key_profiles() -> &'static [KeyProfile] {
    &KEY_PROFILES
}

/// Best-matching key and its correlation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEstimate {
    pub tonic: Note,
    pub mode: Mode,
    pub score: f64,
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

/// Display name for an estimate, `"?"` when no key was determined
pub fn display_key(estimate: Option<&KeyEstimate>) -> String {
    match estimate {
        Some(key) => key.to_string(),
        None => "?".to_string(),
    }
}

/// Project held durations to a C-based sample vector
pub fn duration_sample(durations: &NoteMap<u64>) -> [f64; 12] {
    durations.c_based().map(|&ms| ms as f64)
}

/// Classify cumulative durations into the most likely key.
///
/// A score of exactly zero carries no information and never replaces the
/// running best. Returns `None` when no profile scores above zero, which
/// includes the all-zero map.
pub fn classify(durations: &NoteMap<u64>) -> Option<KeyEstimate> {
    let sample = duration_sample(durations);
    let (best, skipped) = best_profile(&sample);

    if skipped > 0 {
        if sample.iter().all(|&ms| ms == 0.0) {
            debug!("no held durations, key undetermined");
        } else {
            warn!(skipped, "zero correlation, profiles skipped");
        }
    }

    best
}

/// Best positive-scoring profile and the number of zero scores skipped
fn best_profile(sample: &[f64; 12]) -> (Option<KeyEstimate>, usize) {
    let mut best: Option<KeyEstimate> = None;
    let mut skipped = 0;

    for profile in key_profiles() {
        let score = profile.score(sample);

        if score == 0.0 {
            skipped += 1;
            continue;
        }

        let improves = match best {
            Some(current) => score > current.score,
            None => score > 0.0,
        };
        if improves {
            best = Some(KeyEstimate {
                tonic: profile.tonic,
                mode: profile.mode,
                score,
            });
        }
    }

    (best, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn durations(entries: &[(Note, u64)]) -> NoteMap<u64> {
        let mut map = NoteMap::filled(0);
        for &(note, ms) in entries {
            map[note] = ms;
        }
        map
    }

    #[test]
    fn test_profile_count_and_order() {
        let profiles = key_profiles();
        assert_eq!(profiles.len(), 24);
        assert_eq!(profiles[0].tonic, Note::A);
        assert_eq!(profiles[0].mode, Mode::Major);
        assert_eq!(profiles[12].tonic, Note::A);
        assert_eq!(profiles[12].mode, Mode::Minor);
    }

    #[test]
    fn test_profile_rotation_aligns_tonic() {
        let c_major = KeyProfile::new(Note::C, Mode::Major);
        assert_eq!(c_major.template, MAJOR_TEMPLATE);

        let g_major = KeyProfile::new(Note::G, Mode::Major);
        assert_eq!(g_major.template[7], 6.35);
        assert_eq!(g_major.template[2], 5.19); // D is the dominant of G

        let a_minor = KeyProfile::new(Note::A, Mode::Minor);
        assert_eq!(a_minor.template[9], 6.33);
        assert_eq!(a_minor.template[0], 5.38); // C is the minor third of A
    }

    #[test]
    fn test_zero_scores_are_counted_once_per_classification() {
        let (best, skipped) = best_profile(&[0.0; 12]);
        assert_eq!(best, None);
        assert_eq!(skipped, 24);

        // Constant durations have no variance and match nothing
        let (best, skipped) = best_profile(&[100.0; 12]);
        assert_eq!(best, None);
        assert_eq!(skipped, 24);

        let (best, skipped) = best_profile(&MAJOR_TEMPLATE);
        assert_eq!(best.map(|key| (key.tonic, key.mode)), Some((Note::C, Mode::Major)));
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_all_zero_is_undetermined() {
        assert_eq!(classify(&NoteMap::filled(0)), None);
        assert_eq!(display_key(None), "?");
    }

    #[test]
    fn test_uniform_durations_are_undetermined() {
        assert_eq!(classify(&NoteMap::filled(250)), None);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let map = durations(&[(Note::D, 400), (Note::Fs, 900), (Note::A, 120)]);
        let first = classify(&map);
        for _ in 0..10 {
            assert_eq!(classify(&map), first);
        }
    }

    #[test]
    fn test_c_major_scale_with_tonic_emphasis() {
        let map = durations(&[
            (Note::C, 2000),
            (Note::D, 1000),
            (Note::E, 1000),
            (Note::F, 1000),
            (Note::G, 1500),
            (Note::A, 1000),
            (Note::B, 1000),
        ]);
        let key = classify(&map).unwrap();
        assert_eq!((key.tonic, key.mode), (Note::C, Mode::Major));
        assert_eq!(key.to_string(), "C major");
        assert!(key.score > 0.9);
    }

    #[test]
    fn test_a_minor_triad() {
        let map = durations(&[(Note::A, 2000), (Note::C, 1000), (Note::E, 1500)]);
        let key = classify(&map).unwrap();
        assert_eq!((key.tonic, key.mode), (Note::A, Mode::Minor));
    }

    #[test]
    fn test_d_major_triad() {
        let map = durations(&[(Note::D, 1000), (Note::Fs, 1000), (Note::A, 1000)]);
        let key = classify(&map).unwrap();
        assert_eq!((key.tonic, key.mode), (Note::D, Mode::Major));
    }

    #[test]
    fn test_c_major_outscores_c_sharp_major() {
        let map = durations(&[(Note::Cs, 300), (Note::C, 700)]);
        let sample = duration_sample(&map);
        let c_major = KeyProfile::new(Note::C, Mode::Major).score(&sample);
        let cs_major = KeyProfile::new(Note::Cs, Mode::Major).score(&sample);
        assert!(c_major > cs_major);
        assert!(classify(&map).is_some());
    }
}
