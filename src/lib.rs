// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Live key and scale analysis for MIDI keyboards.
//!
//! Notes played on a keyboard are reduced into three live views: which
//! pitch classes are held, which were played most recently, and how long
//! each has been held in total. The duration view drives a Krumhansl-style
//! key estimate, and the scale catalog answers which tonal scales fit a set
//! of notes.

pub mod analysis;
pub mod config;
pub mod error;
pub mod midi;
pub mod music;
pub mod session;
pub mod timing;
pub mod tracking;

pub use error::{Error, Result};
