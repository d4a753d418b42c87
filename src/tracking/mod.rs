// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! State reducers fed by keyboard events.
//!
//! Each reducer is a plain state machine with explicit time inputs. The
//! session runs one per task and publishes its output through a debouncer.

pub mod debounce;
pub mod duration;
pub mod pressed;
pub mod scanner;

pub use debounce::Debouncer;
pub use duration::{DurationAccumulator, DurationMap};
pub use pressed::{PressedNotesMap, PressedNotesTracker};
pub use scanner::{RecencyScanner, DEFAULT_MAXIMUM_NOTES};
