// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! This module provides the session clock that timestamps keyboard
//! events and refresh ticks.

pub mod clock;

pub use clock::{SessionClock, TimestampMs};
