// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Session clock.
//!
//! Every reducer transition takes its time explicitly. The session clock is
//! the single time base shared by the transport (event timestamps) and the
//! session (refresh ticks), so both speak the same milliseconds.

use tokio::time::Instant;

/// Milliseconds since the session started
pub type TimestampMs = u64;

/// Monotonic millisecond clock anchored at session start
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    /// Start a clock at the current instant
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock started
    pub fn now_ms(&self) -> TimestampMs {
        self.start.elapsed().as_millis() as TimestampMs
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}
