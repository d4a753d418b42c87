// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Debounced, distinct emission of a derived value.

use std::time::Duration;

use tokio::time::Instant;

/// Coalesces bursts of updates into one emission after a quiet period.
///
/// Every [`offer`](Debouncer::offer) replaces the pending value and restarts
/// the window, so a continuous burst postpones emission indefinitely. A
/// flushed value equal to the last emission is dropped.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<T>,
    last_emitted: Option<T>,
    deadline: Option<Instant>,
}

impl<T: Clone + PartialEq> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            last_emitted: None,
            deadline: None,
        }
    }

    /// Start from a value considered already emitted (the initial output)
    pub fn with_initial(window: Duration, initial: T) -> Self {
        Self {
            last_emitted: Some(initial),
            ..Self::new(window)
        }
    }

    /// Record a new value and restart the quiet window from `now`
    pub fn offer(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        self.deadline = Some(now + self.window);
    }

    /// When the pending value becomes due, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Emit the pending value if its window has elapsed at `now`
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    /// Emit the pending value regardless of the window
    pub fn flush(&mut self) -> Option<T> {
        self.deadline = None;
        let value = self.pending.take()?;
        if self.last_emitted.as_ref() == Some(&value) {
            return None;
        }
        self.last_emitted = Some(value.clone());
        Some(value)
    }
}

/// Resolve at `deadline`, or never when there is none
pub async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(20);

    #[test]
    fn test_emits_after_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.offer(1, start);
        assert_eq!(debouncer.poll(start + Duration::from_millis(10)), None);
        assert_eq!(debouncer.poll(start + WINDOW), Some(1));
        assert_eq!(debouncer.deadline(), None);
    }

    #[test]
    fn test_burst_restarts_window_and_keeps_latest() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        for i in 0..5u64 {
            debouncer.offer(i, start + Duration::from_millis(i * 10));
        }
        // Last offer at 40ms, due at 60ms
        assert_eq!(debouncer.poll(start + Duration::from_millis(55)), None);
        assert_eq!(debouncer.poll(start + Duration::from_millis(60)), Some(4));
    }

    #[test]
    fn test_unchanged_value_is_suppressed() {
        let start = Instant::now();
        let mut debouncer = Debouncer::with_initial(WINDOW, "idle");

        debouncer.offer("idle", start);
        assert_eq!(debouncer.flush(), None);

        debouncer.offer("busy", start);
        assert_eq!(debouncer.flush(), Some("busy"));

        debouncer.offer("busy", start);
        assert_eq!(debouncer.flush(), None);
    }

    #[test]
    fn test_flush_without_pending() {
        let mut debouncer: Debouncer<u8> = Debouncer::new(WINDOW);
        assert_eq!(debouncer.flush(), None);
        assert_eq!(debouncer.poll(Instant::now()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_waits_for_deadline() {
        let start = Instant::now();
        until(Some(start + WINDOW)).await;
        assert!(Instant::now() >= start + WINDOW);
    }
}
