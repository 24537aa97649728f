// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Globally monotonic 64-bit logical clock with atomic increment and
//! ordered reads, plus the oldest/stable checkpoint pair the advancer
//! pushes. This stands in for the storage engine's own timestamp API,
//! which the scheduler only consumes: a monotonic counter and a barrier
//! for setting oldest/stable timestamps.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic logical clock plus the oldest/stable checkpoints derived from
/// it. `increment()` is the only place `timestamp` ever changes; it only
/// happens during Pick-timestamp.
#[derive(Default)]
pub struct GlobalClock {
    timestamp: AtomicU64,
    oldest_timestamp: AtomicU64,
    stable_timestamp: AtomicU64,
}

impl GlobalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire-ordered read of the current timestamp.
    pub fn current_acquire(&self) -> u64 {
        self.timestamp.load(Ordering::Acquire)
    }

    /// Fetch-add by one; returns the post-increment value.
    pub fn increment(&self) -> u64 {
        self.timestamp.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn oldest_timestamp(&self) -> u64 {
        self.oldest_timestamp.load(Ordering::Acquire)
    }

    pub fn stable_timestamp(&self) -> u64 {
        self.stable_timestamp.load(Ordering::Acquire)
    }

    /// Push a new `(oldest, stable)` checkpoint pair to the engine. Callers
    /// (the advancer) are responsible for the monotonicity asserts; this
    /// just performs the release-ordered store.
    pub fn set_checkpoints(&self, oldest: u64, stable: u64) {
        self.oldest_timestamp.store(oldest, Ordering::Release);
        self.stable_timestamp.store(stable, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_returns_post_increment_value() {
        let clock = GlobalClock::new();
        assert_eq!(clock.increment(), 1);
        assert_eq!(clock.increment(), 2);
        assert_eq!(clock.current_acquire(), 2);
    }

    #[test]
    fn checkpoints_are_readable_after_set() {
        let clock = GlobalClock::new();
        clock.set_checkpoints(3, 7);
        assert_eq!(clock.oldest_timestamp(), 3);
        assert_eq!(clock.stable_timestamp(), 7);
    }
}
