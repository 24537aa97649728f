// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Atomic counters backing `ChunkCache::stats()`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, one `AtomicU64` per kind of event. Hot-path code bumps
/// these with `Relaxed` ordering; they're diagnostic, not synchronizing.
#[derive(Default)]
pub struct CacheCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub bytes_used: AtomicU64,
    pub allocations: AtomicU64,
    pub removals: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bytes_used: self.bytes_used.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot returned to callers of `stats()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub bytes_used: u64,
    pub allocations: u64,
    pub removals: u64,
}
