// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Cache API: `lookup_or_reserve`, `publish`, `abandon`, `invalidate`,
//! `configure`. `ChunkCache` is the single handle the rest of the codebase
//! (and the storage engine embedding it) talks to.

use std::convert::TryFrom;
use std::io::Result;
use std::sync::atomic::Ordering;

use engine_api::ChunkCacheSettings;
use engine_utils::enoent;
use engine_utils::error::ConfigError;
use engine_utils::stats::{CacheCounters, CacheStats};
use once_cell::sync::OnceCell;

use crate::alloc::Allocator;
use crate::bucket::Bucket;
use crate::config::ChunkCacheConfig;
use crate::key::{ObjectKey, Query};

/// Handle to a newly allocated, not-yet-valid chunk. Identifies the chunk
/// by bucket + key + offset rather than by pointer, so it stays valid
/// across a lock release.
#[derive(Clone, Debug)]
pub struct Reservation {
    bucket_idx: usize,
    key: ObjectKey,
    offset: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MissOutcome {
    Reservation(Box<Reservation>),
    NoReservation,
}

#[derive(Clone, Debug)]
pub enum Outcome {
    Hit,
    Miss(MissOutcome),
}

impl Reservation {
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl PartialEq for Reservation {
    fn eq(&self, other: &Self) -> bool {
        self.bucket_idx == other.bucket_idx && self.key == other.key && self.offset == other.offset
    }
}
impl Eq for Reservation {}

struct Configured {
    config: ChunkCacheConfig,
    buckets: Vec<Bucket>,
    allocator: Allocator,
}

/// Result of `configure()`: either the cache is off (spec §6:
/// `chunk_cache.enabled`, `false` by default) and every operation is a
/// standing no-op/miss, or it's fully validated and backed by buckets.
enum CacheState {
    Disabled,
    Enabled(Configured),
}

/// A hashed, bucket-locked store mapping `(object-name, object-id, offset)`
/// to in-memory byte chunks.
#[derive(Default)]
pub struct ChunkCache {
    state: OnceCell<CacheState>,
    counters: CacheCounters,
}

impl ChunkCache {
    pub fn new() -> Self {
        ChunkCache {
            state: OnceCell::new(),
            counters: CacheCounters::new(),
        }
    }

    /// One-shot configuration; must be called before the first
    /// `lookup_or_reserve`. Re-configuring is rejected. When
    /// `settings.enabled` is `false` (the default), the cache is parked in
    /// the `Disabled` state without validating `size`/`hashsize`/etc — an
    /// embedder that leaves the cache off shouldn't need a valid capacity.
    pub fn configure(&self, settings: &ChunkCacheSettings) -> std::result::Result<(), ConfigError> {
        if self.state.get().is_some() {
            return Err(ConfigError::AlreadyConfigured);
        }

        if !settings.enabled {
            self.state
                .set(CacheState::Disabled)
                .map_err(|_| ConfigError::AlreadyConfigured)?;
            info!("chunk cache disabled");
            return Ok(());
        }

        let config = ChunkCacheConfig::try_from(settings)?;
        let allocator = Allocator::new(
            config.backing.clone(),
            config.capacity_bytes,
            config.default_chunk_size,
        )
        .map_err(|e| ConfigError::Io(e.to_string()))?;
        let mut buckets = Vec::with_capacity(config.bucket_count as usize);
        buckets.resize_with(config.bucket_count as usize, Bucket::default);

        self.state
            .set(CacheState::Enabled(Configured {
                config,
                buckets,
                allocator,
            }))
            .map_err(|_| ConfigError::AlreadyConfigured)?;
        info!("chunk cache configured");
        Ok(())
    }

    fn state(&self) -> &CacheState {
        self.state
            .get()
            .expect("ChunkCache::configure() must be called before use")
    }

    /// Look up `q`; on a miss where capacity and backing-object size allow
    /// it, reserve a new chunk for the caller to fill. A disabled cache
    /// always reports a miss with no reservation, matching spec §7's
    /// "allocation failure ... never fatal" degrade-to-miss story.
    pub fn lookup_or_reserve(&self, q: &Query, out_buf: &mut [u8]) -> Result<Outcome> {
        let state = match self.state() {
            CacheState::Disabled => return Ok(Outcome::Miss(MissOutcome::NoReservation)),
            CacheState::Enabled(state) => state,
        };
        let bucket_idx = q.key.bucket_index(state.config.bucket_count);
        let bucket = &state.buckets[bucket_idx];
        let mut inner = bucket.lock();
        let chain_idx = inner.find_or_create_chain(&q.key);
        let chain = inner.chain_mut(chain_idx);

        if let Some(ci) = chain.find_satisfying(q.offset, q.size) {
            chain.chunk(ci).copy_out(q.offset, q.size, out_buf);
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            trace!("cache hit at bucket {} offset {}", bucket_idx, q.offset);
            return Ok(Outcome::Hit);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let (start, next_start) = chain.admission_window(q.offset);
        let remaining_in_object = q.backing_object_size.saturating_sub(start);
        let window = next_start.map(|n| n - start).unwrap_or(u64::MAX);
        let new_size = state.allocator.admit_size().min(remaining_in_object).min(window);
        if new_size == 0 {
            debug!("no admission for bucket {} offset {}", bucket_idx, start);
            return Ok(Outcome::Miss(MissOutcome::NoReservation));
        }

        let buffer = match state.allocator.allocate(new_size) {
            Some(b) => b,
            None => return Ok(Outcome::Miss(MissOutcome::NoReservation)),
        };
        chain.insert_reserved(start, buffer);
        self.counters
            .allocations
            .fetch_add(1, Ordering::Relaxed);

        Ok(Outcome::Miss(MissOutcome::Reservation(Box::new(Reservation {
            bucket_idx,
            key: q.key.clone(),
            offset: start,
        }))))
    }

    /// Fill a reserved chunk with `bytes` and mark it valid. `bytes.len()`
    /// must equal the chunk's reserved size. A disabled cache never hands
    /// out a reservation, so this is unreachable in that state.
    pub fn publish(&self, reservation: &Reservation, bytes: &[u8]) -> Result<()> {
        let state = match self.state() {
            CacheState::Disabled => return Ok(()),
            CacheState::Enabled(state) => state,
        };
        let bucket = &state.buckets[reservation.bucket_idx];
        let mut inner = bucket.lock();
        let chain_idx = inner
            .find_chain(&reservation.key)
            .ok_or_else(|| enoent!("chain for reservation not found"))?;
        let chain = inner.chain_mut(chain_idx);
        let pos = chain
            .position_by_offset(reservation.offset)
            .ok_or_else(|| enoent!("reserved chunk not found"))?;
        chain.chunk_mut(pos).publish(bytes);
        trace!(
            "published chunk bucket {} offset {}",
            reservation.bucket_idx,
            reservation.offset
        );
        Ok(())
    }

    /// Reclaim an unpublished chunk after the caller failed to read it from
    /// the backing store.
    pub fn abandon(&self, reservation: &Reservation) -> Result<()> {
        let state = match self.state() {
            CacheState::Disabled => return Ok(()),
            CacheState::Enabled(state) => state,
        };
        let bucket = &state.buckets[reservation.bucket_idx];
        let mut inner = bucket.lock();
        if let Some(chain_idx) = inner.find_chain(&reservation.key) {
            let chain = inner.chain_mut(chain_idx);
            chain.abandon(reservation.offset, &state.allocator);
            inner.prune_empty();
        }
        Ok(())
    }

    /// Remove every valid chunk fully contained in `[offset, offset+size)`
    /// for `(name, object_id)`.
    pub fn invalidate(&self, name: &[u8], object_id: u64, offset: u64, size: u64) -> Result<()> {
        let state = match self.state() {
            CacheState::Disabled => return Ok(()),
            CacheState::Enabled(state) => state,
        };
        let key = ObjectKey::new(name, object_id);
        let bucket_idx = key.bucket_index(state.config.bucket_count);
        let bucket = &state.buckets[bucket_idx];
        let mut inner = bucket.lock();
        if let Some(chain_idx) = inner.find_chain(&key) {
            let chain = inner.chain_mut(chain_idx);
            let removed = chain.invalidate(offset, size, &state.allocator);
            self.counters
                .removals
                .fetch_add(removed, Ordering::Relaxed);
            inner.prune_empty();
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let mut snap = self.counters.snapshot();
        if let Some(CacheState::Enabled(state)) = self.state.get() {
            snap.bytes_used = state.allocator.bytes_used();
        }
        snap
    }
}
