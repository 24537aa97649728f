// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Glue crate: the `Engine` handle owning one `ChunkCache` and one
//! `ReplayScheduler`. Tests instantiate independent handles for isolation;
//! no process-global singletons anywhere — every operation takes an
//! explicit `&Engine`.

#[macro_use]
extern crate log;

pub use chunk_cache::{ChunkCache, MissOutcome, Outcome, Query, Reservation};
pub use engine_api::EngineSettings;
pub use engine_utils::error::ConfigError;
pub use replay_scheduler::{LoopOutcome, ReplayScheduler, WorkerState};

/// Owns a configured chunk cache and replay scheduler. Construct one per
/// test or per embedding process; there is no shared global state to leak
/// between instances.
pub struct Engine {
    cache: ChunkCache,
    scheduler: ReplayScheduler,
}

impl Engine {
    /// Build an `Engine` from a single settings blob, configuring the
    /// cache and constructing the scheduler. Fails if either the cache or
    /// the scheduler's configuration is invalid.
    pub fn new(settings: &EngineSettings) -> Result<Self, ConfigError> {
        let cache = ChunkCache::new();
        cache.configure(&settings.chunk_cache)?;
        let scheduler = ReplayScheduler::new(&settings.replay)?;
        info!("engine configured");
        Ok(Engine { cache, scheduler })
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &ReplayScheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_engines_do_not_share_state() {
        let mut settings = EngineSettings::default();
        settings.chunk_cache.enabled = true;
        settings.chunk_cache.size = 1 << 20;

        let a = Engine::new(&settings).unwrap();
        let b = Engine::new(&settings).unwrap();

        let mut buf = [0u8; 4];
        let r = match a
            .cache()
            .lookup_or_reserve(&Query::new(b"obj", 0, 0, 4, 1 << 20), &mut buf)
            .unwrap()
        {
            Outcome::Miss(MissOutcome::Reservation(r)) => r,
            other => panic!("expected a reservation, got {:?}", other),
        };
        a.cache().publish(&r, &[1, 2, 3, 4]).unwrap();

        // `b` never saw the write: each Engine owns its own cache state.
        let outcome = b
            .cache()
            .lookup_or_reserve(&Query::new(b"obj", 0, 0, 4, 1 << 20), &mut buf)
            .unwrap();
        assert!(matches!(outcome, Outcome::Miss(MissOutcome::Reservation(_))));
    }

    #[test]
    fn rejects_zero_capacity_cache() {
        let mut settings = EngineSettings::default();
        settings.chunk_cache.enabled = true;
        settings.chunk_cache.size = 0;
        assert!(Engine::new(&settings).is_err());
    }

    /// Default settings (`chunk_cache.enabled == false`) must build an
    /// `Engine` successfully: a disabled cache is the normal, off-by-default
    /// case for an embedder that hasn't opted in, not a misconfiguration.
    #[test]
    fn default_settings_build_with_cache_disabled() {
        let engine = Engine::new(&EngineSettings::default()).unwrap();

        let mut buf = [0u8; 4];
        let outcome = engine
            .cache()
            .lookup_or_reserve(&Query::new(b"obj", 0, 0, 4, 1 << 20), &mut buf)
            .unwrap();
        assert!(matches!(outcome, Outcome::Miss(MissOutcome::NoReservation)));
    }
}
