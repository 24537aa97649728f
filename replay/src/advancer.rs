// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Stable-TS advancer: a periodic task computing `maximum_committed` and
//! pushing `(oldest, stable)` checkpoints to the engine's timestamp API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::clock::GlobalClock;
use crate::lanes::LaneTable;

/// Sentinel for "no cached value yet"; `maximum_committed()` never
/// actually returns this, since `compute_fresh` always returns a value
/// bounded by `global_timestamp`, which starts at 0.
const UNCACHED: u64 = u64::MAX;

/// Computes and caches `maximum_committed`, and pushes oldest/stable
/// checkpoints under the prepare-commit lock it shares with worker
/// prepare/commit.
pub struct Advancer {
    clock: Arc<GlobalClock>,
    lanes: Arc<LaneTable>,
    prepare_commit_lock: Arc<Mutex<()>>,
    cached: AtomicU64,
    calls: AtomicU64,
}

impl Advancer {
    pub fn new(clock: Arc<GlobalClock>, lanes: Arc<LaneTable>, prepare_commit_lock: Arc<Mutex<()>>) -> Self {
        Advancer {
            clock,
            lanes,
            prepare_commit_lock,
            cached: AtomicU64::new(UNCACHED),
            calls: AtomicU64::new(0),
        }
    }

    /// Most calls return the cached value; every 20th call forces a fresh
    /// scan.
    pub fn maximum_committed(&self) -> u64 {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if n % 20 != 0 {
            let cached = self.cached.load(Ordering::Acquire);
            if cached != UNCACHED {
                return cached;
            }
        }
        let fresh = self.compute_fresh();
        self.cached.store(fresh, Ordering::Release);
        fresh
    }

    /// Reads `global_timestamp` with acquire, then under the lane-table
    /// read lock computes `min(global_timestamp, min over in_use lanes of
    /// last_commit_ts)`, skipping lanes whose `last_commit_ts` is still 0
    /// (see DESIGN.md), so a fresh run with no commits yet returns
    /// `global_timestamp`.
    fn compute_fresh(&self) -> u64 {
        let global = self.clock.current_acquire();
        let guard = self.lanes.read();
        let mut min_commit: Option<u64> = None;
        for lane in 0..guard.lane_count() {
            if !guard.is_in_use(lane) {
                continue;
            }
            let ts = guard.last_commit_ts(lane);
            if ts == 0 {
                continue;
            }
            min_commit = Some(min_commit.map_or(ts, |m| m.min(ts)));
        }
        match min_commit {
            Some(m) => global.min(m),
            None => global,
        }
    }

    /// Compute `m = maximum_committed()`; derive `(oldest, stable)` and
    /// push them under the prepare-commit lock. `allow_lag` applies the
    /// halfway rule to `oldest`; `final_push` bypasses it regardless of
    /// `allow_lag`.
    pub fn advance_once(&self, allow_lag: bool, final_push: bool) -> (u64, u64) {
        let m = self.maximum_committed();
        let _guard = self.prepare_commit_lock.lock().unwrap_or_else(|e| e.into_inner());
        let oldest_prev = self.clock.oldest_timestamp();
        let stable_prev = self.clock.stable_timestamp();

        let oldest = if allow_lag && !final_push {
            oldest_prev + m.saturating_sub(oldest_prev) / 2
        } else {
            m
        };
        let stable = m;

        debug_assert!(oldest >= oldest_prev, "oldest timestamp moved backwards");
        debug_assert!(stable >= stable_prev, "stable timestamp moved backwards");

        self.clock.set_checkpoints(oldest, stable);
        debug!("advanced checkpoints: oldest={} stable={}", oldest, stable);
        (oldest, stable)
    }

    /// Run `advance_once(allow_lag=true, final=false)` every `interval`
    /// while `running` holds, then perform one final
    /// `advance_once(allow_lag=false, final=true)` before returning. Exits
    /// once `running` is cleared, after its last cadence advance.
    pub fn spawn_cadence(self: Arc<Self>, running: Arc<AtomicBool>, interval: Duration) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name("replay-stable-ts-advancer".to_string())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    self.advance_once(true, false);
                }
                self.advance_once(false, true);
            })
            .expect("failed to spawn stable-ts advancer thread")
    }
}
