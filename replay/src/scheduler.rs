// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Replay scheduler: the per-worker state machine driving Pick-timestamp
//! → Seed → Act → Commit/Rollback, plus the external interface the worker
//! harness calls into.

use std::convert::TryFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use engine_api::ReplaySettings;
use engine_utils::error::{ConfigError, ReplayIntegrityError};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::advancer::Advancer;
use crate::clock::GlobalClock;
use crate::config::ReplayConfig;
use crate::lanes::LaneTable;

/// Per-worker state. No thread-locals beyond the RNGs, which are
/// per-worker by construction.
pub struct WorkerState {
    pub id: u32,
    pub lane: Option<u32>,
    /// `0` means "none".
    pub replay_ts: u64,
    pub replay_again: bool,
    pub data_rng: StdRng,
    pub extra_rng: StdRng,
    pub keyno: u64,
    /// Captured at the worker's first `replay_loop_begin`; used by the
    /// prepare-timestamp `replay_ts > replay_start + L` check.
    replay_start: u64,
    ntries: u32,
}

impl WorkerState {
    pub fn new(id: u32) -> Self {
        WorkerState {
            id,
            lane: None,
            replay_ts: 0,
            replay_again: false,
            data_rng: StdRng::seed_from_u64(0),
            extra_rng: StdRng::seed_from_u64(0),
            keyno: 0,
            replay_start: 0,
            ntries: 0,
        }
    }

    fn assert_preconditions(&self) {
        debug_assert_eq!(self.replay_again, self.replay_ts != 0);
    }
}

/// What `replay_loop_begin` tells the worker harness to do next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoopOutcome {
    Continue,
    Quit,
}

/// Owns the clock, lane table, and stable-TS advancer for one engine
/// instance. No process-global singletons: each `ReplayScheduler` is
/// independent, so tests can instantiate as many as they need.
pub struct ReplayScheduler {
    config: ReplayConfig,
    clock: Arc<GlobalClock>,
    lanes: Arc<LaneTable>,
    advancer: Arc<Advancer>,
    prepare_commit_lock: Arc<Mutex<()>>,
    running: Arc<AtomicBool>,
    advancer_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ReplayScheduler {
    pub fn new(settings: &ReplaySettings) -> Result<Self, ConfigError> {
        let config = ReplayConfig::try_from(settings)?;
        let clock = Arc::new(GlobalClock::new());
        let lanes = Arc::new(LaneTable::new(config.lane_count));
        let prepare_commit_lock = Arc::new(Mutex::new(()));
        let advancer = Arc::new(Advancer::new(clock.clone(), lanes.clone(), prepare_commit_lock.clone()));
        Ok(ReplayScheduler {
            config,
            clock,
            lanes,
            advancer,
            prepare_commit_lock,
            running: Arc::new(AtomicBool::new(false)),
            advancer_thread: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn clock(&self) -> &GlobalClock {
        &self.clock
    }

    pub fn lanes(&self) -> &LaneTable {
        &self.lanes
    }

    /// Start the background stable-TS advancer on its cadence and mark
    /// the run as active.
    pub fn replay_run_begin(&self) {
        self.running.store(true, Ordering::Release);
        let mut guard = self.advancer_thread.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            let handle = self.advancer.clone().spawn_cadence(
                self.running.clone(),
                Duration::from_millis(self.config.advance_interval_ms),
            );
            *guard = Some(handle);
        }
        info!("replay run begin");
    }

    /// Signal `workers_finished`, join the advancer thread (which performs
    /// one final `advance_once(allow_lag=false, final=true)` before
    /// exiting), and return.
    pub fn replay_run_end(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.advancer_thread.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
        info!("replay run end");
    }

    /// Pick-timestamp. Called at the top of a worker's loop. `in_txn` is
    /// true when the worker is re-entering the loop without having closed
    /// its previous transaction; in that case the worker's existing
    /// `replay_ts`/lane are reused outright and no new timestamp is
    /// picked.
    pub fn replay_loop_begin(&self, worker: &mut WorkerState, in_txn: bool) -> Result<LoopOutcome, ReplayIntegrityError> {
        if in_txn {
            return Ok(LoopOutcome::Continue);
        }

        worker.assert_preconditions();

        if worker.replay_again {
            let expected = self.lanes.lane_of(worker.replay_ts);
            let actual = worker.lane.unwrap_or(u32::MAX);
            if actual != expected {
                return Err(ReplayIntegrityError::LaneMismatch {
                    worker_lane: actual,
                    expected,
                });
            }
            worker.replay_again = false;
            self.seed(worker);
            return Ok(LoopOutcome::Continue);
        }

        if worker.replay_start == 0 {
            worker.replay_start = self.clock.current_acquire();
        }

        if let Some(stop_ts) = self.config.stop_timestamp {
            if self.clock.stable_timestamp() >= stop_ts && worker.replay_ts == 0 {
                return Ok(LoopOutcome::Quit);
            }
        }

        let guard = self.lanes.write();
        loop {
            let ts = self.clock.increment();
            guard.observe_timestamp(ts)?;
            let lane = guard.lane_of(ts);
            if !guard.is_in_use(lane) {
                guard.claim(lane)?;
                worker.replay_ts = ts;
                worker.lane = Some(lane);
                break;
            }
        }
        drop(guard);

        self.seed(worker);
        Ok(LoopOutcome::Continue)
    }

    /// Deterministic seeding: a documented function of `replay_ts XOR
    /// {DATA,EXTRA}_SEED`.
    fn seed(&self, worker: &mut WorkerState) {
        worker.data_rng = StdRng::seed_from_u64(worker.replay_ts ^ self.config.data_seed);
        worker.extra_rng = StdRng::seed_from_u64(worker.replay_ts ^ self.config.extra_seed);
    }

    /// Read timestamp = `maximum_committed()` at the moment of begin.
    pub fn replay_read_ts(&self, _worker: &WorkerState) -> u64 {
        self.advancer.maximum_committed()
    }

    /// Prepare timestamp, optional: `replay_ts - L/2` if `replay_ts >
    /// replay_start + L` and the result exceeds `oldest_ts`; else
    /// `replay_ts`.
    pub fn replay_prepare_ts(&self, worker: &WorkerState) -> u64 {
        let l = self.lanes.lane_count() as u64;
        let half = l / 2;
        if worker.replay_ts > worker.replay_start + l {
            let candidate = worker.replay_ts - half;
            if candidate > self.clock.oldest_timestamp() {
                return candidate;
            }
        }
        worker.replay_ts
    }

    /// Commit timestamp = `replay_ts`.
    pub fn replay_commit_ts(&self, worker: &WorkerState) -> u64 {
        worker.replay_ts
    }

    /// Commit path. Records the commit stamp; releases the lane unless a
    /// straggler within this lane obligates the worker to also perform the
    /// next timestamp in it.
    pub fn replay_committed(&self, worker: &mut WorkerState) {
        let lane = worker.lane.expect("committed worker must hold a lane");
        let guard = self.lanes.write();
        guard.record_commit(lane, worker.replay_ts);

        if self.clock.current_acquire() <= worker.replay_ts + self.config.lane_count as u64 {
            guard.release(lane);
            drop(guard);
            worker.lane = None;
            worker.replay_ts = 0;
            worker.replay_again = false;
        } else {
            drop(guard);
            worker.replay_ts += self.config.lane_count as u64;
            worker.replay_again = true;
        }
        worker.ntries = 0;
    }

    /// Rollback path: retain `replay_ts` and `lane`; the next
    /// `replay_loop_begin` reuses both.
    pub fn replay_rollback(&self, worker: &mut WorkerState) {
        worker.replay_again = true;
        worker.ntries = worker.ntries.saturating_add(1);
    }

    /// Optional back-off after a rollback. No-op when
    /// `pause_after_rollback` is disabled in configuration.
    pub fn replay_pause_after_rollback(&self, worker: &WorkerState) {
        if !self.config.pause_after_rollback {
            return;
        }
        let low = self.advancer.maximum_committed();
        let high = self.clock.current_acquire();
        let mid = (high + low) / 2;
        let l = self.lanes.lane_count() as u64;

        if low + l <= worker.replay_ts {
            return;
        }
        if worker.replay_ts < mid && worker.ntries % 10 != 0 {
            thread::yield_now();
        } else {
            let backoff = (worker.ntries as u64).min(100);
            thread::sleep(Duration::from_millis(backoff));
        }
    }

    /// Wrap the data RNG's chosen key into the worker's lane: replace the
    /// low `k` bits with `lane`, then wrap into `[1, max_rows]`.
    pub fn replay_adjust_key(&self, worker: &WorkerState, key: u64) -> u64 {
        let l = self.lanes.lane_count() as u64;
        let lane = worker.lane.expect("key adjustment requires a held lane") as u64;
        let mut adjusted = (key & !(l - 1)) | lane;
        if adjusted == 0 {
            adjusted = l;
        } else if adjusted >= self.config.max_rows {
            adjusted -= l;
        }
        adjusted
    }
}
