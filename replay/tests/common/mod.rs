// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Test-only worker harness, driving the documented scheduler interface
//! functions against a fake in-memory database. Not a reimplementation of
//! a real workload manager — it exists solely to exercise and assert
//! scheduler determinism and the other replay properties end-to-end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use rand::Rng;
use replay_scheduler::{LoopOutcome, ReplayScheduler, WorkerState};

/// A fake transactional key-value store keyed by `(table, key)`, standing
/// in for the storage engine's B-tree (out of scope per spec §1).
#[derive(Default)]
pub struct FakeDb {
    rows: Mutex<HashMap<(u32, u64), Vec<u8>>>,
}

impl FakeDb {
    pub fn new() -> Self {
        FakeDb::default()
    }

    fn write(&self, table: u32, key: u64, value: Vec<u8>) {
        self.rows.lock().unwrap().insert((table, key), value);
    }

    /// A deterministically ordered snapshot of the database contents, for
    /// byte-for-byte comparison between two replay runs.
    pub fn snapshot(&self) -> Vec<((u32, u64), Vec<u8>)> {
        let rows = self.rows.lock().unwrap();
        let mut entries: Vec<_> = rows.iter().map(|(k, v)| (*k, v.clone())).collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }
}

/// One committed operation, recorded for the S6 trace comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedOp {
    pub commit_ts: u64,
    pub table: u32,
    pub key: u64,
    pub value: Vec<u8>,
}

/// Drives one worker through the documented interface
/// (`replay_loop_begin`/`replay_read_ts`/`replay_commit_ts`/
/// `replay_committed`) against `db` until the scheduler reports `Quit` or
/// `running` is cleared. Returns the operations this worker committed, in
/// commit order.
pub fn run_worker(scheduler: &ReplayScheduler, worker: &mut WorkerState, db: &FakeDb, running: &AtomicBool) -> Vec<RecordedOp> {
    let mut committed = Vec::new();
    while running.load(Ordering::Acquire) {
        match scheduler.replay_loop_begin(worker, false) {
            Ok(LoopOutcome::Quit) => break,
            Ok(LoopOutcome::Continue) => {}
            Err(e) => panic!("scheduler integrity violation: {}", e),
        }

        let _read_ts = scheduler.replay_read_ts(worker);

        // Act (spec §4.G): one transactional operation, data choices from
        // `data_rng`, non-data choices from `extra_rng`.
        let table = worker.data_rng.gen_range(0..4u32);
        let raw_key = worker.data_rng.gen_range(1..1_000_000u64);
        let key = scheduler.replay_adjust_key(worker, raw_key);
        let value_len = worker.extra_rng.gen_range(1..8usize);
        let mut value = vec![0u8; value_len];
        worker.data_rng.fill(&mut value[..]);

        let commit_ts = scheduler.replay_commit_ts(worker);
        db.write(table, key, value.clone());
        scheduler.replay_committed(worker);

        committed.push(RecordedOp {
            commit_ts,
            table,
            key,
            value,
        });
    }
    committed
}
