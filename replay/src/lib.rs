// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Predictable-replay timestamp scheduler: a deterministic allocator of
//! logical timestamps to worker threads, with lanes for contention
//! avoidance, per-thread deterministic RNG seeding, and rollback-preserving
//! retry semantics driving oldest/stable timestamp advancement.

#[macro_use]
extern crate log;

pub mod advancer;
pub mod clock;
pub mod config;
pub mod lanes;
pub mod scheduler;

pub use clock::GlobalClock;
pub use config::ReplayConfig;
pub use engine_api::ReplaySettings;
pub use lanes::LaneTable;
pub use scheduler::{LoopOutcome, ReplayScheduler, WorkerState};
