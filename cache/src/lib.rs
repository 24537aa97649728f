// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! A sharded, in-memory (optionally persistent-memory) cache of fixed-ish
//! byte ranges of named backing objects: admission, placement within a
//! per-object ordered chunk list, lookup-with-population semantics, and
//! invalidation.

#[macro_use]
extern crate log;

pub mod alloc;
pub mod bucket;
pub mod chain;
pub mod chunk;
pub mod config;
pub mod key;
pub mod store;

pub use engine_api::ChunkCacheSettings;
pub use engine_utils::stats::CacheStats;
pub use key::{ObjectKey, Query};
pub use store::{ChunkCache, MissOutcome, Outcome, Reservation};
