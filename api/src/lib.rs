// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Configuration schema shared by the cache and replay crates.
//!
//! These structs are the `serde`-deserialized shape of the engine's
//! configuration file; validation into the crates' own, already-checked
//! config types happens in `cache::config` and `replay::config` so that a
//! bad `chunk_cache.hashsize` can't leak past `configure()`.

use serde::{Deserialize, Serialize};

/// Smallest bucket count `chunk_cache.hashsize` may name.
pub const MIN_HASH: u32 = 1 << 10;
/// Largest bucket count `chunk_cache.hashsize` may name.
pub const MAX_HASH: u32 = 1 << 29;
/// Bucket count used when `chunk_cache.hashsize` is omitted.
pub const DEFAULT_HASH: u32 = 1 << 15;

/// Longest `name` byte length kept in a `ChunkChain` key.
pub const NAMEMAX: usize = 256;

/// Raw `chunk_cache.*` configuration keys, deserialized verbatim from
/// whatever configuration format the embedding application uses.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChunkCacheSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Total cache capacity in bytes. Required when `enabled` is true.
    #[serde(default)]
    pub size: u64,

    /// `"dram"` or `"file"` (persistent-memory backing).
    #[serde(default = "default_backing_type")]
    pub r#type: String,

    /// Absolute directory housing the persistent-memory backing file.
    /// Required when `type == "file"`.
    #[serde(default)]
    pub directory_path: Option<String>,

    #[serde(default = "default_hashsize")]
    pub hashsize: u32,

    /// Size of a freshly admitted chunk, in bytes, before clamping to
    /// remaining capacity or backing-object size.
    #[serde(default = "default_chunk_size")]
    pub default_chunk_size: u64,
}

fn default_backing_type() -> String {
    "dram".to_string()
}

fn default_hashsize() -> u32 {
    DEFAULT_HASH
}

fn default_chunk_size() -> u64 {
    1 << 20
}

impl Default for ChunkCacheSettings {
    fn default() -> Self {
        ChunkCacheSettings {
            enabled: false,
            size: 0,
            r#type: default_backing_type(),
            directory_path: None,
            hashsize: default_hashsize(),
            default_chunk_size: default_chunk_size(),
        }
    }
}

/// Scheduler configuration knobs.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReplaySettings {
    /// `L`, the lane table size. Must be a power of two.
    #[serde(default = "default_lane_count")]
    pub lane_count: u32,

    #[serde(default = "default_data_seed")]
    pub data_seed: u64,

    #[serde(default = "default_extra_seed")]
    pub extra_seed: u64,

    /// Run ends once `stable_timestamp >= stop_timestamp` and no worker
    /// holds a pending replay timestamp above it. `None` means run forever.
    #[serde(default)]
    pub stop_timestamp: Option<u64>,

    #[serde(default = "default_worker_count")]
    pub worker_count: u32,

    /// Upper bound on key space; replay_adjust_key wraps into `[1, max_rows]`.
    #[serde(default = "default_max_rows")]
    pub max_rows: u64,

    /// Whether rollback retries back off.
    #[serde(default = "default_true")]
    pub pause_after_rollback: bool,

    /// Stable-TS advancer cadence while workers run, in milliseconds.
    #[serde(default = "default_advance_interval_ms")]
    pub advance_interval_ms: u64,
}

fn default_lane_count() -> u32 {
    64
}

fn default_data_seed() -> u64 {
    0x5051_4AC5_D225_3931
}

fn default_extra_seed() -> u64 {
    0x9E37_79B9_7F4A_7C15
}

fn default_worker_count() -> u32 {
    8
}

fn default_max_rows() -> u64 {
    1_000_000
}

fn default_true() -> bool {
    true
}

fn default_advance_interval_ms() -> u64 {
    15_000
}

impl Default for ReplaySettings {
    fn default() -> Self {
        ReplaySettings {
            lane_count: default_lane_count(),
            data_seed: default_data_seed(),
            extra_seed: default_extra_seed(),
            stop_timestamp: None,
            worker_count: default_worker_count(),
            max_rows: default_max_rows(),
            pause_after_rollback: default_true(),
            advance_interval_ms: default_advance_interval_ms(),
        }
    }
}

/// Top-level configuration for an `Engine` handle.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub chunk_cache: ChunkCacheSettings,
    #[serde(default)]
    pub replay: ReplaySettings,
}
