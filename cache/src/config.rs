// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Validated cache configuration. Immutable once built; `ChunkCache::
//! configure` is the only place a `ChunkCacheSettings` gets turned into
//! one of these.

use std::convert::TryFrom;
use std::path::PathBuf;

use engine_api::{ChunkCacheSettings, MAX_HASH, MIN_HASH};
use engine_utils::error::ConfigError;

use crate::alloc::Backing;

#[derive(Clone, Debug)]
pub struct ChunkCacheConfig {
    pub capacity_bytes: u64,
    pub bucket_count: u32,
    pub backing: Backing,
    pub default_chunk_size: u64,
}

impl TryFrom<&ChunkCacheSettings> for ChunkCacheConfig {
    type Error = ConfigError;

    fn try_from(settings: &ChunkCacheSettings) -> Result<Self, ConfigError> {
        if settings.size == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if settings.hashsize < MIN_HASH || settings.hashsize > MAX_HASH {
            return Err(ConfigError::HashSizeOutOfRange(
                settings.hashsize,
                MIN_HASH,
                MAX_HASH,
            ));
        }

        let backing = match settings.r#type.as_str() {
            "file" => {
                let dir = settings
                    .directory_path
                    .as_ref()
                    .ok_or(ConfigError::MissingDirectory)?;
                let path = PathBuf::from(dir);
                if !path.is_absolute() {
                    return Err(ConfigError::RelativeDirectory(dir.clone()));
                }
                Backing::PersistentMem { dir: path }
            }
            _ => Backing::Dram,
        };

        Ok(ChunkCacheConfig {
            capacity_bytes: settings.size,
            bucket_count: settings.hashsize,
            backing,
            default_chunk_size: settings.default_chunk_size,
        })
    }
}
