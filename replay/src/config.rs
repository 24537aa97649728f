// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Validated scheduler configuration: seeds, lane count, and stop
//! timestamp are all configuration inputs, not persisted by this
//! subsystem.

use std::convert::TryFrom;

use engine_api::ReplaySettings;
use engine_utils::error::ConfigError;

#[derive(Clone, Debug)]
pub struct ReplayConfig {
    pub lane_count: u32,
    pub data_seed: u64,
    pub extra_seed: u64,
    pub stop_timestamp: Option<u64>,
    pub worker_count: u32,
    pub max_rows: u64,
    pub pause_after_rollback: bool,
    pub advance_interval_ms: u64,
}

impl TryFrom<&ReplaySettings> for ReplayConfig {
    type Error = ConfigError;

    fn try_from(settings: &ReplaySettings) -> Result<Self, ConfigError> {
        if settings.lane_count == 0 || !settings.lane_count.is_power_of_two() {
            return Err(ConfigError::LaneCountNotPowerOfTwo(settings.lane_count));
        }
        Ok(ReplayConfig {
            lane_count: settings.lane_count,
            data_seed: settings.data_seed,
            extra_seed: settings.extra_seed,
            stop_timestamp: settings.stop_timestamp,
            worker_count: settings.worker_count,
            max_rows: settings.max_rows,
            pause_after_rollback: settings.pause_after_rollback,
            advance_interval_ms: settings.advance_interval_ms,
        })
    }
}
