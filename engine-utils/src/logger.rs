// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Logging bootstrap shared by binaries and tests. Library code never calls
//! this; it only ever uses the `log` macros.

use flexi_logger::{FlexiLoggerError, Logger, LoggerHandle};

/// Initialize a stderr logger at `level`, honoring `RUST_LOG` if set.
///
/// Returns a handle the caller must keep alive for the lifetime of the
/// process; dropping it detaches the logger.
pub fn init(level: log::LevelFilter) -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_env_or_str(level.to_string())?
        .log_to_stderr()
        .start()
}
