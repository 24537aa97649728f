// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! `io::Error` builder macros, in the style the cache code imports them:
//! `einval!`, `enoent!`, `enosys!`, `eio!` build a typed `std::io::Error`
//! from whatever's at hand; `last_error!` wraps `errno` after a syscall.

/// Build an `ErrorKind::InvalidInput` error, optionally from a `Display`-able
/// value (an inner error, or an already-formatted `String`).
#[macro_export]
macro_rules! einval {
    () => {
        ::std::io::Error::from(::std::io::ErrorKind::InvalidInput)
    };
    ($e:expr) => {
        ::std::io::Error::new(::std::io::ErrorKind::InvalidInput, format!("{}", $e))
    };
}

/// Build an `ErrorKind::NotFound` error.
#[macro_export]
macro_rules! enoent {
    () => {
        ::std::io::Error::from(::std::io::ErrorKind::NotFound)
    };
    ($e:expr) => {
        ::std::io::Error::new(::std::io::ErrorKind::NotFound, format!("{}", $e))
    };
}

/// Build an `ErrorKind::Unsupported` error for operations the cache never
/// implements (e.g. durable writeback).
#[macro_export]
macro_rules! enosys {
    () => {
        ::std::io::Error::from(::std::io::ErrorKind::Unsupported)
    };
    ($e:expr) => {
        ::std::io::Error::new(::std::io::ErrorKind::Unsupported, format!("{}", $e))
    };
}

/// Build a generic I/O error.
#[macro_export]
macro_rules! eio {
    () => {
        ::std::io::Error::new(::std::io::ErrorKind::Other, "I/O error")
    };
    ($e:expr) => {
        ::std::io::Error::new(::std::io::ErrorKind::Other, format!("{}", $e))
    };
}

/// Capture `errno` right after a failed syscall, log it, and fold an
/// optional caller-supplied message into the resulting error.
#[macro_export]
macro_rules! last_error {
    () => {{
        let __e = ::std::io::Error::last_os_error();
        error!("{}:{}: {}", file!(), line!(), __e);
        __e
    }};
    ($msg:expr) => {{
        let __e = ::std::io::Error::last_os_error();
        error!("{}: {}", $msg, __e);
        ::std::io::Error::new(__e.kind(), format!("{}: {}", $msg, __e))
    }};
}

/// Configuration-time errors. Fatal to `configure()`; everything else in
/// the cache degrades to a miss instead of surfacing an error.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,
    #[error("bucket count {0} is out of range [{1}, {2}]")]
    HashSizeOutOfRange(u32, u32, u32),
    #[error("persistent-memory directory must be an absolute path, got {0:?}")]
    RelativeDirectory(String),
    #[error("persistent-memory backing requires a directory_path")]
    MissingDirectory,
    #[error("configure() called more than once")]
    AlreadyConfigured,
    #[error("failed to prepare persistent-memory backing: {0}")]
    Io(String),
    #[error("lane_count {0} must be a power of two")]
    LaneCountNotPowerOfTwo(u32),
}

/// Raised when a scheduler invariant is violated in a release build
/// (diagnostic builds assert instead).
#[derive(thiserror::Error, Debug)]
pub enum ReplayIntegrityError {
    #[error("global timestamp moved outside Pick-timestamp: observed {observed}, expected {previous} + 1")]
    ClockWentBackwards { previous: u64, observed: u64 },
    #[error("lane {lane} claimed by more than one worker at once")]
    LaneDoubleClaim { lane: u32 },
    #[error("worker's lane {worker_lane} does not match replay_ts low bits (expected {expected})")]
    LaneMismatch { worker_lane: u32, expected: u32 },
}
