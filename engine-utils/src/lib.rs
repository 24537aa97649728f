// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Shared plumbing for the chunk cache and replay scheduler crates: error
//! helpers, log bootstrap, a stable 64-bit hash, and atomic stat counters.

#[macro_use]
extern crate log;

pub mod error;
pub mod hash;
pub mod logger;
pub mod stats;

pub use error::*;
