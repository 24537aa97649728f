// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! A single cached byte range.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::alloc::Buffer;

/// One cached byte range of a backing object. Created `reserved` (not
/// `valid`) by an admission decision; becomes `valid` only once the caller
/// publishes real bytes into it. Once `valid`, the bytes are immutable
/// until the chunk is removed — the chunk is owned exclusively by its
/// containing `ChunkChain`.
pub struct Chunk {
    pub offset: u64,
    size: u64,
    bytes: Buffer,
    // Release-published: a reader observing `true` is guaranteed to observe
    // the fully-written buffer.
    valid: AtomicBool,
}

impl Chunk {
    pub fn reserved(offset: u64, bytes: Buffer) -> Self {
        let size = bytes.len() as u64;
        Chunk {
            offset,
            size,
            bytes,
            valid: AtomicBool::new(false),
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Copy `data` into the chunk's buffer and publish it. `data.len()` must
    /// equal the chunk's size.
    pub fn publish(&mut self, data: &[u8]) {
        debug_assert_eq!(data.len() as u64, self.size);
        self.bytes.as_mut_slice().copy_from_slice(data);
        self.valid.store(true, Ordering::Release);
    }

    /// Whether this chunk alone satisfies `[q_offset, q_offset+q_size)`.
    /// Only a query fully contained in one chunk is ever served; a query
    /// spanning two chunks always misses.
    pub fn satisfies(&self, q_offset: u64, q_size: u64) -> bool {
        self.is_valid() && self.offset <= q_offset && self.end() >= q_offset + q_size
    }

    /// Copy the bytes covering `[q_offset, q_offset+q_size)` into `out`.
    /// Caller must have already checked `satisfies`.
    pub fn copy_out(&self, q_offset: u64, q_size: u64, out: &mut [u8]) {
        let start = (q_offset - self.offset) as usize;
        let end = start + q_size as usize;
        out[..q_size as usize].copy_from_slice(&self.bytes.as_slice()[start..end]);
    }
}
