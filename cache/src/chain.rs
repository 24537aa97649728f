// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Chunk chains: all cached chunks for one backing object, kept in
//! ascending, non-overlapping offset order. Chunks may have gaps.

use crate::alloc::{Allocator, Buffer};
use crate::chunk::Chunk;
use crate::key::ObjectKey;

/// All cached chunks for one `(name, object-id)`. Owns its chunks outright;
/// there are no back-pointers.
pub struct ChunkChain {
    key: ObjectKey,
    // Ascending by offset, non-overlapping: for any A before B,
    // A.offset + A.size <= B.offset.
    chunks: Vec<Chunk>,
}

impl ChunkChain {
    pub fn new(key: ObjectKey) -> Self {
        ChunkChain {
            key,
            chunks: Vec::new(),
        }
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Find the (at most one) chunk that can serve `[offset, offset+size)`
    /// outright. Lookup can early-exit once the current chunk's offset
    /// exceeds the query offset, since the chain is ascending.
    pub fn find_satisfying(&self, offset: u64, size: u64) -> Option<usize> {
        for (i, c) in self.chunks.iter().enumerate() {
            if c.offset > offset {
                break;
            }
            if c.satisfies(offset, size) {
                return Some(i);
            }
        }
        None
    }

    /// Compute where a new chunk admitted to satisfy a missed query at
    /// `offset` may actually start, and how far it may extend before
    /// bumping into the next chunk. A query can miss because an existing
    /// chunk covers its start but not its end (a cross-chunk miss):
    /// admitting a chunk at `offset` verbatim would then overlap that
    /// chunk, violating the ascending/non-overlapping invariant. So the
    /// window starts at the end of whatever already covers `offset`, and
    /// is capped by the next chunk's start, if any.
    pub fn admission_window(&self, offset: u64) -> (u64, Option<u64>) {
        let mut start = offset;
        for c in &self.chunks {
            if c.offset <= start && c.end() > start {
                start = c.end();
            }
        }
        let next_start = self.chunks.iter().map(|c| c.offset).find(|&o| o > start);
        (start, next_start)
    }

    pub fn chunk(&self, idx: usize) -> &Chunk {
        &self.chunks[idx]
    }

    /// Locate a chunk by its starting offset, regardless of validity. Used
    /// by `publish`/`abandon` to re-find a reservation across a lock
    /// release, since a reservation names a location, not a pointer.
    pub fn position_by_offset(&self, offset: u64) -> Option<usize> {
        self.chunks.iter().position(|c| c.offset == offset)
    }

    pub fn chunk_mut(&mut self, idx: usize) -> &mut Chunk {
        &mut self.chunks[idx]
    }

    /// Insert a freshly reserved chunk at `offset`, preserving ascending
    /// order. Returns the chunk's index. Caller is responsible for having
    /// already verified no existing chunk overlaps `[offset, offset+size)`.
    pub fn insert_reserved(&mut self, offset: u64, buffer: Buffer) -> usize {
        let pos = self
            .chunks
            .iter()
            .position(|c| c.offset > offset)
            .unwrap_or(self.chunks.len());
        self.chunks.insert(pos, Chunk::reserved(offset, buffer));
        pos
    }

    /// Remove every valid chunk fully contained in `[offset, offset+size)`
    /// and refund their storage. Chunks only partially overlapping the
    /// range are left intact, since the cache never serves cross-chunk
    /// ranges anyway.
    pub fn invalidate(&mut self, offset: u64, size: u64, allocator: &Allocator) -> u64 {
        let end = offset + size;
        let mut removed = 0u64;
        self.chunks.retain(|c| {
            let fully_contained = c.is_valid() && c.offset >= offset && c.end() <= end;
            if fully_contained {
                allocator.free(c.size());
                removed += 1;
            }
            !fully_contained
        });
        removed
    }

    /// Remove an unpublished (not-yet-valid) chunk at `offset`, refunding
    /// its storage.
    pub fn abandon(&mut self, offset: u64, allocator: &Allocator) -> bool {
        if let Some(pos) = self.chunks.iter().position(|c| c.offset == offset) {
            if !self.chunks[pos].is_valid() {
                let size = self.chunks[pos].size();
                self.chunks.remove(pos);
                allocator.free(size);
                return true;
            }
        }
        false
    }

    #[cfg(test)]
    pub fn assert_ordered(&self) {
        for w in self.chunks.windows(2) {
            assert!(w[0].offset + w[0].size() <= w[1].offset);
        }
    }
}
