// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Admission and allocation: decide chunk size, allocate backing memory
//! (DRAM or persistent-memory), charge capacity.

use std::fs::OpenOptions;
use std::io::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::MmapMut;

/// Where chunk bytes physically live.
#[derive(Clone, Debug)]
pub enum Backing {
    Dram,
    PersistentMem { dir: PathBuf },
}

/// An owned chunk buffer. `Dram` is a plain heap allocation; `PersistentMem`
/// is a memory-mapped, per-chunk file rooted at the configured directory.
/// Allocation-only: spec Non-goals explicitly exclude durability of the
/// cache across restarts, so nothing here tries to recover mappings after a
/// crash.
pub enum Buffer {
    Dram(Box<[u8]>),
    PersistentMem {
        map: MmapMut,
        // Kept only so the backing file is unlinked once the last chunk
        // referencing it is dropped; never read after construction.
        _path: PathBuf,
    },
}

impl Buffer {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Dram(b) => b,
            Buffer::PersistentMem { map, .. } => &map[..],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Buffer::Dram(b) => b,
            Buffer::PersistentMem { map, .. } => &mut map[..],
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Buffer::PersistentMem { _path: path, .. } = self {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Tracks `bytes_used` against `capacity_bytes` and allocates chunk buffers
/// from the configured backing.
pub struct Allocator {
    backing: Backing,
    capacity_bytes: u64,
    default_chunk_size: u64,
    bytes_used: AtomicU64,
    next_pmem_id: AtomicU64,
}

impl Allocator {
    pub fn new(backing: Backing, capacity_bytes: u64, default_chunk_size: u64) -> Result<Self> {
        if let Backing::PersistentMem { dir } = &backing {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Allocator {
            backing,
            capacity_bytes,
            default_chunk_size,
            bytes_used: AtomicU64::new(0),
            next_pmem_id: AtomicU64::new(0),
        })
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn bytes_used(&self) -> u64 {
        self.bytes_used.load(Ordering::Relaxed)
    }

    /// `min(default_chunk_size, capacity - bytes_used)`, or `0` if full.
    pub fn admit_size(&self) -> u64 {
        let used = self.bytes_used.load(Ordering::Relaxed);
        if used >= self.capacity_bytes {
            return 0;
        }
        self.default_chunk_size.min(self.capacity_bytes - used)
    }

    /// Allocate `size` bytes and charge `bytes_used`. Returns `None` on
    /// allocation failure; never fatal, accounted via stats by the caller.
    pub fn allocate(&self, size: u64) -> Option<Buffer> {
        if size == 0 {
            return None;
        }
        let buf = match &self.backing {
            Backing::Dram => {
                let v = vec![0u8; size as usize];
                Buffer::Dram(v.into_boxed_slice())
            }
            Backing::PersistentMem { dir } => match self.allocate_pmem(dir, size) {
                Ok(b) => b,
                Err(e) => {
                    error!("persistent-memory allocation failed: {}", e);
                    return None;
                }
            },
        };
        self.bytes_used.fetch_add(size, Ordering::Relaxed);
        Some(buf)
    }

    fn allocate_pmem(&self, dir: &Path, size: u64) -> Result<Buffer> {
        let id = self.next_pmem_id.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("chunk-{:016x}", id));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        file.set_len(size)?;
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Buffer::PersistentMem { map, _path: path })
    }

    /// Refund `size` bytes on free (abandon or invalidation).
    pub fn free(&self, size: u64) {
        self.bytes_used.fetch_sub(size, Ordering::Relaxed);
    }
}
