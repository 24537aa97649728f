// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Hash and key: `hash_id := (name[..NAMEMAX], object-id)`, `bucket :=
//! hash64(hash_id) mod bucket_count`.

use engine_api::NAMEMAX;
use engine_utils::hash::hash64;

/// Identity of a backing object: a name (truncated to `NAMEMAX` bytes) plus
/// an object id. Equality is byte-exact.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ObjectKey {
    name: Vec<u8>,
    object_id: u64,
}

impl ObjectKey {
    pub fn new(name: &[u8], object_id: u64) -> Self {
        let len = name.len().min(NAMEMAX);
        ObjectKey {
            name: name[..len].to_vec(),
            object_id,
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn object_id(&self) -> u64 {
        self.object_id
    }

    /// Index of the bucket this key's chain lives in.
    pub fn bucket_index(&self, bucket_count: u32) -> usize {
        (hash64(&self.name, self.object_id) % bucket_count as u64) as usize
    }
}

/// A fully-specified query: which object, which byte range.
#[derive(Clone, Debug)]
pub struct Query {
    pub key: ObjectKey,
    pub offset: u64,
    pub size: u64,
    /// Size of the backing object, as known to the caller. Used to clamp
    /// admission at the object's end (`backing_object_size - q.offset`);
    /// the cache has no other way to learn this, since it never reads the
    /// backing store itself.
    pub backing_object_size: u64,
}

impl Query {
    pub fn new(name: &[u8], object_id: u64, offset: u64, size: u64, backing_object_size: u64) -> Self {
        Query {
            key: ObjectKey::new(name, object_id),
            offset,
            size,
            backing_object_size,
        }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}
