// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! Hash buckets: a collision chain of per-object `ChunkChain`s, guarded by
//! one lock. Bucket locks serialize all structural changes to a bucket's
//! chains and to chunk validity within it.

use std::sync::Mutex;

use crate::chain::ChunkChain;
use crate::key::ObjectKey;

#[derive(Default)]
pub struct BucketInner {
    chains: Vec<ChunkChain>,
}

impl BucketInner {
    pub fn find_chain(&self, key: &ObjectKey) -> Option<usize> {
        self.chains.iter().position(|c| c.key() == key)
    }

    pub fn chain(&self, idx: usize) -> &ChunkChain {
        &self.chains[idx]
    }

    pub fn chain_mut(&mut self, idx: usize) -> &mut ChunkChain {
        &mut self.chains[idx]
    }

    /// Find the chain for `key`, creating an empty one if absent. A chain
    /// for a given key appears in at most one bucket, by construction: the
    /// caller always indexes buckets by `key.bucket_index()`.
    pub fn find_or_create_chain(&mut self, key: &ObjectKey) -> usize {
        if let Some(idx) = self.find_chain(key) {
            return idx;
        }
        self.chains.push(ChunkChain::new(key.clone()));
        self.chains.len() - 1
    }

    /// Drop chains that have gone empty; a chain is destroyed once its
    /// last chunk is invalidated or abandoned.
    pub fn prune_empty(&mut self) {
        self.chains.retain(|c| !c.is_empty());
    }

    pub fn chains_matching<'a>(&'a self, key: &'a ObjectKey) -> impl Iterator<Item = &'a ChunkChain> {
        self.chains.iter().filter(move |c| c.key() == key)
    }

    pub fn chains_matching_mut<'a>(
        &'a mut self,
        key: &'a ObjectKey,
    ) -> impl Iterator<Item = &'a mut ChunkChain> {
        self.chains.iter_mut().filter(move |c| c.key() == key)
    }
}

/// One hash bucket: an exclusive lock guarding a collision chain of chains.
pub struct Bucket {
    inner: Mutex<BucketInner>,
}

impl Default for Bucket {
    fn default() -> Self {
        Bucket {
            inner: Mutex::new(BucketInner::default()),
        }
    }
}

impl Bucket {
    pub fn lock(&self) -> std::sync::MutexGuard<'_, BucketInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
