// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! A stable 64-bit hash over `(name, object-id)`.
//!
//! Spec §4.A only requires "good avalanche", not a named algorithm, and
//! forbids callers from depending on which one is in use. We use `ahash`
//! with fixed keys instead of its default random-per-process seeding, so
//! that `hash64` is reproducible across runs of the same process (useful
//! for the deterministic-replay tests that also exercise the cache).

use std::hash::{Hash, Hasher};

use ahash::RandomState;

// Arbitrary fixed keys. Not secret, not meant to resist adversarial input;
// only meant to pin down ahash's otherwise per-process-random seeding.
const KEY_0: u64 = 0x9E37_79B9_7F4A_7C15;
const KEY_1: u64 = 0xC2B2_AE3D_27D4_EB4F;
const KEY_2: u64 = 0x1656_67B1_9E37_79F9;
const KEY_3: u64 = 0xFF51_AFD7_ED55_8CCD;

lazy_static::lazy_static! {
    static ref HASH_STATE: RandomState = RandomState::with_seeds(KEY_0, KEY_1, KEY_2, KEY_3);
}

/// Hash an object's `(name, object_id)` identity. `name` should already be
/// truncated to `NAMEMAX` bytes by the caller.
pub fn hash64(name: &[u8], object_id: u64) -> u64 {
    let mut hasher = HASH_STATE.build_hasher();
    name.hash(&mut hasher);
    object_id.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_within_process() {
        let a = hash64(b"object-a", 7);
        let b = hash64(b"object-a", 7);
        assert_eq!(a, b);
    }

    #[test]
    fn distinguishes_name_and_id() {
        let a = hash64(b"object-a", 7);
        let b = hash64(b"object-a", 8);
        let c = hash64(b"object-b", 7);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
