// Copyright 2024 The Chunk Engine Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios exercising publish/hit, cross-chunk misses,
//! capacity gating, and invalidation, plus the concurrency properties that
//! don't fit as unit tests inside the implementation modules.

use std::sync::Arc;
use std::thread;

use chunk_cache::{ChunkCache, ChunkCacheSettings, MissOutcome, Outcome, Query};

fn dram_settings(size: u64, hashsize: u32, default_chunk_size: u64) -> ChunkCacheSettings {
    ChunkCacheSettings {
        enabled: true,
        size,
        r#type: "dram".to_string(),
        directory_path: None,
        hashsize,
        default_chunk_size,
    }
}

fn expect_reservation(outcome: Outcome) -> chunk_cache::Reservation {
    match outcome {
        Outcome::Miss(MissOutcome::Reservation(r)) => *r,
        other => panic!("expected a reservation, got {:?}", other),
    }
}

#[test]
fn s1_hit_after_publish() {
    let cache = ChunkCache::new();
    cache
        .configure(&dram_settings(1 << 20, 1024, 4096))
        .unwrap();

    let mut buf = [0u8; 64];
    let q1 = Query::new(b"obj", 0, 100, 64, 1 << 20);
    let outcome = cache.lookup_or_reserve(&q1, &mut buf).unwrap();
    let reservation = expect_reservation(outcome);

    cache.publish(&reservation, &[0xABu8; 4096]).unwrap();

    let q2 = Query::new(b"obj", 0, 100, 64, 1 << 20);
    let outcome = cache.lookup_or_reserve(&q2, &mut buf).unwrap();
    assert!(matches!(outcome, Outcome::Hit));
    assert_eq!(buf, [0xABu8; 64]);
}

#[test]
fn s2_cross_chunk_miss() {
    let cache = ChunkCache::new();
    cache
        .configure(&dram_settings(1 << 20, 1024, 4096))
        .unwrap();

    let mut buf = [0u8; 64];
    let r0 = expect_reservation(
        cache
            .lookup_or_reserve(&Query::new(b"obj", 0, 100, 64, 1 << 20), &mut buf)
            .unwrap(),
    );
    cache.publish(&r0, &[0xABu8; 4096]).unwrap();

    // Spans the [0, 4096) / [4096, ...) boundary: must miss even though
    // both sides are individually cacheable.
    let mut small = [0u8; 16];
    let outcome = cache
        .lookup_or_reserve(&Query::new(b"obj", 0, 4090, 16, 1 << 20), &mut small)
        .unwrap();
    let r1 = expect_reservation(outcome);
    assert_eq!(cache.stats().misses, 2);

    // The existing [0, 4096) chunk blocks admission at the raw query offset
    // (4090); the new reservation must start where that chunk ends instead
    // of overlapping it.
    assert_eq!(r1.offset(), 4096);
    cache.publish(&r1, &[0xCDu8; 4096]).unwrap();

    // A query fully inside the newly published chunk now hits.
    let outcome = cache
        .lookup_or_reserve(&Query::new(b"obj", 0, 4100, 16, 1 << 20), &mut small)
        .unwrap();
    assert!(matches!(outcome, Outcome::Hit));
}

#[test]
fn s3_capacity_gate() {
    let cache = ChunkCache::new();
    cache
        .configure(&dram_settings(8192, 1024, 4096))
        .unwrap();

    let mut buf = [0u8; 1];
    let r0 = expect_reservation(
        cache
            .lookup_or_reserve(&Query::new(b"obj", 0, 0, 1, 1 << 20), &mut buf)
            .unwrap(),
    );
    cache.publish(&r0, &[0u8; 4096]).unwrap();

    let r1 = expect_reservation(
        cache
            .lookup_or_reserve(&Query::new(b"obj", 0, 4096, 1, 1 << 20), &mut buf)
            .unwrap(),
    );
    cache.publish(&r1, &[0u8; 4096]).unwrap();

    assert_eq!(cache.stats().bytes_used, 8192);

    let outcome = cache
        .lookup_or_reserve(&Query::new(b"obj", 0, 8192, 1, 1 << 20), &mut buf)
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Miss(MissOutcome::NoReservation)
    ));
    assert_eq!(cache.stats().bytes_used, 8192);
}

#[test]
fn s4_invalidation() {
    let cache = ChunkCache::new();
    cache
        .configure(&dram_settings(1 << 20, 1024, 4096))
        .unwrap();

    let mut buf = [0u8; 64];
    let r0 = expect_reservation(
        cache
            .lookup_or_reserve(&Query::new(b"obj", 0, 100, 64, 1 << 20), &mut buf)
            .unwrap(),
    );
    cache.publish(&r0, &[0xABu8; 4096]).unwrap();

    cache.invalidate(b"obj", 0, 0, 4096).unwrap();

    let outcome = cache
        .lookup_or_reserve(&Query::new(b"obj", 0, 100, 64, 1 << 20), &mut buf)
        .unwrap();
    assert!(matches!(outcome, Outcome::Miss(MissOutcome::Reservation(_))));
}

#[test]
fn reconfigure_is_rejected() {
    let cache = ChunkCache::new();
    cache
        .configure(&dram_settings(1 << 20, 1024, 4096))
        .unwrap();
    assert!(cache.configure(&dram_settings(1 << 20, 1024, 4096)).is_err());
}

#[test]
fn zero_capacity_is_rejected() {
    let cache = ChunkCache::new();
    assert!(cache.configure(&dram_settings(0, 1024, 4096)).is_err());
}

/// Default settings (`enabled: false, size: 0`) must configure cleanly: a
/// disabled cache has no business validating a capacity nobody asked it to
/// honor, and every operation on it is a standing no-op/miss.
#[test]
fn disabled_by_default_configures_without_validating_capacity() {
    let cache = ChunkCache::new();
    cache.configure(&ChunkCacheSettings::default()).unwrap();

    let mut buf = [0u8; 4];
    let outcome = cache
        .lookup_or_reserve(&Query::new(b"obj", 0, 0, 4, 1 << 20), &mut buf)
        .unwrap();
    assert!(matches!(outcome, Outcome::Miss(MissOutcome::NoReservation)));
    assert_eq!(cache.stats().bytes_used, 0);
}

/// Concurrent `lookup_or_reserve` calls for an identical range yield
/// exactly one reservation *for that range*; other concurrent callers are
/// serialized by the bucket lock and either see a hit (after publish) or a
/// distinct, non-overlapping reservation for the region that's free by the
/// time their turn comes.
#[test]
fn at_most_one_reservation_per_offset_under_contention() {
    let cache = Arc::new(ChunkCache::new());
    cache
        .configure(&dram_settings(1 << 20, 1024, 4096))
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        handles.push(thread::spawn(move || {
            let mut buf = [0u8; 64];
            cache
                .lookup_or_reserve(&Query::new(b"contended", 1, 0, 64, 1 << 20), &mut buf)
                .unwrap()
        }));
    }

    let offsets: Vec<u64> = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter_map(|o| match o {
            Outcome::Miss(MissOutcome::Reservation(r)) => Some(r.offset()),
            _ => None,
        })
        .collect();

    let at_offset_zero = offsets.iter().filter(|&&o| o == 0).count();
    assert_eq!(at_offset_zero, 1, "only one reservation should land at the queried offset");

    let mut sorted = offsets.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(
        sorted.len(),
        offsets.len(),
        "no two reservations should land at the same offset"
    );
}

/// Spec §8 property 3: bytes_used never exceeds capacity, even under
/// concurrent admission across many distinct offsets.
#[test]
fn capacity_bound_holds_under_contention() {
    let cache = Arc::new(ChunkCache::new());
    let capacity = 64 * 1024;
    cache.configure(&dram_settings(capacity, 1024, 4096)).unwrap();

    let mut handles = Vec::new();
    for i in 0..64u64 {
        let cache = cache.clone();
        handles.push(thread::spawn(move || {
            let mut buf = [0u8; 1];
            let _ = cache.lookup_or_reserve(
                &Query::new(b"wide", 9, i * 4096, 1, 1 << 30),
                &mut buf,
            );
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert!(cache.stats().bytes_used <= capacity);
}
