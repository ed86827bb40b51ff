// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The two hash functions that define the on-disk format.
//!
//! Both are format contracts: the writer and any later reader must agree
//! on them bit-for-bit, so neither may change without a format version
//! bump.

/// Hashes a byte-string key down to the 64-bit key space, seeded with the
/// database salt.
///
/// This is the hash stored implicitly in the offset table: the writer
/// feeds `key_hash` outputs into the perfect-hash builder and the reader
/// recomputes it on every lookup.
#[must_use]
pub fn key_hash(salt: u64, bytes: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64_with_seed(bytes, salt)
}

/// Mixes a 64-bit key for one construction level.
///
/// Each level must see an independent distribution so that keys colliding
/// at level `l` spread differently at level `l + 1`. The level is folded
/// in by bit-rotation; the multiplier and finalizer are one round of the
/// fasthash compression function.
#[must_use]
pub fn level_hash(key: u64, salt: u64, level: u32) -> u64 {
    const M: u64 = 0x8803_55f2_1e6d_1965;

    let mut h = M;
    h ^= mix(key);
    h = h.rotate_left(level);
    h = h.wrapping_mul(M);

    mix(h) ^ salt
}

fn mix(mut x: u64) -> u64 {
    x ^= x >> 23;
    x = x.wrapping_mul(0x2127_599b_f432_5c37);
    x ^= x >> 47;
    x
}
