// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Mph, MAX_LEVEL};
use crate::bit_vec::BitVec;
use crate::hash::level_hash;
use std::sync::Mutex;

/// Default bit vector expansion factor per level.
///
/// Empirically a good balance between construction speed and space;
/// larger values converge in fewer levels at the cost of bigger tables.
pub const DEFAULT_GAMMA: f64 = 2.0;

/// Minimum number of keys in a level before the build shards it across
/// threads; smaller levels are cheaper to do serially.
pub const MIN_PARALLEL_KEYS: usize = 20_000;

impl Mph {
    /// Builds a minimal perfect hash over `keys` with a random salt.
    ///
    /// The keys must be distinct. Gamma values `<= 1.0` are clamped to
    /// [`DEFAULT_GAMMA`]. Levels with at least [`MIN_PARALLEL_KEYS`]
    /// remaining keys are built on all CPUs.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConstructionLimitExceeded` if the construction
    /// does not converge within [`MAX_LEVEL`] levels.
    pub fn build(gamma: f64, keys: &[u64]) -> crate::Result<Self> {
        Self::build_seeded(gamma, keys, rand::random())
    }

    /// Builds a minimal perfect hash over `keys` with a caller-chosen
    /// salt.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConstructionLimitExceeded` if the construction
    /// does not converge within [`MAX_LEVEL`] levels.
    pub fn build_seeded(gamma: f64, keys: &[u64], salt: u64) -> crate::Result<Self> {
        let gamma = if gamma <= 1.0 { DEFAULT_GAMMA } else { gamma };

        let mut levels: Vec<BitVec> = Vec::new();

        // An empty build set still yields one (empty) level so the
        // serialized form stays valid and `find` is total
        let mut current: Vec<u64> = keys.to_vec();
        if current.is_empty() {
            levels.push(BitVec::with_capacity(0, gamma));
        }

        while !current.is_empty() {
            if levels.len() >= MAX_LEVEL {
                return Err(crate::Error::ConstructionLimitExceeded {
                    levels: levels.len(),
                });
            }

            #[allow(clippy::cast_possible_truncation)]
            let level = levels.len() as u32;

            let table = BitVec::with_capacity(current.len(), gamma);
            let collisions = BitVec::with_capacity(current.len(), gamma);

            let redo = if current.len() >= MIN_PARALLEL_KEYS {
                build_level_parallel(&table, &collisions, &current, salt, level)
            } else {
                build_level_serial(&table, &collisions, &current, salt, level)
            };

            log::trace!(
                "mph: level {level}: placed {} of {} keys",
                current.len() - redo.len(),
                current.len(),
            );

            levels.push(table);
            current = redo;
        }

        log::debug!(
            "mph: built over {} keys in {} levels",
            keys.len(),
            levels.len()
        );

        Ok(Self::from_levels(levels, salt))
    }
}

/// Runs both construction phases over one level without threading.
fn build_level_serial(
    table: &BitVec,
    collisions: &BitVec,
    keys: &[u64],
    salt: u64,
    level: u32,
) -> Vec<u64> {
    mark_collisions(table, collisions, keys, salt, level);

    table.reset();

    let mut redo = Vec::new();
    assign(table, collisions, keys, salt, level, &mut redo);
    redo
}

/// Runs both construction phases sharded across all CPUs.
///
/// The scope join after each phase is the barrier the algorithm requires:
/// no shard starts assigning until every shard has finished collision
/// marking, and the table reset happens between the two on one thread.
fn build_level_parallel(
    table: &BitVec,
    collisions: &BitVec,
    keys: &[u64],
    salt: u64,
    level: u32,
) -> Vec<u64> {
    let shards = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    let chunk_len = keys.len().div_ceil(shards);

    std::thread::scope(|s| {
        for shard in keys.chunks(chunk_len) {
            s.spawn(move || mark_collisions(table, collisions, shard, salt, level));
        }
    });

    table.reset();

    let redo = Mutex::new(Vec::new());

    std::thread::scope(|s| {
        for shard in keys.chunks(chunk_len) {
            let redo = &redo;

            s.spawn(move || {
                let mut local = Vec::new();
                assign(table, collisions, shard, salt, level, &mut local);

                if !local.is_empty() {
                    #[allow(clippy::expect_used)]
                    redo.lock().expect("lock is poisoned").append(&mut local);
                }
            });
        }
    });

    #[allow(clippy::expect_used)]
    redo.into_inner().expect("lock is poisoned")
}

/// Phase 1: set each key's bit; where two keys land on the same bit,
/// record the position in `collisions` instead.
///
/// After this phase, a set bit in `table` that is clear in `collisions`
/// was reached by exactly one key.
fn mark_collisions(table: &BitVec, collisions: &BitVec, keys: &[u64], salt: u64, level: u32) {
    let size = table.bit_count();

    for &key in keys {
        let idx = level_hash(key, salt, level) % size;

        if collisions.is_set(idx) {
            continue;
        }
        if !table.set(idx) {
            collisions.set(idx);
        }
    }
}

/// Phase 2: re-walk the keys over the reset table; keys on colliding
/// positions are deferred to the next level, the rest keep their bit.
fn assign(
    table: &BitVec,
    collisions: &BitVec,
    keys: &[u64],
    salt: u64,
    level: u32,
    redo: &mut Vec<u64>,
) {
    let size = table.bit_count();

    for &key in keys {
        let idx = level_hash(key, salt, level) % size;

        if collisions.is_set(idx) {
            redo.push(key);
        } else {
            table.set(idx);
        }
    }
}
