// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::UserValue;
use quick_cache::sync::Cache as QuickCache;

/// Minimum number of cached records, regardless of the configured capacity
pub const MIN_CACHE_CAPACITY: usize = 128;

/// Cache of decoded records, keyed by the 64-bit key hash
///
/// Lookups that hit the cache skip the seek, the record decode and the
/// integrity check entirely. The cache is safe for concurrent use, so a
/// reader shared across threads needs no extra locking.
pub struct RecordCache {
    /// Concurrent cache implementation
    data: QuickCache<u64, UserValue, quick_cache::UnitWeighter, rustc_hash::FxBuildHasher>,
}

impl RecordCache {
    /// Creates a new cache holding up to `capacity` records
    /// (clamped to at least [`MIN_CACHE_CAPACITY`]).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CACHE_CAPACITY);

        Self {
            data: QuickCache::with(
                capacity,
                capacity as u64,
                quick_cache::UnitWeighter,
                rustc_hash::FxBuildHasher,
                quick_cache::sync::DefaultLifecycle::default(),
            ),
        }
    }

    pub(crate) fn get(&self, key_hash: u64) -> Option<UserValue> {
        self.data.get(&key_hash)
    }

    pub(crate) fn insert(&self, key_hash: u64, value: UserValue) {
        self.data.insert(key_hash, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn record_cache_basic() {
        let cache = RecordCache::with_capacity(0);
        assert_eq!(cache.get(1), None);

        cache.insert(1, b"one".into());
        cache.insert(2, b"two".into());

        assert_eq!(cache.get(1).as_deref(), Some(b"one".as_slice()));
        assert_eq!(cache.get(2).as_deref(), Some(b"two".as_slice()));
        assert_eq!(cache.get(3), None);
    }
}
