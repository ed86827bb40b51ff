// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::record::{self, MAX_KEY_LEN, MAX_VALUE_LEN};
use super::{page_align, sip_key, FileHeader, HEADER_SIZE};
use crate::checksum::HashingWriter;
use crate::coding::Encode;
use crate::hash::key_hash;
use crate::mph::{Mph, MIN_PARALLEL_KEYS};
use crate::HashMap;
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempPath;

/// Streams key-value records into a new constant database file.
///
/// Records are appended with [`DbWriter::add`]; once all records are in,
/// [`DbWriter::freeze`] builds the minimal perfect hash, writes the
/// offset table and checksums, and atomically publishes the file under
/// the target path. Until then all writes go to a uniquely-named temp
/// file next to the target, which is removed again if the writer is
/// dropped or aborted without freezing.
pub struct DbWriter {
    file: BufWriter<File>,
    tmp_path: Option<TempPath>,
    path: PathBuf,

    /// Next record position in the file
    offset: u64,

    /// Key hashes in insertion order
    keys: Vec<u64>,

    /// Key hash to record offset, also used to detect duplicates
    record_offsets: HashMap<u64, u64>,

    salt: u64,
    sip_key: [u8; 16],

    frozen: bool,
}

impl DbWriter {
    /// Creates a writer that will publish the database at `path`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn create<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let folder = path.parent().filter(|p| !p.as_os_str().is_empty());

        let tmp = tempfile::NamedTempFile::new_in(folder.unwrap_or_else(|| Path::new(".")))?;
        let (file, tmp_path) = tmp.into_parts();
        let mut file = BufWriter::new(file);

        // Header placeholder; the real header is written during freeze
        file.write_all(&[0u8; HEADER_SIZE])?;

        let salt = rand::random::<u64>();

        log::debug!("dbwriter: created {tmp_path:?} for {path:?}");

        Ok(Self {
            file,
            tmp_path: Some(tmp_path),
            path: path.into(),
            offset: HEADER_SIZE as u64,
            keys: Vec::new(),
            record_offsets: HashMap::default(),
            salt,
            sip_key: sip_key(salt),
            frozen: false,
        })
    }

    /// Number of distinct keys added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no records have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Appends one record.
    ///
    /// Returns `false` (without writing) if a record with the same key
    /// was already added.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyFrozen` after a successful freeze, or an
    /// IO error.
    ///
    /// # Panics
    ///
    /// Panics if the key is empty or longer than 65535 bytes, or the
    /// value is empty or `2^32 - 1` bytes or longer.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> crate::Result<bool> {
        if self.frozen {
            return Err(crate::Error::AlreadyFrozen);
        }

        assert!(!key.is_empty());
        assert!(key.len() <= MAX_KEY_LEN);
        assert!(!value.is_empty());
        assert!(value.len() <= MAX_VALUE_LEN);

        let hash = key_hash(self.salt, key);

        if self.record_offsets.contains_key(&hash) {
            return Ok(false);
        }

        record::encode_into(&mut self.file, key, value, &self.sip_key, self.offset)?;

        self.record_offsets.insert(hash, self.offset);
        self.keys.push(hash);
        self.offset += record::encoded_len(key.len(), value.len());

        Ok(true)
    }

    /// Appends a batch of records, skipping duplicates.
    ///
    /// Returns the number of records actually added.
    ///
    /// # Errors
    ///
    /// Same as [`DbWriter::add`]; records added before the failing one
    /// stay in the file.
    pub fn add_all<K, V, I>(&mut self, pairs: I) -> crate::Result<u64>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut added = 0;

        for (key, value) in pairs {
            if self.add(key.as_ref(), value.as_ref())? {
                added += 1;
            }
        }

        Ok(added)
    }

    /// Builds the minimal perfect hash, writes the offset table, the
    /// hash itself and the file checksum, then atomically renames the
    /// temp file to the target path.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyFrozen` on a second freeze,
    /// `Error::ConstructionLimitExceeded` if `gamma` is too small for
    /// the key set, or an IO error. On error the temp file is abandoned;
    /// the target path is never left partially written.
    pub fn freeze(&mut self, gamma: f64) -> crate::Result<()> {
        if self.frozen {
            return Err(crate::Error::AlreadyFrozen);
        }

        let mph = Mph::build(gamma, &self.keys)?;
        let offsets = self.build_offsets(&mph)?;

        // Align the offset table so readers can memory-map it
        let offtbl = page_align(self.offset);
        self.pad_to(offtbl)?;

        let header = FileHeader {
            salt: self.salt,
            nkeys: self.keys.len() as u64,
            offtbl,
        };
        let header_bytes = header.encode_into_vec();

        // Everything from the offset table onwards runs through a tee
        // that maintains the file checksum; the header was written
        // earlier so it is digested out of band
        let mut tee = HashingWriter::new(&mut self.file);
        tee.digest_only(&header_bytes);

        for &offset in &offsets {
            tee.write_u64::<LittleEndian>(offset)?;
        }

        mph.encode_into(&mut tee)?;

        let (_, digest) = tee.finalize();
        self.file.write_all(digest.as_ref())?;

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header_bytes)?;

        self.file.flush()?;
        self.file.get_ref().sync_all()?;

        #[allow(clippy::expect_used)]
        let tmp_path = self.tmp_path.take().expect("writer is not frozen");
        tmp_path.persist(&self.path).map_err(|e| e.error)?;

        if let Some(folder) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            crate::file::fsync_directory(folder)?;
        }

        self.frozen = true;

        log::debug!(
            "dbwriter: froze {:?} with {} keys, {} mph levels",
            self.path,
            self.keys.len(),
            mph.level_count(),
        );

        Ok(())
    }

    /// Discards the half-built database and removes the temp file.
    ///
    /// Dropping an unfrozen writer has the same effect.
    pub fn abort(mut self) {
        self.tmp_path.take();
    }

    /// Maps every key hash to its record offset, indexed by the perfect
    /// hash. Sharded across CPUs for large key sets; the hash guarantees
    /// the shards write disjoint slots.
    fn build_offsets(&self, mph: &Mph) -> crate::Result<Vec<u64>> {
        let mut offsets = Vec::with_capacity(self.keys.len());
        offsets.resize_with(self.keys.len(), AtomicU64::default);

        if self.keys.len() >= MIN_PARALLEL_KEYS {
            let shards =
                std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
            let chunk_len = self.keys.len().div_ceil(shards);

            let offsets = &offsets;

            std::thread::scope(|s| {
                let handles: Vec<_> = self
                    .keys
                    .chunks(chunk_len)
                    .map(|shard| s.spawn(move || self.assign_offsets(mph, offsets, shard)))
                    .collect();

                // Join in spawn order, so the first error is
                // deterministically the lowest-shard one
                for handle in handles {
                    #[allow(clippy::expect_used)]
                    handle.join().expect("offset worker panicked")?;
                }

                Ok::<_, crate::Error>(())
            })?;
        } else {
            self.assign_offsets(mph, &offsets, &self.keys)?;
        }

        Ok(offsets.into_iter().map(AtomicU64::into_inner).collect())
    }

    fn assign_offsets(
        &self,
        mph: &Mph,
        offsets: &[AtomicU64],
        shard: &[u64],
    ) -> crate::Result<()> {
        for &hash in shard {
            let index = mph
                .find(hash)
                .ok_or(crate::Error::MphIndexMismatch { hash })?;

            let slot = offsets
                .get((index.get() - 1) as usize)
                .ok_or(crate::Error::MphIndexMismatch { hash })?;

            let record_offset = self
                .record_offsets
                .get(&hash)
                .ok_or(crate::Error::MphIndexMismatch { hash })?;

            slot.store(*record_offset, Ordering::Relaxed);
        }

        Ok(())
    }

    fn pad_to(&mut self, target: u64) -> crate::Result<()> {
        debug_assert!(target >= self.offset);

        let zeroes = [0u8; 512];
        let mut remaining = target - self.offset;

        while remaining > 0 {
            let n = (remaining as usize).min(zeroes.len());
            self.file.write_all(zeroes.get(..n).unwrap_or_default())?;
            remaining -= n as u64;
        }

        self.offset = target;
        Ok(())
    }
}
