// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::record::Record;
use super::{sip_key, FileHeader, HEADER_SIZE};
use crate::cache::RecordCache;
use crate::checksum::{Checksum, CHECKSUM_SIZE};
use crate::coding::{Decode, DecodeError};
use crate::hash::key_hash;
use crate::mph::Mph;
use crate::UserValue;
use byteorder::{ByteOrder, LittleEndian};
use memmap2::{Mmap, MmapOptions};
use sha2::{Digest, Sha512_256};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Query interface over a previously frozen constant database.
///
/// Opening validates the whole-file checksum, memory-maps the offset
/// table and reconstructs the minimal perfect hash; afterwards every
/// lookup costs one hash evaluation and at most one seek. Lookups are
/// safe from many threads at once — all state is read-only except the
/// record cache, which synchronizes internally.
///
/// Dropping the reader unmaps the offset table, closes the file and
/// discards the cache.
pub struct DbReader {
    file: File,

    /// Read-only map of the file prefix up to the end of the offset
    /// table; `None` for an empty database
    mmap: Option<Mmap>,

    offtbl: u64,
    nkeys: u64,

    mph: Mph,
    cache: RecordCache,

    salt: u64,
    sip_key: [u8; 16],
}

impl DbReader {
    /// Opens and validates the database at `path`.
    ///
    /// Up to `cache_capacity` decoded records are kept in memory
    /// (clamped to at least [`crate::MIN_CACHE_CAPACITY`]).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeader` for files that are too small,
    /// carry the wrong magic or impossible offsets, and
    /// `Error::ChecksumMismatch` if the metadata digest does not match
    /// the trailer.
    pub fn open<P: AsRef<Path>>(path: P, cache_capacity: usize) -> crate::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let file_len = file.metadata()?.len();
        if file_len < (HEADER_SIZE + CHECKSUM_SIZE) as u64 {
            return Err(crate::Error::InvalidHeader("FileTooSmall"));
        }

        let header_bytes = crate::file::read_exact_at(&file, 0, HEADER_SIZE)?;
        let header = FileHeader::decode_from(&mut &header_bytes[..]).map_err(|e| match e {
            DecodeError::InvalidHeader(name) => crate::Error::InvalidHeader(name),
            e => crate::Error::Decode(e),
        })?;
        header.validate(file_len)?;

        verify_checksum(&file, &header_bytes, header.offtbl, file_len)?;

        // The metadata is now known good; map the prefix covering the
        // offset table (mapping from position zero keeps the map offset
        // page-aligned on every host)
        let tbl_len = header.nkeys * 8;
        let mmap = if header.nkeys == 0 {
            None
        } else {
            #[allow(unsafe_code)]
            let map = unsafe {
                MmapOptions::new()
                    .len((header.offtbl + tbl_len) as usize)
                    .map(&file)?
            };
            Some(map)
        };

        let mut reader = BufReader::new(&file);
        reader.seek(SeekFrom::Start(header.offtbl + tbl_len))?;
        let mph = Mph::decode_from(&mut reader)?;

        log::debug!(
            "dbreader: opened {path:?} with {} keys, {} mph levels",
            header.nkeys,
            mph.level_count(),
        );

        Ok(Self {
            file,
            mmap,
            offtbl: header.offtbl,
            nkeys: header.nkeys,
            mph,
            cache: RecordCache::with_capacity(cache_capacity),
            salt: header.salt,
            sip_key: sip_key(header.salt),
        })
    }

    /// Number of records in the database.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nkeys as usize
    }

    /// Returns `true` if the database holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nkeys == 0
    }

    /// Looks up `key` and returns its value.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyNotFound` if the key was not stored,
    /// `Error::RecordCorrupted` if the record on disk fails its
    /// integrity check, or an IO error. Lookup errors leave the reader
    /// usable.
    pub fn find(&self, key: &[u8]) -> crate::Result<UserValue> {
        let hash = key_hash(self.salt, key);

        if let Some(value) = self.cache.get(hash) {
            return Ok(value);
        }

        let index = self.mph.find(hash).ok_or(crate::Error::KeyNotFound)?;
        let offset = self.record_offset(index.get() - 1)?;

        let record = Record::read_at(&self.file, offset, &self.sip_key)?;

        // The perfect hash is only meaningful for stored keys; a foreign
        // key can map onto a valid slot, so the resolved record must
        // hash back to the queried key
        if key_hash(self.salt, &record.key) != hash {
            return Err(crate::Error::KeyNotFound);
        }

        self.cache.insert(hash, record.value.clone());

        Ok(record.value)
    }

    /// Looks up `key`, folding every failure into `None`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<UserValue> {
        self.find(key).ok()
    }

    /// Reads entry `index` of the memory-mapped offset table.
    ///
    /// Stored little-endian; decoding through `from_le` bytes is a plain
    /// load on little-endian hosts and a byte swap on big-endian ones.
    fn record_offset(&self, index: u64) -> crate::Result<u64> {
        let mmap = self.mmap.as_ref().ok_or(crate::Error::KeyNotFound)?;

        let start = (self.offtbl + index * 8) as usize;
        let bytes = mmap
            .get(start..start + 8)
            .ok_or(crate::Error::KeyNotFound)?;

        Ok(LittleEndian::read_u64(bytes))
    }
}

/// Recomputes the SHA-512/256 over (header ‖ metadata region) and
/// compares it with the trailer in constant time.
fn verify_checksum(
    file: &File,
    header_bytes: &[u8],
    offtbl: u64,
    file_len: u64,
) -> crate::Result<()> {
    let mut hasher = Sha512_256::new();
    hasher.update(header_bytes);

    let meta_len = file_len - CHECKSUM_SIZE as u64 - offtbl;

    let mut reader = &*file;
    reader.seek(SeekFrom::Start(offtbl))?;

    let copied = std::io::copy(&mut reader.take(meta_len), &mut hasher)?;
    if copied != meta_len {
        return Err(crate::Error::InvalidHeader("MetadataTruncated"));
    }

    let trailer =
        crate::file::read_exact_at(file, file_len - CHECKSUM_SIZE as u64, CHECKSUM_SIZE)?;
    let mut expected = [0u8; CHECKSUM_SIZE];
    expected.copy_from_slice(&trailer);

    let got = Checksum::from_digest(hasher);
    got.check(Checksum::from(expected))
}
