// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A constant key-value database built on a minimal perfect hash.
//!
//! ##### About
//!
//! This crate builds read-only databases over a fixed set of byte-string
//! keys. A [BBHash](https://arxiv.org/abs/1702.03154) minimal perfect
//! hash maps every stored key to a distinct slot of a memory-mapped
//! offset table, so any key resolves to its record with one hash
//! evaluation and a single seek. Records carry individual siphash-2-4
//! checksums bound to their file position, and the file metadata is
//! sealed with a SHA-512/256 trailer that is verified on open.
//!
//! Keys are limited to 65535 bytes, values to 2^32 - 2 bytes. Databases
//! are immutable once frozen: there is no update, deletion or iteration,
//! only lookup. Lookups for keys that were never stored are detected and
//! answered with `KeyNotFound`.
//!
//! # Example usage
//!
//! ```
//! use constdb::{DbReader, DbWriter};
//! #
//! # let folder = tempfile::tempdir()?;
//! # let path = folder.path().join("hosts.db");
//!
//! let mut writer = DbWriter::create(&path)?;
//! writer.add(b"web-01", b"10.0.0.1")?;
//! writer.add(b"web-02", b"10.0.0.2")?;
//! writer.freeze(/* gamma */ 2.0)?;
//!
//! let reader = DbReader::open(&path, /* cached records */ 1_000)?;
//!
//! let value = reader.find(b"web-01")?;
//! assert_eq!(b"10.0.0.1", &*value);
//!
//! assert!(reader.get(b"web-03").is_none());
//! #
//! # Ok::<(), constdb::Error>(())
//! ```

#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

pub(crate) type HashMap<K, V> = std::collections::HashMap<K, V, rustc_hash::FxBuildHasher>;

#[doc(hidden)]
pub mod bit_vec;

mod cache;

#[doc(hidden)]
pub mod coding;

mod checksum;
mod db;
mod error;

#[doc(hidden)]
pub mod file;

mod hash;
mod mph;
mod slice;

pub use {
    cache::MIN_CACHE_CAPACITY,
    checksum::Checksum,
    coding::{DecodeError, EncodeError},
    db::{DbReader, DbWriter},
    error::{Error, Result},
    mph::{Mph, DEFAULT_GAMMA, MAX_LEVEL, MIN_PARALLEL_KEYS},
    slice::Slice,
};

#[doc(hidden)]
pub use hash::key_hash;

/// User defined key
pub type UserKey = Slice;

/// User defined data (byte array)
pub type UserValue = Slice;
