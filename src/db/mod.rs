// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The constant database: a file of immutable key-value records resolved
//! through a minimal perfect hash.
//!
//! File layout:
//!
//! ```text
//! [ 0..64 )              file header (big-endian)
//! [ 64..offtbl )         contiguous record stream, then zero padding
//! [ offtbl..offtbl+8n )  offset table, n little-endian u64s
//! [ offtbl+8n..len-32 )  serialized minimal perfect hash
//! [ len-32..len )        SHA-512/256 over (header ‖ offset table ‖ mph)
//! ```
//!
//! The header, record prefixes and checksums are big-endian; the offset
//! table is little-endian so readers on little-endian hosts can consume
//! the memory-mapped region without byte swapping.

mod record;
mod reader;
mod writer;

pub use reader::DbReader;
pub use writer::DbWriter;

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub const MAGIC_BYTES: [u8; 4] = [b'B', b'B', b'H', b'H'];

/// Byte length of the file header.
pub const HEADER_SIZE: usize = 64;

/// The offset table is aligned to this boundary so it can be memory
/// mapped; fixed by the format, not by the host page size.
pub const PAGE_SIZE: u64 = 4096;

/// The 64-byte header at the start of every database file.
///
/// Encoded big-endian: magic, 4 zero flag bytes, salt, key count, offset
/// table position, then four reserved words.
#[derive(Debug, Eq, PartialEq)]
pub struct FileHeader {
    /// Salt for the byte-string key hash and the record checksums
    pub salt: u64,

    /// Number of records in the file
    pub nkeys: u64,

    /// Absolute position of the offset table
    pub offtbl: u64,
}

impl FileHeader {
    /// Validates the decoded fields against the actual file length.
    pub(crate) fn validate(&self, file_len: u64) -> crate::Result<()> {
        let trailer_start = file_len - crate::checksum::CHECKSUM_SIZE as u64;

        if self.offtbl < HEADER_SIZE as u64 || self.offtbl >= trailer_start {
            return Err(crate::Error::InvalidHeader("OfftblOutOfRange"));
        }

        // The offset table must fit between offtbl and the trailer
        let Some(tbl_len) = self.nkeys.checked_mul(8) else {
            return Err(crate::Error::InvalidHeader("KeyCountOverflow"));
        };
        if self.offtbl + tbl_len > trailer_start {
            return Err(crate::Error::InvalidHeader("OffsetTableTruncated"));
        }

        Ok(())
    }
}

impl Encode for FileHeader {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_all(&MAGIC_BYTES)?;
        writer.write_u32::<BigEndian>(0)?; // flags

        writer.write_u64::<BigEndian>(self.salt)?;
        writer.write_u64::<BigEndian>(self.nkeys)?;
        writer.write_u64::<BigEndian>(self.offtbl)?;

        // Reserved words
        for _ in 0..4 {
            writer.write_u64::<BigEndian>(0)?;
        }

        Ok(())
    }
}

impl Decode for FileHeader {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut magic = [0u8; MAGIC_BYTES.len()];
        reader.read_exact(&mut magic)?;

        if magic != MAGIC_BYTES {
            return Err(DecodeError::InvalidHeader("Db"));
        }

        let _flags = reader.read_u32::<BigEndian>()?;

        let salt = reader.read_u64::<BigEndian>()?;
        let nkeys = reader.read_u64::<BigEndian>()?;
        let offtbl = reader.read_u64::<BigEndian>()?;

        for _ in 0..4 {
            let _reserved = reader.read_u64::<BigEndian>()?;
        }

        Ok(Self {
            salt,
            nkeys,
            offtbl,
        })
    }
}

/// Derives the 16-byte siphash key from the database salt.
pub(crate) fn sip_key(salt: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&salt.to_be_bytes());
    key[8..].copy_from_slice(&(!salt).to_be_bytes());
    key
}

/// Rounds `offset` up to the next page boundary.
pub(crate) fn page_align(offset: u64) -> u64 {
    (offset + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}
