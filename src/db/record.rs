// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::EncodeError;
use crate::{UserKey, UserValue};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::hash::Hasher;
use std::io::Write;

/// Byte length of the fixed record prefix (key length, value length,
/// checksum).
pub const RECORD_HEADER_LEN: usize = 2 + 4 + 8;

/// Largest storable key.
pub const MAX_KEY_LEN: usize = 65_535;

/// Largest storable value.
pub const MAX_VALUE_LEN: usize = (u32::MAX - 1) as usize;

/// A single key-value record.
///
/// On disk, every record is framed as a big-endian prefix
/// (`keylen: u16`, `vallen: u32`, `csum: u64`) followed by the raw key
/// and value bytes. The checksum is a siphash-2-4 over
/// `key ‖ value ‖ be64(offset)`, which binds the record to the absolute
/// file position it was written at; a relocated record fails to verify.
#[derive(Debug)]
pub struct Record {
    pub key: UserKey,
    pub value: UserValue,
}

/// Size of a record framing `key_len` key and `value_len` value bytes.
#[must_use]
pub fn encoded_len(key_len: usize, value_len: usize) -> u64 {
    (RECORD_HEADER_LEN + key_len + value_len) as u64
}

/// Writes one framed record, computing the checksum for `offset`.
pub fn encode_into<W: Write>(
    writer: &mut W,
    key: &[u8],
    value: &[u8],
    sip_key: &[u8; 16],
    offset: u64,
) -> Result<(), EncodeError> {
    let csum = checksum(sip_key, key, value, offset);

    #[allow(clippy::cast_possible_truncation)]
    writer.write_u16::<BigEndian>(key.len() as u16)?;

    #[allow(clippy::cast_possible_truncation)]
    writer.write_u32::<BigEndian>(value.len() as u32)?;

    writer.write_u64::<BigEndian>(csum)?;

    writer.write_all(key)?;
    writer.write_all(value)?;

    Ok(())
}

impl Record {
    /// Reads and verifies the record starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `Error::RecordCorrupted` if the prefix carries impossible
    /// lengths or the stored checksum does not match the recomputed one.
    pub fn read_at(file: &File, offset: u64, sip_key: &[u8; 16]) -> crate::Result<Self> {
        let header = crate::file::read_exact_at(file, offset, RECORD_HEADER_LEN)?;
        let mut prefix = header.as_slice();

        let key_len = prefix.read_u16::<BigEndian>()? as usize;
        let value_len = prefix.read_u32::<BigEndian>()? as usize;
        let expected_csum = prefix.read_u64::<BigEndian>()?;

        if key_len == 0 || value_len == 0 {
            return Err(crate::Error::RecordCorrupted { offset });
        }

        let payload = crate::file::read_exact_at(
            file,
            offset + RECORD_HEADER_LEN as u64,
            key_len + value_len,
        )?;

        let (key, value) = payload.split_at(key_len);

        let csum = checksum(sip_key, key, value, offset);
        if csum != expected_csum {
            log::error!(
                "record at offset {offset} is corrupted: checksum {csum:#x}, expected {expected_csum:#x}",
            );
            return Err(crate::Error::RecordCorrupted { offset });
        }

        Ok(Self {
            key: key.into(),
            value: value.into(),
        })
    }
}

/// siphash-2-4 over the record contents and its absolute file offset.
pub(crate) fn checksum(sip_key: &[u8; 16], key: &[u8], value: &[u8], offset: u64) -> u64 {
    let mut hasher = siphasher::sip::SipHasher24::new_with_key(sip_key);

    hasher.write(key);
    hasher.write(value);

    let mut off = [0u8; 8];
    BigEndian::write_u64(&mut off, offset);
    hasher.write(&off);

    hasher.finish()
}
