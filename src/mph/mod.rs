// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Minimal perfect hashing for fixed sets of 64-bit keys.
//!
//! Implements the BBHash algorithm (<https://arxiv.org/abs/1702.03154>):
//! a stack of bit vectors, one per construction level, where each key in
//! the build set is represented by exactly one set bit. The image of a
//! key is its level's rank offset plus the rank of its bit, which maps
//! the N build keys bijectively onto `1..=N`.

mod builder;

use crate::bit_vec::BitVec;
use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use crate::hash::level_hash;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use std::num::NonZeroU64;

pub use builder::{DEFAULT_GAMMA, MIN_PARALLEL_KEYS};

/// Maximum number of construction levels before giving up.
///
/// Each level reduces the surviving key count exponentially, so hitting
/// this limit means gamma is far too small for the key set.
pub const MAX_LEVEL: usize = 200;

/// Serialization version of [`Mph`]; implies the hash functions in
/// [`crate::hash`].
const FORMAT_VERSION: u64 = 1;

/// Byte length of the serialized header (version, levels, salt, reserved).
const HEADER_LEN: u64 = 4 * 8;

/// A computed minimal perfect hash over a fixed set of 64-bit keys.
///
/// Built once with [`Mph::build`]; afterwards [`Mph::find`] maps every
/// key of the build set to a distinct index in `1..=N` in constant time.
/// The mapping is only meaningful for keys that were part of the build
/// set — foreign keys may map anywhere, so callers that need certainty
/// must verify the resolved entry themselves.
pub struct Mph {
    levels: Vec<BitVec>,

    /// `ranks[l]` is the number of keys placed on levels `< l`
    ranks: Vec<u64>,

    salt: u64,
}

impl Mph {
    pub(crate) fn from_levels(levels: Vec<BitVec>, salt: u64) -> Self {
        let ranks = compute_ranks(&levels);

        Self {
            levels,
            ranks,
            salt,
        }
    }

    /// Returns the unique index in `1..=N` for a key of the build set.
    ///
    /// Returns `None` if no level holds the key, which for build-set keys
    /// cannot happen and for foreign keys means "definitely absent"
    /// (the converse does not hold).
    #[must_use]
    pub fn find(&self, key: u64) -> Option<NonZeroU64> {
        for (level, (bv, rank)) in self.levels.iter().zip(&self.ranks).enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let idx = level_hash(key, self.salt, level as u32) % bv.bit_count();

            if bv.is_set(idx) {
                return NonZeroU64::new(1 + rank + bv.rank(idx));
            }
        }

        None
    }

    /// The salt all levels were hashed with.
    #[must_use]
    pub fn salt(&self) -> u64 {
        self.salt
    }

    /// Number of construction levels.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of keys this hash was built over.
    #[must_use]
    pub fn key_count(&self) -> u64 {
        self.levels.iter().map(BitVec::popcount).sum()
    }

    /// Exact byte length of the serialized form.
    #[must_use]
    pub fn serialized_len(&self) -> u64 {
        HEADER_LEN
            + self
                .levels
                .iter()
                .map(|bv| 8 * (1 + bv.word_count()))
                .sum::<u64>()
    }

    #[cfg(test)]
    pub(crate) fn levels(&self) -> &[BitVec] {
        &self.levels
    }

    #[cfg(test)]
    pub(crate) fn ranks(&self) -> &[u64] {
        &self.ranks
    }
}

impl std::fmt::Display for Mph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Mph: salt {:#x}; {} levels",
            self.salt,
            self.levels.len()
        )?;

        for (i, bv) in self.levels.iter().enumerate() {
            writeln!(f, "  {i}: {} bits", bv.bit_count())?;
        }

        Ok(())
    }
}

impl Encode for Mph {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u64::<LittleEndian>(FORMAT_VERSION)?;
        writer.write_u64::<LittleEndian>(self.levels.len() as u64)?;
        writer.write_u64::<LittleEndian>(self.salt)?;
        writer.write_u64::<LittleEndian>(0)?;

        for bv in &self.levels {
            bv.encode_into(writer)?;
        }

        // Ranks are not stored; they are recomputed on decode

        Ok(())
    }
}

impl Decode for Mph {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let version = reader.read_u64::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let level_count = reader.read_u64::<LittleEndian>()?;
        if level_count == 0 || level_count > MAX_LEVEL as u64 {
            return Err(DecodeError::InvalidLength(("MphLevels", level_count)));
        }

        let salt = reader.read_u64::<LittleEndian>()?;
        let _reserved = reader.read_u64::<LittleEndian>()?;

        let mut levels = Vec::with_capacity(level_count as usize);
        for _ in 0..level_count {
            levels.push(BitVec::decode_from(reader)?);
        }

        Ok(Self::from_levels(levels, salt))
    }
}

fn compute_ranks(levels: &[BitVec]) -> Vec<u64> {
    let mut placed: u64 = 0;

    levels
        .iter()
        .map(|bv| {
            let rank = placed;
            placed += bv.popcount();
            rank
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::hash::key_hash;
    use test_log::test;

    const WORDS: [&str; 10] = [
        "expectoration",
        "mizzenmastman",
        "stockfather",
        "pictorialness",
        "villainous",
        "unquality",
        "sized",
        "Tarahumari",
        "endocrinotherapy",
        "quicksandy",
    ];

    fn word_keys() -> Vec<u64> {
        WORDS
            .iter()
            .map(|w| key_hash(0xdead_beef_baad_f00d, w.as_bytes()))
            .collect()
    }

    #[test]
    fn mph_is_minimal_and_perfect() {
        let keys = word_keys();
        let mph = Mph::build(2.0, &keys).unwrap();

        let mut seen: Vec<u64> = keys
            .iter()
            .map(|&k| mph.find(k).expect("build-set key must map").get())
            .collect();
        seen.sort_unstable();

        let expected: Vec<u64> = (1..=keys.len() as u64).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn mph_find_is_stable() {
        let keys = word_keys();
        let mph = Mph::build(2.0, &keys).unwrap();

        for &k in &keys {
            assert_eq!(mph.find(k), mph.find(k));
        }
    }

    #[test]
    fn mph_codec_round_trip() {
        let keys = word_keys();
        let mph = Mph::build_seeded(2.0, &keys, 0x0123_4567_89ab_cdef).unwrap();

        let bytes = mph.encode_into_vec();
        assert_eq!(bytes.len() as u64, mph.serialized_len());

        let decoded = Mph::decode_from(&mut &bytes[..]).unwrap();

        assert_eq!(decoded.salt(), mph.salt());
        assert_eq!(decoded.level_count(), mph.level_count());
        assert_eq!(decoded.ranks(), mph.ranks());

        for (a, b) in mph.levels().iter().zip(decoded.levels()) {
            assert_eq!(a, b);
        }

        for &k in &keys {
            assert_eq!(mph.find(k), decoded.find(k));
        }
    }

    #[test]
    fn mph_decode_rejects_bad_version() {
        let keys = word_keys();
        let mph = Mph::build(2.0, &keys).unwrap();

        let mut bytes = mph.encode_into_vec();
        bytes[0] = 9;

        assert!(matches!(
            Mph::decode_from(&mut &bytes[..]),
            Err(DecodeError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn mph_decode_rejects_truncation() {
        let keys = word_keys();
        let mph = Mph::build(2.0, &keys).unwrap();

        let bytes = mph.encode_into_vec();
        let truncated = &bytes[..bytes.len() - 4];

        assert!(matches!(
            Mph::decode_from(&mut &truncated[..]),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn mph_single_key() {
        let mph = Mph::build(2.0, &[0xfeed_face]).unwrap();

        assert_eq!(mph.level_count(), 1);
        assert_eq!(mph.find(0xfeed_face).map(NonZeroU64::get), Some(1));
    }
}
