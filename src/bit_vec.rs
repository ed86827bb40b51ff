// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Fixed-size bit vectors with atomic mutation and rank queries.

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};

/// Largest number of 64-bit words a serialized bit vector may declare.
const MAX_WORDS: u64 = 1 << 32;

/// Fixed-size bit vector backed by atomic 64-bit words.
///
/// Many threads may `set` arbitrary bits concurrently during perfect-hash
/// construction; mutation goes through a compare-and-swap loop on the
/// owning word, reads through atomic loads. Once construction has
/// finished (see [`BitVec::popcount`] being cached by the owner) the
/// vector is treated as immutable.
pub struct BitVec {
    words: Box<[AtomicU64]>,
}

impl std::fmt::Debug for BitVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BitVec({} bits, {} set)", self.bit_count(), self.popcount())
    }
}

impl PartialEq for BitVec {
    fn eq(&self, other: &Self) -> bool {
        self.word_count() == other.word_count()
            && self
                .words
                .iter()
                .zip(other.words.iter())
                .all(|(a, b)| a.load(Ordering::Relaxed) == b.load(Ordering::Relaxed))
    }
}

impl Eq for BitVec {}

impl BitVec {
    /// Creates a bit vector holding at least `bit_count * gamma` bits,
    /// rounded up to the next multiple of 64 (and at least one word, so
    /// the serialized form is always valid).
    #[must_use]
    pub fn with_capacity(bit_count: usize, gamma: f64) -> Self {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let bits = ((bit_count as f64) * gamma).ceil() as u64;
        let words = (bits.div_ceil(64)).max(1) as usize;

        Self::with_word_count(words)
    }

    fn with_word_count(words: usize) -> Self {
        let mut v = Vec::with_capacity(words);
        v.resize_with(words, AtomicU64::default);

        Self {
            words: v.into_boxed_slice(),
        }
    }

    /// Number of bits in this vector (always a multiple of 64).
    #[must_use]
    pub fn bit_count(&self) -> u64 {
        self.word_count() * 64
    }

    /// Number of 64-bit words backing this vector.
    #[must_use]
    pub fn word_count(&self) -> u64 {
        self.words.len() as u64
    }

    /// Sets bit `idx`, returning `true` if it was previously clear.
    ///
    /// The check and the set are one linearizable step: when two threads
    /// race on the same bit, exactly one of them observes "previously
    /// clear".
    pub fn set(&self, idx: u64) -> bool {
        let mask = 1u64 << (idx % 64);
        let word = self.word(idx);

        let mut cur = word.load(Ordering::Relaxed);
        loop {
            if cur & mask != 0 {
                return false;
            }
            match word.compare_exchange_weak(
                cur,
                cur | mask,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(seen) => cur = seen,
            }
        }
    }

    /// Returns whether bit `idx` is set.
    #[must_use]
    pub fn is_set(&self, idx: u64) -> bool {
        let w = self.word(idx).load(Ordering::Relaxed);
        (w >> (idx % 64)) & 1 == 1
    }

    /// Clears all bits.
    pub fn reset(&self) {
        for w in &self.words {
            w.store(0, Ordering::Relaxed);
        }
    }

    /// Number of set bits in the whole vector.
    #[must_use]
    pub fn popcount(&self) -> u64 {
        self.words
            .iter()
            .map(|w| u64::from(w.load(Ordering::Relaxed).count_ones()))
            .sum()
    }

    /// Number of set bits at positions strictly less than `idx`.
    ///
    /// `rank(0)` is 0 and `rank(bit_count)` equals `popcount`.
    #[must_use]
    pub fn rank(&self, idx: u64) -> u64 {
        let word_idx = (idx / 64) as usize;
        let bit_idx = idx % 64;

        let mut r: u64 = 0;

        for w in self.words.iter().take(word_idx) {
            r += u64::from(w.load(Ordering::Relaxed).count_ones());
        }

        if bit_idx > 0 {
            if let Some(w) = self.words.get(word_idx) {
                // Shift out the bits at positions >= idx within the word
                let masked = w.load(Ordering::Relaxed) << (64 - bit_idx);
                r += u64::from(masked.count_ones());
            }
        }

        r
    }

    #[allow(clippy::indexing_slicing)]
    fn word(&self, idx: u64) -> &AtomicU64 {
        &self.words[(idx / 64) as usize]
    }
}

impl Encode for BitVec {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u64::<LittleEndian>(self.word_count())?;

        for w in &self.words {
            writer.write_u64::<LittleEndian>(w.load(Ordering::Relaxed))?;
        }

        Ok(())
    }
}

impl Decode for BitVec {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let word_count = reader.read_u64::<LittleEndian>()?;

        if word_count == 0 || word_count > MAX_WORDS {
            return Err(DecodeError::InvalidLength(("BitVec", word_count)));
        }

        let bv = Self::with_word_count(word_count as usize);

        for w in &bv.words {
            w.store(reader.read_u64::<LittleEndian>()?, Ordering::Relaxed);
        }

        Ok(bv)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn bit_vec_rounds_up_to_words() {
        assert_eq!(BitVec::with_capacity(1, 2.0).bit_count(), 64);
        assert_eq!(BitVec::with_capacity(10, 2.0).bit_count(), 64);
        assert_eq!(BitVec::with_capacity(100, 2.0).bit_count(), 256);

        // Empty input still yields a serializable vector
        assert_eq!(BitVec::with_capacity(0, 2.0).word_count(), 1);
    }

    #[test]
    fn bit_vec_set_get_reset() {
        let bv = BitVec::with_capacity(100, 1.0);

        assert!(bv.set(63));
        assert!(bv.set(64));
        assert!(!bv.set(64), "second set reports already-set");

        assert!(bv.is_set(63));
        assert!(bv.is_set(64));
        assert!(!bv.is_set(65));
        assert_eq!(bv.popcount(), 2);

        bv.reset();
        assert_eq!(bv.popcount(), 0);
        assert!(!bv.is_set(63));
    }

    #[test]
    fn bit_vec_rank_brute_force() {
        let bv = BitVec::with_capacity(300, 1.0);
        let positions = [0u64, 1, 17, 63, 64, 65, 127, 128, 200, 299];

        for &p in &positions {
            bv.set(p);
        }

        for i in 0..=bv.bit_count() {
            let expected = positions.iter().filter(|&&p| p < i).count() as u64;
            assert_eq!(bv.rank(i), expected, "rank({i})");
        }

        assert_eq!(bv.rank(0), 0);
        assert_eq!(bv.rank(bv.bit_count()), bv.popcount());
    }

    #[test]
    fn bit_vec_concurrent_set_matches_sequential() {
        let bv = BitVec::with_capacity(4096, 1.0);

        std::thread::scope(|s| {
            for t in 0..8 {
                let bv = &bv;
                s.spawn(move || {
                    // All threads hammer an overlapping pattern
                    for i in (t % 4..4096).step_by(3) {
                        bv.set(i as u64);
                    }
                });
            }
        });

        let expected = BitVec::with_capacity(4096, 1.0);
        for t in 0..8u64 {
            for i in (t % 4..4096).step_by(3) {
                expected.set(i);
            }
        }

        assert_eq!(bv, expected);
    }

    #[test]
    fn bit_vec_codec_round_trip() {
        let bv = BitVec::with_capacity(200, 2.0);
        for i in [0u64, 3, 64, 199, 250] {
            bv.set(i);
        }

        let bytes = bv.encode_into_vec();
        assert_eq!(bytes.len() as u64, 8 * (1 + bv.word_count()));

        let decoded = BitVec::decode_from(&mut &bytes[..]).unwrap();
        assert_eq!(bv, decoded);
    }

    #[test]
    fn bit_vec_decode_rejects_zero_words() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&0u64.to_le_bytes());

        assert!(matches!(
            BitVec::decode_from(&mut &bytes[..]),
            Err(DecodeError::InvalidLength(("BitVec", 0)))
        ));
    }

    #[test]
    fn bit_vec_decode_rejects_truncation() {
        let bv = BitVec::with_capacity(128, 1.0);
        let mut bytes = bv.encode_into_vec();
        bytes.truncate(bytes.len() - 1);

        assert!(matches!(
            BitVec::decode_from(&mut &bytes[..]),
            Err(DecodeError::UnexpectedEof)
        ));
    }
}
