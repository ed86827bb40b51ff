// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use sha2::{Digest, Sha512_256};

/// Number of bytes in a file-level checksum
pub const CHECKSUM_SIZE: usize = 32;

/// A 256-bit strong checksum (SHA-512/256) over the database metadata
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Checksum([u8; CHECKSUM_SIZE]);

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; CHECKSUM_SIZE]> for Checksum {
    fn from(value: [u8; CHECKSUM_SIZE]) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Checksum {
    pub(crate) fn from_digest(hasher: Sha512_256) -> Self {
        Self(hasher.finalize().into())
    }

    /// Compares in constant time, so a checksum probe cannot learn how
    /// much of the digest matched.
    pub(crate) fn check(&self, expected: Self) -> crate::Result<()> {
        let diff = self
            .0
            .iter()
            .zip(expected.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));

        if diff == 0 {
            Ok(())
        } else {
            Err(crate::Error::ChecksumMismatch {
                got: *self,
                expected,
            })
        }
    }
}

/// Writer adapter that feeds every written byte into a running digest
/// as well as the inner writer.
pub struct HashingWriter<W: std::io::Write> {
    inner: W,
    hasher: Sha512_256,
}

impl<W: std::io::Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha512_256::new(),
        }
    }

    /// Digests bytes that are already on disk (or will be written
    /// elsewhere) without forwarding them to the inner writer.
    pub fn digest_only(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn finalize(self) -> (W, Checksum) {
        (self.inner, Checksum::from_digest(self.hasher))
    }
}

impl<W: std::io::Write> std::io::Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;

        // Only digest what actually reached the inner writer
        self.hasher.update(buf.get(..n).unwrap_or(buf));

        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_log::test;

    #[test]
    fn checksum_tee_matches_direct_digest() {
        let mut tee = HashingWriter::new(Vec::new());
        tee.digest_only(b"header");
        tee.write_all(b"payload").unwrap();

        let (written, got) = tee.finalize();
        assert_eq!(written, b"payload");

        let mut hasher = Sha512_256::new();
        hasher.update(b"header");
        hasher.update(b"payload");
        let expected = Checksum::from_digest(hasher);

        assert_eq!(got, expected);
        got.check(expected).unwrap();
    }

    #[test]
    fn checksum_mismatch_detected() {
        let a = Checksum::from_digest(Sha512_256::new_with_prefix(b"a"));
        let b = Checksum::from_digest(Sha512_256::new_with_prefix(b"b"));

        assert!(matches!(
            a.check(b),
            Err(crate::Error::ChecksumMismatch { .. })
        ));
    }
}
