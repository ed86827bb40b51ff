// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{Checksum, DecodeError, EncodeError};

/// Represents errors that can occur during database construction or lookup
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed
    Decode(DecodeError),

    /// Perfect hash construction did not converge within the level limit
    ConstructionLimitExceeded {
        /// Number of levels attempted
        levels: usize,
    },

    /// A key from the build set could not be mapped by the finished
    /// perfect hash
    MphIndexMismatch {
        /// 64-bit hash of the unmappable key
        hash: u64,
    },

    /// Mutation was attempted on a frozen writer
    AlreadyFrozen,

    /// Invalid file header (bad magic, impossible offsets, file too small)
    InvalidHeader(&'static str),

    /// File-level checksum does not match the trailer
    ChecksumMismatch {
        /// Checksum computed over the file contents
        got: Checksum,

        /// Checksum stored in the file trailer
        expected: Checksum,
    },

    /// A record failed its integrity check or carried impossible lengths
    RecordCorrupted {
        /// Absolute file offset of the record
        offset: u64,
    },

    /// The queried key is not stored in the database
    KeyNotFound,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConstDbError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::ConstructionLimitExceeded { .. }
            | Self::MphIndexMismatch { .. }
            | Self::AlreadyFrozen
            | Self::InvalidHeader(_)
            | Self::ChecksumMismatch { .. }
            | Self::RecordCorrupted { .. }
            | Self::KeyNotFound => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Database result
pub type Result<T> = std::result::Result<T, Error>;
