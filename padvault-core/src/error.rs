// File:    error.rs
// Author:  apezoo
// Date:    2025-09-02
//
// Description: The error type shared by every layer of the pad allocator.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Errors raised by the interval algebra, allocations, pad files and the pad
//! itself.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of failure, so an embedder can decide how to react without
/// matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Not enough pad material. Request less or add more pad files.
    Exhaustion,
    /// The caller broke an API contract. Never retry.
    ContractViolation,
    /// The on-disk pad is damaged beyond automatic repair.
    Corruption,
    /// The on-disk pad needs a recovery pass (strict mode only).
    Dirty,
    /// A path resolved outside the pad root.
    Boundary,
    /// An underlying I/O or encoding failure.
    Io,
}

/// Every failure the pad allocator can report.
#[derive(Debug, Error)]
pub enum Error {
    /// The pad as a whole cannot supply the requested number of bytes.
    #[error("cannot allocate {requested} bytes; only {available} bytes of pad remain")]
    OutOfPad {
        /// Bytes asked for.
        requested: u64,
        /// Bytes free across current and pending files.
        available: u64,
    },

    /// A single pad file cannot supply the requested number of bytes.
    #[error("pad file '{file}' has {free} bytes free but {requested} were requested")]
    OutOfSpace {
        /// Name of the pad file.
        file: String,
        /// Bytes asked for.
        requested: u64,
        /// Bytes still free in the file.
        free: u64,
    },

    /// Two ranges that must be disjoint share at least one offset.
    #[error("ranges overlap at offset {offset}")]
    Overlap {
        /// Start of the first atom found to collide.
        offset: u64,
    },

    /// An atom's end does not fit in a `u64`.
    #[error("atom starting at {start} with length {len} overflows")]
    AtomOverflow {
        /// Start of the offending atom.
        start: u64,
        /// Length of the offending atom.
        len: u64,
    },

    /// A range reaches past the end of the file (or universe) it belongs to.
    #[error("range ending at {end} exceeds bound {bound}")]
    OutOfBounds {
        /// One past the last offset of the range.
        end: u64,
        /// Size of the file or universe.
        bound: u64,
    },

    /// A single-file allocation was built from an empty interval.
    #[error("an allocation segment must cover at least one byte")]
    EmptyAllocation,

    /// Two distinct pad files claim the same name.
    #[error("two distinct pad files are both named '{0}'")]
    IdentityConflict(String),

    /// `get_allocation` was called while another proposal is outstanding.
    #[error("an allocation is already outstanding; commit or discard it first")]
    AllocationOutstanding,

    /// `commit_allocation` or `discard_uncommitted` was called with nothing
    /// outstanding.
    #[error("no allocation is outstanding")]
    NoAllocationOutstanding,

    /// The allocation references a file this pad does not know about.
    #[error("pad file '{0}' is not known to this pad")]
    UnknownFile(String),

    /// A pad file name is empty, contains a separator or names a directory.
    #[error("'{0}' is not a valid pad file name")]
    InvalidFileName(String),

    /// A file offered for ingestion is not a plain, singly linked file.
    #[error("'{0}' is not a regular file with exactly one hard link")]
    NotSingleLink(PathBuf),

    /// A path resolved outside the pad root.
    #[error("path '{0}' escapes the pad root")]
    PathEscape(PathBuf),

    /// A write was attempted while the pad is read-only.
    #[error("the pad is open read-only for this session")]
    ReadOnly,

    /// The on-disk pad is structurally broken.
    #[error("invalid pad: {0}")]
    InvalidPad(String),

    /// The on-disk pad needs repair, which strict mode refuses to do.
    #[error("pad needs recovery: {0}")]
    PadDirty(String),

    /// An underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Metadata could not be encoded or decoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the failure class this error belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::OutOfPad { .. } | Self::OutOfSpace { .. } => ErrorCategory::Exhaustion,
            Self::Overlap { .. }
            | Self::AtomOverflow { .. }
            | Self::OutOfBounds { .. }
            | Self::EmptyAllocation
            | Self::IdentityConflict(_)
            | Self::AllocationOutstanding
            | Self::NoAllocationOutstanding
            | Self::UnknownFile(_)
            | Self::InvalidFileName(_)
            | Self::NotSingleLink(_)
            | Self::ReadOnly => ErrorCategory::ContractViolation,
            Self::InvalidPad(_) => ErrorCategory::Corruption,
            Self::PadDirty(_) => ErrorCategory::Dirty,
            Self::PathEscape(_) => ErrorCategory::Boundary,
            Self::Io(_) | Self::Json(_) => ErrorCategory::Io,
        }
    }
}
