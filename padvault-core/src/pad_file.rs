// File:    pad_file.rs
// Author:  apezoo
// Date:    2025-09-02
//
// Description: Usage tracking for a single physical pad file.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! One physical pad file: its size, the ranges already committed and the
//! lifecycle bucket it lives in.

use crate::allocation::Allocation;
use crate::error::{Error, Result};
use crate::interval::{Atom, Interval};
use crate::invariant::{self, Invariant};
use crate::metadata::FileDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle bucket of a pad file. Each bucket is a directory under the pad
/// root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Adopted but never used.
    Pending,
    /// At least one byte committed, some still free.
    Current,
    /// Fully consumed or retired. Kept for decrypting old messages.
    Spent,
}

impl Bucket {
    /// All buckets, in lifecycle order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::Current, Self::Spent];

    /// Directory name of the bucket under the pad root.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Current => "current",
            Self::Spent => "spent",
        }
    }

    /// Path of `name` inside this bucket, relative to the pad root.
    #[must_use]
    pub fn path_of(self, name: &str) -> PathBuf {
        Path::new(self.dir_name()).join(name)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Identity of a live [`PadFile`], unique within one open pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub(crate) u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out [`FileId`]s for one open pad.
#[derive(Debug, Default)]
pub(crate) struct IdSource(u64);

impl IdSource {
    pub(crate) const fn next_id(&mut self) -> FileId {
        self.0 += 1;
        FileId(self.0)
    }
}

/// A lightweight handle naming a pad file inside an [`Allocation`].
///
/// Two handles refer to the same file only if their ids match; the name is
/// carried for serialization and for locating the file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    id: FileId,
    name: String,
    size: u64,
}

impl FileRef {
    pub(crate) const fn new(id: FileId, name: String, size: u64) -> Self {
        Self { id, name, size }
    }

    /// Identity of the referenced file.
    #[must_use]
    pub const fn id(&self) -> FileId {
        self.id
    }

    /// File name, relative to its bucket directory.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the file in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }
}

/// Tracks which parts of one pad file have been committed.
#[derive(Debug, Clone)]
pub struct PadFile {
    id: FileId,
    name: String,
    size: u64,
    used: u64,
    extents: Interval,
    bucket: Bucket,
}

impl PadFile {
    pub(crate) fn new(id: FileId, name: String, size: u64, bucket: Bucket) -> Self {
        let file = Self {
            id,
            name,
            size,
            used: 0,
            extents: Interval::empty(),
            bucket,
        };
        invariant::check(&file);
        file
    }

    /// Rebuilds a file from its persisted descriptor.
    pub(crate) fn from_descriptor(id: FileId, descriptor: &FileDescriptor) -> Result<Self> {
        let extents = Interval::from_atoms(descriptor.extents.iter().copied()).map_err(|e| {
            Error::InvalidPad(format!("extents of '{}' are corrupt: {e}", descriptor.name))
        })?;
        if extents.len() != descriptor.used || extents.end() > descriptor.size {
            return Err(Error::InvalidPad(format!(
                "descriptor of '{}' records {} used bytes of {} but extents cover {}",
                descriptor.name,
                descriptor.used,
                descriptor.size,
                extents
            )));
        }
        let file = Self {
            id,
            name: descriptor.name.clone(),
            size: descriptor.size,
            used: descriptor.used,
            extents,
            bucket: descriptor.bucket,
        };
        invariant::check(&file);
        Ok(file)
    }

    pub(crate) fn descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            name: self.name.clone(),
            size: self.size,
            used: self.used,
            bucket: self.bucket,
            extents: self.extents.to_atoms().to_vec(),
        }
    }

    /// Identity of this file within the open pad.
    #[must_use]
    pub const fn id(&self) -> FileId {
        self.id
    }

    /// File name, relative to its bucket directory.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the file in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Bytes already committed.
    #[must_use]
    pub const fn used(&self) -> u64 {
        self.used
    }

    /// Bytes still available.
    #[must_use]
    pub const fn free(&self) -> u64 {
        self.size - self.used
    }

    /// Committed ranges.
    #[must_use]
    pub const fn extents(&self) -> &Interval {
        &self.extents
    }

    /// Lifecycle bucket the file currently lives in.
    #[must_use]
    pub const fn bucket(&self) -> Bucket {
        self.bucket
    }

    /// A handle to this file for use in allocations.
    #[must_use]
    pub fn handle(&self) -> FileRef {
        FileRef::new(self.id, self.name.clone(), self.size)
    }

    /// Proposes `requested` free bytes, filling gaps from the lowest offset
    /// up. Nothing is marked used, so two proposals may overlap until one of
    /// them is committed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfSpace`] if fewer than `requested` bytes are free.
    pub fn get_allocation(&self, requested: u64) -> Result<Allocation> {
        if requested > self.free() {
            return Err(Error::OutOfSpace {
                file: self.name.clone(),
                requested,
                free: self.free(),
            });
        }

        let mut remaining = requested;
        let mut atoms = Vec::new();
        for gap in self.extents.iter_exterior(Some(self.size))? {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(gap.len);
            atoms.push(Atom::new(gap.start, take));
            remaining -= take;
        }

        let interval = Interval::from_atoms(atoms)?;
        if interval.is_empty() {
            return Ok(Allocation::empty());
        }
        Allocation::single_file(self.handle(), interval)
    }

    /// Checks that `interval` could be committed and returns the extents that
    /// would result, without changing anything.
    pub(crate) fn check_commit(&self, interval: &Interval) -> Result<Interval> {
        if interval.end() > self.size {
            return Err(Error::OutOfBounds {
                end: interval.end(),
                bound: self.size,
            });
        }
        self.extents.union(interval)
    }

    /// Marks `interval` as used.
    ///
    /// Fails if any byte of `interval` was already committed: committing the
    /// same bytes twice would hand out key material twice.
    pub(crate) fn commit_allocation(&mut self, interval: &Interval) -> Result<()> {
        let extents = self.check_commit(interval)?;
        self.used = extents.len();
        self.extents = extents;
        invariant::check(self);
        Ok(())
    }

    /// Marks the whole file used regardless of what was committed before.
    /// Used to retire a file that can no longer be trusted for allocation.
    pub(crate) fn consume_entire_file(&mut self) {
        self.extents = Interval::from_atom(0, self.size);
        self.used = self.size;
        invariant::check(self);
    }

    pub(crate) fn set_bucket(&mut self, bucket: Bucket) {
        self.bucket = bucket;
    }
}

impl Invariant for PadFile {
    fn check_invariant(&self) {
        assert!(self.used <= self.size, "{} uses more than its size", self.name);
        assert_eq!(
            self.extents.len(),
            self.used,
            "{} used count disagrees with extents",
            self.name
        );
        assert!(
            self.extents.end() <= self.size,
            "{} has extents past its end",
            self.name
        );
    }
}
