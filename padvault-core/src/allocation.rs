// File:    allocation.rs
// Author:  apezoo
// Date:    2025-09-02
//
// Description: Reservations of pad bytes spanning one or more pad files.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Multi-file reservations of pad material.
//!
//! An [`Allocation`] maps pad files to the ranges reserved in each. Order
//! matters: the keystream is rebuilt by concatenating file segments in
//! allocation order, so union keeps insertion order and equality is
//! order-sensitive.

use crate::error::{Error, Result};
use crate::interval::{Atom, Interval};
use crate::invariant::{self, Invariant};
use crate::pad_file::FileRef;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    file: FileRef,
    interval: Interval,
}

/// An ordered set of reserved ranges across pad files.
#[derive(Debug, Clone, Default)]
pub struct Allocation {
    segments: IndexMap<String, Segment>,
    len: u64,
}

impl Allocation {
    /// An allocation reserving nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// An allocation covering `interval` of a single file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyAllocation`] for an empty interval and
    /// [`Error::OutOfBounds`] if it reaches past the end of the file.
    pub fn single_file(file: FileRef, interval: Interval) -> Result<Self> {
        if interval.is_empty() {
            return Err(Error::EmptyAllocation);
        }
        if interval.end() > file.size() {
            return Err(Error::OutOfBounds {
                end: interval.end(),
                bound: file.size(),
            });
        }
        let len = interval.len();
        let mut segments = IndexMap::with_capacity(1);
        segments.insert(file.name().to_string(), Segment { file, interval });
        let alloc = Self { segments, len };
        invariant::check(&alloc);
        Ok(alloc)
    }

    /// Total bytes reserved.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether nothing is reserved.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct files involved.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.segments.len()
    }

    /// Iterates `(interval, file)` pairs in allocation order.
    pub fn iter_files(&self) -> impl Iterator<Item = (&Interval, &FileRef)> + Clone + '_ {
        self.segments.values().map(|s| (&s.interval, &s.file))
    }

    /// Combines two allocations.
    ///
    /// Files present in both have their intervals unioned. The result lists
    /// this allocation's files first, in their order, followed by files only
    /// found in `other`, in theirs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overlap`] if both reserve a common byte of the same
    /// file, and [`Error::IdentityConflict`] if two different files share a
    /// name.
    pub fn union(&self, other: &Self) -> Result<Self> {
        let mut merged = IndexMap::with_capacity(self.segments.len() + other.segments.len());
        for (name, ours) in &self.segments {
            let interval = match other.segments.get(name) {
                Some(theirs) if theirs.file.id() != ours.file.id() => {
                    return Err(Error::IdentityConflict(name.clone()));
                }
                Some(theirs) => ours.interval.union(&theirs.interval)?,
                None => ours.interval.clone(),
            };
            merged.insert(
                name.clone(),
                Segment {
                    file: ours.file.clone(),
                    interval,
                },
            );
        }
        for (name, theirs) in &other.segments {
            merged
                .entry(name.clone())
                .or_insert_with(|| theirs.clone());
        }

        let alloc = Self {
            segments: merged,
            len: self.len + other.len,
        };
        invariant::check(&alloc);
        Ok(alloc)
    }

    /// Flattens the allocation into `(file name, atoms)` pairs for embedding
    /// in an interchange format.
    #[must_use]
    pub fn to_serialization_state(&self) -> AllocationState {
        AllocationState {
            segments: self
                .segments
                .iter()
                .map(|(name, segment)| SegmentState {
                    file: name.clone(),
                    atoms: segment.interval.to_atoms().to_vec(),
                })
                .collect(),
        }
    }

    /// Rebuilds an allocation from its serialized form.
    ///
    /// Files are known here only by name; `bind` turns each distinct name
    /// into a [`FileRef`], so identity is decided by the caller.
    ///
    /// # Errors
    ///
    /// Propagates errors from `bind`, and fails like [`Interval::from_atoms`],
    /// [`Allocation::single_file`] and [`Allocation::union`] on malformed
    /// input.
    pub fn from_serialization_state<F>(state: &AllocationState, mut bind: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<FileRef>,
    {
        let mut bound: HashMap<&str, FileRef> = HashMap::new();
        let mut alloc = Self::empty();
        for segment in &state.segments {
            let file = match bound.get(segment.file.as_str()) {
                Some(file) => file.clone(),
                None => {
                    let file = bind(&segment.file)?;
                    bound.insert(&segment.file, file.clone());
                    file
                }
            };
            if file.name() != segment.file {
                return Err(Error::IdentityConflict(segment.file.clone()));
            }
            let interval = Interval::from_atoms(segment.atoms.iter().copied())?;
            alloc = alloc.union(&Self::single_file(file, interval)?)?;
        }
        Ok(alloc)
    }
}

impl PartialEq for Allocation {
    /// Order-sensitive: the same reservations listed in a different file
    /// order compare unequal.
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.segments.iter().eq(other.segments.iter())
    }
}

impl Eq for Allocation {}

impl Invariant for Allocation {
    fn check_invariant(&self) {
        let mut total = 0;
        for (name, segment) in &self.segments {
            assert_eq!(name, segment.file.name(), "segment keyed under wrong name");
            assert!(!segment.interval.is_empty(), "empty segment for {name}");
            assert!(
                segment.interval.end() <= segment.file.size(),
                "segment for {name} exceeds the file"
            );
            total += segment.interval.len();
        }
        assert_eq!(total, self.len, "cached allocation length is stale");
    }
}

/// Serialized form of an [`Allocation`]: ordered per-file atom lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationState {
    /// Segments in allocation order.
    pub segments: Vec<SegmentState>,
}

/// One file's share of a serialized allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentState {
    /// Pad file name.
    pub file: String,
    /// Reserved ranges within the file.
    pub atoms: Vec<Atom>,
}

impl AllocationState {
    /// Total bytes described.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AtomOverflow`] if the atom lengths add up past
    /// `u64::MAX`. Deserialized states are untrusted, so this is checked.
    pub fn len(&self) -> Result<u64> {
        let mut total = 0u64;
        for atom in self.segments.iter().flat_map(|s| s.atoms.iter()) {
            total = total.checked_add(atom.len).ok_or(Error::AtomOverflow {
                start: atom.start,
                len: atom.len,
            })?;
        }
        Ok(total)
    }

    /// Whether nothing is described.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments
            .iter()
            .flat_map(|s| s.atoms.iter())
            .all(|a| a.len == 0)
    }
}
