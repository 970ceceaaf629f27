// File:    interval.rs
// Author:  apezoo
// Date:    2025-09-02
//
// Description: Canonical sets of disjoint byte ranges and their union algebra.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Disjoint integer ranges on a number line starting at zero.
//!
//! An [`Interval`] is always canonical: its atoms are sorted, non-empty,
//! non-overlapping and never touch (touching atoms are merged). Union is only
//! defined for disjoint operands. In this crate an overlap always means a byte
//! range was about to be reserved twice, so it is reported as an error rather
//! than silently merged.

use crate::error::{Error, Result};
use crate::invariant::{self, Invariant};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single `(start, len)` run of offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Atom {
    /// First offset covered.
    pub start: u64,
    /// Number of offsets covered.
    pub len: u64,
}

impl Atom {
    /// Creates an atom.
    #[must_use]
    pub const fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    /// One past the last offset covered.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// A canonical, sorted set of disjoint ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Interval {
    atoms: Vec<Atom>,
    len: u64,
}

impl Interval {
    /// The empty interval.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            atoms: Vec::new(),
            len: 0,
        }
    }

    /// An interval made of one run. A zero `len` gives the empty interval.
    ///
    /// For offsets that come from outside the process use
    /// [`Interval::try_from_atom`].
    ///
    /// # Panics
    ///
    /// Panics if `start + len` overflows a `u64`.
    #[must_use]
    pub fn from_atom(start: u64, len: u64) -> Self {
        match Self::try_from_atom(start, len) {
            Ok(interval) => interval,
            Err(e) => panic!("{e}"),
        }
    }

    /// An interval made of one run, checking that it fits in a `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AtomOverflow`] if `start + len` overflows a `u64`.
    pub fn try_from_atom(start: u64, len: u64) -> Result<Self> {
        if start.checked_add(len).is_none() {
            return Err(Error::AtomOverflow { start, len });
        }
        let interval = if len == 0 {
            Self::empty()
        } else {
            Self {
                atoms: vec![Atom::new(start, len)],
                len,
            }
        };
        invariant::check(&interval);
        Ok(interval)
    }

    /// Builds an interval from atoms in any order. Zero-length atoms are
    /// dropped and touching atoms are merged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overlap`] if two non-empty atoms share an offset and
    /// [`Error::AtomOverflow`] if an atom's end does not fit in a `u64`.
    pub fn from_atoms<I>(atoms: I) -> Result<Self>
    where
        I: IntoIterator<Item = Atom>,
    {
        let mut sorted = Vec::new();
        for atom in atoms {
            if atom.len == 0 {
                continue;
            }
            if atom.start.checked_add(atom.len).is_none() {
                return Err(Error::AtomOverflow {
                    start: atom.start,
                    len: atom.len,
                });
            }
            sorted.push(atom);
        }
        sorted.sort_unstable();

        let mut canonical: Vec<Atom> = Vec::with_capacity(sorted.len());
        for atom in sorted {
            match canonical.last_mut() {
                Some(last) if atom.start < last.end() => {
                    return Err(Error::Overlap { offset: atom.start });
                }
                Some(last) if atom.start == last.end() => last.len += atom.len,
                _ => canonical.push(atom),
            }
        }

        let len = canonical.iter().map(|a| a.len).sum();
        let interval = Self {
            atoms: canonical,
            len,
        };
        invariant::check(&interval);
        Ok(interval)
    }

    /// Total number of offsets covered.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether no offset is covered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The canonical atoms, ascending.
    #[must_use]
    pub fn to_atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Smallest covered offset.
    #[must_use]
    pub fn min(&self) -> Option<u64> {
        self.atoms.first().map(|a| a.start)
    }

    /// Largest covered offset.
    #[must_use]
    pub fn max(&self) -> Option<u64> {
        self.atoms.last().map(|a| a.end() - 1)
    }

    /// One past the largest covered offset, or zero when empty.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.atoms.last().map_or(0, Atom::end)
    }

    /// Iterates the covered atoms in ascending order.
    pub fn iter_interior(&self) -> impl Iterator<Item = Atom> + Clone + '_ {
        self.atoms.iter().copied()
    }

    /// Iterates the gaps between covered atoms in ascending order.
    ///
    /// With `Some(total)` the final gap up to `total` is included; with `None`
    /// iteration stops at the end of the last atom.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `total` is smaller than the
    /// interval's own extent.
    pub fn iter_exterior(&self, total: Option<u64>) -> Result<Exterior<'_>> {
        if let Some(bound) = total {
            if bound < self.end() {
                return Err(Error::OutOfBounds {
                    end: self.end(),
                    bound,
                });
            }
        }
        Ok(Exterior {
            atoms: &self.atoms,
            next: 0,
            cursor: 0,
            total,
        })
    }

    /// Unions two disjoint intervals.
    ///
    /// Both atom lists are walked in order of start, extending the open run
    /// whenever the next atom begins exactly where it ends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overlap`] if the operands share any offset. A
    /// non-empty interval unioned with itself always fails.
    pub fn union(&self, other: &Self) -> Result<Self> {
        let mut merged = Vec::with_capacity(self.atoms.len() + other.atoms.len());
        let mut open: Option<Atom> = None;
        let (mut i, mut j) = (0, 0);

        loop {
            let next = match (self.atoms.get(i), other.atoms.get(j)) {
                (Some(a), Some(b)) if a.start <= b.start => {
                    i += 1;
                    *a
                }
                (_, Some(b)) => {
                    j += 1;
                    *b
                }
                (Some(a), None) => {
                    i += 1;
                    *a
                }
                (None, None) => break,
            };

            open = Some(match open {
                None => next,
                Some(run) if next.start < run.end() => {
                    return Err(Error::Overlap { offset: next.start });
                }
                Some(run) if next.start == run.end() => Atom::new(run.start, run.len + next.len),
                Some(run) => {
                    merged.push(run);
                    next
                }
            });
        }
        merged.extend(open);

        let interval = Self {
            atoms: merged,
            len: self.len + other.len,
        };
        invariant::check(&interval);
        Ok(interval)
    }
}

impl Invariant for Interval {
    fn check_invariant(&self) {
        let mut cursor: Option<u64> = None;
        let mut total = 0u64;
        for atom in &self.atoms {
            assert!(atom.len > 0, "zero-length atom in {self:?}");
            if let Some(end) = cursor {
                assert!(atom.start > end, "atoms unsorted or touching in {self:?}");
            }
            cursor = Some(atom.end());
            total += atom.len;
        }
        assert_eq!(total, self.len, "cached length is stale in {self:?}");
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.atoms.is_empty() {
            return f.write_str("{}");
        }
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "[{}, {})", atom.start, atom.end())?;
        }
        Ok(())
    }
}

/// Iterator over the gaps of an [`Interval`]. See [`Interval::iter_exterior`].
#[derive(Debug, Clone)]
pub struct Exterior<'a> {
    atoms: &'a [Atom],
    next: usize,
    cursor: u64,
    total: Option<u64>,
}

impl Iterator for Exterior<'_> {
    type Item = Atom;

    fn next(&mut self) -> Option<Atom> {
        while let Some(atom) = self.atoms.get(self.next) {
            self.next += 1;
            let gap_start = self.cursor;
            self.cursor = atom.end();
            if atom.start > gap_start {
                return Some(Atom::new(gap_start, atom.start - gap_start));
            }
        }
        match self.total {
            Some(total) if self.cursor < total => {
                let gap = Atom::new(self.cursor, total - self.cursor);
                self.cursor = total;
                Some(gap)
            }
            _ => None,
        }
    }
}
