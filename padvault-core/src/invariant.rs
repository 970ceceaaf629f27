// File:    invariant.rs
// Author:  apezoo
// Date:    2025-09-02
//
// Description: Switchable structural invariant checks.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Structural invariant checks.
//!
//! Each core type implements [`Invariant`] and calls [`check`] at the end of
//! every constructor and every mutating operation. The checks are compiled in
//! for debug builds and for builds with the `invariant-checks` feature.

/// Whether invariant checks run in this build.
pub const ENABLED: bool = cfg!(any(debug_assertions, feature = "invariant-checks"));

/// A type with a structural invariant that can be verified on demand.
pub trait Invariant {
    /// Panics if the invariant does not hold.
    fn check_invariant(&self);
}

/// Verifies `value`'s invariant when checks are enabled.
#[inline]
pub fn check<T: Invariant + ?Sized>(value: &T) {
    if ENABLED {
        value.check_invariant();
    }
}
