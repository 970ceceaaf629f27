// File:    lib.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: The main library crate for padvault-core, managing one-time pad key material.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! # Padvault Core Library
//!
//! This library manages a directory of one-time pad files and hands out key
//! material from it so that no byte is ever handed out twice, even across
//! crashes.
//!
//! ```no_run
//! use padvault_core::{Pad, pad_generator};
//!
//! # fn main() -> padvault_core::Result<()> {
//! let mut pad = Pad::create("/tmp/my-pad")?;
//! pad_generator::generate_pad(&mut pad, 1 << 20)?;
//! let allocation = pad.get_allocation(1024)?;
//! // ... encrypt with the bytes named by `allocation` ...
//! pad.commit_allocation(&allocation)?;
//! # Ok(())
//! # }
//! ```

/// Reservations of byte ranges across pad files.
pub mod allocation;
/// Error type shared by the whole crate.
pub mod error;
/// Path-confined access to the pad directory.
pub mod filesystem;
/// Sets of disjoint byte ranges.
pub mod interval;
/// Runtime consistency checks for the core data structures.
pub mod invariant;
/// The persisted state of a pad.
pub mod metadata;
/// The pad directory and its allocator.
pub mod pad;
/// Per-file usage tracking.
pub mod pad_file;
/// Utilities for generating new one-time pads.
pub mod pad_generator;
/// Reconciliation of saved state with the files on disk.
pub mod recovery;

pub use allocation::{Allocation, AllocationState, SegmentState};
pub use error::{Error, ErrorCategory, Result};
pub use interval::{Atom, Interval};
pub use pad::{OpenOptions, Pad, PadStatus};
pub use pad_file::{Bucket, FileId, FileRef, PadFile};
pub use recovery::RecoveryReport;
