// File:    metadata.rs
// Author:  apezoo
// Date:    2025-09-02
//
// Description: Loads and saves the persisted state of a pad directory.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Persisted pad metadata.
//!
//! The metadata file is never edited in place. Every save writes a complete
//! new copy through [`Filesystem::write_atomic`].

use crate::error::{Error, Result};
use crate::filesystem::Filesystem;
use crate::interval::Atom;
use crate::pad_file::{Bucket, PadFile};
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Highest on-disk compatibility level this build understands.
pub const COMPATIBILITY: u32 = 0;

/// Format version written by this build. Informational only.
pub const VERSION: u32 = 1;

/// Name of the metadata file under the pad root.
pub const METADATA_FILE: &str = "metadata.json";

/// The persisted record of one tracked pad file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// File name within its bucket directory.
    pub name: String,
    /// Size of the file in bytes when it was first tracked.
    pub size: u64,
    /// Number of committed bytes.
    pub used: u64,
    /// Bucket the file is expected in.
    pub bucket: Bucket,
    /// Committed ranges.
    #[serde(default)]
    pub extents: Vec<Atom>,
}

/// Everything the pad saves to disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Compatibility level; a pad newer than [`COMPATIBILITY`] is refused.
    pub compatibility: u32,
    /// Version of the writer.
    pub version: u32,
    /// Tracked pad files, in allocation order.
    pub files: Vec<FileDescriptor>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            compatibility: COMPATIBILITY,
            version: VERSION,
            files: Vec::new(),
        }
    }
}

impl Metadata {
    /// Current-format metadata describing `files`.
    pub(crate) fn describing(files: &[PadFile]) -> Self {
        Self {
            files: files.iter().map(PadFile::descriptor).collect(),
            ..Self::default()
        }
    }
}

/// Loads the metadata of the pad at `fs`.
///
/// # Errors
///
/// Returns [`Error::InvalidPad`] if the file is missing, unreadable,
/// unparseable or from an incompatible future format.
pub fn load_metadata(fs: &Filesystem) -> Result<Metadata> {
    let mut raw = String::new();
    fs.open_read(METADATA_FILE)
        .and_then(|mut file| Ok(file.read_to_string(&mut raw)?))
        .map_err(|e| Error::InvalidPad(format!("metadata missing or unreadable: {e}")))?;
    let metadata: Metadata = serde_json::from_str(&raw)
        .map_err(|e| Error::InvalidPad(format!("metadata corrupt: {e}")))?;

    if metadata.compatibility > COMPATIBILITY {
        return Err(Error::InvalidPad(format!(
            "pad is compatibility level {} but this build understands up to {}",
            metadata.compatibility, COMPATIBILITY
        )));
    }
    Ok(metadata)
}

/// Saves `metadata` to the pad at `fs`, replacing the previous copy
/// atomically.
///
/// # Errors
///
/// Fails if the pad is read-only or the write fails.
pub fn save_metadata(fs: &Filesystem, metadata: &Metadata) -> Result<()> {
    let encoded = serde_json::to_vec_pretty(metadata)?;
    fs.write_atomic(METADATA_FILE, &encoded)?;
    debug!(
        "flushed metadata with {} tracked file(s)",
        metadata.files.len()
    );
    Ok(())
}
