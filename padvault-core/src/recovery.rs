// File:    recovery.rs
// Author:  apezoo
// Date:    2025-09-02
//
// Description: Reconciles saved metadata with the files actually on disk.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Load-time reconciliation.
//!
//! A crash can leave the metadata and the bucket directories disagreeing:
//! a file renamed into `current/` before the metadata caught up, a file
//! retired into `spent/` whose descriptor still says `current`, and so on.
//! Every disagreement is resolved toward never reusing a byte. Anything
//! that cannot be resolved that way is reported as [`Error::InvalidPad`].
//!
//! All checks run before anything is moved, so a strict open that reports
//! [`Error::PadDirty`] leaves the directory exactly as it found it.

use crate::error::{Error, Result};
use crate::filesystem::{Filesystem, SCRATCH_DIR, validate_file_name};
use crate::metadata::{Metadata, save_metadata};
use crate::pad_file::{Bucket, IdSource, PadFile};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};

/// What recovery changed while opening a pad.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    repairs: Vec<String>,
}

impl RecoveryReport {
    /// True if the pad needed no repair.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.repairs.is_empty()
    }

    /// One human-readable line per repair, in the order they were found.
    #[must_use]
    pub fn repairs(&self) -> &[String] {
        &self.repairs
    }
}

/// Files recovery decided to keep tracking, plus what it did.
#[derive(Debug)]
pub(crate) struct Recovered {
    pub(crate) files: Vec<PadFile>,
    pub(crate) report: RecoveryReport,
}

#[derive(Debug)]
struct Move {
    name: String,
    from: Bucket,
    to: Bucket,
}

#[derive(Debug)]
struct Reconciler {
    strict: bool,
    report: RecoveryReport,
    moves: Vec<Move>,
}

impl Reconciler {
    fn dirty(&mut self, message: String) -> Result<()> {
        if self.strict {
            return Err(Error::PadDirty(message));
        }
        warn!("recovery: {message}");
        self.report.repairs.push(message);
        Ok(())
    }

    fn retire(&mut self, name: &str, from: Bucket) {
        self.moves.push(Move {
            name: name.to_string(),
            from,
            to: Bucket::Spent,
        });
    }

    /// Settles where a described file really is. Returns the file if it
    /// stays tracked.
    fn locate(&mut self, mut file: PadFile, found: Option<Bucket>) -> Result<Option<PadFile>> {
        let expected = file.bucket();
        match found {
            Some(Bucket::Spent) if expected == Bucket::Spent => Ok(None),
            Some(actual) if expected == Bucket::Spent => {
                self.dirty(format!(
                    "'{}' is recorded as spent but sits in {actual}/; retiring it",
                    file.name()
                ))?;
                self.retire(file.name(), actual);
                Ok(None)
            }
            Some(actual) if actual == expected => Ok(Some(file)),
            Some(Bucket::Spent) => {
                self.dirty(format!(
                    "'{}' is recorded as {expected} but sits in spent/; marking it consumed",
                    file.name()
                ))?;
                file.consume_entire_file();
                Ok(None)
            }
            Some(actual) => {
                self.dirty(format!(
                    "'{}' is recorded as {expected} but sits in {actual}/; following the file",
                    file.name()
                ))?;
                file.set_bucket(actual);
                Ok(Some(file))
            }
            None if file.used() == 0 || file.used() == file.size() => {
                self.dirty(format!(
                    "'{}' is recorded as {expected} but is gone; dropping the stale entry",
                    file.name()
                ))?;
                Ok(None)
            }
            None => Err(Error::InvalidPad(format!(
                "pad file '{}' has {} of {} bytes committed but is missing",
                file.name(),
                file.used(),
                file.size()
            ))),
        }
    }
}

fn verify_layout(fs: &Filesystem) -> Result<()> {
    let required = Bucket::ALL
        .iter()
        .map(|bucket| bucket.dir_name())
        .chain([SCRATCH_DIR]);
    for dir in required {
        if !fs.resolve(dir)?.is_dir() {
            return Err(Error::InvalidPad(format!("directory structure bad: {dir}/ missing")));
        }
    }
    Ok(())
}

/// Where every pad file on disk lives. Names must be unique across buckets.
fn index_buckets(fs: &Filesystem) -> Result<BTreeMap<String, Bucket>> {
    let mut on_disk = BTreeMap::new();
    for bucket in Bucket::ALL {
        for name in fs.list_dir(bucket.dir_name())? {
            if let Some(other) = on_disk.insert(name.clone(), bucket) {
                return Err(Error::InvalidPad(format!(
                    "pad file name '{name}' appears in both {other}/ and {bucket}/"
                )));
            }
        }
    }
    Ok(on_disk)
}

/// Checks the pad at `fs` against `metadata` and repairs what can be repaired
/// safely. Repairs are saved and leave `fs` read-only.
pub(crate) fn recover(
    fs: &mut Filesystem,
    metadata: &Metadata,
    strict: bool,
    ids: &mut IdSource,
) -> Result<Recovered> {
    verify_layout(fs)?;
    let on_disk = index_buckets(fs)?;

    let mut reconciler = Reconciler {
        strict,
        report: RecoveryReport::default(),
        moves: Vec::new(),
    };

    let mut described = HashSet::new();
    let mut located = Vec::new();
    for descriptor in &metadata.files {
        validate_file_name(&descriptor.name).map_err(|e| {
            Error::InvalidPad(format!("metadata names an unusable file: {e}"))
        })?;
        if !described.insert(descriptor.name.as_str()) {
            return Err(Error::InvalidPad(format!(
                "metadata describes '{}' twice",
                descriptor.name
            )));
        }
        let file = PadFile::from_descriptor(ids.next_id(), descriptor)?;
        let found = on_disk.get(&descriptor.name).copied();
        if let Some(file) = reconciler.locate(file, found)? {
            located.push(file);
        }
    }

    let mut files = Vec::with_capacity(located.len());
    for mut file in located {
        let actual = fs.file_len(file.bucket().path_of(file.name()))?;
        if actual == file.size() {
            files.push(file);
            continue;
        }
        reconciler.dirty(format!(
            "'{}' was {} bytes but is now {actual}; retiring it",
            file.name(),
            file.size()
        ))?;
        file.consume_entire_file();
        reconciler.retire(file.name(), file.bucket());
    }

    for (name, bucket) in &on_disk {
        if *bucket == Bucket::Current
            && !described.contains(name.as_str())
            && fs.is_regular_file(bucket.path_of(name))?
        {
            reconciler.dirty(format!("'{name}' is in current/ without metadata; retiring it"))?;
            reconciler.retire(name, Bucket::Current);
        }
    }

    let Reconciler { report, moves, .. } = reconciler;
    for Move { name, from, to } in &moves {
        fs.rename(from.path_of(name), to.path_of(name))?;
        info!("recovery moved '{name}' from {from}/ to {to}/");
    }

    if !report.is_clean() {
        save_metadata(fs, &Metadata::describing(&files))?;
        fs.set_read_only();
        warn!(
            "pad at {} was repaired ({} change(s)); read-only until reopened",
            fs.root().display(),
            report.repairs.len()
        );
    }

    Ok(Recovered { files, report })
}
