// File:    pad.rs
// Author:  apezoo
// Date:    2025-09-02
//
// Description: A directory of pad files and the allocator that hands out
//              never-reused key material from it.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The pad: every pad file in one directory, sorted into lifecycle buckets.
//!
//! Allocation is two-phase. [`Pad::get_allocation`] proposes bytes without
//! marking anything used; the caller encrypts with them and only then calls
//! [`Pad::commit_allocation`]. At most one proposal is outstanding at a time.
//!
//! Layout of a pad directory:
//!
//! ```text
//! <root>/metadata.json
//! <root>/pending/   adopted, never used
//! <root>/current/   partially used
//! <root>/spent/     fully used or retired
//! <root>/tmp/       scratch space for atomic writes
//! ```

use crate::allocation::{Allocation, AllocationState};
use crate::error::{Error, Result};
use crate::filesystem::{Filesystem, SCRATCH_DIR, validate_file_name};
use crate::invariant::{self, Invariant};
use crate::metadata::{Metadata, load_metadata, save_metadata};
use crate::pad_file::{Bucket, FileRef, IdSource, PadFile};
use crate::recovery::{self, RecoveryReport};
use log::{debug, error, info};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Options controlling how a pad directory is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    create: bool,
    strict: bool,
}

impl OpenOptions {
    /// Default options: the pad must already exist and repairs are allowed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            create: false,
            strict: false,
        }
    }

    /// Create an empty pad if the directory does not exist yet.
    pub const fn create(&mut self, create: bool) -> &mut Self {
        self.create = create;
        self
    }

    /// Refuse to repair anything: any inconsistency fails the open with
    /// [`Error::PadDirty`] and leaves the directory untouched.
    pub const fn strict(&mut self, strict: bool) -> &mut Self {
        self.strict = strict;
        self
    }

    /// Opens the pad at `root` with these options.
    ///
    /// # Errors
    ///
    /// See [`Pad::open`] and [`Pad::create`].
    pub fn open(&self, root: impl AsRef<Path>) -> Result<Pad> {
        let fs = Filesystem::new(root)?;
        if self.create && (!fs.root().exists() || is_empty_dir(&fs)?) {
            Pad::create_in(fs)
        } else {
            Pad::load(fs, self.strict)
        }
    }
}

fn is_empty_dir(fs: &Filesystem) -> Result<bool> {
    Ok(fs.root().is_dir() && fs.list_dir(".")?.is_empty())
}

/// Free and used space of a pad, by bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PadStatus {
    /// Files in `pending/`.
    pub pending_files: usize,
    /// Total size of the files in `pending/`.
    pub pending_bytes: u64,
    /// Files in `current/`.
    pub current_files: usize,
    /// Total size of the files in `current/`.
    pub current_bytes: u64,
    /// Bytes still free across `pending/` and `current/`.
    pub free_bytes: u64,
    /// Files in `spent/`.
    pub spent_files: usize,
    /// Total size of the files in `spent/`.
    pub spent_bytes: u64,
    /// Whether the session refuses writes.
    pub read_only: bool,
}

/// The one outstanding proposal: pending files it drew from that the pad
/// does not track yet.
#[derive(Debug)]
struct Proposal {
    staged: Vec<PadFile>,
}

/// An open pad directory.
#[derive(Debug)]
pub struct Pad {
    fs: Filesystem,
    files: Vec<PadFile>,
    outstanding: Option<Proposal>,
    ids: IdSource,
    recovery: RecoveryReport,
}

impl Pad {
    /// Creates an empty pad at `root`, making the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPad`] if `root` exists and is not an empty
    /// directory, or an I/O error if the layout cannot be written.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        Self::create_in(Filesystem::new(root)?)
    }

    /// Opens the existing pad at `root`, repairing it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPad`] if the directory is not a usable pad.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        OpenOptions::new().open(root)
    }

    fn create_in(fs: Filesystem) -> Result<Self> {
        if fs.root().exists() {
            if !fs.root().is_dir() || !fs.list_dir(".")?.is_empty() {
                return Err(Error::InvalidPad(format!(
                    "cannot create a pad at {}: not an empty directory",
                    fs.root().display()
                )));
            }
        } else {
            fs.create_root()?;
        }
        for bucket in Bucket::ALL {
            fs.mkdir(bucket.dir_name())?;
        }
        fs.mkdir(SCRATCH_DIR)?;
        save_metadata(&fs, &Metadata::default())?;
        info!("created pad at {}", fs.root().display());
        Self::load(fs, true)
    }

    fn load(mut fs: Filesystem, strict: bool) -> Result<Self> {
        let metadata = load_metadata(&fs)?;
        let mut ids = IdSource::default();
        let recovered = recovery::recover(&mut fs, &metadata, strict, &mut ids)?;
        let pad = Self {
            fs,
            files: recovered.files,
            outstanding: None,
            ids,
            recovery: recovered.report,
        };
        debug!(
            "opened pad at {} tracking {} file(s)",
            pad.fs.root().display(),
            pad.files.len()
        );
        invariant::check(&pad);
        Ok(pad)
    }

    /// The pad root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.fs.root()
    }

    /// The confined filesystem the pad works through.
    #[must_use]
    pub const fn filesystem(&self) -> &Filesystem {
        &self.fs
    }

    /// Whether this session refuses to change anything on disk.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.fs.is_read_only()
    }

    /// What recovery repaired when the pad was opened.
    #[must_use]
    pub const fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Whether a proposal is waiting to be committed or discarded.
    #[must_use]
    pub const fn has_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Tracked files: everything in `current/` plus pending files recovery
    /// found with a descriptor.
    pub fn files(&self) -> impl Iterator<Item = &PadFile> + '_ {
        self.files.iter()
    }

    /// Proposes `requested` bytes of key material.
    ///
    /// Free space in `current/` is used first, in tracking order. If that is
    /// not enough, pending files are brought in smallest first until the
    /// request is covered. Nothing is marked used until
    /// [`Pad::commit_allocation`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationOutstanding`] if a proposal is already
    /// outstanding, [`Error::ReadOnly`] for a read-only session and
    /// [`Error::OutOfPad`] if the pad cannot cover the request.
    pub fn get_allocation(&mut self, requested: u64) -> Result<Allocation> {
        if self.outstanding.is_some() {
            return Err(Error::AllocationOutstanding);
        }
        if self.is_read_only() {
            return Err(Error::ReadOnly);
        }

        let current_free: u64 = self
            .files
            .iter()
            .filter(|file| file.bucket() == Bucket::Current)
            .map(PadFile::free)
            .sum();

        let mut selected = Vec::new();
        if current_free < requested {
            let mut candidates = self.pending_candidates()?;
            candidates.sort_by(|a, b| a.size().cmp(&b.size()).then_with(|| a.name().cmp(b.name())));
            let mut available = current_free;
            let mut needed = 0;
            for candidate in &candidates {
                if available >= requested {
                    break;
                }
                available += candidate.free();
                needed += 1;
            }
            if available < requested {
                let available = current_free + candidates.iter().map(PadFile::free).sum::<u64>();
                return Err(Error::OutOfPad {
                    requested,
                    available,
                });
            }
            candidates.truncate(needed);
            selected = candidates;
        }

        let mut allocation = Allocation::empty();
        let mut remaining = requested;
        let sources = self
            .files
            .iter()
            .filter(|file| file.bucket() == Bucket::Current)
            .chain(selected.iter());
        for file in sources {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(file.free());
            if take == 0 {
                continue;
            }
            allocation = allocation.union(&file.get_allocation(take)?)?;
            remaining -= take;
        }

        let tracked: HashSet<_> = self.files.iter().map(PadFile::id).collect();
        selected.retain(|file| !tracked.contains(&file.id()));
        debug!(
            "proposed {requested} byte(s) across {} file(s), {} newly drawn from pending",
            allocation.file_count(),
            selected.len()
        );
        self.outstanding = Some(Proposal { staged: selected });
        Ok(allocation)
    }

    /// Every regular file in `pending/`, using the tracked record where one
    /// exists.
    fn pending_candidates(&mut self) -> Result<Vec<PadFile>> {
        let mut candidates = Vec::new();
        for name in self.fs.list_dir(Bucket::Pending.dir_name())? {
            if !self.fs.is_regular_file(Bucket::Pending.path_of(&name))? {
                debug!("skipping {name} in pending/: not a regular file");
                continue;
            }
            let tracked = self
                .files
                .iter()
                .find(|file| file.bucket() == Bucket::Pending && file.name() == name);
            let candidate = match tracked {
                Some(file) => file.clone(),
                None => {
                    let size = self.fs.file_len(Bucket::Pending.path_of(&name))?;
                    PadFile::new(self.ids.next_id(), name, size, Bucket::Pending)
                }
            };
            candidates.push(candidate);
        }
        Ok(candidates)
    }

    /// Marks the outstanding proposal `allocation` as used and saves the
    /// result.
    ///
    /// Every segment is checked before anything changes. Pending files are
    /// promoted to `current/` and files with no free byte left are retired to
    /// `spent/`. The outstanding slot is cleared whether or not this
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAllocationOutstanding`] if nothing was proposed,
    /// [`Error::UnknownFile`] or [`Error::IdentityConflict`] for segments
    /// that do not belong to this pad, [`Error::Overlap`] for bytes already
    /// committed, or an I/O error. An I/O error after the first change leaves
    /// the session read-only.
    pub fn commit_allocation(&mut self, allocation: &Allocation) -> Result<()> {
        let Proposal { mut staged } = self.outstanding.take().ok_or(Error::NoAllocationOutstanding)?;
        if self.is_read_only() {
            return Err(Error::ReadOnly);
        }

        for (interval, handle) in allocation.iter_files() {
            let file = self
                .files
                .iter()
                .chain(staged.iter())
                .find(|file| file.id() == handle.id())
                .ok_or_else(|| Error::UnknownFile(handle.name().to_string()))?;
            if file.name() != handle.name() || file.size() != handle.size() {
                return Err(Error::IdentityConflict(handle.name().to_string()));
            }
            file.check_commit(interval)?;
        }

        let result = self.apply_commit(allocation, &mut staged);
        if let Err(e) = &result {
            self.fs.set_read_only();
            error!("commit failed part-way, pad is now read-only: {e}");
        }
        result
    }

    fn apply_commit(&mut self, allocation: &Allocation, staged: &mut Vec<PadFile>) -> Result<()> {
        for (interval, handle) in allocation.iter_files() {
            let index = if let Some(index) = self.files.iter().position(|f| f.id() == handle.id()) {
                index
            } else {
                let at = staged
                    .iter()
                    .position(|f| f.id() == handle.id())
                    .ok_or_else(|| Error::UnknownFile(handle.name().to_string()))?;
                self.files.push(staged.swap_remove(at));
                self.files.len() - 1
            };

            if self.files[index].bucket() == Bucket::Pending {
                self.move_file(index, Bucket::Current)?;
            }
            self.files[index].commit_allocation(interval)?;
            if self.files[index].free() == 0 {
                self.move_file(index, Bucket::Spent)?;
            }
        }

        self.files.retain(|file| file.bucket() != Bucket::Spent);
        invariant::check(self);
        self.flush()?;
        info!("committed {} byte(s)", allocation.len());
        Ok(())
    }

    fn move_file(&mut self, index: usize, to: Bucket) -> Result<()> {
        let file = &self.files[index];
        self.fs
            .rename(file.bucket().path_of(file.name()), to.path_of(file.name()))?;
        info!("moved '{}' from {}/ to {to}/", file.name(), file.bucket());
        self.files[index].set_bucket(to);
        Ok(())
    }

    /// Drops the outstanding proposal without marking anything used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAllocationOutstanding`] if nothing was proposed.
    pub fn discard_uncommitted(&mut self) -> Result<()> {
        self.outstanding
            .take()
            .ok_or(Error::NoAllocationOutstanding)?;
        debug!("discarded outstanding proposal");
        Ok(())
    }

    /// Saves the tracked files to `metadata.json`.
    ///
    /// # Errors
    ///
    /// Fails when read-only or if the write fails.
    pub fn flush(&self) -> Result<()> {
        save_metadata(&self.fs, &Metadata::describing(&self.files))
    }

    /// Moves the regular file at `source` into `pending/`, keeping its name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSingleLink`] unless `source` is a regular file
    /// with exactly one link, [`Error::InvalidFileName`] if its name is not
    /// usable or already taken, and [`Error::ReadOnly`] for a read-only
    /// session.
    pub fn ingest(&mut self, source: impl AsRef<Path>) -> Result<String> {
        let source = source.as_ref();
        if self.is_read_only() {
            return Err(Error::ReadOnly);
        }

        let meta = std::fs::symlink_metadata(source)?;
        if !meta.file_type().is_file() {
            return Err(Error::NotSingleLink(source.to_path_buf()));
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            if meta.nlink() != 1 {
                return Err(Error::NotSingleLink(source.to_path_buf()));
            }
        }

        let name = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidFileName(source.display().to_string()))?;
        validate_file_name(name)?;
        if locate_in(&self.fs, name).is_ok() {
            return Err(Error::InvalidFileName(format!("'{name}' is already in the pad")));
        }

        let target = self.fs.resolve(Bucket::Pending.path_of(name))?;
        std::fs::rename(source, &target)?;
        info!("ingested '{name}' ({} bytes) into pending/", meta.len());
        Ok(name.to_string())
    }

    /// Finds the pad file called `name` in any bucket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFileName`] for names that could leave the pad
    /// and [`Error::UnknownFile`] if no bucket holds it.
    pub fn locate(&self, name: &str) -> Result<(Bucket, PathBuf)> {
        let bucket = locate_in(&self.fs, name)?;
        Ok((bucket, self.fs.resolve(bucket.path_of(name))?))
    }

    /// Opens the pad file called `name` for reading. Works on read-only
    /// sessions.
    ///
    /// # Errors
    ///
    /// See [`Pad::locate`].
    pub fn open_pad_file(&self, name: &str) -> Result<File> {
        let bucket = locate_in(&self.fs, name)?;
        self.fs.open_read(bucket.path_of(name))
    }

    /// Rebuilds a saved allocation against the files now in the pad.
    ///
    /// Every name is bound to the file found on disk under a fresh identity,
    /// spent files included. The result is for reading key material and can
    /// never be committed.
    ///
    /// # Errors
    ///
    /// Fails if a named file is missing or a range lies past its end.
    pub fn resolve_allocation(&mut self, state: &AllocationState) -> Result<Allocation> {
        let Self { fs, ids, .. } = self;
        Allocation::from_serialization_state(state, |name| {
            let bucket = locate_in(fs, name)?;
            let size = fs.file_len(bucket.path_of(name))?;
            Ok(FileRef::new(ids.next_id(), name.to_string(), size))
        })
    }

    /// Counts files and bytes in every bucket.
    ///
    /// # Errors
    ///
    /// Fails if a bucket directory cannot be listed.
    pub fn status(&self) -> Result<PadStatus> {
        let mut status = PadStatus {
            read_only: self.is_read_only(),
            ..PadStatus::default()
        };
        for bucket in Bucket::ALL {
            for name in self.fs.list_dir(bucket.dir_name())? {
                if !self.fs.is_regular_file(bucket.path_of(&name))? {
                    continue;
                }
                let tracked = self.files.iter().find(|file| file.name() == name);
                let size = match tracked {
                    Some(file) => file.size(),
                    None => self.fs.file_len(bucket.path_of(&name))?,
                };
                match bucket {
                    Bucket::Pending => {
                        status.pending_files += 1;
                        status.pending_bytes += size;
                        status.free_bytes += tracked.map_or(size, PadFile::free);
                    }
                    Bucket::Current => {
                        status.current_files += 1;
                        status.current_bytes += size;
                        status.free_bytes += tracked.map_or(0, PadFile::free);
                    }
                    Bucket::Spent => {
                        status.spent_files += 1;
                        status.spent_bytes += size;
                    }
                }
            }
        }
        Ok(status)
    }
}

fn locate_in(fs: &Filesystem, name: &str) -> Result<Bucket> {
    validate_file_name(name)?;
    for bucket in Bucket::ALL {
        if fs.exists(bucket.path_of(name))? {
            return Ok(bucket);
        }
    }
    Err(Error::UnknownFile(name.to_string()))
}

impl Invariant for Pad {
    fn check_invariant(&self) {
        let mut names = HashSet::new();
        for file in &self.files {
            file.check_invariant();
            assert!(names.insert(file.name()), "{} tracked twice", file.name());
            assert_ne!(file.bucket(), Bucket::Spent, "{} is spent but tracked", file.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn new_pad() -> (tempfile::TempDir, Pad) {
        let dir = tempfile::tempdir().unwrap();
        let pad = Pad::create(dir.path().join("pad")).unwrap();
        (dir, pad)
    }

    fn add_pending(pad: &Pad, name: &str, size: usize) {
        let path = pad.root().join("pending").join(name);
        fs::write(path, vec![0xA5; size]).unwrap();
    }

    #[test]
    fn create_lays_out_buckets() {
        let (_dir, pad) = new_pad();
        for dir in ["pending", "current", "spent", "tmp"] {
            assert!(pad.root().join(dir).is_dir(), "{dir} missing");
        }
        assert!(pad.root().join("metadata.json").is_file());
        assert!(!pad.is_read_only());
        assert!(pad.recovery_report().is_clean());
    }

    #[test]
    fn create_refuses_non_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stuff"), b"x").unwrap();
        assert!(matches!(Pad::create(dir.path()), Err(Error::InvalidPad(_))));
    }

    #[test]
    fn open_options_create_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("pad");
        OpenOptions::new().create(true).open(&root).unwrap();
        let pad = OpenOptions::new().create(true).strict(true).open(&root).unwrap();
        assert_eq!(pad.files().count(), 0);
    }

    #[test]
    fn open_options_create_in_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let pad = OpenOptions::new().create(true).open(dir.path()).unwrap();
        assert!(pad.root().join("metadata.json").is_file());
        assert!(pad.recovery_report().is_clean());

        // Without `create` an empty directory is still not a pad.
        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(Pad::open(empty.path()), Err(Error::InvalidPad(_))));
    }

    #[test]
    fn open_missing_pad_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Pad::open(dir.path().join("nope")),
            Err(Error::InvalidPad(_))
        ));
    }

    #[test]
    fn one_outstanding_proposal_at_a_time() {
        let (_dir, mut pad) = new_pad();
        add_pending(&pad, "a", 10);
        pad.get_allocation(4).unwrap();
        assert!(pad.has_outstanding());
        assert!(matches!(pad.get_allocation(1), Err(Error::AllocationOutstanding)));
        pad.discard_uncommitted().unwrap();
        assert!(!pad.has_outstanding());
        assert!(matches!(
            pad.discard_uncommitted(),
            Err(Error::NoAllocationOutstanding)
        ));
    }

    #[test]
    fn zero_byte_request_still_occupies_slot() {
        let (_dir, mut pad) = new_pad();
        let alloc = pad.get_allocation(0).unwrap();
        assert!(alloc.is_empty());
        assert!(pad.has_outstanding());
        pad.commit_allocation(&alloc).unwrap();
        assert!(!pad.has_outstanding());
    }

    #[test]
    fn commit_without_proposal_fails() {
        let (_dir, mut pad) = new_pad();
        assert!(matches!(
            pad.commit_allocation(&Allocation::empty()),
            Err(Error::NoAllocationOutstanding)
        ));
    }

    #[test]
    fn commit_promotes_pending_file() {
        let (_dir, mut pad) = new_pad();
        add_pending(&pad, "a", 10);
        let alloc = pad.get_allocation(4).unwrap();
        pad.commit_allocation(&alloc).unwrap();

        assert!(pad.root().join("current/a").is_file());
        let file = pad.files().next().unwrap();
        assert_eq!(file.bucket(), Bucket::Current);
        assert_eq!(file.used(), 4);
    }

    #[test]
    fn full_consumption_retires_file() {
        let (_dir, mut pad) = new_pad();
        add_pending(&pad, "a", 10);
        let alloc = pad.get_allocation(10).unwrap();
        pad.commit_allocation(&alloc).unwrap();

        assert!(pad.root().join("spent/a").is_file());
        assert_eq!(pad.files().count(), 0);
        assert!(matches!(
            pad.get_allocation(1),
            Err(Error::OutOfPad { requested: 1, available: 0 })
        ));
    }

    #[test]
    fn smallest_pending_files_drawn_first() {
        let (_dir, mut pad) = new_pad();
        add_pending(&pad, "big", 100);
        add_pending(&pad, "small", 5);
        add_pending(&pad, "medium", 20);
        let alloc = pad.get_allocation(15).unwrap();
        let names: Vec<_> = alloc.iter_files().map(|(_, f)| f.name().to_string()).collect();
        assert_eq!(names, ["small", "medium"]);
    }

    #[test]
    fn discarded_proposal_commits_nothing() {
        let (_dir, mut pad) = new_pad();
        add_pending(&pad, "a", 10);
        let first = pad.get_allocation(6).unwrap();
        pad.discard_uncommitted().unwrap();
        let second = pad.get_allocation(6).unwrap();
        assert_eq!(
            first.to_serialization_state(),
            second.to_serialization_state()
        );
        assert!(pad.root().join("pending/a").is_file());
    }

    #[test]
    fn foreign_allocation_is_rejected_and_clears_slot() {
        let (_dir, mut pad) = new_pad();
        let (_other_dir, mut other) = new_pad();
        add_pending(&other, "x", 10);
        let foreign = other.get_allocation(5).unwrap();

        pad.get_allocation(0).unwrap();
        assert!(matches!(
            pad.commit_allocation(&foreign),
            Err(Error::UnknownFile(_) | Error::IdentityConflict(_))
        ));
        assert!(!pad.has_outstanding());
        assert!(!pad.is_read_only());
    }

    #[test]
    fn ingest_moves_file_into_pending() {
        let (dir, mut pad) = new_pad();
        let source = dir.path().join("fresh");
        fs::write(&source, [1u8; 32]).unwrap();
        assert_eq!(pad.ingest(&source).unwrap(), "fresh");
        assert!(!source.exists());
        let (bucket, path) = pad.locate("fresh").unwrap();
        assert_eq!(bucket, Bucket::Pending);
        assert!(path.is_file());
    }

    #[test]
    fn ingest_refuses_duplicates_and_directories() {
        let (dir, mut pad) = new_pad();
        add_pending(&pad, "taken", 4);
        let source = dir.path().join("taken");
        fs::write(&source, [1u8; 4]).unwrap();
        assert!(matches!(pad.ingest(&source), Err(Error::InvalidFileName(_))));
        assert!(source.exists());

        let folder = dir.path().join("folder");
        fs::create_dir(&folder).unwrap();
        assert!(matches!(pad.ingest(&folder), Err(Error::NotSingleLink(_))));
    }

    #[cfg(unix)]
    #[test]
    fn ingest_refuses_hard_linked_file() {
        let (dir, mut pad) = new_pad();
        let source = dir.path().join("linked");
        fs::write(&source, [1u8; 4]).unwrap();
        fs::hard_link(&source, dir.path().join("alias")).unwrap();
        assert!(matches!(pad.ingest(&source), Err(Error::NotSingleLink(_))));
    }

    #[test]
    fn locate_rejects_escaping_names() {
        let (_dir, pad) = new_pad();
        assert!(pad.locate("../metadata.json").is_err());
        assert!(matches!(pad.locate("missing"), Err(Error::UnknownFile(_))));
    }

    #[test]
    fn status_counts_buckets() {
        let (_dir, mut pad) = new_pad();
        add_pending(&pad, "a", 10);
        add_pending(&pad, "b", 30);
        let alloc = pad.get_allocation(12).unwrap();
        pad.commit_allocation(&alloc).unwrap();

        let status = pad.status().unwrap();
        assert_eq!(status.pending_files, 0);
        assert_eq!(status.current_files, 1);
        assert_eq!(status.current_bytes, 30);
        assert_eq!(status.spent_files, 1);
        assert_eq!(status.spent_bytes, 10);
        assert_eq!(status.free_bytes, 28);
    }

    #[test]
    fn directories_in_pending_are_not_pad_material() {
        let (_dir, mut pad) = new_pad();
        fs::create_dir(pad.root().join("pending").join("subdir")).unwrap();
        assert!(matches!(
            pad.get_allocation(10),
            Err(Error::OutOfPad { requested: 10, available: 0 })
        ));

        add_pending(&pad, "real", 10);
        let alloc = pad.get_allocation(10).unwrap();
        let state = alloc.to_serialization_state();
        assert_eq!(state.segments.len(), 1);
        assert_eq!(state.segments[0].file, "real");
        pad.commit_allocation(&alloc).unwrap();
        assert!(pad.root().join("pending").join("subdir").is_dir());

        let status = pad.status().unwrap();
        assert_eq!(status.pending_files, 0);
        assert_eq!(status.spent_files, 1);
    }
}
