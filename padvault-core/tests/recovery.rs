#![allow(missing_docs)]
use padvault_core::filesystem::Filesystem;
use padvault_core::metadata::{FileDescriptor, Metadata, load_metadata, save_metadata};
use padvault_core::{Atom, Bucket, Error, OpenOptions, Pad};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

/// A pad holding one 100 byte file `a` with its first `used` bytes committed.
fn pad_with_current_file(used: u64) -> (TempDir, PathBuf) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let root = temp_dir.path().join("pad");
    let mut pad = Pad::create(&root).expect("Failed to create pad");
    fs::write(root.join("pending/a"), [3u8; 100]).expect("Failed to write pad file");
    let alloc = pad.get_allocation(used).expect("Failed to allocate");
    pad.commit_allocation(&alloc).expect("Failed to commit");
    (temp_dir, root)
}

fn rewrite_metadata(root: &Path, files: Vec<FileDescriptor>) {
    let fs = Filesystem::new(root).expect("Failed to confine filesystem");
    let metadata = Metadata {
        files,
        ..Metadata::default()
    };
    save_metadata(&fs, &metadata).expect("Failed to save metadata");
}

fn saved_files(root: &Path) -> Vec<FileDescriptor> {
    let fs = Filesystem::new(root).expect("Failed to confine filesystem");
    load_metadata(&fs).expect("Failed to load metadata").files
}

#[test]
fn test_clean_pad_opens_writable() {
    let (_temp_dir, root) = pad_with_current_file(10);
    let pad = Pad::open(&root).expect("Failed to open pad");
    assert!(pad.recovery_report().is_clean());
    assert!(!pad.is_read_only());
}

#[test]
fn test_missing_fully_used_entry_is_dropped() {
    // 1. Metadata still lists a file that was fully used and is now gone
    let (_temp_dir, root) = pad_with_current_file(10);
    let mut files = saved_files(&root);
    files.push(FileDescriptor {
        name: "gone".into(),
        size: 50,
        used: 50,
        bucket: Bucket::Current,
        extents: vec![Atom::new(0, 50)],
    });
    rewrite_metadata(&root, files);

    // 2. Opening drops the entry and locks the session
    let mut pad = Pad::open(&root).expect("Failed to open pad");
    assert_eq!(pad.recovery_report().repairs().len(), 1);
    assert!(pad.is_read_only());
    assert!(matches!(pad.get_allocation(1), Err(Error::ReadOnly)));
    drop(pad);

    // 3. The repair was saved, so the next open is clean
    assert_eq!(saved_files(&root).len(), 1);
    let pad = Pad::open(&root).expect("Failed to reopen pad");
    assert!(pad.recovery_report().is_clean());
    assert!(!pad.is_read_only());
}

#[test]
fn test_missing_unused_entry_is_dropped() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let root = temp_dir.path().join("pad");
    Pad::create(&root).expect("Failed to create pad");
    rewrite_metadata(
        &root,
        vec![FileDescriptor {
            name: "never-used".into(),
            size: 50,
            used: 0,
            bucket: Bucket::Pending,
            extents: Vec::new(),
        }],
    );

    let pad = Pad::open(&root).expect("Failed to open pad");
    assert!(!pad.recovery_report().is_clean());
    assert!(saved_files(&root).is_empty());
}

#[test]
fn test_missing_partially_used_file_is_fatal() {
    let (_temp_dir, root) = pad_with_current_file(10);
    fs::remove_file(root.join("current/a")).expect("Failed to remove pad file");
    assert!(matches!(Pad::open(&root), Err(Error::InvalidPad(_))));
}

#[test]
fn test_resized_file_is_retired() {
    // 1. Someone truncates a partially used file
    let (_temp_dir, root) = pad_with_current_file(10);
    fs::write(root.join("current/a"), [3u8; 40]).expect("Failed to truncate pad file");

    // 2. It is moved to spent and no longer tracked
    let pad = Pad::open(&root).expect("Failed to open pad");
    assert!(!pad.recovery_report().is_clean());
    assert!(root.join("spent/a").is_file());
    assert_eq!(pad.files().count(), 0);
    drop(pad);

    // 3. It is never offered again
    let mut pad = Pad::open(&root).expect("Failed to reopen pad");
    assert!(matches!(
        pad.get_allocation(1),
        Err(Error::OutOfPad { available: 0, .. })
    ));
}

#[test]
fn test_interrupted_retirement_is_completed() {
    // The file reached spent/ but the metadata still lists it as current.
    let (_temp_dir, root) = pad_with_current_file(10);
    fs::rename(root.join("current/a"), root.join("spent/a")).expect("Failed to move pad file");

    let pad = Pad::open(&root).expect("Failed to open pad");
    assert!(!pad.recovery_report().is_clean());
    assert_eq!(pad.files().count(), 0);
    assert!(saved_files(&root).is_empty());
}

#[test]
fn test_file_found_in_pending_keeps_its_usage() {
    // 1. The file is back in pending/ while metadata says current
    let (_temp_dir, root) = pad_with_current_file(10);
    fs::rename(root.join("current/a"), root.join("pending/a")).expect("Failed to move pad file");

    // 2. Recovery follows the file and keeps its committed ranges
    let pad = Pad::open(&root).expect("Failed to open pad");
    let file = pad.files().next().expect("file not tracked");
    assert_eq!(file.bucket(), Bucket::Pending);
    assert_eq!(file.used(), 10);
    drop(pad);

    // 3. Allocation resumes after the committed ranges
    let mut pad = Pad::open(&root).expect("Failed to reopen pad");
    assert!(pad.recovery_report().is_clean());
    let alloc = pad.get_allocation(5).expect("Failed to allocate");
    assert_eq!(
        alloc.to_serialization_state().segments[0].atoms,
        vec![Atom::new(10, 5)]
    );
    pad.commit_allocation(&alloc).expect("Failed to commit");
    assert!(root.join("current/a").is_file());
}

#[test]
fn test_stray_current_file_is_retired() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let root = temp_dir.path().join("pad");
    Pad::create(&root).expect("Failed to create pad");
    fs::write(root.join("current/stray"), [1u8; 10]).expect("Failed to write pad file");

    let pad = Pad::open(&root).expect("Failed to open pad");
    assert!(pad.is_read_only());
    assert!(root.join("spent/stray").is_file());
    assert!(!root.join("current/stray").exists());
}

#[test]
fn test_directory_in_current_is_left_alone() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let root = temp_dir.path().join("pad");
    Pad::create(&root).expect("Failed to create pad");
    fs::create_dir(root.join("current/subdir")).expect("Failed to create directory");

    let pad = OpenOptions::new()
        .strict(true)
        .open(&root)
        .expect("Failed to open pad");
    assert!(pad.recovery_report().is_clean());
    assert!(!pad.is_read_only());
    assert!(root.join("current/subdir").is_dir());
    assert!(!root.join("spent/subdir").exists());
}

#[test]
fn test_strict_open_reports_and_changes_nothing() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let root = temp_dir.path().join("pad");
    Pad::create(&root).expect("Failed to create pad");
    fs::write(root.join("current/stray"), [1u8; 10]).expect("Failed to write pad file");
    let before = fs::read(root.join("metadata.json")).expect("Failed to read metadata");

    let result = OpenOptions::new().strict(true).open(&root);
    assert!(matches!(result, Err(Error::PadDirty(_))));
    assert!(root.join("current/stray").is_file());
    assert_eq!(
        fs::read(root.join("metadata.json")).expect("Failed to read metadata"),
        before
    );
}

#[test]
fn test_duplicate_names_across_buckets_are_fatal() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let root = temp_dir.path().join("pad");
    Pad::create(&root).expect("Failed to create pad");
    fs::write(root.join("pending/twin"), [1u8; 10]).expect("Failed to write pad file");
    fs::write(root.join("spent/twin"), [1u8; 10]).expect("Failed to write pad file");
    assert!(matches!(Pad::open(&root), Err(Error::InvalidPad(_))));
}

#[test]
fn test_missing_bucket_directory_is_fatal() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let root = temp_dir.path().join("pad");
    Pad::create(&root).expect("Failed to create pad");
    fs::remove_dir(root.join("spent")).expect("Failed to remove bucket");
    assert!(matches!(Pad::open(&root), Err(Error::InvalidPad(_))));
}

#[test]
fn test_corrupt_extents_are_fatal() {
    let (_temp_dir, root) = pad_with_current_file(10);
    let mut files = saved_files(&root);
    files[0].used = 99;
    rewrite_metadata(&root, files);
    assert!(matches!(Pad::open(&root), Err(Error::InvalidPad(_))));
}
