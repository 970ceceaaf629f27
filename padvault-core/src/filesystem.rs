// File:    filesystem.rs
// Author:  apezoo
// Date:    2025-09-02
//
// Description: Path-confined filesystem access rooted at a pad directory.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The only way the pad touches the disk.
//!
//! Every path is resolved relative to the pad root and rejected if it would
//! land outside it, lexically or through a symlink. A message naming
//! `../../etc/shadow` as a pad file must never get as far as an `open`.

use crate::error::{Error, Result};
use log::debug;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Directory used for atomic writes and freshly generated files.
pub const SCRATCH_DIR: &str = "tmp";

/// Filesystem access confined to one directory tree.
#[derive(Debug, Clone)]
pub struct Filesystem {
    root: PathBuf,
    read_only: bool,
}

impl Filesystem {
    /// Confines access to `root`. The directory need not exist yet.
    ///
    /// # Errors
    ///
    /// Fails if `root` cannot be made absolute or is the filesystem root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let absolute = std::path::absolute(root.as_ref())?;
        let mut normalized = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir => {}
                other => normalized.push(other),
            }
        }
        if normalized.parent().is_none() {
            return Err(Error::InvalidPad(
                "the filesystem root cannot hold a pad".to_string(),
            ));
        }
        Ok(Self {
            root: normalized,
            read_only: false,
        })
    }

    /// The pad root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether writes are refused.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Refuses all further writes through this handle.
    pub fn set_read_only(&mut self) {
        self.read_only = true;
    }

    /// Resolves `rel` to an absolute path inside the root.
    ///
    /// Absolute inputs are accepted only if they already lie under the root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathEscape`] for anything that resolves outside the
    /// root, including through symlinks.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> Result<PathBuf> {
        let rel = rel.as_ref();
        let escape = || Error::PathEscape(rel.to_path_buf());

        let relative = if rel.is_absolute() {
            rel.strip_prefix(&self.root).map_err(|_| escape())?
        } else {
            rel
        };

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(escape());
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => return Err(escape()),
            }
        }

        if !self.stays_inside(&resolved) {
            return Err(escape());
        }
        Ok(resolved)
    }

    /// Follows symlinks on the existing part of `path` and confirms it still
    /// lands under the root.
    fn stays_inside(&self, path: &Path) -> bool {
        let Ok(root) = fs::canonicalize(&self.root) else {
            // Root not created yet: nothing under it can be a link.
            return true;
        };
        let mut ancestor = Some(path);
        while let Some(candidate) = ancestor {
            if let Ok(real) = fs::canonicalize(candidate) {
                return real.starts_with(&root);
            }
            ancestor = candidate.parent();
        }
        true
    }

    fn writable(&self) -> Result<()> {
        if self.read_only {
            Err(Error::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Whether `rel` exists.
    ///
    /// # Errors
    ///
    /// Fails on boundary violations or if existence cannot be determined.
    pub fn exists(&self, rel: impl AsRef<Path>) -> Result<bool> {
        Ok(self.resolve(rel)?.try_exists()?)
    }

    /// Size of the file at `rel`.
    ///
    /// # Errors
    ///
    /// Fails on boundary violations or I/O errors.
    pub fn file_len(&self, rel: impl AsRef<Path>) -> Result<u64> {
        Ok(fs::metadata(self.resolve(rel)?)?.len())
    }

    /// Whether `rel` is a regular file. Symlinks are not followed.
    ///
    /// # Errors
    ///
    /// Fails on boundary violations or I/O errors.
    pub fn is_regular_file(&self, rel: impl AsRef<Path>) -> Result<bool> {
        Ok(fs::symlink_metadata(self.resolve(rel)?)?.file_type().is_file())
    }

    /// Names of the entries in directory `rel`, sorted.
    ///
    /// # Errors
    ///
    /// Fails on boundary violations, I/O errors and non UTF-8 names.
    pub fn list_dir(&self, rel: impl AsRef<Path>) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.resolve(rel)?)? {
            let name = entry?.file_name();
            let name = name
                .into_string()
                .map_err(|raw| Error::InvalidFileName(raw.to_string_lossy().into_owned()))?;
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Creates the root directory and any missing parents.
    ///
    /// # Errors
    ///
    /// Fails when read-only and on I/O errors.
    pub fn create_root(&self) -> Result<()> {
        self.writable()?;
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Creates directory `rel`. Its parent must exist.
    ///
    /// # Errors
    ///
    /// Fails when read-only, on boundary violations and on I/O errors.
    pub fn mkdir(&self, rel: impl AsRef<Path>) -> Result<()> {
        self.writable()?;
        fs::create_dir(self.resolve(rel)?)?;
        Ok(())
    }

    /// Moves `from` to `to`, refusing to overwrite an existing entry.
    ///
    /// # Errors
    ///
    /// Fails when read-only, on boundary violations, when `to` exists and on
    /// I/O errors.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        self.writable()?;
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        if to.try_exists()? {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("refusing to overwrite {}", to.display()),
            )
            .into());
        }
        fs::rename(&from, &to)?;
        debug!("moved {} -> {}", from.display(), to.display());
        Ok(())
    }

    /// Opens `rel` for reading. Allowed in read-only mode.
    ///
    /// # Errors
    ///
    /// Fails on boundary violations and I/O errors.
    pub fn open_read(&self, rel: impl AsRef<Path>) -> Result<File> {
        Ok(File::open(self.resolve(rel)?)?)
    }

    /// Creates a new, uniquely named file in the scratch directory and
    /// returns its relative path together with the open handle.
    ///
    /// # Errors
    ///
    /// Fails when read-only and on I/O errors.
    pub fn create_scratch(&self) -> Result<(PathBuf, File)> {
        self.writable()?;
        let rel = Path::new(SCRATCH_DIR).join(Uuid::new_v4().to_string());
        let file = File::options()
            .write(true)
            .create_new(true)
            .open(self.resolve(&rel)?)?;
        Ok((rel, file))
    }

    /// Replaces `rel` with `data` so that a crash leaves either the old or
    /// the new contents, never a mix: the data is written and synced in the
    /// scratch directory, then renamed over the target.
    ///
    /// # Errors
    ///
    /// Fails when read-only, on boundary violations and on I/O errors.
    pub fn write_atomic(&self, rel: impl AsRef<Path>, data: &[u8]) -> Result<()> {
        let (scratch, mut file) = self.create_scratch()?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(self.resolve(&scratch)?, self.resolve(rel)?)?;
        Ok(())
    }
}

/// Checks that `name` is a bare file name: one normal path component.
///
/// # Errors
///
/// Returns [`Error::InvalidFileName`] otherwise.
pub fn validate_file_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None)
            if part == name && !name.contains(['/', '\\']) =>
        {
            Ok(())
        }
        _ => Err(Error::InvalidFileName(name.to_string())),
    }
}
