// File:    envelope.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: The metadata file stored alongside every ciphertext.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use padvault_core::{AllocationState, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Highest envelope compatibility level this build reads.
pub(crate) const COMPATIBILITY: u32 = 0;
/// Envelope format written by this build.
pub(crate) const VERSION: u32 = 1;

/// Metadata stored alongside the ciphertext to enable correct decryption.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct Envelope {
    pub(crate) compatibility: u32,
    pub(crate) version: u32,
    pub(crate) length: u64,
    pub(crate) ciphertext_hash: String,
    pub(crate) allocation: AllocationState,
}

impl Envelope {
    pub(crate) const fn new(length: u64, ciphertext_hash: String, allocation: AllocationState) -> Self {
        Self {
            compatibility: COMPATIBILITY,
            version: VERSION,
            length,
            ciphertext_hash,
            allocation,
        }
    }

    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        let encoded = serde_json::to_string_pretty(self)?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let envelope: Self = serde_json::from_str(&raw)?;
        if envelope.compatibility > COMPATIBILITY {
            return Err(invalid_data(format!(
                "metadata compatibility level {} is newer than this build",
                envelope.compatibility
            )));
        }
        let covered = envelope.allocation.len()?;
        if covered != envelope.length {
            return Err(invalid_data(format!(
                "metadata records {} bytes but its allocation covers {covered}",
                envelope.length
            )));
        }
        Ok(envelope)
    }

    /// Checks the ciphertext at `path` against the recorded hash.
    pub(crate) fn verify(&self, path: &Path) -> Result<()> {
        let mut hasher = Sha256::new();
        let mut ciphertext = fs::File::open(path)?;
        io::copy(&mut ciphertext, &mut hasher)?;
        let calculated = format!("{:x}", hasher.finalize());
        if calculated != self.ciphertext_hash {
            return Err(invalid_data(
                "Ciphertext hash does not match metadata hash. The file may be corrupt or tampered with."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// `<output>.metadata.json`
pub(crate) fn path_for(output: &Path) -> PathBuf {
    let mut path = output.as_os_str().to_owned();
    path.push(".metadata.json");
    PathBuf::from(path)
}

fn invalid_data(message: String) -> padvault_core::Error {
    io::Error::new(io::ErrorKind::InvalidData, message).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use padvault_core::{Atom, SegmentState};

    fn sample() -> Envelope {
        Envelope::new(
            5,
            "00".to_string(),
            AllocationState {
                segments: vec![SegmentState {
                    file: "key".to_string(),
                    atoms: vec![Atom::new(0, 5)],
                }],
            },
        )
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msg.metadata.json");
        sample().save(&path).unwrap();
        assert_eq!(Envelope::load(&path).unwrap(), sample());
    }

    #[test]
    fn length_must_match_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msg.metadata.json");
        let mut envelope = sample();
        envelope.length = 6;
        envelope.save(&path).unwrap();
        assert!(Envelope::load(&path).is_err());
    }

    #[test]
    fn overflowing_allocation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msg.metadata.json");
        fs::write(
            &path,
            r#"{"compatibility":0,"version":1,"length":1,"ciphertext_hash":"00",
               "allocation":[{"file":"a","atoms":[{"start":0,"len":18446744073709551615}]},
                             {"file":"b","atoms":[{"start":0,"len":2}]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            Envelope::load(&path),
            Err(padvault_core::Error::AtomOverflow { .. })
        ));
    }

    #[test]
    fn metadata_path_appends_suffix() {
        assert_eq!(
            path_for(Path::new("out/msg.enc")),
            PathBuf::from("out/msg.enc.metadata.json")
        );
    }
}
