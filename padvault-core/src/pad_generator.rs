// File:    pad_generator.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: Provides functionality for generating high-quality one-time pads for cryptographic use.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use crate::error::Result;
use crate::pad::Pad;
use rand::{TryRngCore, rngs::OsRng};
use std::io::{self, Write};

const CHUNK: usize = 64 * 1024;

/// Generates a new pad file of `size` random bytes and adds it to `pad`'s
/// pending bucket.
///
/// The bytes are written to the pad's scratch directory first, so a crash
/// never leaves a partially written file in `pending/`.
///
/// # Returns
///
/// The name of the new pad file.
///
/// # Errors
///
/// This function will return an error if `size` is zero, the pad is
/// read-only, the operating system's random source fails or the file cannot
/// be written.
pub fn generate_pad(pad: &mut Pad, size: u64) -> Result<String> {
    if size == 0 {
        return Err(
            io::Error::new(io::ErrorKind::InvalidInput, "pad size must be at least one byte").into(),
        );
    }
    let mut rng = OsRng;
    let (scratch, mut file) = pad.filesystem().create_scratch()?;

    let mut buffer = vec![0u8; CHUNK];
    let mut remaining = size;
    while remaining > 0 {
        let n = usize::try_from(remaining).map_or(CHUNK, |r| r.min(CHUNK));
        // Use the failable `try_fill_bytes` and map the error to an `io::Error`.
        rng.try_fill_bytes(&mut buffer[..n])
            .map_err(io::Error::other)?;
        file.write_all(&buffer[..n])?;
        remaining -= n as u64;
    }
    file.sync_all()?;
    drop(file);

    let path = pad.filesystem().resolve(&scratch)?;
    pad.ingest(path)
}
