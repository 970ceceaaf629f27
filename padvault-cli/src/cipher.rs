// File:    cipher.rs
// Author:  apezoo
// Date:    2025-07-17
//
// Description: Combines a data stream with pad bytes named by an allocation.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use padvault_core::{Allocation, Atom, Pad, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Reads the pad bytes of an allocation in order: file by file, each file's
/// ranges from the lowest offset up.
pub(crate) struct KeyStream<'a> {
    pad: &'a Pad,
    ranges: std::vec::IntoIter<(String, Atom)>,
    current: Option<io::Take<File>>,
}

impl<'a> KeyStream<'a> {
    pub(crate) fn new(pad: &'a Pad, allocation: &Allocation) -> Self {
        let ranges: Vec<_> = allocation
            .iter_files()
            .flat_map(|(interval, file)| {
                interval
                    .iter_interior()
                    .map(move |atom| (file.name().to_string(), atom))
            })
            .collect();
        Self {
            pad,
            ranges: ranges.into_iter(),
            current: None,
        }
    }

    fn open_next(&mut self) -> io::Result<bool> {
        let Some((name, atom)) = self.ranges.next() else {
            return Ok(false);
        };
        let mut file = self.pad.open_pad_file(&name).map_err(io::Error::other)?;
        file.seek(SeekFrom::Start(atom.start))?;
        self.current = Some(file.take(atom.len));
        Ok(true)
    }
}

impl Read for KeyStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if let Some(range) = &mut self.current {
                let n = range.read(buf)?;
                if n > 0 || buf.is_empty() {
                    return Ok(n);
                }
                if range.limit() > 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "pad file is shorter than its allocation",
                    ));
                }
                self.current = None;
            }
            if !self.open_next()? {
                return Ok(0);
            }
        }
    }
}

/// XORs everything from `reader` with the key stream and writes the result
/// to `writer`. Every written chunk is also passed to `observe`.
///
/// The operation is symmetric: applying it to the ciphertext with the same
/// allocation gives back the plaintext.
///
/// # Returns
///
/// The number of bytes processed.
///
/// # Errors
///
/// Fails on I/O errors, or if `reader` holds more bytes than the key stream.
pub(crate) fn process_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    mut key: KeyStream<'_>,
    mut observe: impl FnMut(&[u8]),
) -> Result<u64> {
    let mut buffer = [0; 8192]; // Process in 8KB chunks
    let mut key_buffer = [0; 8192];
    let mut total = 0u64;

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }

        let chunk = &mut buffer[..bytes_read];
        key.read_exact(&mut key_buffer[..bytes_read]).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                io::Error::new(e.kind(), "input is longer than the allocated pad bytes")
            } else {
                e
            }
        })?;
        for (byte, key_byte) in chunk.iter_mut().zip(&key_buffer[..bytes_read]) {
            *byte ^= key_byte;
        }

        writer.write_all(chunk)?;
        observe(chunk);
        total += bytes_read as u64;
    }

    writer.flush()?;
    Ok(total)
}
