// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

use sha1::{Digest, Sha1};
use std::io::{self, Read};

pub const BUF_SIZE: usize = 1024;
pub const SHA1_DIGEST_SIZE: usize = 20;

pub type Sha1Digest = [u8; SHA1_DIGEST_SIZE];

/// Computes the SHA-1 digest of a stream, reading it in `BUF_SIZE` chunks
/// until end of stream.
///
/// # Errors
///
/// Returns the first read error other than `ErrorKind::Interrupted`.
pub fn sha1_stream<R: Read>(reader: &mut R) -> io::Result<Sha1Digest> {
    let mut hasher = Sha1::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    let mut digest = [0u8; SHA1_DIGEST_SIZE];
    digest.copy_from_slice(&hasher.finalize());
    Ok(digest)
}
