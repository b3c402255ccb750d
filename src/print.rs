// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

use std::io::{self, Write};

/// Writes `bytes` as two-digit lowercase hex values, each followed by a
/// space, and terminates the line.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn dump_buf<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    for byte in bytes {
        write!(writer, "{byte:02x} ")?;
    }
    writeln!(writer)
}

/// Parses a line produced by `dump_buf` back into bytes.
///
/// # Errors
///
/// Returns a `hex::FromHexError` if a token is not a two-digit hex value.
pub fn parse_dump(line: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let mut bytes = Vec::new();
    for token in line.split_whitespace() {
        let mut byte = [0u8; 1];
        hex::decode_to_slice(token, &mut byte)?;
        bytes.push(byte[0]);
    }
    Ok(bytes)
}
