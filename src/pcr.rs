// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

//! Dumping and extending Platform Configuration Registers (PCRs).

use crate::{print::dump_buf, session::Session, stack::TpmStack, CliError};
use std::io::Write;

/// Reads a PCR and writes its value as a hex line.
///
/// # Errors
///
/// Returns `CliError::Session` if any TPM step fails, or `CliError::Io` if
/// writing fails. The session is torn down in both cases.
pub fn dump<S: TpmStack, W: Write>(stack: &mut S, index: u32, writer: &mut W) -> Result<(), CliError> {
    let mut session = Session::open(stack)?;
    let value = session.pcr_read(index)?;
    dump_buf(writer, &value)?;
    Ok(())
}

/// Extends a PCR with `digest`, printing the value before, the digest and
/// the value after.
///
/// # Errors
///
/// Returns `CliError::Session` if any TPM step fails, or `CliError::Io` if
/// writing fails. The session is torn down in both cases.
pub fn extend<S: TpmStack, W: Write>(
    stack: &mut S,
    index: u32,
    digest: &[u8],
    writer: &mut W,
) -> Result<(), CliError> {
    let mut session = Session::open(stack)?;

    let before = session.pcr_read(index)?;
    write!(writer, "Current value for PCR {index}:\n  ")?;
    dump_buf(writer, &before)?;

    write!(writer, "Extending PCR {index} with data:\n  ")?;
    dump_buf(writer, digest)?;

    let after = session.pcr_extend(index, digest)?;
    write!(writer, "New state for PCR {index}:\n  ")?;
    dump_buf(writer, &after)?;
    Ok(())
}
