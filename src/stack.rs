// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

//! The context/object interface of a TPM software stack.

use crate::rc::TssRc;

/// Opaque handle of a stack context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u32);

/// Opaque handle of the TPM object bound to a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TpmHandle(pub u32);

/// A TPM software stack.
///
/// Values returned by `pcr_read` and `pcr_extend` may be backed by memory
/// the stack keeps per context. That memory lives until `free_memory` is
/// called for the context.
pub trait TpmStack {
    /// Creates a fresh context.
    ///
    /// # Errors
    ///
    /// Returns the stack's response code on failure.
    fn create_context(&mut self) -> Result<ContextHandle, TssRc>;

    /// Connects a context to the local TPM. Remote hosts are not supported.
    ///
    /// # Errors
    ///
    /// Returns the stack's response code on failure.
    fn connect(&mut self, context: ContextHandle) -> Result<(), TssRc>;

    /// Returns the TPM object scoped to a connected context.
    ///
    /// # Errors
    ///
    /// Returns the stack's response code on failure.
    fn get_tpm_object(&mut self, context: ContextHandle) -> Result<TpmHandle, TssRc>;

    /// Reads the current value of a PCR.
    ///
    /// # Errors
    ///
    /// Returns the stack's or the TPM's response code on failure.
    fn pcr_read(&mut self, tpm: TpmHandle, index: u32) -> Result<Vec<u8>, TssRc>;

    /// Extends a PCR with a digest and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns the stack's or the TPM's response code on failure.
    fn pcr_extend(&mut self, tpm: TpmHandle, index: u32, digest: &[u8]) -> Result<Vec<u8>, TssRc>;

    /// Releases all memory the stack holds for a context.
    ///
    /// # Errors
    ///
    /// Returns the stack's response code on failure.
    fn free_memory(&mut self, context: ContextHandle) -> Result<(), TssRc>;

    /// Closes a context.
    ///
    /// # Errors
    ///
    /// Returns the stack's response code on failure.
    fn close_context(&mut self, context: ContextHandle) -> Result<(), TssRc>;

    /// Translates a response code into a human readable string.
    fn error_string(&self, rc: TssRc) -> String {
        rc.to_string()
    }
}
