// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

//! A scoped session with a TPM stack.

use crate::{
    rc::{TssBase, TssRc},
    stack::{ContextHandle, TpmHandle, TpmStack},
};
use log::{debug, warn};
use std::fmt;
use thiserror::Error;

/// The session step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    CreateContext,
    Connect,
    GetTpmObject,
    PcrRead(u32),
    PcrExtend(u32),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateContext => write!(f, "Failed to create context"),
            Self::Connect => write!(f, "Failed to connect context"),
            Self::GetTpmObject => write!(f, "Failed to get TPM object"),
            Self::PcrRead(index) => write!(f, "Failed to read PCR {index}"),
            Self::PcrExtend(index) => write!(f, "Failed to extend PCR {index}"),
        }
    }
}

#[derive(Debug, Error)]
#[error("{op}: {message}")]
pub struct SessionError {
    pub op: Op,
    pub rc: TssRc,
    pub message: String,
}

impl SessionError {
    fn new<S: TpmStack + ?Sized>(op: Op, rc: TssRc, stack: &S) -> Self {
        Self {
            op,
            rc,
            message: stack.error_string(rc),
        }
    }
}

/// An open context connected to the TPM.
///
/// Dropping the session frees the stack memory of the context and closes
/// it. Teardown failures are logged and never replace the result of the
/// operation performed within the session.
pub struct Session<'a, S: TpmStack> {
    stack: &'a mut S,
    context: ContextHandle,
    tpm: Option<TpmHandle>,
}

impl<'a, S: TpmStack> Session<'a, S> {
    /// Creates a context, connects it to the local TPM and fetches the TPM
    /// object.
    ///
    /// # Errors
    ///
    /// Returns a `SessionError` for the first failing step. If the context
    /// was created, it has been torn down by the time this returns.
    pub fn open(stack: &'a mut S) -> Result<Self, SessionError> {
        let context = match stack.create_context() {
            Ok(context) => context,
            Err(rc) => return Err(SessionError::new(Op::CreateContext, rc, &*stack)),
        };
        let mut session = Self {
            stack,
            context,
            tpm: None,
        };
        if let Err(rc) = session.stack.connect(context) {
            return Err(session.error(Op::Connect, rc));
        }
        let tpm = match session.stack.get_tpm_object(context) {
            Ok(tpm) => tpm,
            Err(rc) => return Err(session.error(Op::GetTpmObject, rc)),
        };
        session.tpm = Some(tpm);
        debug!("session open on context {}", context.0);
        Ok(session)
    }

    fn error(&self, op: Op, rc: TssRc) -> SessionError {
        SessionError::new(op, rc, &*self.stack)
    }

    fn tpm(&self, op: Op) -> Result<TpmHandle, SessionError> {
        self.tpm
            .ok_or_else(|| self.error(op, TssRc::esapi(TssBase::BadSequence)))
    }

    /// Reads the current value of a PCR.
    ///
    /// # Errors
    ///
    /// Returns a `SessionError` carrying the stack's response code.
    pub fn pcr_read(&mut self, index: u32) -> Result<Vec<u8>, SessionError> {
        let op = Op::PcrRead(index);
        let tpm = self.tpm(op)?;
        self.stack
            .pcr_read(tpm, index)
            .map_err(|rc| self.error(op, rc))
    }

    /// Extends a PCR with `digest` and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns a `SessionError` carrying the stack's response code.
    pub fn pcr_extend(&mut self, index: u32, digest: &[u8]) -> Result<Vec<u8>, SessionError> {
        let op = Op::PcrExtend(index);
        let tpm = self.tpm(op)?;
        self.stack
            .pcr_extend(tpm, index, digest)
            .map_err(|rc| self.error(op, rc))
    }
}

impl<S: TpmStack> Drop for Session<'_, S> {
    fn drop(&mut self) {
        if let Err(rc) = self.stack.free_memory(self.context) {
            warn!("Failed to FreeMemory: {}", self.stack.error_string(rc));
        }
        if let Err(rc) = self.stack.close_context(self.context) {
            warn!("Failed to close context: {}", self.stack.error_string(rc));
        }
        debug!("session on context {} torn down", self.context.0);
    }
}
