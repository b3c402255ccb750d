// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

//! An in-memory TPM with a single SHA-1 PCR bank.

use crate::{
    device::PCR_SELECT_MIN,
    digest::{Sha1Digest, SHA1_DIGEST_SIZE},
    rc::TssRc,
    stack::{ContextHandle, TpmHandle, TpmStack},
    transport::{read_frame, Transport, TransportError},
};
use log::{error, trace, warn};
use sha1::{Digest, Sha1};
use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
};
use tpm2_protocol::{
    data::{Tpm2bDigest, TpmAlgId, TpmRc, TpmRcBase, TpmlDigest, TpmlPcrSelection, TpmuHa},
    message::{
        tpm_build_response, tpm_parse_command, TpmCommandBody, TpmFlushContextResponse,
        TpmPcrExtendCommand, TpmPcrExtendResponse, TpmPcrReadCommand, TpmPcrReadResponse,
        TpmResponseBody,
    },
    TpmWriter, TPM_MAX_COMMAND_SIZE,
};

pub const PCR_COUNT: usize = 24;

const TPM_RC_P: u32 = 0x040;
const TPM_RC_N_SHIFT: u32 = 8;

/// `base` tied to the n:th command parameter.
#[must_use]
pub fn rc_parameter(base: TpmRcBase, n: u32) -> TpmRc {
    TpmRc::try_from(base as u32 | TPM_RC_P | (n << TPM_RC_N_SHIFT))
        .unwrap_or_else(|_| TpmRc::from(base))
}

/// `base` tied to the n:th command handle.
#[must_use]
pub fn rc_handle(base: TpmRcBase, n: u32) -> TpmRc {
    TpmRc::try_from(base as u32 | (n << TPM_RC_N_SHIFT)).unwrap_or_else(|_| TpmRc::from(base))
}

#[derive(Debug, Clone)]
pub struct MockTpm {
    pcrs: Vec<Sha1Digest>,
    update_counter: u32,
}

impl Default for MockTpm {
    fn default() -> Self {
        Self {
            pcrs: vec![[0; SHA1_DIGEST_SIZE]; PCR_COUNT],
            update_counter: 0,
        }
    }
}

impl MockTpm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a PCR, `None` if it is not implemented.
    #[must_use]
    pub fn pcr(&self, index: u32) -> Option<&[u8]> {
        let index = usize::try_from(index).ok()?;
        self.pcrs.get(index).map(<[u8; SHA1_DIGEST_SIZE]>::as_slice)
    }

    /// # Errors
    ///
    /// Returns `TPM_RC_VALUE` on parameter 1 for an unimplemented PCR.
    pub fn pcr_read(&self, index: u32) -> Result<Vec<u8>, TpmRc> {
        self.pcr(index)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| rc_parameter(TpmRcBase::Value, 1))
    }

    /// Extends a PCR: `new = SHA1(old || digest)`.
    ///
    /// # Errors
    ///
    /// Returns `TPM_RC_VALUE` on handle 1 for an unimplemented PCR, and
    /// `TPM_RC_SIZE` on parameter 1 for a digest that is not 20 bytes.
    pub fn pcr_extend(&mut self, index: u32, digest: &[u8]) -> Result<(), TpmRc> {
        let pcr = usize::try_from(index)
            .ok()
            .and_then(|index| self.pcrs.get_mut(index))
            .ok_or_else(|| rc_handle(TpmRcBase::Value, 1))?;
        if digest.len() != SHA1_DIGEST_SIZE {
            return Err(rc_parameter(TpmRcBase::Size, 1));
        }
        let next = Sha1::new()
            .chain_update(pcr.as_slice())
            .chain_update(digest)
            .finalize();
        pcr.copy_from_slice(&next);
        self.update_counter = self.update_counter.wrapping_add(1);
        Ok(())
    }

    /// Executes a command frame and returns the response frame. An empty
    /// frame is returned if the response cannot be marshaled.
    pub fn execute(&mut self, command: &[u8]) -> Vec<u8> {
        trace!("mock TPM command: {}", hex::encode(command));
        let mut buf = [0u8; TPM_MAX_COMMAND_SIZE];
        let len = {
            let mut writer = TpmWriter::new(&mut buf);
            let success = TpmRc::from(TpmRcBase::Success);
            let result = match self.dispatch(command) {
                Ok(TpmResponseBody::PcrRead(resp)) => {
                    tpm_build_response(&resp, &[], success, &mut writer)
                }
                Ok(TpmResponseBody::PcrExtend(resp)) => {
                    tpm_build_response(&resp, &[], success, &mut writer)
                }
                Ok(_) => tpm_build_response(
                    &TpmFlushContextResponse {},
                    &[],
                    TpmRc::from(TpmRcBase::Failure),
                    &mut writer,
                ),
                Err(rc) => tpm_build_response(&TpmFlushContextResponse {}, &[], rc, &mut writer),
            };
            if let Err(e) = result {
                error!("mock TPM response: {e:?}");
                return Vec::new();
            }
            writer.len()
        };
        trace!("mock TPM response: {}", hex::encode(&buf[..len]));
        buf[..len].to_vec()
    }

    fn dispatch(&mut self, command: &[u8]) -> Result<TpmResponseBody, TpmRc> {
        let (handles, body, _sessions) = tpm_parse_command(command).map_err(|e| {
            warn!("mock TPM command: {e:?}");
            TpmRc::from(TpmRcBase::Size)
        })?;
        match body {
            TpmCommandBody::PcrRead(cmd) => self.pcr_read_command(&cmd),
            TpmCommandBody::PcrExtend(cmd) => {
                let index = handles
                    .iter()
                    .next()
                    .copied()
                    .ok_or_else(|| TpmRc::from(TpmRcBase::Handle))?;
                self.pcr_extend_command(index, &cmd)
            }
            _ => Err(TpmRc::from(TpmRcBase::CommandCode)),
        }
    }

    fn pcr_read_command(&self, cmd: &TpmPcrReadCommand) -> Result<TpmResponseBody, TpmRc> {
        let mut pcr_values = TpmlDigest::new();
        let mut pcr_selection_out = TpmlPcrSelection::new();
        for selection in cmd.pcr_selection_in.iter() {
            if selection.pcr_select.len() != PCR_SELECT_MIN {
                return Err(rc_parameter(TpmRcBase::Value, 1));
            }
            if selection.hash != TpmAlgId::Sha1 {
                continue;
            }
            for (byte_idx, &byte) in selection.pcr_select.iter().enumerate() {
                for bit_idx in 0..8 {
                    if (byte >> bit_idx) & 1 == 0 {
                        continue;
                    }
                    let value = self.pcrs[byte_idx * 8 + bit_idx];
                    let digest = Tpm2bDigest::try_from(value.as_slice())
                        .map_err(|_| TpmRc::from(TpmRcBase::Value))?;
                    pcr_values
                        .try_push(digest)
                        .map_err(|_| TpmRc::from(TpmRcBase::Memory))?;
                }
            }
            pcr_selection_out
                .try_push(*selection)
                .map_err(|_| TpmRc::from(TpmRcBase::Memory))?;
        }
        Ok(TpmResponseBody::PcrRead(TpmPcrReadResponse {
            pcr_update_counter: self.update_counter,
            pcr_selection_out,
            pcr_values,
        }))
    }

    fn pcr_extend_command(
        &mut self,
        index: u32,
        cmd: &TpmPcrExtendCommand,
    ) -> Result<TpmResponseBody, TpmRc> {
        for ha in cmd.digests.iter() {
            match &ha.digest {
                TpmuHa::Sha1(digest) => self.pcr_extend(index, &digest[..])?,
                _ => return Err(rc_parameter(TpmRcBase::Hash, 1)),
            }
        }
        Ok(TpmResponseBody::PcrExtend(TpmPcrExtendResponse::default()))
    }
}

/// A `Transport` answering commands from a shared `MockTpm`.
#[derive(Debug, Clone)]
pub struct MockTransport {
    tpm: Arc<Mutex<MockTpm>>,
    response: Option<Vec<u8>>,
}

impl MockTransport {
    #[must_use]
    pub fn new(tpm: Arc<Mutex<MockTpm>>) -> Self {
        Self {
            tpm,
            response: None,
        }
    }
}

impl Transport for MockTransport {
    fn send(&mut self, command_bytes: &[u8]) -> Result<(), TransportError> {
        let mut tpm = self
            .tpm
            .lock()
            .map_err(|_| io::Error::other("mock TPM lock poisoned"))?;
        self.response = Some(tpm.execute(command_bytes));
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let frame = self
            .response
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no pending response"))?;
        read_frame(&mut frame.as_slice())
    }
}

/// A `TpmStack` operation, for counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    CreateContext,
    Connect,
    GetTpmObject,
    PcrRead,
    PcrExtend,
    FreeMemory,
    CloseContext,
}

/// A `TpmStack` over a `MockTpm` that records how it is driven.
#[derive(Debug, Default)]
pub struct MockStack {
    pub tpm: MockTpm,
    calls: HashMap<Call, usize>,
    failures: HashMap<Call, TssRc>,
    extends: Vec<(u32, Vec<u8>)>,
    contexts: Vec<ContextHandle>,
    next_handle: u32,
}

impl MockStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every invocation of `call` fail with `rc`.
    #[must_use]
    pub fn fail(mut self, call: Call, rc: TssRc) -> Self {
        self.failures.insert(call, rc);
        self
    }

    #[must_use]
    pub fn calls(&self, call: Call) -> usize {
        self.calls.get(&call).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.values().sum()
    }

    /// `(index, digest)` of every extend request, failed ones included.
    #[must_use]
    pub fn extends(&self) -> &[(u32, Vec<u8>)] {
        &self.extends
    }

    /// Contexts created and not yet closed.
    #[must_use]
    pub fn open_contexts(&self) -> usize {
        self.contexts.len()
    }

    fn enter(&mut self, call: Call) -> Result<(), TssRc> {
        *self.calls.entry(call).or_default() += 1;
        match self.failures.get(&call) {
            Some(&rc) => Err(rc),
            None => Ok(()),
        }
    }
}

impl TpmStack for MockStack {
    fn create_context(&mut self) -> Result<ContextHandle, TssRc> {
        self.enter(Call::CreateContext)?;
        self.next_handle += 1;
        let context = ContextHandle(self.next_handle);
        self.contexts.push(context);
        Ok(context)
    }

    fn connect(&mut self, _context: ContextHandle) -> Result<(), TssRc> {
        self.enter(Call::Connect)
    }

    fn get_tpm_object(&mut self, context: ContextHandle) -> Result<TpmHandle, TssRc> {
        self.enter(Call::GetTpmObject)?;
        Ok(TpmHandle(context.0))
    }

    fn pcr_read(&mut self, _tpm: TpmHandle, index: u32) -> Result<Vec<u8>, TssRc> {
        self.enter(Call::PcrRead)?;
        self.tpm.pcr_read(index).map_err(TssRc::Tpm)
    }

    fn pcr_extend(&mut self, _tpm: TpmHandle, index: u32, digest: &[u8]) -> Result<Vec<u8>, TssRc> {
        self.extends.push((index, digest.to_vec()));
        self.enter(Call::PcrExtend)?;
        self.tpm.pcr_extend(index, digest)?;
        self.tpm.pcr_read(index).map_err(TssRc::Tpm)
    }

    fn free_memory(&mut self, _context: ContextHandle) -> Result<(), TssRc> {
        self.enter(Call::FreeMemory)
    }

    fn close_context(&mut self, context: ContextHandle) -> Result<(), TssRc> {
        self.enter(Call::CloseContext)?;
        self.contexts.retain(|&c| c != context);
        Ok(())
    }
}
