// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

//! A `TpmStack` speaking the TPM 2.0 command protocol to a device node.

use crate::{
    digest::SHA1_DIGEST_SIZE,
    rc::{TssBase, TssRc},
    stack::{ContextHandle, TpmHandle, TpmStack},
    transport::{FileTransport, Transport, TransportError},
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, trace, warn};
use std::{
    collections::HashMap,
    fmt,
    io::{self, IsTerminal},
    path::PathBuf,
    time::Duration,
};
use tpm2_protocol::{
    data::{
        Tpm2bAuth, Tpm2bNonce, TpmAlgId, TpmRh, TpmSt, TpmaSession, TpmlDigestValues,
        TpmlPcrSelection, TpmsAuthCommand, TpmsPcrSelection, TpmtHa, TpmuHa, TPM_PCR_SELECT_MAX,
    },
    message::{
        tpm_build_command, tpm_parse_response, TpmHeader, TpmPcrExtendCommand,
        TpmPcrReadCommand, TpmResponseBody,
    },
    TpmBuffer, TpmSession, TpmWriter, TPM_MAX_COMMAND_SIZE,
};

pub const DEFAULT_DEVICE: &str = "/dev/tpmrm0";

/// Smallest PCR select bitmap a TPM is required to accept.
pub const PCR_SELECT_MIN: usize = 3;

type Opener<T> = Box<dyn FnMut() -> io::Result<T>>;

/// Returns the PCR select bitmap selecting only `index`, or `None` if the
/// bitmap would exceed `TPM_PCR_SELECT_MAX`.
#[must_use]
pub fn pcr_select(index: u32) -> Option<Vec<u8>> {
    let byte = usize::try_from(index / 8).ok()?;
    if byte >= TPM_PCR_SELECT_MAX.max(PCR_SELECT_MIN) {
        return None;
    }
    let mut select = vec![0u8; PCR_SELECT_MIN.max(byte + 1)];
    select[byte] = 1 << (index % 8);
    Some(select)
}

fn bad_value<E: fmt::Debug>(err: E) -> TssRc {
    warn!("TPM command: {err:?}");
    TssRc::esapi(TssBase::BadValue)
}

fn password_session() -> Vec<TpmsAuthCommand> {
    vec![TpmsAuthCommand {
        session_handle: TpmSession(TpmRh::Password as u32),
        nonce: Tpm2bNonce::default(),
        session_attributes: TpmaSession::empty(),
        hmac: Tpm2bAuth::default(),
    }]
}

#[derive(Debug)]
struct DeviceContext<T> {
    transport: Option<T>,
    tpm: Option<TpmHandle>,
    memory: Vec<Vec<u8>>,
}

/// A TPM stack backed by a `Transport`, normally the kernel resource manager.
pub struct DeviceStack<T: Transport> {
    open: Opener<T>,
    contexts: HashMap<ContextHandle, DeviceContext<T>>,
    next_handle: u32,
}

impl DeviceStack<FileTransport> {
    /// Creates a stack that connects to the device node at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::with_opener(move || FileTransport::open(&path))
    }
}

impl<T: Transport> DeviceStack<T> {
    /// Creates a stack that obtains its transport from `open` on connect.
    #[must_use]
    pub fn with_opener<F>(open: F) -> Self
    where
        F: FnMut() -> io::Result<T> + 'static,
    {
        Self {
            open: Box::new(open),
            contexts: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Number of response buffers held for a context.
    #[must_use]
    pub fn allocations(&self, context: ContextHandle) -> usize {
        self.contexts.get(&context).map_or(0, |ctx| ctx.memory.len())
    }

    fn context_mut(&mut self, context: ContextHandle) -> Result<&mut DeviceContext<T>, TssRc> {
        self.contexts
            .get_mut(&context)
            .ok_or(TssRc::esapi(TssBase::BadContext))
    }

    fn tpm_context_mut(&mut self, tpm: TpmHandle) -> Result<&mut DeviceContext<T>, TssRc> {
        let ctx = self.context_mut(ContextHandle(tpm.0))?;
        if ctx.tpm == Some(tpm) {
            Ok(ctx)
        } else {
            Err(TssRc::esapi(TssBase::BadReference))
        }
    }

    /// Sends a raw command frame and waits for the response frame, which is
    /// retained in the context memory.
    ///
    /// Displays a spinner on stderr if it is a terminal.
    fn transmit(&mut self, tpm: TpmHandle, command: &[u8]) -> Result<Vec<u8>, TssRc> {
        let ctx = self.tpm_context_mut(tpm)?;
        let transport = ctx
            .transport
            .as_mut()
            .ok_or(TssRc::esapi(TssBase::BadSequence))?;

        let maybe_pb = if io::stderr().is_terminal() {
            let pb = ProgressBar::new_spinner();
            pb.enable_steady_tick(Duration::from_millis(100));
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg}") {
                pb.set_style(
                    style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
                );
            }
            pb.set_message("Waiting for TPM...");
            Some(pb)
        } else {
            None
        };

        trace!("Command: {}", hex::encode(command));
        let result = transport
            .send(command)
            .and_then(|()| transport.receive());
        if let Some(pb) = maybe_pb {
            pb.finish_and_clear();
        }
        let frame = result.map_err(|e| {
            warn!("TPM transport: {e}");
            match e {
                TransportError::Io(_) => TssRc::tcti(TssBase::IoError),
                TransportError::ResponseOverflow(_) | TransportError::ResponseUnderflow(_) => {
                    TssRc::tcti(TssBase::MalformedResponse)
                }
            }
        })?;
        trace!("Response: {}", hex::encode(&frame));

        ctx.memory.push(frame.clone());
        Ok(frame)
    }

    /// Marshals a command, runs it and unmarshals the response body.
    fn execute<C>(
        &mut self,
        tpm: TpmHandle,
        command: &C,
        handles: Option<&[u32]>,
        sessions: &[TpmsAuthCommand],
    ) -> Result<TpmResponseBody, TssRc>
    where
        C: for<'a> TpmHeader<'a>,
    {
        let mut command_buf = [0u8; TPM_MAX_COMMAND_SIZE];
        let len = {
            let mut writer = TpmWriter::new(&mut command_buf);
            let tag = if sessions.is_empty() {
                TpmSt::NoSessions
            } else {
                TpmSt::Sessions
            };
            tpm_build_command(command, tag, handles, sessions, &mut writer).map_err(bad_value)?;
            writer.len()
        };

        let frame = self.transmit(tpm, &command_buf[..len])?;
        match tpm_parse_response(C::COMMAND, &frame) {
            Ok(Ok((rc, response, _))) => {
                if rc.is_warning() {
                    warn!("TPM command completed with a warning: {rc}");
                }
                Ok(response)
            }
            Ok(Err((rc, _))) => Err(TssRc::Tpm(rc)),
            Err(e) => {
                warn!("TPM response: {e:?}");
                Err(TssRc::esapi(TssBase::MalformedResponse))
            }
        }
    }
}

impl<T: Transport> TpmStack for DeviceStack<T> {
    fn create_context(&mut self) -> Result<ContextHandle, TssRc> {
        let handle = ContextHandle(self.next_handle);
        self.next_handle = self
            .next_handle
            .checked_add(1)
            .ok_or(TssRc::esapi(TssBase::BadContext))?;
        self.contexts.insert(
            handle,
            DeviceContext {
                transport: None,
                tpm: None,
                memory: Vec::new(),
            },
        );
        debug!("context {} created", handle.0);
        Ok(handle)
    }

    fn connect(&mut self, context: ContextHandle) -> Result<(), TssRc> {
        if self.context_mut(context)?.transport.is_some() {
            return Err(TssRc::esapi(TssBase::BadSequence));
        }
        let transport = (self.open)().map_err(|e| {
            warn!("TPM device: {e}");
            TssRc::tcti(TssBase::NoConnection)
        })?;
        self.context_mut(context)?.transport = Some(transport);
        debug!("context {} connected", context.0);
        Ok(())
    }

    fn get_tpm_object(&mut self, context: ContextHandle) -> Result<TpmHandle, TssRc> {
        let ctx = self.context_mut(context)?;
        if ctx.transport.is_none() {
            return Err(TssRc::esapi(TssBase::BadSequence));
        }
        let tpm = TpmHandle(context.0);
        ctx.tpm = Some(tpm);
        Ok(tpm)
    }

    fn pcr_read(&mut self, tpm: TpmHandle, index: u32) -> Result<Vec<u8>, TssRc> {
        let select = pcr_select(index).ok_or(TssRc::esapi(TssBase::BadValue))?;
        let mut pcr_selection_in = TpmlPcrSelection::new();
        pcr_selection_in
            .try_push(TpmsPcrSelection {
                hash: TpmAlgId::Sha1,
                pcr_select: TpmBuffer::try_from(select.as_slice()).map_err(bad_value)?,
            })
            .map_err(bad_value)?;

        let resp = self.execute(tpm, &TpmPcrReadCommand { pcr_selection_in }, None, &[])?;
        let resp = resp.PcrRead().map_err(|e| {
            warn!("TPM2_PCR_Read: unexpected response {e:?}");
            TssRc::esapi(TssBase::MalformedResponse)
        })?;
        // An unimplemented PCR is silently dropped from the selection.
        resp.pcr_values
            .iter()
            .next()
            .map(|value| value.to_vec())
            .ok_or(TssRc::esapi(TssBase::BadValue))
    }

    fn pcr_extend(&mut self, tpm: TpmHandle, index: u32, digest: &[u8]) -> Result<Vec<u8>, TssRc> {
        if digest.len() != SHA1_DIGEST_SIZE {
            return Err(TssRc::esapi(TssBase::BadSize));
        }
        let mut digests = TpmlDigestValues::new();
        digests
            .try_push(TpmtHa {
                hash_alg: TpmAlgId::Sha1,
                digest: TpmuHa::Sha1(
                    digest
                        .try_into()
                        .map_err(|_| TssRc::esapi(TssBase::BadSize))?,
                ),
            })
            .map_err(bad_value)?;

        let resp = self.execute(
            tpm,
            &TpmPcrExtendCommand { digests },
            Some(&[index]),
            &password_session(),
        )?;
        resp.PcrExtend().map_err(|e| {
            warn!("TPM2_PCR_Extend: unexpected response {e:?}");
            TssRc::esapi(TssBase::MalformedResponse)
        })?;
        self.pcr_read(tpm, index)
    }

    fn free_memory(&mut self, context: ContextHandle) -> Result<(), TssRc> {
        let ctx = self.context_mut(context)?;
        debug!("context {}: freeing {} buffers", context.0, ctx.memory.len());
        ctx.memory.clear();
        Ok(())
    }

    fn close_context(&mut self, context: ContextHandle) -> Result<(), TssRc> {
        self.contexts
            .remove(&context)
            .ok_or(TssRc::esapi(TssBase::BadContext))?;
        debug!("context {} closed", context.0);
        Ok(())
    }
}
