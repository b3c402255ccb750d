// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{self, Read, Write},
    path::Path,
};
use thiserror::Error;
use tpm2_protocol::TPM_MAX_COMMAND_SIZE;

const TPM_HEADER_SIZE: usize = 10;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O: {0}")]
    Io(#[from] io::Error),
    #[error("response overflow: {0} bytes")]
    ResponseOverflow(usize),
    #[error("response underflow: {0} bytes")]
    ResponseUnderflow(usize),
}

/// A trait for a transport layer capable of sending and receiving full TPM commands.
pub trait Transport: fmt::Debug {
    /// Sends a complete command buffer to the TPM.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` on I/O failure.
    fn send(&mut self, command_bytes: &[u8]) -> Result<(), TransportError>;

    /// Receives a complete response buffer from the TPM.
    ///
    /// The header is read first to learn the full frame size, and the rest
    /// of the frame is read after that.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` on I/O failure or if the response is malformed.
    fn receive(&mut self) -> Result<Vec<u8>, TransportError>;
}

/// Reads one response frame from a byte stream.
///
/// # Errors
///
/// Returns a `TransportError` on I/O failure or if the size field of the
/// header is out of bounds.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, TransportError> {
    let mut header = [0u8; TPM_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let size = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);
    let size = usize::try_from(size).unwrap_or(usize::MAX);
    if size < header.len() {
        return Err(TransportError::ResponseUnderflow(size));
    }
    if size > TPM_MAX_COMMAND_SIZE {
        return Err(TransportError::ResponseOverflow(size));
    }

    let mut resp_buf = header.to_vec();
    resp_buf.resize(size, 0);
    reader.read_exact(&mut resp_buf[header.len()..])?;
    Ok(resp_buf)
}

/// A transport implementation that wraps a `std::fs::File`.
#[derive(Debug)]
pub struct FileTransport(pub File);

impl FileTransport {
    /// Opens a TPM device node for reading and writing.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the path cannot be opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        log::debug!("opened {}", path.display());
        Ok(Self(file))
    }
}

impl Transport for FileTransport {
    fn send(&mut self, command_bytes: &[u8]) -> Result<(), TransportError> {
        self.0.write_all(command_bytes)?;
        self.0.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        read_frame(&mut self.0)
    }
}
