// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

use crate::session::SessionError;
use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("'{0}': {1}")]
    File(String, #[source] IoError),

    /// Help was requested and has been printed.
    #[error("help requested")]
    Help,

    #[error("I/O: {0}")]
    Io(#[from] IoError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Usage(String),

    /// Version was requested and has been printed.
    #[error("version requested")]
    Version,
}

impl From<lexopt::Error> for CliError {
    fn from(err: lexopt::Error) -> Self {
        CliError::Usage(err.to_string())
    }
}

impl CliError {
    /// Process exit status for the error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Help | Self::Version => 0,
            _ => 1,
        }
    }
}
