// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

//! Response codes of the TPM and of the software stack in front of it.

use std::fmt;
use tpm2_protocol::data::TpmRc;

/// A layer of the software stack between the application and the TPM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TssLayer {
    Esapi,
    Tcti,
}

impl fmt::Display for TssLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Esapi => write!(f, "esapi"),
            Self::Tcti => write!(f, "tcti"),
        }
    }
}

/// A failure raised by the software stack itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TssBase {
    GeneralFailure,
    BadContext,
    BadReference,
    BadSequence,
    NoConnection,
    IoError,
    BadValue,
    BadSize,
    MalformedResponse,
}

impl fmt::Display for TssBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::GeneralFailure => "Catch all for all errors not otherwise specified",
            Self::BadContext => "A context structure is bad",
            Self::BadReference => "A pointer is NULL that isn't allowed to be NULL.",
            Self::BadSequence => "Function called in the wrong order",
            Self::NoConnection => "Fails to connect to next lower layer",
            Self::IoError => "IO failure",
            Self::BadValue => "A parameter has a bad value",
            Self::BadSize => "If size of a parameter is incorrect",
            Self::MalformedResponse => "Response is malformed",
        };
        f.write_str(text)
    }
}

/// The result code of a failed stack call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TssRc {
    /// The TPM rejected the command.
    Tpm(TpmRc),
    /// The stack failed before or after talking to the TPM.
    Stack(TssLayer, TssBase),
}

impl TssRc {
    #[must_use]
    pub const fn esapi(base: TssBase) -> Self {
        Self::Stack(TssLayer::Esapi, base)
    }

    #[must_use]
    pub const fn tcti(base: TssBase) -> Self {
        Self::Stack(TssLayer::Tcti, base)
    }
}

impl From<TpmRc> for TssRc {
    fn from(rc: TpmRc) -> Self {
        Self::Tpm(rc)
    }
}

impl fmt::Display for TssRc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tpm(rc) => write!(f, "{rc}"),
            Self::Stack(layer, base) => write!(f, "{layer}:{base}"),
        }
    }
}
