// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

#![deny(clippy::all)]
#![deny(clippy::pedantic)]

pub mod arguments;
pub mod device;
pub mod digest;
pub mod error;
pub mod mocktpm;
pub mod pcr;
pub mod print;
pub mod rc;
pub mod session;
pub mod stack;
pub mod transport;

pub use crate::error::CliError;

use crate::{
    arguments::{DumpArgs, ExtendArgs},
    device::DeviceStack,
    digest::sha1_stream,
    stack::TpmStack,
};
use std::{
    fs::File,
    io::{self, Write},
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn require_pcr(pcr: Option<u32>) -> Result<u32, CliError> {
    pcr.ok_or_else(|| CliError::Usage("No PCR provided.".to_string()))
}

/// Runs `pcr-dump` against a TPM stack.
///
/// # Errors
///
/// Returns `CliError::Usage` if no PCR was given, in which case the stack
/// is not touched, and the error of the PCR read otherwise.
pub fn run_dump<S: TpmStack, W: Write>(
    args: &DumpArgs,
    stack: &mut S,
    writer: &mut W,
) -> Result<(), CliError> {
    if args.verbose {
        args.dump(writer)?;
    }
    let index = require_pcr(args.pcr)?;
    pcr::dump(stack, index, writer)
}

/// Runs `pcr-extend` against a TPM stack. The data is read from the file
/// given in the arguments or from standard input.
///
/// # Errors
///
/// Returns `CliError::Usage` if no PCR was given and `CliError::File` if
/// the data cannot be read, in both cases without touching the stack, and
/// the error of the PCR extend otherwise.
pub fn run_extend<S: TpmStack, W: Write>(
    args: &ExtendArgs,
    stack: &mut S,
    writer: &mut W,
) -> Result<(), CliError> {
    if args.verbose {
        args.dump(writer)?;
    }
    let index = require_pcr(args.pcr)?;
    let digest = if let Some(path) = &args.file {
        let name = path.display().to_string();
        let mut file = File::open(path).map_err(|e| CliError::File(name.clone(), e))?;
        sha1_stream(&mut file).map_err(|e| CliError::File(name, e))?
    } else {
        sha1_stream(&mut io::stdin().lock()).map_err(|e| CliError::File("<stdin>".into(), e))?
    };
    pcr::extend(stack, index, &digest, writer)
}

/// Parses the command line of `pcr-dump` and runs it against the TPM
/// device.
///
/// # Errors
///
/// Returns a `CliError` if parsing or running fails. Help and version
/// requests are printed and returned as `CliError::Help` and
/// `CliError::Version`.
pub fn execute_dump() -> Result<(), CliError> {
    let args = match DumpArgs::parse(&mut lexopt::Parser::from_env()) {
        Ok(args) => args,
        Err(CliError::Help) => {
            println!("{}", DumpArgs::help());
            return Err(CliError::Help);
        }
        Err(CliError::Version) => {
            println!("pcr-dump {VERSION}");
            return Err(CliError::Version);
        }
        Err(err) => return Err(err),
    };
    let mut stack = DeviceStack::new(args.device.clone());
    run_dump(&args, &mut stack, &mut io::stdout().lock())
}

/// Parses the command line of `pcr-extend` and runs it against the TPM
/// device.
///
/// # Errors
///
/// Returns a `CliError` if parsing or running fails. Help and version
/// requests are printed and returned as `CliError::Help` and
/// `CliError::Version`.
pub fn execute_extend() -> Result<(), CliError> {
    let args = match ExtendArgs::parse(&mut lexopt::Parser::from_env()) {
        Ok(args) => args,
        Err(CliError::Help) => {
            println!("{}", ExtendArgs::help());
            return Err(CliError::Help);
        }
        Err(CliError::Version) => {
            println!("pcr-extend {VERSION}");
            return Err(CliError::Version);
        }
        Err(err) => return Err(err),
    };
    let mut stack = DeviceStack::new(args.device.clone());
    run_extend(&args, &mut stack, &mut io::stdout().lock())
}
