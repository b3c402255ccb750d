// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

use crate::{device::DEFAULT_DEVICE, CliError};
use lexopt::{Arg, ValueExt};
use log::warn;
use std::{
    ffi::OsString,
    fmt::Write as _,
    io::{self, Write},
    path::PathBuf,
};

pub type CommandLineOption<'a> = (Option<&'a str>, &'a str, &'a str, &'a str);

pub const DUMP_USAGE: &str = "pcr-dump [OPTIONS] --pcr <0-PCR_MAX>";
pub const EXTEND_USAGE: &str = "pcr-extend [OPTIONS] --pcr <0-PCR_MAX>";

const DUMP_ABOUT: &str = "Arguments for the PCR dump utility.";
const EXTEND_ABOUT: &str = "Arguments for the PCR extend utility.";

const DUMP_OPTIONS: &[CommandLineOption] = &[
    (Some("-d"), "--device", "<DEVICE>", "TPM device [default: /dev/tpmrm0]"),
    (Some("-p"), "--pcr", "<0-PCR_MAX>", "The PCR to dump."),
    (Some("-v"), "--verbose", "", "verbose"),
    (Some("-h"), "--help", "", "Print help information"),
    (Some("-V"), "--version", "", "Print version information"),
];

const EXTEND_OPTIONS: &[CommandLineOption] = &[
    (Some("-d"), "--device", "<DEVICE>", "TPM device [default: /dev/tpmrm0]"),
    (
        Some("-f"),
        "--file",
        "<FILE>",
        "File containing data to extend into the PCR. [default: stdin]",
    ),
    (Some("-p"), "--pcr", "<0-PCR_MAX>", "The PCR to extend."),
    (Some("-v"), "--verbose", "", "verbose"),
    (Some("-h"), "--help", "", "Print help information"),
    (Some("-V"), "--version", "", "Print version information"),
];

fn format_options<'a>((short, long, val, desc): &CommandLineOption<'a>) -> (String, &'a str) {
    let mut left = if let Some(s) = short {
        format!("{s}, ")
    } else {
        "    ".to_string()
    };
    left.push_str(long);
    if !val.is_empty() {
        left.push(' ');
        left.push_str(val);
    }
    (left, desc)
}

#[must_use]
pub fn format_help(name: &str, about: &str, usage: &str, options: &[CommandLineOption]) -> String {
    let mut output = format!("{name}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n");
    let items: Vec<(String, &str)> = options.iter().map(format_options).collect();
    let max_len = items.iter().map(|(left, _)| left.len()).max().unwrap_or(0);
    for (left, right) in items {
        let _ = writeln!(output, "    {left:<max_len$}  {right}");
    }
    output
}

/// Parses the value of `-p`. A missing or unparseable value leaves the PCR
/// unset.
fn parse_pcr(parser: &mut lexopt::Parser) -> Option<u32> {
    let value = match parser.value().and_then(|value| value.string()) {
        Ok(value) => value,
        Err(e) => {
            warn!("--pcr: {e}");
            return None;
        }
    };
    match value.parse::<u32>() {
        Ok(index) => Some(index),
        Err(e) => {
            warn!("--pcr: invalid PCR index '{value}': {e}");
            None
        }
    }
}

fn dump_pcr<W: Write>(writer: &mut W, pcr: Option<u32>, verbose: bool) -> io::Result<()> {
    match pcr {
        Some(index) => writeln!(writer, "  pcr:  {index}")?,
        None => writeln!(writer, "  pcr:  (none)")?,
    }
    writeln!(writer, "  pcr_set: {}", pcr.is_some())?;
    writeln!(writer, "  verbose: {verbose}")
}

/// Arguments of `pcr-dump`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpArgs {
    pub device: PathBuf,
    pub pcr: Option<u32>,
    pub verbose: bool,
}

impl Default for DumpArgs {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            pcr: None,
            verbose: false,
        }
    }
}

impl DumpArgs {
    #[must_use]
    pub fn help() -> String {
        format_help("pcr-dump", DUMP_ABOUT, DUMP_USAGE, DUMP_OPTIONS)
    }

    /// Parses the arguments of `pcr-dump`.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Usage` for an invalid command line, and
    /// `CliError::Help` or `CliError::Version` when those were requested.
    pub fn parse(parser: &mut lexopt::Parser) -> Result<Self, CliError> {
        let mut args = Self::default();
        while let Some(arg) = parser.next()? {
            match arg {
                Arg::Short('h') | Arg::Long("help") => return Err(CliError::Help),
                Arg::Short('V') | Arg::Long("version") => return Err(CliError::Version),
                Arg::Short('d') | Arg::Long("device") => {
                    args.device = PathBuf::from(parser.value()?);
                }
                Arg::Short('p') | Arg::Long("pcr") => args.pcr = parse_pcr(parser).or(args.pcr),
                Arg::Short('v') | Arg::Long("verbose") => args.verbose = true,
                _ => return Err(arg.unexpected().into()),
            }
        }
        Ok(args)
    }

    /// Parses an argument list that does not include the program name.
    ///
    /// # Errors
    ///
    /// See [`DumpArgs::parse`].
    pub fn parse_from<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        Self::parse(&mut lexopt::Parser::from_args(args))
    }

    #[must_use]
    pub fn pcr_set(&self) -> bool {
        self.pcr.is_some()
    }

    /// Writes the parsed options.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if writing fails.
    pub fn dump<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "User provided options:")?;
        dump_pcr(writer, self.pcr, self.verbose)
    }
}

/// Arguments of `pcr-extend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendArgs {
    pub device: PathBuf,
    pub file: Option<PathBuf>,
    pub pcr: Option<u32>,
    pub verbose: bool,
}

impl Default for ExtendArgs {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            file: None,
            pcr: None,
            verbose: false,
        }
    }
}

impl ExtendArgs {
    #[must_use]
    pub fn help() -> String {
        format_help("pcr-extend", EXTEND_ABOUT, EXTEND_USAGE, EXTEND_OPTIONS)
    }

    /// Parses the arguments of `pcr-extend`.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Usage` for an invalid command line, and
    /// `CliError::Help` or `CliError::Version` when those were requested.
    pub fn parse(parser: &mut lexopt::Parser) -> Result<Self, CliError> {
        let mut args = Self::default();
        while let Some(arg) = parser.next()? {
            match arg {
                Arg::Short('h') | Arg::Long("help") => return Err(CliError::Help),
                Arg::Short('V') | Arg::Long("version") => return Err(CliError::Version),
                Arg::Short('d') | Arg::Long("device") => {
                    args.device = PathBuf::from(parser.value()?);
                }
                Arg::Short('f') | Arg::Long("file") => {
                    args.file = Some(PathBuf::from(parser.value()?));
                }
                Arg::Short('p') | Arg::Long("pcr") => args.pcr = parse_pcr(parser).or(args.pcr),
                Arg::Short('v') | Arg::Long("verbose") => args.verbose = true,
                _ => return Err(arg.unexpected().into()),
            }
        }
        Ok(args)
    }

    /// Parses an argument list that does not include the program name.
    ///
    /// # Errors
    ///
    /// See [`ExtendArgs::parse`].
    pub fn parse_from<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        Self::parse(&mut lexopt::Parser::from_args(args))
    }

    #[must_use]
    pub fn pcr_set(&self) -> bool {
        self.pcr.is_some()
    }

    /// Writes the parsed options.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if writing fails.
    pub fn dump<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "User provided options:")?;
        match &self.file {
            Some(path) => writeln!(writer, "  file: {}", path.display())?,
            None => writeln!(writer, "  file: (stdin)")?,
        }
        dump_pcr(writer, self.pcr, self.verbose)
    }
}
