// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024-2025 Jarkko Sakkinen
// Copyright (c) 2025 Opinsys Oy

use log::error;
use pcr_tools::{arguments::EXTEND_USAGE, execute_extend, CliError};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    match execute_extend() {
        Ok(()) => {}
        Err(err @ (CliError::Help | CliError::Version)) => std::process::exit(err.exit_code()),
        Err(err @ CliError::Usage(_)) => {
            eprintln!("{err}\n\nUSAGE:\n    {EXTEND_USAGE}");
            std::process::exit(err.exit_code());
        }
        Err(err) => {
            error!("{err}");
            std::process::exit(err.exit_code());
        }
    }
}
