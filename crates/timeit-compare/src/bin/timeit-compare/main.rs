//! Command-line interface comparing execution times of shell commands.

use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;

mod cli;

fn main() -> ExitCode {
    Cli::parse().run()
}
