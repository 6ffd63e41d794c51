//! `lix-eval` — run a program and print its final value.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(name = "lix-eval")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate lix source and print the result", long_about = None)]
struct Cli {
    /// Input source file (defaults to stdin)
    file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    lix_cli::drive(cli.file, lix_cli::run_eval)
}
