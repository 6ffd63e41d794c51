//! `lix-compile` — parse, expand and compile source, printing the
//! disassembled bytecode.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(name = "lix-compile")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile lix source and print the bytecode", long_about = None)]
struct Cli {
    /// Input source file (defaults to stdin)
    file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    lix_cli::drive(cli.file, lix_cli::run_compile)
}
