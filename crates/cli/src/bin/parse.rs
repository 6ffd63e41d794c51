//! `lix-parse` — parse source and print the canonical AST form.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(name = "lix-parse")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parse lix source and print the AST", long_about = None)]
struct Cli {
    /// Input source file (defaults to stdin)
    file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    lix_cli::drive(cli.file, lix_cli::run_parse)
}
