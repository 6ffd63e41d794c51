//! Shared plumbing for the three driver binaries.
//!
//! Each driver reads source from a file argument or stdin and reports
//! through the same exit contract: 0 on success, 1 on a language error
//! (message to stderr), 2 when the input file cannot be opened.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use lix_compiler::{compile, expand_macros, parse};
use lix_runtime::{build_kernel_context, create_context, eval_in};

pub const EXIT_OK: u8 = 0;
pub const EXIT_LANGUAGE_ERROR: u8 = 1;
pub const EXIT_FILE_ERROR: u8 = 2;

/// Install the tracing subscriber the drivers share; filtering comes from
/// the environment (`RUST_LOG`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

/// Read the whole source: from `path` when given, stdin otherwise.
pub fn read_source(path: Option<&Path>) -> Result<String, u8> {
    match path {
        Some(path) => fs::read_to_string(path).map_err(|err| {
            eprintln!("Failed to open file: {}: {err}", path.display());
            EXIT_FILE_ERROR
        }),
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source).map_err(|err| {
                eprintln!("Failed to read stdin: {err}");
                EXIT_FILE_ERROR
            })?;
            Ok(source)
        }
    }
}

fn language_error(err: impl std::fmt::Display) -> u8 {
    eprintln!("FAIL:\n{err}");
    EXIT_LANGUAGE_ERROR
}

/// `parse`: canonical AST text.
pub fn run_parse(source: &str, out: &mut dyn Write) -> u8 {
    match parse(source) {
        Ok(node) => {
            let _ = writeln!(out, "{node}");
            EXIT_OK
        }
        Err(err) => language_error(err),
    }
}

/// `compile`: parse, expand against a kernel context, disassemble.
pub fn run_compile(source: &str, out: &mut dyn Write) -> u8 {
    let mut ctx = build_kernel_context();
    let result = parse(source)
        .map_err(lix_runtime::Error::from)
        .and_then(|node| expand_macros(&mut ctx, &node).map_err(lix_runtime::Error::from))
        .and_then(|expanded| compile(&expanded).map_err(lix_runtime::Error::from));
    match result {
        Ok(code) => {
            let _ = write!(out, "{code}");
            EXIT_OK
        }
        Err(err) => language_error(err),
    }
}

/// `eval`: the full pipeline in a library-loaded context.
pub fn run_eval(source: &str, out: &mut dyn Write) -> u8 {
    let mut ctx = create_context();
    match eval_in(source, &mut ctx) {
        Ok(value) => {
            let _ = writeln!(out, "{value}");
            EXIT_OK
        }
        Err(err) => language_error(err),
    }
}

/// Shared driver entry: resolve input, run, report.
pub fn drive(file: Option<PathBuf>, run: fn(&str, &mut dyn Write) -> u8) -> ExitCode {
    init_tracing();
    let source = match read_source(file.as_deref()) {
        Ok(source) => source,
        Err(code) => return ExitCode::from(code),
    };
    let mut stdout = std::io::stdout();
    ExitCode::from(run(&source, &mut stdout))
}
