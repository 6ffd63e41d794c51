//! Compiler-side error types.
//!
//! `ParseError` renders the offending source line with a column caret;
//! `CompileError` carries the offending node's position when the AST has
//! one. Both convert into `RaisedError` so the kernel's compile-at-runtime
//! plumbing can propagate them with `?`.

use std::fmt;

use lix_core::RaisedError;
use lix_core::ast::Meta;

/// A syntax error: message, 1-based position, and the source line text.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub line_text: String,
}

impl ParseError {
    pub fn new(
        message: impl Into<String>,
        line: u32,
        column: u32,
        line_text: impl Into<String>,
    ) -> ParseError {
        ParseError {
            message: message.into(),
            line,
            column,
            line_text: line_text.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.line_text)?;
        writeln!(f, "{}^", " ".repeat(self.column.saturating_sub(1) as usize))?;
        write!(
            f,
            "syntax error: {} (line {}, column {})",
            self.message, self.line, self.column
        )
    }
}

impl std::error::Error for ParseError {}

/// A compilation failure, with the offending node's position when known.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub line: i32,
    pub column: i32,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> CompileError {
        CompileError {
            message: message.into(),
            line: -1,
            column: -1,
        }
    }

    pub fn at(message: impl Into<String>, meta: &Meta) -> CompileError {
        CompileError {
            message: message.into(),
            line: meta.line(),
            column: meta.column(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compile error: {}", self.message)?;
        if self.line >= 0 {
            write!(f, " (line {}, column {})", self.line, self.column)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

impl From<CompileError> for RaisedError {
    fn from(err: CompileError) -> RaisedError {
        RaisedError::msg(err.to_string())
    }
}

impl From<RaisedError> for CompileError {
    fn from(err: RaisedError) -> CompileError {
        CompileError::new(format!(
            "macro raised: {}",
            lix_core::inspect(err.value())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_renders_caret_under_column() {
        let err = ParseError::new("unexpected token", 2, 5, "a + + b");
        let text = err.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "a + + b");
        assert_eq!(lines[1], "    ^");
        assert!(lines[2].contains("line 2, column 5"));
    }

    #[test]
    fn compile_error_includes_position_when_known() {
        let plain = CompileError::new("unbound variable 'x'");
        assert_eq!(plain.to_string(), "compile error: unbound variable 'x'");
        let meta = Meta::at(4, 2);
        let placed = CompileError::at("unbound variable 'x'", &meta);
        assert!(placed.to_string().contains("line 4, column 2"));
    }
}
