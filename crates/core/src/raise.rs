//! Runtime exceptions: a raised `Value` plus a best-effort traceback.

use std::fmt;

use crate::value::Value;

/// A value raised out of the interpreter, carried to the host caller.
#[derive(Debug, Clone)]
pub struct RaisedError {
    value: Value,
    traceback: Vec<String>,
}

impl RaisedError {
    pub fn new(value: Value) -> RaisedError {
        RaisedError {
            value,
            traceback: Vec::new(),
        }
    }

    /// Raise a plain message as a string value.
    pub fn msg(message: impl Into<String>) -> RaisedError {
        RaisedError::new(Value::string(message.into()))
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn traceback(&self) -> &[String] {
        &self.traceback
    }

    /// Record the frame descriptors at the point of the raise. Only the
    /// first (innermost) recording sticks; re-raises keep their origin.
    pub fn fill_traceback(&mut self, frames: Vec<String>) {
        if self.traceback.is_empty() {
            self.traceback = frames;
        }
    }
}

impl fmt::Display for RaisedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "raised value: {}", crate::value::inspect(&self.value))?;
        for frame in &self.traceback {
            write!(f, "\n  in {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RaisedError {}

impl From<crate::map::MapError> for RaisedError {
    fn from(err: crate::map::MapError) -> RaisedError {
        RaisedError::msg(err.to_string())
    }
}

impl From<crate::boxed::BadBoxCast> for RaisedError {
    fn from(err: crate::boxed::BadBoxCast) -> RaisedError {
        RaisedError::msg(err.to_string())
    }
}
