//! Argument unpacking for native functions and macros.
//!
//! Native functions receive their arguments as one packed tuple value;
//! macros receive AST nodes. Both parsers produce the host-conversion
//! errors ("Not enough arguments to unpack", "Argument is not a X") as
//! raises.

use lix_core::ast::{Node, keyword_get};
use lix_core::boxed::Boxed;
use lix_core::function::Closure;
use lix_core::list::List;
use lix_core::map::Map;
use lix_core::raise::RaisedError;
use lix_core::symbol::Symbol;
use lix_core::tuple::Tuple;
use lix_core::value::Value;

/// A view over a native function's packed argument tuple.
pub struct ArgumentParser<'a> {
    args: &'a Tuple,
}

impl<'a> ArgumentParser<'a> {
    pub fn new(value: &'a Value) -> Result<ArgumentParser<'a>, RaisedError> {
        let args = value
            .as_tuple()
            .ok_or_else(|| RaisedError::msg("Cannot unpack tuple of arguments from non-tuple"))?;
        Ok(ArgumentParser { args })
    }

    pub fn count(&self) -> usize {
        self.args.len()
    }

    pub fn expect_count(&self, want: usize) -> Result<(), RaisedError> {
        if self.count() == want {
            Ok(())
        } else {
            Err(RaisedError::msg("Not enough arguments to unpack"))
        }
    }

    pub fn nth(&self, n: usize) -> Result<&'a Value, RaisedError> {
        self.args
            .get(n)
            .ok_or_else(|| RaisedError::msg("Not enough arguments to unpack"))
    }

    pub fn nth_integer(&self, n: usize) -> Result<i64, RaisedError> {
        self.nth(n)?
            .as_integer()
            .ok_or_else(|| RaisedError::msg("Argument is not an integer"))
    }

    pub fn nth_symbol(&self, n: usize) -> Result<Symbol, RaisedError> {
        self.nth(n)?
            .as_symbol()
            .ok_or_else(|| RaisedError::msg("Argument is not a symbol"))
    }

    pub fn nth_string(&self, n: usize) -> Result<&'a str, RaisedError> {
        self.nth(n)?
            .as_str()
            .ok_or_else(|| RaisedError::msg("Argument is not a string"))
    }

    pub fn nth_list(&self, n: usize) -> Result<&'a List, RaisedError> {
        self.nth(n)?
            .as_list()
            .ok_or_else(|| RaisedError::msg("Argument is not a list"))
    }

    pub fn nth_map(&self, n: usize) -> Result<&'a Map, RaisedError> {
        self.nth(n)?
            .as_map()
            .ok_or_else(|| RaisedError::msg("Argument is not a map"))
    }

    pub fn nth_closure(&self, n: usize) -> Result<&'a Closure, RaisedError> {
        self.nth(n)?
            .as_closure()
            .ok_or_else(|| RaisedError::msg("Argument is not a closure"))
    }

    pub fn nth_boxed(&self, n: usize) -> Result<&'a Boxed, RaisedError> {
        self.nth(n)?
            .as_boxed()
            .ok_or_else(|| RaisedError::msg("Argument is not boxed"))
    }
}

/// A view over a macro's call-site argument nodes.
pub struct MacroArgs<'a> {
    args: &'a [Node],
}

impl<'a> MacroArgs<'a> {
    pub fn new(args: &'a [Node]) -> MacroArgs<'a> {
        MacroArgs { args }
    }

    pub fn count(&self) -> usize {
        self.args.len()
    }

    pub fn nth(&self, n: usize) -> Result<&'a Node, RaisedError> {
        self.args
            .get(n)
            .ok_or_else(|| RaisedError::msg("Not enough macro arguments"))
    }

    pub fn nth_symbol(&self, n: usize) -> Result<Symbol, RaisedError> {
        self.nth(n)?
            .as_symbol()
            .ok_or_else(|| RaisedError::msg("Macro argument is not a symbol"))
    }

    /// A keyword argument from the trailing keyword list.
    pub fn keyword(&self, name: &str) -> Option<&'a Node> {
        keyword_get(self.args, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_extractors() {
        let packed = Value::Tuple(Tuple::new(vec![
            Value::symbol("a"),
            Value::Integer(2),
            Value::string("three"),
        ]));
        let args = ArgumentParser::new(&packed).unwrap();
        assert_eq!(args.count(), 3);
        assert_eq!(args.nth_symbol(0).unwrap().as_str(), "a");
        assert_eq!(args.nth_integer(1).unwrap(), 2);
        assert_eq!(args.nth_string(2).unwrap(), "three");
        assert!(args.nth_symbol(1).is_err());
        assert!(args.nth(3).is_err());
    }

    #[test]
    fn non_tuple_argument_pack_is_rejected() {
        assert!(ArgumentParser::new(&Value::Integer(1)).is_err());
    }
}
