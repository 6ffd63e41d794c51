//! Callable values: host-implemented functions and user closures.

use std::fmt;
use std::rc::Rc;

use crate::code::Code;
use crate::context::Context;
use crate::raise::RaisedError;
use crate::value::Value;

type NativeFn = dyn Fn(&mut Context, &Value) -> Result<Value, RaisedError>;

/// An opaque host-implemented callable taking `(Context, Value) → Value`.
/// The argument is the packed tuple of actual arguments.
#[derive(Clone)]
pub struct Function {
    func: Rc<NativeFn>,
}

impl Function {
    pub fn new(
        func: impl Fn(&mut Context, &Value) -> Result<Value, RaisedError> + 'static,
    ) -> Function {
        Function {
            func: Rc::new(func),
        }
    }

    pub fn call(&self, ctx: &mut Context, arg: &Value) -> Result<Value, RaisedError> {
        (self.func)(ctx, arg)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native-function>")
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A user-defined function: code, entry offset, and the values captured
/// from the defining frame at construction time.
#[derive(Clone)]
pub struct Closure {
    code: Code,
    entry: usize,
    captures: Rc<Vec<Value>>,
}

impl Closure {
    pub fn new(code: Code, entry: usize, captures: Vec<Value>) -> Closure {
        Closure {
            code,
            entry,
            captures: Rc::new(captures),
        }
    }

    pub fn code(&self) -> &Code {
        &self.code
    }

    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn captures(&self) -> &[Value] {
        &self.captures
    }
}

impl PartialEq for Closure {
    fn eq(&self, other: &Closure) -> bool {
        self.code.same(&other.code)
            && self.entry == other.entry
            && Rc::ptr_eq(&self.captures, &other.captures)
    }
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<closure>")
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
