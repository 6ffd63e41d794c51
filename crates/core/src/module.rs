//! Named containers of functions and macros.
//!
//! A `Module` is a shared handle: registering it in a context and then
//! adding functions through another clone of the handle is the normal flow
//! during module compilation, so the maps live behind a `RefCell`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::Node;
use crate::boxed::HostType;
use crate::context::Context;
use crate::function::{Closure, Function};
use crate::raise::RaisedError;
use crate::value::Value;

/// A module entry: either a host function or a user-defined closure.
#[derive(Clone)]
pub enum Callable {
    Function(Function),
    Closure(Closure),
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Value {
        match callable {
            Callable::Function(f) => Value::Function(f),
            Callable::Closure(c) => Value::Closure(c),
        }
    }
}

/// A host macro: consumes the call-site argument nodes, produces the
/// replacement AST.
pub type MacroFn = Rc<dyn Fn(&mut Context, &[Node]) -> Result<Node, RaisedError>>;

#[derive(Default)]
struct ModuleImpl {
    functions: BTreeMap<String, Callable>,
    macros: BTreeMap<String, MacroFn>,
}

#[derive(Clone, Default)]
pub struct Module {
    inner: Rc<RefCell<ModuleImpl>>,
}

impl Module {
    pub fn new() -> Module {
        Module::default()
    }

    pub fn add_function(
        &self,
        name: &str,
        func: impl Fn(&mut Context, &Value) -> Result<Value, RaisedError> + 'static,
    ) {
        self.inner
            .borrow_mut()
            .functions
            .insert(name.to_owned(), Callable::Function(Function::new(func)));
    }

    pub fn add_closure_function(&self, name: &str, closure: Closure) {
        self.inner
            .borrow_mut()
            .functions
            .insert(name.to_owned(), Callable::Closure(closure));
    }

    pub fn add_macro(
        &self,
        name: &str,
        func: impl Fn(&mut Context, &[Node]) -> Result<Node, RaisedError> + 'static,
    ) {
        self.inner
            .borrow_mut()
            .macros
            .insert(name.to_owned(), Rc::new(func));
    }

    pub fn get_function(&self, name: &str) -> Option<Callable> {
        self.inner.borrow().functions.get(name).cloned()
    }

    pub fn get_macro(&self, name: &str) -> Option<MacroFn> {
        self.inner.borrow().macros.get(name).cloned()
    }

    pub fn function_names(&self) -> Vec<String> {
        self.inner.borrow().functions.keys().cloned().collect()
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Module) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<module>")
    }
}

impl HostType for Module {
    fn type_name() -> &'static str {
        "Module"
    }
}
