//! The execution context: a registry of modules plus a stack of
//! compile-time environments.
//!
//! Environments are independent name → value maps used while a module is
//! being compiled: the `defmodule` machinery pushes one, stores the module
//! being defined and its function accumulator there, and the `def` plumbing
//! reads them back. Lookups search from the innermost environment outward.

use std::collections::BTreeMap;

use crate::module::Module;
use crate::raise::RaisedError;
use crate::value::Value;

#[derive(Default)]
pub struct Context {
    modules: BTreeMap<String, Module>,
    environments: Vec<BTreeMap<String, Value>>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    /// Register a module under a name. Registering the same name twice is
    /// an error.
    pub fn register_module(&mut self, name: &str, module: Module) -> Result<(), RaisedError> {
        if self.modules.contains_key(name) {
            return Err(RaisedError::msg(format!(
                "double-registered module: {name}"
            )));
        }
        self.modules.insert(name.to_owned(), module);
        Ok(())
    }

    /// Look up a module handle by name.
    pub fn get_module(&self, name: &str) -> Option<Module> {
        self.modules.get(name).cloned()
    }

    /// Set a value in the innermost environment.
    pub fn set_environment_value(&mut self, name: &str, value: Value) -> Result<(), RaisedError> {
        match self.environments.last_mut() {
            Some(env) => {
                env.insert(name.to_owned(), value);
                Ok(())
            }
            None => Err(RaisedError::msg("no environment")),
        }
    }

    /// Look a value up, innermost environment first.
    pub fn get_environment_value(&self, name: &str) -> Option<Value> {
        self.environments
            .iter()
            .rev()
            .find_map(|env| env.get(name).cloned())
    }

    /// Run `body` with a fresh innermost environment, popping it afterwards
    /// whether or not `body` succeeds.
    pub fn push_environment<R>(&mut self, body: impl FnOnce(&mut Context) -> R) -> R {
        self.environments.push(BTreeMap::new());
        let result = body(self);
        self.environments.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_registration_fails() {
        let mut ctx = Context::new();
        ctx.register_module("M", Module::new()).unwrap();
        assert!(ctx.register_module("M", Module::new()).is_err());
    }

    #[test]
    fn environment_lookup_is_innermost_first() {
        let mut ctx = Context::new();
        ctx.push_environment(|ctx| {
            ctx.set_environment_value("x", Value::Integer(1)).unwrap();
            ctx.push_environment(|ctx| {
                ctx.set_environment_value("x", Value::Integer(2)).unwrap();
                assert_eq!(ctx.get_environment_value("x"), Some(Value::Integer(2)));
            });
            assert_eq!(ctx.get_environment_value("x"), Some(Value::Integer(1)));
        });
        assert_eq!(ctx.get_environment_value("x"), None);
    }

    #[test]
    fn set_outside_environment_fails() {
        let mut ctx = Context::new();
        assert!(ctx.set_environment_value("x", Value::Integer(1)).is_err());
    }
}
