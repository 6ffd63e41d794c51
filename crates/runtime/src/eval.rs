//! The evaluation pipeline: parse → expand → compile → execute, plus
//! helpers for applying callables from host code.

use std::fmt;

use lix_compiler::{CompileError, ParseError, compile, expand_macros, parse};
use lix_core::ast::Node;
use lix_core::context::Context;
use lix_core::function::{Closure, Function};
use lix_core::module::Callable;
use lix_core::raise::RaisedError;
use lix_core::tuple::Tuple;
use lix_core::value::Value;

use crate::exec::Executor;
use crate::libs::create_context;

/// Everything an evaluation can fail with, unified for drivers.
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    Compile(CompileError),
    Raised(RaisedError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "{e}"),
            Error::Compile(e) => write!(f, "{e}"),
            Error::Raised(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Error {
        Error::Parse(e)
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Error {
        Error::Compile(e)
    }
}

impl From<RaisedError> for Error {
    fn from(e: RaisedError) -> Error {
        Error::Raised(e)
    }
}

/// Evaluate source text in a fresh library-loaded context.
pub fn eval(source: &str) -> Result<Value, Error> {
    let mut ctx = create_context();
    eval_in(source, &mut ctx)
}

/// Evaluate source text in an existing context.
pub fn eval_in(source: &str, ctx: &mut Context) -> Result<Value, Error> {
    let node = parse(source)?;
    eval_node(&node, ctx)
}

/// Evaluate an already-parsed AST in a context.
pub fn eval_node(node: &Node, ctx: &mut Context) -> Result<Value, Error> {
    let expanded = expand_macros(ctx, node)?;
    let code = compile(&expanded)?;
    Ok(Executor::new(code).execute_all(ctx)?)
}

/// Apply a native function to a packed argument tuple.
pub fn apply_function(
    ctx: &mut Context,
    func: &Function,
    args: Tuple,
) -> Result<Value, RaisedError> {
    func.call(ctx, &Value::Tuple(args))
}

/// Apply a closure to a packed argument tuple, running it to completion.
pub fn apply_closure(
    ctx: &mut Context,
    closure: &Closure,
    args: Tuple,
) -> Result<Value, RaisedError> {
    Executor::from_closure(closure, Value::Tuple(args)).execute_all(ctx)
}

/// Apply either kind of module entry.
pub fn apply(ctx: &mut Context, callable: &Callable, args: Tuple) -> Result<Value, RaisedError> {
    match callable {
        Callable::Function(f) => apply_function(ctx, f, args),
        Callable::Closure(c) => apply_closure(ctx, c, args),
    }
}

/// Look up `module.func` and apply it to `args`.
pub fn call_mfa(
    ctx: &mut Context,
    module: &str,
    func: &str,
    args: Tuple,
) -> Result<Value, RaisedError> {
    let module_handle = ctx
        .get_module(module)
        .ok_or_else(|| RaisedError::msg(format!("No such module {module}")))?;
    let callable = module_handle
        .get_function(func)
        .ok_or_else(|| RaisedError::msg(format!("No such function {module}.{func}")))?;
    apply(ctx, &callable, args)
}
