//! The bootstrap (`__lix`) and `Kernel` modules.
//!
//! `defmodule`/`def` are macros that expand into calls to the `__lix`
//! plumbing: `compile_module` enters a fresh compilation environment and
//! runs the module body, `def_module_function` appends clauses to the
//! function accumulator stored there, and finalisation turns the
//! accumulator into one closure per function name, registered on the new
//! module.

use std::collections::BTreeMap;

use tracing::debug;

use lix_compiler::{compile, escape, expand_macros};
use lix_core::ast::{Meta, Node, NodeKind, make_call, make_variable};
use lix_core::boxed::{Boxed, HostType, box_cast};
use lix_core::context::Context;
use lix_core::module::Module;
use lix_core::raise::RaisedError;
use lix_core::symbol::Symbol;
use lix_core::tuple::Tuple;
use lix_core::value::Value;

use crate::args::{ArgumentParser, MacroArgs};
use crate::exec::Executor;

/// One `def` clause: the argument pattern list and the (already expanded)
/// body.
#[derive(Clone)]
struct FunctionDef {
    arglist: Vec<Node>,
    body: Node,
}

/// Collects `def` clauses while a `defmodule` block executes.
#[derive(Clone)]
struct FunctionAccumulator {
    module_name: String,
    fns: BTreeMap<String, Vec<FunctionDef>>,
}

impl FunctionAccumulator {
    fn new(module_name: &str) -> FunctionAccumulator {
        FunctionAccumulator {
            module_name: module_name.to_owned(),
            fns: BTreeMap::new(),
        }
    }
}

impl HostType for FunctionAccumulator {
    fn type_name() -> &'static str {
        "FunctionAccumulator"
    }
}

// ----- __lix bootstrap functions --------------------------------------

fn bif_register_module(ctx: &mut Context, args: &Value) -> Result<Value, RaisedError> {
    let args = ArgumentParser::new(args)?;
    let name = args.nth_symbol(0)?;
    let module = Module::new();
    ctx.register_module(name.as_str(), module.clone())?;
    Ok(Value::Boxed(Boxed::new(module)))
}

fn bif_register_function(ctx: &mut Context, args: &Value) -> Result<Value, RaisedError> {
    let _ = ctx;
    let args = ArgumentParser::new(args)?;
    let module = box_cast::<Module>(args.nth_boxed(0)?)?;
    let name = args.nth_symbol(1)?;
    let closure = args.nth_closure(2)?;
    module.add_closure_function(name.as_str(), closure.clone());
    Ok(Value::symbol("ok"))
}

fn bif_get_env(ctx: &mut Context, args: &Value) -> Result<Value, RaisedError> {
    let args = ArgumentParser::new(args)?;
    let name = args.nth_symbol(0)?;
    Ok(ctx
        .get_environment_value(name.as_str())
        .unwrap_or_else(|| Value::symbol("nil")))
}

fn bif_compile_module(ctx: &mut Context, args: &Value) -> Result<Value, RaisedError> {
    let args = ArgumentParser::new(args)?;
    let mod_sym = args.nth_symbol(0)?;
    let body = Node::from_value(args.nth(1)?)?;
    let module = Module::new();
    debug!(module = mod_sym.as_str(), "compiling module");
    ctx.push_environment(|ctx| {
        ctx.set_environment_value(
            "compiling_module",
            Value::Boxed(Boxed::new(module.clone())),
        )?;
        ctx.set_environment_value("compiling_module_name", Value::string(mod_sym.as_str()))?;
        ctx.set_environment_value(
            "module_function_accumulator",
            Value::Boxed(Boxed::new(FunctionAccumulator::new(mod_sym.as_str()))),
        )?;
        // Run the module body: its `def` calls populate the accumulator.
        let expanded = expand_macros(ctx, &body).map_err(RaisedError::from)?;
        let code = compile(&expanded).map_err(RaisedError::from)?;
        Executor::new(code).execute_all(ctx)?;
        let accumulated = {
            let acc_value = ctx
                .get_environment_value("module_function_accumulator")
                .ok_or_else(|| RaisedError::msg("module accumulator disappeared"))?;
            let acc_boxed = acc_value
                .as_boxed()
                .cloned()
                .ok_or_else(|| RaisedError::msg("module accumulator is not boxed"))?;
            let acc = box_cast::<FunctionAccumulator>(&acc_boxed)?;
            acc.clone()
        };
        ctx.register_module(mod_sym.as_str(), module.clone())?;
        finalize_module(ctx, &accumulated)
    })
}

fn bif_def_module_function(ctx: &mut Context, args: &Value) -> Result<Value, RaisedError> {
    let args = ArgumentParser::new(args)?;
    if ctx.get_environment_value("compiling_module").is_none() {
        return Err(RaisedError::msg(
            "`def` macro must appear within a `defmodule` block",
        ));
    }
    let sig = Node::from_value(args.nth(0)?)?;
    let body = Node::from_value(args.nth(1)?)?;
    let (name, arglist) = extract_call_sig(&sig)?;
    // Expand the body now, in the compilation environment.
    let expanded = expand_macros(ctx, &body).map_err(RaisedError::from)?;
    let acc_value = ctx
        .get_environment_value("module_function_accumulator")
        .ok_or_else(|| RaisedError::msg("`def` outside of module compilation"))?;
    let acc_boxed = acc_value
        .as_boxed()
        .ok_or_else(|| RaisedError::msg("module accumulator is not boxed"))?;
    let mut acc = lix_core::boxed::mut_box_cast::<FunctionAccumulator>(acc_boxed)?;
    acc.fns.entry(name).or_default().push(FunctionDef {
        arglist,
        body: expanded,
    });
    Ok(Value::symbol("ok"))
}

/// `g(v)` → `("g", [v])`; a bare `g` (variable-shaped) has no arguments.
fn extract_call_sig(sig: &Node) -> Result<(String, Vec<Node>), RaisedError> {
    let call = sig
        .as_call()
        .ok_or_else(|| RaisedError::msg("Invalid signature to `def`"))?;
    let name = call.target().as_symbol().ok_or_else(|| {
        RaisedError::msg("`def` call signature must be named by an unqualified identifier")
    })?;
    if let Some(arglist) = call.args().as_list() {
        return Ok((name.as_str().to_owned(), arglist.to_vec()));
    }
    if call.args().as_symbol().is_some_and(|s| s.as_str() == "Var") {
        return Ok((name.as_str().to_owned(), Vec::new()));
    }
    Err(RaisedError::msg("Invalid argument list to `def`"))
}

/// Emit and run the finalisation pass: one `fn` (with one clause per
/// `def`) per function name, registered on the module via `__lix`.
fn finalize_module(ctx: &mut Context, acc: &FunctionAccumulator) -> Result<Value, RaisedError> {
    let mut block = vec![lix_core::ast::make_assignment(
        "__module",
        make_call("__lix", "get_env", vec![Node::symbol_name("compiling_module")]),
    )];
    for (name, defs) in &acc.fns {
        let mut clauses = Vec::with_capacity(defs.len());
        for def in defs {
            let clause = Node::call(
                Node::symbol_name("->"),
                Meta::default(),
                Node::list(vec![
                    Node::list(def.arglist.clone()),
                    def.body.clone(),
                ]),
            );
            clauses.push(qualify_local_calls(&clause, acc));
        }
        let mut fn_meta = Meta::default();
        fn_meta.set_fn_details(Symbol::intern(&acc.module_name), Symbol::intern(name));
        let anon_fn = Node::call(Node::symbol_name("fn"), fn_meta, Node::list(clauses));
        block.push(make_call(
            "__lix",
            "register_function",
            vec![make_variable("__module"), Node::symbol_name(name), anon_fn],
        ));
    }
    let block_ast = Node::call(
        Node::symbol_name("__block__"),
        Meta::default(),
        Node::list(block),
    );
    let code = compile(&block_ast).map_err(RaisedError::from)?;
    Executor::new(code).execute_all(ctx)
}

/// Rewrite unqualified calls to sibling functions into qualified
/// `Module.fn` calls, so definitions can reference each other (and
/// themselves) regardless of definition order.
fn qualify_local_calls(node: &Node, acc: &FunctionAccumulator) -> Node {
    match node.kind() {
        NodeKind::Integer(_)
        | NodeKind::Real(_)
        | NodeKind::Symbol(_)
        | NodeKind::String(_) => node.clone(),
        NodeKind::List(nodes) => {
            Node::list(nodes.iter().map(|n| qualify_local_calls(n, acc)).collect())
        }
        NodeKind::Tuple(nodes) => {
            Node::tuple(nodes.iter().map(|n| qualify_local_calls(n, acc)).collect())
        }
        NodeKind::Call(call) => {
            let args = qualify_local_calls(call.args(), acc);
            if let Some(target_sym) = call.target().as_symbol() {
                let is_call = args.as_symbol().is_none();
                if is_call && acc.fns.contains_key(target_sym.as_str()) {
                    let qualified = Node::call(
                        Node::symbol_name("."),
                        Meta::default(),
                        Node::list(vec![
                            Node::symbol_name(&acc.module_name),
                            call.target().clone(),
                        ]),
                    );
                    return Node::call(qualified, call.meta().clone(), args);
                }
            }
            let target = qualify_local_calls(call.target(), acc);
            Node::call(target, call.meta().clone(), args)
        }
    }
}

// ----- Kernel macros ---------------------------------------------------

fn defmodule_macro(ctx: &mut Context, args: &[Node]) -> Result<Node, RaisedError> {
    let _ = ctx;
    let args = MacroArgs::new(args);
    if args.count() != 2 {
        return Err(RaisedError::msg("`defmodule` expects two arguments"));
    }
    let modname = args
        .nth_symbol(0)
        .map_err(|_| RaisedError::msg("First argument to `defmodule` must be a symbol"))?;
    let block = args
        .keyword("do")
        .ok_or_else(|| RaisedError::msg("Expected 'do' block for `defmodule` call"))?;
    let module_ast = escape(block);
    Ok(make_call(
        "__lix",
        "compile_module",
        vec![Node::symbol(modname), module_ast],
    ))
}

fn def_macro(ctx: &mut Context, args: &[Node]) -> Result<Node, RaisedError> {
    let _ = ctx;
    let args = MacroArgs::new(args);
    if args.count() != 2 {
        return Err(RaisedError::msg("Invalid arguments to `def`"));
    }
    let call_head = escape(args.nth(0)?);
    let do_block = args
        .keyword("do")
        .ok_or_else(|| RaisedError::msg("`def` expects a 'do' block"))?;
    let body = escape(do_block);
    Ok(make_call(
        "__lix",
        "def_module_function",
        vec![call_head, body],
    ))
}

/// `if cond, do: a, else: b` — sugar over a `:true` case with a wildcard
/// fallback. The pieces are expanded here since macro output is final.
fn if_macro(ctx: &mut Context, args: &[Node]) -> Result<Node, RaisedError> {
    let margs = MacroArgs::new(args);
    if margs.count() != 2 {
        return Err(RaisedError::msg("Invalid arguments to `if`"));
    }
    let condition = expand_macros(ctx, margs.nth(0)?).map_err(RaisedError::from)?;
    let then_block = margs
        .keyword("do")
        .ok_or_else(|| RaisedError::msg("`if` expects a 'do' block"))?;
    let then_block = expand_macros(ctx, then_block).map_err(RaisedError::from)?;
    let else_block = match margs.keyword("else") {
        Some(node) => expand_macros(ctx, node).map_err(RaisedError::from)?,
        None => Node::symbol_name("nil"),
    };
    let clause = |pattern: Node, body: Node| {
        Node::call(
            Node::symbol_name("->"),
            Meta::default(),
            Node::list(vec![Node::list(vec![pattern]), body]),
        )
    };
    let clauses = Node::list(vec![
        clause(Node::symbol_name("true"), then_block),
        clause(make_variable("_"), else_block),
    ]);
    let kwargs = Node::list(vec![Node::tuple(vec![Node::symbol_name("do"), clauses])]);
    Ok(Node::call(
        Node::symbol_name("case"),
        Meta::default(),
        Node::list(vec![condition, kwargs]),
    ))
}

// ----- Kernel functions ------------------------------------------------

fn kernel_reverse_list(_ctx: &mut Context, args: &Value) -> Result<Value, RaisedError> {
    let args = ArgumentParser::new(args)?;
    let list = args.nth_list(0)?;
    let mut values: Vec<Value> = list.iter().cloned().collect();
    values.reverse();
    Ok(Value::List(values.into_iter().collect()))
}

fn kernel_map_put(_ctx: &mut Context, args: &Value) -> Result<Value, RaisedError> {
    let args = ArgumentParser::new(args)?;
    let map = args.nth_map(0)?;
    let key = args.nth(1)?;
    let value = args.nth(2)?;
    Ok(Value::Map(map.insert_or_update(key, value)?))
}

fn kernel_map_fetch(_ctx: &mut Context, args: &Value) -> Result<Value, RaisedError> {
    let args = ArgumentParser::new(args)?;
    let map = args.nth_map(0)?;
    let key = args.nth(1)?;
    match map.find(key)? {
        Some(found) => Ok(Value::Tuple(Tuple::new(vec![
            Value::symbol("ok"),
            found.clone(),
        ]))),
        None => Ok(Value::symbol("error")),
    }
}

fn kernel_map_pop(_ctx: &mut Context, args: &Value) -> Result<Value, RaisedError> {
    let args = ArgumentParser::new(args)?;
    let map = args.nth_map(0)?;
    let key = args.nth(1)?;
    let default = args.nth(2)?;
    match map.pop(key)? {
        Some((removed, rest)) => Ok(Value::Tuple(Tuple::new(vec![
            removed,
            Value::Map(rest),
        ]))),
        None => Ok(Value::Tuple(Tuple::new(vec![
            default.clone(),
            Value::Map(map.clone()),
        ]))),
    }
}

// ----- context assembly ------------------------------------------------

fn build_bootstrap_module() -> Module {
    let module = Module::new();
    module.add_function("register_module", bif_register_module);
    module.add_function("register_function", bif_register_function);
    module.add_function("compile_module", bif_compile_module);
    module.add_function("def_module_function", bif_def_module_function);
    module.add_function("get_env", bif_get_env);
    module
}

fn build_kernel_module() -> Module {
    let module = Module::new();
    module.add_macro("defmodule", defmodule_macro);
    module.add_macro("def", def_macro);
    module.add_macro("if", if_macro);
    module.add_function("__reverse_list", kernel_reverse_list);
    module.add_function("__map_put", kernel_map_put);
    module.add_function("__map_fetch", kernel_map_fetch);
    module.add_function("__map_pop", kernel_map_pop);
    module
}

/// A context holding only the `__lix` plumbing module.
pub fn build_bootstrap_context() -> Context {
    let mut ctx = Context::new();
    ctx.register_module("__lix", build_bootstrap_module())
        .unwrap_or_else(|_| unreachable!("fresh context cannot have __lix"));
    ctx
}

/// Bootstrap plus the `Kernel` module — the baseline for user code.
pub fn build_kernel_context() -> Context {
    let mut ctx = build_bootstrap_context();
    ctx.register_module("Kernel", build_kernel_module())
        .unwrap_or_else(|_| unreachable!("fresh context cannot have Kernel"));
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_context_has_bootstrap_and_kernel() {
        let ctx = build_kernel_context();
        assert!(ctx.get_module("__lix").is_some());
        let kernel = ctx.get_module("Kernel").unwrap();
        assert!(kernel.get_macro("defmodule").is_some());
        assert!(kernel.get_macro("def").is_some());
        assert!(kernel.get_function("__reverse_list").is_some());
    }

    #[test]
    fn reverse_list_reverses() {
        let mut ctx = build_kernel_context();
        let list: Value = Value::List(
            [Value::Integer(1), Value::Integer(2), Value::Integer(3)]
                .into_iter()
                .collect(),
        );
        let packed = Value::Tuple(Tuple::new(vec![list]));
        let result = kernel_reverse_list(&mut ctx, &packed).unwrap();
        let reversed = result.as_list().unwrap();
        assert_eq!(reversed.head(), Some(&Value::Integer(3)));
    }

    #[test]
    fn map_helpers_round_trip() {
        let mut ctx = build_kernel_context();
        let map = Value::Map(lix_core::map::Map::new());
        let put_args = Value::Tuple(Tuple::new(vec![
            map,
            Value::symbol("k"),
            Value::Integer(7),
        ]));
        let map = kernel_map_put(&mut ctx, &put_args).unwrap();
        let fetch_args = Value::Tuple(Tuple::new(vec![map.clone(), Value::symbol("k")]));
        let fetched = kernel_map_fetch(&mut ctx, &fetch_args).unwrap();
        let tuple = fetched.as_tuple().unwrap();
        assert_eq!(tuple.get(0), Some(&Value::symbol("ok")));
        assert_eq!(tuple.get(1), Some(&Value::Integer(7)));

        let pop_args = Value::Tuple(Tuple::new(vec![
            map,
            Value::symbol("k"),
            Value::symbol("missing"),
        ]));
        let popped = kernel_map_pop(&mut ctx, &pop_args).unwrap();
        let tuple = popped.as_tuple().unwrap();
        assert_eq!(tuple.get(0), Some(&Value::Integer(7)));
    }
}
