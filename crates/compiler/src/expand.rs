//! Macro expansion.
//!
//! Walks the AST resolving `import`/`alias` directives and user macros
//! registered on modules. Imports and aliases are lexically scoped to the
//! enclosing `__block__`. A macro's output replaces the call site verbatim;
//! expansion does not recurse into the replacement — producing final code
//! is the macro's responsibility.

use tracing::debug;

use lix_core::Context;
use lix_core::ast::{Meta, Node, NodeKind, keyword_get};
use lix_core::symbol::Symbol;
use lix_core::value::Value;

use crate::error::CompileError;

/// Expand all macros in `node` against the modules registered in `ctx`.
pub fn expand_macros(ctx: &mut Context, node: &Node) -> Result<Node, CompileError> {
    let mut expander = Expander {
        ctx,
        imported: vec!["Kernel".to_owned()],
        aliases: Vec::new(),
    };
    expander.expand(node)
}

struct Expander<'c> {
    ctx: &'c mut Context,
    imported: Vec<String>,
    aliases: Vec<(String, String)>,
}

impl Expander<'_> {
    fn expand(&mut self, node: &Node) -> Result<Node, CompileError> {
        match node.kind() {
            NodeKind::Integer(_) | NodeKind::Real(_) | NodeKind::String(_) => Ok(node.clone()),
            NodeKind::Symbol(sym) => Ok(self.expand_symbol(*sym)),
            NodeKind::List(nodes) => {
                let expanded = nodes
                    .iter()
                    .map(|n| self.expand(n))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::list(expanded))
            }
            NodeKind::Tuple(nodes) => {
                let expanded = nodes
                    .iter()
                    .map(|n| self.expand(n))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::tuple(expanded))
            }
            NodeKind::Call(call) => self.expand_call(node, call.target(), call.meta(), call.args()),
        }
    }

    /// Rewrite a symbol through the alias list: an alias matches when it
    /// equals the spelling or is a dotted prefix of it.
    fn expand_symbol(&self, sym: Symbol) -> Node {
        let spelling = sym.as_str();
        for (alias, expansion) in &self.aliases {
            if spelling == alias {
                return Node::symbol_name(expansion);
            }
            if let Some(rest) = spelling.strip_prefix(alias.as_str()) {
                if rest.starts_with('.') {
                    return Node::symbol_name(&format!("{expansion}{rest}"));
                }
            }
        }
        Node::symbol(sym)
    }

    fn expand_call(
        &mut self,
        whole: &Node,
        target: &Node,
        meta: &Meta,
        args: &Node,
    ) -> Result<Node, CompileError> {
        if let Some(target_sym) = target.as_symbol() {
            match target_sym.as_str() {
                "__block__" => {
                    // Imports and aliases are lexically scoped to the block.
                    let saved_imports = self.imported.clone();
                    let saved_aliases = self.aliases.clone();
                    let expanded_args = self.expand(args);
                    self.imported = saved_imports;
                    self.aliases = saved_aliases;
                    return Ok(Node::call(
                        target.clone(),
                        meta.clone(),
                        expanded_args?,
                    ));
                }
                "import" => {
                    let arg_list = args
                        .as_list()
                        .ok_or_else(|| CompileError::at("invalid arguments to import", meta))?;
                    for arg in arg_list {
                        let sym = arg.as_symbol().ok_or_else(|| {
                            CompileError::at("`import` expects symbol arguments", meta)
                        })?;
                        self.imported.push(sym.as_str().to_owned());
                    }
                    return Ok(Node::symbol_name("ok"));
                }
                "alias" => {
                    let arg_list = args
                        .as_list()
                        .ok_or_else(|| CompileError::at("invalid arguments to alias", meta))?;
                    let target_sym = arg_list
                        .first()
                        .and_then(Node::as_symbol)
                        .ok_or_else(|| {
                            CompileError::at("first argument to 'alias' must be a symbol", meta)
                        })?;
                    let full = target_sym.as_str();
                    let alias = match keyword_get(arg_list, "as") {
                        Some(as_node) => as_node
                            .as_symbol()
                            .ok_or_else(|| {
                                CompileError::at("'as' argument must be a symbol", meta)
                            })?
                            .as_str()
                            .to_owned(),
                        None => match full.rfind('.') {
                            Some(dot) => full[dot + 1..].to_owned(),
                            None => {
                                return Err(CompileError::at(
                                    format!("invalid alias '{full}'"),
                                    meta,
                                ));
                            }
                        },
                    };
                    self.aliases.push((alias, full.to_owned()));
                    return Ok(Node::symbol_name("ok"));
                }
                _ => {}
            }
            if let Some(arg_list) = args.as_list() {
                return self.try_expand_macro(target_sym, meta, arg_list);
            }
            // A variable reference; nothing to expand.
            return Ok(whole.clone());
        }
        // Qualified calls are not macro-expanded; recurse into the pieces.
        let target = self.expand(target)?;
        let args = self.expand(args)?;
        Ok(Node::call(target, meta.clone(), args))
    }

    /// An unqualified call: look for a macro of that name in the imported
    /// modules, in import order.
    fn try_expand_macro(
        &mut self,
        name: Symbol,
        meta: &Meta,
        args: &[Node],
    ) -> Result<Node, CompileError> {
        for module_name in self.imported.clone() {
            let Some(module) = self.ctx.get_module(&module_name) else {
                continue;
            };
            if let Some(mac) = module.get_macro(name.as_str()) {
                debug!(macro_name = name.as_str(), module = %module_name, "expanding macro");
                return mac(self.ctx, args).map_err(CompileError::from);
            }
        }
        // Not a macro: an ordinary call. Expand the pieces.
        let target = self.expand_symbol(name);
        let args = args
            .iter()
            .map(|n| self.expand(n))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Node::call(target, meta.clone(), Node::list(args)))
    }
}

/// Convert a node into a *quoted* node: an AST which, when compiled and
/// evaluated, reproduces the original node's value form. Call-shaped
/// 3-tuples are wrapped in explicit `{}` builder calls so data stays data.
pub fn escape(node: &Node) -> Node {
    match node.kind() {
        NodeKind::Integer(_)
        | NodeKind::Real(_)
        | NodeKind::Symbol(_)
        | NodeKind::String(_) => node.clone(),
        NodeKind::List(nodes) => Node::list(nodes.iter().map(escape).collect()),
        NodeKind::Tuple(nodes) => {
            let escaped: Vec<Node> = nodes.iter().map(escape).collect();
            if escaped.len() == 3 {
                // A literal 3-tuple would read back as a call; keep it data.
                Node::call(
                    Node::symbol_name("{}"),
                    Meta::default(),
                    Node::list(escaped),
                )
            } else {
                Node::tuple(escaped)
            }
        }
        NodeKind::Call(call) => Node::call(
            Node::symbol_name("{}"),
            Meta::default(),
            Node::list(vec![
                escape(call.target()),
                Node::list(Vec::new()),
                escape(call.args()),
            ]),
        ),
    }
}

/// Escape a runtime value into quoted AST.
pub fn escape_value(value: &Value) -> Result<Node, CompileError> {
    let node = Node::from_value(value).map_err(CompileError::from)?;
    Ok(escape(&node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lix_core::Module;
    use lix_core::ast::make_variable;

    use crate::parser::parse;

    fn ctx_with_macro() -> Context {
        let mut ctx = Context::new();
        let module = Module::new();
        // A macro that rewrites `twice(x)` into `x + x`.
        module.add_macro("twice", |_ctx, args| {
            let arg = args[0].clone();
            Ok(Node::call(
                Node::symbol_name("+"),
                Meta::default(),
                Node::list(vec![arg.clone(), arg]),
            ))
        });
        ctx.register_module("Kernel", module).unwrap();
        ctx
    }

    #[test]
    fn imported_macros_expand_unqualified_calls() {
        let mut ctx = ctx_with_macro();
        let node = parse("twice(21)").unwrap();
        let expanded = expand_macros(&mut ctx, &node).unwrap();
        assert_eq!(expanded.to_string(), "{:+, [], [21, 21]}");
    }

    #[test]
    fn non_macro_calls_survive() {
        let mut ctx = ctx_with_macro();
        let node = parse("other(21)").unwrap();
        let expanded = expand_macros(&mut ctx, &node).unwrap();
        assert_eq!(expanded, node);
    }

    #[test]
    fn import_brings_modules_into_scope() {
        let mut ctx = Context::new();
        let module = Module::new();
        module.add_macro("m", |_ctx, _args| Ok(Node::integer(1)));
        ctx.register_module("Extra", module).unwrap();
        ctx.register_module("Kernel", Module::new()).unwrap();
        let node = parse("import Extra; m(0)").unwrap();
        let expanded = expand_macros(&mut ctx, &node).unwrap();
        // Block of [:ok, 1].
        let args = expanded.as_call().unwrap().args().as_list().unwrap();
        assert_eq!(args[0].as_symbol().unwrap().as_str(), "ok");
        assert_eq!(args[1].as_integer(), Some(1));
    }

    #[test]
    fn alias_rewrites_prefixes() {
        let mut ctx = Context::new();
        ctx.register_module("Kernel", Module::new()).unwrap();
        let node = parse("alias Very.Long.Name\nName").unwrap();
        let expanded = expand_macros(&mut ctx, &node).unwrap();
        let args = expanded.as_call().unwrap().args().as_list().unwrap();
        assert_eq!(args[1].as_symbol().unwrap().as_str(), "Very.Long.Name");
    }

    #[test]
    fn escape_wraps_calls_as_tuple_builders() {
        let node = Node::call(
            Node::symbol_name("f"),
            Meta::default(),
            Node::list(vec![make_variable("x")]),
        );
        let escaped = escape(&node);
        let call = escaped.as_call().unwrap();
        assert_eq!(call.target().as_symbol().unwrap().as_str(), "{}");
        // Literal 3-tuples get the same treatment.
        let tup = Node::tuple(vec![Node::integer(1), Node::integer(2), Node::integer(3)]);
        let escaped = escape(&tup);
        assert_eq!(
            escaped.as_call().unwrap().target().as_symbol().unwrap().as_str(),
            "{}"
        );
    }
}
