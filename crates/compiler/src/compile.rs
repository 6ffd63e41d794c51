//! AST → bytecode lowering.
//!
//! The compiler walks the expanded AST emitting instructions into a
//! `CodeBuilder` while tracking three pieces of state: the operand slot
//! counter (each value-producing instruction occupies the next slot), a
//! stack of variable scopes mapping names to slots, and the binding depth —
//! nonzero while compiling a pattern position, where an unbound identifier
//! emits a binding slot instead of failing as undefined.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use lix_core::ast::{Meta, Node, NodeKind, keyword_get, make_variable};
use lix_core::code::{Code, CodeBuilder, InstOffset, Instr, Slot};
use lix_core::symbol::Symbol;

use crate::error::CompileError;

/// Compile an expanded AST into executable code.
pub fn compile(node: &Node) -> Result<Code, CompileError> {
    let mut compiler = BlockCompiler {
        builder: CodeBuilder::new(),
        scopes: Vec::new(),
        binding_depth: 0,
        next_slot: 0,
        rebinding: None,
    };
    compiler.compile_root(node)?;
    Ok(compiler.builder.save())
}

/// A variable captured from an enclosing scope into a closure.
struct Capture {
    name: String,
    parent_slot: Slot,
    inner_slot: Slot,
}

struct BlockCompiler {
    builder: CodeBuilder,
    scopes: Vec<HashMap<String, Slot>>,
    binding_depth: u32,
    next_slot: usize,
    /// While compiling the left-hand side of `=`: the names freshly bound
    /// by *this* pattern. An already-scoped variable not in the set gets a
    /// fresh slot (rebinding, shadowing the old one); a name already in
    /// the set re-uses its slot, which makes repeated occurrences an
    /// equality test. `None` in case/fn patterns, where an in-scope
    /// variable is matched against its current value instead.
    rebinding: Option<HashSet<String>>,
}

impl BlockCompiler {
    /// Advance the slot counter, returning the slot just consumed.
    fn consume_slot(&mut self) -> Slot {
        let slot = Slot(self.next_slot);
        self.next_slot += 1;
        slot
    }

    fn slot_for_variable(&self, name: &str) -> Option<Slot> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn bind_variable(&mut self, name: &str, slot: Slot) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_owned(), slot);
        }
    }

    fn compile_root(&mut self, node: &Node) -> Result<(), CompileError> {
        self.scopes.push(HashMap::new());
        let slot = self.compile_expr(node)?;
        self.builder.push(Instr::Ret { slot });
        self.scopes.pop();
        Ok(())
    }

    /// Compile in value position: always yields the result slot.
    fn compile_expr(&mut self, node: &Node) -> Result<Slot, CompileError> {
        self.compile_node(node, false)?
            .ok_or_else(|| CompileError::new("internal: tail emission outside tail position"))
    }

    /// Compile a node. With `tail` set, a call in tail position emits a
    /// frame-replacing `tail`/`tail_mfa` and yields no slot.
    fn compile_node(&mut self, node: &Node, tail: bool) -> Result<Option<Slot>, CompileError> {
        match node.kind() {
            NodeKind::Integer(value) => {
                self.builder.push(Instr::ConstInt { value: *value });
                Ok(Some(self.consume_slot()))
            }
            NodeKind::Real(value) => {
                self.builder.push(Instr::ConstReal { value: *value });
                Ok(Some(self.consume_slot()))
            }
            NodeKind::Symbol(sym) => {
                self.builder.push(Instr::ConstSymbol { sym: *sym });
                Ok(Some(self.consume_slot()))
            }
            NodeKind::String(s) => {
                self.builder.push(Instr::ConstStr { string: s.clone() });
                Ok(Some(self.consume_slot()))
            }
            NodeKind::List(nodes) => Ok(Some(self.compile_list(nodes)?)),
            NodeKind::Tuple(nodes) => Ok(Some(self.compile_tuple(nodes)?)),
            NodeKind::Call(call) => {
                if let Some(args) = call.args().as_list() {
                    self.compile_call(call.target(), call.meta(), args, tail)
                } else {
                    Ok(Some(self.compile_variable(call.target(), call.meta())?))
                }
            }
        }
    }

    /// A call whose args are not a list is a variable reference.
    fn compile_variable(&mut self, target: &Node, meta: &Meta) -> Result<Slot, CompileError> {
        let Some(name) = target.as_symbol() else {
            return Err(CompileError::at("variable name must be a symbol", meta));
        };
        let existing = self.slot_for_variable(name.as_str());
        if self.binding_depth > 0 {
            let rebind = self
                .rebinding
                .as_ref()
                .is_some_and(|fresh| !fresh.contains(name.as_str()));
            if existing.is_none() || rebind {
                // A fresh binding: reserve the slot and announce the name.
                self.builder.push(Instr::ConstBindingSlot {
                    slot: Slot(self.next_slot),
                });
                let slot = self.consume_slot();
                self.bind_variable(name.as_str(), slot);
                if let Some(fresh) = &mut self.rebinding {
                    fresh.insert(name.as_str().to_owned());
                }
                trace!(name = name.as_str(), slot = slot.0, "new binding slot");
                return Ok(slot);
            }
        }
        match existing {
            Some(slot) => Ok(slot),
            None => Err(CompileError::at(
                format!("unbound variable '{}'", name.as_str()),
                meta,
            )),
        }
    }

    fn check_arity(
        &self,
        what: &str,
        args: &[Node],
        want: usize,
        meta: &Meta,
    ) -> Result<(), CompileError> {
        if args.len() == want {
            Ok(())
        } else {
            Err(CompileError::at(format!("invalid arguments to {what}"), meta))
        }
    }

    fn compile_binary_op(
        &mut self,
        args: &[Node],
        build: fn(Slot, Slot) -> Instr,
    ) -> Result<Option<Slot>, CompileError> {
        let a = self.compile_expr(&args[0])?;
        let b = self.compile_expr(&args[1])?;
        self.builder.push(build(a, b));
        Ok(Some(self.consume_slot()))
    }

    fn compile_intrinsic_1(
        &mut self,
        args: &[Node],
        build: fn(Slot) -> Instr,
    ) -> Result<Option<Slot>, CompileError> {
        let arg = self.compile_expr(&args[0])?;
        self.builder.push(build(arg));
        Ok(Some(self.consume_slot()))
    }

    fn compile_call(
        &mut self,
        target: &Node,
        meta: &Meta,
        args: &[Node],
        tail: bool,
    ) -> Result<Option<Slot>, CompileError> {
        if let Some(sym) = target.as_symbol() {
            match sym.as_str() {
                "+" if args.len() == 1 => return self.compile_node(&args[0], false),
                "+" => {
                    self.check_arity("+", args, 2, meta)?;
                    return self.compile_binary_op(args, |a, b| Instr::Add { a, b });
                }
                "-" if args.len() == 1 => {
                    return self.compile_intrinsic_1(args, |arg| Instr::Negate { arg });
                }
                "-" => {
                    self.check_arity("-", args, 2, meta)?;
                    return self.compile_binary_op(args, |a, b| Instr::Sub { a, b });
                }
                "*" => {
                    self.check_arity("*", args, 2, meta)?;
                    return self.compile_binary_op(args, |a, b| Instr::Mul { a, b });
                }
                "/" => {
                    self.check_arity("/", args, 2, meta)?;
                    return self.compile_binary_op(args, |a, b| Instr::Div { a, b });
                }
                "==" => {
                    self.check_arity("==", args, 2, meta)?;
                    return self.compile_binary_op(args, |a, b| Instr::Eq { a, b });
                }
                "!=" => {
                    self.check_arity("!=", args, 2, meta)?;
                    return self.compile_binary_op(args, |a, b| Instr::Neq { a, b });
                }
                "++" => {
                    self.check_arity("++", args, 2, meta)?;
                    return self.compile_binary_op(args, |a, b| Instr::Concat { a, b });
                }
                "=" => {
                    self.check_arity("=", args, 2, meta)?;
                    // The right-hand side sees the bindings as they were
                    // before this match takes effect.
                    let rhs = self.compile_expr(&args[1])?;
                    self.binding_depth += 1;
                    let outer_rebinding = self.rebinding.replace(HashSet::new());
                    let lhs = self.compile_expr(&args[0]);
                    self.rebinding = outer_rebinding;
                    self.binding_depth -= 1;
                    let lhs = lhs?;
                    self.builder.push(Instr::HardMatch { lhs, rhs });
                    return Ok(Some(rhs));
                }
                "__block__" => {
                    if args.is_empty() {
                        return Err(CompileError::at(
                            "block needs at least one expression",
                            meta,
                        ));
                    }
                    for expr in &args[..args.len() - 1] {
                        self.compile_expr(expr)?;
                    }
                    return self.compile_node(&args[args.len() - 1], tail);
                }
                "{}" => return Ok(Some(self.compile_tuple(args)?)),
                "%{}" => return Ok(Some(self.compile_map(args, meta)?)),
                "case" => return self.compile_case(args, meta, tail),
                "cond" => return self.compile_cond(args, meta, tail),
                "quote" => return Ok(Some(self.compile_quote(args, meta)?)),
                "fn" => return Ok(Some(self.compile_anon_fn(args, meta)?)),
                "&" => return self.compile_capture_fn(args, meta, tail),
                "|>" => return self.compile_pipe(args, meta, tail),
                "__slot!!" => {
                    let n = args.first().and_then(Node::as_integer).ok_or_else(|| {
                        CompileError::at("invalid arguments to __slot!!", meta)
                    })?;
                    return Ok(Some(Slot(n as usize)));
                }
                "." if args.len() == 1 => {
                    // A closure callable: the value itself.
                    return self.compile_node(&args[0], false);
                }
                "." => {
                    self.check_arity(".", args, 2, meta)?;
                    let object = self.compile_expr(&args[0])?;
                    let attr = self.compile_expr(&args[1])?;
                    self.builder.push(Instr::Dot { object, attr });
                    return Ok(Some(self.consume_slot()));
                }
                "|" => {
                    return Err(CompileError::at(
                        "cons '|' is only valid inside a list literal",
                        meta,
                    ));
                }
                "->" => {
                    return Err(CompileError::at(
                        "clause '->' outside of case, cond or fn",
                        meta,
                    ));
                }
                "is_list" if args.len() == 1 => {
                    return self.compile_intrinsic_1(args, |arg| Instr::IsList { arg });
                }
                "is_symbol" if args.len() == 1 => {
                    return self.compile_intrinsic_1(args, |arg| Instr::IsSymbol { arg });
                }
                "is_string" if args.len() == 1 => {
                    return self.compile_intrinsic_1(args, |arg| Instr::IsString { arg });
                }
                "to_string" if args.len() == 1 => {
                    return self.compile_intrinsic_1(args, |arg| Instr::ToString { arg });
                }
                "inspect" if args.len() == 1 => {
                    return self.compile_intrinsic_1(args, |arg| Instr::Inspect { arg });
                }
                "raise" if args.len() == 1 => {
                    let arg = self.compile_expr(&args[0])?;
                    self.builder.push(Instr::Raise { arg });
                    // Unreachable, but the expression still owns a slot.
                    self.builder.push(Instr::ConstSymbol {
                        sym: Symbol::intern("nil"),
                    });
                    return Ok(Some(self.consume_slot()));
                }
                _ => {}
            }
        }
        // A qualified call to a literal module compiles straight to an
        // mfa-style invocation.
        if let Some((module, func)) = remote_call_target(target) {
            let mut arg_slots = Vec::with_capacity(args.len());
            for arg in args {
                arg_slots.push(self.compile_expr(arg)?);
            }
            if tail {
                self.builder.push(Instr::TailMfa { module, func, args: arg_slots });
                return Ok(None);
            }
            self.builder.push(Instr::CallMfa { module, func, args: arg_slots });
            return Ok(Some(self.consume_slot()));
        }
        // Generic call: evaluate the callee, pack the arguments.
        let func = self.compile_expr(target)?;
        let mut arg_slots = Vec::with_capacity(args.len());
        for arg in args {
            arg_slots.push(self.compile_expr(arg)?);
        }
        self.builder.push(Instr::MkTupleN { slots: arg_slots });
        let arg = self.consume_slot();
        if tail {
            self.builder.push(Instr::Tail { func, arg });
            return Ok(None);
        }
        self.builder.push(Instr::Call { func, arg });
        Ok(Some(self.consume_slot()))
    }

    fn compile_tuple(&mut self, nodes: &[Node]) -> Result<Slot, CompileError> {
        let mut slots = Vec::with_capacity(nodes.len());
        for node in nodes {
            slots.push(self.compile_expr(node)?);
        }
        let instr = match *slots.as_slice() {
            [] => Instr::MkTuple0,
            [a] => Instr::MkTuple1 { a },
            [a, b] => Instr::MkTuple2 { a, b },
            [a, b, c] => Instr::MkTuple3 { a, b, c },
            [a, b, c, d] => Instr::MkTuple4 { a, b, c, d },
            [a, b, c, d, e] => Instr::MkTuple5 { a, b, c, d, e },
            [a, b, c, d, e, f] => Instr::MkTuple6 { a, b, c, d, e, f },
            [a, b, c, d, e, f, g] => Instr::MkTuple7 { a, b, c, d, e, f, g },
            _ => Instr::MkTupleN { slots },
        };
        self.builder.push(instr);
        Ok(self.consume_slot())
    }

    fn compile_map(&mut self, entries: &[Node], meta: &Meta) -> Result<Slot, CompileError> {
        let mut slots = Vec::with_capacity(entries.len() * 2);
        for entry in entries {
            let pair = entry
                .as_tuple()
                .filter(|pair| pair.len() == 2)
                .ok_or_else(|| CompileError::at("invalid map literal entry", meta))?;
            slots.push(self.compile_expr(&pair[0])?);
            slots.push(self.compile_expr(&pair[1])?);
        }
        self.builder.push(Instr::MkMap { slots });
        Ok(self.consume_slot())
    }

    /// `[h | t]` in binding position builds a cons pattern; in value
    /// position it prepends. Anything else is a plain list literal.
    fn compile_list(&mut self, nodes: &[Node]) -> Result<Slot, CompileError> {
        if nodes.len() == 1 {
            if let Some(call) = nodes[0].as_call() {
                let is_cons = call
                    .target()
                    .as_symbol()
                    .is_some_and(|s| s.as_str() == "|");
                if is_cons {
                    let args = call
                        .args()
                        .as_list()
                        .filter(|args| args.len() == 2)
                        .ok_or_else(|| {
                            CompileError::at("cons expects two arguments", call.meta())
                        })?;
                    let head = self.compile_expr(&args[0])?;
                    let tail = self.compile_expr(&args[1])?;
                    if self.binding_depth > 0 {
                        self.builder.push(Instr::MkCons { head, tail });
                    } else {
                        self.builder.push(Instr::PushFront { elem: head, list: tail });
                    }
                    return Ok(self.consume_slot());
                }
            }
        }
        let mut slots = Vec::with_capacity(nodes.len());
        for node in nodes {
            slots.push(self.compile_expr(node)?);
        }
        self.builder.push(Instr::MkList { slots });
        Ok(self.consume_slot())
    }

    fn do_block_clauses<'n>(
        &self,
        node: &'n Node,
        what: &str,
        meta: &Meta,
    ) -> Result<&'n [Node], CompileError> {
        let block = keyword_get(std::slice::from_ref(node), "do")
            .ok_or_else(|| CompileError::at(format!("{what} expects a do block"), meta))?;
        block
            .as_list()
            .ok_or_else(|| CompileError::at(format!("{what} expects match clauses"), meta))
    }

    fn compile_case(
        &mut self,
        args: &[Node],
        meta: &Meta,
        tail: bool,
    ) -> Result<Option<Slot>, CompileError> {
        self.check_arity("case", args, 2, meta)?;
        let subject = self.compile_expr(&args[0])?;
        let clauses = self.do_block_clauses(&args[1], "case", meta)?.to_vec();
        Ok(Some(self.compile_branches(subject, &clauses, meta, tail)?))
    }

    /// `cond` is `case` with the match subject fixed to `:true`.
    fn compile_cond(
        &mut self,
        args: &[Node],
        meta: &Meta,
        tail: bool,
    ) -> Result<Option<Slot>, CompileError> {
        self.check_arity("cond", args, 1, meta)?;
        let clauses = self.do_block_clauses(&args[0], "cond", meta)?.to_vec();
        self.builder.push(Instr::ConstSymbol {
            sym: Symbol::intern("true"),
        });
        let subject = self.consume_slot();
        Ok(Some(self.compile_branches(subject, &clauses, meta, tail)?))
    }

    /// The shared case/cond/fn-clause lowering. Reserves a result slot,
    /// then chains the clauses: each tests its pattern with `try_match`,
    /// falls through to the next on failure (rewinding any slots its
    /// pattern consumed), and hard-matches its body into the result slot
    /// on success. Falling off the last clause raises `no_clause`.
    fn compile_branches(
        &mut self,
        match_slot: Slot,
        clauses: &[Node],
        meta: &Meta,
        tail: bool,
    ) -> Result<Slot, CompileError> {
        let res_slot = Slot(self.next_slot);
        self.builder.push(Instr::ConstBindingSlot { slot: res_slot });
        self.consume_slot();
        let rewind_to = Slot(self.next_slot);
        let mut exit_jumps = Vec::new();
        let mut prev_false_jump: Option<InstOffset> = None;
        for clause in clauses {
            if let Some(prev) = prev_false_jump.take() {
                // The prior clause failed: rewind any work its test did.
                self.builder
                    .set_jump_target(prev, self.builder.current_offset());
                self.builder.push(Instr::Rewind { slot: rewind_to });
                self.next_slot = rewind_to.0;
            }
            let (false_jump, exit_jump) =
                self.compile_branch_clause(match_slot, res_slot, clause, tail)?;
            exit_jumps.extend(exit_jump);
            prev_false_jump = Some(false_jump);
        }
        let Some(last_fail) = prev_false_jump else {
            return Err(CompileError::at("expected at least one clause", meta));
        };
        self.builder
            .set_jump_target(last_fail, self.builder.current_offset());
        self.builder.push(Instr::NoClause { subject: match_slot });
        for jump in exit_jumps {
            self.builder
                .set_jump_target(jump, self.builder.current_offset());
        }
        self.builder.push(Instr::Rewind { slot: rewind_to });
        self.next_slot = rewind_to.0;
        Ok(res_slot)
    }

    fn compile_branch_clause(
        &mut self,
        match_slot: Slot,
        res_slot: Slot,
        clause: &Node,
        tail: bool,
    ) -> Result<(InstOffset, Option<InstOffset>), CompileError> {
        let (pattern, body) = split_clause(clause)?;
        // Each clause binds in its own scope.
        self.scopes.push(HashMap::new());
        self.binding_depth += 1;
        let test_slot = self.compile_expr(&pattern);
        self.binding_depth -= 1;
        let test_slot = test_slot?;
        self.builder.push(Instr::TryMatch {
            lhs: test_slot,
            rhs: match_slot,
        });
        let false_jump = self.builder.push(Instr::FalseJump {
            target: InstOffset(0),
        });
        let exit_jump = match self.compile_node(&body, tail)? {
            Some(body_slot) => {
                self.builder.push(Instr::HardMatch {
                    lhs: res_slot,
                    rhs: body_slot,
                });
                Some(self.builder.push(Instr::Jump {
                    target: InstOffset(0),
                }))
            }
            // The body ended in a frame-replacing tail call; there is
            // nothing to store and no exit to jump to.
            None => None,
        };
        self.scopes.pop();
        Ok((false_jump, exit_jump))
    }

    /// Closure construction: discover captures, compile the clauses in a
    /// fresh slot space behind a jump, then materialise the closure.
    fn compile_anon_fn(&mut self, clauses: &[Node], meta: &Meta) -> Result<Slot, CompileError> {
        let mut captures: Vec<Capture> = Vec::new();
        for clause in clauses {
            self.find_captures(clause, &mut captures);
        }
        debug!(clauses = clauses.len(), captures = captures.len(), "compiling fn");
        let saved_scopes = std::mem::take(&mut self.scopes);
        let saved_next_slot = self.next_slot;
        let saved_rebinding = self.rebinding.take();
        let mut base_scope = HashMap::new();
        for capture in &captures {
            base_scope.insert(capture.name.clone(), capture.inner_slot);
        }
        self.scopes.push(base_scope);
        self.next_slot = captures.len();
        // Sequential execution must not fall into the body.
        let jump_over = self.builder.push(Instr::Jump {
            target: InstOffset(0),
        });
        let code_begin = self.builder.current_offset();
        if let Some((module, func)) = meta.fn_details() {
            self.builder.push(Instr::FrameId {
                id: format!("{}.{}", module.as_str(), func.as_str()),
            });
        }
        // The packed argument tuple always lands just after the captures.
        let arg_slot = self.consume_slot();
        let mut case_clauses = Vec::with_capacity(clauses.len());
        for clause in clauses {
            case_clauses.push(fn_clause_to_case_clause(clause)?);
        }
        let res_slot = self.compile_branches(arg_slot, &case_clauses, meta, true)?;
        self.builder.push(Instr::Ret { slot: res_slot });
        let code_end = self.builder.current_offset();
        self.builder.set_jump_target(jump_over, code_end);
        self.scopes = saved_scopes;
        self.next_slot = saved_next_slot;
        self.rebinding = saved_rebinding;
        let capture_slots = captures.iter().map(|c| c.parent_slot).collect();
        self.builder.push(Instr::MkClosure {
            code_begin,
            code_end,
            captures: capture_slots,
        });
        Ok(self.consume_slot())
    }

    /// Every variable referenced anywhere in the `fn` that is bound in an
    /// enclosing scope becomes a capture; names bound inside the `fn`
    /// itself are fresh bindings and stay out of the list.
    fn find_captures(&self, node: &Node, dest: &mut Vec<Capture>) {
        match node.kind() {
            NodeKind::Integer(_)
            | NodeKind::Real(_)
            | NodeKind::Symbol(_)
            | NodeKind::String(_) => {}
            NodeKind::List(nodes) | NodeKind::Tuple(nodes) => {
                for child in nodes {
                    self.find_captures(child, dest);
                }
            }
            NodeKind::Call(call) => {
                if let Some(name) = node.as_variable() {
                    let name = name.as_str();
                    if dest.iter().any(|c| c.name == name) {
                        return;
                    }
                    if let Some(parent_slot) = self.slot_for_variable(name) {
                        dest.push(Capture {
                            name: name.to_owned(),
                            parent_slot,
                            inner_slot: Slot(dest.len()),
                        });
                    }
                    return;
                }
                self.find_captures(call.target(), dest);
                self.find_captures(call.args(), dest);
            }
        }
    }

    /// `quote do … end`: compile the quoted form of the block, turning
    /// code into the data that describes it.
    fn compile_quote(&mut self, args: &[Node], meta: &Meta) -> Result<Slot, CompileError> {
        self.check_arity("quote", args, 1, meta)?;
        let block = keyword_get(std::slice::from_ref(&args[0]), "do")
            .ok_or_else(|| CompileError::at("quote expects a do block", meta))?
            .clone();
        self.compile_quoted(&block)
    }

    fn compile_quoted(&mut self, node: &Node) -> Result<Slot, CompileError> {
        match node.kind() {
            NodeKind::Integer(value) => {
                self.builder.push(Instr::ConstInt { value: *value });
                Ok(self.consume_slot())
            }
            NodeKind::Real(value) => {
                self.builder.push(Instr::ConstReal { value: *value });
                Ok(self.consume_slot())
            }
            NodeKind::Symbol(sym) => {
                self.builder.push(Instr::ConstSymbol { sym: *sym });
                Ok(self.consume_slot())
            }
            NodeKind::String(s) => {
                self.builder.push(Instr::ConstStr { string: s.clone() });
                Ok(self.consume_slot())
            }
            NodeKind::List(nodes) => {
                let mut slots = Vec::with_capacity(nodes.len());
                for child in nodes {
                    slots.push(self.compile_quoted(child)?);
                }
                self.builder.push(Instr::MkList { slots });
                Ok(self.consume_slot())
            }
            NodeKind::Tuple(nodes) => {
                let mut slots = Vec::with_capacity(nodes.len());
                for child in nodes {
                    slots.push(self.compile_quoted(child)?);
                }
                self.builder.push(Instr::MkTupleN { slots });
                Ok(self.consume_slot())
            }
            NodeKind::Call(call) => {
                let a = self.compile_quoted(call.target())?;
                let b = self.compile_quoted(&Node::list(Vec::new()))?;
                let c = self.compile_quoted(call.args())?;
                self.builder.push(Instr::MkTuple3 { a, b, c });
                Ok(self.consume_slot())
            }
        }
    }

    /// `&expr` with `&N` placeholders lowers to `fn a1, …, aN -> expr end`.
    fn compile_capture_fn(
        &mut self,
        args: &[Node],
        meta: &Meta,
        tail: bool,
    ) -> Result<Option<Slot>, CompileError> {
        self.check_arity("&", args, 1, meta)?;
        if args[0].as_integer().is_some() {
            return Err(CompileError::at(
                "capture placeholder '&N' outside a capture expression",
                meta,
            ));
        }
        let mut arity = 0;
        let body = rewrite_placeholders(&args[0], &mut arity, meta)?;
        if arity == 0 {
            return Err(CompileError::at(
                "capture expression has no '&N' placeholders",
                meta,
            ));
        }
        let patterns: Vec<Node> = (1..=arity)
            .map(|n| make_variable(&format!("__capture_{n}")))
            .collect();
        let clause = Node::call(
            Node::symbol_name("->"),
            meta.clone(),
            Node::list(vec![Node::list(patterns), body]),
        );
        let fn_node = Node::call(Node::symbol_name("fn"), meta.clone(), Node::list(vec![clause]));
        self.compile_node(&fn_node, tail)
    }

    /// `a |> f(b)` rewrites to `f(a, b)` before lowering.
    fn compile_pipe(
        &mut self,
        args: &[Node],
        meta: &Meta,
        tail: bool,
    ) -> Result<Option<Slot>, CompileError> {
        self.check_arity("|>", args, 2, meta)?;
        let rhs_call = args[1]
            .as_call()
            .filter(|call| call.args().as_list().is_some())
            .ok_or_else(|| {
                CompileError::at("right-hand side of |> must be a call", meta)
            })?;
        let mut new_args = vec![args[0].clone()];
        new_args.extend(
            rhs_call
                .args()
                .as_list()
                .unwrap_or_default()
                .iter()
                .cloned(),
        );
        let rewritten = Node::call(
            rhs_call.target().clone(),
            rhs_call.meta().clone(),
            Node::list(new_args),
        );
        self.compile_node(&rewritten, tail)
    }
}

/// `Mod.fn` with both sides literal symbols — the `call_mfa` fast path.
fn remote_call_target(target: &Node) -> Option<(Symbol, Symbol)> {
    let call = target.as_call()?;
    if call.target().as_symbol()?.as_str() != "." {
        return None;
    }
    let args = call.args().as_list()?;
    if args.len() != 2 {
        return None;
    }
    Some((args[0].as_symbol()?, args[1].as_symbol()?))
}

/// Pull `(pattern, body)` out of a case-style `->` clause.
fn split_clause(clause: &Node) -> Result<(Node, Node), CompileError> {
    let call = clause
        .as_call()
        .filter(|call| {
            call.target()
                .as_symbol()
                .is_some_and(|s| s.as_str() == "->")
        })
        .ok_or_else(|| CompileError::new("expected a '->' clause"))?;
    let args = call
        .args()
        .as_list()
        .filter(|args| args.len() == 2)
        .ok_or_else(|| CompileError::at("invalid clause", call.meta()))?;
    let patterns = args[0]
        .as_list()
        .filter(|patterns| patterns.len() == 1)
        .ok_or_else(|| CompileError::at("invalid clause pattern", call.meta()))?;
    Ok((patterns[0].clone(), args[1].clone()))
}

/// Rewrite an `fn` clause (`args… -> body`) into a case-style clause
/// matching the packed argument tuple against the tuple of patterns.
fn fn_clause_to_case_clause(clause: &Node) -> Result<Node, CompileError> {
    let call = clause
        .as_call()
        .filter(|call| {
            call.target()
                .as_symbol()
                .is_some_and(|s| s.as_str() == "->")
        })
        .ok_or_else(|| CompileError::new("expected an fn clause"))?;
    let args = call
        .args()
        .as_list()
        .filter(|args| args.len() == 2)
        .ok_or_else(|| CompileError::at("invalid fn clause", call.meta()))?;
    let patterns = args[0]
        .as_list()
        .ok_or_else(|| CompileError::at("invalid fn clause arguments", call.meta()))?;
    let tuple_pattern = Node::tuple(patterns.to_vec());
    Ok(Node::call(
        Node::symbol_name("->"),
        call.meta().clone(),
        Node::list(vec![Node::list(vec![tuple_pattern]), args[1].clone()]),
    ))
}

/// Replace `&N` placeholders with fresh argument variables, recording the
/// highest placeholder index seen.
fn rewrite_placeholders(
    node: &Node,
    arity: &mut i64,
    meta: &Meta,
) -> Result<Node, CompileError> {
    if let Some(call) = node.as_call() {
        if call.target().as_symbol().is_some_and(|s| s.as_str() == "&") {
            let args = call.args().as_list().unwrap_or_default();
            if let Some(n) = args.first().and_then(Node::as_integer) {
                if n < 1 {
                    return Err(CompileError::at(
                        format!("invalid capture placeholder '&{n}'"),
                        meta,
                    ));
                }
                *arity = (*arity).max(n);
                return Ok(make_variable(&format!("__capture_{n}")));
            }
            return Err(CompileError::at(
                "nested capture expressions are not supported",
                meta,
            ));
        }
        let target = rewrite_placeholders(call.target(), arity, meta)?;
        let args = rewrite_placeholders(call.args(), arity, meta)?;
        return Ok(Node::call(target, call.meta().clone(), args));
    }
    match node.kind() {
        NodeKind::List(nodes) => {
            let rewritten = nodes
                .iter()
                .map(|n| rewrite_placeholders(n, arity, meta))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Node::list(rewritten))
        }
        NodeKind::Tuple(nodes) => {
            let rewritten = nodes
                .iter()
                .map(|n| rewrite_placeholders(n, arity, meta))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Node::tuple(rewritten))
        }
        _ => Ok(node.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn compiled(src: &str) -> Code {
        compile(&parse(src).unwrap()).unwrap_or_else(|e| panic!("compile failed for {src:?}: {e}"))
    }

    fn disasm(src: &str) -> String {
        compiled(src).to_string()
    }

    #[test]
    fn literals_take_successive_slots() {
        let text = disasm("{1, 2}");
        assert!(text.contains("const_int  1"));
        assert!(text.contains("const_int  2"));
        assert!(text.contains("mk_tuple_2  $0, $1"));
    }

    #[test]
    fn arithmetic_produces_result_slot() {
        let code = compiled("2 + (6 - 2)");
        // 2, 6, 2, sub, add, ret
        assert_eq!(code.len(), 6);
        assert_eq!(code.get(3), Some(&Instr::Sub { a: Slot(1), b: Slot(2) }));
        assert_eq!(code.get(4), Some(&Instr::Add { a: Slot(0), b: Slot(3) }));
        assert_eq!(code.get(5), Some(&Instr::Ret { slot: Slot(4) }));
    }

    #[test]
    fn unbound_variable_is_a_compile_error() {
        let err = compile(&parse("x + 1").unwrap()).unwrap_err();
        assert!(err.message.contains("unbound variable 'x'"));
        assert!(err.line >= 1);
    }

    #[test]
    fn binding_position_creates_binding_slots() {
        // The right-hand side compiles first, so the binding slot for x
        // lands after the literal.
        let text = disasm("x = 1");
        assert!(text.contains("bind_slot  $1"));
        assert!(text.contains("hard_match  $1, $0"));
    }

    #[test]
    fn match_expression_value_is_the_rhs_slot() {
        let code = compiled("x = 1");
        assert_eq!(code.get(3), Some(&Instr::Ret { slot: Slot(0) }));
    }

    #[test]
    fn match_rebinds_existing_variables() {
        // `x = 2` shadows the first binding with a fresh slot; reads after
        // it see the new slot.
        let code = compiled("x = 1; x = 2; x");
        let binds = code
            .iter()
            .filter(|i| matches!(i, Instr::ConstBindingSlot { .. }))
            .count();
        assert_eq!(binds, 2);
        assert_eq!(
            code.get(code.len() - 1),
            Some(&Instr::Ret { slot: Slot(3) })
        );
    }

    #[test]
    fn case_lowers_to_try_match_chain() {
        let text = disasm("case :a do :a -> 1; :b -> 2 end");
        assert!(text.contains("try_match"));
        assert!(text.contains("false_jump"));
        assert!(text.contains("no_clause"));
        assert!(text.contains("rewind"));
    }

    #[test]
    fn failed_clause_rewinds_to_stable_top() {
        let code = compiled("case :b do :a -> 1; :b -> 2 end");
        // subject($0), result bind_slot($1): every clause rewinds to $2.
        let rewinds: Vec<&Instr> = code
            .iter()
            .filter(|i| matches!(i, Instr::Rewind { .. }))
            .collect();
        assert!(!rewinds.is_empty());
        for rewind in rewinds {
            assert_eq!(rewind, &Instr::Rewind { slot: Slot(2) });
        }
    }

    #[test]
    fn cons_compiles_by_context() {
        assert!(disasm("[1 | [2]]").contains("push_front"));
        assert!(disasm("[h | t] = [1, 2]").contains("mk_cons"));
    }

    #[test]
    fn closures_jump_over_their_body() {
        let code = compiled("fn -> 42 end");
        let Some(Instr::Jump { target }) = code.get(0) else {
            panic!("expected leading jump, got {:?}", code.get(0));
        };
        let Some(Instr::MkClosure { code_begin, code_end, captures }) = code.get(target.0) else {
            panic!("jump must land on mk_closure");
        };
        assert_eq!(code_begin, &InstOffset(1));
        assert_eq!(code_end, target);
        assert!(captures.is_empty());
    }

    #[test]
    fn closures_capture_enclosing_variables() {
        let code = compiled("x = 12; f = fn -> x end");
        let mk = code
            .iter()
            .find_map(|i| match i {
                Instr::MkClosure { captures, .. } => Some(captures.clone()),
                _ => None,
            })
            .expect("closure instruction");
        // x's binding slot sits after the literal 12 in the outer frame.
        assert_eq!(mk, vec![Slot(1)]);
    }

    #[test]
    fn fn_bodies_emit_tail_calls() {
        let text = disasm("f = fn v, t -> t.(v, t) end");
        assert!(text.contains("tail"), "expected a tail call:\n{text}");
    }

    #[test]
    fn remote_literal_calls_use_call_mfa() {
        let text = disasm("IO.puts('hi')");
        assert!(text.contains("call_mfa"));
        assert!(text.contains("IO.puts($0)"));
    }

    #[test]
    fn pipe_rewrites_to_first_argument() {
        let a = disasm("f(1, 2)");
        // `1 |> f(2)` — same code as f(1, 2) modulo the callee compile.
        let b = disasm("1 |> f(2)");
        let _ = &a;
        // Both must be generic calls over a 2-tuple of arguments.
        assert!(b.contains("mk_tuple_n"));
        let err = compile(&parse("1 |> 2").unwrap()).unwrap_err();
        assert!(err.message.contains("|>"));
    }

    #[test]
    fn capture_lowers_to_closure() {
        let text = disasm("&(&1 + 1)");
        assert!(text.contains("mk_closure"));
        let err = compile(&parse("&(2 + 2)").unwrap()).unwrap_err();
        assert!(err.message.contains("placeholders"));
    }

    #[test]
    fn quote_builds_call_triples() {
        let text = disasm("quote do f(1) end");
        assert!(text.contains("mk_tuple_3"));
        // The quoted call's meta compiles as an empty list.
        assert!(text.contains("mk_list"));
    }

    #[test]
    fn map_literal_lowers_to_mk_map() {
        let text = disasm("%{:a => 1}");
        assert!(text.contains("mk_map  $0, $1"));
    }

    #[test]
    fn intrinsics_get_dedicated_opcodes() {
        assert!(disasm("is_list([])").contains("is_list"));
        assert!(disasm("to_string(1)").contains("to_string"));
        assert!(disasm("inspect(1)").contains("inspect"));
        assert!(disasm("raise :boom").contains("raise"));
    }

    #[test]
    fn slot_escape_hatch_reads_raw_slots() {
        // `__slot!!(n)` yields slot n directly, with no instruction.
        let code = compiled("x = 1; __slot!!(1)");
        assert_eq!(
            code.get(code.len() - 1),
            Some(&Instr::Ret { slot: Slot(1) })
        );
    }

    #[test]
    fn slot_indices_reuse_after_rewind_monotonically() {
        // Two sequential cases rewind to the same stack top, so their
        // internal scratch slots re-use the same indices.
        let code = compiled("case :a do :a -> 1 end; case :b do :b -> 2 end");
        let consts: Vec<Slot> = code
            .iter()
            .filter_map(|i| match i {
                Instr::ConstBindingSlot { slot } => Some(*slot),
                _ => None,
            })
            .collect();
        // Result slots: first case at $1, second case at $3 (subject at $2
        // after the first case's rewind-to-2... subjects: $0 and $2).
        assert_eq!(consts.len(), 2);
        assert!(consts[1].0 > consts[0].0);
    }
}
