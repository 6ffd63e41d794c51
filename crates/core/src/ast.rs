//! The abstract syntax tree.
//!
//! Everything with structure is a `call(target, meta, args)`: function
//! calls, operators, control constructs, block sequences and variable
//! references (a call whose args is the sentinel symbol `Var`). The tree
//! round-trips to and from `Value` — a call becomes the 3-tuple
//! `{target, meta, args}` — which is how macros consume and produce quoted
//! code.

use std::fmt;
use std::rc::Rc;

use crate::list::List;
use crate::raise::RaisedError;
use crate::symbol::Symbol;
use crate::tuple::Tuple;
use crate::value::Value;

/// Source origin attached to a call: optional (module, function) details
/// plus line/column, `-1` when unknown. Excluded from structural equality.
#[derive(Debug, Clone)]
pub struct Meta {
    fn_details: Option<(Symbol, Symbol)>,
    line: i32,
    column: i32,
}

impl Default for Meta {
    fn default() -> Meta {
        Meta {
            fn_details: None,
            line: -1,
            column: -1,
        }
    }
}

impl Meta {
    pub fn at(line: i32, column: i32) -> Meta {
        Meta {
            fn_details: None,
            line,
            column,
        }
    }

    pub fn set_fn_details(&mut self, module: Symbol, func: Symbol) {
        self.fn_details = Some((module, func));
    }

    pub fn fn_details(&self) -> Option<(Symbol, Symbol)> {
        self.fn_details
    }

    pub fn line(&self) -> i32 {
        self.line
    }

    pub fn column(&self) -> i32 {
        self.column
    }

    fn to_value(&self) -> Value {
        let details = match self.fn_details {
            Some((module, func)) => {
                Value::Tuple(Tuple::new(vec![module.into(), func.into()]))
            }
            None => Value::symbol("nil"),
        };
        Value::Tuple(Tuple::new(vec![
            details,
            Value::Integer(self.line as i64),
            Value::Integer(self.column as i64),
        ]))
    }

    fn from_value(value: &Value) -> Meta {
        let mut meta = Meta::default();
        let Some(tup) = value.as_tuple() else {
            return meta;
        };
        if tup.len() != 3 {
            return meta;
        }
        if let Some(pair) = tup.get(0).and_then(Value::as_tuple) {
            if pair.len() == 2 {
                if let (Some(module), Some(func)) = (
                    pair.get(0).and_then(Value::as_symbol),
                    pair.get(1).and_then(Value::as_symbol),
                ) {
                    meta.set_fn_details(module, func);
                }
            }
        }
        if let Some(line) = tup.get(1).and_then(Value::as_integer) {
            meta.line = line as i32;
        }
        if let Some(column) = tup.get(2).and_then(Value::as_integer) {
            meta.column = column as i32;
        }
        meta
    }
}

#[derive(Debug, Clone)]
pub struct NodeCall {
    target: Node,
    meta: Meta,
    args: Node,
}

impl NodeCall {
    pub fn target(&self) -> &Node {
        &self.target
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn args(&self) -> &Node {
        &self.args
    }
}

// Structural equality ignores meta.
impl PartialEq for NodeCall {
    fn eq(&self, other: &NodeCall) -> bool {
        self.target == other.target && self.args == other.args
    }
}

#[derive(Debug, PartialEq)]
pub enum NodeKind {
    Integer(i64),
    Real(f64),
    Symbol(Symbol),
    String(String),
    List(Vec<Node>),
    Tuple(Vec<Node>),
    Call(NodeCall),
}

/// An immutable, cheaply cloneable AST node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node(Rc<NodeKind>);

impl Node {
    pub fn integer(value: i64) -> Node {
        Node(Rc::new(NodeKind::Integer(value)))
    }

    pub fn real(value: f64) -> Node {
        Node(Rc::new(NodeKind::Real(value)))
    }

    pub fn symbol(sym: Symbol) -> Node {
        Node(Rc::new(NodeKind::Symbol(sym)))
    }

    pub fn symbol_name(name: &str) -> Node {
        Node::symbol(Symbol::intern(name))
    }

    pub fn string(value: impl Into<String>) -> Node {
        Node(Rc::new(NodeKind::String(value.into())))
    }

    pub fn list(nodes: Vec<Node>) -> Node {
        Node(Rc::new(NodeKind::List(nodes)))
    }

    pub fn tuple(nodes: Vec<Node>) -> Node {
        Node(Rc::new(NodeKind::Tuple(nodes)))
    }

    pub fn call(target: Node, meta: Meta, args: Node) -> Node {
        Node(Rc::new(NodeKind::Call(NodeCall { target, meta, args })))
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.kind() {
            NodeKind::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self.kind() {
            NodeKind::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self.kind() {
            NodeKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self.kind() {
            NodeKind::List(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Node]> {
        match self.kind() {
            NodeKind::Tuple(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&NodeCall> {
        match self.kind() {
            NodeKind::Call(call) => Some(call),
            _ => None,
        }
    }

    /// True for `call(sym, meta, :Var)` — a variable reference.
    pub fn as_variable(&self) -> Option<Symbol> {
        let call = self.as_call()?;
        let args_sym = call.args().as_symbol()?;
        if args_sym.as_str() == "Var" {
            call.target().as_symbol()
        } else {
            None
        }
    }

    /// Convert code to data: calls become `{target, meta, args}` 3-tuples.
    pub fn to_value(&self) -> Value {
        match self.kind() {
            NodeKind::Integer(i) => Value::Integer(*i),
            NodeKind::Real(r) => Value::Real(*r),
            NodeKind::Symbol(s) => Value::Symbol(*s),
            NodeKind::String(s) => Value::string(s.clone()),
            NodeKind::List(nodes) => {
                Value::List(nodes.iter().map(Node::to_value).collect::<List>())
            }
            NodeKind::Tuple(nodes) => {
                Value::Tuple(Tuple::new(nodes.iter().map(Node::to_value).collect()))
            }
            NodeKind::Call(call) => Value::Tuple(Tuple::new(vec![
                call.target.to_value(),
                call.meta.to_value(),
                call.args.to_value(),
            ])),
        }
    }

    /// Convert data back to code: 3-tuples are calls, everything else maps
    /// onto its literal node. Callables and opaque values have no AST form.
    pub fn from_value(value: &Value) -> Result<Node, RaisedError> {
        match value {
            Value::Integer(i) => Ok(Node::integer(*i)),
            Value::Real(r) => Ok(Node::real(*r)),
            Value::Symbol(s) => Ok(Node::symbol(*s)),
            Value::String(s) => Ok(Node::string(s.to_string())),
            Value::List(list) => {
                let nodes = list
                    .iter()
                    .map(Node::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::list(nodes))
            }
            Value::Tuple(tup) if tup.len() == 3 => {
                let target = Node::from_value(&tup.as_slice()[0])?;
                let meta = Meta::from_value(&tup.as_slice()[1]);
                let args = Node::from_value(&tup.as_slice()[2])?;
                Ok(Node::call(target, meta, args))
            }
            Value::Tuple(tup) => {
                let nodes = tup
                    .iter()
                    .map(Node::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::tuple(nodes))
            }
            other => Err(RaisedError::msg(format!(
                "cannot use {} value for AST node",
                other.kind_name()
            ))),
        }
    }
}

/// Look a keyword argument up in a macro-style argument list: the last
/// argument is a list of `{name, value}` 2-tuples.
pub fn keyword_get<'a>(args: &'a [Node], keyword: &str) -> Option<&'a Node> {
    let kwlist = args.last()?.as_list()?;
    for entry in kwlist {
        let pair = entry.as_tuple()?;
        if pair.len() != 2 {
            return None;
        }
        if pair[0].as_symbol()?.as_str() == keyword {
            return Some(&pair[1]);
        }
    }
    None
}

/// A variable reference node: `call(name, meta, :Var)`.
pub fn make_variable(name: &str) -> Node {
    Node::call(
        Node::symbol_name(name),
        Meta::default(),
        Node::symbol_name("Var"),
    )
}

/// A qualified call node: `Module.func(args…)`.
pub fn make_call(module: &str, func: &str, args: Vec<Node>) -> Node {
    let dot = Node::call(
        Node::symbol_name("."),
        Meta::default(),
        Node::list(vec![Node::symbol_name(module), Node::symbol_name(func)]),
    );
    Node::call(dot, Meta::default(), Node::list(args))
}

/// `name = rhs`.
pub fn make_assignment(name: &str, rhs: Node) -> Node {
    Node::call(
        Node::symbol_name("="),
        Meta::default(),
        Node::list(vec![make_variable(name), rhs]),
    )
}

fn write_joined(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    let mut first = true;
    for node in nodes {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write!(f, "{node}")?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            NodeKind::Integer(i) => write!(f, "{i}"),
            NodeKind::Real(r) => write!(f, "{r}"),
            NodeKind::Symbol(s) => write!(f, "{s}"),
            NodeKind::String(s) => write!(f, "'{s}'"),
            NodeKind::List(nodes) => {
                write!(f, "[")?;
                write_joined(f, nodes)?;
                write!(f, "]")
            }
            NodeKind::Tuple(nodes) => {
                write!(f, "{{")?;
                write_joined(f, nodes)?;
                write!(f, "}}")
            }
            NodeKind::Call(call) => {
                write!(f, "{{{}, [], {}}}", call.target, call.args)
            }
        }
    }
}
