//! The runtime value model: a tagged sum over every kind of value the
//! interpreter can hold. Values are immutable from the language's point of
//! view; containers share structure by reference count.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::boxed::Boxed;
use crate::code::Slot;
use crate::function::{Closure, Function};
use crate::list::List;
use crate::map::Map;
use crate::symbol::Symbol;
use crate::tuple::Tuple;

/// Pattern-side `[H|T]` decomposition of a list. Never delivered to user
/// code; it exists only on the left-hand side of a match.
#[derive(Debug, Clone, PartialEq)]
pub struct Cons {
    pub head: Rc<Value>,
    pub tail: Rc<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Symbol(Symbol),
    String(Rc<str>),
    Tuple(Tuple),
    List(List),
    Map(Map),
    Function(Function),
    Closure(Closure),
    /// Pattern-side marker: "bind the matched value into this slot".
    BindingSlot(Slot),
    Cons(Cons),
    Boxed(Boxed),
}

const TUPLE_HASH_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

fn scalar_hash(discriminant: u8, payload: impl Hash) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    discriminant.hash(&mut hasher);
    payload.hash(&mut hasher);
    hasher.finish()
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(Rc::from(s.into().into_boxed_str()))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::intern(name))
    }

    /// The `:true` / `:false` symbols the comparison instructions produce.
    pub fn bool_symbol(b: bool) -> Value {
        Value::symbol(if b { "true" } else { "false" })
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Value::Tuple(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&Closure> {
        match self {
            Value::Closure(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_binding_slot(&self) -> Option<Slot> {
        match self {
            Value::BindingSlot(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_cons(&self) -> Option<&Cons> {
        match self {
            Value::Cons(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_boxed(&self) -> Option<&Boxed> {
        match self {
            Value::Boxed(b) => Some(b),
            _ => None,
        }
    }

    /// The kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Symbol(_) => "symbol",
            Value::String(_) => "string",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Closure(_) => "closure",
            Value::BindingSlot(_) => "binding slot",
            Value::Cons(_) => "cons",
            Value::Boxed(_) => "boxed",
        }
    }

    /// Structural hash. Tuples fold element hashes with a mixing constant;
    /// lists, maps, callables and boxed values are not hashable and report
    /// their kind name.
    pub fn try_hash(&self) -> Result<u64, &'static str> {
        match self {
            Value::Integer(i) => Ok(scalar_hash(1, i)),
            Value::Real(r) => Ok(scalar_hash(2, r.to_bits())),
            Value::Symbol(s) => Ok(scalar_hash(3, s)),
            Value::String(s) => Ok(scalar_hash(4, s.as_bytes())),
            Value::Tuple(t) => {
                let mut acc = scalar_hash(5, t.len());
                for element in t.iter() {
                    acc = acc
                        .wrapping_mul(TUPLE_HASH_MIX)
                        .wrapping_add(element.try_hash()?);
                }
                Ok(acc)
            }
            other => Err(other.kind_name()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Value {
        Value::Real(r)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Value {
        Value::Symbol(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::string(s)
    }
}

impl From<Tuple> for Value {
    fn from(t: Tuple) -> Value {
        Value::Tuple(t)
    }
}

impl From<List> for Value {
    fn from(l: List) -> Value {
        Value::List(l)
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Value {
        Value::Map(m)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Value {
        Value::Function(f)
    }
}

impl From<Closure> for Value {
    fn from(c: Closure) -> Value {
        Value::Closure(c)
    }
}

impl From<Boxed> for Value {
    fn from(b: Boxed) -> Value {
        Value::Boxed(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Tuple(t) => write!(f, "{t}"),
            Value::List(l) => write!(f, "{l}"),
            Value::Map(m) => write!(f, "{m}"),
            Value::Function(func) => write!(f, "{func}"),
            Value::Closure(c) => write!(f, "{c}"),
            Value::BindingSlot(_) => write!(f, "<unbound>"),
            Value::Cons(_) => write!(f, "<cons>"),
            Value::Boxed(b) => write!(f, "{b}"),
        }
    }
}

/// The inspection form: like `Display`, but strings keep their quotes.
pub fn inspect(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_variant_equality_is_false() {
        assert_ne!(Value::Integer(1), Value::Real(1.0));
        assert_ne!(Value::symbol("a"), Value::string("a"));
    }

    #[test]
    fn tuple_hash_is_structural() {
        let a = Value::Tuple(Tuple::new(vec![Value::Integer(1), Value::symbol("x")]));
        let b = Value::Tuple(Tuple::new(vec![Value::Integer(1), Value::symbol("x")]));
        let c = Value::Tuple(Tuple::new(vec![Value::symbol("x"), Value::Integer(1)]));
        assert_eq!(a.try_hash().unwrap(), b.try_hash().unwrap());
        assert_ne!(a.try_hash().unwrap(), c.try_hash().unwrap());
    }

    #[test]
    fn unhashable_kinds_report_their_name() {
        assert_eq!(Value::List(List::new()).try_hash(), Err("list"));
        assert_eq!(Value::Map(Map::new()).try_hash(), Err("map"));
    }

    #[test]
    fn display_and_inspect_forms() {
        let v = Value::Tuple(Tuple::new(vec![Value::symbol("ok"), Value::Integer(3)]));
        assert_eq!(v.to_string(), "{:ok, 3}");
        assert_eq!(inspect(&Value::string("hi")), "\"hi\"");
        assert_eq!(Value::string("hi").to_string(), "hi");
    }
}
