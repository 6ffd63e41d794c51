//! Core value model and shared foundation for the lix language.
//!
//! This crate holds everything both the compiler and the runtime need to
//! agree on: the tagged `Value` sum, the interned `Symbol` table, the
//! persistent containers (list, tuple, HAMT map), type-erased host values,
//! the bytecode instruction set and builder, the AST, and the module /
//! context registries. It depends on neither the compiler nor the VM.

pub mod ast;
pub mod boxed;
pub mod code;
pub mod context;
pub mod function;
pub mod list;
pub mod map;
pub mod module;
pub mod raise;
pub mod symbol;
pub mod tuple;
pub mod value;

pub use boxed::{Boxed, HostType, box_cast, mut_box_cast};
pub use code::{Code, CodeBuilder, InstOffset, Instr, Slot};
pub use context::Context;
pub use function::{Closure, Function};
pub use list::List;
pub use map::{Map, MapError};
pub use module::{Callable, Module};
pub use raise::RaisedError;
pub use symbol::Symbol;
pub use tuple::Tuple;
pub use value::{Value, inspect};
