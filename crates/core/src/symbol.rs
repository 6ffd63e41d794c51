//! Process-wide symbol intern table.
//!
//! A `Symbol` is an index into a global table of spellings. Two `intern`
//! calls for equal spellings yield the same index for the process lifetime,
//! so equality, ordering and hashing are all identity-based and never touch
//! the string data.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock};

/// An interned atomic identifier, compared by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

struct SymbolTable {
    names: Vec<&'static str>,
    index: HashMap<&'static str, u32>,
}

impl SymbolTable {
    fn intern(&mut self, spelling: &str) -> u32 {
        if let Some(&id) = self.index.get(spelling) {
            return id;
        }
        let name: &'static str = Box::leak(spelling.to_owned().into_boxed_str());
        let id = self.names.len() as u32;
        self.names.push(name);
        self.index.insert(name, id);
        id
    }
}

fn table() -> &'static Mutex<SymbolTable> {
    static TABLE: OnceLock<Mutex<SymbolTable>> = OnceLock::new();
    TABLE.get_or_init(|| {
        Mutex::new(SymbolTable {
            names: Vec::new(),
            index: HashMap::new(),
        })
    })
}

impl Symbol {
    /// Intern a spelling, returning its canonical identity.
    pub fn intern(spelling: &str) -> Symbol {
        let mut tab = table().lock().unwrap_or_else(|p| p.into_inner());
        Symbol(tab.intern(spelling))
    }

    /// The spelling this symbol was interned from.
    pub fn as_str(self) -> &'static str {
        let tab = table().lock().unwrap_or_else(|p| p.into_inner());
        tab.names[self.0 as usize]
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.as_str();
        if name.contains(' ') {
            write!(f, ":\"{name}\"")
        } else {
            write!(f, ":{name}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(sym: Symbol) -> u64 {
        let mut h = DefaultHasher::new();
        sym.hash(&mut h);
        h.finish()
    }

    #[test]
    fn equal_spellings_intern_to_same_identity() {
        let a = Symbol::intern("hello");
        let b = Symbol::intern("hello");
        assert_eq!(a, b);
        assert_eq!(hash_of(a), hash_of(b));
    }

    #[test]
    fn distinct_spellings_are_distinct() {
        assert_ne!(Symbol::intern("cat"), Symbol::intern("dog"));
    }

    #[test]
    fn spelling_round_trips() {
        let s = Symbol::intern("some_symbol!");
        assert_eq!(s.as_str(), "some_symbol!");
    }

    #[test]
    fn display_forms() {
        assert_eq!(Symbol::intern("ok").to_string(), ":ok");
        assert_eq!(Symbol::intern("two words").to_string(), ":\"two words\"");
    }
}
