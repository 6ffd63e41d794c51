//! Compiled bytecode: the instruction set, the shared `Code` sequence and
//! the append-only builder the compiler emits into.

mod builder;
mod instr;

pub use builder::CodeBuilder;
pub use instr::{InstOffset, Instr, Slot};

use std::fmt;
use std::rc::Rc;

/// An immutable instruction sequence, shared by reference count.
#[derive(Debug, Clone)]
pub struct Code {
    instrs: Rc<[Instr]>,
}

impl Code {
    pub fn new(instrs: Vec<Instr>) -> Code {
        Code {
            instrs: instrs.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn get(&self, offset: usize) -> Option<&Instr> {
        self.instrs.get(offset)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instr> {
        self.instrs.iter()
    }

    /// Identity comparison: two handles to the same instruction storage.
    pub fn same(&self, other: &Code) -> bool {
        Rc::ptr_eq(&self.instrs, &other.instrs)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (offset, instr) in self.instrs.iter().enumerate() {
            writeln!(f, "%{offset:<3} {instr}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disassembly_prefixes_offsets() {
        let code = Code::new(vec![
            Instr::ConstInt { value: 2 },
            Instr::ConstInt { value: 3 },
            Instr::Add { a: Slot(0), b: Slot(1) },
            Instr::Ret { slot: Slot(2) },
        ]);
        let text = code.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("%0  "));
        assert!(lines[2].contains("add"));
        assert!(lines[2].contains("$0, $1"));
    }
}
