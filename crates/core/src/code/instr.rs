//! The bytecode instruction set.
//!
//! Operands are operand-slot indices (`Slot`, rendered `$N`) or instruction
//! offsets (`InstOffset`, rendered `%N`). Instructions that produce a value
//! occupy the next free slot of the executing frame; the compiler and the
//! executor agree on that numbering by construction.

use std::fmt;

use crate::symbol::Symbol;

/// Index into a frame's operand slot array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(pub usize);

/// Offset of an instruction within a `Code` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstOffset(pub usize);

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl fmt::Display for InstOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Ret { slot: Slot },
    Call { func: Slot, arg: Slot },
    Tail { func: Slot, arg: Slot },
    CallMfa { module: Symbol, func: Symbol, args: Vec<Slot> },
    TailMfa { module: Symbol, func: Symbol, args: Vec<Slot> },
    Add { a: Slot, b: Slot },
    Sub { a: Slot, b: Slot },
    Mul { a: Slot, b: Slot },
    Div { a: Slot, b: Slot },
    Eq { a: Slot, b: Slot },
    Neq { a: Slot, b: Slot },
    Concat { a: Slot, b: Slot },
    Negate { arg: Slot },
    ConstInt { value: i64 },
    ConstReal { value: f64 },
    ConstSymbol { sym: Symbol },
    ConstStr { string: String },
    ConstBindingSlot { slot: Slot },
    HardMatch { lhs: Slot, rhs: Slot },
    TryMatch { lhs: Slot, rhs: Slot },
    MkTuple0,
    MkTuple1 { a: Slot },
    MkTuple2 { a: Slot, b: Slot },
    MkTuple3 { a: Slot, b: Slot, c: Slot },
    MkTuple4 { a: Slot, b: Slot, c: Slot, d: Slot },
    MkTuple5 { a: Slot, b: Slot, c: Slot, d: Slot, e: Slot },
    MkTuple6 { a: Slot, b: Slot, c: Slot, d: Slot, e: Slot, f: Slot },
    MkTuple7 { a: Slot, b: Slot, c: Slot, d: Slot, e: Slot, f: Slot, g: Slot },
    MkTupleN { slots: Vec<Slot> },
    MkList { slots: Vec<Slot> },
    MkMap { slots: Vec<Slot> },
    MkClosure { code_begin: InstOffset, code_end: InstOffset, captures: Vec<Slot> },
    MkCons { head: Slot, tail: Slot },
    PushFront { elem: Slot, list: Slot },
    Jump { target: InstOffset },
    FalseJump { target: InstOffset },
    TestTrue { slot: Slot },
    Rewind { slot: Slot },
    NoClause { subject: Slot },
    Dot { object: Slot, attr: Slot },
    IsList { arg: Slot },
    IsSymbol { arg: Slot },
    IsString { arg: Slot },
    ToString { arg: Slot },
    Inspect { arg: Slot },
    Raise { arg: Slot },
    FrameId { id: String },
}

fn slot_list(f: &mut fmt::Formatter<'_>, slots: &[Slot]) -> fmt::Result {
    let mut first = true;
    for slot in slots {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write!(f, "{slot}")?;
    }
    Ok(())
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instr::*;
        macro_rules! op {
            ($name:literal) => { write!(f, "{:>13}", $name) };
            ($name:literal, $($operand:expr),+) => {{
                write!(f, "{:>13}  ", $name)?;
                let mut first = true;
                $(
                    if !first { write!(f, ", ")?; }
                    first = false;
                    let _ = first;
                    write!(f, "{}", $operand)?;
                )+
                Ok(())
            }};
        }
        match self {
            Ret { slot } => op!("ret", slot),
            Call { func, arg } => op!("call", func, arg),
            Tail { func, arg } => op!("tail", func, arg),
            CallMfa { module, func, args } => {
                write!(f, "{:>13}  {}.{}(", "call_mfa", module.as_str(), func.as_str())?;
                slot_list(f, args)?;
                write!(f, ")")
            }
            TailMfa { module, func, args } => {
                write!(f, "{:>13}  {}.{}(", "tail_mfa", module.as_str(), func.as_str())?;
                slot_list(f, args)?;
                write!(f, ")")
            }
            Add { a, b } => op!("add", a, b),
            Sub { a, b } => op!("sub", a, b),
            Mul { a, b } => op!("mul", a, b),
            Div { a, b } => op!("div", a, b),
            Eq { a, b } => op!("eq", a, b),
            Neq { a, b } => op!("neq", a, b),
            Concat { a, b } => op!("concat", a, b),
            Negate { arg } => op!("negate", arg),
            ConstInt { value } => op!("const_int", value),
            ConstReal { value } => op!("const_real", value),
            ConstSymbol { sym } => op!("const_sym", sym),
            ConstStr { string } => {
                write!(f, "{:>13}  \"{}\"", "const_str", string)
            }
            ConstBindingSlot { slot } => op!("bind_slot", slot),
            HardMatch { lhs, rhs } => op!("hard_match", lhs, rhs),
            TryMatch { lhs, rhs } => op!("try_match", lhs, rhs),
            MkTuple0 => op!("mk_tuple_0"),
            MkTuple1 { a } => op!("mk_tuple_1", a),
            MkTuple2 { a, b } => op!("mk_tuple_2", a, b),
            MkTuple3 { a, b, c } => op!("mk_tuple_3", a, b, c),
            MkTuple4 { a, b, c, d } => op!("mk_tuple_4", a, b, c, d),
            MkTuple5 { a, b, c, d, e } => op!("mk_tuple_5", a, b, c, d, e),
            MkTuple6 { a, b, c, d, e, f: ff } => op!("mk_tuple_6", a, b, c, d, e, ff),
            MkTuple7 { a, b, c, d, e, f: ff, g } => op!("mk_tuple_7", a, b, c, d, e, ff, g),
            MkTupleN { slots } => {
                write!(f, "{:>13}  ", "mk_tuple_n")?;
                slot_list(f, slots)
            }
            MkList { slots } => {
                write!(f, "{:>13}  ", "mk_list")?;
                slot_list(f, slots)
            }
            MkMap { slots } => {
                write!(f, "{:>13}  ", "mk_map")?;
                slot_list(f, slots)
            }
            MkClosure { code_begin, code_end, captures } => {
                write!(f, "{:>13}  {} -> {}", "mk_closure", code_begin, code_end)?;
                for slot in captures {
                    write!(f, ", {slot}")?;
                }
                Ok(())
            }
            MkCons { head, tail } => op!("mk_cons", head, tail),
            PushFront { elem, list } => op!("push_front", elem, list),
            Jump { target } => op!("jump", target),
            FalseJump { target } => op!("false_jump", target),
            TestTrue { slot } => op!("test_true", slot),
            Rewind { slot } => op!("rewind", slot),
            NoClause { subject } => op!("no_clause", subject),
            Dot { object, attr } => op!("dot", object, attr),
            IsList { arg } => op!("is_list", arg),
            IsSymbol { arg } => op!("is_symbol", arg),
            IsString { arg } => op!("is_string", arg),
            ToString { arg } => op!("to_string", arg),
            Inspect { arg } => op!("inspect", arg),
            Raise { arg } => op!("raise", arg),
            FrameId { id } => op!("frame_id", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_and_offset_render() {
        assert_eq!(Slot(3).to_string(), "$3");
        assert_eq!(InstOffset(7).to_string(), "%7");
    }

    #[test]
    fn equal_instructions_render_identically() {
        let a = Instr::Add { a: Slot(0), b: Slot(1) };
        let b = Instr::Add { a: Slot(0), b: Slot(1) };
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn operand_rendering() {
        let call = Instr::CallMfa {
            module: Symbol::intern("IO"),
            func: Symbol::intern("puts"),
            args: vec![Slot(0), Slot(2)],
        };
        assert!(call.to_string().ends_with("IO.puts($0, $2)"));
        let sym = Instr::ConstSymbol { sym: Symbol::intern("ok") };
        assert!(sym.to_string().ends_with(":ok"));
    }
}
