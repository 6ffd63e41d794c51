//! The bytecode executor.
//!
//! A stack of call frames, each holding a shared `Code`, an instruction
//! cursor, a growable operand slot array and the match-test flag.
//! Dispatch is a straight loop over the instruction at the top frame's
//! cursor; any instruction may raise, which aborts execution and carries a
//! best-effort traceback assembled from the frames' `frame_id` labels.

use tracing::trace;

use lix_core::code::{Code, Instr, Slot};
use lix_core::context::Context;
use lix_core::function::Closure;
use lix_core::list::List;
use lix_core::map::Map;
use lix_core::module::Callable;
use lix_core::raise::RaisedError;
use lix_core::symbol::Symbol;
use lix_core::tuple::Tuple;
use lix_core::value::{Cons, Value, inspect};

use crate::pattern::match_into;

struct Frame {
    code: Code,
    ip: usize,
    slots: Vec<Value>,
    test: bool,
    id: Option<String>,
}

impl Frame {
    fn new(code: Code, ip: usize, slots: Vec<Value>) -> Frame {
        Frame {
            code,
            ip,
            slots,
            test: false,
            id: None,
        }
    }

    fn slot(&self, slot: Slot) -> Result<&Value, RaisedError> {
        self.slots
            .get(slot.0)
            .ok_or_else(|| RaisedError::msg(format!("operand slot ${} out of range", slot.0)))
    }
}

/// Executes a `Code` (or a closure activation) against a context.
pub struct Executor {
    frames: Vec<Frame>,
    bottom: Option<Value>,
}

impl Executor {
    pub fn new(code: Code) -> Executor {
        Executor {
            frames: vec![Frame::new(code, 0, Vec::new())],
            bottom: None,
        }
    }

    /// Start at a closure's entry with its captures and the packed
    /// argument tuple pre-loaded, exactly as a `call` would.
    pub fn from_closure(closure: &Closure, arg: Value) -> Executor {
        Executor {
            frames: vec![closure_frame(closure, arg)],
            bottom: None,
        }
    }

    /// Run to completion and yield the bottom frame's return value.
    pub fn execute_all(&mut self, ctx: &mut Context) -> Result<Value, RaisedError> {
        while !self.frames.is_empty() {
            self.step(ctx)?;
        }
        self.bottom
            .take()
            .ok_or_else(|| RaisedError::msg("executor finished without a value"))
    }

    /// Dispatch up to `n` instructions. `Some(value)` once complete,
    /// `None` while still running.
    pub fn execute_n(
        &mut self,
        ctx: &mut Context,
        n: usize,
    ) -> Result<Option<Value>, RaisedError> {
        for _ in 0..n {
            if self.frames.is_empty() {
                break;
            }
            self.step(ctx)?;
        }
        if self.frames.is_empty() {
            Ok(Some(self.bottom.take().ok_or_else(|| {
                RaisedError::msg("executor finished without a value")
            })?))
        } else {
            Ok(None)
        }
    }

    fn step(&mut self, ctx: &mut Context) -> Result<(), RaisedError> {
        self.exec_one(ctx).map_err(|mut err| {
            err.fill_traceback(self.traceback());
            err
        })
    }

    fn traceback(&self) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .filter_map(|frame| frame.id.clone())
            .collect()
    }

    fn top(&mut self) -> Result<&mut Frame, RaisedError> {
        self.frames
            .last_mut()
            .ok_or_else(|| RaisedError::msg("no active frame"))
    }

    fn read(&mut self, slot: Slot) -> Result<Value, RaisedError> {
        Ok(self.top()?.slot(slot)?.clone())
    }

    fn push(&mut self, value: Value) -> Result<(), RaisedError> {
        self.top()?.slots.push(value);
        Ok(())
    }

    /// Deliver a produced value after the producing frame is gone: into
    /// the new top frame, or as the final result.
    fn deliver(&mut self, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => frame.slots.push(value),
            None => self.bottom = Some(value),
        }
    }

    fn exec_one(&mut self, ctx: &mut Context) -> Result<(), RaisedError> {
        let instr = {
            let frame = self.top()?;
            let instr = frame
                .code
                .get(frame.ip)
                .cloned()
                .ok_or_else(|| RaisedError::msg("instruction cursor out of bounds"))?;
            frame.ip += 1;
            instr
        };
        trace!(instr = %instr, "dispatch");
        match instr {
            Instr::ConstInt { value } => self.push(Value::Integer(value)),
            Instr::ConstReal { value } => self.push(Value::Real(value)),
            Instr::ConstSymbol { sym } => self.push(Value::Symbol(sym)),
            Instr::ConstStr { string } => self.push(Value::string(string)),
            Instr::ConstBindingSlot { slot } => self.push(Value::BindingSlot(slot)),

            Instr::Ret { slot } => {
                let value = self.read(slot)?;
                self.frames.pop();
                self.deliver(value);
                Ok(())
            }

            Instr::Call { func, arg } => {
                let callee = self.read(func)?;
                let argv = self.read(arg)?;
                match callee {
                    Value::Closure(closure) => {
                        self.frames.push(closure_frame(&closure, argv));
                        Ok(())
                    }
                    Value::Function(f) => {
                        let result = f.call(ctx, &argv)?;
                        self.push(result)
                    }
                    other => Err(badarg("call to non-function", &other)),
                }
            }

            Instr::Tail { func, arg } => {
                let callee = self.read(func)?;
                let argv = self.read(arg)?;
                self.frames.pop();
                match callee {
                    Value::Closure(closure) => {
                        self.frames.push(closure_frame(&closure, argv));
                        Ok(())
                    }
                    Value::Function(f) => {
                        let result = f.call(ctx, &argv)?;
                        self.deliver(result);
                        Ok(())
                    }
                    other => Err(badarg("call to non-function", &other)),
                }
            }

            Instr::CallMfa { module, func, args } => {
                let argv = self.arg_tuple(&args)?;
                match lookup_mfa(ctx, module, func, &argv)? {
                    Callable::Function(f) => {
                        let result = f.call(ctx, &Value::Tuple(argv))?;
                        self.push(result)
                    }
                    Callable::Closure(closure) => {
                        self.frames.push(closure_frame(&closure, Value::Tuple(argv)));
                        Ok(())
                    }
                }
            }

            Instr::TailMfa { module, func, args } => {
                let argv = self.arg_tuple(&args)?;
                let callable = lookup_mfa(ctx, module, func, &argv)?;
                self.frames.pop();
                match callable {
                    Callable::Function(f) => {
                        let result = f.call(ctx, &Value::Tuple(argv))?;
                        self.deliver(result);
                        Ok(())
                    }
                    Callable::Closure(closure) => {
                        self.frames.push(closure_frame(&closure, Value::Tuple(argv)));
                        Ok(())
                    }
                }
            }

            Instr::Add { a, b } => self.arith(a, b, "+"),
            Instr::Sub { a, b } => self.arith(a, b, "-"),
            Instr::Mul { a, b } => self.arith(a, b, "*"),
            Instr::Div { a, b } => self.arith(a, b, "/"),

            Instr::Negate { arg } => {
                let value = self.read(arg)?;
                let negated = match value {
                    Value::Integer(i) => Value::Integer(i.wrapping_neg()),
                    Value::Real(r) => Value::Real(-r),
                    other => return Err(badarith("-", &other)),
                };
                self.push(negated)
            }

            Instr::Eq { a, b } => {
                let eq = self.read(a)? == self.read(b)?;
                self.push(Value::bool_symbol(eq))
            }
            Instr::Neq { a, b } => {
                let eq = self.read(a)? == self.read(b)?;
                self.push(Value::bool_symbol(!eq))
            }

            Instr::Concat { a, b } => {
                let lhs = self.read(a)?;
                let rhs = self.read(b)?;
                let joined = match (&lhs, &rhs) {
                    (Value::String(l), Value::String(r)) => {
                        Value::string(format!("{l}{r}"))
                    }
                    (Value::List(l), Value::List(r)) => Value::List(List::concat(l, r)),
                    _ => {
                        return Err(RaisedError::new(Value::Tuple(Tuple::new(vec![
                            Value::symbol("badarg"),
                            Value::string(format!(
                                "cannot concatenate {} and {}",
                                lhs.kind_name(),
                                rhs.kind_name()
                            )),
                        ]))));
                    }
                };
                self.push(joined)
            }

            Instr::HardMatch { lhs, rhs } => {
                let pattern = self.read(lhs)?;
                let subject = self.read(rhs)?;
                let matched = match_into(&mut self.top()?.slots, &pattern, &subject)?;
                if matched {
                    Ok(())
                } else {
                    Err(nomatch(subject))
                }
            }
            Instr::TryMatch { lhs, rhs } => {
                let pattern = self.read(lhs)?;
                let subject = self.read(rhs)?;
                let matched = match_into(&mut self.top()?.slots, &pattern, &subject)?;
                self.top()?.test = matched;
                Ok(())
            }

            Instr::MkTuple0 => self.mk_tuple(&[]),
            Instr::MkTuple1 { a } => self.mk_tuple(&[a]),
            Instr::MkTuple2 { a, b } => self.mk_tuple(&[a, b]),
            Instr::MkTuple3 { a, b, c } => self.mk_tuple(&[a, b, c]),
            Instr::MkTuple4 { a, b, c, d } => self.mk_tuple(&[a, b, c, d]),
            Instr::MkTuple5 { a, b, c, d, e } => self.mk_tuple(&[a, b, c, d, e]),
            Instr::MkTuple6 { a, b, c, d, e, f } => self.mk_tuple(&[a, b, c, d, e, f]),
            Instr::MkTuple7 { a, b, c, d, e, f, g } => self.mk_tuple(&[a, b, c, d, e, f, g]),
            Instr::MkTupleN { slots } => self.mk_tuple(&slots),

            Instr::MkList { slots } => {
                let values = self.read_all(&slots)?;
                self.push(Value::List(values.into_iter().collect::<List>()))
            }

            Instr::MkMap { slots } => {
                let values = self.read_all(&slots)?;
                let mut map = Map::new();
                for pair in values.chunks(2) {
                    let [key, value] = pair else {
                        return Err(RaisedError::msg("mk_map with odd operand count"));
                    };
                    map = map.insert_or_update(key, value)?;
                }
                self.push(Value::Map(map))
            }

            Instr::MkClosure { code_begin, code_end: _, captures } => {
                let captured = self.read_all(&captures)?;
                let code = self.top()?.code.clone();
                let closure = Closure::new(code, code_begin.0, captured);
                self.push(Value::Closure(closure))
            }

            Instr::MkCons { head, tail } => {
                let head = self.read(head)?;
                let tail = self.read(tail)?;
                self.push(Value::Cons(Cons {
                    head: std::rc::Rc::new(head),
                    tail: std::rc::Rc::new(tail),
                }))
            }

            Instr::PushFront { elem, list } => {
                let elem = self.read(elem)?;
                let list = self.read(list)?;
                match list.as_list() {
                    Some(l) => self.push(Value::List(l.push_front(elem))),
                    None => Err(badarg("attempt to push to non-list", &list)),
                }
            }

            Instr::Jump { target } => {
                self.top()?.ip = target.0;
                Ok(())
            }
            Instr::FalseJump { target } => {
                let frame = self.top()?;
                if !frame.test {
                    frame.ip = target.0;
                }
                Ok(())
            }
            Instr::TestTrue { slot } => {
                let truthy = self.read(slot)?.as_symbol().is_some_and(|s| s.as_str() == "true");
                self.top()?.test = truthy;
                Ok(())
            }

            Instr::Rewind { slot } => {
                self.top()?.slots.truncate(slot.0);
                Ok(())
            }

            Instr::NoClause { subject } => {
                let value = self.read(subject)?;
                Err(nomatch(value))
            }

            Instr::Dot { object, attr } => {
                let object = self.read(object)?;
                let attr = self.read(attr)?;
                let Some(attr_sym) = attr.as_symbol() else {
                    return Err(badarg("attribute name must be a symbol", &attr));
                };
                let result = self.dot(ctx, &object, attr_sym)?;
                self.push(result)
            }

            Instr::IsList { arg } => {
                let is = matches!(self.read(arg)?, Value::List(_));
                self.push(Value::bool_symbol(is))
            }
            Instr::IsSymbol { arg } => {
                let is = matches!(self.read(arg)?, Value::Symbol(_));
                self.push(Value::bool_symbol(is))
            }
            Instr::IsString { arg } => {
                let is = matches!(self.read(arg)?, Value::String(_));
                self.push(Value::bool_symbol(is))
            }
            Instr::ToString { arg } => {
                let text = self.read(arg)?.to_string();
                self.push(Value::string(text))
            }
            Instr::Inspect { arg } => {
                let text = inspect(&self.read(arg)?);
                self.push(Value::string(text))
            }

            Instr::Raise { arg } => Err(RaisedError::new(self.read(arg)?)),

            Instr::FrameId { id } => {
                self.top()?.id = Some(id);
                Ok(())
            }
        }
    }

    fn read_all(&mut self, slots: &[Slot]) -> Result<Vec<Value>, RaisedError> {
        slots.iter().map(|&slot| self.read(slot)).collect()
    }

    fn arg_tuple(&mut self, slots: &[Slot]) -> Result<Tuple, RaisedError> {
        Ok(Tuple::new(self.read_all(slots)?))
    }

    fn mk_tuple(&mut self, slots: &[Slot]) -> Result<(), RaisedError> {
        let values = self.read_all(slots)?;
        self.push(Value::Tuple(Tuple::new(values)))
    }

    fn arith(&mut self, a: Slot, b: Slot, op: &'static str) -> Result<(), RaisedError> {
        let lhs = self.read(a)?;
        let rhs = self.read(b)?;
        let result = match (&lhs, &rhs) {
            (Value::Integer(l), Value::Integer(r)) => match op {
                "+" => Value::Integer(l.wrapping_add(*r)),
                "-" => Value::Integer(l.wrapping_sub(*r)),
                "*" => Value::Integer(l.wrapping_mul(*r)),
                _ => {
                    if *r == 0 {
                        return Err(RaisedError::new(Value::Tuple(Tuple::new(vec![
                            Value::symbol("badarith"),
                            Value::string("division by zero"),
                        ]))));
                    }
                    Value::Integer(l.wrapping_div(*r))
                }
            },
            (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => {
                let l = as_real(&lhs);
                let r = as_real(&rhs);
                match op {
                    "+" => Value::Real(l + r),
                    "-" => Value::Real(l - r),
                    "*" => Value::Real(l * r),
                    _ => Value::Real(l / r),
                }
            }
            _ => {
                let offender = if lhs.as_integer().is_none() && lhs.as_real().is_none() {
                    &lhs
                } else {
                    &rhs
                };
                return Err(badarith(op, offender));
            }
        };
        self.push(result)
    }

    /// The three faces of `dot`: module function lookup on a symbol,
    /// reflected member access on a boxed value, key lookup on a map.
    fn dot(
        &mut self,
        ctx: &mut Context,
        object: &Value,
        attr: Symbol,
    ) -> Result<Value, RaisedError> {
        match object {
            Value::Symbol(module_name) => {
                let module = ctx.get_module(module_name.as_str()).ok_or_else(|| {
                    RaisedError::new(Value::Tuple(Tuple::new(vec![
                        Value::symbol("badarg"),
                        Value::string(format!("no such module {}", module_name.as_str())),
                    ])))
                })?;
                let callable = module.get_function(attr.as_str()).ok_or_else(|| {
                    RaisedError::new(Value::Tuple(Tuple::new(vec![
                        Value::symbol("badarg"),
                        Value::string(format!(
                            "{}.{}",
                            module_name.as_str(),
                            attr.as_str()
                        )),
                    ])))
                })?;
                Ok(callable.into())
            }
            Value::Map(map) => map
                .find(&Value::Symbol(attr))?
                .cloned()
                .ok_or_else(|| {
                    RaisedError::new(Value::Tuple(Tuple::new(vec![
                        Value::symbol("badkey"),
                        Value::Symbol(attr),
                    ])))
                }),
            Value::Boxed(boxed) => boxed.get_member(attr.as_str()).ok_or_else(|| {
                RaisedError::msg(format!(
                    "boxed {} has no member '{}'",
                    boxed.type_name(),
                    attr.as_str()
                ))
            }),
            other => Err(badarg("invalid operand to dot", other)),
        }
    }
}

fn closure_frame(closure: &Closure, arg: Value) -> Frame {
    let mut slots = Vec::with_capacity(closure.captures().len() + 1);
    slots.extend_from_slice(closure.captures());
    slots.push(arg);
    Frame::new(closure.code().clone(), closure.entry(), slots)
}

fn lookup_mfa(
    ctx: &Context,
    module: Symbol,
    func: Symbol,
    args: &Tuple,
) -> Result<Callable, RaisedError> {
    let not_found = || {
        RaisedError::new(Value::Tuple(Tuple::new(vec![
            Value::symbol("badarg"),
            Value::string(format!("{}.{}", module.as_str(), func.as_str())),
            Value::Tuple(args.clone()),
        ])))
    };
    let module_handle = ctx.get_module(module.as_str()).ok_or_else(not_found)?;
    module_handle.get_function(func.as_str()).ok_or_else(not_found)
}

fn as_real(value: &Value) -> f64 {
    match value {
        Value::Integer(i) => *i as f64,
        Value::Real(r) => *r,
        _ => 0.0,
    }
}

fn badarith(op: &str, offender: &Value) -> RaisedError {
    RaisedError::new(Value::Tuple(Tuple::new(vec![
        Value::symbol("badarith"),
        Value::string(format!("invalid {} operand: {}", op, inspect(offender))),
    ])))
}

fn badarg(message: &str, offender: &Value) -> RaisedError {
    RaisedError::new(Value::Tuple(Tuple::new(vec![
        Value::symbol("badarg"),
        Value::string(message),
        offender.clone(),
    ])))
}

fn nomatch(subject: Value) -> RaisedError {
    RaisedError::new(Value::Tuple(Tuple::new(vec![
        Value::symbol("nomatch"),
        subject,
    ])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lix_core::code::InstOffset;

    fn run(instrs: Vec<Instr>) -> Result<Value, RaisedError> {
        let mut ctx = Context::new();
        Executor::new(Code::new(instrs)).execute_all(&mut ctx)
    }

    #[test]
    fn arithmetic_dispatch() {
        let result = run(vec![
            Instr::ConstInt { value: 2 },
            Instr::ConstInt { value: 6 },
            Instr::ConstInt { value: 2 },
            Instr::Sub { a: Slot(1), b: Slot(2) },
            Instr::Add { a: Slot(0), b: Slot(3) },
            Instr::Ret { slot: Slot(4) },
        ])
        .unwrap();
        assert_eq!(result, Value::Integer(6));
    }

    #[test]
    fn mixed_arithmetic_is_real() {
        let result = run(vec![
            Instr::ConstInt { value: 1 },
            Instr::ConstReal { value: 0.5 },
            Instr::Add { a: Slot(0), b: Slot(1) },
            Instr::Ret { slot: Slot(2) },
        ])
        .unwrap();
        assert_eq!(result, Value::Real(1.5));
    }

    #[test]
    fn integer_division_truncates_and_raises_on_zero() {
        let result = run(vec![
            Instr::ConstInt { value: 7 },
            Instr::ConstInt { value: 2 },
            Instr::Div { a: Slot(0), b: Slot(1) },
            Instr::Ret { slot: Slot(2) },
        ])
        .unwrap();
        assert_eq!(result, Value::Integer(3));

        let err = run(vec![
            Instr::ConstInt { value: 1 },
            Instr::ConstInt { value: 0 },
            Instr::Div { a: Slot(0), b: Slot(1) },
            Instr::Ret { slot: Slot(2) },
        ])
        .unwrap_err();
        let tuple = err.value().as_tuple().unwrap();
        assert_eq!(tuple.get(0), Some(&Value::symbol("badarith")));
    }

    #[test]
    fn execute_n_reports_progress() {
        let mut ctx = Context::new();
        let mut ex = Executor::new(Code::new(vec![
            Instr::ConstInt { value: 1 },
            Instr::Ret { slot: Slot(0) },
        ]));
        assert_eq!(ex.execute_n(&mut ctx, 1).unwrap(), None);
        assert_eq!(ex.execute_n(&mut ctx, 1).unwrap(), Some(Value::Integer(1)));
    }

    #[test]
    fn rewind_truncates_and_slots_renumber() {
        let result = run(vec![
            Instr::ConstInt { value: 1 },
            Instr::ConstInt { value: 2 },
            Instr::Rewind { slot: Slot(1) },
            Instr::ConstInt { value: 3 },
            Instr::Ret { slot: Slot(1) },
        ])
        .unwrap();
        assert_eq!(result, Value::Integer(3));
    }

    #[test]
    fn closure_captures_are_a_snapshot() {
        // Build a closure over slot 0, then return it.
        let code = Code::new(vec![
            Instr::ConstInt { value: 12 },
            Instr::Jump { target: InstOffset(4) },
            Instr::ConstInt { value: 0 }, // arg slot placeholder (entry)
            Instr::Ret { slot: Slot(0) },
            Instr::MkClosure {
                code_begin: InstOffset(2),
                code_end: InstOffset(4),
                captures: vec![Slot(0)],
            },
            Instr::Ret { slot: Slot(1) },
        ]);
        let mut ctx = Context::new();
        let result = Executor::new(code).execute_all(&mut ctx).unwrap();
        let closure = result.as_closure().unwrap();
        assert_eq!(closure.captures(), &[Value::Integer(12)]);
        // Invoking it returns the captured value.
        let mut ex = Executor::from_closure(closure, Value::Tuple(Tuple::new(vec![])));
        assert_eq!(ex.execute_all(&mut ctx).unwrap(), Value::Integer(12));
    }

    #[test]
    fn test_true_drives_false_jump() {
        let result = run(vec![
            Instr::ConstSymbol { sym: Symbol::intern("false") },
            Instr::TestTrue { slot: Slot(0) },
            Instr::FalseJump { target: InstOffset(5) },
            Instr::ConstInt { value: 1 },
            Instr::Ret { slot: Slot(1) },
            Instr::ConstInt { value: 2 },
            Instr::Ret { slot: Slot(1) },
        ])
        .unwrap();
        assert_eq!(result, Value::Integer(2));
    }

    #[test]
    fn no_clause_raises_nomatch() {
        let err = run(vec![
            Instr::ConstInt { value: 5 },
            Instr::NoClause { subject: Slot(0) },
        ])
        .unwrap_err();
        let tuple = err.value().as_tuple().unwrap();
        assert_eq!(tuple.get(0), Some(&Value::symbol("nomatch")));
        assert_eq!(tuple.get(1), Some(&Value::Integer(5)));
    }
}
