//! Structural pattern matching.
//!
//! A pattern is an ordinary `Value` that may contain binding-slot markers
//! and cons cells. Matching walks the pattern and the subject together,
//! writing bound values into the current frame's slot array.

use lix_core::code::Slot;
use lix_core::raise::RaisedError;
use lix_core::value::Value;

/// Match `pattern` against `subject`, binding into `slots`. Returns
/// whether the match succeeded; bindings made before a failure stay
/// written (the compiler rewinds them between clauses).
pub fn match_into(
    slots: &mut [Value],
    pattern: &Value,
    subject: &Value,
) -> Result<bool, RaisedError> {
    match pattern {
        Value::BindingSlot(slot) => bind_slot(slots, *slot, subject),
        Value::Tuple(lhs) => {
            let Some(rhs) = subject.as_tuple() else {
                return Ok(false);
            };
            if lhs.len() != rhs.len() {
                return Ok(false);
            }
            for (l, r) in lhs.iter().zip(rhs.iter()) {
                if !match_into(slots, l, r)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Value::Cons(cons) => {
            let Some(list) = subject.as_list() else {
                return Ok(false);
            };
            let Some(head) = list.head() else {
                return Ok(false);
            };
            if !match_into(slots, &cons.head, head)? {
                return Ok(false);
            }
            match_into(slots, &cons.tail, &Value::List(list.pop_front()))
        }
        Value::List(lhs) => {
            let Some(rhs) = subject.as_list() else {
                return Ok(false);
            };
            if lhs.len() != rhs.len() {
                return Ok(false);
            }
            for (l, r) in lhs.iter().zip(rhs.iter()) {
                if !match_into(slots, l, r)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        other => Ok(other == subject),
    }
}

/// First occurrence of a variable binds; a later occurrence in the same
/// pattern sees the already-bound slot and degrades to an equality test.
fn bind_slot(slots: &mut [Value], slot: Slot, subject: &Value) -> Result<bool, RaisedError> {
    let dest = slots
        .get_mut(slot.0)
        .ok_or_else(|| RaisedError::msg(format!("binding slot ${} out of range", slot.0)))?;
    if matches!(dest, Value::BindingSlot(_)) {
        *dest = subject.clone();
        Ok(true)
    } else {
        Ok(&*dest == subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lix_core::list::List;
    use lix_core::tuple::Tuple;
    use std::rc::Rc;

    fn marker(i: usize) -> Value {
        Value::BindingSlot(Slot(i))
    }

    #[test]
    fn binding_slot_binds() {
        let mut slots = vec![marker(0)];
        let pattern = marker(0);
        assert!(match_into(&mut slots, &pattern, &Value::Integer(7)).unwrap());
        assert_eq!(slots[0], Value::Integer(7));
    }

    #[test]
    fn tuples_match_pairwise() {
        let mut slots = vec![marker(0)];
        let pattern = Value::Tuple(Tuple::new(vec![
            marker(0),
            Value::Integer(2),
            Value::Integer(3),
        ]));
        let subject = Value::Tuple(Tuple::new(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
        ]));
        assert!(match_into(&mut slots, &pattern, &subject).unwrap());
        assert_eq!(slots[0], Value::Integer(1));
    }

    #[test]
    fn tuple_arity_mismatch_fails() {
        let mut slots = Vec::new();
        let pattern = Value::Tuple(Tuple::new(vec![Value::Integer(1)]));
        let subject = Value::Tuple(Tuple::new(vec![Value::Integer(1), Value::Integer(2)]));
        assert!(!match_into(&mut slots, &pattern, &subject).unwrap());
    }

    #[test]
    fn repeated_variable_requires_equal_values() {
        // {k, k} against {:a, :b} fails; against {:a, :a} succeeds.
        let mut slots = vec![marker(0)];
        let pattern = Value::Tuple(Tuple::new(vec![marker(0), marker(0)]));
        let subject = Value::Tuple(Tuple::new(vec![Value::symbol("a"), Value::symbol("b")]));
        assert!(!match_into(&mut slots, &pattern, &subject).unwrap());

        let mut slots = vec![marker(0)];
        let subject = Value::Tuple(Tuple::new(vec![Value::symbol("a"), Value::symbol("a")]));
        assert!(match_into(&mut slots, &pattern, &subject).unwrap());
        assert_eq!(slots[0], Value::symbol("a"));
    }

    #[test]
    fn cons_destructures_head_and_tail() {
        let mut slots = vec![marker(0), marker(1)];
        let pattern = Value::Cons(lix_core::value::Cons {
            head: Rc::new(marker(0)),
            tail: Rc::new(marker(1)),
        });
        let subject = Value::List(
            [Value::Integer(1), Value::Integer(2)]
                .into_iter()
                .collect::<List>(),
        );
        assert!(match_into(&mut slots, &pattern, &subject).unwrap());
        assert_eq!(slots[0], Value::Integer(1));
        let bound_tail = slots[1].as_list().unwrap();
        assert_eq!(bound_tail.len(), 1);
    }

    #[test]
    fn cons_rejects_empty_lists() {
        let mut slots = vec![marker(0), marker(1)];
        let pattern = Value::Cons(lix_core::value::Cons {
            head: Rc::new(marker(0)),
            tail: Rc::new(marker(1)),
        });
        assert!(!match_into(&mut slots, &pattern, &Value::List(List::new())).unwrap());
    }

    #[test]
    fn plain_values_compare_structurally() {
        let mut slots = Vec::new();
        assert!(match_into(&mut slots, &Value::symbol("ok"), &Value::symbol("ok")).unwrap());
        assert!(!match_into(&mut slots, &Value::symbol("ok"), &Value::symbol("no")).unwrap());
    }
}
