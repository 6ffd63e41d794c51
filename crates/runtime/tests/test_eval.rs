//! End-to-end evaluation tests: source text in, final value out.

use lix_core::value::Value;
use lix_runtime::eval;

fn eval_ok(src: &str) -> Value {
    eval(src).unwrap_or_else(|e| panic!("eval failed for {src:?}:\n{e}"))
}

fn eval_raised(src: &str) -> Value {
    match eval(src) {
        Err(lix_runtime::Error::Raised(raised)) => raised.value().clone(),
        Ok(v) => panic!("expected a raise for {src:?}, got {v}"),
        Err(other) => panic!("expected a raise for {src:?}, got {other}"),
    }
}

#[test]
fn arithmetic_with_grouping() {
    assert_eq!(eval_ok("2 + (6 - 2)"), Value::Integer(6));
}

#[test]
fn integer_arithmetic_truncates() {
    assert_eq!(eval_ok("7 / 2"), Value::Integer(3));
    assert_eq!(eval_ok("2 * 3 + 10 / 5"), Value::Integer(8));
}

#[test]
fn mixed_arithmetic_is_real() {
    assert_eq!(eval_ok("1 + 0.5"), Value::Real(1.5));
    assert_eq!(eval_ok("7.0 / 2"), Value::Real(3.5));
}

#[test]
fn division_by_zero_raises() {
    let raised = eval_raised("1 / 0");
    let tuple = raised.as_tuple().unwrap();
    assert_eq!(tuple.get(0), Some(&Value::symbol("badarith")));
}

#[test]
fn tuple_destructuring_binds() {
    assert_eq!(
        eval_ok("tup = {1,2,3}; {first,2,3} = tup; first + 45"),
        Value::Integer(46)
    );
}

#[test]
fn failed_hard_match_raises_nomatch() {
    let raised = eval_raised("{1, 2} = {1, 3}");
    let tuple = raised.as_tuple().unwrap();
    assert_eq!(tuple.get(0), Some(&Value::symbol("nomatch")));
}

#[test]
fn case_selects_matching_clause() {
    assert_eq!(
        eval_ok("case :cxx do :c -> 'C'; :cxx -> 'C++' end"),
        Value::string("C++")
    );
}

#[test]
fn case_binds_pattern_variables() {
    assert_eq!(
        eval_ok("case {:ok, 5} do {:error, _} -> 0; {:ok, n} -> n + 1 end"),
        Value::Integer(6)
    );
}

#[test]
fn case_without_matching_clause_raises() {
    let raised = eval_raised("case 5 do 1 -> nil end");
    let tuple = raised.as_tuple().unwrap();
    assert_eq!(tuple.get(0), Some(&Value::symbol("nomatch")));
    assert_eq!(tuple.get(1), Some(&Value::Integer(5)));
}

#[test]
fn cond_runs_first_truthy_clause() {
    assert_eq!(
        eval_ok("x = 4; cond do x == 3 -> :three; x == 4 -> :four end"),
        Value::symbol("four")
    );
}

#[test]
fn anonymous_functions_capture_and_apply() {
    assert_eq!(
        eval_ok("value = 12; f = fn 1,55 -> value + 3 end; f.(1,55)"),
        Value::Integer(15)
    );
}

#[test]
fn closure_captures_are_snapshots() {
    // Rebinding x after the closure is built does not affect it.
    assert_eq!(
        eval_ok("x = 12; f = fn -> x end; x = 99; f.()"),
        Value::Integer(12)
    );
}

#[test]
fn fn_clauses_dispatch_on_arguments() {
    assert_eq!(
        eval_ok("f = fn 0 -> :zero; n -> n end; {f.(0), f.(9)}"),
        eval_ok("{:zero, 9}")
    );
}

#[test]
fn fn_argument_arity_mismatch_raises() {
    let raised = eval_raised("f = fn 1 -> :one end; f.(1, 2)");
    let tuple = raised.as_tuple().unwrap();
    assert_eq!(tuple.get(0), Some(&Value::symbol("nomatch")));
}

#[test]
fn defmodule_defines_callable_functions() {
    assert_eq!(
        eval_ok("defmodule M do def g(v), do: v + 42 end; M.g(13)"),
        Value::Integer(55)
    );
}

#[test]
fn module_functions_can_call_siblings() {
    assert_eq!(
        eval_ok(
            "defmodule M do
               def double(v), do: v * 2
               def quad(v), do: double(double(v))
             end
             M.quad(4)"
        ),
        Value::Integer(16)
    );
}

#[test]
fn module_functions_with_multiple_defs_form_clauses() {
    assert_eq!(
        eval_ok(
            "defmodule Fact do
               def fact(0), do: 1
               def fact(n), do: n * fact(n - 1)
             end
             Fact.fact(5)"
        ),
        Value::Integer(120)
    );
}

#[test]
fn cons_builds_lists() {
    let result = eval_ok("list = [:dog,:bird]; [:cat | list]");
    let list = result.as_list().unwrap();
    let items: Vec<&Value> = list.iter().collect();
    assert_eq!(
        items,
        [
            &Value::symbol("cat"),
            &Value::symbol("dog"),
            &Value::symbol("bird")
        ]
    );
}

#[test]
fn cons_destructures_lists() {
    assert_eq!(
        eval_ok("[h | t] = [10, 20, 30]; {h, t}"),
        eval_ok("{10, [20, 30]}")
    );
}

#[test]
fn deep_recursion_does_not_grow_the_frame_stack() {
    assert_eq!(
        eval_ok("tail = fn 0,_ -> 42; v,t -> t.(v-1,t) end; tail.(100000, tail)"),
        Value::Integer(42)
    );
}

#[test]
fn module_tail_recursion_is_bounded() {
    assert_eq!(
        eval_ok(
            "defmodule Count do
               def down(0), do: :done
               def down(n), do: down(n - 1)
             end
             Count.down(100000)"
        ),
        Value::symbol("done")
    );
}

#[test]
fn match_rebinds_and_rhs_sees_the_old_binding() {
    assert_eq!(eval_ok("x = 1; x = 9; x"), Value::Integer(9));
    assert_eq!(eval_ok("x = 1; x = x + 1; x"), Value::Integer(2));
}

#[test]
fn pattern_linearity_requires_equal_values() {
    assert_eq!(eval_ok("{k, k} = {:a, :a}; k"), Value::symbol("a"));
    let raised = eval_raised("{k, k} = {:a, :b}");
    let tuple = raised.as_tuple().unwrap();
    assert_eq!(tuple.get(0), Some(&Value::symbol("nomatch")));
}

#[test]
fn string_and_list_concat() {
    assert_eq!(eval_ok("'foo' ++ 'bar'"), Value::string("foobar"));
    assert_eq!(eval_ok("[1] ++ [2, 3]"), eval_ok("[1, 2, 3]"));
}

#[test]
fn equality_operators_yield_bool_symbols() {
    assert_eq!(eval_ok("1 == 1"), Value::symbol("true"));
    assert_eq!(eval_ok("1 == 2"), Value::symbol("false"));
    assert_eq!(eval_ok("1 != 2"), Value::symbol("true"));
}

#[test]
fn raise_surfaces_the_value() {
    assert_eq!(eval_raised("raise :boom"), Value::symbol("boom"));
    assert_eq!(
        eval_raised("raise {:error, 'oops'}"),
        eval_ok("{:error, 'oops'}")
    );
}

#[test]
fn tracebacks_name_module_functions() {
    let err = match eval("defmodule M do def boom(), do: raise :bad end; M.boom()") {
        Err(lix_runtime::Error::Raised(raised)) => raised,
        other => panic!("expected raise, got {other:?}"),
    };
    assert!(err.traceback().iter().any(|frame| frame == "M.boom"));
}

#[test]
fn quote_turns_code_into_data() {
    // The quoted call is the {target, meta, args} triple.
    let quoted = eval_ok("quote do 1 + 2 end");
    let tuple = quoted.as_tuple().unwrap();
    assert_eq!(tuple.len(), 3);
    assert_eq!(tuple.get(0), Some(&Value::symbol("+")));
    assert_eq!(
        tuple.get(1).and_then(Value::as_list).map(|l| l.len()),
        Some(0)
    );
    let args: Vec<&Value> = tuple.get(2).unwrap().as_list().unwrap().iter().collect();
    assert_eq!(args, [&Value::Integer(1), &Value::Integer(2)]);
}

#[test]
fn variable_references_see_quoted_form() {
    let value = eval_ok("quote do x end");
    let tuple = value.as_tuple().unwrap();
    assert_eq!(tuple.get(0), Some(&Value::symbol("x")));
    assert_eq!(tuple.get(2), Some(&Value::symbol("Var")));
}

#[test]
fn map_literals_and_access() {
    assert_eq!(eval_ok("m = %{:a => 1, :b => 2}; m.b"), Value::Integer(2));
    let raised = eval_raised("m = %{:a => 1}; m.zzz");
    let tuple = raised.as_tuple().unwrap();
    assert_eq!(tuple.get(0), Some(&Value::symbol("badkey")));
}

#[test]
fn kernel_map_helpers() {
    assert_eq!(
        eval_ok("m = %{:a => 1}; m2 = Kernel.__map_put(m, :b, 2); m2.b"),
        Value::Integer(2)
    );
    assert_eq!(
        eval_ok("Kernel.__map_fetch(%{:a => 1}, :a)"),
        eval_ok("{:ok, 1}")
    );
    assert_eq!(
        eval_ok("Kernel.__map_fetch(%{:a => 1}, :b)"),
        Value::symbol("error")
    );
}

#[test]
fn if_macro_selects_branches() {
    assert_eq!(eval_ok("if 1 == 1 do :yes else :no end"), Value::symbol("yes"));
    assert_eq!(eval_ok("if 1 == 2 do :yes else :no end"), Value::symbol("no"));
    assert_eq!(eval_ok("if 1 == 2 do :yes end"), Value::symbol("nil"));
    assert_eq!(eval_ok("if 1 == 1, do: :yes, else: :no"), Value::symbol("yes"));
}

#[test]
fn pipe_through_stdlib() {
    assert_eq!(
        eval_ok("'a-b' |> String.replace('-', '+')"),
        Value::string("a+b")
    );
}

#[test]
fn capture_shorthand_builds_functions() {
    assert_eq!(eval_ok("inc = &(&1 + 1); inc.(41)"), Value::Integer(42));
    assert_eq!(eval_ok("add = &(&1 + &2); add.(40, 2)"), Value::Integer(42));
}

#[test]
fn intrinsic_type_tests() {
    assert_eq!(eval_ok("is_list([1])"), Value::symbol("true"));
    assert_eq!(eval_ok("is_list(1)"), Value::symbol("false"));
    assert_eq!(eval_ok("is_symbol(:a)"), Value::symbol("true"));
    assert_eq!(eval_ok("is_string('s')"), Value::symbol("true"));
}

#[test]
fn to_string_and_inspect_forms() {
    assert_eq!(eval_ok("to_string(42)"), Value::string("42"));
    assert_eq!(eval_ok("to_string(:sym)"), Value::string(":sym"));
    assert_eq!(eval_ok("inspect('s')"), Value::string("\"s\""));
}

#[test]
fn enum_module_reenters_the_vm() {
    assert_eq!(
        eval_ok("Enum.map([1, 2, 3], fn x -> x * 2 end)"),
        eval_ok("[2, 4, 6]")
    );
    assert_eq!(
        eval_ok("Enum.reduce([1, 2, 3], 0, fn x, acc -> x + acc end)"),
        Value::Integer(6)
    );
    assert_eq!(eval_ok("Enum.count([:a, :b])"), Value::Integer(2));
    assert_eq!(
        eval_ok("Enum.each([1], fn _ -> :ignored end)"),
        Value::symbol("ok")
    );
}

#[test]
fn string_module_functions() {
    assert_eq!(eval_ok("String.length('hello')"), Value::Integer(5));
    assert_eq!(
        eval_ok("String.split('a,b', ',')"),
        eval_ok("['a', 'b']")
    );
    assert_eq!(eval_ok("String.find_pattern('hello', 'll')"), Value::Integer(2));
}

#[test]
fn alias_rewrites_module_names() {
    assert_eq!(
        eval_ok("alias Very.Deep.Name\nName"),
        Value::symbol("Very.Deep.Name")
    );
}

#[test]
fn unbound_variables_fail_at_compile_time() {
    match eval("nope + 1") {
        Err(lix_runtime::Error::Compile(e)) => {
            assert!(e.message.contains("unbound variable 'nope'"));
        }
        other => panic!("expected compile error, got {other:?}"),
    }
}

#[test]
fn blocks_evaluate_to_their_last_expression() {
    assert_eq!(eval_ok("1; 2; 3"), Value::Integer(3));
    assert_eq!(eval_ok("a = 1\nb = a + 1\nb * 10"), Value::Integer(20));
}

#[test]
fn nested_case_rewinds_slots_cleanly() {
    assert_eq!(
        eval_ok(
            "outer = case 1 do 1 -> case :x do :x -> :inner end end
             {outer, case 2 do 2 -> :second end}"
        ),
        eval_ok("{:inner, :second}")
    );
}
