//! Host interop: boxed values with reflected members, and applying
//! language callables from host code.

use lix_core::boxed::{Boxed, HostType, box_cast};
use lix_core::module::Module;
use lix_core::tuple::Tuple;
use lix_core::value::Value;
use lix_runtime::{apply_closure, call_mfa, create_context, eval_in};

struct Point {
    x: i64,
    y: i64,
}

impl HostType for Point {
    fn type_name() -> &'static str {
        "Point"
    }

    fn getters() -> &'static [(&'static str, fn(&Self) -> Value)] {
        &[
            ("x", |p: &Point| Value::Integer(p.x)),
            ("y", |p: &Point| Value::Integer(p.y)),
        ]
    }
}

struct Other;

impl HostType for Other {
    fn type_name() -> &'static str {
        "Other"
    }
}

#[test]
fn dot_reads_reflected_members_of_boxed_values() {
    let mut ctx = create_context();
    let module = Module::new();
    module.add_function("origin", |_ctx, _args| {
        Ok(Value::Boxed(Boxed::new(Point { x: 3, y: 4 })))
    });
    ctx.register_module("Geo", module).unwrap();
    let result = eval_in("p = Geo.origin(); p.x + p.y", &mut ctx).unwrap();
    assert_eq!(result, Value::Integer(7));
}

#[test]
fn dot_on_missing_member_raises() {
    let mut ctx = create_context();
    let module = Module::new();
    module.add_function("origin", |_ctx, _args| {
        Ok(Value::Boxed(Boxed::new(Point { x: 0, y: 0 })))
    });
    ctx.register_module("Geo", module).unwrap();
    let err = eval_in("Geo.origin().z", &mut ctx).unwrap_err();
    assert!(err.to_string().contains("no member 'z'"));
}

#[test]
fn box_cast_checks_the_runtime_type_tag() {
    let boxed = Boxed::new(Point { x: 1, y: 2 });
    assert_eq!(box_cast::<Point>(&boxed).unwrap().x, 1);
    let err = box_cast::<Other>(&boxed).map(|_| ()).unwrap_err();
    assert!(err.to_string().contains("'Point'"));
    assert!(err.to_string().contains("'Other'"));
}

#[test]
fn closures_returned_to_the_host_can_be_applied() {
    let mut ctx = create_context();
    let value = eval_in("fn x -> x * 2 end", &mut ctx).unwrap();
    let closure = value.as_closure().unwrap();
    let result = apply_closure(&mut ctx, closure, Tuple::new(vec![Value::Integer(21)])).unwrap();
    assert_eq!(result, Value::Integer(42));
}

#[test]
fn call_mfa_reaches_registered_modules() {
    let mut ctx = create_context();
    let result = call_mfa(
        &mut ctx,
        "String",
        "length",
        Tuple::new(vec![Value::string("abc")]),
    )
    .unwrap();
    assert_eq!(result, Value::Integer(3));
    assert!(call_mfa(&mut ctx, "Nope", "f", Tuple::new(Vec::new())).is_err());
}
