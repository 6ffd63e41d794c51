//! The `Enum` module: list traversal driven from the host, re-entering
//! the executor to apply the user's function to each element.

use lix_core::context::Context;
use lix_core::list::List;
use lix_core::module::Module;
use lix_core::raise::RaisedError;
use lix_core::tuple::Tuple;
use lix_core::value::Value;

use crate::args::ArgumentParser;
use crate::eval::{apply_closure, apply_function};

/// Apply a callable value to a packed argument tuple.
fn apply_value(ctx: &mut Context, callable: &Value, args: Tuple) -> Result<Value, RaisedError> {
    match callable {
        Value::Closure(c) => apply_closure(ctx, c, args),
        Value::Function(f) => apply_function(ctx, f, args),
        other => Err(RaisedError::msg(format!(
            "Enum expects a function, got {}",
            other.kind_name()
        ))),
    }
}

pub fn enum_module() -> Module {
    let module = Module::new();

    module.add_function("map", |ctx, args| {
        let args = ArgumentParser::new(args)?;
        let list = args.nth_list(0)?.clone();
        let func = args.nth(1)?.clone();
        let mut mapped = Vec::with_capacity(list.len());
        for element in &list {
            mapped.push(apply_value(ctx, &func, Tuple::new(vec![element.clone()]))?);
        }
        Ok(Value::List(mapped.into_iter().collect::<List>()))
    });

    module.add_function("reduce", |ctx, args| {
        let args = ArgumentParser::new(args)?;
        let list = args.nth_list(0)?.clone();
        let mut acc = args.nth(1)?.clone();
        let func = args.nth(2)?.clone();
        for element in &list {
            acc = apply_value(ctx, &func, Tuple::new(vec![element.clone(), acc]))?;
        }
        Ok(acc)
    });

    module.add_function("each", |ctx, args| {
        let args = ArgumentParser::new(args)?;
        let list = args.nth_list(0)?.clone();
        let func = args.nth(1)?.clone();
        for element in &list {
            apply_value(ctx, &func, Tuple::new(vec![element.clone()]))?;
        }
        Ok(Value::symbol("ok"))
    });

    module.add_function("count", |_ctx, args| {
        let args = ArgumentParser::new(args)?;
        Ok(Value::Integer(args.nth_list(0)?.len() as i64))
    });

    module
}
