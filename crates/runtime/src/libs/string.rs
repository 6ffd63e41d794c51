//! The `String` module.

use lix_core::list::List;
use lix_core::module::Module;
use lix_core::raise::RaisedError;
use lix_core::tuple::Tuple;
use lix_core::value::Value;

use crate::args::ArgumentParser;

fn einval(message: &str) -> RaisedError {
    RaisedError::new(Value::Tuple(Tuple::new(vec![
        Value::symbol("einval"),
        Value::string(message),
    ])))
}

pub fn string_module() -> Module {
    let module = Module::new();

    module.add_function("length", |_ctx, args| {
        let args = ArgumentParser::new(args)?;
        let text = args.nth_string(0)?;
        Ok(Value::Integer(text.chars().count() as i64))
    });

    module.add_function("split", |_ctx, args| {
        let args = ArgumentParser::new(args)?;
        let text = args.nth_string(0)?;
        let pattern = args.nth_string(1)?;
        if pattern.is_empty() {
            return Err(einval("Split pattern must not be empty"));
        }
        let parts: List = text.split(pattern).map(Value::from).collect();
        Ok(Value::List(parts))
    });

    module.add_function("replace", |_ctx, args| {
        let args = ArgumentParser::new(args)?;
        let subject = args.nth_string(0)?;
        let pattern = args.nth_string(1)?;
        let replacement = args.nth_string(2)?;
        if pattern.is_empty() {
            return Err(einval("Replace pattern must not be empty"));
        }
        Ok(Value::string(subject.replace(pattern, replacement)))
    });

    // Byte offset of the first matching pattern, or :nil. The pattern may
    // be a single string or a list of candidate strings.
    module.add_function("find_pattern", |_ctx, args| {
        let args = ArgumentParser::new(args)?;
        let text = args.nth_string(0)?;
        let pattern = args.nth(1)?;
        match pattern {
            Value::String(needle) => Ok(match text.find(needle.as_ref()) {
                Some(pos) => Value::Integer(pos as i64),
                None => Value::symbol("nil"),
            }),
            Value::List(candidates) => {
                for candidate in candidates {
                    let needle = candidate.as_str().ok_or_else(|| {
                        einval("Elements of pattern list must be strings")
                    })?;
                    if let Some(pos) = text.find(needle) {
                        return Ok(Value::Integer(pos as i64));
                    }
                }
                Ok(Value::symbol("nil"))
            }
            _ => Err(einval("Invalid pattern for String.find_pattern()")),
        }
    });

    module
}
