//! The `IO` module.

use lix_core::module::Module;
use lix_core::value::inspect;

use crate::args::ArgumentParser;

pub fn io_module() -> Module {
    let module = Module::new();
    module.add_function("puts", |_ctx, args| {
        let args = ArgumentParser::new(args)?;
        let text = args.nth_string(0)?;
        println!("{text}");
        Ok(lix_core::value::Value::symbol("ok"))
    });
    // Prints the inspected form and passes the value through.
    module.add_function("inspect", |_ctx, args| {
        let args = ArgumentParser::new(args)?;
        let value = args.nth(0)?;
        println!("{}", inspect(value));
        Ok(value.clone())
    });
    module
}
