//! Native standard-library modules: thin host wrappers registered on a
//! kernel context.

mod enumerable;
mod io;
mod string;

use lix_core::context::Context;

use crate::kernel::build_kernel_context;

/// The library-loaded context the eval driver runs user programs in.
pub fn create_context() -> Context {
    let mut ctx = build_kernel_context();
    ctx.register_module("IO", io::io_module())
        .unwrap_or_else(|_| unreachable!("fresh context cannot have IO"));
    ctx.register_module("String", string::string_module())
        .unwrap_or_else(|_| unreachable!("fresh context cannot have String"));
    ctx.register_module("Enum", enumerable::enum_module())
        .unwrap_or_else(|_| unreachable!("fresh context cannot have Enum"));
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_context_registers_modules() {
        let ctx = create_context();
        assert!(ctx.get_module("IO").is_some());
        assert!(ctx.get_module("String").is_some());
        assert!(ctx.get_module("Enum").is_some());
        assert!(ctx.get_module("Kernel").is_some());
    }
}
