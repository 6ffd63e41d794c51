//! The lix runtime: a stack-frame virtual machine over the bytecode the
//! compiler emits, the structural pattern matcher, the `Kernel` and
//! `__lix` bootstrap modules, native stdlib modules, and the end-to-end
//! `eval` pipeline.

pub mod args;
pub mod eval;
pub mod exec;
pub mod kernel;
pub mod libs;
pub mod pattern;

pub use args::{ArgumentParser, MacroArgs};
pub use eval::{Error, apply, apply_closure, apply_function, call_mfa, eval, eval_in, eval_node};
pub use exec::Executor;
pub use kernel::{build_bootstrap_context, build_kernel_context};
pub use libs::create_context;
