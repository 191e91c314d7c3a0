//! bashlet - An in-process bash-compatible shell runtime
//!
//! This library parses bash scripts into an AST and executes them against
//! a virtual filesystem, with host-provided builtins and command resolution.

pub mod ast;
pub mod bash;
pub mod fs;
pub mod interpreter;
pub mod parser;

pub use bash::{Bash, BashOptions, InterruptHandle};
pub use interpreter::{Builtin, BuiltinContext, CommandRequest, CommandResolver, ExecResult, ExecutionLimits};
pub use parser::{parse, SyntaxError};
