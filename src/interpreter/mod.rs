//! Interpreter module
//!
//! This module contains the bash interpreter implementation: the
//! environment, the expansion stages, the execution engine and the
//! builtins.

pub mod alias_expansion;
pub mod arithmetic;
pub mod builtins;
pub mod command_resolution;
pub mod control_flow;
pub mod environment;
pub mod errors;
pub mod execution_engine;
pub mod expansion;
pub mod functions;
pub mod interpreter;
pub mod io;
pub mod jobs;
pub mod pipeline_execution;
pub mod redirections;
pub mod subshell_group;
pub mod sync_fs_adapter;
pub mod types;

pub use builtins::{Builtin, BuiltinContext, BuiltinRegistry};
pub use command_resolution::{CommandRequest, CommandResolver, NotFoundResolver};
pub use environment::{Environment, VarValue, Variable};
pub use errors::*;
pub use execution_engine::ExecutionEngine;
pub use interpreter::ShellFs;
pub use io::InputStream;
pub use sync_fs_adapter::SyncFsAdapter;
pub use types::{ExecResult, ExecutionLimits, InterpreterState, ShellOptions};
