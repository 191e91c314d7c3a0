//! Subshell and Group Execution
//!
//! Handles execution of subshells (...) and groups { ...; }.
//!
//! A subshell runs against `InterpreterState::subshell()`, so nothing it
//! does to variables, functions, aliases, options or the working
//! directory survives it. `exit`, `return` and errexit end only the
//! subshell. A group runs in the current shell.

use crate::ast::types::StatementNode;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::io::IoContext;
use crate::interpreter::types::{ExecResult, InterpreterState};

/// Turn the signals that end an isolated context into its result. Limits,
/// interrupts and internal errors keep unwinding.
pub fn isolated_result(error: InterpreterError) -> Result<ExecResult, InterpreterError> {
    match error {
        InterpreterError::Exit(e) => Ok(ExecResult::new(e.stdout, e.stderr, e.exit_code)),
        InterpreterError::Errexit(e) => Ok(ExecResult::new(e.stdout, e.stderr, e.exit_code)),
        InterpreterError::Return(e) => Ok(ExecResult::new(e.stdout, e.stderr, e.exit_code)),
        InterpreterError::Break(e) => Ok(ExecResult::new(e.stdout, e.stderr, 0)),
        InterpreterError::Continue(e) => Ok(ExecResult::new(e.stdout, e.stderr, 0)),
        other => Err(other),
    }
}

impl ExecutionEngine {
    /// Run statements as a self-contained shell: used by subshells,
    /// command substitutions, pipeline stages and background jobs.
    pub fn execute_isolated(
        &self,
        state: &mut InterpreterState,
        statements: &[StatementNode],
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        self.execute_statements(state, statements, io).or_else(isolated_result)
    }

    /// Execute a subshell (...): the body runs on a snapshot that is
    /// discarded afterwards.
    pub fn execute_subshell(
        &self,
        state: &mut InterpreterState,
        body: &[StatementNode],
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        let mut sub = state.subshell();
        let outcome = self.execute_isolated(&mut sub, body, io);
        state.command_count = sub.command_count;
        outcome
    }

    /// Execute a group { ...; } in the current shell.
    pub fn execute_group(
        &self,
        state: &mut InterpreterState,
        body: &[StatementNode],
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        self.execute_statements(state, body, io)
    }
}
