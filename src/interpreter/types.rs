//! Interpreter Types
//!
//! Shared state and result types for the execution engine.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::ast::types::FunctionDefNode;
use crate::interpreter::environment::Environment;

/// Shell options (set -e, shopt -s nullglob, etc.)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOptions {
    /// set -e: Exit immediately if a command exits with non-zero status
    pub errexit: bool,
    /// set -o pipefail: Pipeline status is the first failing stage's status
    pub pipefail: bool,
    /// set -u: Treat unset variables as an error when substituting
    pub nounset: bool,
    /// set -x: Print commands and their arguments as they are executed
    pub xtrace: bool,
    /// set -a: Export all variables
    pub allexport: bool,
    /// set -f: Disable filename expansion (globbing)
    pub noglob: bool,
    /// shopt -s nullglob: patterns matching nothing expand to nothing
    pub nullglob: bool,
    /// shopt -s failglob: patterns matching nothing are an error
    pub failglob: bool,
}

/// Result of executing a script, command or builtin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecResult {
    pub fn new(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self { stdout, stderr, exit_code }
    }

    /// Success result with no output
    pub fn ok() -> Self {
        Self::new(String::new(), String::new(), 0)
    }

    /// Success result with stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::new(stdout.into(), String::new(), 0)
    }

    /// Failure result with stderr message
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self::new(String::new(), stderr.into(), 1)
    }

    /// Failure result with stderr message and custom exit code
    pub fn failure_with_code(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self::new(String::new(), stderr.into(), exit_code)
    }

    /// Status-only result
    pub fn with_code(exit_code: i32) -> Self {
        Self::new(String::new(), String::new(), exit_code)
    }
}

/// Execution limits configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Maximum nesting of function calls, command substitutions, eval and source
    pub max_recursion_depth: usize,
    /// Maximum number of commands to execute per `exec` call
    pub max_command_count: u64,
    /// Maximum number of iterations of a single loop
    pub max_loop_iterations: u64,
    /// Chunks buffered in a pipe before the writer blocks
    pub pipe_capacity: usize,
    /// Stack size for engine threads (pipeline stages, background jobs)
    pub stack_size: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_recursion_depth: 200,
            max_command_count: 100_000,
            max_loop_iterations: 1_000_000,
            pipe_capacity: 16,
            stack_size: 64 * 1024 * 1024,
        }
    }
}

/// Complete interpreter state for one shell (or subshell).
#[derive(Debug, Clone)]
pub struct InterpreterState {
    pub env: Environment,
    pub functions: HashMap<String, Arc<FunctionDefNode>>,
    pub aliases: IndexMap<String, String>,
    pub options: ShellOptions,
    pub cwd: String,
    pub previous_dir: String,
    /// $0
    pub script_name: String,
    /// $$
    pub shell_pid: u32,
    /// $?
    pub last_exit_code: i32,
    /// $!
    pub last_background_pid: Option<u32>,
    /// Nested function calls, substitutions, eval and source
    pub call_depth: usize,
    /// Enclosing loops (for break/continue)
    pub loop_depth: usize,
    /// Nested `source` calls (for return)
    pub source_depth: usize,
    /// > 0 while evaluating an if/while/until condition or a non-final
    /// element of an && / || list: errexit does not trigger there
    pub condition_depth: usize,
    /// Commands run so far in this `exec` call
    pub command_count: u64,
    /// stderr of command substitutions, drained by the enclosing command
    pub expansion_stderr: String,
    /// Status of the last command substitution; an assignment-only
    /// command exits with it
    pub substitution_status: Option<i32>,
    /// Aliases currently being expanded; never expanded again inside
    /// their own expansion
    pub alias_stack: Vec<String>,
}

impl Default for InterpreterState {
    fn default() -> Self {
        Self {
            env: Environment::new(),
            functions: HashMap::new(),
            aliases: IndexMap::new(),
            options: ShellOptions::default(),
            cwd: "/".to_string(),
            previous_dir: "/".to_string(),
            script_name: "bash".to_string(),
            shell_pid: 1,
            last_exit_code: 0,
            last_background_pid: None,
            call_depth: 0,
            loop_depth: 0,
            source_depth: 0,
            condition_depth: 0,
            command_count: 0,
            expansion_stderr: String::new(),
            substitution_status: None,
            alias_stack: Vec::new(),
        }
    }
}

impl InterpreterState {
    /// Isolated copy for a subshell, pipeline stage or background job.
    /// Nothing done to the copy is visible in `self` afterwards.
    pub fn subshell(&self) -> InterpreterState {
        InterpreterState {
            env: self.env.snapshot_for_subshell(),
            loop_depth: 0,
            expansion_stderr: String::new(),
            substitution_status: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_result_json_shape() {
        let json = serde_json::to_string(&ExecResult::new("out".into(), "err".into(), 2)).unwrap();
        assert_eq!(json, r#"{"stdout":"out","stderr":"err","exitCode":2}"#);
    }

    #[test]
    fn test_subshell_state_is_isolated() {
        let mut state = InterpreterState::default();
        state.env.set("X", "1", false, false).unwrap();
        let mut child = state.subshell();
        child.env.set("X", "2", false, false).unwrap();
        child.cwd = "/tmp".into();
        assert_eq!(state.env.get_value("X").as_deref(), Some("1"));
        assert_eq!(state.cwd, "/");
    }
}
