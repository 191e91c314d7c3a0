//! Interpreter Errors
//!
//! Error types used to implement shell control flow and runtime failures:
//! - break/continue: exit or skip loop iterations
//! - return: exit functions
//! - exit: terminate the script
//! - errexit: exit on error (set -e)
//! - expansion failures, limits, interrupts
//!
//! Control flow errors carry stdout/stderr to accumulate output
//! as they propagate through the execution stack.

use std::fmt;

use thiserror::Error;

/// Base trait for control flow errors that carry stdout/stderr.
pub trait ControlFlowError: std::error::Error {
    fn stdout(&self) -> &str;
    fn stderr(&self) -> &str;
    fn stdout_mut(&mut self) -> &mut String;
    fn stderr_mut(&mut self) -> &mut String;

    /// Prepend output from the current context before re-throwing.
    fn prepend_output(&mut self, stdout: &str, stderr: &str) {
        let new_stdout = format!("{}{}", stdout, self.stdout());
        let new_stderr = format!("{}{}", stderr, self.stderr());
        *self.stdout_mut() = new_stdout;
        *self.stderr_mut() = new_stderr;
    }
}

macro_rules! control_flow_error {
    ($(#[$meta:meta])* $name:ident, $field:ident: $ty:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub $field: $ty,
            pub stdout: String,
            pub stderr: String,
        }

        impl $name {
            pub fn new($field: $ty, stdout: String, stderr: String) -> Self {
                Self { $field, stdout, stderr }
            }

            pub fn bare($field: $ty) -> Self {
                Self::new($field, String::new(), String::new())
            }
        }

        impl std::error::Error for $name {}

        impl ControlFlowError for $name {
            fn stdout(&self) -> &str { &self.stdout }
            fn stderr(&self) -> &str { &self.stderr }
            fn stdout_mut(&mut self) -> &mut String { &mut self.stdout }
            fn stderr_mut(&mut self) -> &mut String { &mut self.stderr }
        }
    };
}

control_flow_error!(
    /// Error thrown when break is called to exit loops.
    BreakError, levels: u32
);
control_flow_error!(
    /// Error thrown when continue is called to skip to next iteration.
    ContinueError, levels: u32
);
control_flow_error!(
    /// Error thrown when return is called to exit a function.
    ReturnError, exit_code: i32
);
control_flow_error!(
    /// Error thrown when the exit builtin terminates the script.
    ExitError, exit_code: i32
);
control_flow_error!(
    /// Error thrown when set -e (errexit) is enabled and a command fails.
    ErrexitError, exit_code: i32
);
control_flow_error!(
    /// Raised when the host requests an interrupt.
    InterruptedError, exit_code: i32
);

impl fmt::Display for BreakError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "break")
    }
}

impl fmt::Display for ContinueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "continue")
    }
}

impl fmt::Display for ReturnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "return")
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit {}", self.exit_code)
    }
}

impl fmt::Display for ErrexitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errexit: command exited with status {}", self.exit_code)
    }
}

impl fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interrupted")
    }
}

/// Which resource limit was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitType {
    Recursion,
    Commands,
    Iterations,
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitType::Recursion => write!(f, "maximum recursion depth exceeded"),
            LimitType::Commands => write!(f, "maximum command count exceeded"),
            LimitType::Iterations => write!(f, "maximum loop iterations exceeded"),
        }
    }
}

control_flow_error!(
    /// A configured execution limit was exceeded.
    LimitError, limit: LimitType
);

impl fmt::Display for LimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.limit)
    }
}

/// Error from arithmetic parsing or evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{expression}: {message}")]
pub struct ArithmeticError {
    pub expression: String,
    pub message: String,
}

impl ArithmeticError {
    pub fn new(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            message: message.into(),
        }
    }
}

/// Failures during word expansion and assignment. These abort only the
/// current command, which then exits with status 1.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error("{0}: bad substitution")]
    BadSubstitution(String),
    #[error("{0}: unbound variable")]
    UnboundVariable(String),
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
    #[error("no match: {0}")]
    NoGlobMatch(String),
    #[error("{0}: readonly variable")]
    Readonly(String),
    #[error("`{0}': not a valid identifier")]
    InvalidIdentifier(String),
    /// ${1:=value} and other non-variable targets
    #[error("${0}: cannot assign in this way")]
    CannotAssign(String),
    /// ${NAME:?message}
    #[error("{name}: {message}")]
    ParameterUnset { name: String, message: String },
}

/// Unified error enum for all interpreter errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpreterError {
    #[error(transparent)]
    Break(BreakError),
    #[error(transparent)]
    Continue(ContinueError),
    #[error(transparent)]
    Return(ReturnError),
    #[error(transparent)]
    Exit(ExitError),
    #[error(transparent)]
    Errexit(ErrexitError),
    #[error(transparent)]
    Expansion(#[from] ExpansionError),
    /// Function call or nested substitution depth exceeded
    #[error(transparent)]
    RecursionLimit(LimitError),
    #[error(transparent)]
    ExecutionLimit(LimitError),
    #[error(transparent)]
    Interrupted(InterruptedError),
    /// A redirection target could not be opened or written
    #[error("{0}")]
    Redirection(String),
    /// The reading end of this command's output pipe has been closed
    #[error("broken pipe")]
    BrokenPipe,
    /// Invariant violation inside the engine; always fatal
    #[error("internal error: {0}")]
    Internal(String),
}

impl InterpreterError {
    /// Prepend output produced before the error was raised. Errors without
    /// an output buffer discard it.
    pub fn prepend_output(&mut self, stdout: &str, stderr: &str) {
        if stdout.is_empty() && stderr.is_empty() {
            return;
        }
        match self {
            InterpreterError::Break(e) => e.prepend_output(stdout, stderr),
            InterpreterError::Continue(e) => e.prepend_output(stdout, stderr),
            InterpreterError::Return(e) => e.prepend_output(stdout, stderr),
            InterpreterError::Exit(e) => e.prepend_output(stdout, stderr),
            InterpreterError::Errexit(e) => e.prepend_output(stdout, stderr),
            InterpreterError::RecursionLimit(e) | InterpreterError::ExecutionLimit(e) => {
                e.prepend_output(stdout, stderr)
            }
            InterpreterError::Interrupted(e) => e.prepend_output(stdout, stderr),
            InterpreterError::Expansion(_)
            | InterpreterError::Redirection(_)
            | InterpreterError::BrokenPipe
            | InterpreterError::Internal(_) => {}
        }
    }

    /// Output buffers carried by the error, if any.
    pub fn output_mut(&mut self) -> Option<(&mut String, &mut String)> {
        match self {
            InterpreterError::Break(e) => Some((&mut e.stdout, &mut e.stderr)),
            InterpreterError::Continue(e) => Some((&mut e.stdout, &mut e.stderr)),
            InterpreterError::Return(e) => Some((&mut e.stdout, &mut e.stderr)),
            InterpreterError::Exit(e) => Some((&mut e.stdout, &mut e.stderr)),
            InterpreterError::Errexit(e) => Some((&mut e.stdout, &mut e.stderr)),
            InterpreterError::RecursionLimit(e) | InterpreterError::ExecutionLimit(e) => {
                Some((&mut e.stdout, &mut e.stderr))
            }
            InterpreterError::Interrupted(e) => Some((&mut e.stdout, &mut e.stderr)),
            InterpreterError::Expansion(_)
            | InterpreterError::Redirection(_)
            | InterpreterError::BrokenPipe
            | InterpreterError::Internal(_) => None,
        }
    }

    /// Errors that fail only the current command (status 1) rather than
    /// unwinding.
    pub fn is_command_failure(&self) -> bool {
        matches!(self, InterpreterError::Expansion(_) | InterpreterError::Redirection(_))
    }
}

/// Check if an error is a scope exit error (return, break, continue).
pub fn is_scope_exit_error(error: &InterpreterError) -> bool {
    matches!(
        error,
        InterpreterError::Break(_) | InterpreterError::Continue(_) | InterpreterError::Return(_)
    )
}

impl From<BreakError> for InterpreterError {
    fn from(e: BreakError) -> Self { InterpreterError::Break(e) }
}

impl From<ContinueError> for InterpreterError {
    fn from(e: ContinueError) -> Self { InterpreterError::Continue(e) }
}

impl From<ReturnError> for InterpreterError {
    fn from(e: ReturnError) -> Self { InterpreterError::Return(e) }
}

impl From<ExitError> for InterpreterError {
    fn from(e: ExitError) -> Self { InterpreterError::Exit(e) }
}

impl From<ErrexitError> for InterpreterError {
    fn from(e: ErrexitError) -> Self { InterpreterError::Errexit(e) }
}

impl From<InterruptedError> for InterpreterError {
    fn from(e: InterruptedError) -> Self { InterpreterError::Interrupted(e) }
}

impl From<ArithmeticError> for InterpreterError {
    fn from(e: ArithmeticError) -> Self { InterpreterError::Expansion(ExpansionError::Arithmetic(e)) }
}
