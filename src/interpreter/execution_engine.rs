//! Execution Engine
//!
//! The core execution engine that ties all interpreter components together.
//! Implements the full AST execution chain:
//!
//! execute_script -> execute_statement -> execute_pipeline -> execute_command
//!
//! The engine only holds the collaborators shared by every execution
//! context. Shell state and streams are passed explicitly, so pipeline
//! stages and background jobs run the same code against their own
//! snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, trace};

use crate::ast::types::{
    AssignmentNode, CommandNode, CompoundBody, CompoundCommandNode, ScriptNode, SimpleCommandNode, StatementNode,
    StatementOperator,
};
use crate::interpreter::builtins::{is_special_builtin, shell_quote, Builtin, BuiltinContext, BuiltinRegistry};
use crate::interpreter::command_resolution::{command_not_found, CommandRequest, CommandResolver};
use crate::interpreter::environment::{ScopeKind, VarValue};
use crate::interpreter::errors::{ErrexitError, InterpreterError, InterruptedError, LimitError, LimitType};
use crate::interpreter::interpreter::ShellFs;
use crate::interpreter::io::{IoContext, InputStream};
use crate::interpreter::jobs::JobTable;
use crate::interpreter::types::{ExecResult, ExecutionLimits, InterpreterState};
use crate::parser::{parse, SyntaxError};

/// Exit status of a command killed by SIGINT.
pub const INTERRUPTED_STATUS: i32 = 130;
/// Exit status of a command killed by SIGPIPE.
pub const BROKEN_PIPE_STATUS: i32 = 141;
/// Exit status reported when an execution limit stops the script.
pub const LIMIT_EXCEEDED_STATUS: i32 = 126;

/// Which kinds of commands `dispatch` may resolve a name to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandLookup {
    /// Special builtins, functions, builtins, then the command resolver
    Full,
    /// As `Full` without functions (`command NAME`)
    SkipFunctions,
    /// Builtins only (`builtin NAME`)
    BuiltinsOnly,
}

/// The execution engine that ties all interpreter components together.
#[derive(Clone)]
pub struct ExecutionEngine {
    /// Sync filesystem interface
    pub fs: Arc<dyn ShellFs>,
    pub builtins: Arc<BuiltinRegistry>,
    /// Runs commands that are neither functions nor builtins
    pub resolver: Arc<dyn CommandResolver>,
    /// Background jobs started by this shell
    pub jobs: Arc<Mutex<JobTable>>,
    /// Set by the host to unwind the running script
    pub interrupt: Arc<AtomicBool>,
    /// Execution limits (max commands, recursion depth, iterations)
    pub limits: ExecutionLimits,
}

impl ExecutionEngine {
    /// Create a new execution engine.
    pub fn new(
        fs: Arc<dyn ShellFs>,
        builtins: Arc<BuiltinRegistry>,
        resolver: Arc<dyn CommandResolver>,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            fs,
            builtins,
            resolver,
            jobs: Arc::new(Mutex::new(JobTable::new(tokio::runtime::Handle::try_current().ok()))),
            interrupt: Arc::new(AtomicBool::new(false)),
            limits,
        }
    }

    /// Run a parsed top-level script, converting every unwinding signal
    /// into an exit status.
    pub fn run_script(&self, state: &mut InterpreterState, ast: &ScriptNode) -> ExecResult {
        let mut io = IoContext::default();
        let result = match self.execute_script(state, ast, &mut io) {
            Ok(result) => result,
            Err(e) => error_to_result(e),
        };
        state.last_exit_code = result.exit_code;
        result
    }

    /// Execute a complete script (list of statements).
    pub fn execute_script(
        &self,
        state: &mut InterpreterState,
        ast: &ScriptNode,
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        self.execute_statements(state, &ast.statements, io)
    }

    /// Run statements in order. Output is flushed to the pipe sink after
    /// every statement; `$?` follows each one.
    pub fn execute_statements(
        &self,
        state: &mut InterpreterState,
        statements: &[StatementNode],
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;

        for statement in statements {
            match self.execute_statement(state, statement, io) {
                Ok(result) => {
                    stdout.push_str(&result.stdout);
                    stderr.push_str(&result.stderr);
                    exit_code = result.exit_code;
                    state.last_exit_code = exit_code;
                }
                Err(mut e) => {
                    e.prepend_output(&stdout, &stderr);
                    return Err(e);
                }
            }
            io.flush(&mut stdout)?;
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    /// Execute a single statement (list of pipelines with && || operators).
    pub fn execute_statement(
        &self,
        state: &mut InterpreterState,
        stmt: &StatementNode,
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        if stmt.background {
            return self.execute_background(state, stmt);
        }

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        let last = stmt.pipelines.len().saturating_sub(1);

        for (i, pipeline) in stmt.pipelines.iter().enumerate() {
            if i > 0 {
                let skip = match stmt.operators.get(i - 1) {
                    Some(StatementOperator::And) => exit_code != 0,
                    Some(StatementOperator::Or) => exit_code == 0,
                    None => false,
                };
                if skip {
                    continue;
                }
            }

            // Only the last element of an && / || list can trigger errexit
            let guarded = i < last;
            if guarded {
                state.condition_depth += 1;
            }
            let outcome = self.execute_pipeline(state, pipeline, io);
            if guarded {
                state.condition_depth -= 1;
            }

            match outcome {
                Ok(result) => {
                    stdout.push_str(&result.stdout);
                    stderr.push_str(&result.stderr);
                    exit_code = result.exit_code;
                    state.last_exit_code = exit_code;
                }
                Err(mut e) => {
                    e.prepend_output(&stdout, &stderr);
                    return Err(e);
                }
            }

            if !guarded && !pipeline.negated && should_trigger_errexit(state, exit_code) {
                debug!(exit_code, "errexit triggered");
                return Err(ErrexitError::new(exit_code, stdout, stderr).into());
            }
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    /// Collect the output of background jobs that finished without being
    /// waited for. Jobs still running stay in the table.
    pub fn reap_finished_jobs(&self) -> ExecResult {
        let finished = match self.jobs.lock() {
            Ok(mut jobs) => jobs.reap_finished(),
            Err(_) => {
                error!("job table lock poisoned");
                return ExecResult::ok();
            }
        };
        let mut collected = ExecResult::ok();
        for job in finished {
            let done = job.wait();
            collected.stdout.push_str(&done.stdout);
            collected.stderr.push_str(&done.stderr);
        }
        collected
    }

    /// `stmt &`: run as a blocking task against a state snapshot. Output is
    /// handed back by `wait`.
    fn execute_background(&self, state: &mut InterpreterState, stmt: &StatementNode) -> Result<ExecResult, InterpreterError> {
        let mut job_statement = stmt.clone();
        job_statement.background = false;
        let mut job_state = state.subshell();
        let engine = self.clone();
        let label = describe_statement(stmt);

        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| InterpreterError::Internal("job table lock poisoned".to_string()))?;
        let pid = jobs.spawn(label, move || {
            let mut io = IoContext::default();
            match engine.execute_isolated(&mut job_state, std::slice::from_ref(&job_statement), &mut io) {
                Ok(result) => result,
                Err(e) => error_to_result(e),
            }
        })?;
        state.last_background_pid = Some(pid);
        Ok(ExecResult::ok())
    }

    /// Execute a single command.
    pub fn execute_command(
        &self,
        state: &mut InterpreterState,
        command: &CommandNode,
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        self.check_budget(state)?;
        match command {
            CommandNode::Simple(cmd) => self.execute_simple_command(state, cmd, io),
            CommandNode::Compound(cmd) => self.execute_compound(state, cmd, io),
            CommandNode::FunctionDef(def) => {
                trace!(function = %def.name, "function defined");
                state.functions.insert(def.name.clone(), Arc::clone(def));
                Ok(ExecResult::ok())
            }
        }
    }

    /// Interrupt and command-count checks, once per command.
    fn check_budget(&self, state: &mut InterpreterState) -> Result<(), InterpreterError> {
        if self.interrupt.load(Ordering::SeqCst) {
            debug!("interrupt requested, unwinding");
            return Err(InterruptedError::bare(INTERRUPTED_STATUS).into());
        }
        state.command_count += 1;
        if state.command_count > self.limits.max_command_count {
            return Err(InterpreterError::ExecutionLimit(LimitError::bare(LimitType::Commands)));
        }
        Ok(())
    }

    /// Execute a compound command with its redirections applied.
    pub fn execute_compound(
        &self,
        state: &mut InterpreterState,
        node: &CompoundCommandNode,
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        self.with_redirections(state, &node.redirections, io, |engine, state, io| match &node.body {
            CompoundBody::If(n) => engine.execute_if(state, n, io),
            CompoundBody::For(n) => engine.execute_for(state, n, io),
            CompoundBody::While(n) => engine.execute_while(state, n, io),
            CompoundBody::Until(n) => engine.execute_until(state, n, io),
            CompoundBody::Case(n) => engine.execute_case(state, n, io),
            CompoundBody::Subshell(body) => engine.execute_subshell(state, body, io),
            CompoundBody::Group(body) => engine.execute_group(state, body, io),
        })
    }

    /// Execute a simple command. Expansion and redirection failures fail
    /// the command with status 1 and a diagnostic.
    pub fn execute_simple_command(
        &self,
        state: &mut InterpreterState,
        cmd: &SimpleCommandNode,
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        let outcome = match self.try_alias(state, cmd, io) {
            Ok(Some(result)) => Ok(result),
            Ok(None) => self.run_simple_command(state, cmd, io),
            Err(e) => Err(e),
        };
        let substitution_stderr = std::mem::take(&mut state.expansion_stderr);
        match outcome {
            Ok(mut result) => {
                if !substitution_stderr.is_empty() {
                    result.stderr.insert_str(0, &substitution_stderr);
                }
                Ok(result)
            }
            Err(e) if e.is_command_failure() => {
                debug!(error = %e, "command failed during expansion");
                Ok(ExecResult::failure(format!("{}bash: {}\n", substitution_stderr, e)))
            }
            Err(mut e) => {
                e.prepend_output("", &substitution_stderr);
                Err(e)
            }
        }
    }

    fn run_simple_command(
        &self,
        state: &mut InterpreterState,
        cmd: &SimpleCommandNode,
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        state.substitution_status = None;
        let argv = self.expand_argv(state, &cmd.words)?;

        if argv.is_empty() {
            // Assignment-only: the assignments persist
            self.apply_assignments(state, &cmd.assignments, false)?;
            let exit_code = state.substitution_status.take().unwrap_or(0);
            return self.with_redirections(state, &cmd.redirections, io, |_, _, _| Ok(ExecResult::with_code(exit_code)));
        }

        self.with_temporary_assignments(state, &cmd.assignments, |engine, state| {
            let trace = state.options.xtrace.then(|| trace_line(&argv));
            let mut result = engine.with_redirections(state, &cmd.redirections, io, |engine, state, io| {
                engine.dispatch_io(state, &argv, io, CommandLookup::Full)
            })?;
            if let Some(line) = trace {
                result.stderr.insert_str(0, &line);
            }
            Ok(result)
        })
    }

    /// Run `body` with prefix assignments bound in a temporary, exported
    /// scope that is discarded afterwards.
    pub(crate) fn with_temporary_assignments<F>(
        &self,
        state: &mut InterpreterState,
        assignments: &[AssignmentNode],
        body: F,
    ) -> Result<ExecResult, InterpreterError>
    where
        F: FnOnce(&Self, &mut InterpreterState) -> Result<ExecResult, InterpreterError>,
    {
        if assignments.is_empty() {
            return body(self, state);
        }
        state.env.push_scope(ScopeKind::Temporary);
        let outcome = match self.apply_assignments(state, assignments, true) {
            Ok(()) => body(self, state),
            Err(e) => Err(e),
        };
        state.env.pop_scope();
        outcome
    }

    /// `NAME=value`, `NAME+=value` and `NAME=(words)`.
    fn apply_assignments(
        &self,
        state: &mut InterpreterState,
        assignments: &[AssignmentNode],
        temporary: bool,
    ) -> Result<(), InterpreterError> {
        for assignment in assignments {
            let value = match &assignment.array {
                Some(words) => VarValue::Array(self.expand_words(state, words)?),
                None => VarValue::Scalar(match &assignment.value {
                    Some(word) => self.expand_word_to_string(state, word)?,
                    None => String::new(),
                }),
            };
            if state.options.xtrace {
                let shown = match &value {
                    VarValue::Scalar(s) => shell_word(s),
                    VarValue::Array(items) => format!("({})", items.iter().map(|s| shell_word(s)).collect::<Vec<_>>().join(" ")),
                };
                let op = if assignment.append { "+=" } else { "=" };
                state.expansion_stderr.push_str(&format!("+ {}{}{}\n", assignment.name, op, shown));
            }
            let export = temporary || state.options.allexport;
            if assignment.append {
                state.env.append(&assignment.name, value, export)?;
            } else {
                state.env.set(&assignment.name, value, export, temporary)?;
            }
        }
        Ok(())
    }

    /// Resolve `argv[0]` and run it with `stdin`. Used by builtins that
    /// invoke other commands.
    pub fn dispatch(
        &self,
        state: &mut InterpreterState,
        argv: &[String],
        stdin: &mut InputStream,
        lookup: CommandLookup,
    ) -> Result<ExecResult, InterpreterError> {
        let mut io = IoContext::with_stdin(std::mem::take(stdin));
        let outcome = self.dispatch_io(state, argv, &mut io, lookup);
        *stdin = io.stdin;
        outcome
    }

    /// Resolve `argv[0]`: special builtins, then functions, then builtins,
    /// then the command resolver.
    pub fn dispatch_io(
        &self,
        state: &mut InterpreterState,
        argv: &[String],
        io: &mut IoContext,
        lookup: CommandLookup,
    ) -> Result<ExecResult, InterpreterError> {
        let Some((name, args)) = argv.split_first() else {
            return Ok(ExecResult::ok());
        };

        if lookup == CommandLookup::Full && is_special_builtin(name) {
            if let Some(builtin) = self.builtins.get(name) {
                return self.run_builtin(state, name, args, &mut io.stdin, builtin);
            }
        }
        if lookup == CommandLookup::Full {
            if let Some(function) = state.functions.get(name.as_str()).cloned() {
                return self.call_function(state, &function, args, io);
            }
        }
        if let Some(builtin) = self.builtins.get(name) {
            return self.run_builtin(state, name, args, &mut io.stdin, builtin);
        }
        if lookup == CommandLookup::BuiltinsOnly {
            return Ok(command_not_found(name));
        }

        debug!(command = %name, "resolving external command");
        let env = state.env.flatten_exported();
        Ok(self.resolver.execute(CommandRequest {
            argv,
            env: &env,
            cwd: &state.cwd,
            stdin: &mut io.stdin,
        }))
    }

    fn run_builtin(
        &self,
        state: &mut InterpreterState,
        name: &str,
        args: &[String],
        stdin: &mut InputStream,
        builtin: Arc<dyn Builtin>,
    ) -> Result<ExecResult, InterpreterError> {
        trace!(builtin = %name, "dispatching builtin");
        let mut ctx = BuiltinContext {
            name,
            args,
            state,
            stdin,
            engine: self,
        };
        builtin.execute(&mut ctx)
    }

    /// Increase the call depth, failing past the recursion limit.
    pub(crate) fn enter_call(&self, state: &mut InterpreterState) -> Result<(), InterpreterError> {
        if state.call_depth >= self.limits.max_recursion_depth {
            debug!(depth = state.call_depth, "recursion limit reached");
            return Err(InterpreterError::RecursionLimit(LimitError::bare(LimitType::Recursion)));
        }
        state.call_depth += 1;
        Ok(())
    }

    /// Parse and run script text in the current shell (eval, source).
    pub fn run_nested(
        &self,
        state: &mut InterpreterState,
        script: &str,
        stdin: &mut InputStream,
    ) -> Result<ExecResult, InterpreterError> {
        let ast = match parse(script) {
            Ok(ast) => ast,
            Err(e) => {
                debug!(error = %e, "nested parse failed");
                return Ok(syntax_error_result(&e));
            }
        };
        self.enter_call(state)?;
        let mut io = IoContext::with_stdin(std::mem::take(stdin));
        let outcome = self.execute_script(state, &ast, &mut io);
        *stdin = io.stdin;
        state.call_depth -= 1;
        outcome
    }
}

/// set -e applies outside conditions.
pub fn should_trigger_errexit(state: &InterpreterState, exit_code: i32) -> bool {
    state.options.errexit && exit_code != 0 && state.condition_depth == 0
}

/// Result for a script that failed to parse.
pub fn syntax_error_result(error: &SyntaxError) -> ExecResult {
    ExecResult::failure_with_code(format!("bash: {}\n", error), 2)
}

/// Convert an error that reached an execution boundary into a result,
/// keeping the output it carries.
pub fn error_to_result(error: InterpreterError) -> ExecResult {
    match error {
        InterpreterError::Exit(e) => ExecResult::new(e.stdout, e.stderr, e.exit_code),
        InterpreterError::Errexit(e) => ExecResult::new(e.stdout, e.stderr, e.exit_code),
        InterpreterError::Return(e) => ExecResult::new(e.stdout, e.stderr, e.exit_code),
        InterpreterError::Break(e) => ExecResult::new(e.stdout, e.stderr, 0),
        InterpreterError::Continue(e) => ExecResult::new(e.stdout, e.stderr, 0),
        InterpreterError::RecursionLimit(mut e) => {
            e.stderr.push_str(&format!("bash: {}\n", e.limit));
            ExecResult::new(e.stdout, e.stderr, 1)
        }
        InterpreterError::ExecutionLimit(mut e) => {
            e.stderr.push_str(&format!("bash: {}\n", e.limit));
            ExecResult::new(e.stdout, e.stderr, LIMIT_EXCEEDED_STATUS)
        }
        InterpreterError::Interrupted(e) => ExecResult::new(e.stdout, e.stderr, e.exit_code),
        InterpreterError::BrokenPipe => ExecResult::with_code(BROKEN_PIPE_STATUS),
        e @ (InterpreterError::Expansion(_) | InterpreterError::Redirection(_)) => {
            ExecResult::failure(format!("bash: {}\n", e))
        }
        InterpreterError::Internal(message) => {
            error!(%message, "internal interpreter error");
            ExecResult::failure(format!("bash: internal error: {}\n", message))
        }
    }
}

/// A word as xtrace prints it.
fn shell_word(value: &str) -> String {
    const SPECIAL: &str = " \t\n'\"\\$`|&;<>()*?[]{}~#!";
    if value.is_empty() || value.chars().any(|c| SPECIAL.contains(c)) {
        shell_quote(value)
    } else {
        value.to_string()
    }
}

/// `+ argv...` line for set -x.
fn trace_line(argv: &[String]) -> String {
    let words: Vec<String> = argv.iter().map(|a| shell_word(a)).collect();
    format!("+ {}\n", words.join(" "))
}

/// Short command text for the job table.
fn describe_statement(stmt: &StatementNode) -> String {
    let mut out = String::new();
    for (i, pipeline) in stmt.pipelines.iter().enumerate() {
        if i > 0 {
            out.push_str(match stmt.operators.get(i - 1) {
                Some(StatementOperator::Or) => " || ",
                _ => " && ",
            });
        }
        let commands: Vec<String> = pipeline
            .commands
            .iter()
            .map(|command| match command {
                CommandNode::Simple(cmd) => cmd.words.iter().map(|w| w.source.as_str()).collect::<Vec<_>>().join(" "),
                CommandNode::Compound(_) => "...".to_string(),
                CommandNode::FunctionDef(def) => format!("{}()", def.name),
            })
            .collect();
        out.push_str(&commands.join(" | "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::interpreter::command_resolution::NotFoundResolver;
    use crate::interpreter::sync_fs_adapter::SyncFsAdapter;

    fn engine_with(limits: ExecutionLimits) -> ExecutionEngine {
        let fs = Arc::new(SyncFsAdapter::new(Arc::new(InMemoryFs::new()), tokio::runtime::Handle::current()));
        ExecutionEngine::new(fs, Arc::new(BuiltinRegistry::default()), Arc::new(NotFoundResolver), limits)
    }

    fn run(engine: &ExecutionEngine, state: &mut InterpreterState, script: &str) -> ExecResult {
        let ast = parse(script).unwrap();
        engine.run_script(state, &ast)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_and_or_lists() {
        let engine = engine_with(ExecutionLimits::default());
        let mut state = InterpreterState::default();
        let result = run(&engine, &mut state, "false && echo no || echo yes; true || echo skipped");
        assert_eq!(result.stdout, "yes\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_errexit_stops_script_but_not_conditions() {
        let engine = engine_with(ExecutionLimits::default());
        let mut state = InterpreterState::default();
        let result = run(&engine, &mut state, "set -e\nif false; then :; fi\nfalse || echo guarded\nfalse\necho unreachable");
        assert_eq!(result.stdout, "guarded\n");
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_prefix_assignment_is_temporary() {
        let engine = engine_with(ExecutionLimits::default());
        let mut state = InterpreterState::default();
        let result = run(&engine, &mut state, "FOO=1 export -p; echo \"[$FOO]\"");
        assert!(result.stdout.contains("declare -x FOO='1'"));
        assert!(result.stdout.ends_with("[]\n"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_command_not_found() {
        let engine = engine_with(ExecutionLimits::default());
        let mut state = InterpreterState::default();
        let result = run(&engine, &mut state, "nosuchcmd arg; echo $?");
        assert_eq!(result.stdout, "127\n");
        assert_eq!(result.stderr, "bash: nosuchcmd: command not found\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_special_builtins_win_over_functions() {
        let engine = engine_with(ExecutionLimits::default());
        let mut state = InterpreterState::default();
        let result = run(&engine, &mut state, "echo() { true; }; export() { :; }; export A=1; echo $A");
        // echo is a regular builtin, so the function shadows it
        assert_eq!(result.stdout, "");
        assert_eq!(state.env.get_value("A").as_deref(), Some("1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_command_limit() {
        let engine = engine_with(ExecutionLimits {
            max_command_count: 10,
            ..ExecutionLimits::default()
        });
        let mut state = InterpreterState::default();
        let result = run(&engine, &mut state, "while true; do echo x; done");
        assert_eq!(result.exit_code, LIMIT_EXCEEDED_STATUS);
        assert!(result.stderr.contains("maximum command count exceeded"));
        assert!(result.stdout.starts_with("x\n"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interrupt_preserves_output() {
        let engine = engine_with(ExecutionLimits::default());
        let mut state = InterpreterState::default();
        let flag = Arc::clone(&engine.interrupt);
        let mut registry = BuiltinRegistry::default();
        registry.register(
            "stop",
            Arc::new(move |_: &mut BuiltinContext<'_>| {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, InterpreterError>(ExecResult::ok())
            }),
        );
        let engine = ExecutionEngine {
            builtins: Arc::new(registry),
            ..engine
        };
        let result = run(&engine, &mut state, "echo before; stop; echo after");
        assert_eq!(result.stdout, "before\n");
        assert_eq!(result.exit_code, INTERRUPTED_STATUS);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_syntax_error_in_eval() {
        let engine = engine_with(ExecutionLimits::default());
        let mut state = InterpreterState::default();
        let result = run(&engine, &mut state, "eval 'if'; echo $?");
        assert_eq!(result.stdout, "2\n");
        assert!(result.stderr.starts_with("bash: syntax error"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_xtrace() {
        let engine = engine_with(ExecutionLimits::default());
        let mut state = InterpreterState::default();
        let result = run(&engine, &mut state, "set -x; echo 'a b' c");
        assert_eq!(result.stdout, "a b c\n");
        assert_eq!(result.stderr, "+ echo 'a b' c\n");
    }

    #[test]
    fn test_error_to_result_statuses() {
        let limit = InterpreterError::ExecutionLimit(LimitError::new(LimitType::Iterations, "out".into(), String::new()));
        let result = error_to_result(limit);
        assert_eq!(result.exit_code, 126);
        assert_eq!(result.stdout, "out");
        assert_eq!(result.stderr, "bash: maximum loop iterations exceeded\n");
        assert_eq!(error_to_result(InterpreterError::BrokenPipe).exit_code, 141);
        let recursion = error_to_result(InterpreterError::RecursionLimit(LimitError::bare(LimitType::Recursion)));
        assert_eq!(recursion.exit_code, 1);
    }

    #[test]
    fn test_trace_line_quoting() {
        assert_eq!(trace_line(&["echo".into(), "".into(), "it's".into()]), "+ echo '' 'it'\\''s'\n");
    }
}
