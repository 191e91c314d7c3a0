//! Control Flow Execution
//!
//! Handles control flow constructs:
//! - if/elif/else
//! - for loops
//! - while loops
//! - until loops
//! - case statements
//! - break/continue
//!
//! Conditions run with errexit suppressed. Loop bodies see `loop_depth`
//! raised so `break N`/`continue N` can unwind the right number of loops.

use crate::ast::types::{CaseNode, CaseTerminator, ForNode, IfNode, StatementNode, UntilNode, WhileNode, WordNode};
use crate::interpreter::errors::{InterpreterError, LimitError, LimitType};
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::expansion::matches_pattern;
use crate::interpreter::io::IoContext;
use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::parser::word_parser::is_valid_name;

/// Output and status accumulated over the iterations of one loop.
#[derive(Debug, Default)]
struct LoopOutput {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

impl LoopOutput {
    fn push(&mut self, stdout: &str, stderr: &str) {
        self.stdout.push_str(stdout);
        self.stderr.push_str(stderr);
    }

    /// Fold one run of the body into the loop. Returns true when the loop
    /// must stop; outer-level break/continue keep unwinding.
    fn absorb(&mut self, outcome: Result<ExecResult, InterpreterError>) -> Result<bool, InterpreterError> {
        match outcome {
            Ok(result) => {
                self.push(&result.stdout, &result.stderr);
                self.exit_code = result.exit_code;
                Ok(false)
            }
            Err(InterpreterError::Break(mut e)) => {
                self.push(&e.stdout, &e.stderr);
                self.exit_code = 0;
                if e.levels > 1 {
                    e.levels -= 1;
                    e.stdout = std::mem::take(&mut self.stdout);
                    e.stderr = std::mem::take(&mut self.stderr);
                    return Err(InterpreterError::Break(e));
                }
                Ok(true)
            }
            Err(InterpreterError::Continue(mut e)) => {
                self.push(&e.stdout, &e.stderr);
                self.exit_code = 0;
                if e.levels > 1 {
                    e.levels -= 1;
                    e.stdout = std::mem::take(&mut self.stdout);
                    e.stderr = std::mem::take(&mut self.stderr);
                    return Err(InterpreterError::Continue(e));
                }
                Ok(false)
            }
            Err(mut e) => {
                e.prepend_output(&self.stdout, &self.stderr);
                Err(e)
            }
        }
    }

    fn limit_exceeded(&mut self) -> InterpreterError {
        InterpreterError::ExecutionLimit(LimitError::new(
            LimitType::Iterations,
            std::mem::take(&mut self.stdout),
            std::mem::take(&mut self.stderr),
        ))
    }

    fn finish(self) -> ExecResult {
        ExecResult::new(self.stdout, self.stderr, self.exit_code)
    }
}

/// Prefix already produced output to a result or unwinding error.
fn with_prefix(stdout: &str, stderr: &str, outcome: Result<ExecResult, InterpreterError>) -> Result<ExecResult, InterpreterError> {
    match outcome {
        Ok(mut result) => {
            result.stdout.insert_str(0, stdout);
            result.stderr.insert_str(0, stderr);
            Ok(result)
        }
        Err(mut e) => {
            e.prepend_output(stdout, stderr);
            Err(e)
        }
    }
}

impl ExecutionEngine {
    /// Run a condition list with errexit suppressed.
    pub fn execute_condition(
        &self,
        state: &mut InterpreterState,
        condition: &[StatementNode],
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        state.condition_depth += 1;
        let outcome = self.execute_statements(state, condition, io);
        state.condition_depth -= 1;
        outcome
    }

    /// Execute an if/elif/else statement.
    pub fn execute_if(&self, state: &mut InterpreterState, node: &IfNode, io: &mut IoContext) -> Result<ExecResult, InterpreterError> {
        let mut stdout = String::new();
        let mut stderr = String::new();

        for clause in &node.clauses {
            let condition = with_prefix(&stdout, &stderr, self.execute_condition(state, &clause.condition, io))?;
            stdout = condition.stdout;
            stderr = condition.stderr;
            if condition.exit_code == 0 {
                return with_prefix(&stdout, &stderr, self.execute_statements(state, &clause.body, io));
            }
        }

        match &node.else_body {
            Some(body) => with_prefix(&stdout, &stderr, self.execute_statements(state, body, io)),
            None => Ok(ExecResult::new(stdout, stderr, 0)),
        }
    }

    /// Execute a for loop: for VAR in WORDS; do BODY; done
    pub fn execute_for(&self, state: &mut InterpreterState, node: &ForNode, io: &mut IoContext) -> Result<ExecResult, InterpreterError> {
        if !is_valid_name(&node.variable) {
            return Ok(ExecResult::failure(format!("bash: `{}': not a valid identifier\n", node.variable)));
        }
        let items = match &node.words {
            Some(words) => self.expand_words(state, words)?,
            None => state.env.positional().to_vec(),
        };

        state.loop_depth += 1;
        let outcome = self.run_for(state, node, items, io);
        state.loop_depth -= 1;
        outcome
    }

    fn run_for(
        &self,
        state: &mut InterpreterState,
        node: &ForNode,
        items: Vec<String>,
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        let mut out = LoopOutput::default();
        for (iteration, item) in items.into_iter().enumerate() {
            if iteration as u64 >= self.limits.max_loop_iterations {
                return Err(out.limit_exceeded());
            }
            let export = state.options.allexport;
            if let Err(e) = state.env.set(&node.variable, item, export, false) {
                out.stderr.push_str(&format!("bash: {}\n", e));
                out.exit_code = 1;
                break;
            }
            if out.absorb(self.execute_statements(state, &node.body, io))? {
                break;
            }
        }
        Ok(out.finish())
    }

    /// Execute a while loop.
    pub fn execute_while(&self, state: &mut InterpreterState, node: &WhileNode, io: &mut IoContext) -> Result<ExecResult, InterpreterError> {
        self.execute_conditional_loop(state, &node.condition, &node.body, false, io)
    }

    /// Execute an until loop.
    pub fn execute_until(&self, state: &mut InterpreterState, node: &UntilNode, io: &mut IoContext) -> Result<ExecResult, InterpreterError> {
        self.execute_conditional_loop(state, &node.condition, &node.body, true, io)
    }

    fn execute_conditional_loop(
        &self,
        state: &mut InterpreterState,
        condition: &[StatementNode],
        body: &[StatementNode],
        until: bool,
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        state.loop_depth += 1;
        let outcome = self.run_conditional_loop(state, condition, body, until, io);
        state.loop_depth -= 1;
        outcome
    }

    fn run_conditional_loop(
        &self,
        state: &mut InterpreterState,
        condition: &[StatementNode],
        body: &[StatementNode],
        until: bool,
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        let mut out = LoopOutput::default();
        let mut iterations: u64 = 0;
        loop {
            if iterations >= self.limits.max_loop_iterations {
                return Err(out.limit_exceeded());
            }
            iterations += 1;

            let status = match self.execute_condition(state, condition, io) {
                Ok(result) => {
                    out.push(&result.stdout, &result.stderr);
                    result.exit_code
                }
                // break/continue inside the condition itself
                Err(e) => {
                    if out.absorb(Err(e))? {
                        break;
                    }
                    continue;
                }
            };
            if (status == 0) == until {
                break;
            }
            if out.absorb(self.execute_statements(state, body, io))? {
                break;
            }
        }
        Ok(out.finish())
    }

    /// Execute a case statement.
    pub fn execute_case(&self, state: &mut InterpreterState, node: &CaseNode, io: &mut IoContext) -> Result<ExecResult, InterpreterError> {
        let subject = self.expand_word_to_string(state, &node.word)?;
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        let mut fall_through = false;

        for item in &node.items {
            if !fall_through && !self.case_item_matches(state, &item.patterns, &subject)? {
                continue;
            }
            let result = with_prefix(&stdout, &stderr, self.execute_statements(state, &item.body, io))?;
            stdout = result.stdout;
            stderr = result.stderr;
            exit_code = result.exit_code;
            match item.terminator {
                CaseTerminator::DoubleSemi => break,
                CaseTerminator::SemiAnd => fall_through = true,
                CaseTerminator::SemiSemiAnd => fall_through = false,
            }
        }
        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    fn case_item_matches(
        &self,
        state: &mut InterpreterState,
        patterns: &[WordNode],
        subject: &str,
    ) -> Result<bool, InterpreterError> {
        for pattern in patterns {
            let pattern = self.expand_word_to_pattern(state, pattern)?;
            if matches_pattern(subject, &pattern) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fs::InMemoryFs;
    use crate::interpreter::builtins::BuiltinRegistry;
    use crate::interpreter::command_resolution::NotFoundResolver;
    use crate::interpreter::errors::BreakError;
    use crate::interpreter::sync_fs_adapter::SyncFsAdapter;
    use crate::interpreter::types::ExecutionLimits;
    use crate::parser::parse;

    fn run_with(limits: ExecutionLimits, script: &str) -> ExecResult {
        let fs = Arc::new(SyncFsAdapter::new(Arc::new(InMemoryFs::new()), tokio::runtime::Handle::current()));
        let engine = ExecutionEngine::new(fs, Arc::new(BuiltinRegistry::default()), Arc::new(NotFoundResolver), limits);
        let mut state = InterpreterState::default();
        engine.run_script(&mut state, &parse(script).unwrap())
    }

    fn run(script: &str) -> ExecResult {
        run_with(ExecutionLimits::default(), script)
    }

    #[test]
    fn test_absorb_multi_level_break() {
        let mut out = LoopOutput::default();
        out.push("a\n", "");
        let err = out.absorb(Err(BreakError::new(2, "b\n".into(), String::new()).into())).unwrap_err();
        match err {
            InterpreterError::Break(e) => {
                assert_eq!(e.levels, 1);
                assert_eq!(e.stdout, "a\nb\n");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_if_elif_else() {
        let result = run("if false; then echo 1; elif true; then echo 2; else echo 3; fi");
        assert_eq!(result.stdout, "2\n");
        let result = run("if false; then echo 1; fi; echo $?");
        assert_eq!(result.stdout, "0\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_for_loop_with_break_and_continue() {
        let result = run("for i in 1 2 3 4; do if [ $i = 2 ]; then continue; fi; if [ $i = 4 ]; then break; fi; echo $i; done");
        assert_eq!(result.stdout, "1\n3\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nested_break_levels() {
        let result = run("for a in x y; do for b in 1 2; do echo $a$b; break 2; done; done; echo end");
        assert_eq!(result.stdout, "x1\nend\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_while_and_until() {
        let result = run("n=0; while [ $n -lt 3 ]; do echo $n; n=$((n+1)); done; until [ $n -eq 0 ]; do n=$((n-1)); done; echo $n");
        assert_eq!(result.stdout, "0\n1\n2\n0\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_loop_iteration_limit() {
        let limits = ExecutionLimits {
            max_loop_iterations: 5,
            ..ExecutionLimits::default()
        };
        let result = run_with(limits, "while true; do echo x; done");
        assert_eq!(result.exit_code, 126);
        assert_eq!(result.stdout, "x\n".repeat(5));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_case_terminators() {
        let result = run("case foo in f*) echo one ;& bar) echo two ;; *) echo three ;; esac");
        assert_eq!(result.stdout, "one\ntwo\n");
        let result = run("case foo in f*) echo one ;;& *o) echo two ;;& x) echo three ;; esac");
        assert_eq!(result.stdout, "one\ntwo\n");
        let result = run("x='*'; case abc in \"$x\") echo literal ;; $x) echo glob ;; esac");
        assert_eq!(result.stdout, "glob\n");
    }
}
