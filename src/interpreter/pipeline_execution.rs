//! Pipeline Execution
//!
//! Handles execution of command pipelines (cmd1 | cmd2 | cmd3).
//!
//! Every stage runs concurrently against its own state snapshot, on a
//! scoped engine thread, connected to the next stage by a bounded pipe.
//! The last stage runs on the calling thread. A stage whose reader has
//! gone away stops with status 141.
//!
//! Stage threads borrow the AST and get `ExecutionLimits::stack_size`,
//! which tasks on the runtime's blocking pool cannot be given.

use tracing::{debug, trace};

use crate::ast::types::{CommandNode, PipelineNode};
use crate::interpreter::environment::VarValue;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::{ExecutionEngine, BROKEN_PIPE_STATUS};
use crate::interpreter::io::{pipe, IoContext, InputStream};
use crate::interpreter::subshell_group::isolated_result;
use crate::interpreter::types::{ExecResult, InterpreterState};

/// What a finished stage hands back to the pipeline.
struct StageOutcome {
    result: Result<ExecResult, InterpreterError>,
    /// Commands the stage ran
    commands: u64,
    /// The stage's stdin, returned so the first stage does not consume
    /// more of the parent's input than it read
    stdin: InputStream,
}

/// A stage's own result: unwinding signals end only the stage.
fn stage_result(outcome: Result<ExecResult, InterpreterError>) -> Result<ExecResult, InterpreterError> {
    match outcome {
        Err(InterpreterError::BrokenPipe) => Ok(ExecResult::with_code(BROKEN_PIPE_STATUS)),
        Err(e) => isolated_result(e),
        ok => ok,
    }
}

/// Pipeline status: the last stage's, or with pipefail the first
/// non-zero one.
pub fn pipeline_status(statuses: &[i32], pipefail: bool) -> i32 {
    let last = statuses.last().copied().unwrap_or(0);
    if pipefail {
        statuses.iter().copied().find(|&code| code != 0).unwrap_or(0)
    } else {
        last
    }
}

/// Record stage statuses in PIPESTATUS.
pub fn set_pipestatus(state: &mut InterpreterState, statuses: &[i32]) {
    let items: Vec<String> = statuses.iter().map(|code| code.to_string()).collect();
    if let Err(e) = state.env.set("PIPESTATUS", VarValue::Array(items), false, false) {
        debug!(error = %e, "PIPESTATUS not updated");
    }
}

impl ExecutionEngine {
    /// Execute a pipeline, applying `!` negation.
    pub fn execute_pipeline(
        &self,
        state: &mut InterpreterState,
        pipeline: &PipelineNode,
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        // set -e is ignored inside a negated pipeline
        if pipeline.negated {
            state.condition_depth += 1;
        }
        let outcome = match pipeline.commands.as_slice() {
            [single] => self.execute_command(state, single, io).map(|result| {
                set_pipestatus(state, &[result.exit_code]);
                result
            }),
            commands => self.execute_stages(state, commands, io),
        };
        if pipeline.negated {
            state.condition_depth -= 1;
        }

        let mut result = outcome?;
        if pipeline.negated {
            result.exit_code = if result.exit_code == 0 { 1 } else { 0 };
        }
        Ok(result)
    }

    fn execute_stages(
        &self,
        state: &mut InterpreterState,
        commands: &[CommandNode],
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        let Some((last_command, leading)) = commands.split_last() else {
            return Ok(ExecResult::ok());
        };
        debug!(stages = commands.len(), "starting pipeline");
        let base_count = state.command_count;

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(leading.len());
            let mut next_stdin = std::mem::take(&mut io.stdin);

            for (i, command) in leading.iter().enumerate() {
                let (writer, reader) = pipe(self.limits.pipe_capacity);
                let stdin = std::mem::replace(&mut next_stdin, InputStream::Pipe(reader));
                let mut stage_state = state.subshell();
                let spawned = std::thread::Builder::new()
                    .name(format!("bashlet-stage-{}", i))
                    .stack_size(self.limits.stack_size)
                    .spawn_scoped(scope, move || {
                        let mut stage_io = IoContext::new(stdin, Some(writer));
                        let mut result = stage_result(self.execute_command(&mut stage_state, command, &mut stage_io));
                        if let Ok(done) = &mut result {
                            if stage_io.flush(&mut done.stdout).is_err() {
                                trace!(stage = i, "reader closed before final output");
                                done.stdout.clear();
                            }
                        }
                        let IoContext { stdin, sink } = stage_io;
                        drop(sink);
                        StageOutcome {
                            result,
                            commands: stage_state.command_count.saturating_sub(base_count),
                            stdin,
                        }
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => return Err(InterpreterError::Internal(format!("failed to start pipeline stage: {}", e))),
                }
            }

            let mut last_state = state.subshell();
            let mut last_io = IoContext::new(next_stdin, io.sink.clone());
            let last_result = stage_result(self.execute_command(&mut last_state, last_command, &mut last_io));
            drop(last_io);

            let mut statuses = Vec::with_capacity(commands.len());
            let mut stderr = String::new();
            let mut commands_run = last_state.command_count.saturating_sub(base_count);
            let mut failure: Option<InterpreterError> = None;
            for (i, handle) in handles.into_iter().enumerate() {
                let outcome = handle
                    .join()
                    .map_err(|_| InterpreterError::Internal("pipeline stage panicked".to_string()))?;
                if i == 0 {
                    io.stdin = outcome.stdin;
                }
                commands_run += outcome.commands;
                match outcome.result {
                    Ok(done) => {
                        stderr.push_str(&done.stderr);
                        statuses.push(done.exit_code);
                    }
                    Err(e) => {
                        statuses.push(1);
                        failure.get_or_insert(e);
                    }
                }
            }
            state.command_count = base_count + commands_run;

            let last = match (failure, last_result) {
                (Some(e), _) | (None, Err(e)) => return Err(e),
                (None, Ok(last)) => last,
            };
            statuses.push(last.exit_code);
            stderr.push_str(&last.stderr);
            set_pipestatus(state, &statuses);
            let exit_code = pipeline_status(&statuses, state.options.pipefail);
            Ok(ExecResult::new(last.stdout, stderr, exit_code))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fs::InMemoryFs;
    use crate::interpreter::builtins::BuiltinRegistry;
    use crate::interpreter::command_resolution::{CommandRequest, CommandResolver};
    use crate::interpreter::sync_fs_adapter::SyncFsAdapter;
    use crate::interpreter::types::ExecutionLimits;
    use crate::parser::parse;

    /// `cat` and `head -1` stand-ins.
    fn tools(mut request: CommandRequest<'_>) -> ExecResult {
        match request.name() {
            "cat" => ExecResult::success(request.stdin.read_to_string()),
            "head" => ExecResult::success(request.stdin.read_line().unwrap_or_default()),
            "upper" => ExecResult::success(request.stdin.read_to_string().to_uppercase()),
            name => ExecResult::failure_with_code(format!("bash: {}: command not found\n", name), 127),
        }
    }

    fn run(state: &mut InterpreterState, script: &str) -> ExecResult {
        let fs = Arc::new(SyncFsAdapter::new(Arc::new(InMemoryFs::new()), tokio::runtime::Handle::current()));
        let resolver: Arc<dyn CommandResolver> = Arc::new(tools);
        let engine = ExecutionEngine::new(fs, Arc::new(BuiltinRegistry::default()), resolver, ExecutionLimits::default());
        engine.run_script(state, &parse(script).unwrap())
    }

    #[test]
    fn test_pipeline_status() {
        assert_eq!(pipeline_status(&[1, 0], false), 0);
        assert_eq!(pipeline_status(&[0, 3, 4], true), 3);
        assert_eq!(pipeline_status(&[0, 0], true), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_output_flows_between_stages() {
        let mut state = InterpreterState::default();
        let result = run(&mut state, "echo hello | upper | cat");
        assert_eq!(result.stdout, "HELLO\n");
        assert_eq!(state.env.get("PIPESTATUS").map(|v| v.value.as_scalar()).as_deref(), Some("0"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_infinite_producer_stops_on_closed_reader() {
        let mut state = InterpreterState::default();
        let result = run(&mut state, "while true; do echo y; done | head; echo \"${PIPESTATUS[0]} ${PIPESTATUS[1]}\"");
        assert_eq!(result.stdout, "y\n141 0\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stage_state_is_isolated() {
        let mut state = InterpreterState::default();
        let result = run(&mut state, "X=1; X=2 | cat; echo $X | cat");
        assert_eq!(result.stdout, "1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipefail_and_negation() {
        let mut state = InterpreterState::default();
        let result = run(&mut state, "false | true; echo $?; set -o pipefail; false | true; echo $?; ! false | false; echo $?");
        assert_eq!(result.stdout, "0\n1\n0\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_loop_keeps_its_stdin_across_inner_pipelines() {
        let mut state = InterpreterState::default();
        let result = run(&mut state, "while read line; do echo \"$line\" | upper; done <<EOF\na\nb\nEOF");
        assert_eq!(result.stdout, "A\nB\n");
    }
}
