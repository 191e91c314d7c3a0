//! Function Calls
//!
//! A call pushes a function scope binding the call's arguments as the
//! positional parameters, runs the body compound command and catches
//! `return`. Calls count towards the recursion limit.

use tracing::trace;

use crate::ast::types::FunctionDefNode;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::io::IoContext;
use crate::interpreter::types::{ExecResult, InterpreterState};

impl ExecutionEngine {
    /// Invoke a shell function with `args` as `$1..`.
    pub fn call_function(
        &self,
        state: &mut InterpreterState,
        function: &FunctionDefNode,
        args: &[String],
        io: &mut IoContext,
    ) -> Result<ExecResult, InterpreterError> {
        self.enter_call(state)?;
        trace!(function = %function.name, depth = state.call_depth, "calling function");
        state.env.push_function_scope(args.to_vec());
        // break/continue cannot reach loops outside the function
        let saved_loop_depth = std::mem::replace(&mut state.loop_depth, 0);

        let outcome = self.execute_compound(state, &function.body, io);

        state.loop_depth = saved_loop_depth;
        state.env.pop_scope();
        state.call_depth -= 1;

        match outcome {
            Err(InterpreterError::Return(e)) => Ok(ExecResult::new(e.stdout, e.stderr, e.exit_code)),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fs::InMemoryFs;
    use crate::interpreter::builtins::BuiltinRegistry;
    use crate::interpreter::command_resolution::NotFoundResolver;
    use crate::interpreter::sync_fs_adapter::SyncFsAdapter;
    use crate::interpreter::types::ExecutionLimits;
    use crate::parser::parse;

    fn run_with(limits: ExecutionLimits, state: &mut InterpreterState, script: &str) -> ExecResult {
        let fs = Arc::new(SyncFsAdapter::new(Arc::new(InMemoryFs::new()), tokio::runtime::Handle::current()));
        let engine = ExecutionEngine::new(fs, Arc::new(BuiltinRegistry::default()), Arc::new(NotFoundResolver), limits);
        engine.run_script(state, &parse(script).unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_positional_parameters_and_return() {
        let mut state = InterpreterState::default();
        let result = run_with(
            ExecutionLimits::default(),
            &mut state,
            "greet() { echo \"$# $1-$2\"; return 4; echo never; }; greet a b; echo $? $#",
        );
        assert_eq!(result.stdout, "2 a-b\n4 0\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_locals_are_scoped_to_the_call() {
        let mut state = InterpreterState::default();
        let result = run_with(
            ExecutionLimits::default(),
            &mut state,
            "x=global; f() { local x=inner; y=leaked; echo $x; }; f; echo $x $y",
        );
        assert_eq!(result.stdout, "inner\nglobal leaked\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recursion_limit() {
        let mut state = InterpreterState::default();
        let limits = ExecutionLimits {
            max_recursion_depth: 20,
            ..ExecutionLimits::default()
        };
        let result = run_with(limits, &mut state, "f() { f; }; f");
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("maximum recursion depth exceeded"));
        assert_eq!(state.call_depth, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_function_in_pipeline_streams_output() {
        let mut state = InterpreterState::default();
        let result = run_with(
            ExecutionLimits::default(),
            &mut state,
            "count() { for i in 1 2 3; do echo $i; done; }; count | { read a; read b; echo \"$b$a\"; }",
        );
        assert_eq!(result.stdout, "21\n");
    }
}
