//! eval, source - Run text as shell code in the current shell
//!
//! `eval ARGS...` joins its arguments with spaces and runs the result.
//! `source FILE [ARGS...]` (also `.`) runs a file from the virtual
//! filesystem; extra arguments become the positional parameters for its
//! duration and `return` leaves it.

use super::BuiltinContext;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::ExecResult;

pub fn handle_eval(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let script = ctx.args.join(" ");
    if script.trim().is_empty() {
        return Ok(ExecResult::ok());
    }
    ctx.run_script(&script)
}

pub fn handle_source(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let Some((file, args)) = ctx.args.split_first() else {
        return Ok(ctx.usage_error("filename argument required"));
    };
    let path = ctx.fs().resolve_path(&ctx.state.cwd, file);
    let script = match ctx.fs().read_file(&path) {
        Ok(script) => script,
        Err(e) => return Ok(ctx.failure(format!("{}: {}", file, e.shell_message()))),
    };

    let saved_args = (!args.is_empty()).then(|| {
        let saved = ctx.state.env.positional().to_vec();
        ctx.state.env.set_positional(args.to_vec());
        saved
    });
    ctx.state.source_depth += 1;
    let outcome = ctx.run_script(&script);
    ctx.state.source_depth -= 1;
    if let Some(saved) = saved_args {
        ctx.state.env.set_positional(saved);
    }

    match outcome {
        Err(InterpreterError::Return(e)) => Ok(ExecResult::new(e.stdout, e.stderr, e.exit_code)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::fs::{FileSystem, InMemoryFs};
    use crate::interpreter::builtins::test_support::{run, run_fresh, run_in};
    use crate::interpreter::types::InterpreterState;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_eval_runs_in_current_shell() {
        let mut state = InterpreterState::default();
        let result = run(&mut state, "cmd='X=5; echo $X'; eval \"$cmd\"; echo after $X");
        assert_eq!(result.stdout, "5\nafter 5\n");
        assert_eq!(state.env.get_value("X").as_deref(), Some("5"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_eval_joins_arguments() {
        assert_eq!(run_fresh("eval echo a '\"b  c\"'").stdout, "a b  c\n");
        assert_eq!(run_fresh("eval; echo $?").stdout, "0\n");
        assert_eq!(run_fresh("false; eval ''; echo $?").stdout, "0\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_eval_syntax_error() {
        let result = run_fresh("eval 'if then'; echo \"status $?\"");
        assert_eq!(result.stdout, "status 2\n");
        assert!(result.stderr.starts_with("bash: syntax error"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_source_with_arguments_and_return() {
        let fs = Arc::new(InMemoryFs::new());
        fs.write_file("/lib.sh", b"echo \"sourced $1\"\nLIB=loaded\nreturn 3\necho unreachable\n")
            .await
            .unwrap();
        let mut state = InterpreterState::default();
        let result = run_in(fs, &mut state, "set -- orig; source /lib.sh arg; echo \"$? $1 $LIB\"; . /lib.sh; echo $?");
        assert_eq!(result.stdout, "sourced arg\n3 orig loaded\nsourced orig\n3\n");
        assert_eq!(state.source_depth, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_source_errors() {
        let result = run_fresh("source /missing.sh");
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "bash: source: /missing.sh: No such file or directory\n");

        let result = run_fresh(".");
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("filename argument required"));
    }
}
