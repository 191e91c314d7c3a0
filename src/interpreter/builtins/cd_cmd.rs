//! cd, pwd - Working directory builtins
//!
//! Supports:
//! - cd [dir] - change to directory (HOME when omitted)
//! - cd - - change to previous directory (OLDPWD), printing it
//! - pwd - print the working directory

use super::{split_options, BuiltinContext};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::ExecResult;

pub fn handle_cd(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let (_, operands) = match ctx.args.first().map(String::as_str) {
        Some("-") => (Vec::new(), ctx.args),
        _ => split_options(ctx.args),
    };
    if operands.len() > 1 {
        return Ok(ctx.failure("too many arguments"));
    }

    let mut print_target = false;
    let target = match operands.first().map(String::as_str) {
        None => match ctx.state.env.get_value("HOME") {
            Some(home) if !home.is_empty() => home,
            _ => return Ok(ctx.failure("HOME not set")),
        },
        Some("-") => {
            print_target = true;
            match ctx.state.env.get_value("OLDPWD") {
                Some(old) => old,
                None => return Ok(ctx.failure("OLDPWD not set")),
            }
        }
        Some(dir) => dir.to_string(),
    };

    let resolved = ctx.fs().resolve_path(&ctx.state.cwd, &target);
    if !ctx.fs().exists(&resolved) {
        return Ok(ctx.failure(format!("{}: No such file or directory", target)));
    }
    if !ctx.fs().is_dir(&resolved) {
        return Ok(ctx.failure(format!("{}: Not a directory", target)));
    }

    let previous = std::mem::replace(&mut ctx.state.cwd, resolved.clone());
    ctx.state.previous_dir = previous.clone();
    ctx.state.env.set("OLDPWD", previous, false, false)?;
    ctx.state.env.set("PWD", resolved.clone(), false, false)?;

    let stdout = if print_target { format!("{}\n", resolved) } else { String::new() };
    Ok(ExecResult::success(stdout))
}

pub fn handle_pwd(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    Ok(ExecResult::success(format!("{}\n", ctx.state.cwd)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::fs::{FileSystem, InMemoryFs, MkdirOptions};
    use crate::interpreter::builtins::test_support::{run_fresh, run_in};
    use crate::interpreter::types::InterpreterState;

    async fn tree() -> Arc<InMemoryFs> {
        let fs = Arc::new(InMemoryFs::new());
        fs.mkdir("/work/sub", &MkdirOptions { recursive: true }).await.unwrap();
        fs.write_file("/work/notes", b"x").await.unwrap();
        fs
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cd_relative_and_pwd() {
        let mut state = InterpreterState::default();
        let result = run_in(tree().await, &mut state, "cd /work; cd sub; pwd; echo $PWD $OLDPWD");
        assert_eq!(result.stdout, "/work/sub\n/work/sub /work\n");
        assert_eq!(state.cwd, "/work/sub");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cd_dash_swaps_with_oldpwd() {
        let mut state = InterpreterState::default();
        let result = run_in(tree().await, &mut state, "cd /work/sub; cd /work; cd -; echo $OLDPWD; cd -");
        assert_eq!(result.stdout, "/work/sub\n/work\n/work\n");
        assert_eq!(state.cwd, "/work");

        let result = run_fresh("cd -");
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "bash: cd: OLDPWD not set\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cd_home() {
        let mut state = InterpreterState::default();
        let result = run_in(tree().await, &mut state, "HOME=/work; cd; pwd");
        assert_eq!(result.stdout, "/work\n");

        let result = run_fresh("cd");
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("HOME not set"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cd_errors_keep_cwd() {
        let mut state = InterpreterState::default();
        let result = run_in(tree().await, &mut state, "cd /work/missing");
        assert_eq!(result.stderr, "bash: cd: /work/missing: No such file or directory\n");
        assert_eq!(state.cwd, "/");

        let result = run_in(tree().await, &mut state, "cd /work/notes");
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("/work/notes: Not a directory"));

        let result = run_in(tree().await, &mut state, "cd /work sub");
        assert!(result.stderr.contains("too many arguments"));
        assert_eq!(state.cwd, "/");
    }
}
