//! type, command, builtin - Command lookup builtins
//!
//! - type NAME...: describe how each name would be resolved
//! - command [-v] NAME ARGS...: run NAME ignoring shell functions
//! - builtin NAME ARGS...: run the builtin NAME

use super::{is_special_builtin, BuiltinContext};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::CommandLookup;
use crate::interpreter::types::ExecResult;

const RESERVED_WORDS: &[&str] = &[
    "!", "case", "do", "done", "elif", "else", "esac", "fi", "for", "function", "if", "in", "then", "until",
    "while", "{", "}",
];

/// How `name` resolves, or `None` for an unknown (external) command.
fn describe(ctx: &BuiltinContext<'_>, name: &str) -> Option<String> {
    if let Some(value) = ctx.state.aliases.get(name) {
        return Some(format!("{} is aliased to `{}'", name, value));
    }
    if RESERVED_WORDS.contains(&name) {
        return Some(format!("{} is a shell keyword", name));
    }
    let builtin = ctx.engine.builtins.contains(name);
    if builtin && is_special_builtin(name) {
        return Some(format!("{} is a special shell builtin", name));
    }
    if ctx.state.functions.contains_key(name) {
        return Some(format!("{} is a function", name));
    }
    builtin.then(|| format!("{} is a shell builtin", name))
}

pub fn handle_type(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let mut result = ExecResult::ok();
    for name in ctx.args {
        match describe(ctx, name) {
            Some(line) => {
                result.stdout.push_str(&line);
                result.stdout.push('\n');
            }
            None => {
                result.stderr.push_str(&format!("bash: type: {}: not found\n", name));
                result.exit_code = 1;
            }
        }
    }
    Ok(result)
}

pub fn handle_command(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let args = ctx.args;
    match args.first().map(String::as_str) {
        None => Ok(ExecResult::ok()),
        Some("-v") => {
            let mut result = ExecResult::ok();
            for name in &args[1..] {
                let known = ctx.state.aliases.contains_key(name.as_str())
                    || ctx.engine.builtins.contains(name)
                    || ctx.state.functions.contains_key(name.as_str());
                if known {
                    result.stdout.push_str(name);
                    result.stdout.push('\n');
                } else {
                    result.exit_code = 1;
                }
            }
            Ok(result)
        }
        Some(_) => ctx.engine.dispatch(ctx.state, args, ctx.stdin, CommandLookup::SkipFunctions),
    }
}

pub fn handle_builtin(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let args = ctx.args;
    match args.first() {
        None => Ok(ExecResult::ok()),
        Some(name) if !ctx.engine.builtins.contains(name) => {
            Ok(ctx.failure(format!("{}: not a shell builtin", name)))
        }
        Some(_) => ctx.engine.dispatch(ctx.state, args, ctx.stdin, CommandLookup::BuiltinsOnly),
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::builtins::test_support::run_fresh;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_type_describes_each_kind() {
        let result = run_fresh("alias ll='ls -l'; f() { :; }; type ll if export echo f");
        assert_eq!(
            result.stdout,
            "ll is aliased to `ls -l'\nif is a shell keyword\nexport is a special shell builtin\necho is a shell builtin\nf is a function\n"
        );
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_type_unknown_name() {
        let result = run_fresh("type echo nope");
        assert_eq!(result.stdout, "echo is a shell builtin\n");
        assert_eq!(result.stderr, "bash: type: nope: not found\n");
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_command_skips_functions() {
        let result = run_fresh("echo() { builtin echo wrapped; }; echo x; command echo plain");
        assert_eq!(result.stdout, "wrapped\nplain\n");

        let result = run_fresh("f() { :; }; command -v echo f nope; echo $?");
        assert_eq!(result.stdout, "echo\nf\n1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_builtin_requires_a_builtin() {
        let result = run_fresh("f() { :; }; builtin f");
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "bash: builtin: f: not a shell builtin\n");
        assert_eq!(run_fresh("builtin; echo $?").stdout, "0\n");
    }
}
