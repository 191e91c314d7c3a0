//! shift - Drop leading positional parameters

use super::BuiltinContext;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::ExecResult;

pub fn handle_shift(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let count = match ctx.args.first() {
        None => 1,
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) => n,
            Err(_) => return Ok(ctx.failure(format!("{}: numeric argument required", arg))),
        },
    };
    let positional = ctx.state.env.positional();
    if count > positional.len() {
        return Ok(ExecResult::with_code(1));
    }
    let rest = positional[count..].to_vec();
    ctx.state.env.set_positional(rest);
    Ok(ExecResult::ok())
}

#[cfg(test)]
mod tests {
    use crate::interpreter::builtins::test_support::run_fresh;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shift() {
        let result = run_fresh("set -- a b c d; shift; echo \"$# $*\"; shift 2; echo \"$# $*\"; shift 0; echo $1");
        assert_eq!(result.stdout, "3 b c d\n1 d\nd\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shift_past_the_count_keeps_parameters() {
        let result = run_fresh("set -- a b; shift 3; echo \"$? $*\"; shift 2; echo \"$? $#\"; shift; echo $?");
        assert_eq!(result.stdout, "1 a b\n0 0\n1\n");
        assert_eq!(result.stderr, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shift_requires_a_number() {
        let result = run_fresh("set -- a; shift x; echo \"$? $1\"");
        assert_eq!(result.stdout, "1 a\n");
        assert!(result.stderr.contains("shift: x: numeric argument required"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shift_in_function_uses_its_arguments() {
        let result = run_fresh("set -- outer; f() { shift; echo \"$*\"; }; f x y z; echo $1");
        assert_eq!(result.stdout, "y z\nouter\n");
    }
}
