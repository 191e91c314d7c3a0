//! exit - Terminate the shell
//!
//! `exit [n]` unwinds to the `exec` boundary with status `n & 255`,
//! defaulting to the last command's status.

use super::BuiltinContext;
use crate::interpreter::errors::{ExitError, InterpreterError};
use crate::interpreter::types::ExecResult;

/// Parse a status argument the way `exit`/`return` do.
pub(crate) fn parse_status(arg: &str) -> Option<i32> {
    arg.trim().parse::<i64>().ok().map(|n| n.rem_euclid(256) as i32)
}

pub fn handle_exit(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let code = match ctx.args.first() {
        None => ctx.state.last_exit_code,
        Some(arg) => match parse_status(arg) {
            Some(code) => code,
            None => {
                let message = format!("bash: exit: {}: numeric argument required\n", arg);
                return Err(ExitError::new(2, String::new(), message).into());
            }
        },
    };
    Err(ExitError::bare(code).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_wraps() {
        assert_eq!(parse_status("3"), Some(3));
        assert_eq!(parse_status("256"), Some(0));
        assert_eq!(parse_status("-1"), Some(255));
        assert_eq!(parse_status("x"), None);
    }
}
