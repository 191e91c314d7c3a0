//! return - Leave the current function or sourced script

use super::exit_cmd::parse_status;
use super::BuiltinContext;
use crate::interpreter::errors::{InterpreterError, ReturnError};
use crate::interpreter::types::ExecResult;

pub fn handle_return(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    if !ctx.state.env.in_function() && ctx.state.source_depth == 0 {
        return Ok(ctx.failure("can only `return' from a function or sourced script"));
    }
    let code = match ctx.args.first() {
        None => ctx.state.last_exit_code,
        Some(arg) => match parse_status(arg) {
            Some(code) => code,
            None => return Ok(ctx.usage_error(format!("{}: numeric argument required", arg))),
        },
    };
    Err(ReturnError::bare(code).into())
}
