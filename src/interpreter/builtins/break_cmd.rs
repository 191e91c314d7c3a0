//! break, continue - Loop control
//!
//! `break [n]` leaves `n` enclosing loops, `continue [n]` resumes the
//! `n`th enclosing loop. Outside a loop both are no-ops.

use super::BuiltinContext;
use crate::interpreter::errors::{BreakError, ContinueError, InterpreterError};
use crate::interpreter::types::ExecResult;

fn loop_levels(ctx: &BuiltinContext<'_>) -> Result<u32, ExecResult> {
    let levels = match ctx.args.first() {
        None => 1,
        Some(arg) => match arg.parse::<i64>() {
            Ok(n) if n >= 1 => n,
            Ok(_) => return Err(ctx.failure(format!("{}: loop count out of range", arg))),
            Err(_) => return Err(ctx.usage_error(format!("{}: numeric argument required", arg))),
        },
    };
    Ok(levels.min(ctx.state.loop_depth as i64) as u32)
}

pub fn handle_break(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    if ctx.state.loop_depth == 0 {
        return Ok(ExecResult::ok());
    }
    match loop_levels(ctx) {
        Ok(levels) => Err(BreakError::bare(levels).into()),
        Err(result) => Ok(result),
    }
}

pub fn handle_continue(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    if ctx.state.loop_depth == 0 {
        return Ok(ExecResult::ok());
    }
    match loop_levels(ctx) {
        Ok(levels) => Err(ContinueError::bare(levels).into()),
        Err(result) => Ok(result),
    }
}
