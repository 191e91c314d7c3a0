//! local - Declare function-local variables
//!
//! `local NAME` creates an empty local (an existing local keeps its value);
//! `local NAME=value` assigns it. Only valid inside a function.

use super::declare_cmd::{declare_operands, Attributes};
use super::{split_options, BuiltinContext};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::ExecResult;

pub fn handle_local(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    if !ctx.state.env.in_function() {
        return Ok(ctx.failure("can only be used in a function"));
    }
    let (letters, operands) = split_options(ctx.args);
    let mut attributes = Attributes::default();
    for letter in letters {
        match letter {
            'x' => attributes.export = true,
            'r' => attributes.readonly = true,
            other => return Ok(ctx.usage_error(format!("-{}: invalid option", other))),
        }
    }
    Ok(declare_operands(ctx, operands, attributes, true))
}
