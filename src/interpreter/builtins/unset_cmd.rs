//! unset - Remove variables or functions
//!
//! Usage:
//!   unset NAME...     - unset variables (falls back to functions)
//!   unset -v NAME...  - unset variables only
//!   unset -f NAME...  - unset functions only

use super::{split_options, BuiltinContext};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::ExecResult;
use crate::parser::word_parser::is_valid_name;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Target {
    Any,
    Variables,
    Functions,
}

pub fn handle_unset(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let (letters, operands) = split_options(ctx.args);
    let mut target = Target::Any;
    for letter in letters {
        target = match letter {
            'v' => Target::Variables,
            'f' => Target::Functions,
            other => return Ok(ctx.usage_error(format!("-{}: invalid option", other))),
        };
    }

    let mut stderr = String::new();
    let mut exit_code = 0;
    for name in operands {
        if target == Target::Functions {
            ctx.state.functions.remove(name);
            continue;
        }
        if !is_valid_name(name) {
            stderr.push_str(&format!("bash: unset: `{}': not a valid identifier\n", name));
            exit_code = 1;
            continue;
        }
        match ctx.state.env.unset(name) {
            Ok(true) => {}
            Ok(false) if target == Target::Any => {
                ctx.state.functions.remove(name);
            }
            Ok(false) => {}
            Err(e) => {
                stderr.push_str(&format!("bash: unset: {}\n", e));
                exit_code = 1;
            }
        }
    }
    Ok(ExecResult::new(String::new(), stderr, exit_code))
}
