//! export - Set the export attribute of variables
//!
//! Usage:
//!   export              - List all exported variables
//!   export -p           - List all exported variables (same as no args)
//!   export NAME=value   - Set and export variable
//!   export NAME+=value  - Append value and export variable
//!   export NAME         - Export existing variable (or create empty)
//!   export -n NAME      - Clear the export attribute, keeping the value

use super::{shell_quote, split_options, AssignmentArg, BuiltinContext};
use crate::interpreter::environment::Environment;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::ExecResult;

/// `declare -x NAME='value'` for every exported variable, sorted by name.
pub fn export_listing(env: &Environment) -> String {
    env.flatten_exported()
        .iter()
        .map(|(name, value)| format!("declare -x {}={}\n", name, shell_quote(value)))
        .collect()
}

pub fn handle_export(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let (letters, operands) = split_options(ctx.args);
    let mut unexport = false;
    for letter in letters {
        match letter {
            'n' => unexport = true,
            'p' => {}
            other => {
                return Ok(ctx.usage_error(format!(
                    "-{}: invalid option\nexport: usage: export [-n] [-p] [name[=value] ...]",
                    other
                )))
            }
        }
    }

    if operands.is_empty() {
        return Ok(ExecResult::success(export_listing(&ctx.state.env)));
    }

    let mut stderr = String::new();
    let mut exit_code = 0;
    for operand in operands {
        let Some(arg) = AssignmentArg::parse(operand) else {
            stderr.push_str(&format!("bash: export: `{}': not a valid identifier\n", operand));
            exit_code = 1;
            continue;
        };
        let env = &mut ctx.state.env;
        let outcome = match (arg.value, unexport) {
            (Some(value), true) => env.set(arg.name, value, false, false).map(|_| {
                env.clear_exported(arg.name);
            }),
            (None, true) => {
                env.clear_exported(arg.name);
                Ok(())
            }
            (Some(value), false) if arg.append => env.append(arg.name, value, true),
            (Some(value), false) => env.set(arg.name, value, true, false),
            (None, false) => {
                if env.mark_exported(arg.name) {
                    Ok(())
                } else {
                    env.set(arg.name, "", true, false)
                }
            }
        };
        if let Err(e) = outcome {
            stderr.push_str(&format!("bash: {}\n", e));
            exit_code = 1;
        }
    }
    Ok(ExecResult::new(String::new(), stderr, exit_code))
}
