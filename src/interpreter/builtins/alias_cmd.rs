//! alias, unalias - Manage the alias table
//!
//! Usage:
//!   alias                - list all aliases
//!   alias NAME=value...  - define aliases
//!   alias NAME...        - print the named aliases
//!   unalias [-a] NAME... - remove aliases (all with -a)

use super::{shell_quote, split_options, BuiltinContext};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::ExecResult;

fn alias_line(name: &str, value: &str) -> String {
    format!("alias {}={}\n", name, shell_quote(value))
}

pub fn handle_alias(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let (_, operands) = split_options(ctx.args);
    if operands.is_empty() {
        let stdout: String = ctx.state.aliases.iter().map(|(name, value)| alias_line(name, value)).collect();
        return Ok(ExecResult::success(stdout));
    }

    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut exit_code = 0;
    for operand in operands {
        match operand.split_once('=') {
            Some((name, value)) if !name.is_empty() => {
                ctx.state.aliases.insert(name.to_string(), value.to_string());
            }
            _ => match ctx.state.aliases.get(operand.as_str()) {
                Some(value) => stdout.push_str(&alias_line(operand, value)),
                None => {
                    stderr.push_str(&format!("bash: alias: {}: not found\n", operand));
                    exit_code = 1;
                }
            },
        }
    }
    Ok(ExecResult::new(stdout, stderr, exit_code))
}

pub fn handle_unalias(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let (letters, operands) = split_options(ctx.args);
    if letters.contains(&'a') {
        ctx.state.aliases.clear();
        return Ok(ExecResult::ok());
    }
    if operands.is_empty() {
        return Ok(ctx.usage_error("usage: unalias [-a] name [name ...]"));
    }
    let mut stderr = String::new();
    for name in operands {
        if ctx.state.aliases.shift_remove(name.as_str()).is_none() {
            stderr.push_str(&format!("bash: unalias: {}: not found\n", name));
        }
    }
    let exit_code = if stderr.is_empty() { 0 } else { 1 };
    Ok(ExecResult::new(String::new(), stderr, exit_code))
}
