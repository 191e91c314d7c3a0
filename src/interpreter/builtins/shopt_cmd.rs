//! shopt - Toggle optional shell behavior
//!
//! Supported options: nullglob, failglob.

use super::{split_options, BuiltinContext};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::{ExecResult, ShellOptions};

const SHOPT_NAMES: &[&str] = &["failglob", "nullglob"];

fn shopt_slot<'o>(options: &'o mut ShellOptions, name: &str) -> Option<&'o mut bool> {
    match name {
        "failglob" => Some(&mut options.failglob),
        "nullglob" => Some(&mut options.nullglob),
        _ => None,
    }
}

pub fn handle_shopt(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let (letters, operands) = split_options(ctx.args);
    let mut set: Option<bool> = None;
    let mut quiet = false;
    for letter in letters {
        match letter {
            's' => set = Some(true),
            'u' => set = Some(false),
            'q' => quiet = true,
            'p' => {}
            other => return Ok(ctx.usage_error(format!("-{}: invalid option", other))),
        }
    }

    let names: Vec<String> = if operands.is_empty() {
        SHOPT_NAMES.iter().map(|s| s.to_string()).collect()
    } else {
        operands.to_vec()
    };

    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut exit_code = 0;
    for name in &names {
        let Some(slot) = shopt_slot(&mut ctx.state.options, name) else {
            stderr.push_str(&format!("bash: shopt: {}: invalid shell option name\n", name));
            exit_code = 1;
            continue;
        };
        match set {
            Some(value) if !operands.is_empty() => *slot = value,
            Some(value) => {
                if *slot == value {
                    stdout.push_str(&format!("shopt -{} {}\n", if value { 's' } else { 'u' }, name));
                }
            }
            None => {
                if !*slot && !operands.is_empty() {
                    exit_code = 1;
                }
                if !quiet {
                    stdout.push_str(&format!("{:<15}\t{}\n", name, if *slot { "on" } else { "off" }));
                }
            }
        }
    }
    Ok(ExecResult::new(stdout, stderr, exit_code))
}
