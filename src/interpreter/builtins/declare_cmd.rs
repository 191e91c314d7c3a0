//! declare, readonly - Variable attributes
//!
//! Usage:
//!   declare [-x] [-r] NAME[=value]...  - set attributes (local inside functions)
//!   declare -p [NAME...]               - print variables as declare commands
//!   readonly NAME[=value]...           - mark variables readonly
//!   readonly [-p]                      - list readonly variables

use super::{shell_quote, split_options, AssignmentArg, BuiltinContext};
use crate::interpreter::environment::{VarValue, Variable};
use crate::interpreter::errors::{ExpansionError, InterpreterError};
use crate::interpreter::types::{ExecResult, InterpreterState};

/// `declare -FLAGS NAME='value'`, re-readable by the shell.
pub fn declare_line(name: &str, var: &Variable) -> String {
    let mut flags = String::new();
    if matches!(var.value, VarValue::Array(_)) {
        flags.push('a');
    }
    if var.readonly {
        flags.push('r');
    }
    if var.exported {
        flags.push('x');
    }
    if flags.is_empty() {
        flags.push('-');
    }
    let value = match &var.value {
        VarValue::Scalar(s) => shell_quote(s),
        VarValue::Array(items) => {
            let quoted: Vec<String> = items.iter().map(|s| shell_quote(s)).collect();
            format!("({})", quoted.join(" "))
        }
    };
    format!("declare -{} {}={}\n", flags, name, value)
}

/// Attributes requested by option letters.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Attributes {
    pub export: bool,
    pub readonly: bool,
}

/// Apply one `NAME[=value]` argument. `local` puts the binding in the
/// innermost function scope.
pub(crate) fn apply_declaration(
    state: &mut InterpreterState,
    arg: &AssignmentArg<'_>,
    attributes: Attributes,
    local: bool,
) -> Result<(), ExpansionError> {
    let env = &mut state.env;
    let export = attributes.export || state.options.allexport;
    match (arg.value, local) {
        (Some(value), true) => {
            let value = match (arg.append, env.get_value(arg.name)) {
                (true, Some(old)) => old + value,
                _ => value.to_string(),
            };
            env.declare_local(arg.name, Some(VarValue::Scalar(value)))?;
        }
        (None, true) => env.declare_local(arg.name, None)?,
        (Some(value), false) if arg.append => env.append(arg.name, value, export)?,
        (Some(value), false) => env.set(arg.name, value, export, false)?,
        (None, false) => {
            if !env.is_set(arg.name) {
                env.set(arg.name, "", export, false)?;
            }
        }
    }
    if export {
        env.mark_exported(arg.name);
    }
    if attributes.readonly {
        env.set_readonly(arg.name);
    }
    Ok(())
}

fn parse_attributes(ctx: &BuiltinContext<'_>, letters: &[char]) -> Result<(Attributes, bool), ExecResult> {
    let mut attributes = Attributes::default();
    let mut print = false;
    for letter in letters {
        match letter {
            'x' => attributes.export = true,
            'r' => attributes.readonly = true,
            'p' => print = true,
            'a' => {}
            other => return Err(ctx.usage_error(format!("-{}: invalid option", other))),
        }
    }
    Ok((attributes, print))
}

/// Apply every operand, collecting diagnostics.
pub(crate) fn declare_operands(
    ctx: &mut BuiltinContext<'_>,
    operands: &[String],
    attributes: Attributes,
    local: bool,
) -> ExecResult {
    let mut stderr = String::new();
    let mut exit_code = 0;
    for operand in operands {
        let Some(arg) = AssignmentArg::parse(operand) else {
            stderr.push_str(&format!("bash: {}: `{}': not a valid identifier\n", ctx.name, operand));
            exit_code = 1;
            continue;
        };
        if let Err(e) = apply_declaration(ctx.state, &arg, attributes, local) {
            stderr.push_str(&format!("bash: {}: {}\n", ctx.name, e));
            exit_code = 1;
        }
    }
    ExecResult::new(String::new(), stderr, exit_code)
}

pub fn handle_declare(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let (letters, operands) = split_options(ctx.args);
    let (attributes, print) = match parse_attributes(ctx, &letters) {
        Ok(parsed) => parsed,
        Err(usage) => return Ok(usage),
    };

    if print || operands.is_empty() {
        let visible = ctx.state.env.visible_variables();
        let mut stdout = String::new();
        let mut stderr = String::new();
        if operands.is_empty() {
            for (name, var) in &visible {
                stdout.push_str(&declare_line(name, var));
            }
        }
        for name in operands {
            match visible.get(name.as_str()) {
                Some(var) => stdout.push_str(&declare_line(name, var)),
                None => stderr.push_str(&format!("bash: declare: {}: not found\n", name)),
            }
        }
        let exit_code = if stderr.is_empty() { 0 } else { 1 };
        return Ok(ExecResult::new(stdout, stderr, exit_code));
    }

    let local = ctx.state.env.in_function();
    Ok(declare_operands(ctx, operands, attributes, local))
}

pub fn handle_readonly(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let (letters, operands) = split_options(ctx.args);
    if let Some(other) = letters.iter().find(|l| **l != 'p') {
        return Ok(ctx.usage_error(format!("-{}: invalid option", other)));
    }
    if operands.is_empty() {
        let stdout: String = ctx
            .state
            .env
            .visible_variables()
            .iter()
            .filter(|(_, var)| var.readonly)
            .map(|(name, var)| declare_line(name, var))
            .collect();
        return Ok(ExecResult::success(stdout));
    }
    let attributes = Attributes { export: false, readonly: true };
    Ok(declare_operands(ctx, operands, attributes, false))
}
