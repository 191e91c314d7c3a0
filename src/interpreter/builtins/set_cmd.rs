//! set - Set shell options and positional parameters
//!
//! Usage:
//!   set                  - list shell variables
//!   set -e / +e          - errexit (likewise -u nounset, -x xtrace,
//!                          -f noglob, -a allexport)
//!   set -o NAME / +o NAME - long option names, plus pipefail
//!   set -o               - show option states
//!   set [--] ARGS...     - replace the positional parameters

use super::{shell_quote, BuiltinContext};
use crate::interpreter::environment::VarValue;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::{ExecResult, ShellOptions};

const SET_USAGE: &str = "set: usage: set [-aefux] [-o option] [--] [arg ...]";

/// Long option names in `set -o` order.
const LONG_OPTIONS: &[&str] = &["allexport", "errexit", "noglob", "nounset", "pipefail", "xtrace"];

fn long_name(flag: char) -> Option<&'static str> {
    match flag {
        'a' => Some("allexport"),
        'e' => Some("errexit"),
        'f' => Some("noglob"),
        'u' => Some("nounset"),
        'x' => Some("xtrace"),
        _ => None,
    }
}

fn option_slot<'o>(options: &'o mut ShellOptions, name: &str) -> Option<&'o mut bool> {
    match name {
        "allexport" => Some(&mut options.allexport),
        "errexit" => Some(&mut options.errexit),
        "noglob" => Some(&mut options.noglob),
        "nounset" => Some(&mut options.nounset),
        "pipefail" => Some(&mut options.pipefail),
        "xtrace" => Some(&mut options.xtrace),
        _ => None,
    }
}

/// `set -o` listing.
pub fn option_listing(options: &ShellOptions) -> String {
    let mut options = options.clone();
    LONG_OPTIONS
        .iter()
        .map(|name| {
            let on = option_slot(&mut options, name).is_some_and(|v| *v);
            format!("{:<15}\t{}\n", name, if on { "on" } else { "off" })
        })
        .collect()
}

pub fn handle_set(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    if ctx.args.is_empty() {
        let stdout: String = ctx
            .state
            .env
            .visible_variables()
            .iter()
            .map(|(name, var)| match &var.value {
                VarValue::Scalar(s) => format!("{}={}\n", name, shell_quote(s)),
                VarValue::Array(items) => {
                    let quoted: Vec<String> = items.iter().map(|s| shell_quote(s)).collect();
                    format!("{}=({})\n", name, quoted.join(" "))
                }
            })
            .collect();
        return Ok(ExecResult::success(stdout));
    }

    let args = ctx.args;
    let mut i = 0;
    let mut positional: Option<Vec<String>> = None;
    while i < args.len() {
        let arg = args[i].as_str();
        if arg == "--" {
            positional = Some(args[i + 1..].to_vec());
            break;
        }
        let enable = match arg.chars().next() {
            Some('-') if arg.len() > 1 => true,
            Some('+') if arg.len() > 1 => false,
            _ => {
                positional = Some(args[i..].to_vec());
                break;
            }
        };
        for flag in arg[1..].chars() {
            let name = if flag == 'o' {
                i += 1;
                match args.get(i) {
                    Some(name) => name.as_str(),
                    None => return Ok(ExecResult::success(option_listing(&ctx.state.options))),
                }
            } else {
                match long_name(flag) {
                    Some(name) => name,
                    None => {
                        return Ok(ctx.usage_error(format!("-{}: invalid option\n{}", flag, SET_USAGE)));
                    }
                }
            };
            match option_slot(&mut ctx.state.options, name) {
                Some(slot) => *slot = enable,
                None => return Ok(ctx.usage_error(format!("{}: invalid option name", name))),
            }
        }
        i += 1;
    }

    if let Some(args) = positional {
        ctx.state.env.set_positional(args);
    }
    Ok(ExecResult::ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_listing() {
        let options = ShellOptions { pipefail: true, ..Default::default() };
        let listing = option_listing(&options);
        assert!(listing.contains("pipefail       \ton\n"));
        assert!(listing.contains("errexit        \toff\n"));
        assert_eq!(listing.lines().count(), LONG_OPTIONS.len());
    }

    #[test]
    fn test_option_slots() {
        let mut options = ShellOptions::default();
        for name in LONG_OPTIONS {
            *option_slot(&mut options, name).unwrap() = true;
        }
        assert!(options.errexit && options.nounset && options.xtrace && options.pipefail);
        assert!(option_slot(&mut options, "vi").is_none());
        assert_eq!(long_name('e'), Some("errexit"));
    }
}
