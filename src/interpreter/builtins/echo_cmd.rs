//! echo - Write arguments to standard output
//!
//! Flags: -n (no trailing newline), -e (interpret escapes), -E (don't).
//! Flag clusters like `-ne` are accepted; anything else is printed.

use super::BuiltinContext;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::ExecResult;

pub fn handle_echo(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let mut no_newline = false;
    let mut interpret_escapes = false;
    let mut start = 0;

    for arg in ctx.args {
        let Some(flags) = arg.strip_prefix('-') else { break };
        if flags.is_empty() || !flags.chars().all(|c| matches!(c, 'n' | 'e' | 'E')) {
            break;
        }
        for flag in flags.chars() {
            match flag {
                'n' => no_newline = true,
                'e' => interpret_escapes = true,
                _ => interpret_escapes = false,
            }
        }
        start += 1;
    }

    let mut output = ctx.args[start..].join(" ");
    if interpret_escapes {
        let (text, stop) = process_escapes(&output);
        if stop {
            return Ok(ExecResult::success(text));
        }
        output = text;
    }
    if !no_newline {
        output.push('\n');
    }
    Ok(ExecResult::success(output))
}

/// Interpret backslash escapes. The flag is set when `\c` cut the output.
fn process_escapes(input: &str) -> (String, bool) {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => out.push('\\'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('e' | 'E') => out.push('\x1b'),
            Some('c') => return (out, true),
            Some('0') => {
                let mut code = 0u32;
                for _ in 0..3 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(code % 256));
            }
            Some('x') => {
                let mut code = 0u32;
                let mut digits = 0;
                while digits < 2 {
                    match chars.peek().and_then(|d| d.to_digit(16)) {
                        Some(d) => {
                            code = code * 16 + d;
                            chars.next();
                            digits += 1;
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    out.push_str("\\x");
                } else {
                    out.extend(char::from_u32(code));
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    (out, false)
}
