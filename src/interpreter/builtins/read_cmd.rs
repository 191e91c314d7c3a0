//! read - Read a line of input builtin
//!
//! Supports:
//! - read VAR... - split the line on IFS into the variables; the last
//!   one receives the rest of the line
//! - read - whole line into REPLY
//! - read -r - raw mode (no backslash processing)
//! - read -a ARRAY - every field into an indexed array
//! - read -p PROMPT - accepted, prompt is not shown
//!
//! Status 1 at end of input.

use super::BuiltinContext;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::expansion::{current_ifs, split_for_read};
use crate::interpreter::types::ExecResult;
use crate::parser::word_parser::is_valid_name;

/// Read one logical line: without `raw`, a trailing backslash joins the
/// next line. Returns the line and whether it ended with a newline.
fn read_logical_line(ctx: &mut BuiltinContext<'_>, raw: bool) -> Option<(String, bool)> {
    let mut line = String::new();
    let mut any = false;
    while let Some(chunk) = ctx.stdin.read_line() {
        any = true;
        let (content, newline) = match chunk.strip_suffix('\n') {
            Some(content) => (content.to_string(), true),
            None => (chunk, false),
        };
        let trailing = content.chars().rev().take_while(|c| *c == '\\').count();
        if !raw && newline && trailing % 2 == 1 {
            line.push_str(&content[..content.len() - 1]);
            continue;
        }
        line.push_str(&content);
        return Some((line, newline));
    }
    any.then_some((line, false))
}

fn remove_backslashes(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            _ => out.push(c),
        }
    }
    out
}

pub fn handle_read(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let mut raw = false;
    let mut array: Option<String> = None;
    let mut i = 0;
    let args = ctx.args;
    while let Some(arg) = args.get(i) {
        match arg.as_str() {
            "-r" => raw = true,
            "-a" | "-p" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    return Ok(ctx.usage_error(format!("{}: option requires an argument", arg)));
                };
                if arg == "-a" {
                    array = Some(value.clone());
                }
            }
            "--" => {
                i += 1;
                break;
            }
            other if other.starts_with('-') && other.len() > 1 => {
                return Ok(ctx.usage_error(format!("{}: invalid option", other)));
            }
            _ => break,
        }
        i += 1;
    }
    let names: Vec<String> = args[i.min(args.len())..].to_vec();
    if let Some(bad) = names.iter().chain(array.iter()).find(|n| !is_valid_name(n)) {
        return Ok(ctx.failure(format!("`{}': not a valid identifier", bad)));
    }

    let Some((line, newline)) = read_logical_line(ctx, raw) else {
        for name in &names {
            ctx.state.env.set(name, "", false, false)?;
        }
        return Ok(ExecResult::with_code(1));
    };
    let line = if raw { line } else { remove_backslashes(&line) };
    let ifs = current_ifs(ctx.state);
    let export = ctx.state.options.allexport;

    if let Some(array) = array {
        let fields = split_for_read(&line, &ifs, usize::MAX);
        ctx.state.env.set(&array, fields, export, false)?;
    } else if names.is_empty() {
        ctx.state.env.set("REPLY", line, export, false)?;
    } else {
        let mut fields = split_for_read(&line, &ifs, names.len()).into_iter();
        for name in &names {
            ctx.state.env.set(name, fields.next().unwrap_or_default(), export, false)?;
        }
    }
    Ok(ExecResult::with_code(if newline { 0 } else { 1 }))
}
