//! Parameter Expansion
//!
//! `$NAME`, `${NAME}`, special parameters, array subscripts and the
//! `${NAME<op>word}` operator family.

use crate::ast::types::{ArrayIndex, DefaultValueOp, ParameterExpansionPart, ParameterOperation};
use crate::interpreter::arithmetic::evaluate_arithmetic_text;
use crate::interpreter::environment::VarValue;
use crate::interpreter::errors::{ExpansionError, InterpreterError};
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::expansion::pattern::{remove_pattern, replace_pattern};
use crate::interpreter::expansion::word_split::{Chunk, WordSplitSegment};
use crate::interpreter::expansion::current_ifs;
use crate::interpreter::types::InterpreterState;
use crate::parser::word_parser::is_valid_name;

/// Value of a parameter before it is turned into segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Unset,
    Scalar(String),
    /// `$@`, `$*`, `${A[@]}`, `${A[*]}`; `star` joins when quoted
    List { items: Vec<String>, star: bool },
}

impl ParamValue {
    /// Unset, or (with `check_empty`) null.
    fn is_null(&self, check_empty: bool) -> bool {
        match self {
            ParamValue::Unset => true,
            ParamValue::Scalar(s) => check_empty && s.is_empty(),
            ParamValue::List { items, .. } => items.is_empty() || (check_empty && items.iter().all(String::is_empty)),
        }
    }

    fn map(self, f: impl Fn(&str) -> String) -> ParamValue {
        match self {
            ParamValue::Unset => ParamValue::Scalar(f("")),
            ParamValue::Scalar(s) => ParamValue::Scalar(f(&s)),
            ParamValue::List { items, star } => ParamValue::List {
                items: items.iter().map(|s| f(s)).collect(),
                star,
            },
        }
    }
}

/// Letters of the enabled single-letter options, as `$-` shows them.
pub fn option_flags(state: &InterpreterState) -> String {
    let o = &state.options;
    [(o.allexport, 'a'), (o.errexit, 'e'), (o.noglob, 'f'), (o.nounset, 'u'), (o.xtrace, 'x')]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, c)| *c)
        .collect()
}

impl ExecutionEngine {
    pub(crate) fn expand_parameter(
        &self,
        state: &mut InterpreterState,
        part: &ParameterExpansionPart,
        quoted: bool,
    ) -> Result<Vec<Chunk>, InterpreterError> {
        let value = self.lookup_parameter(state, part)?;
        let name = &part.parameter;

        let value = match &part.operation {
            None => {
                check_nounset(state, name, &value)?;
                value
            }
            Some(ParameterOperation::Length) => {
                check_nounset(state, name, &value)?;
                let length = match &value {
                    ParamValue::Unset => 0,
                    ParamValue::Scalar(s) => s.chars().count(),
                    ParamValue::List { items, .. } => items.len(),
                };
                ParamValue::Scalar(length.to_string())
            }
            Some(ParameterOperation::DefaultValue(op)) => {
                if value.is_null(op.check_empty) {
                    return self.expand_parts(state, &op.word);
                }
                value
            }
            Some(ParameterOperation::AssignDefault(op)) => {
                if value.is_null(op.check_empty) {
                    let assigned = self.assign_default(state, part, op)?;
                    ParamValue::Scalar(assigned)
                } else {
                    value
                }
            }
            Some(ParameterOperation::ErrorIfUnset(op)) => {
                if value.is_null(op.check_empty) {
                    let mut message = self.expand_word_to_string(state, &op.word)?;
                    if message.is_empty() {
                        message = "parameter null or not set".to_string();
                    }
                    return Err(ExpansionError::ParameterUnset { name: name.clone(), message }.into());
                }
                value
            }
            Some(ParameterOperation::UseAlternative(op)) => {
                if value.is_null(op.check_empty) {
                    return Ok(Vec::new());
                }
                return self.expand_parts(state, &op.word);
            }
            Some(ParameterOperation::PatternRemoval(op)) => {
                check_nounset(state, name, &value)?;
                let pattern = self.expand_word_to_pattern(state, &op.pattern)?;
                value.map(|s| remove_pattern(s, &pattern, op.side, op.greedy))
            }
            Some(ParameterOperation::PatternReplacement(op)) => {
                check_nounset(state, name, &value)?;
                let pattern = self.expand_word_to_pattern(state, &op.pattern)?;
                let replacement = self.expand_word_to_string(state, &op.replacement)?;
                value.map(|s| replace_pattern(s, &pattern, &replacement, op.all))
            }
        };

        Ok(to_chunks(value, quoted, &current_ifs(state)))
    }

    fn lookup_parameter(&self, state: &mut InterpreterState, part: &ParameterExpansionPart) -> Result<ParamValue, InterpreterError> {
        let name = part.parameter.as_str();
        let positional = state.env.positional();
        let value = match name {
            "@" => ParamValue::List { items: positional.to_vec(), star: false },
            "*" => ParamValue::List { items: positional.to_vec(), star: true },
            "#" => ParamValue::Scalar(positional.len().to_string()),
            "?" => ParamValue::Scalar(state.last_exit_code.to_string()),
            "$" => ParamValue::Scalar(state.shell_pid.to_string()),
            "!" => match state.last_background_pid {
                Some(pid) => ParamValue::Scalar(pid.to_string()),
                None => ParamValue::Unset,
            },
            "-" => ParamValue::Scalar(option_flags(state)),
            "0" => ParamValue::Scalar(state.script_name.clone()),
            _ if name.chars().all(|c| c.is_ascii_digit()) => {
                match name.parse::<usize>().ok().and_then(|n| positional.get(n.wrapping_sub(1))) {
                    Some(v) => ParamValue::Scalar(v.clone()),
                    None => ParamValue::Unset,
                }
            }
            _ => return self.lookup_variable(state, part),
        };
        Ok(value)
    }

    fn lookup_variable(&self, state: &mut InterpreterState, part: &ParameterExpansionPart) -> Result<ParamValue, InterpreterError> {
        let name = part.parameter.as_str();
        let stored = state.env.get(name).map(|v| v.value.clone());
        let value = match (&part.index, stored) {
            (None, None) => ParamValue::Unset,
            (None, Some(value)) => ParamValue::Scalar(value.as_scalar()),
            (Some(ArrayIndex::All | ArrayIndex::Star), stored) => {
                let items = match stored {
                    None => Vec::new(),
                    Some(VarValue::Scalar(s)) => vec![s],
                    Some(VarValue::Array(items)) => items,
                };
                ParamValue::List { items, star: matches!(part.index, Some(ArrayIndex::Star)) }
            }
            (Some(ArrayIndex::Expr(word)), stored) => {
                let text = self.expand_word_to_string(state, word)?;
                let index = evaluate_arithmetic_text(&mut state.env, &text)?;
                let items = match stored {
                    None => Vec::new(),
                    Some(VarValue::Scalar(s)) => vec![s],
                    Some(VarValue::Array(items)) => items,
                };
                let resolved = if index < 0 { items.len() as i64 + index } else { index };
                match usize::try_from(resolved).ok().and_then(|i| items.get(i)) {
                    Some(v) => ParamValue::Scalar(v.clone()),
                    None => ParamValue::Unset,
                }
            }
        };
        Ok(value)
    }

    fn assign_default(
        &self,
        state: &mut InterpreterState,
        part: &ParameterExpansionPart,
        op: &DefaultValueOp,
    ) -> Result<String, InterpreterError> {
        let name = &part.parameter;
        if !is_valid_name(name) {
            return Err(ExpansionError::CannotAssign(name.clone()).into());
        }
        let value = self.expand_word_to_string(state, &op.word)?;
        let export = state.options.allexport;
        match &part.index {
            None => state.env.set(name, value.clone(), export, false)?,
            Some(ArrayIndex::Expr(word)) => {
                let text = self.expand_word_to_string(state, word)?;
                let index = evaluate_arithmetic_text(&mut state.env, &text)?;
                let index = usize::try_from(index).map_err(|_| ExpansionError::BadSubstitution(name.clone()))?;
                state.env.set_array_element(name, index, value.clone())?;
            }
            Some(_) => return Err(ExpansionError::CannotAssign(name.clone()).into()),
        }
        Ok(value)
    }
}

fn check_nounset(state: &InterpreterState, name: &str, value: &ParamValue) -> Result<(), ExpansionError> {
    if state.options.nounset && *value == ParamValue::Unset {
        return Err(ExpansionError::UnboundVariable(name.to_string()));
    }
    Ok(())
}

/// Turn a value into segments. Quoted `$@` keeps one field per element;
/// quoted `$*` joins on the first IFS character.
fn to_chunks(value: ParamValue, quoted: bool, ifs: &str) -> Vec<Chunk> {
    match value {
        ParamValue::Unset => vec![Chunk::Segment(WordSplitSegment::expansion("", quoted))],
        ParamValue::Scalar(s) => vec![Chunk::Segment(WordSplitSegment::expansion(s, quoted))],
        ParamValue::List { items, star: true } if quoted => {
            let separator = ifs.chars().next().map(String::from).unwrap_or_default();
            vec![Chunk::Segment(WordSplitSegment::expansion(items.join(&separator), true))]
        }
        ParamValue::List { items, .. } => {
            let mut chunks = Vec::with_capacity(items.len() * 2);
            for (i, item) in items.into_iter().enumerate() {
                if i > 0 {
                    chunks.push(Chunk::FieldBreak);
                }
                chunks.push(Chunk::Segment(WordSplitSegment::expansion(item, quoted)));
            }
            chunks
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::expansion::word_split::split_fields;
    use crate::interpreter::expansion::DEFAULT_IFS;

    fn fields(value: ParamValue, quoted: bool) -> Vec<String> {
        split_fields(to_chunks(value, quoted, DEFAULT_IFS), DEFAULT_IFS)
            .iter()
            .map(|f| f.text())
            .collect()
    }

    #[test]
    fn test_quoted_at_keeps_elements() {
        let list = ParamValue::List { items: vec!["a b".into(), "c".into()], star: false };
        assert_eq!(fields(list.clone(), true), vec!["a b", "c"]);
        assert_eq!(fields(list, false), vec!["a", "b", "c"]);
        assert!(fields(ParamValue::List { items: vec![], star: false }, true).is_empty());
    }

    #[test]
    fn test_quoted_star_joins() {
        let list = ParamValue::List { items: vec!["a".into(), "b".into()], star: true };
        assert_eq!(fields(list, true), vec!["a b"]);
    }

    #[test]
    fn test_unset_and_empty_values() {
        assert!(fields(ParamValue::Unset, false).is_empty());
        assert_eq!(fields(ParamValue::Unset, true), vec![""]);
        assert_eq!(fields(ParamValue::Scalar(String::new()), true), vec![""]);
    }

    #[test]
    fn test_null_checks() {
        assert!(ParamValue::Unset.is_null(false));
        assert!(!ParamValue::Scalar(String::new()).is_null(false));
        assert!(ParamValue::Scalar(String::new()).is_null(true));
        assert!(ParamValue::List { items: vec![], star: false }.is_null(false));
    }

    #[test]
    fn test_option_flags() {
        let mut state = InterpreterState::default();
        assert_eq!(option_flags(&state), "");
        state.options.errexit = true;
        state.options.xtrace = true;
        assert_eq!(option_flags(&state), "ex");
    }
}
