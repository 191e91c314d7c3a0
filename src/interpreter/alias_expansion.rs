//! Alias Expansion
//!
//! Handles bash alias expansion for SimpleCommandNodes.
//!
//! Alias expansion rules:
//! 1. Only expands if command name is a literal unquoted word
//! 2. Alias value is substituted for the command name and the result is
//!    parsed again, so aliases may contain operators (`a; b`, `x | y`)
//! 3. If alias value ends with a space, the next word is also checked for alias expansion
//! 4. An alias is never expanded again inside its own expansion

use indexmap::IndexMap;
use tracing::trace;

use crate::ast::types::{SimpleCommandNode, WordNode};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::{syntax_error_result, ExecutionEngine};
use crate::interpreter::io::IoContext;
use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::parser::parse;

/// Source text of `words` with leading aliases substituted, plus the
/// names that were expanded. `None` if the first word is not an alias.
pub fn expand_alias_text(
    words: &[WordNode],
    aliases: &IndexMap<String, String>,
    active: &[String],
) -> Option<(String, Vec<String>)> {
    let mut expanded: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut index = 0;

    while let Some(word) = words.get(index) {
        let Some(name) = word.as_unquoted_literal() else { break };
        if active.contains(&name) || expanded.contains(&name) {
            break;
        }
        let Some(value) = aliases.get(&name) else { break };
        text.push_str(value);
        expanded.push(name);
        index += 1;
        if !value.ends_with([' ', '\t']) {
            break;
        }
    }

    if expanded.is_empty() {
        return None;
    }
    for word in &words[index..] {
        if !text.is_empty() && !text.ends_with([' ', '\t']) {
            text.push(' ');
        }
        text.push_str(&word.source);
    }
    Some((text, expanded))
}

impl ExecutionEngine {
    /// Run `cmd` through its alias expansion if its first word is an alias.
    pub(crate) fn try_alias(
        &self,
        state: &mut InterpreterState,
        cmd: &SimpleCommandNode,
        io: &mut IoContext,
    ) -> Result<Option<ExecResult>, InterpreterError> {
        let Some((text, names)) = expand_alias_text(&cmd.words, &state.aliases, &state.alias_stack) else {
            return Ok(None);
        };
        trace!(aliases = ?names, expansion = %text, "expanding alias");
        let script = match parse(&text) {
            Ok(script) => script,
            Err(e) => return Ok(Some(syntax_error_result(&e))),
        };

        let depth = state.alias_stack.len();
        state.alias_stack.extend(names);
        let outcome = self.with_temporary_assignments(state, &cmd.assignments, |engine, state| {
            engine.with_redirections(state, &cmd.redirections, io, |engine, state, io| {
                engine.execute_statements(state, &script.statements, io)
            })
        });
        state.alias_stack.truncate(depth);
        outcome.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{Quoting, WordPart};

    fn aliases(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_expand_alias_text() {
        let table = aliases(&[("ll", "ls -l")]);
        let words = vec![WordNode::literal("ll"), WordNode::new(vec![WordPart::literal("a b", Quoting::SingleQuoted)], "'a b'")];
        let (text, names) = expand_alias_text(&words, &table, &[]).unwrap();
        assert_eq!(text, "ls -l 'a b'");
        assert_eq!(names, vec!["ll".to_string()]);
    }

    #[test]
    fn test_quoted_and_active_aliases_are_not_expanded() {
        let table = aliases(&[("ls", "ls -a")]);
        let quoted = vec![WordNode::new(vec![WordPart::literal("ls", Quoting::DoubleQuoted)], "\"ls\"")];
        assert!(expand_alias_text(&quoted, &table, &[]).is_none());
        assert!(expand_alias_text(&[WordNode::literal("ls")], &table, &["ls".to_string()]).is_none());
    }

    #[test]
    fn test_trailing_space_expands_next_word() {
        let table = aliases(&[("sudo", "run "), ("ll", "ls -l")]);
        let words = vec![WordNode::literal("sudo"), WordNode::literal("ll"), WordNode::literal("x")];
        let (text, names) = expand_alias_text(&words, &table, &[]).unwrap();
        assert_eq!(text, "run ls -l x");
        assert_eq!(names.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_alias_with_operators_runs_in_current_shell() {
        use std::sync::Arc;

        use crate::fs::InMemoryFs;
        use crate::interpreter::builtins::BuiltinRegistry;
        use crate::interpreter::command_resolution::NotFoundResolver;
        use crate::interpreter::sync_fs_adapter::SyncFsAdapter;
        use crate::interpreter::types::ExecutionLimits;

        let fs = Arc::new(SyncFsAdapter::new(Arc::new(InMemoryFs::new()), tokio::runtime::Handle::current()));
        let engine = ExecutionEngine::new(fs, Arc::new(BuiltinRegistry::default()), Arc::new(NotFoundResolver), ExecutionLimits::default());
        let mut state = InterpreterState::default();
        let script = "alias both='echo one; X=set'\nalias echo='echo said'\nboth\necho $X";
        let result = engine.run_script(&mut state, &parse(script).unwrap());
        assert_eq!(result.stdout, "said one\nsaid set\n");
        assert!(state.alias_stack.is_empty());
    }
}
