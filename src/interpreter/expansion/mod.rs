//! Word Expansion
//!
//! Turns parsed words into argv strings. Stages run in order:
//!
//! 1. brace expansion (unquoted literal text only)
//! 2. tilde, parameter, command substitution and arithmetic expansion,
//!    producing segments tagged with their quoting
//! 3. field splitting of unquoted expansion results
//! 4. pathname expansion of fields with unquoted wildcards
//! 5. quote removal (segments are concatenated)

pub mod brace;
pub mod parameter;
pub mod pattern;
pub mod word_split;

use tracing::trace;

use crate::ast::types::{ScriptNode, TildePrefix, WordNode, WordPartKind, DECLARATION_BUILTINS};
use crate::interpreter::arithmetic::evaluate_arithmetic_text;
use crate::interpreter::errors::{ExpansionError, InterpreterError, LimitError, LimitType};
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::io::IoContext;
use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::parser::word_parser::is_valid_name;

pub use brace::{expand_braces, expand_word_braces};
pub use pattern::{escape_pattern, has_glob_chars, matches_pattern, remove_pattern, replace_pattern, to_glob_syntax};
pub use word_split::{split_fields, split_for_read, Chunk, Field, WordSplitSegment, DEFAULT_IFS};

/// Active field separators (`$IFS`, or the default when unset).
pub fn current_ifs(state: &InterpreterState) -> String {
    state.env.get_value("IFS").unwrap_or_else(|| DEFAULT_IFS.to_string())
}

/// True if the word is written `NAME=...` or `NAME+=...` with an unquoted name.
pub fn is_assignment_word(word: &WordNode) -> bool {
    let Some(first) = word.parts.first() else {
        return false;
    };
    match (&first.kind, first.quoting.is_quoted()) {
        (WordPartKind::Literal(text), false) => text
            .split_once('=')
            .is_some_and(|(name, _)| is_valid_name(name.strip_suffix('+').unwrap_or(name))),
        _ => false,
    }
}

impl ExecutionEngine {
    /// Expand a command's words into argv. Assignment-shaped arguments of
    /// declaration builtins are neither split nor globbed.
    pub fn expand_argv(&self, state: &mut InterpreterState, words: &[WordNode]) -> Result<Vec<String>, InterpreterError> {
        let mut argv = Vec::new();
        let mut declaration = false;
        for (i, word) in words.iter().enumerate() {
            if declaration && is_assignment_word(word) {
                argv.push(self.expand_word_to_string(state, word)?);
                continue;
            }
            argv.extend(self.expand_word_fields(state, word)?);
            if i == 0 {
                declaration = argv.first().is_some_and(|name| DECLARATION_BUILTINS.contains(&name.as_str()));
            }
        }
        Ok(argv)
    }

    /// Expand a list of words (for `for` lists and array literals).
    pub fn expand_words(&self, state: &mut InterpreterState, words: &[WordNode]) -> Result<Vec<String>, InterpreterError> {
        let mut out = Vec::new();
        for word in words {
            out.extend(self.expand_word_fields(state, word)?);
        }
        Ok(out)
    }

    /// Full expansion of one word into zero or more fields.
    pub fn expand_word_fields(&self, state: &mut InterpreterState, word: &WordNode) -> Result<Vec<String>, InterpreterError> {
        let mut out = Vec::new();
        for word in expand_word_braces(word) {
            let chunks = self.expand_parts(state, &word)?;
            let ifs = current_ifs(state);
            for field in split_fields(chunks, &ifs) {
                self.glob_field(state, field, &mut out)?;
            }
        }
        Ok(out)
    }

    /// Expansion without field splitting or globbing, for assignment
    /// values, redirection targets, here-documents and `case` words.
    pub fn expand_word_to_string(&self, state: &mut InterpreterState, word: &WordNode) -> Result<String, InterpreterError> {
        let chunks = self.expand_parts(state, word)?;
        Ok(join_chunks(chunks, |s| s.value))
    }

    /// Expansion into a pattern: quoted characters are escaped so they
    /// match literally.
    pub fn expand_word_to_pattern(&self, state: &mut InterpreterState, word: &WordNode) -> Result<String, InterpreterError> {
        let chunks = self.expand_parts(state, word)?;
        Ok(join_chunks(chunks, |s| if s.quoted { escape_pattern(&s.value) } else { s.value }))
    }

    fn glob_field(&self, state: &InterpreterState, field: Field, out: &mut Vec<String>) -> Result<(), InterpreterError> {
        let has_wildcard = field.segments.iter().any(|s| !s.quoted && has_glob_chars(&s.value));
        if state.options.noglob || !has_wildcard {
            out.push(field.text());
            return Ok(());
        }

        let pattern: String = field
            .segments
            .iter()
            .map(|s| if s.quoted { escape_pattern(&s.value) } else { s.value.clone() })
            .collect();
        // An unusable pattern matches nothing, so the word stays literal
        let matches = match self.fs.glob(&to_glob_syntax(&pattern), &state.cwd) {
            Ok(matches) => matches,
            Err(e) => {
                trace!(pattern = %pattern, error = %e, "pathname expansion skipped");
                Vec::new()
            }
        };
        trace!(pattern = %pattern, matches = matches.len(), "pathname expansion");
        if !matches.is_empty() {
            out.extend(matches);
        } else if state.options.failglob {
            return Err(ExpansionError::NoGlobMatch(field.text()).into());
        } else if !state.options.nullglob {
            out.push(field.text());
        }
        Ok(())
    }

    /// Run the per-part expansions of a word.
    pub(crate) fn expand_parts(&self, state: &mut InterpreterState, word: &WordNode) -> Result<Vec<Chunk>, InterpreterError> {
        let mut chunks = Vec::new();
        for part in &word.parts {
            let quoted = part.quoting.is_quoted();
            match &part.kind {
                WordPartKind::Literal(text) => chunks.push(Chunk::Segment(WordSplitSegment::literal(text.clone(), quoted))),
                WordPartKind::Tilde(prefix) => {
                    let value = expand_tilde(state, prefix);
                    chunks.push(Chunk::Segment(WordSplitSegment::literal(value, true)));
                }
                WordPartKind::Parameter(param) => chunks.extend(self.expand_parameter(state, param, quoted)?),
                WordPartKind::CommandSubstitution(sub) => {
                    let output = self.command_substitution(state, &sub.body)?;
                    chunks.push(Chunk::Segment(WordSplitSegment::expansion(output, quoted)));
                }
                WordPartKind::Arithmetic(arith) => {
                    let text = self.expand_word_to_string(state, &arith.expression)?;
                    let value = evaluate_arithmetic_text(&mut state.env, &text)?;
                    chunks.push(Chunk::Segment(WordSplitSegment::expansion(value.to_string(), quoted)));
                }
                WordPartKind::BadSubstitution(text) => {
                    return Err(ExpansionError::BadSubstitution(text.clone()).into());
                }
            }
        }
        Ok(chunks)
    }

    /// `$(...)`: run the body against a snapshot of the current state and
    /// capture its stdout minus trailing newlines.
    pub fn command_substitution(&self, state: &mut InterpreterState, body: &ScriptNode) -> Result<String, InterpreterError> {
        if state.call_depth >= self.limits.max_recursion_depth {
            return Err(InterpreterError::RecursionLimit(LimitError::bare(LimitType::Recursion)));
        }
        let mut sub = state.subshell();
        sub.call_depth += 1;
        let mut io = IoContext::default();
        let result = self.execute_isolated(&mut sub, &body.statements, &mut io)?;
        state.command_count = sub.command_count;
        state.expansion_stderr.push_str(&result.stderr);
        state.substitution_status = Some(result.exit_code);
        let ExecResult { stdout, .. } = result;
        Ok(stdout.trim_end_matches('\n').to_string())
    }
}

fn join_chunks(chunks: Vec<Chunk>, render: impl Fn(WordSplitSegment) -> String) -> String {
    let mut out = String::new();
    for chunk in chunks {
        match chunk {
            Chunk::Segment(segment) => out.push_str(&render(segment)),
            Chunk::FieldBreak => out.push(' '),
        }
    }
    out
}

fn expand_tilde(state: &InterpreterState, prefix: &TildePrefix) -> String {
    let lookup = |name: &str, fallback: &str| state.env.get_value(name).unwrap_or_else(|| fallback.to_string());
    match prefix {
        TildePrefix::Home => lookup("HOME", "~"),
        TildePrefix::Pwd => lookup("PWD", &state.cwd),
        TildePrefix::OldPwd => lookup("OLDPWD", "~-"),
        TildePrefix::User(name) => match state.env.get_value("USER") {
            Some(user) if &user == name => lookup("HOME", &format!("~{}", name)),
            _ => format!("~{}", name),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ast::types::{Quoting, WordPart};
    use crate::fs::{FileSystem, InMemoryFs};
    use crate::interpreter::builtins::BuiltinRegistry;
    use crate::interpreter::command_resolution::NotFoundResolver;
    use crate::interpreter::sync_fs_adapter::SyncFsAdapter;
    use crate::interpreter::types::ExecutionLimits;
    use crate::parser::parse;

    #[test]
    fn test_is_assignment_word() {
        assert!(is_assignment_word(&WordNode::literal("FOO=bar")));
        assert!(is_assignment_word(&WordNode::literal("FOO+=bar")));
        assert!(!is_assignment_word(&WordNode::literal("1X=bar")));
        assert!(!is_assignment_word(&WordNode::literal("plain")));
        let quoted = WordNode::new(vec![WordPart::literal("FOO=bar", Quoting::DoubleQuoted)], "\"FOO=bar\"");
        assert!(!is_assignment_word(&quoted));
    }

    #[test]
    fn test_tilde_expansion() {
        let mut state = InterpreterState::default();
        state.env.set("HOME", "/home/user", true, false).unwrap();
        state.env.set("USER", "user", true, false).unwrap();
        assert_eq!(expand_tilde(&state, &TildePrefix::Home), "/home/user");
        assert_eq!(expand_tilde(&state, &TildePrefix::Pwd), "/");
        assert_eq!(expand_tilde(&state, &TildePrefix::User("user".into())), "/home/user");
        assert_eq!(expand_tilde(&state, &TildePrefix::User("root".into())), "~root");
    }

    #[test]
    fn test_current_ifs() {
        let mut state = InterpreterState::default();
        assert_eq!(current_ifs(&state), DEFAULT_IFS);
        state.env.set("IFS", ":", false, false).unwrap();
        assert_eq!(current_ifs(&state), ":");
    }

    fn run(state: &mut InterpreterState, fs: Arc<InMemoryFs>, script: &str) -> ExecResult {
        let fs = Arc::new(SyncFsAdapter::new(fs, tokio::runtime::Handle::current()));
        let engine =
            ExecutionEngine::new(fs, Arc::new(BuiltinRegistry::default()), Arc::new(NotFoundResolver), ExecutionLimits::default());
        engine.run_script(state, &parse(script).unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pathname_expansion() {
        let fs = Arc::new(InMemoryFs::new());
        for file in ["/a.txt", "/b.txt", "/c.log"] {
            fs.write_file(file, b"").await.unwrap();
        }
        let mut state = InterpreterState::default();
        assert_eq!(run(&mut state, fs.clone(), "echo *.txt").stdout, "a.txt b.txt\n");
        assert_eq!(run(&mut state, fs.clone(), "echo '*'.txt none*").stdout, "*.txt none*\n");
        // Invalid bracket patterns stay literal
        assert_eq!(run(&mut state, fs.clone(), "echo a[] c.l[]g").stdout, "a[] c.l[]g\n");
        assert_eq!(run(&mut state, fs, "shopt -s nullglob; echo x none* y").stdout, "x y\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_declaration_arguments_are_not_split() {
        let mut state = InterpreterState::default();
        let fs = Arc::new(InMemoryFs::new());
        let result = run(&mut state, fs, "v='a b'; export E=$v; declare D=$v; echo \"$E|$D\"");
        assert_eq!(result.stdout, "a b|a b\n");
    }
}
