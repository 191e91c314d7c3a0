//! Builtin Commands
//!
//! Builtins run inside the engine with mutable access to the shell state.
//! The `BuiltinRegistry` maps names to handlers; hosts may register their
//! own handlers, replacing any existing entry of the same name.

pub mod alias_cmd;
pub mod break_cmd;
pub mod cd_cmd;
pub mod declare_cmd;
pub mod echo_cmd;
pub mod eval_cmd;
pub mod exit_cmd;
pub mod export_cmd;
pub mod local_cmd;
pub mod read_cmd;
pub mod return_cmd;
pub mod set_cmd;
pub mod shift_cmd;
pub mod shopt_cmd;
pub mod test_cmd;
pub mod type_cmd;
pub mod unset_cmd;
pub mod wait_cmd;

use std::collections::HashMap;
use std::sync::Arc;

use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::interpreter::ShellFs;
use crate::interpreter::io::InputStream;
use crate::interpreter::types::{ExecResult, InterpreterState};
use crate::parser::word_parser::is_valid_name;

/// Builtins found before shell functions of the same name.
pub const SPECIAL_BUILTINS: &[&str] = &[
    ":", ".", "break", "continue", "eval", "exit", "export", "readonly", "return", "set", "shift", "source",
    "unset",
];

pub fn is_special_builtin(name: &str) -> bool {
    SPECIAL_BUILTINS.contains(&name)
}

/// What a builtin gets to work with.
pub struct BuiltinContext<'a> {
    /// Name the builtin was invoked under
    pub name: &'a str,
    /// Arguments after the name
    pub args: &'a [String],
    pub state: &'a mut InterpreterState,
    pub stdin: &'a mut InputStream,
    pub engine: &'a ExecutionEngine,
}

impl BuiltinContext<'_> {
    pub fn fs(&self) -> &dyn ShellFs {
        self.engine.fs.as_ref()
    }

    /// `bash: NAME: message` with status 1.
    pub fn failure(&self, message: impl std::fmt::Display) -> ExecResult {
        ExecResult::failure(format!("bash: {}: {}\n", self.name, message))
    }

    /// Usage error, status 2.
    pub fn usage_error(&self, message: impl std::fmt::Display) -> ExecResult {
        ExecResult::failure_with_code(format!("bash: {}: {}\n", self.name, message), 2)
    }

    /// Parse and run script text in the current shell (eval, source).
    pub fn run_script(&mut self, script: &str) -> Result<ExecResult, InterpreterError> {
        self.engine.run_nested(self.state, script, self.stdin)
    }
}

/// A builtin command handler.
pub trait Builtin: Send + Sync {
    fn execute(&self, ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError>;
}

impl<F> Builtin for F
where
    F: Fn(&mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> + Send + Sync,
{
    fn execute(&self, ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
        self(ctx)
    }
}

/// name → handler map.
#[derive(Clone)]
pub struct BuiltinRegistry {
    builtins: HashMap<String, Arc<dyn Builtin>>,
}

impl BuiltinRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self { builtins: HashMap::new() }
    }

    /// Register a handler; a later registration replaces an earlier one.
    pub fn register(&mut self, name: impl Into<String>, builtin: Arc<dyn Builtin>) {
        self.builtins.insert(name.into(), builtin);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Builtin>> {
        self.builtins.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builtins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for BuiltinRegistry {
    /// Registry holding the reference builtins.
    fn default() -> Self {
        let mut registry = Self::new();
        register_defaults(&mut registry);
        registry
    }
}

fn handle_true(_ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    Ok(ExecResult::ok())
}

fn handle_false(_ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    Ok(ExecResult::with_code(1))
}

/// Register every reference builtin.
pub fn register_defaults(registry: &mut BuiltinRegistry) {
    let table: [(&str, Arc<dyn Builtin>); 31] = [
        (":", Arc::new(handle_true)),
        ("true", Arc::new(handle_true)),
        ("false", Arc::new(handle_false)),
        ("echo", Arc::new(echo_cmd::handle_echo)),
        ("test", Arc::new(test_cmd::handle_test)),
        ("[", Arc::new(test_cmd::handle_test)),
        ("cd", Arc::new(cd_cmd::handle_cd)),
        ("pwd", Arc::new(cd_cmd::handle_pwd)),
        ("export", Arc::new(export_cmd::handle_export)),
        ("unset", Arc::new(unset_cmd::handle_unset)),
        ("local", Arc::new(local_cmd::handle_local)),
        ("declare", Arc::new(declare_cmd::handle_declare)),
        ("readonly", Arc::new(declare_cmd::handle_readonly)),
        ("set", Arc::new(set_cmd::handle_set)),
        ("shopt", Arc::new(shopt_cmd::handle_shopt)),
        ("shift", Arc::new(shift_cmd::handle_shift)),
        ("exit", Arc::new(exit_cmd::handle_exit)),
        ("return", Arc::new(return_cmd::handle_return)),
        ("break", Arc::new(break_cmd::handle_break)),
        ("continue", Arc::new(break_cmd::handle_continue)),
        ("alias", Arc::new(alias_cmd::handle_alias)),
        ("unalias", Arc::new(alias_cmd::handle_unalias)),
        ("read", Arc::new(read_cmd::handle_read)),
        ("eval", Arc::new(eval_cmd::handle_eval)),
        ("source", Arc::new(eval_cmd::handle_source)),
        (".", Arc::new(eval_cmd::handle_source)),
        ("wait", Arc::new(wait_cmd::handle_wait)),
        ("jobs", Arc::new(wait_cmd::handle_jobs)),
        ("type", Arc::new(type_cmd::handle_type)),
        ("command", Arc::new(type_cmd::handle_command)),
        ("builtin", Arc::new(type_cmd::handle_builtin)),
    ];
    for (name, builtin) in table {
        registry.register(name, builtin);
    }
}

/// A `NAME`, `NAME=value` or `NAME+=value` argument of a declaration builtin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentArg<'a> {
    pub name: &'a str,
    pub value: Option<&'a str>,
    pub append: bool,
}

impl<'a> AssignmentArg<'a> {
    /// Parse an argument; `None` if the name is not a valid identifier.
    /// Only the first `=` separates name from value.
    pub fn parse(arg: &'a str) -> Option<Self> {
        let (name, value, append) = match arg.split_once('=') {
            Some((name, value)) => match name.strip_suffix('+') {
                Some(name) => (name, Some(value), true),
                None => (name, Some(value), false),
            },
            None => (arg, None, false),
        };
        is_valid_name(name).then_some(Self { name, value, append })
    }
}

/// Split leading `-xyz` option clusters off the arguments. Returns the
/// option letters and the remaining operands; `--` ends the options.
pub fn split_options(args: &[String]) -> (Vec<char>, &[String]) {
    let mut letters = Vec::new();
    let mut rest = args;
    while let Some(first) = rest.first() {
        if first == "--" {
            rest = &rest[1..];
            break;
        }
        match first.strip_prefix('-') {
            Some(cluster) if !cluster.is_empty() => {
                letters.extend(cluster.chars());
                rest = &rest[1..];
            }
            _ => break,
        }
    }
    (letters, rest)
}

/// Single-quote a value so it reads back as the same word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Script runner shared by the builtin tests.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::BuiltinRegistry;
    use crate::fs::InMemoryFs;
    use crate::interpreter::command_resolution::NotFoundResolver;
    use crate::interpreter::execution_engine::ExecutionEngine;
    use crate::interpreter::sync_fs_adapter::SyncFsAdapter;
    use crate::interpreter::types::{ExecResult, ExecutionLimits, InterpreterState};
    use crate::parser::parse;

    /// Run `script` against `fs`. Needs a multi-threaded runtime.
    pub fn run_in(fs: Arc<InMemoryFs>, state: &mut InterpreterState, script: &str) -> ExecResult {
        let fs = Arc::new(SyncFsAdapter::new(fs, tokio::runtime::Handle::current()));
        let engine =
            ExecutionEngine::new(fs, Arc::new(BuiltinRegistry::default()), Arc::new(NotFoundResolver), ExecutionLimits::default());
        engine.run_script(state, &parse(script).unwrap())
    }

    pub fn run(state: &mut InterpreterState, script: &str) -> ExecResult {
        run_in(Arc::new(InMemoryFs::new()), state, script)
    }

    /// Run `script` in a fresh shell.
    pub fn run_fresh(script: &str) -> ExecResult {
        run(&mut InterpreterState::default(), script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_arg() {
        assert_eq!(
            AssignmentArg::parse("URL=http://x?a=b"),
            Some(AssignmentArg { name: "URL", value: Some("http://x?a=b"), append: false })
        );
        assert_eq!(
            AssignmentArg::parse("P+=:/bin"),
            Some(AssignmentArg { name: "P", value: Some(":/bin"), append: true })
        );
        assert_eq!(AssignmentArg::parse("NAME"), Some(AssignmentArg { name: "NAME", value: None, append: false }));
        assert_eq!(AssignmentArg::parse("1X=2"), None);
        assert_eq!(AssignmentArg::parse("=x"), None);
    }

    #[test]
    fn test_split_options() {
        let args: Vec<String> = ["-np", "--", "-x", "A"].iter().map(|s| s.to_string()).collect();
        let (letters, rest) = split_options(&args);
        assert_eq!(letters, vec!['n', 'p']);
        assert_eq!(rest, &args[2..]);

        let args: Vec<String> = ["-", "A"].iter().map(|s| s.to_string()).collect();
        let (letters, rest) = split_options(&args);
        assert!(letters.is_empty());
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_registry_replaces_and_lists() {
        let mut registry = BuiltinRegistry::default();
        assert!(registry.contains("export"));
        assert!(registry.contains("["));
        assert!(is_special_builtin("export"));
        assert!(!is_special_builtin("echo"));

        registry.register("echo", Arc::new(handle_false));
        assert!(registry.get("echo").is_some());
        assert_eq!(BuiltinRegistry::new().names().len(), 0);
    }
}
