//! Command Resolution
//!
//! Commands that are neither builtins nor functions are handed to a
//! `CommandResolver` supplied by the host. The engine never inspects how
//! a resolver locates or runs them.

use std::collections::BTreeMap;

use crate::interpreter::io::InputStream;
use crate::interpreter::types::ExecResult;

/// Everything an external command gets to see.
pub struct CommandRequest<'a> {
    /// Expanded argv; `argv[0]` is the command name
    pub argv: &'a [String],
    /// Flattened exported environment, prefix assignments included
    pub env: &'a BTreeMap<String, String>,
    pub cwd: &'a str,
    /// Standard input after redirections
    pub stdin: &'a mut InputStream,
}

impl CommandRequest<'_> {
    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// Runs external commands.
pub trait CommandResolver: Send + Sync {
    fn execute(&self, request: CommandRequest<'_>) -> ExecResult;
}

impl<F> CommandResolver for F
where
    F: Fn(CommandRequest<'_>) -> ExecResult + Send + Sync,
{
    fn execute(&self, request: CommandRequest<'_>) -> ExecResult {
        self(request)
    }
}

/// Resolver that knows no commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundResolver;

impl CommandResolver for NotFoundResolver {
    fn execute(&self, request: CommandRequest<'_>) -> ExecResult {
        command_not_found(request.name())
    }
}

/// Status and diagnostic for an unknown command.
pub fn command_not_found(name: &str) -> ExecResult {
    ExecResult::failure_with_code(format!("bash: {}: command not found\n", name), 127)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_resolver() {
        let argv = vec!["nope".to_string(), "arg".to_string()];
        let env = BTreeMap::new();
        let mut stdin = InputStream::Empty;
        let result = NotFoundResolver.execute(CommandRequest { argv: &argv, env: &env, cwd: "/", stdin: &mut stdin });
        assert_eq!(result.exit_code, 127);
        assert_eq!(result.stderr, "bash: nope: command not found\n");
    }

    fn describe(mut request: CommandRequest<'_>) -> ExecResult {
        let input = request.stdin.read_to_string();
        ExecResult::success(format!("{} {:?} {} {}", request.name(), request.args(), request.env.len(), input))
    }

    #[test]
    fn test_fn_resolver_sees_request() {
        let resolver = describe;
        let argv = vec!["cat".to_string(), "-n".to_string()];
        let mut env = BTreeMap::new();
        env.insert("A".to_string(), "1".to_string());
        let mut stdin = InputStream::from_string("in");
        let result = resolver.execute(CommandRequest { argv: &argv, env: &env, cwd: "/", stdin: &mut stdin });
        assert_eq!(result.stdout, "cat [\"-n\"] 1 in");
    }
}
