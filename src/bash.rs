//! Bash Environment
//!
//! Main entry point for the bash shell environment.
//! Ties together the parser, interpreter, and filesystem.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, error};

use crate::fs::{FileSystem, FsError, InMemoryFs, InitialFiles, MkdirOptions};
use crate::interpreter::builtins::{Builtin, BuiltinRegistry};
use crate::interpreter::command_resolution::{CommandResolver, NotFoundResolver};
use crate::interpreter::environment::Environment;
use crate::interpreter::execution_engine::{syntax_error_result, ExecutionEngine};
use crate::interpreter::sync_fs_adapter::SyncFsAdapter;
use crate::interpreter::types::{ExecResult, ExecutionLimits, InterpreterState};
use crate::parser::parse;

/// Options for creating a Bash environment.
#[derive(Default)]
pub struct BashOptions {
    /// Initial variables, all exported
    pub env: Option<HashMap<String, String>>,
    /// Initial alias table
    pub aliases: Option<IndexMap<String, String>>,
    /// Working directory
    pub cwd: Option<String>,
    /// File system instance (defaults to InMemoryFs)
    pub fs: Option<Arc<dyn FileSystem>>,
    /// Files to seed the default InMemoryFs with
    pub files: Option<InitialFiles>,
    /// Runs commands that are neither functions nor builtins
    pub resolver: Option<Arc<dyn CommandResolver>>,
    /// Execution limits
    pub limits: Option<ExecutionLimits>,
    /// Extra builtins, replacing reference builtins of the same name
    pub builtins: Vec<(String, Arc<dyn Builtin>)>,
}

/// Requests that a running `exec` stop. Cloneable and usable from any
/// thread.
#[derive(Clone)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Unwind the running script with status 130. Output produced so far
    /// is kept.
    pub fn interrupt(&self) {
        debug!("interrupt requested");
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The main Bash shell environment.
pub struct Bash {
    pub fs: Arc<dyn FileSystem>,
    engine: ExecutionEngine,
    state: InterpreterState,
}

impl Bash {
    /// Create a new Bash environment.
    pub async fn new(options: BashOptions) -> Self {
        let cwd = options.cwd.unwrap_or_else(|| "/home/user".to_string());

        let fs: Arc<dyn FileSystem> = match (options.fs, options.files) {
            (Some(fs), _) => fs,
            (None, Some(files)) => Arc::new(InMemoryFs::with_files(&files)),
            (None, None) => Arc::new(InMemoryFs::new()),
        };

        // Build default environment
        let mut env: IndexMap<String, String> = IndexMap::new();
        env.insert("HOME".to_string(), "/home/user".to_string());
        env.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        env.insert("PWD".to_string(), cwd.clone());
        env.insert("OLDPWD".to_string(), cwd.clone());
        // Merge user-provided env
        if let Some(user_env) = options.env {
            env.extend(user_env);
        }

        let mut state = InterpreterState {
            env: Environment::with_exported(env),
            cwd: cwd.clone(),
            previous_dir: cwd.clone(),
            ..InterpreterState::default()
        };
        if let Some(aliases) = options.aliases {
            state.aliases = aliases;
        }

        init_filesystem(&*fs).await;
        // Ensure cwd exists
        if let Err(e) = fs.mkdir(&cwd, &MkdirOptions { recursive: true }).await {
            debug!(cwd = %cwd, error = %e, "working directory not created");
        }

        let mut builtins = BuiltinRegistry::default();
        for (name, builtin) in options.builtins {
            builtins.register(name, builtin);
        }
        let resolver = options.resolver.unwrap_or_else(|| Arc::new(NotFoundResolver));
        let sync_fs = Arc::new(SyncFsAdapter::new(fs.clone(), tokio::runtime::Handle::current()));
        let engine = ExecutionEngine::new(sync_fs, Arc::new(builtins), resolver, options.limits.unwrap_or_default());

        Self { fs, engine, state }
    }

    /// Execute a bash script against this shell's persistent state.
    ///
    /// Needs a multi-threaded tokio runtime: the script runs on a
    /// dedicated engine thread while the calling worker is blocked.
    /// Background jobs run on the runtime's blocking pool, so its thread
    /// stack size bounds how deeply a job may recurse.
    pub async fn exec(&mut self, script: &str) -> ExecResult {
        if script.trim().is_empty() {
            return ExecResult::ok();
        }

        self.engine.interrupt.store(false, Ordering::SeqCst);
        self.state.command_count = 0;

        let engine = &self.engine;
        let state = &mut self.state;
        // Use block_in_place to bridge async context with sync execution engine
        tokio::task::block_in_place(|| {
            std::thread::scope(|scope| {
                let spawned = std::thread::Builder::new()
                    .name("bashlet-exec".to_string())
                    .stack_size(engine.limits.stack_size)
                    .spawn_scoped(scope, move || match parse(script) {
                        Ok(ast) => {
                            debug!(statements = ast.statements.len(), "exec");
                            let mut result = engine.run_script(state, &ast);
                            let reaped = engine.reap_finished_jobs();
                            result.stdout.push_str(&reaped.stdout);
                            result.stderr.push_str(&reaped.stderr);
                            result
                        }
                        Err(e) => {
                            debug!(error = %e, "parse failed");
                            syntax_error_result(&e)
                        }
                    });
                match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        error!("execution thread panicked");
                        ExecResult::failure("bash: internal error: execution panicked\n")
                    }),
                    Err(e) => ExecResult::failure(format!("bash: internal error: {}\n", e)),
                }
            })
        })
    }

    /// Handle that interrupts whichever `exec` call is running.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            flag: Arc::clone(&self.engine.interrupt),
        }
    }

    /// Register a builtin; replaces any builtin of the same name.
    pub fn register_builtin(&mut self, name: impl Into<String>, builtin: Arc<dyn Builtin>) {
        Arc::make_mut(&mut self.engine.builtins).register(name, builtin);
    }

    /// Read a file relative to cwd.
    pub async fn read_file(&self, path: &str) -> Result<String, FsError> {
        let resolved = self.fs.resolve_path(&self.state.cwd, path);
        self.fs.read_file(&resolved).await
    }

    /// Write a file relative to cwd.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), FsError> {
        let resolved = self.fs.resolve_path(&self.state.cwd, path);
        self.fs.write_file(&resolved, content.as_bytes()).await
    }

    /// Get current working directory.
    pub fn get_cwd(&self) -> &str {
        &self.state.cwd
    }

    /// Value of a shell variable.
    pub fn get_var(&self, name: &str) -> Option<String> {
        self.state.env.get_value(name)
    }

    /// The environment handed to external commands.
    pub fn exported_env(&self) -> std::collections::BTreeMap<String, String> {
        self.state.env.flatten_exported()
    }
}

/// Initialize the filesystem with standard directories and device files.
async fn init_filesystem(fs: &dyn FileSystem) {
    for dir in ["/bin", "/usr/bin", "/tmp", "/home/user", "/dev"] {
        if let Err(e) = fs.mkdir(dir, &MkdirOptions { recursive: true }).await {
            debug!(dir, error = %e, "directory not created");
        }
    }
    if let Err(e) = fs.write_file("/dev/null", b"").await {
        debug!(error = %e, "/dev/null not created");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::builtins::BuiltinContext;
    use crate::interpreter::command_resolution::CommandRequest;
    use crate::interpreter::errors::InterpreterError;

    #[tokio::test]
    async fn test_bash_new_default() {
        let bash = Bash::new(BashOptions::default()).await;
        assert_eq!(bash.get_cwd(), "/home/user");
        assert_eq!(bash.get_var("HOME").as_deref(), Some("/home/user"));
        assert_eq!(bash.exported_env().get("PATH").map(String::as_str), Some("/usr/bin:/bin"));
    }

    #[tokio::test]
    async fn test_bash_custom_cwd() {
        let bash = Bash::new(BashOptions {
            cwd: Some("/work".to_string()),
            ..Default::default()
        })
        .await;
        assert_eq!(bash.get_cwd(), "/work");
        assert!(bash.fs.exists("/work").await);
    }

    #[tokio::test]
    async fn test_filesystem_initialized() {
        let bash = Bash::new(BashOptions::default()).await;
        assert!(bash.fs.exists("/bin").await);
        assert!(bash.fs.exists("/usr/bin").await);
        assert!(bash.fs.exists("/dev/null").await);
        assert!(bash.fs.exists("/home/user").await);
        assert!(bash.fs.exists("/tmp").await);
    }

    #[tokio::test]
    async fn test_read_write_file() {
        let bash = Bash::new(BashOptions::default()).await;
        bash.write_file("test.txt", "hello world").await.unwrap();
        let content = bash.read_file("/home/user/test.txt").await.unwrap();
        assert_eq!(content, "hello world");
    }

    #[tokio::test]
    async fn test_exec_empty() {
        let mut bash = Bash::new(BashOptions::default()).await;
        let result = bash.exec("  \n").await;
        assert_eq!(result, ExecResult::ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_syntax_error_runs_nothing() {
        let mut bash = Bash::new(BashOptions::default()).await;
        let result = bash.exec("X=1; if then").await;
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.starts_with("bash: syntax error"));
        assert_eq!(bash.get_var("X"), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_deep_nesting_is_syntax_error() {
        let mut bash = Bash::new(BashOptions::default()).await;
        let subshells = format!("{}echo hi{}", "( ".repeat(100), " )".repeat(100));
        let result = bash.exec(&subshells).await;
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.starts_with("bash: syntax error"));

        let substitutions = format!("{}echo hi{}", "$(echo ".repeat(100), ")".repeat(100));
        assert_eq!(bash.exec(&substitutions).await.exit_code, 2);

        let ifs = format!("{}true{}", "if true; then ".repeat(100), "; fi".repeat(100));
        assert_eq!(bash.exec(&ifs).await.exit_code, 2);

        assert_eq!(bash.exec("echo still here").await.stdout, "still here\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_finished_jobs_are_reaped_when_exec_returns() {
        let mut bash = Bash::new(BashOptions::default()).await;
        let started = bash.exec("echo bg &").await;
        let finished = || bash.engine.jobs.lock().unwrap().jobs().iter().all(|j| j.is_finished());
        while !finished() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let next = bash.exec("true").await;
        assert!(bash.engine.jobs.lock().unwrap().is_empty());
        assert_eq!(format!("{}{}", started.stdout, next.stdout), "bg\n");
        assert_eq!(bash.exec("wait").await.stdout, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_deep_arithmetic_fails_with_status_1() {
        let mut bash = Bash::new(BashOptions::default()).await;
        let script = format!("echo $(( {}1{} ))", "(".repeat(5000), ")".repeat(5000));
        let result = bash.exec(&script).await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("expression nested too deeply"));
        assert_eq!(result.stdout, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_scenarios() {
        let mut bash = Bash::new(BashOptions::default()).await;
        assert_eq!(bash.exec("export FOO=bar\necho $FOO").await.stdout, "bar\n");
        assert_eq!(bash.exec("export FOO=bar BAZ=qux\necho $FOO $BAZ").await.stdout, "bar qux\n");
        assert_eq!(
            bash.exec("export URL=http://example.com?foo=bar\necho $URL").await.stdout,
            "http://example.com?foo=bar\n"
        );
        assert_eq!(bash.exec("export EMPTY\ntest -z \"$EMPTY\" && echo empty").await.stdout, "empty\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_existing_variable_becomes_exported() {
        let mut bash = Bash::new(BashOptions::default()).await;
        bash.exec("EXISTING=value").await;
        assert!(!bash.exported_env().contains_key("EXISTING"));

        let result = bash.exec("export EXISTING\necho $EXISTING\nexport").await;
        assert!(result.stdout.starts_with("value\n"));
        assert!(result.stdout.contains("declare -x EXISTING='value'\n"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_listing_escapes_single_quotes() {
        let mut bash = Bash::new(BashOptions::default()).await;
        let result = bash.exec("export MSG=\"it's working\"\nexport").await;
        assert!(result.stdout.contains("it'\\''s working"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_listing_round_trips() {
        let mut bash = Bash::new(BashOptions::default()).await;
        bash.exec("export TRICKY=\"a'b \\\"c\\\" \\$d=e\"").await;
        let listing = bash.exec("export").await.stdout;

        let mut fresh = Bash::new(BashOptions::default()).await;
        let result = fresh.exec(&listing).await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(fresh.get_var("TRICKY").as_deref(), Some("a'b \"c\" $d=e"));
        assert_eq!(fresh.exec("export").await.stdout, listing);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_state_persists_across_exec_calls() {
        let mut bash = Bash::new(BashOptions::default()).await;
        bash.exec("greet() { echo \"hi $1\"; }; alias g=greet; cd /tmp").await;
        let result = bash.exec("g there; pwd").await;
        assert_eq!(result.stdout, "hi there\n/tmp\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_subshell_changes_are_discarded() {
        let mut bash = Bash::new(BashOptions::default()).await;
        let result = bash.exec("A=1; (A=2; export B=3); echo \"$A ${B-none}\"").await;
        assert_eq!(result.stdout, "1 none\n");
        assert!(!bash.exported_env().contains_key("B"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipefail() {
        let mut bash = Bash::new(BashOptions::default()).await;
        assert_eq!(bash.exec("false | true").await.exit_code, 0);
        assert_eq!(bash.exec("set -o pipefail; false | true").await.exit_code, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_n_keeps_value() {
        let mut bash = Bash::new(BashOptions::default()).await;
        let result = bash.exec("export KEEP=v; export -n KEEP; echo \"$KEEP\"").await;
        assert_eq!(result.stdout, "v\n");
        assert!(!bash.exported_env().contains_key("KEEP"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_initial_env_and_aliases() {
        let mut bash = Bash::new(BashOptions {
            env: Some(HashMap::from([("GREETING".to_string(), "hello".to_string())])),
            aliases: Some(IndexMap::from([("say".to_string(), "echo".to_string())])),
            ..Default::default()
        })
        .await;
        assert_eq!(bash.exec("say $GREETING").await.stdout, "hello\n");
        assert!(bash.exported_env().contains_key("GREETING"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resolver_receives_exported_env() {
        let resolver = |request: CommandRequest<'_>| {
            let visible: Vec<&str> = ["SHOWN", "HIDDEN"]
                .into_iter()
                .filter(|name| request.env.contains_key(*name))
                .collect();
            ExecResult::success(format!("{} {}\n", request.name(), visible.join(",")))
        };
        let mut bash = Bash::new(BashOptions {
            resolver: Some(Arc::new(resolver)),
            ..Default::default()
        })
        .await;
        let result = bash.exec("export SHOWN=1; HIDDEN=2; tool").await;
        assert_eq!(result.stdout, "tool SHOWN\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_registered_builtin_replaces_reference_one() {
        let mut bash = Bash::new(BashOptions::default()).await;
        let shout = |ctx: &mut BuiltinContext<'_>| {
            Ok::<_, InterpreterError>(ExecResult::success(format!("{}\n", ctx.args.join(" ").to_uppercase())))
        };
        bash.register_builtin("echo", Arc::new(shout));
        assert_eq!(bash.exec("echo quiet").await.stdout, "QUIET\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interrupt_before_exec_is_cleared() {
        let mut bash = Bash::new(BashOptions::default()).await;
        let handle = bash.interrupt_handle();
        handle.interrupt();
        assert!(handle.is_interrupted());
        let result = bash.exec("echo ran").await;
        assert_eq!(result.stdout, "ran\n");
        assert!(!handle.is_interrupted());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exec_exit() {
        let mut bash = Bash::new(BashOptions::default()).await;
        let result = bash.exec("echo before; exit 42; echo after").await;
        assert_eq!(result.stdout, "before\n");
        assert_eq!(result.exit_code, 42);
    }
}
