//! Redirection Handling
//!
//! Handles:
//! - < : Read stdin from file
//! - > / >> : Write (append) stdout to file
//! - N> / N>> : Same for another fd (1 or 2)
//! - &> : Write both stdout and stderr to file
//! - N>&M / N<&M : Duplicate fd M onto N
//! - N>&- : Close fd N
//! - << / <<- : Here-document
//! - <<< : Here-string
//!
//! Redirections are evaluated left to right before the command runs, so a
//! later redirection of the same fd wins and `2>&1 >f` differs from
//! `>f 2>&1`. Command output is routed after the command finishes.
//!
//! Limitations: a command's whole stdout is routed before its stderr, so
//! when both reach one file (`&>f`, `>f 2>&1`) their interleaving is lost.
//! Only fds 0, 1 and 2 exist; input dups other than `<&-` and `<&0` fail
//! with `Bad file descriptor`.

use crate::ast::types::{RedirectionNode, RedirectionOperator, RedirectionTarget};
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::ExecutionEngine;
use crate::interpreter::io::{IoContext, InputStream};
use crate::interpreter::types::{ExecResult, InterpreterState};

const DEV_NULL: &str = "/dev/null";

/// Where an output fd goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    Stderr,
    /// Absolute path, already created or truncated
    File(String),
    Closed,
}

/// Resolved redirections of one command.
#[derive(Debug)]
pub struct RedirectPlan {
    /// Replacement stdin, if redirected
    pub stdin: Option<InputStream>,
    /// Targets for fd 1 and fd 2
    pub stdout: OutputTarget,
    pub stderr: OutputTarget,
}

impl Default for RedirectPlan {
    fn default() -> Self {
        Self {
            stdin: None,
            stdout: OutputTarget::Stdout,
            stderr: OutputTarget::Stderr,
        }
    }
}

impl RedirectPlan {
    fn target(&self, fd: i32) -> Option<&OutputTarget> {
        match fd {
            1 => Some(&self.stdout),
            2 => Some(&self.stderr),
            _ => None,
        }
    }

    fn set_target(&mut self, fd: i32, target: OutputTarget) {
        match fd {
            1 => self.stdout = target,
            2 => self.stderr = target,
            _ => {}
        }
    }

    /// True if fd 1 no longer reaches the command's own stdout.
    pub fn redirects_stdout(&self) -> bool {
        self.stdout != OutputTarget::Stdout
    }
}

fn redirection_error(target: &str, message: &str) -> InterpreterError {
    InterpreterError::Redirection(format!("{}: {}", target, message))
}

impl ExecutionEngine {
    /// Evaluate redirections in order, opening output files.
    pub fn prepare_redirections(
        &self,
        state: &mut InterpreterState,
        redirections: &[RedirectionNode],
    ) -> Result<RedirectPlan, InterpreterError> {
        let mut plan = RedirectPlan::default();
        for redirection in redirections {
            let fd = redirection.target_fd();
            let word = match &redirection.target {
                RedirectionTarget::HereDoc(doc) => {
                    let body = self.expand_word_to_string(state, &doc.content)?;
                    if fd == 0 {
                        plan.stdin = Some(InputStream::from_string(body));
                    }
                    continue;
                }
                RedirectionTarget::Word(word) => self.expand_word_to_string(state, word)?,
            };

            match redirection.operator {
                RedirectionOperator::Less => {
                    let content = self.read_input_file(state, &word)?;
                    if fd == 0 {
                        plan.stdin = Some(InputStream::from_string(content));
                    }
                }
                RedirectionOperator::TLess => {
                    if fd == 0 {
                        plan.stdin = Some(InputStream::from_string(format!("{}\n", word)));
                    }
                }
                RedirectionOperator::DLess | RedirectionOperator::DLessDash => {}
                RedirectionOperator::LessAnd => match (fd, word.as_str()) {
                    (0, "-") => plan.stdin = Some(InputStream::Empty),
                    (_, "-") | (0, "0") => {}
                    _ => return Err(redirection_error(&word, "Bad file descriptor")),
                },
                RedirectionOperator::Great | RedirectionOperator::DGreat => {
                    let append = redirection.operator == RedirectionOperator::DGreat;
                    let target = self.open_output_file(state, &word, append)?;
                    plan.set_target(fd, target);
                }
                RedirectionOperator::AndGreat => {
                    let target = self.open_output_file(state, &word, false)?;
                    plan.set_target(1, target.clone());
                    plan.set_target(2, target);
                }
                RedirectionOperator::GreatAnd => {
                    if word == "-" {
                        plan.set_target(fd, OutputTarget::Closed);
                    } else if let Ok(source) = word.parse::<i32>() {
                        match plan.target(source) {
                            Some(target) => {
                                let target = target.clone();
                                plan.set_target(fd, target);
                            }
                            None if source == 0 => {}
                            None => return Err(redirection_error(&word, "Bad file descriptor")),
                        }
                    } else {
                        // `>& file` is `&> file`
                        let target = self.open_output_file(state, &word, false)?;
                        plan.set_target(1, target.clone());
                        plan.set_target(2, target);
                    }
                }
            }
        }
        Ok(plan)
    }

    fn read_input_file(&self, state: &InterpreterState, target: &str) -> Result<String, InterpreterError> {
        let path = self.fs.resolve_path(&state.cwd, target);
        if path == DEV_NULL {
            return Ok(String::new());
        }
        self.fs.read_file(&path).map_err(|e| redirection_error(target, e.shell_message()))
    }

    fn open_output_file(&self, state: &InterpreterState, target: &str, append: bool) -> Result<OutputTarget, InterpreterError> {
        if target.is_empty() {
            return Err(redirection_error(target, "No such file or directory"));
        }
        let path = self.fs.resolve_path(&state.cwd, target);
        if path == DEV_NULL {
            return Ok(OutputTarget::Closed);
        }
        if self.fs.is_dir(&path) {
            return Err(redirection_error(target, "Is a directory"));
        }
        let opened = if append {
            self.fs.append_file(&path, "")
        } else {
            self.fs.write_file(&path, "")
        };
        opened.map_err(|e| redirection_error(target, e.shell_message()))?;
        Ok(OutputTarget::File(path))
    }

    /// Route a finished command's output according to the plan.
    pub fn route_output(&self, plan: &RedirectPlan, stdout: String, stderr: String) -> (String, String) {
        let mut out = String::new();
        let mut err = String::new();
        for (text, target) in [(stdout, &plan.stdout), (stderr, &plan.stderr)] {
            if text.is_empty() {
                continue;
            }
            match target {
                OutputTarget::Stdout => out.push_str(&text),
                OutputTarget::Stderr => err.push_str(&text),
                OutputTarget::Closed => {}
                OutputTarget::File(path) => {
                    if let Err(e) = self.fs.append_file(path, &text) {
                        err.push_str(&format!("bash: {}: {}\n", path, e.shell_message()));
                    }
                }
            }
        }
        (out, err)
    }

    /// Run `body` with `redirections` applied. Failing redirections fail
    /// the command with status 1 without running it.
    pub(crate) fn with_redirections<F>(
        &self,
        state: &mut InterpreterState,
        redirections: &[RedirectionNode],
        io: &mut IoContext,
        body: F,
    ) -> Result<ExecResult, InterpreterError>
    where
        F: FnOnce(&Self, &mut InterpreterState, &mut IoContext) -> Result<ExecResult, InterpreterError>,
    {
        if redirections.is_empty() {
            return body(self, state, io);
        }
        let mut plan = match self.prepare_redirections(state, redirections) {
            Ok(plan) => plan,
            Err(e) if e.is_command_failure() => {
                let mut stderr = std::mem::take(&mut state.expansion_stderr);
                stderr.push_str(&format!("bash: {}\n", e));
                return Ok(ExecResult::failure(stderr));
            }
            Err(e) => return Err(e),
        };

        let redirected_stdin = plan.stdin.take();
        let uses_parent_stdin = redirected_stdin.is_none();
        let mut inner = IoContext::new(
            redirected_stdin.unwrap_or_else(|| std::mem::take(&mut io.stdin)),
            if plan.redirects_stdout() { None } else { io.sink.clone() },
        );
        let outcome = body(self, state, &mut inner);
        if uses_parent_stdin {
            io.stdin = inner.stdin;
        }

        match outcome {
            Ok(result) => {
                let (stdout, stderr) = self.route_output(&plan, result.stdout, result.stderr);
                Ok(ExecResult::new(stdout, stderr, result.exit_code))
            }
            Err(mut e) => {
                if let Some((stdout, stderr)) = e.output_mut() {
                    let (routed_out, routed_err) =
                        self.route_output(&plan, std::mem::take(stdout), std::mem::take(stderr));
                    *stdout = routed_out;
                    *stderr = routed_err;
                }
                Err(e)
            }
        }
    }
}
