//! Background Jobs
//!
//! `cmd &` runs as a blocking task on the tokio runtime against a snapshot
//! of the shell state. Jobs get virtual PIDs; `wait` joins them and hands
//! back their captured output. Jobs that finished without being waited for
//! are reaped when `exec` returns.

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::interpreter::errors::InterpreterError;
use crate::interpreter::types::ExecResult;

const FIRST_JOB_PID: u32 = 1000;

/// A running or finished background job.
#[derive(Debug)]
pub struct Job {
    /// Job number, as in `%1`
    pub id: usize,
    /// Virtual process id, as in `$!`
    pub pid: u32,
    pub command: String,
    handle: JoinHandle<ExecResult>,
    runtime: Handle,
}

impl Job {
    /// Block until the job finishes.
    pub fn wait(self) -> ExecResult {
        let Job { pid, handle, runtime, .. } = self;
        match tokio::task::block_in_place(|| runtime.block_on(handle)) {
            Ok(result) => {
                debug!(pid, exit_code = result.exit_code, "background job reaped");
                result
            }
            Err(e) => {
                warn!(pid, error = %e, "background job failed");
                ExecResult::failure(format!("bash: job {} terminated abnormally\n", pid))
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Jobs started by one shell instance.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: usize,
    next_pid: u32,
    /// Runtime whose blocking pool runs the jobs
    runtime: Option<Handle>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new(Handle::try_current().ok())
    }
}

impl JobTable {
    pub fn new(runtime: Option<Handle>) -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
            next_pid: FIRST_JOB_PID,
            runtime,
        }
    }

    /// Start `run` on the runtime's blocking pool and return the job's
    /// virtual PID.
    pub fn spawn<F>(&mut self, command: String, run: F) -> Result<u32, InterpreterError>
    where
        F: FnOnce() -> ExecResult + Send + 'static,
    {
        let runtime = self
            .runtime
            .clone()
            .ok_or_else(|| InterpreterError::Internal("background jobs need a tokio runtime".to_string()))?;
        let id = self.next_id;
        let pid = self.next_pid;
        let handle = runtime.spawn_blocking(run);
        debug!(id, pid, command = %command, "background job started");
        self.jobs.push(Job { id, pid, command, handle, runtime });
        self.next_id += 1;
        self.next_pid += 1;
        Ok(pid)
    }

    /// Remove the job with this PID, or with job number `%N`.
    pub fn take(&mut self, spec: &str) -> Option<Job> {
        let position = match spec.strip_prefix('%') {
            Some(id) => {
                let id: usize = id.parse().ok()?;
                self.jobs.iter().position(|j| j.id == id)?
            }
            None => {
                let pid: u32 = spec.parse().ok()?;
                self.jobs.iter().position(|j| j.pid == pid)?
            }
        };
        Some(self.jobs.remove(position))
    }

    /// Remove every job, oldest first.
    pub fn take_all(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.jobs)
    }

    /// Remove the jobs that have already finished, oldest first.
    pub fn reap_finished(&mut self) -> Vec<Job> {
        let (finished, running): (Vec<Job>, Vec<Job>) = std::mem::take(&mut self.jobs).into_iter().partition(Job::is_finished);
        self.jobs = running;
        finished
    }

    /// Jobs not yet waited for, oldest first.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
