//! wait, jobs - Background job control
//!
//! `wait` blocks until every background job has finished; `wait ID...`
//! waits for the given PIDs or `%N` job numbers and returns the status of
//! the last one. Captured output of waited jobs is emitted by `wait`.

use super::BuiltinContext;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::jobs::Job;
use crate::interpreter::types::ExecResult;

fn take_jobs(ctx: &BuiltinContext<'_>, specs: &[String]) -> Result<Vec<Result<Job, String>>, InterpreterError> {
    let mut table = ctx
        .engine
        .jobs
        .lock()
        .map_err(|_| InterpreterError::Internal("job table lock poisoned".to_string()))?;
    if specs.is_empty() {
        return Ok(table.take_all().into_iter().map(Ok).collect());
    }
    Ok(specs.iter().map(|spec| table.take(spec).ok_or_else(|| spec.clone())).collect())
}

pub fn handle_wait(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let jobs = take_jobs(ctx, ctx.args)?;
    let mut result = ExecResult::ok();
    for job in jobs {
        match job {
            Ok(job) => {
                let done = job.wait();
                result.stdout.push_str(&done.stdout);
                result.stderr.push_str(&done.stderr);
                if !ctx.args.is_empty() {
                    result.exit_code = done.exit_code;
                }
            }
            Err(spec) => {
                result.stderr.push_str(&format!("bash: wait: pid {} is not a child of this shell\n", spec));
                result.exit_code = 127;
            }
        }
    }
    Ok(result)
}

pub fn handle_jobs(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let table = ctx
        .engine
        .jobs
        .lock()
        .map_err(|_| InterpreterError::Internal("job table lock poisoned".to_string()))?;
    let stdout: String = table
        .jobs()
        .iter()
        .map(|job| {
            let status = if job.is_finished() { "Done" } else { "Running" };
            format!("[{}]  {:<24}{}\n", job.id, status, job.command)
        })
        .collect();
    Ok(ExecResult::success(stdout))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::builtins::test_support::run;
    use crate::interpreter::types::InterpreterState;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_collects_job_output_and_status() {
        let mut state = InterpreterState::default();
        let result = run(&mut state, "{ echo from-job; exit 3; } & wait $!; echo \"status $?\"");
        assert_eq!(result.stdout, "from-job\nstatus 3\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_job_runs_on_snapshot() {
        let mut state = InterpreterState::default();
        let result = run(&mut state, "X=before; X=inside & wait; echo $X");
        assert_eq!(result.stdout, "before\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_unknown_pid() {
        let mut state = InterpreterState::default();
        let result = run(&mut state, "wait 4242");
        assert_eq!(result.exit_code, 127);
        assert!(result.stderr.contains("pid 4242 is not a child of this shell"));
    }
}
