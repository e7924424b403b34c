//! Runs a single worker invocation in an isolated fault domain.
//!
//! Grounded on the orchestration engine's `WorkerPool`/`DagExecutor` pattern
//! of spawning a child task per unit of work and inspecting the
//! `JoinHandle` outcome: a panic or abort of that task never reaches the
//! caller as a Rust panic, it is normalized into a result value instead.

use super::job::{Job, WorkerError};

/// Outcome of a single execution attempt.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Success,
    Failure { error: String, stack: String },
}

/// Stateless runner. Never retries, never touches scheduler state.
pub struct JobExecutor;

impl JobExecutor {
    /// Invoke `job.worker.invoke(job.args)` under a supervised child task.
    pub async fn run(job: &Job) -> ExecutionOutcome {
        let worker = job.worker.clone();
        let args = job.args.clone();

        let handle = tokio::spawn(async move { worker.invoke(args).await });

        match handle.await {
            Ok(Ok(())) => ExecutionOutcome::Success,
            Ok(Err(WorkerError { message, stack })) => ExecutionOutcome::Failure {
                error: message,
                stack: stack.unwrap_or_default(),
            },
            Err(join_err) => {
                let detail = if join_err.is_panic() {
                    let payload = join_err.into_panic();
                    payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "worker task panicked".to_string())
                } else {
                    "worker task was cancelled".to_string()
                };
                ExecutionOutcome::Failure {
                    error: format!("The job runner crashed. Reason: {detail}"),
                    stack: String::new(),
                }
            }
        }
    }
}
