//! Per-submission driver: talks to the [`Scheduler`], consults
//! [`RetryPolicy`] on failure, and publishes the terminal [`EventBus`]
//! event.
//!
//! Grounded on the `DagExecutor`'s per-node driving loop (run, inspect
//! outcome, decide next step, emit an event) but scoped to a single job
//! instead of a dependency graph, and on the retry/backoff call site in
//! `orchestrator/worker_pool.rs`.

use std::sync::Arc;

use tracing::{error, warn};

use super::events::{EventBus, JobEvent, JobEventKind};
use super::job::Job;
use super::retry::{RetryPolicy, RetrySetting};
use super::scheduler::{RunOutcome, Scheduler};

/// Drives one submission from first attempt through its terminal event.
/// Holds no state between submissions; everything it needs travels with the
/// spawned task.
pub struct RunnerCoordinator {
    scheduler: Arc<Scheduler>,
    events: Arc<EventBus>,
    global_retry: Option<RetrySetting>,
}

impl RunnerCoordinator {
    pub fn new(scheduler: Arc<Scheduler>, events: Arc<EventBus>, global_retry: Option<RetrySetting>) -> Self {
        Self {
            scheduler,
            events,
            global_retry,
        }
    }

    /// Spawn a logically independent task that drives `job` to completion.
    /// Returns immediately; the caller does not await the outcome.
    pub fn submit(&self, job: Job) {
        let scheduler = self.scheduler.clone();
        let events = self.events.clone();
        let global_retry = self.global_retry;

        tokio::spawn(async move {
            Self::drive(scheduler, events, global_retry, job).await;
        });
    }

    async fn drive(scheduler: Arc<Scheduler>, events: Arc<EventBus>, global_retry: Option<RetrySetting>, job: Job) {
        let initial_delay = job.delay_until.map(|run_at| run_at.saturating_sub(super::time::now_ms()));
        let mut outcome = scheduler.run(job.clone(), initial_delay).await;
        let mut attempt: u32 = 0;

        loop {
            match outcome {
                RunOutcome::Dropped(job) => {
                    events.publish(JobEvent {
                        kind: JobEventKind::Dropped,
                        job,
                    });
                    return;
                }
                RunOutcome::Success(job) => {
                    events.publish(JobEvent {
                        kind: JobEventKind::Finished,
                        job,
                    });
                    return;
                }
                RunOutcome::Failure { job, error, stack } => {
                    let cfg = RetryPolicy::resolve(global_retry, job.worker.retry_override(), job.retry);
                    attempt += 1;

                    if RetryPolicy::should_retry(&cfg, attempt) {
                        let delay = RetryPolicy::delay_for(&cfg, attempt);
                        warn!(
                            job_id = %job.id,
                            worker = job.worker.name(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "job attempt failed, retrying"
                        );
                        outcome = scheduler.run(job, Some(delay.as_millis() as u64)).await;
                    } else {
                        error!(
                            job_id = %job.id,
                            worker = job.worker.name(),
                            args = %job.args,
                            attempt,
                            error = %error,
                            stack = %stack,
                            "job retries exhausted"
                        );
                        events.publish(JobEvent {
                            kind: JobEventKind::Failed,
                            job,
                        });
                        return;
                    }
                }
            }
        }
    }
}
