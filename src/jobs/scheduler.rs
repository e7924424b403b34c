//! The admission/concurrency/delay/dedup control point.
//!
//! Grounded on the `DagExecutor`'s single mpsc-driven actor task that owns
//! all mutable execution state, combined with the per-worker-type slot
//! accounting of `WorkerPool`. Unlike `WorkerPool`'s `Semaphore`, a single
//! worker type here needs FIFO pending waiters, a time-ordered delayed set,
//! and duplicate suppression all mutating the same state atomically, so a
//! semaphore alone cannot express it — hence the actor.
//!
//! Callers never touch [`SchedulerState`] directly; they send a message and
//! wait on a private `oneshot` mailbox for `admit` or `drop`.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::executor::{ExecutionOutcome, JobExecutor};
use super::job::{Concurrency, DuplicatePolicy, Job, JobId};
use super::time;
use crate::error::CoreError;

/// Outcome of [`Scheduler::run`].
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Success(Job),
    Failure { job: Job, error: String, stack: String },
    Dropped(Job),
}

impl RunOutcome {
    fn from_execution(job: Job, outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Success => Self::Success(job),
            ExecutionOutcome::Failure { error, stack } => Self::Failure { job, error, stack },
        }
    }

    fn actor_unavailable(job: Job) -> Self {
        let err = CoreError::actor_unavailable();
        Self::Failure {
            job,
            error: err.message().to_string(),
            stack: String::new(),
        }
    }
}

/// Point-in-time counts for one worker type, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub running: usize,
    pub pending: usize,
    pub delayed: usize,
}

enum WaiterSignal {
    Admit(Job),
    Drop,
}

struct Waiter {
    job: Job,
    reply: oneshot::Sender<WaiterSignal>,
}

struct DelayedEntry {
    run_at: u64,
    job: Job,
    reply: oneshot::Sender<WaiterSignal>,
}

#[derive(Default)]
struct WorkerState {
    running: Vec<Job>,
    pending: VecDeque<Waiter>,
}

#[derive(Default)]
struct SchedulerState {
    workers: HashMap<String, WorkerState>,
    delayed: Vec<DelayedEntry>,
}

enum Msg {
    RequestRun {
        job: Job,
        run_at: Option<u64>,
        reply: oneshot::Sender<WaiterSignal>,
    },
    ConfirmDone {
        worker_name: String,
        job_id: JobId,
    },
    Stats {
        worker_name: String,
        reply: oneshot::Sender<WorkerStats>,
    },
}

/// Handle to the scheduling actor. Cheap to clone conceptually but kept
/// single-owner here; share behind an `Arc` if multiple drivers need it.
pub struct Scheduler {
    sender: mpsc::UnboundedSender<Msg>,
    _actor: JoinHandle<()>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let actor = tokio::spawn(Self::actor_loop(receiver));
        Self {
            sender,
            _actor: actor,
        }
    }

    /// Run `job`, optionally delayed by `delay_ms`. See module docs for the
    /// fast-path/slow-path split; both paths are observably equivalent.
    pub async fn run(&self, job: Job, delay_ms: Option<u64>) -> RunOutcome {
        let run_at = delay_ms.map(|d| time::now_ms() + d).or(job.delay_until);

        let fast_path = run_at.is_none()
            && matches!(job.worker.max_concurrent(), Concurrency::Unbounded)
            && job.worker.duplicate_policy() == DuplicatePolicy::Accept;

        if fast_path {
            let outcome = JobExecutor::run(&job).await;
            return RunOutcome::from_execution(job, outcome);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let sent = self.sender.send(Msg::RequestRun {
            job: job.clone(),
            run_at,
            reply: reply_tx,
        });
        if sent.is_err() {
            return RunOutcome::actor_unavailable(job);
        }

        let signal = match reply_rx.await {
            Ok(signal) => signal,
            Err(_) => return RunOutcome::actor_unavailable(job),
        };

        match signal {
            WaiterSignal::Drop => RunOutcome::Dropped(job),
            WaiterSignal::Admit(admitted) => {
                let outcome = JobExecutor::run(&admitted).await;
                let _ = self.sender.send(Msg::ConfirmDone {
                    worker_name: admitted.worker.name().to_string(),
                    job_id: admitted.id.clone(),
                });
                RunOutcome::from_execution(admitted, outcome)
            }
        }
    }

    /// Snapshot of running/pending/delayed counts for one worker type.
    pub async fn stats(&self, worker_name: &str) -> crate::error::Result<WorkerStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let sent = self.sender.send(Msg::Stats {
            worker_name: worker_name.to_string(),
            reply: reply_tx,
        });
        if sent.is_err() {
            return Err(CoreError::actor_unavailable());
        }
        reply_rx.await.map_err(|_| CoreError::actor_unavailable())
    }

    async fn actor_loop(mut receiver: mpsc::UnboundedReceiver<Msg>) {
        let mut state = SchedulerState::default();
        let mut timer: Option<Pin<Box<tokio::time::Sleep>>> = None;

        loop {
            let wait_for_timer = async {
                match timer.as_mut() {
                    Some(sleep) => sleep.as_mut().await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                msg = receiver.recv() => {
                    match msg {
                        Some(msg) => Self::handle_message(&mut state, msg),
                        None => return,
                    }
                }
                _ = wait_for_timer => {
                    Self::handle_timer_fire(&mut state);
                }
            }

            timer = Self::rearm(&state);
        }
    }

    fn rearm(state: &SchedulerState) -> Option<Pin<Box<tokio::time::Sleep>>> {
        state
            .delayed
            .iter()
            .map(|entry| entry.run_at)
            .min()
            .map(|run_at| Box::pin(tokio::time::sleep_until(time::to_tokio_instant(run_at))))
    }

    fn handle_message(state: &mut SchedulerState, msg: Msg) {
        match msg {
            Msg::RequestRun { job, run_at, reply } => Self::admit_or_queue(state, job, run_at, reply),
            Msg::ConfirmDone { worker_name, job_id } => Self::confirm_done(state, &worker_name, &job_id),
            Msg::Stats { worker_name, reply } => {
                let stats = Self::worker_stats(state, &worker_name);
                let _ = reply.send(stats);
            }
        }
    }

    fn worker_stats(state: &SchedulerState, worker_name: &str) -> WorkerStats {
        let (running, pending) = state
            .workers
            .get(worker_name)
            .map(|ws| (ws.running.len(), ws.pending.len()))
            .unwrap_or_default();
        let delayed = state
            .delayed
            .iter()
            .filter(|entry| entry.job.worker.name() == worker_name)
            .count();
        WorkerStats {
            running,
            pending,
            delayed,
        }
    }

    /// The admission algorithm: dedup check, delayed-insert, or
    /// admit-now-or-enqueue.
    fn admit_or_queue(state: &mut SchedulerState, job: Job, run_at: Option<u64>, reply: oneshot::Sender<WaiterSignal>) {
        let worker_name = job.worker.name().to_string();
        let drop_dedup = job.worker.duplicate_policy() == DuplicatePolicy::Drop;

        if drop_dedup && Self::duplicate_running_or_pending(state, &worker_name, &job) {
            let _ = reply.send(WaiterSignal::Drop);
            return;
        }

        let now = time::now_ms();
        if let Some(t) = run_at {
            if t > now {
                state.delayed.push(DelayedEntry { run_at: t, job, reply });
                if drop_dedup {
                    Self::collapse_delayed_duplicates(state, &worker_name);
                }
                return;
            }
        }

        let max_concurrent = job.worker.max_concurrent();
        let has_room = {
            let ws = state.workers.entry(worker_name.clone()).or_default();
            match max_concurrent {
                Concurrency::Unbounded => true,
                Concurrency::Limited(n) => ws.running.len() < n,
            }
        };

        if has_room {
            let admitted = job.clone();
            state.workers.get_mut(&worker_name).unwrap().running.push(admitted.clone());
            let _ = reply.send(WaiterSignal::Admit(job));
            Self::drop_redundant_delayed(state, &admitted);
        } else {
            state
                .workers
                .get_mut(&worker_name)
                .unwrap()
                .pending
                .push_back(Waiter { job: job.clone(), reply });
            Self::drop_redundant_delayed(state, &job);
        }
    }

    fn confirm_done(state: &mut SchedulerState, worker_name: &str, job_id: &JobId) {
        let admitted = {
            let ws = state.workers.get_mut(worker_name).unwrap_or_else(|| {
                panic!("invariant violation: confirm_done for unknown worker {worker_name}")
            });

            let pos = ws.running.iter().position(|j| &j.id == job_id).unwrap_or_else(|| {
                panic!(
                    "invariant violation: confirm_done for job {job_id} not present in running({worker_name})"
                )
            });
            ws.running.remove(pos);

            let has_room = match ws.pending.front().map(|w| w.job.worker.max_concurrent()) {
                None => false,
                Some(Concurrency::Unbounded) => true,
                Some(Concurrency::Limited(n)) => ws.running.len() < n,
            };

            if has_room {
                ws.pending.pop_front().map(|waiter| {
                    ws.running.push(waiter.job.clone());
                    let _ = waiter.reply.send(WaiterSignal::Admit(waiter.job.clone()));
                    waiter.job
                })
            } else {
                None
            }
        };

        if let Some(job) = admitted {
            Self::drop_redundant_delayed(state, &job);
        }
    }

    fn handle_timer_fire(state: &mut SchedulerState) {
        let now = time::now_ms();
        let mut due = Vec::new();
        let mut future = Vec::with_capacity(state.delayed.len());
        for entry in state.delayed.drain(..) {
            if entry.run_at <= now {
                due.push(entry);
            } else {
                future.push(entry);
            }
        }
        state.delayed = future;

        for entry in due {
            Self::admit_or_queue(state, entry.job, None, entry.reply);
        }
    }

    fn duplicate_running_or_pending(state: &SchedulerState, worker_name: &str, job: &Job) -> bool {
        state.workers.get(worker_name).is_some_and(|ws| {
            ws.running.iter().any(|r| r.equal_for_dedup(job)) || ws.pending.iter().any(|w| w.job.equal_for_dedup(job))
        })
    }

    /// Collapse bursts of equal-for-dedup delayed entries for `worker_name`
    /// down to the one with the smallest `run_at`, dropping the rest.
    fn collapse_delayed_duplicates(state: &mut SchedulerState, worker_name: &str) {
        let mut i = 0;
        while i < state.delayed.len() {
            if state.delayed[i].job.worker.name() != worker_name {
                i += 1;
                continue;
            }
            let mut group: Vec<usize> = (i..state.delayed.len())
                .filter(|&j| {
                    state.delayed[j].job.worker.name() == worker_name
                        && state.delayed[i].job.equal_for_dedup(&state.delayed[j].job)
                })
                .collect();
            if group.len() <= 1 {
                i += 1;
                continue;
            }
            group.sort_by_key(|&idx| (state.delayed[idx].run_at, idx));
            let mut to_drop: Vec<usize> = group.split_off(1);
            to_drop.sort_unstable_by(|a, b| b.cmp(a));
            for idx in to_drop {
                let entry = state.delayed.remove(idx);
                let _ = entry.reply.send(WaiterSignal::Drop);
            }
            i += 1;
        }
    }

    /// Scan `delayed` for entries redundant with a job that just transitioned
    /// to admitted (or to pending, per the literal admission steps), dropping
    /// their waiters.
    fn drop_redundant_delayed(state: &mut SchedulerState, job: &Job) {
        if job.worker.duplicate_policy() != DuplicatePolicy::Drop {
            return;
        }
        let mut i = 0;
        while i < state.delayed.len() {
            if state.delayed[i].job.equal_for_dedup(job) {
                let entry = state.delayed.remove(i);
                let _ = entry.reply.send(WaiterSignal::Drop);
            } else {
                i += 1;
            }
        }
    }
}
