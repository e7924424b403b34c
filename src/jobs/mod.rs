//! Non-persistent, in-process background job queue core.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          JobQueueCore                                 │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │   enqueue(worker, args, options)        subscribe(listener)          │
//! │        │                                      │                      │
//! │        ▼                                      ▼                      │
//! │  ┌───────────────────┐                 ┌─────────────┐              │
//! │  │ RunnerCoordinator │ ───publish────▶ │  EventBus   │              │
//! │  │  (one task/job)   │                 └─────────────┘              │
//! │  └─────────┬─────────┘                                              │
//! │            │ Scheduler.run(job, delay?)                             │
//! │            ▼                                                        │
//! │  ┌───────────────────┐       admit/drop via oneshot mailbox         │
//! │  │     Scheduler      │◀──────────────────────────────────────────┐ │
//! │  │ (single actor task) │                                           │ │
//! │  │  pending FIFO       │                                           │ │
//! │  │  running set        │──── admit ───▶ ┌───────────────┐          │ │
//! │  │  delayed (timer)     │                │  JobExecutor  │          │ │
//! │  └────────────────────┘                 └───────────────┘──────────┘ │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`job`]: [`Job`], [`Worker`], [`Concurrency`], [`DuplicatePolicy`]
//! - [`retry`]: the three-layer retry merge and backoff math
//! - [`executor`]: isolated single-invocation runner
//! - [`events`]: the lifecycle pub/sub bus
//! - [`scheduler`]: admission, delay, and dedup control point
//! - [`coordinator`]: per-submission retry-driving loop
//! - [`config`]: process-wide settings
//! - [`queue`]: the facade applications actually hold

pub mod config;
pub mod coordinator;
pub mod events;
pub mod executor;
pub mod job;
pub mod queue;
pub mod retry;
pub mod scheduler;
mod time;

pub use config::GlobalConfig;
pub use coordinator::RunnerCoordinator;
pub use events::{EventBus, JobEvent, JobEventKind, ListenerHandle};
pub use executor::{ExecutionOutcome, JobExecutor};
pub use job::{Concurrency, DuplicatePolicy, Job, JobId, Worker, WorkerError, WorkerResult};
pub use queue::{EnqueueOptions, JobQueueCore};
pub use retry::{Bound, MaxAttempts, MaxDelay, RetryConfig, RetryPolicy, RetrySetting};
pub use scheduler::{RunOutcome, Scheduler, WorkerStats};
