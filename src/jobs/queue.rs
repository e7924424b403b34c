//! Top-level facade: worker registration, `enqueue`, and event subscription.
//!
//! Grounded on the orchestration engine's `JobQueue` (the thing application
//! code actually holds a handle to) and its worker-signature bookkeeping
//! style, reshaped around this core's `Scheduler` + `RunnerCoordinator`
//! pair instead of a backend trait object.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use super::config::GlobalConfig;
use super::coordinator::RunnerCoordinator;
use super::events::{EventBus, JobEvent, ListenerHandle};
use super::job::{Concurrency, DuplicatePolicy, Job, JobId, Worker};
use super::retry::RetrySetting;
use super::scheduler::{Scheduler, WorkerStats};
use crate::error::{CoreError, Result};

/// Per-call overrides accepted by [`JobQueueCore::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub retry: Option<RetrySetting>,
    pub delay_for_ms: Option<u64>,
}

impl EnqueueOptions {
    pub fn with_retry(mut self, retry: RetrySetting) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_delay_for(mut self, delay_for_ms: u64) -> Self {
        self.delay_for_ms = Some(delay_for_ms);
        self
    }
}

/// The `{max_concurrent, duplicate_policy}` pair a worker name was first
/// registered under. A worker type is "effectively immutable for the
/// process lifetime"; registering the same name again with a different
/// signature is a configuration error rather than a silent override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WorkerSignature {
    max_concurrent: Concurrency,
    duplicate_policy: DuplicatePolicy,
}

impl WorkerSignature {
    fn of(worker: &dyn Worker) -> Self {
        Self {
            max_concurrent: worker.max_concurrent(),
            duplicate_policy: worker.duplicate_policy(),
        }
    }
}

/// The non-persistent, in-process job queue core.
///
/// Cheap to clone: internally `Arc`-backed, so handing out copies to
/// multiple callers shares the same scheduler, event bus, and worker
/// registry.
#[derive(Clone)]
pub struct JobQueueCore {
    scheduler: Arc<Scheduler>,
    events: Arc<EventBus>,
    coordinator: Arc<RunnerCoordinator>,
    signatures: Arc<DashMap<String, WorkerSignature>>,
}

impl JobQueueCore {
    /// Build a new core from a validated [`GlobalConfig`].
    pub fn new(config: GlobalConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = Arc::new(Scheduler::new());
        let events = Arc::new(EventBus::new());
        let coordinator = Arc::new(RunnerCoordinator::new(scheduler.clone(), events.clone(), config.retry));
        Ok(Self {
            scheduler,
            events,
            coordinator,
            signatures: Arc::new(DashMap::new()),
        })
    }

    /// Submit a unit of work. Returns the generated [`JobId`] immediately;
    /// execution happens on an independently driven task and is observed
    /// only through the event bus.
    pub fn enqueue(&self, worker: Arc<dyn Worker>, args: Value, options: EnqueueOptions) -> Result<JobId> {
        self.register_or_check_signature(worker.as_ref())?;

        let delay_until = options.delay_for_ms.map(|d| super::time::now_ms() + d);
        let job = Job::new(worker, args).with_retry(options.retry).with_delay_until(delay_until);
        let id = job.id.clone();
        self.coordinator.submit(job);
        Ok(id)
    }

    /// Subscribe a listener to lifecycle events. See [`EventBus::subscribe`].
    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: FnMut(JobEvent) + Send + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Stop delivering events to a previously-subscribed listener.
    pub fn unsubscribe(&self, handle: ListenerHandle) {
        self.events.unsubscribe(handle);
    }

    /// Running/pending/delayed counts for one worker type, keyed by name.
    pub async fn worker_stats(&self, worker_name: &str) -> Result<WorkerStats> {
        self.scheduler.stats(worker_name).await
    }

    fn register_or_check_signature(&self, worker: &dyn Worker) -> Result<()> {
        let incoming = WorkerSignature::of(worker);
        match self.signatures.entry(worker.name().to_string()) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(incoming);
                Ok(())
            }
            dashmap::mapref::entry::Entry::Occupied(slot) => {
                if *slot.get() == incoming {
                    Ok(())
                } else {
                    Err(CoreError::configuration(
                        "worker type re-registered with a different signature",
                    )
                    .with_detail(format!(
                        "worker '{}' was first declared with {:?}, now declared with {:?}",
                        worker.name(),
                        slot.get(),
                        incoming
                    )))
                }
            }
        }
    }
}
