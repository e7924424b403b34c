//! Job and worker-type definitions.
//!
//! - [`JobId`]: opaque unique identifier for a single submission
//! - [`Worker`]: trait all worker types implement
//! - [`Job`]: immutable record handed to the scheduler
//! - [`Concurrency`] / [`DuplicatePolicy`]: worker declaration knobs

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::retry::RetrySetting;

// ═══════════════════════════════════════════════════════════════════════
// Job Identification
// ═══════════════════════════════════════════════════════════════════════

/// Opaque, unique identifier for a job submission.
///
/// `id` and timing are ignored by [`equal_for_dedup`](Job::equal_for_dedup);
/// only `worker` and `args` participate in duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Generate a new random job id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Worker declaration
// ═══════════════════════════════════════════════════════════════════════

/// Per-worker concurrency cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// No cap; every admitted job runs immediately.
    Unbounded,
    /// At most this many copies of the worker run at once.
    Limited(usize),
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::Unbounded
    }
}

/// Whether a worker collapses duplicate (worker, args) submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Every submission is admitted independently (default).
    Accept,
    /// A submission equal-for-dedup to one already
    /// running/pending/delayed is dropped.
    Drop,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self::Accept
    }
}

/// Error returned by a worker's [`Worker::invoke`].
///
/// Carries an optional captured stack/backtrace string in addition to the
/// message, since the retry-exhausted log line (see the crate's error
/// handling design) includes the stack alongside the error value.
#[derive(Debug, Clone)]
pub struct WorkerError {
    pub message: String,
    pub stack: Option<String>,
}

impl WorkerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for WorkerError {}

/// Outcome of a single `invoke` call.
pub type WorkerResult = std::result::Result<(), WorkerError>;

/// The trait a worker type implements.
///
/// Analogous to the `Job` trait of the orchestration engine this core was
/// extracted from, but named for the role it plays here: a *worker type*
/// describing how to run a payload, not a single unit of work (that's
/// [`Job`]).
#[async_trait]
pub trait Worker: Send + Sync {
    /// Stable name identifying this worker type. Used as the key for
    /// concurrency admission and as half of the equal-for-dedup pair.
    fn name(&self) -> &str;

    /// Execute the worker body against `args`.
    async fn invoke(&self, args: Value) -> WorkerResult;

    /// Concurrency cap for this worker type. Default: unbounded.
    fn max_concurrent(&self) -> Concurrency {
        Concurrency::Unbounded
    }

    /// Per-worker retry override, merged under the global setting and
    /// above by any per-job override. Default: no override (inherit).
    fn retry_override(&self) -> Option<RetrySetting> {
        None
    }

    /// Duplicate suppression policy. Default: accept all.
    fn duplicate_policy(&self) -> DuplicatePolicy {
        DuplicatePolicy::Accept
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Job
// ═══════════════════════════════════════════════════════════════════════

/// A single submission of work, bound to a worker type.
#[derive(Clone)]
pub struct Job {
    pub id: JobId,
    pub worker: Arc<dyn Worker>,
    pub args: Value,
    pub retry: Option<RetrySetting>,
    pub delay_until: Option<u64>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("worker", &self.worker.name())
            .field("args", &self.args)
            .field("delay_until", &self.delay_until)
            .finish()
    }
}

impl Job {
    pub fn new(worker: Arc<dyn Worker>, args: Value) -> Self {
        Self {
            id: JobId::new(),
            worker,
            args,
            retry: None,
            delay_until: None,
        }
    }

    pub fn with_retry(mut self, retry: Option<RetrySetting>) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_delay_until(mut self, delay_until: Option<u64>) -> Self {
        self.delay_until = delay_until;
        self
    }

    /// Two jobs are equal-for-dedup iff their worker and args are
    /// structurally equal. `id` and timing are ignored.
    pub fn equal_for_dedup(&self, other: &Job) -> bool {
        self.worker.name() == other.worker.name() && self.args == other.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Worker for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        async fn invoke(&self, _args: Value) -> WorkerResult {
            Ok(())
        }
    }

    #[test]
    fn job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn equal_for_dedup_ignores_id_and_timing() {
        let w: Arc<dyn Worker> = Arc::new(Noop);
        let a = Job::new(w.clone(), serde_json::json!({"x": 1})).with_delay_until(Some(10));
        let b = Job::new(w, serde_json::json!({"x": 1})).with_delay_until(Some(20));
        assert_ne!(a.id, b.id);
        assert!(a.equal_for_dedup(&b));
    }

    #[test]
    fn equal_for_dedup_requires_same_args() {
        let w: Arc<dyn Worker> = Arc::new(Noop);
        let a = Job::new(w.clone(), serde_json::json!({"x": 1}));
        let b = Job::new(w, serde_json::json!({"x": 2}));
        assert!(!a.equal_for_dedup(&b));
    }
}
