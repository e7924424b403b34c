//! # joq-core
//!
//! The scheduling core of a non-persistent, in-process background job
//! queue: per-worker concurrency admission, delayed execution, duplicate
//! suppression, and retry control with exponential backoff, plus a
//! lifecycle event bus.
//!
//! Persistence, a wire protocol, and a CLI are explicitly out of scope —
//! this crate is a library collaborators embed directly into their own
//! process and supervision tree.

pub mod error;
pub mod jobs;

pub use error::{CoreError, ErrorCode, Result};
pub use jobs::{
    EnqueueOptions, EventBus, GlobalConfig, Job, JobEvent, JobEventKind, JobId, JobQueueCore, Worker, WorkerError,
    WorkerResult,
};
