//! Lifecycle event bus.
//!
//! Grounded on the `DagExecutor`'s `broadcast::channel<ExecutionEvent>` —
//! the same mechanism, giving each subscriber its own lagging-tolerant
//! receiver rather than a shared callback list — plus a thin
//! listener-handle layer on top so callers can `subscribe`/`unsubscribe`
//! with a plain closure instead of holding onto a raw receiver.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::job::Job;

/// Which terminal (or non-terminal, there are none here) state a job
/// transitioned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEventKind {
    Finished,
    Failed,
    Dropped,
}

#[derive(Debug, Clone)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub job: Job,
}

/// Handle returned by [`EventBus::subscribe`]; pass back to
/// [`EventBus::unsubscribe`] to stop receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(Uuid);

const EVENT_BUFFER_SIZE: usize = 1024;

/// Multi-subscriber publish/subscribe of job lifecycle events.
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
    listeners: Mutex<HashMap<ListenerHandle, JoinHandle<()>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            sender,
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Publish an event to all current subscribers. Best-effort,
    /// fire-and-forget: if nobody is listening the event is simply dropped.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.sender.send(event);
    }

    /// Low-level subscription: get a raw broadcast receiver. Useful for
    /// callers that want `async`/`await` pull semantics instead of a
    /// callback.
    pub fn subscribe_receiver(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    /// Register a listener closure. Returns a handle; pass it to
    /// [`EventBus::unsubscribe`] to stop delivery. Idempotent: subscribing
    /// twice yields two independent handles, and unsubscribing an unknown
    /// (or already-removed) handle is a no-op.
    pub fn subscribe<F>(&self, mut listener: F) -> ListenerHandle
    where
        F: FnMut(JobEvent) + Send + 'static,
    {
        let mut rx = self.sender.subscribe();
        let handle = ListenerHandle(Uuid::new_v4());
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => listener(event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.listeners.lock().insert(handle, task);
        handle
    }

    /// Stop delivering events to a previously-subscribed listener.
    pub fn unsubscribe(&self, handle: ListenerHandle) {
        if let Some(task) = self.listeners.lock().remove(&handle) {
            task.abort();
        }
    }
}
