//! End-to-end scenarios exercising the queue core through its public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use joq_core::jobs::{Concurrency, DuplicatePolicy, RetrySetting};
use joq_core::{EnqueueOptions, GlobalConfig, JobEventKind, JobQueueCore, Worker, WorkerError, WorkerResult};
use serde_json::Value;
use tokio::sync::{mpsc, Notify};

fn collect_events(core: &JobQueueCore) -> mpsc::UnboundedReceiver<JobEventKind> {
    let (tx, rx) = mpsc::unbounded_channel();
    core.subscribe(move |event| {
        let _ = tx.send(event.kind);
    });
    rx
}

async fn recv_n(rx: &mut mpsc::UnboundedReceiver<JobEventKind>, n: usize) -> Vec<JobEventKind> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let kind = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed early");
        out.push(kind);
    }
    out
}

struct Instant;

#[async_trait]
impl Worker for Instant {
    fn name(&self) -> &str {
        "instant"
    }
    async fn invoke(&self, _args: Value) -> WorkerResult {
        Ok(())
    }
}

#[tokio::test]
async fn sequential_unbounded_all_finish() {
    let core = JobQueueCore::new(GlobalConfig::default()).unwrap();
    let mut events = collect_events(&core);

    for _ in 0..3 {
        core.enqueue(Arc::new(Instant), Value::Null, EnqueueOptions::default()).unwrap();
    }

    let kinds = recv_n(&mut events, 3).await;
    assert!(kinds.iter().all(|k| *k == JobEventKind::Finished));
}

struct Gated {
    notify: Arc<Notify>,
}

#[async_trait]
impl Worker for Gated {
    fn name(&self) -> &str {
        "gated"
    }
    async fn invoke(&self, _args: Value) -> WorkerResult {
        self.notify.notified().await;
        Ok(())
    }
    fn max_concurrent(&self) -> Concurrency {
        Concurrency::Limited(2)
    }
}

#[tokio::test]
async fn concurrency_cap_admits_two_at_a_time() {
    let core = JobQueueCore::new(GlobalConfig::default()).unwrap();
    let mut events = collect_events(&core);
    let notify = Arc::new(Notify::new());
    let worker: Arc<dyn Worker> = Arc::new(Gated { notify: notify.clone() });

    for _ in 0..4 {
        core.enqueue(worker.clone(), Value::Null, EnqueueOptions::default()).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(30)).await;
    let stats = core.worker_stats("gated").await.unwrap();
    assert_eq!(stats.running, 2);
    assert_eq!(stats.pending, 2);

    notify.notify_one();
    notify.notify_one();
    notify.notify_one();
    notify.notify_one();

    let kinds = recv_n(&mut events, 4).await;
    assert!(kinds.iter().all(|k| *k == JobEventKind::Finished));
}

struct AlwaysFails {
    started_at: std::sync::Mutex<Vec<tokio::time::Instant>>,
}

#[async_trait]
impl Worker for AlwaysFails {
    fn name(&self) -> &str {
        "always-fails"
    }
    async fn invoke(&self, _args: Value) -> WorkerResult {
        self.started_at.lock().unwrap().push(tokio::time::Instant::now());
        Err(WorkerError::new("boom"))
    }
    fn retry_override(&self) -> Option<RetrySetting> {
        None
    }
}

// Each retry's delay is computed relative to the time of the attempt it
// follows (`Scheduler::run`'s `run_at = now() + delay_ms`), so consecutive
// gaps are `delay_for(1)`, `delay_for(2)`, `delay_for(3)` rather than all
// three measured from the original failure. With `exponent=2, delay=500`
// that is gaps of 500ms, 2000ms, 4500ms, i.e. executions at roughly
// t0, t0+500, t0+2500, t0+7000.
#[tokio::test(start_paused = true)]
async fn exponential_retry_timing_and_final_failure() {
    let mut config = GlobalConfig::default();
    config.retry = Some(RetrySetting::Partial(joq_core::jobs::retry::RetryOverrideFields {
        exponent: Some(2),
        delay_ms: Some(500),
        max_attempts: Some(joq_core::jobs::Bound::Finite(3)),
        ..Default::default()
    }));
    let core = JobQueueCore::new(config).unwrap();
    let mut events = collect_events(&core);

    let t0 = tokio::time::Instant::now();
    let worker = Arc::new(AlwaysFails {
        started_at: std::sync::Mutex::new(Vec::new()),
    });
    let worker_dyn: Arc<dyn Worker> = worker.clone();
    core.enqueue(worker_dyn, Value::Null, EnqueueOptions::default()).unwrap();

    tokio::time::advance(Duration::from_millis(50)).await;
    tokio::time::advance(Duration::from_millis(550)).await;
    tokio::time::advance(Duration::from_millis(2_050)).await;
    tokio::time::advance(Duration::from_millis(4_550)).await;

    let kinds = recv_n(&mut events, 1).await;
    assert_eq!(kinds, vec![JobEventKind::Failed]);

    let timestamps = worker.started_at.lock().unwrap().clone();
    assert_eq!(timestamps.len(), 4);
    let offsets: Vec<u128> = timestamps.iter().map(|t| t.duration_since(t0).as_millis()).collect();
    assert!(offsets[0] < 60);
    assert!((450..=650).contains(&offsets[1]));
    assert!((2_400..=2_700).contains(&offsets[2]));
    assert!((6_900..=7_200).contains(&offsets[3]));
}

struct FailOnceThenSucceed {
    calls: AtomicUsize,
}

#[async_trait]
impl Worker for FailOnceThenSucceed {
    fn name(&self) -> &str {
        "fail-once"
    }
    async fn invoke(&self, _args: Value) -> WorkerResult {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(WorkerError::new("transient"))
        } else {
            Ok(())
        }
    }
    fn retry_override(&self) -> Option<RetrySetting> {
        Some(RetrySetting::Immediately)
    }
}

#[tokio::test]
async fn fail_once_then_succeed_yields_single_finished() {
    let core = JobQueueCore::new(GlobalConfig::default()).unwrap();
    let mut events = collect_events(&core);
    let worker = Arc::new(FailOnceThenSucceed {
        calls: AtomicUsize::new(0),
    });
    let worker_dyn: Arc<dyn Worker> = worker.clone();

    core.enqueue(worker_dyn, Value::Null, EnqueueOptions::default()).unwrap();

    let kinds = recv_n(&mut events, 1).await;
    assert_eq!(kinds, vec![JobEventKind::Finished]);
    assert_eq!(worker.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn delayed_job_waits_for_deadline_then_for_a_slot() {
    let core = JobQueueCore::new(GlobalConfig::default()).unwrap();
    let mut events = collect_events(&core);
    let notify = Arc::new(Notify::new());
    let worker: Arc<dyn Worker> = Arc::new(Gated1 { notify: notify.clone() });

    // occupies the single slot immediately.
    core.enqueue(worker.clone(), Value::Null, EnqueueOptions::default()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    core.enqueue(worker.clone(), Value::Null, EnqueueOptions::default().with_delay_for(1_000))
        .unwrap();

    tokio::time::advance(Duration::from_millis(1_100)).await;
    // the delayed job is due, but the slot is still held by the first job.
    let stats = core.worker_stats("gated1").await.unwrap();
    assert_eq!(stats.running, 1);

    notify.notify_one();
    notify.notify_one();

    let kinds = recv_n(&mut events, 2).await;
    assert!(kinds.iter().all(|k| *k == JobEventKind::Finished));
}

struct Gated1 {
    notify: Arc<Notify>,
}

#[async_trait]
impl Worker for Gated1 {
    fn name(&self) -> &str {
        "gated1"
    }
    async fn invoke(&self, _args: Value) -> WorkerResult {
        self.notify.notified().await;
        Ok(())
    }
    fn max_concurrent(&self) -> Concurrency {
        Concurrency::Limited(1)
    }
}

struct DedupWorker {
    notify: Arc<Notify>,
}

#[async_trait]
impl Worker for DedupWorker {
    fn name(&self) -> &str {
        "dedup"
    }
    async fn invoke(&self, _args: Value) -> WorkerResult {
        self.notify.notified().await;
        Ok(())
    }
    fn max_concurrent(&self) -> Concurrency {
        Concurrency::Limited(1)
    }
    fn duplicate_policy(&self) -> DuplicatePolicy {
        DuplicatePolicy::Drop
    }
}

#[tokio::test]
async fn dedup_drop_keeps_one_copy_running() {
    let core = JobQueueCore::new(GlobalConfig::default()).unwrap();
    let mut events = collect_events(&core);
    let notify = Arc::new(Notify::new());
    let worker: Arc<dyn Worker> = Arc::new(DedupWorker { notify: notify.clone() });

    core.enqueue(worker.clone(), serde_json::json!("A"), EnqueueOptions::default()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    core.enqueue(worker.clone(), serde_json::json!("A"), EnqueueOptions::default()).unwrap();
    core.enqueue(worker.clone(), serde_json::json!("B"), EnqueueOptions::default()).unwrap();

    notify.notify_one();
    notify.notify_one();

    let kinds = recv_n(&mut events, 3).await;
    let finished = kinds.iter().filter(|k| **k == JobEventKind::Finished).count();
    let dropped = kinds.iter().filter(|k| **k == JobEventKind::Dropped).count();
    assert_eq!(finished, 2);
    assert_eq!(dropped, 1);
}
