//! Bounded worker pool between the update source and the event handlers.
//!
//! - A fixed-capacity FIFO queue feeds a fixed number of workers.
//! - Submission never blocks: when the queue is full the event is dropped
//!   and counted.
//! - Every event runs on its own task under a time budget, so a panic or a
//!   stuck handler costs that one event and never the worker.
//! - Shutdown closes the queue; workers drain what is left and exit.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        Mutex,
    },
    task::JoinHandle,
    time::timeout_at,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{deadline::Deadline, messaging::types::InboundEvent};

/// Per-event processing entry point.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event. `deadline` is the event's whole budget; the worker
    /// cancels the returned future once it passes.
    async fn handle(&self, event: InboundEvent, deadline: Deadline);
}

#[derive(Clone, Copy, Debug)]
pub struct DispatchConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub event_budget: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 64,
            queue_capacity: 4096,
            event_budget: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    timed_out: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub accepted: u64,
    pub dropped: u64,
    pub completed: u64,
    pub panicked: u64,
    pub timed_out: u64,
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submit {
    Accepted,
    /// Queue full; the event was discarded.
    Dropped,
    /// The pool is shutting down.
    Closed,
}

pub struct WorkerPool {
    tx: mpsc::Sender<InboundEvent>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
    cfg: DispatchConfig,
}

impl WorkerPool {
    /// Start `cfg.workers` workers sharing one queue of `cfg.queue_capacity`.
    pub fn spawn(cfg: DispatchConfig, handler: Arc<dyn EventHandler>) -> Self {
        let cfg = DispatchConfig {
            workers: cfg.workers.max(1),
            queue_capacity: cfg.queue_capacity.max(1),
            event_budget: cfg.event_budget,
        };

        let (tx, rx) = mpsc::channel(cfg.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let counters = Arc::new(Counters::default());

        let workers = (0..cfg.workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    rx.clone(),
                    handler.clone(),
                    counters.clone(),
                    cfg.event_budget,
                ))
            })
            .collect();

        Self {
            tx,
            workers,
            counters,
            cfg,
        }
    }

    /// Non-blocking enqueue. Never waits for queue space.
    pub fn try_submit(&self, event: InboundEvent) -> Submit {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                Submit::Accepted
            }
            Err(TrySendError::Full(event)) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    kind = event.kind(),
                    user_id = event.sender().0,
                    queue_capacity = self.cfg.queue_capacity,
                    dropped,
                    "dispatch queue full, dropping event"
                );
                Submit::Dropped
            }
            Err(TrySendError::Closed(_)) => Submit::Closed,
        }
    }

    /// Events waiting in the queue (not counting ones being handled).
    pub fn queue_len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn config(&self) -> DispatchConfig {
        self.cfg
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Close the queue and wait for workers to drain it.
    pub async fn shutdown(self) -> DispatchStats {
        let Self {
            tx,
            workers,
            counters,
            ..
        } = self;
        drop(tx);

        for (worker_id, handle) in workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(worker_id, error = %e, "worker task ended abnormally");
            }
        }

        counters.snapshot()
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<InboundEvent>>>,
    handler: Arc<dyn EventHandler>,
    counters: Arc<Counters>,
    budget: Duration,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(event) = next else {
            break;
        };

        let kind = event.kind();
        let user_id = event.sender().0;
        let deadline = Deadline::after(budget);
        let handler = handler.clone();

        // The event gets its own task so a panic unwinds that task only.
        let task = tokio::spawn(async move {
            timeout_at(deadline.instant(), handler.handle(event, deadline)).await
        });

        match task.await {
            Ok(Ok(())) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(_elapsed)) => {
                counters.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(worker_id, kind, user_id, ?budget, "event handler exceeded its budget");
            }
            Err(e) if e.is_panic() => {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                error!(worker_id, kind, user_id, "event handler panicked, event dropped");
            }
            Err(e) => {
                warn!(worker_id, kind, user_id, error = %e, "event handler task cancelled");
            }
        }
    }

    debug!(worker_id, "worker drained, exiting");
}

/// Intake loop: move events from `source` into the pool until `shutdown`
/// fires or the source closes, then drain the pool.
///
/// This loop never handles events itself and never waits for queue space.
pub async fn run(
    mut source: mpsc::Receiver<InboundEvent>,
    pool: WorkerPool,
    shutdown: CancellationToken,
) -> DispatchStats {
    let cfg = pool.config();
    info!(
        workers = cfg.workers,
        queue_capacity = cfg.queue_capacity,
        event_budget = ?cfg.event_budget,
        "dispatcher started"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("shutdown requested, closing dispatch queue");
                break;
            }
            next = source.recv() => match next {
                Some(event) => {
                    pool.try_submit(event);
                }
                None => {
                    warn!("inbound event source closed");
                    break;
                }
            }
        }
    }

    let pending = pool.queue_len();
    if pending > 0 {
        info!(pending, "draining queued events");
    }

    let stats = pool.shutdown().await;
    info!(
        accepted = stats.accepted,
        dropped = stats.dropped,
        completed = stats.completed,
        panicked = stats.panicked,
        timed_out = stats.timed_out,
        "dispatcher stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use tokio::sync::{mpsc::UnboundedSender, Semaphore};

    use super::*;
    use crate::{
        domain::{ChatId, UserId},
        messaging::types::IncomingMessage,
    };

    fn event(text: &str) -> InboundEvent {
        InboundEvent::Message(IncomingMessage::from_text(ChatId(1), UserId(2), text))
    }

    fn text_of(event: &InboundEvent) -> String {
        match event {
            InboundEvent::Message(m) => m.text.clone(),
            InboundEvent::Callback(q) => q.data.clone(),
        }
    }

    /// Reports each event as it starts, then behaves according to its text:
    /// `boom` panics, `slow` sleeps past any budget, `block` waits on the
    /// gate, anything else completes at once.
    struct ScriptedHandler {
        started: UnboundedSender<String>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl EventHandler for ScriptedHandler {
        async fn handle(&self, event: InboundEvent, _deadline: Deadline) {
            let text = text_of(&event);
            let _ = self.started.send(text.clone());
            match text.as_str() {
                "boom" => panic!("scripted panic"),
                "slow" => tokio::time::sleep(Duration::from_secs(3600)).await,
                "block" => {
                    let _permit = self.gate.acquire().await;
                }
                _ => {}
            }
        }
    }

    fn pool(
        workers: usize,
        queue_capacity: usize,
        budget: Duration,
    ) -> (WorkerPool, mpsc::UnboundedReceiver<String>, Arc<Semaphore>) {
        let (started, started_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));
        let handler = Arc::new(ScriptedHandler {
            started,
            gate: gate.clone(),
        });
        let pool = WorkerPool::spawn(
            DispatchConfig {
                workers,
                queue_capacity,
                event_budget: budget,
            },
            handler,
        );
        (pool, started_rx, gate)
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_growing() {
        let (pool, mut started, gate) = pool(1, 4, Duration::from_secs(30));

        assert_eq!(pool.try_submit(event("block")), Submit::Accepted);
        assert_eq!(started.recv().await.as_deref(), Some("block"));

        let mut outcomes = Vec::new();
        for i in 0..10 {
            outcomes.push(pool.try_submit(event(&format!("e{i}"))));
            assert!(pool.queue_len() <= 4);
        }

        assert_eq!(outcomes.iter().filter(|o| **o == Submit::Accepted).count(), 4);
        assert_eq!(outcomes.iter().filter(|o| **o == Submit::Dropped).count(), 6);
        assert_eq!(pool.queue_len(), 4);

        gate.add_permits(1);
        let stats = pool.shutdown().await;

        assert_eq!(stats.accepted, 5);
        assert_eq!(stats.dropped, 6);
        assert_eq!(stats.completed, 5);

        let mut handled = Vec::new();
        while let Ok(t) = started.try_recv() {
            handled.push(t);
        }
        assert_eq!(handled, vec!["e0", "e1", "e2", "e3"]);
    }

    #[tokio::test]
    async fn panicking_event_does_not_stop_the_worker() {
        let (pool, mut started, _gate) = pool(1, 8, Duration::from_secs(30));

        pool.try_submit(event("boom"));
        assert_eq!(started.recv().await.as_deref(), Some("boom"));

        pool.try_submit(event("after"));
        assert_eq!(started.recv().await.as_deref(), Some("after"));
        assert_eq!(pool.worker_count(), 1);

        let stats = pool.shutdown().await;
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn handler_over_budget_is_cancelled() {
        let (pool, mut started, _gate) = pool(1, 8, Duration::from_millis(50));

        pool.try_submit(event("slow"));
        pool.try_submit(event("quick"));

        assert_eq!(started.recv().await.as_deref(), Some("slow"));
        assert_eq!(started.recv().await.as_deref(), Some("quick"));

        let stats = pool.shutdown().await;
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.completed, 1);
    }

    #[tokio::test]
    async fn closed_source_drains_queue_and_stops() {
        let (pool, _started, _gate) = pool(4, 16, Duration::from_secs(30));
        let (tx, rx) = mpsc::channel(16);

        for i in 0..10 {
            tx.send(event(&format!("e{i}"))).await.unwrap();
        }
        drop(tx);

        let stats = run(rx, pool, CancellationToken::new()).await;
        assert_eq!(stats.accepted, 10);
        assert_eq!(stats.completed, 10);
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_handlers() {
        let (pool, mut started, gate) = pool(2, 16, Duration::from_secs(30));
        let (tx, rx) = mpsc::channel(16);
        let token = CancellationToken::new();

        tx.send(event("block")).await.unwrap();
        let runner = tokio::spawn(run(rx, pool, token.clone()));
        assert_eq!(started.recv().await.as_deref(), Some("block"));

        token.cancel();
        tokio::task::yield_now().await;
        assert!(!runner.is_finished());

        gate.add_permits(1);
        let stats = runner.await.unwrap();
        assert_eq!(stats.completed, 1);
        drop(tx);
    }
}
