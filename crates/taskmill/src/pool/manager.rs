//! The pool handle: construction, submission, per-worker stop, and graceful
//! shutdown.
//!
//! A [`WorkerPool`] owns its work queue and idle-worker registry as instance
//! state, so multiple independent pools can coexist in one process. Producers
//! share the pool by reference (or `Arc`) and interact with it only through
//! [`submit`](WorkerPool::submit) and friends.

use super::dispatch::{Registry, dispatch_loop};
use super::worker::worker_loop;
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::handler::WorkHandler;
use crate::types::{WorkItem, WorkerId};
use core::time::Duration;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Handle to one long-lived worker task.
struct WorkerHandle {
    stop: CancellationToken,
    join: Mutex<Option<JoinHandle<()>>>,
}

/// A bounded pool of long-lived workers fed by a shared FIFO queue.
///
/// Constructed once with a fixed worker count and queue capacity; workers
/// live until individually stopped or the pool is shut down. The queue and
/// registry are the only shared resources and are accessed exclusively
/// through channel sends and receives.
///
/// There is no persisted state: dropping the pool (or shutting it down with
/// an expired timeout) loses any undelivered in-flight item.
pub struct WorkerPool<T> {
    config: PoolConfig,
    queue_tx: Mutex<Option<mpsc::Sender<T>>>,
    /// Keeps the queue alive when no dispatch loop consumes it
    /// (`num_workers == 0`), so submissions still exert backpressure instead
    /// of failing.
    queue_rx_parked: Mutex<Option<mpsc::Receiver<T>>>,
    workers: Vec<WorkerHandle>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    shutdown_token: CancellationToken,
}

impl<T: WorkItem> WorkerPool<T> {
    /// Creates a pool and spawns its background tasks.
    ///
    /// Constructs the shared work queue (capacity per
    /// [`PoolConfig::queue_capacity`] and its zero-fallback policy) and the
    /// idle-worker registry (capacity equal to the worker count, which holds
    /// by construction since each worker keeps at most one live
    /// registration). Spawns `num_workers` worker tasks, then the dispatch
    /// loop - unless `num_workers` is zero, in which case no dispatch loop
    /// runs and submitted items simply accumulate in the queue.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<H>(config: PoolConfig, handler: H) -> Self
    where
        H: WorkHandler<T>,
    {
        let (queue_tx, queue_rx) = mpsc::channel(config.effective_queue_capacity());
        // `mpsc::channel` panics on zero capacity; a zero-worker pool still
        // needs a (never used) registry channel.
        let (registry_tx, registry_rx) = mpsc::channel(config.num_workers.max(1));

        let handler = Arc::new(handler);
        let mut workers = Vec::with_capacity(config.num_workers);
        for worker_id in 0..config.num_workers {
            let stop = CancellationToken::new();
            let join = tokio::spawn(worker_loop(
                worker_id,
                registry_tx.clone(),
                stop.clone(),
                Arc::clone(&handler),
            ));
            workers.push(WorkerHandle {
                stop,
                join: Mutex::new(Some(join)),
            });
        }
        // Workers hold the only registry senders: once the last worker
        // exits, the registry closes and pending hand-offs observe it.
        drop(registry_tx);

        let mut queue_rx_parked = None;
        let dispatcher = if config.num_workers > 0 {
            let registry: Registry<T> = Arc::new(tokio::sync::Mutex::new(registry_rx));
            Some(tokio::spawn(dispatch_loop(
                queue_rx,
                registry,
                config.num_workers,
            )))
        } else {
            queue_rx_parked = Some(queue_rx);
            None
        };

        Self {
            config,
            queue_tx: Mutex::new(Some(queue_tx)),
            queue_rx_parked: Mutex::new(queue_rx_parked),
            workers,
            dispatcher: Mutex::new(dispatcher),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Number of workers the pool was constructed with.
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    /// Enqueues an item, waiting for queue space if the queue is full.
    ///
    /// This is the backpressure point for producers: the future stays
    /// pending until capacity frees. Callers needing bounded latency should
    /// use [`submit_timeout`](Self::submit_timeout) or wrap this in their
    /// own deadline.
    ///
    /// # Errors
    ///
    /// - [`Error::Shutdown`] once graceful shutdown has begun.
    /// - [`Error::QueueClosed`] if the queue receiver is gone.
    pub async fn submit(&self, item: T) -> Result<()> {
        let tx = self.queue_sender()?;
        tx.send(item).await.map_err(|_| Error::QueueClosed {
            context: "work queue receiver dropped".to_string(),
        })
    }

    /// Enqueues an item from a detached task, returning a handle to observe
    /// the outcome.
    ///
    /// This mirrors fire-and-forget submission without the "forget": the
    /// caller's thread of control never blocks, and the eventual send result
    /// is available through the returned [`JoinHandle`] instead of being
    /// silently discarded.
    ///
    /// If the queue is full, the detached task waits for space. Producers
    /// that keep calling this faster than workers drain can accumulate an
    /// unbounded number of pending detached sends; prefer
    /// [`submit`](Self::submit) or [`submit_timeout`](Self::submit_timeout)
    /// where that amplification matters.
    pub fn submit_detached(&self, item: T) -> JoinHandle<Result<()>> {
        let sender = self.queue_sender();
        tokio::spawn(async move {
            let tx = sender?;
            tx.send(item).await.map_err(|_| Error::QueueClosed {
                context: "work queue receiver dropped".to_string(),
            })
        })
    }

    /// Enqueues an item, giving up after `wait` if no queue space frees.
    ///
    /// # Errors
    ///
    /// - [`Error::EnqueueTimeout`] if the deadline expires; the item was
    ///   never enqueued and is dropped with the error.
    /// - [`Error::Shutdown`] / [`Error::QueueClosed`] as for
    ///   [`submit`](Self::submit).
    pub async fn submit_timeout(&self, item: T, wait: Duration) -> Result<()> {
        let tx = self.queue_sender()?;
        match tx.send_timeout(item, wait).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => Err(Error::EnqueueTimeout),
            Err(mpsc::error::SendTimeoutError::Closed(_)) => Err(Error::QueueClosed {
                context: "work queue receiver dropped".to_string(),
            }),
        }
    }

    /// Signals one worker to stop.
    ///
    /// Delivery is asynchronous: the call never blocks and does not wait for
    /// the worker to acknowledge. The stop takes effect at the worker's next
    /// select point; an item already handed to the worker is still
    /// processed. Cancellation tokens are idempotent, so stopping an
    /// already-stopped (or already-exited) worker is a no-op rather than a
    /// deadlock.
    ///
    /// Stopped workers are never restarted. Stopping workers shrinks
    /// delivery capacity; once every worker has stopped, dequeued items
    /// become undeliverable and are dropped with an error log.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownWorker`] if `worker_id` is out of range.
    pub fn stop_worker(&self, worker_id: WorkerId) -> Result<()> {
        let worker = self
            .workers
            .get(worker_id)
            .ok_or(Error::UnknownWorker { worker_id })?;
        worker.stop.cancel();
        Ok(())
    }

    /// Gracefully shuts down the pool.
    ///
    /// Phases, each bounded by `wait` where it can block:
    ///
    /// 1. Refuse new submissions (`submit*` starts returning
    ///    [`Error::Shutdown`]).
    /// 2. Close the queue. The dispatch loop drains everything already
    ///    enqueued, finishes outstanding hand-offs, and exits. In-flight
    ///    detached submissions complete first; the queue closes when the
    ///    last sender clone drops.
    /// 3. Wait for the dispatch task, up to `wait`.
    /// 4. Stop every worker. All queued items have been delivered by now
    ///    (unless phase 3 timed out, in which case this is the escape
    ///    hatch and undelivered items are lost).
    /// 5. Wait up to `wait` per worker for its task to finish, logging
    ///    stragglers.
    ///
    /// Timeouts are logged as warnings rather than surfaced as errors, and
    /// the method is idempotent: a second call finds the queue already
    /// closed and the tokens already cancelled.
    pub async fn shutdown(&self, wait: Duration) -> Result<()> {
        // === Phase 1: Stop accepting new submissions ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new submissions");
        self.shutdown_token.cancel();

        // === Phase 2: Close the queue so the dispatch loop drains ===
        drop(self.queue_tx.lock().take());
        drop(self.queue_rx_parked.lock().take());

        // === Phase 3: Wait for the dispatch loop to finish draining ===
        let dispatcher = self.dispatcher.lock().take();
        if let Some(handle) = dispatcher {
            #[cfg(feature = "tracing")]
            tracing::debug!("Draining the work queue");
            match timeout(wait, handle).await {
                Ok(Ok(())) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Work queue drained");
                }
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Dispatch task failed: {_e}");
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Queue drain timed out; undelivered items will be lost");
                }
            }
        }

        // === Phase 4: Notify all workers to stop ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Notifying all workers to stop");
        for worker in &self.workers {
            worker.stop.cancel();
        }

        // === Phase 5: Wait for worker tasks to finish ===
        let waits = self
            .workers
            .iter()
            .enumerate()
            .filter_map(|(worker_id, worker)| {
                worker.join.lock().take().map(|join| (worker_id, join))
            })
            .map(|(_worker_id, join)| async move {
                match timeout(wait, join).await {
                    Ok(Ok(())) => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!("Worker {_worker_id} stop acknowledged");
                    }
                    Ok(Err(_e)) => {
                        #[cfg(feature = "tracing")]
                        tracing::error!("Worker {_worker_id} task failed: {_e}");
                    }
                    Err(_) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Worker {_worker_id} stop timed out");
                    }
                }
            });

        futures::future::join_all(waits).await;

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");

        Ok(())
    }

    /// Snapshot of the queue sender, refusing once shutdown has begun.
    fn queue_sender(&self) -> Result<mpsc::Sender<T>> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::Shutdown);
        }
        self.queue_tx
            .lock()
            .as_ref()
            .cloned()
            .ok_or(Error::Shutdown)
    }
}

impl<T> Drop for WorkerPool<T> {
    /// Dropping without [`shutdown`](WorkerPool::shutdown) must not leave
    /// tasks parked forever. Tokens are cancelled so workers and the
    /// dispatch loop wind down on their own; undelivered items are lost,
    /// matching the no-persistence contract.
    fn drop(&mut self) {
        self.shutdown_token.cancel();
        for worker in &self.workers {
            worker.stop.cancel();
        }
    }
}
