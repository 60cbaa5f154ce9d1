use crate::handler::WorkHandler;
use crate::types::{WorkItem, WorkerId};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// A single-use rendezvous slot registered by an idle worker.
///
/// Each registration is a fresh oneshot sender: placing one in the registry
/// means "this worker is idle and will accept exactly one item". The slot is
/// consumed the instant dispatch selects it, and the worker does not
/// re-register until the current item has been fully processed.
pub(crate) type Slot<T> = oneshot::Sender<T>;

/// Worker task body: the register/wait loop.
///
/// Each iteration has two phases:
///
/// 1. **register** - send a fresh [`Slot`] into the registry. The registry is
///    sized to the worker count and every worker holds at most one live
///    registration, so this send never blocks indefinitely; it fails only
///    once the registry receiver is gone.
/// 2. **wait** - block until either the slot resolves with an item (process
///    it through the handler, then loop back to registration) or the stop
///    token fires (exit).
///
/// Stopping is cooperative and takes effect at the next select point. A stop
/// can race a hand-off that already completed the rendezvous; in that case
/// the worker drains the slot and processes that final item before exiting,
/// because a registered slot is a promise of readiness. A slot left behind in
/// the registry after exit is dead (its receiver is dropped) and is skipped
/// by dispatch.
///
/// Designed to be spawned as a Tokio task; runs until explicitly stopped.
pub(crate) async fn worker_loop<T, H>(
    worker_id: WorkerId,
    registry_tx: mpsc::Sender<Slot<T>>,
    stop: CancellationToken,
    handler: Arc<H>,
) where
    T: WorkItem,
    H: WorkHandler<T>,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    loop {
        let (slot_tx, mut slot_rx) = oneshot::channel();

        // Register the current worker into the registry. Biased so that a
        // stop observed after finishing an item wins over re-registering.
        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            res = registry_tx.send(slot_tx) => {
                if res.is_err() {
                    break;
                }
            }
        }

        tokio::select! {
            item = &mut slot_rx => match item {
                Ok(item) => run_handler(worker_id, handler.as_ref(), item).await,
                // Slot dropped without a send: the dispatch side is gone.
                Err(_) => break,
            },
            () = stop.cancelled() => {
                // The rendezvous may have completed just before the stop was
                // observed. Honor the registration and finish that item.
                if let Ok(item) = slot_rx.try_recv() {
                    run_handler(worker_id, handler.as_ref(), item).await;
                }
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}

/// Runs the handler for one item, isolating panics at the worker boundary.
///
/// An unrecovered panic here would silently shrink pool capacity, so the
/// handler future is wrapped in `catch_unwind`: the failure is logged and
/// the worker's loop continues.
async fn run_handler<T, H>(worker_id: WorkerId, handler: &H, item: T)
where
    T: WorkItem,
    H: WorkHandler<T>,
{
    let fut = handler.handle(worker_id, item);
    if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
        #[cfg(feature = "tracing")]
        tracing::error!("Worker {worker_id} handler panicked; worker continues");
    }
}
