use super::worker::Slot;
use crate::types::WorkItem;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

/// Shared receiving side of the idle-worker registry.
///
/// Hand-off tasks acquire slots concurrently, so the single `mpsc` receiver
/// sits behind an async mutex. The lock is held only while waiting for the
/// next idle worker; completing a rendezvous itself is immediate.
pub(crate) type Registry<T> = Arc<tokio::sync::Mutex<mpsc::Receiver<Slot<T>>>>;

/// The dispatch loop: matches queued items to idle workers.
///
/// Runs as a single background task. Items are dequeued in FIFO submission
/// order; each one is then handed off in an independent task so a slow
/// hand-off (no worker idle) never blocks dequeuing the next item. Delivery
/// order among in-flight hand-offs is therefore unordered under contention:
/// throughput over strict ordering.
///
/// The number of outstanding hand-offs is capped at `num_workers` by a
/// semaphore, so a producer burst cannot fan out tasks without bound.
///
/// The loop exits once the queue has been closed and fully drained, then
/// waits for all outstanding hand-offs to finish before returning.
pub(crate) async fn dispatch_loop<T: WorkItem>(
    mut queue_rx: mpsc::Receiver<T>,
    registry: Registry<T>,
    num_workers: usize,
) {
    // Tokio semaphore permits are u32; clamp so the final acquire below is
    // always sized to the same count the semaphore was built with. Worker
    // counts beyond u32::MAX are not meaningful.
    let max_handoffs = u32::try_from(num_workers).unwrap_or(u32::MAX);
    let handoffs = Arc::new(Semaphore::new(max_handoffs as usize));

    while let Some(item) = queue_rx.recv().await {
        let permit = match Arc::clone(&handoffs).acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is never closed; nothing left to do if it is.
            Err(_) => break,
        };

        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            hand_off(item, registry).await;
            drop(permit);
        });
    }

    // Queue closed and drained. Re-acquiring every permit proves all spawned
    // hand-offs have completed; the semaphore is never closed, so the
    // discarded error case is unreachable.
    let _ = handoffs.acquire_many(max_handoffs).await;

    #[cfg(feature = "tracing")]
    tracing::debug!("Dispatch loop exited");
}

/// Completes the rendezvous for one dequeued item.
///
/// Takes the next slot off the registry, blocking while every worker is
/// busy; this is the intended backpressure point. A slot whose worker
/// stopped after registering is dead: the send fails, the item is recovered
/// from the error, and the next registration is tried.
async fn hand_off<T: WorkItem>(mut item: T, registry: Registry<T>) {
    loop {
        let slot = registry.lock().await.recv().await;
        match slot {
            Some(slot) => match slot.send(item) {
                Ok(()) => return,
                Err(returned) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Stale registration skipped; retrying hand-off");
                    item = returned;
                }
            },
            None => {
                // Registry closed: every worker has exited. The item cannot
                // be delivered; surface the drop instead of parking forever.
                #[cfg(feature = "tracing")]
                tracing::error!("Dropping undeliverable item: all workers stopped");
                return;
            }
        }
    }
}
