use crate::types::WorkerId;
use core::future::Future;

/// Caller-supplied behavior invoked by a worker for each accepted item.
///
/// The pool is agnostic to what "processing" means: publish to a broker,
/// write to a database, or just log receipt. One handler instance is shared
/// by every worker in the pool, so per-worker state must either live behind
/// interior mutability or be keyed by `worker_id`.
///
/// A panic raised inside [`handle`](WorkHandler::handle) is caught at the
/// worker boundary, logged, and the worker's loop continues; a failed item
/// never shrinks pool capacity.
///
/// Closures implement this trait automatically:
///
/// ```rust
/// use taskmill::{PoolConfig, WorkerPool};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = WorkerPool::new(PoolConfig::new(2, 8), |worker_id: usize, item: u64| async move {
///     let _ = (worker_id, item);
/// });
/// # drop(pool);
/// # }
/// ```
pub trait WorkHandler<T>: Send + Sync + 'static {
    /// Processes one item on the worker identified by `worker_id`.
    ///
    /// Runs to completion before the worker re-registers as idle, so the
    /// duration of this future directly controls how long the worker stays
    /// unavailable.
    fn handle(&self, worker_id: WorkerId, item: T) -> impl Future<Output = ()> + Send;
}

impl<T, F, Fut> WorkHandler<T> for F
where
    F: Fn(WorkerId, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    fn handle(&self, worker_id: WorkerId, item: T) -> impl Future<Output = ()> + Send {
        self(worker_id, item)
    }
}
