/// Fallback applied when a caller configures a queue capacity of zero.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Sizing parameters for a [`WorkerPool`](crate::WorkerPool).
///
/// The configuration surface is exactly two integers. The registry that
/// tracks idle workers is always sized to `num_workers`; it is not
/// independently tunable because any other capacity would be a sizing bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of long-lived worker tasks to spawn.
    ///
    /// `0` is legal: the pool starts no dispatch loop and submitted items
    /// accumulate in the queue, unconsumed. This is a documented edge case,
    /// not an error.
    pub num_workers: usize,

    /// Capacity of the shared work queue.
    ///
    /// `0` silently falls back to [`DEFAULT_QUEUE_CAPACITY`]. This fallback
    /// is a policy choice, not a validation failure. Once the queue is full,
    /// producers block (backpressure) rather than overflow.
    pub queue_capacity: usize,
}

impl PoolConfig {
    pub const fn new(num_workers: usize, queue_capacity: usize) -> Self {
        Self {
            num_workers,
            queue_capacity,
        }
    }

    /// Queue capacity after applying the zero fallback policy.
    pub(crate) const fn effective_queue_capacity(&self) -> usize {
        if self.queue_capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            self.queue_capacity
        }
    }
}
