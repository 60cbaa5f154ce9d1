//! Error types for the worker pool.
//!
//! This module defines the central `Error` enum, which captures the
//! reportable failure cases of the pool. Backpressure is not among them:
//! waiting on a full queue or a busy pool is ordinary blocking by design,
//! never an error.
//!
//! ## Error Cases
//! - `QueueClosed`: The work queue receiver is gone; nothing can consume the
//!   item.
//! - `Shutdown`: A submission arrived after graceful shutdown began.
//! - `EnqueueTimeout`: A bounded submission gave up before queue space freed.
//! - `UnknownWorker`: A stop request named a worker id outside the pool.

use crate::types::WorkerId;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the worker pool.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The work queue can no longer accept items (receiver dropped).
    #[error("Queue closed: {context}")]
    QueueClosed { context: String },

    /// The pool is in the process of shutting down.
    #[error("Pool is shutting down")]
    Shutdown,

    /// A timed submission expired before queue capacity freed. The item was
    /// never enqueued.
    #[error("Enqueue timed out before queue space freed")]
    EnqueueTimeout,

    /// No worker with the given id exists in this pool.
    #[error("No worker with id {worker_id}")]
    UnknownWorker { worker_id: WorkerId },
}
