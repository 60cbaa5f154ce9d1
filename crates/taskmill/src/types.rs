//! # Core vocabulary types
//!
//! Shared aliases and marker traits used across the pool. These fix the
//! contract between producers (who submit items), the dispatcher (who routes
//! them), and handlers (who consume them).
//!
//! ## Type Aliases
//!
//! - [`WorkerId`] - Stable identifier of a worker task
//!
//! ## Traits
//!
//! - [`WorkItem`] - Marker for anything the pool can distribute

/// Stable identifier for a worker task, unique for the pool's lifetime.
///
/// Assigned sequentially from zero at pool construction and never reused.
/// Surfaced to [`WorkHandler`](crate::WorkHandler) implementations so
/// per-worker state can be keyed by it, and used in logs.
pub type WorkerId = usize;

/// Marker trait for anything the pool can distribute.
///
/// A work item is an opaque payload: the pool never inspects it, moves it
/// from the producer into exactly one worker, and drops it once the handler
/// completes. There is no identity beyond the item's contents.
///
/// Implemented automatically for every `Send + 'static` type.
pub trait WorkItem: Send + 'static {}

impl<T: Send + 'static> WorkItem for T {}
