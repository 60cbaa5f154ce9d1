//! The task distribution core: worker loops, the idle-worker registry, the
//! dispatch loop, and the pool handle that owns them all.

pub(crate) mod dispatch;
pub mod manager;
pub(crate) mod worker;

#[cfg(test)]
mod tests;
