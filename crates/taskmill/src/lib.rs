#![doc = include_str!("../README.md")]

mod config;
mod error;
mod handler;
mod pool;
mod types;

pub use config::{DEFAULT_QUEUE_CAPACITY, PoolConfig};
pub use error::{Error, Result};
pub use handler::WorkHandler;
pub use pool::manager::WorkerPool;
pub use types::{WorkItem, WorkerId};
