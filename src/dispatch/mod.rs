//! Concurrent dispatcher
//!
//! Runs independent tool invocations on blocking worker threads, bounded by
//! a semaphore, and turns every per-invocation failure into data.

pub mod types;
pub mod executor;

pub use types::{
    BatchEntry, BatchReport, BatchRequest, ExecutionResponse, InferEntry, InferReport, Invocation,
};
pub use executor::{Dispatcher, DEFAULT_MAX_WORKERS};
