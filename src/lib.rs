//! reconchain - security tool orchestration
//!
//! Runs command-line security tools concurrently, infers their parameters
//! from free text, and chains them into dependency-ordered attack chains
//! whose findings feed later steps.
//!
//! # Architecture
//!
//! - **tools**: read-only registry of tool descriptors and handlers
//! - **target / gate**: target extraction, parameter inference, dependency checks
//! - **events**: bounded execution event log with replay and live streaming
//! - **dispatch**: bounded concurrent execution with per-invocation containment
//! - **chain**: attack chain graphs executed in waves
//! - **orchestrator**: facade wiring all of the above

pub mod errors;
pub mod config;
pub mod telemetry;
pub mod cli;

pub mod tools;
pub mod target;
pub mod gate;
pub mod events;
pub mod dispatch;
pub mod chain;
pub mod session;
pub mod ai;
pub mod orchestrator;

// Re-export commonly used types
pub use errors::{OrchestratorError, Result};
pub use config::Config;
pub use orchestrator::{ChatResponse, Orchestrator, OrchestratorBuilder};
