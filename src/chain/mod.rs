//! Attack chain engine
//!
//! Dependency graphs of planned tool invocations, executed in waves.

pub mod types;
pub mod graph;
pub mod template;
pub mod findings;
pub mod suggest;
pub mod engine;

pub use types::{
    Chain, ChainCreated, ChainNode, ChainProgress, ChainStatus, ChainSummary, NodeEvent,
    NodeOutcome, NodeSpec, NodeState, StateCounts, Suggestion, WaveReport,
};
pub use findings::{Findings, OpenPort};
pub use engine::{AttackChainEngine, ChainSettings};
