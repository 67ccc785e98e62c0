//! Error types for reconchain
//!
//! Structural and validation failures are raised to the direct caller.
//! Failures local to one tool invocation never appear here: they are
//! contained at the invocation boundary and reported as data.

use thiserror::Error;

/// Main error type for the orchestration core
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Tool name not present in the registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool name registered twice
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    /// Required parameters left unbound after inference
    #[error("Missing required parameters for {tool}: {}", missing.join(", "))]
    MissingRequiredParameter { tool: String, missing: Vec<String> },

    /// Chain definition contains a dependency cycle
    #[error("Cyclic chain definition involving nodes: {}", nodes.join(", "))]
    CyclicChainDefinition { nodes: Vec<String> },

    /// Node depends on an id that is not part of the chain
    #[error("Node {node} depends on unknown node {dependency}")]
    UnknownDependency { node: String, dependency: String },

    /// Two nodes share the same id
    #[error("Duplicate node id in chain: {0}")]
    DuplicateNode(String),

    /// No chain registered under this id
    #[error("Attack chain not found: {0}")]
    ChainNotFound(String),

    /// Template produced no runnable nodes for this target
    #[error("No tools available to build a chain for {target_type} target {target}")]
    EmptyChain { target: String, target_type: String },

    /// Node state machine violation
    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// No session registered under this id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Orchestrator error: {0}")]
    Generic(String),
}

impl OrchestratorError {
    /// Whether the failure was caused by the caller's input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrchestratorError::UnknownTool(_)
                | OrchestratorError::MissingRequiredParameter { .. }
                | OrchestratorError::CyclicChainDefinition { .. }
                | OrchestratorError::UnknownDependency { .. }
                | OrchestratorError::DuplicateNode(_)
        )
    }
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Convert anyhow errors to OrchestratorError
impl From<anyhow::Error> for OrchestratorError {
    fn from(err: anyhow::Error) -> Self {
        OrchestratorError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_display() {
        let err = OrchestratorError::MissingRequiredParameter {
            tool: "nmap_scan".to_string(),
            missing: vec!["target".to_string(), "ports".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("nmap_scan"));
        assert!(msg.contains("target, ports"));
    }

    #[test]
    fn test_cycle_display() {
        let err = OrchestratorError::CyclicChainDefinition {
            nodes: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_validation_classification() {
        assert!(OrchestratorError::UnknownTool("x".into()).is_validation());
        assert!(!OrchestratorError::ChainNotFound("x".into()).is_validation());
        assert!(!OrchestratorError::Generic("boom".into()).is_validation());
    }
}
