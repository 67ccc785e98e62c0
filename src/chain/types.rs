//! Chain data model and node state machine

use crate::errors::{OrchestratorError, Result};
use crate::target::TargetKind;
use crate::tools::types::{Params, ToolCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Execution state of one chain node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeState {
    Pending,
    Ready,
    Running,
    Success,
    Failed,
    Skipped,
}

/// Events that move a node between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEvent {
    /// Every dependency reached SUCCESS
    DependenciesMet,
    /// Picked up by a wave
    Dispatch,
    Succeeded,
    Failed,
    /// A dependency failed or was skipped, or the node cannot run
    Blocked,
}

impl NodeState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Success | NodeState::Failed | NodeState::Skipped)
    }

    /// Not yet run and not ruled out
    pub fn is_open(&self) -> bool {
        matches!(self, NodeState::Pending | NodeState::Ready)
    }

    /// Attempt state transition with validation
    ///
    /// Valid transitions:
    /// - Pending → Ready   (on: DependenciesMet)
    /// - Pending → Skipped (on: Blocked)
    /// - Ready   → Running (on: Dispatch)
    /// - Ready   → Skipped (on: Blocked)
    /// - Running → Success (on: Succeeded)
    /// - Running → Failed  (on: Failed)
    pub fn transition(&self, event: NodeEvent) -> Result<NodeState> {
        use NodeEvent::*;
        use NodeState::*;

        let next = match (self, event) {
            (Pending, DependenciesMet) => Ready,
            (Pending, Blocked) | (Ready, Blocked) => Skipped,
            (Ready, Dispatch) => Running,
            (Running, Succeeded) => Success,
            (Running, NodeEvent::Failed) => NodeState::Failed,
            (from, event) => {
                return Err(OrchestratorError::InvalidTransition {
                    from: from.to_string(),
                    to: format!("{:?}", event),
                    reason: "No valid transition exists".to_string(),
                })
            }
        };
        Ok(next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Pending => "PENDING",
            NodeState::Ready => "READY",
            NodeState::Running => "RUNNING",
            NodeState::Success => "SUCCESS",
            NodeState::Failed => "FAILED",
            NodeState::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied node definition
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub tool: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            ..Self::default()
        }
    }

    pub fn after<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// One planned tool invocation inside a chain
#[derive(Debug, Clone, Serialize)]
pub struct ChainNode {
    pub id: String,
    pub tool: String,
    pub category: ToolCategory,
    pub params: Params,
    /// Required params not yet bound
    pub unresolved: Vec<String>,
    pub depends_on: Vec<String>,
    pub state: NodeState,
    /// Set once the node reaches a terminal state after running
    pub result: Option<Arc<Value>>,
    /// Skip reason or failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl ChainNode {
    pub(crate) fn new(
        id: String,
        tool: String,
        category: ToolCategory,
        params: Params,
        unresolved: Vec<String>,
        depends_on: Vec<String>,
    ) -> Self {
        Self {
            id,
            tool,
            category,
            params,
            unresolved,
            depends_on,
            state: NodeState::Pending,
            result: None,
            reason: None,
            started_at: None,
            finished_at: None,
            duration: None,
        }
    }

    /// Apply a state event
    pub(crate) fn apply(&mut self, event: NodeEvent) -> Result<NodeState> {
        self.state = self.state.transition(event)?;
        Ok(self.state)
    }

    pub(crate) fn skip(&mut self, reason: impl Into<String>) -> Result<()> {
        self.apply(NodeEvent::Blocked)?;
        self.reason = Some(reason.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}

/// Dependency graph of planned invocations for one target
#[derive(Debug, Clone)]
pub struct Chain {
    pub id: String,
    pub target: String,
    pub target_type: TargetKind,
    pub objectives: Vec<String>,
    pub nodes: HashMap<String, ChainNode>,
    /// Node ids in topological order
    pub order: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub waves: usize,
}

impl Chain {
    /// Nodes in topological order
    pub fn ordered_nodes(&self) -> impl Iterator<Item = &ChainNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn count(&self, state: NodeState) -> usize {
        self.nodes.values().filter(|n| n.state == state).count()
    }

    /// Whether any node can still run
    pub fn has_open_nodes(&self) -> bool {
        self.nodes.values().any(|n| n.state.is_open())
    }

    pub fn progress(&self) -> ChainProgress {
        if self.nodes.values().all(|n| n.state == NodeState::Pending) {
            ChainProgress::Created
        } else if self.nodes.values().all(|n| n.state.is_terminal()) {
            ChainProgress::Completed
        } else {
            ChainProgress::InProgress
        }
    }

    pub fn counts(&self) -> StateCounts {
        StateCounts {
            pending: self.count(NodeState::Pending),
            ready: self.count(NodeState::Ready),
            running: self.count(NodeState::Running),
            success: self.count(NodeState::Success),
            failed: self.count(NodeState::Failed),
            skipped: self.count(NodeState::Skipped),
        }
    }

    pub fn snapshot(&self) -> ChainStatus {
        ChainStatus {
            chain_id: self.id.clone(),
            target: self.target.clone(),
            target_type: self.target_type,
            objectives: self.objectives.clone(),
            created_at: self.created_at,
            status: self.progress(),
            waves: self.waves,
            counts: self.counts(),
            nodes: self.ordered_nodes().cloned().collect(),
        }
    }
}

/// Overall chain progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainProgress {
    Created,
    InProgress,
    Completed,
}

/// Node counts per state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StateCounts {
    pub pending: usize,
    pub ready: usize,
    pub running: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Read-only copy of a chain
#[derive(Debug, Clone, Serialize)]
pub struct ChainStatus {
    pub chain_id: String,
    pub target: String,
    pub target_type: TargetKind,
    pub objectives: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub status: ChainProgress,
    pub waves: usize,
    pub counts: StateCounts,
    pub nodes: Vec<ChainNode>,
}

impl ChainStatus {
    pub fn node(&self, id: &str) -> Option<&ChainNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Response to chain creation
#[derive(Debug, Clone, Serialize)]
pub struct ChainCreated {
    pub chain_id: String,
    pub node_count: usize,
    pub status: ChainProgress,
}

/// Outcome of one wave
#[derive(Debug, Clone, Default, Serialize)]
pub struct WaveReport {
    pub wave: usize,
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
    pub succeeded: usize,
    pub failed: usize,
    /// PENDING or READY nodes left afterwards
    pub remaining: usize,
}

impl WaveReport {
    /// Whether the wave changed any node
    pub fn progressed(&self) -> bool {
        !self.executed.is_empty() || !self.skipped.is_empty()
    }
}

/// Terminal outcome of one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutcome {
    pub id: String,
    pub tool: String,
    pub state: NodeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Summary returned by chain execution
#[derive(Debug, Clone, Serialize)]
pub struct ChainSummary {
    pub chain_id: String,
    pub target: String,
    pub status: ChainProgress,
    pub waves: usize,
    pub counts: StateCounts,
    /// Seconds spent in this invocation
    pub duration: f64,
    pub nodes: Vec<NodeOutcome>,
}

impl ChainSummary {
    pub(crate) fn from_chain(chain: &Chain, duration: f64) -> Self {
        Self {
            chain_id: chain.id.clone(),
            target: chain.target.clone(),
            status: chain.progress(),
            waves: chain.waves,
            counts: chain.counts(),
            duration,
            nodes: chain
                .ordered_nodes()
                .map(|n| NodeOutcome {
                    id: n.id.clone(),
                    tool: n.tool.clone(),
                    state: n.state,
                    reason: n.reason.clone(),
                    duration: n.duration,
                })
                .collect(),
        }
    }
}

/// Advisory next step
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub node_id: String,
    pub tool: String,
    pub category: ToolCategory,
    pub priority: u8,
    pub params: Params,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_params: Vec<String>,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let state = NodeState::Pending;
        let state = state.transition(NodeEvent::DependenciesMet).unwrap();
        assert_eq!(state, NodeState::Ready);
        let state = state.transition(NodeEvent::Dispatch).unwrap();
        assert_eq!(state, NodeState::Running);
        assert_eq!(state.transition(NodeEvent::Succeeded).unwrap(), NodeState::Success);
        assert_eq!(state.transition(NodeEvent::Failed).unwrap(), NodeState::Failed);
    }

    #[test]
    fn test_blocked_nodes_skip() {
        assert_eq!(NodeState::Pending.transition(NodeEvent::Blocked).unwrap(), NodeState::Skipped);
        assert_eq!(NodeState::Ready.transition(NodeEvent::Blocked).unwrap(), NodeState::Skipped);
    }

    #[test]
    fn test_invalid_transitions() {
        // Never straight from PENDING to RUNNING
        assert!(NodeState::Pending.transition(NodeEvent::Dispatch).is_err());
        assert!(NodeState::Running.transition(NodeEvent::Blocked).is_err());
        for terminal in [NodeState::Success, NodeState::Failed, NodeState::Skipped] {
            assert!(terminal.is_terminal());
            assert!(terminal.transition(NodeEvent::Dispatch).is_err());
            assert!(terminal.transition(NodeEvent::DependenciesMet).is_err());
        }
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(serde_json::to_value(NodeState::Skipped).unwrap(), "SKIPPED");
        assert_eq!(NodeState::Running.to_string(), "RUNNING");
    }

    #[test]
    fn test_node_spec_builder() {
        let spec = NodeSpec::new("b", "vuln_scan")
            .after(["a"])
            .param("severity", Value::String("high".into()));
        assert_eq!(spec.depends_on, vec!["a"]);
        assert_eq!(spec.params["severity"], "high");
    }
}
