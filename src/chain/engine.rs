//! Attack chain engine
//!
//! Chains are built from the phase template or from caller-supplied nodes,
//! validated as acyclic, and executed in waves: every node whose
//! dependencies all succeeded runs concurrently through the dispatcher,
//! and findings from successful nodes are bound into their dependents'
//! open parameters before the next wave.
//!
//! Each chain has one writer at a time (its execution lock); status reads
//! take a short read lock and return an owned snapshot.

use crate::chain::findings::Findings;
use crate::chain::graph;
use crate::chain::suggest;
use crate::chain::template;
use crate::chain::types::{
    Chain, ChainCreated, ChainNode, ChainStatus, ChainSummary, NodeEvent, NodeSpec, NodeState,
    Suggestion, WaveReport,
};
use crate::dispatch::{Dispatcher, Invocation};
use crate::errors::{OrchestratorError, Result};
use crate::events::{NewEvent, Status};
use crate::gate::DependencyGate;
use crate::session::SessionStore;
use crate::target::{bind, extract_target, TargetDescriptor, TargetKind};
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SERVICE: &str = "/chain";

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSettings {
    /// Nodes dispatched concurrently within one wave
    pub max_parallel_nodes: usize,
    /// Skip nodes whose executable is missing instead of running them
    pub skip_missing_dependencies: bool,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            skip_missing_dependencies: true,
        }
    }
}

struct ChainSlot {
    chain: RwLock<Chain>,
    exec_lock: tokio::sync::Mutex<()>,
}

/// A node picked for this wave, before gating
struct Candidate {
    id: String,
    tool: String,
    unresolved: Vec<String>,
}

/// Builds and executes attack chains
pub struct AttackChainEngine {
    dispatcher: Arc<Dispatcher>,
    gate: Arc<DependencyGate>,
    sessions: Option<Arc<dyn SessionStore>>,
    chains: RwLock<HashMap<String, Arc<ChainSlot>>>,
    settings: ChainSettings,
}

impl AttackChainEngine {
    /// Create new engine
    pub fn new(dispatcher: Arc<Dispatcher>, gate: Arc<DependencyGate>) -> Self {
        Self {
            dispatcher,
            gate,
            sessions: None,
            chains: RwLock::new(HashMap::new()),
            settings: ChainSettings::default(),
        }
    }

    /// Record chain summaries into a session store
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_settings(mut self, settings: ChainSettings) -> Self {
        self.settings = ChainSettings {
            max_parallel_nodes: settings.max_parallel_nodes.max(1),
            ..settings
        };
        self
    }

    pub fn settings(&self) -> ChainSettings {
        self.settings
    }

    /// Number of stored chains
    pub fn chain_count(&self) -> usize {
        self.chains.read().len()
    }

    /// Build a chain from the phase template
    ///
    /// Steps whose tool is not registered are left out, together with the
    /// edges that point at them.
    pub fn create_chain(
        &self,
        target: &str,
        target_type: &str,
        objectives: &[String],
    ) -> Result<ChainCreated> {
        let kind = resolve_kind(target, target_type);
        let registry = self.dispatcher.registry();

        let steps: Vec<_> = template::plan(kind, objectives)
            .into_iter()
            .filter(|step| {
                let known = registry.get_tool(step.tool).is_some();
                if !known {
                    debug!(tool = step.tool, "template tool not registered, leaving it out");
                }
                known
            })
            .collect();
        if steps.is_empty() {
            return Err(OrchestratorError::EmptyChain {
                target: target.to_string(),
                target_type: kind.to_string(),
            });
        }

        let present: HashSet<&str> = steps.iter().map(|s| s.tool).collect();
        let specs = steps
            .iter()
            .map(|step| {
                NodeSpec::new(step.tool, step.tool)
                    .after(step.after.iter().filter(|d| present.contains(*d)).copied())
            })
            .collect();
        self.insert_chain(target, kind, objectives, specs)
    }

    /// Build a chain from explicit nodes
    ///
    /// Validation is atomic: on any error nothing is stored.
    pub fn create_chain_from_nodes(
        &self,
        target: &str,
        target_type: &str,
        objectives: &[String],
        nodes: Vec<NodeSpec>,
    ) -> Result<ChainCreated> {
        if nodes.is_empty() {
            return Err(OrchestratorError::EmptyChain {
                target: target.to_string(),
                target_type: target_type.to_string(),
            });
        }
        let kind = resolve_kind(target, target_type);
        self.insert_chain(target, kind, objectives, nodes)
    }

    fn insert_chain(
        &self,
        target: &str,
        kind: TargetKind,
        objectives: &[String],
        specs: Vec<NodeSpec>,
    ) -> Result<ChainCreated> {
        let edges: Vec<(String, Vec<String>)> = specs
            .iter()
            .map(|s| (s.id.clone(), s.depends_on.clone()))
            .collect();
        let order = graph::topological_order(&edges)?;

        let descriptor = TargetDescriptor::new(kind, target);
        let registry = self.dispatcher.registry();
        let mut nodes = HashMap::with_capacity(specs.len());
        for spec in specs {
            let tool = registry
                .get_tool(&spec.tool)
                .ok_or_else(|| OrchestratorError::UnknownTool(spec.tool.clone()))?;
            let binding = bind(&tool, &descriptor, &spec.params);
            let mut depends_on = spec.depends_on;
            dedup_preserving_order(&mut depends_on);
            nodes.insert(
                spec.id.clone(),
                ChainNode::new(
                    spec.id,
                    spec.tool,
                    tool.category,
                    binding.params,
                    binding.missing,
                    depends_on,
                ),
            );
        }

        let chain = Chain {
            id: Uuid::new_v4().to_string(),
            target: target.to_string(),
            target_type: kind,
            objectives: objectives.to_vec(),
            nodes,
            order,
            created_at: Utc::now(),
            waves: 0,
        };
        let created = ChainCreated {
            chain_id: chain.id.clone(),
            node_count: chain.nodes.len(),
            status: chain.progress(),
        };
        info!(
            chain_id = %created.chain_id,
            target,
            target_type = %kind,
            nodes = created.node_count,
            "created attack chain"
        );

        self.chains.write().insert(
            chain.id.clone(),
            Arc::new(ChainSlot {
                chain: RwLock::new(chain),
                exec_lock: tokio::sync::Mutex::new(()),
            }),
        );
        Ok(created)
    }

    fn slot(&self, chain_id: &str) -> Result<Arc<ChainSlot>> {
        self.chains
            .read()
            .get(chain_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::ChainNotFound(chain_id.to_string()))
    }

    /// Run waves until no node can make progress
    ///
    /// Nodes that already reached SUCCESS are never run again, so calling
    /// this again resumes where the previous run stopped.
    pub async fn execute_chain(&self, chain_id: &str, session_id: Option<&str>) -> Result<ChainSummary> {
        let slot = self.slot(chain_id)?;
        let _writer = slot.exec_lock.lock().await;
        let start = Instant::now();

        let bus = self.dispatcher.bus();
        bus.publish(
            NewEvent::new(SERVICE, Status::Running)
                .params(json!({ "chain_id": chain_id }))
                .session(session_id),
        );

        loop {
            let report = self.run_wave(&slot, session_id).await?;
            if !report.progressed() {
                break;
            }
        }

        let duration = start.elapsed().as_secs_f64();
        let summary = ChainSummary::from_chain(&slot.chain.read(), duration);
        bus.publish(
            NewEvent::new(SERVICE, Status::Success)
                .params(json!({ "chain_id": chain_id, "counts": summary.counts }))
                .duration(duration)
                .session(session_id),
        );
        info!(
            chain_id,
            waves = summary.waves,
            success = summary.counts.success,
            failed = summary.counts.failed,
            skipped = summary.counts.skipped,
            "attack chain finished"
        );

        self.record(session_id, &summary);
        Ok(summary)
    }

    /// Run exactly one wave
    pub async fn execute_wave(&self, chain_id: &str, session_id: Option<&str>) -> Result<WaveReport> {
        let slot = self.slot(chain_id)?;
        let _writer = slot.exec_lock.lock().await;
        self.run_wave(&slot, session_id).await
    }

    async fn run_wave(&self, slot: &ChainSlot, session_id: Option<&str>) -> Result<WaveReport> {
        let mut report = WaveReport::default();

        // Select: propagate skips and collect every node that may run now
        let mut skip_events: Vec<(String, String, String)> = Vec::new();
        let candidates = {
            let mut chain = slot.chain.write();
            report.skipped = graph::propagate_skips(&mut chain)?;
            for id in &report.skipped {
                if let Some(node) = chain.nodes.get(id) {
                    let reason = node.reason.clone().unwrap_or_default();
                    skip_events.push((id.clone(), node.tool.clone(), reason));
                }
            }
            graph::ready_ids(&chain)
                .into_iter()
                .filter_map(|id| {
                    chain.nodes.get(&id).map(|n| Candidate {
                        id: id.clone(),
                        tool: n.tool.clone(),
                        unresolved: n.unresolved.clone(),
                    })
                })
                .collect::<Vec<_>>()
        };

        // Gate outside the lock: the lookup touches the filesystem
        let verdicts: Vec<(Candidate, Option<String>)> = candidates
            .into_iter()
            .map(|c| {
                let blocked = if !c.unresolved.is_empty() {
                    Some(format!("missing required parameters: {}", c.unresolved.join(", ")))
                } else if self.settings.skip_missing_dependencies {
                    let status = self.gate.check(&c.tool);
                    match status.dependency {
                        Some(dep) if !status.available => {
                            Some(format!("dependency {} not installed", dep))
                        }
                        _ => None,
                    }
                } else {
                    None
                };
                (c, blocked)
            })
            .collect();

        // Transition: READY, then RUNNING or SKIPPED
        let mut dispatch: Vec<(String, Invocation)> = Vec::new();
        {
            let mut chain = slot.chain.write();
            for (candidate, blocked) in verdicts {
                let Some(node) = chain.nodes.get_mut(&candidate.id) else {
                    continue;
                };
                if node.state == NodeState::Pending {
                    node.apply(NodeEvent::DependenciesMet)?;
                }
                match blocked {
                    Some(reason) => {
                        node.skip(reason.clone())?;
                        report.skipped.push(candidate.id.clone());
                        skip_events.push((candidate.id, candidate.tool, reason));
                    }
                    None => {
                        node.apply(NodeEvent::Dispatch)?;
                        node.started_at = Some(Utc::now());
                        dispatch.push((
                            candidate.id,
                            Invocation::new(candidate.tool, node.params.clone()),
                        ));
                    }
                }
            }

            if !dispatch.is_empty() || !report.skipped.is_empty() {
                chain.waves += 1;
            }
            report.wave = chain.waves;
        }

        for (id, tool, reason) in &skip_events {
            debug!(node = %id, tool = %tool, reason = %reason, "node skipped");
            self.dispatcher.bus().publish(
                NewEvent::new(SERVICE, Status::Warning)
                    .tool(tool.as_str())
                    .params(json!({ "node": id }))
                    .error(reason.as_str())
                    .session(session_id),
            );
        }

        if dispatch.is_empty() {
            report.remaining = slot.chain.read().nodes.values().filter(|n| n.state.is_open()).count();
            return Ok(report);
        }

        // Dispatch the wave; the chain lock is not held while tools run
        let (ids, invocations): (Vec<String>, Vec<Invocation>) = dispatch.into_iter().unzip();
        let responses = self
            .dispatcher
            .run_many(SERVICE, invocations, self.settings.max_parallel_nodes, session_id)
            .await;

        // Apply results and propagate findings
        let mut chain = slot.chain.write();
        let finished_at = Utc::now();
        let mut succeeded = Vec::new();
        for (id, response) in ids.iter().zip(responses) {
            let Some(node) = chain.nodes.get_mut(id) else {
                continue;
            };
            node.duration = Some(response.duration);
            node.finished_at = Some(finished_at);
            if response.success {
                node.apply(NodeEvent::Succeeded)?;
                node.result = Some(Arc::new(response.result.unwrap_or(Value::Null)));
                report.succeeded += 1;
                succeeded.push(id.clone());
            } else {
                node.apply(NodeEvent::Failed)?;
                node.result = Some(Arc::new(json!({ "error": response.error })));
                node.reason = response.error;
                report.failed += 1;
            }
        }
        report.executed = ids;

        for id in succeeded {
            self.propagate_findings(&mut chain, &id);
        }
        report.remaining = chain.nodes.values().filter(|n| n.state.is_open()).count();
        info!(
            chain_id = %chain.id,
            wave = report.wave,
            executed = report.executed.len(),
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped.len(),
            "wave finished"
        );
        Ok(report)
    }

    fn propagate_findings(&self, chain: &mut Chain, id: &str) {
        let findings = match chain.nodes.get(id).and_then(|n| n.result.as_deref()) {
            Some(result) => Findings::from_result(result),
            None => return,
        };
        if findings.is_empty() {
            return;
        }

        let dependents: Vec<String> = graph::dependents_of(chain, id).map(str::to_string).collect();
        let registry = self.dispatcher.registry();
        for dependent in dependents {
            let Some(node) = chain.nodes.get_mut(&dependent) else {
                continue;
            };
            if node.state != NodeState::Pending {
                continue;
            }
            let Some(tool) = registry.get_tool(&node.tool) else {
                continue;
            };
            let bound = findings.apply(&tool, &mut node.params);
            if !bound.is_empty() {
                node.unresolved.retain(|name| !bound.contains(name));
                debug!(from = id, to = %dependent, params = ?bound, "propagated findings");
            }
        }
    }

    fn record(&self, session_id: Option<&str>, summary: &ChainSummary) {
        let (Some(store), Some(id)) = (&self.sessions, session_id) else {
            return;
        };
        let data = match serde_json::to_value(summary) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "could not serialize chain summary");
                return;
            }
        };
        if let Err(e) = store.add_result(id, "chain", data) {
            warn!(session_id = id, error = %e, "could not record chain summary");
        }
    }

    /// Read-only snapshot of a chain
    pub fn get_chain_status(&self, chain_id: &str) -> Result<ChainStatus> {
        let slot = self.slot(chain_id)?;
        let snapshot = slot.chain.read().snapshot();
        Ok(snapshot)
    }

    /// Advisory ranking of the nodes that could run next
    pub fn suggest_next_steps(&self, chain_id: &str) -> Result<Vec<Suggestion>> {
        let slot = self.slot(chain_id)?;
        let chain = slot.chain.read();
        Ok(suggest::suggest_next_steps(&chain))
    }
}

/// Parse the caller's target type, falling back to what the text looks like
fn resolve_kind(target: &str, target_type: &str) -> TargetKind {
    match target_type.parse::<TargetKind>() {
        Ok(kind) if kind != TargetKind::Unknown => kind,
        _ => extract_target(target).kind,
    }
}

fn dedup_preserving_order(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}
