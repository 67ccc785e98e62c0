//! Orchestration facade
//!
//! Wires the registry, event bus, dispatcher, dependency gate and chain
//! engine together and exposes the external operations. Every component is
//! an owned handle; nothing here is process-global.

use crate::ai::{AiEngine, AttackPlan, PlaybookAi, TargetAnalysis};
use crate::chain::{
    AttackChainEngine, ChainCreated, ChainSettings, ChainStatus, ChainSummary, NodeSpec, Suggestion,
    WaveReport,
};
use crate::config::Config;
use crate::dispatch::{BatchReport, BatchRequest, Dispatcher, ExecutionResponse, InferEntry, InferReport};
use crate::errors::Result;
use crate::events::{Event, EventBus, NewEvent, Status, StreamFrame};
use crate::gate::{DependencyGate, DependencyStatus, LinkReport};
use crate::session::{InMemorySessionStore, SessionInfo, SessionRecord, SessionStore};
use crate::target::{extract_target, TargetDescriptor};
use crate::tools::catalog::builtin_catalog;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::Params;
use futures_util::Stream;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Response to a free-text request
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub target: TargetDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<InferEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<TargetAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    registry: Arc<dyn ToolRegistry>,
    config: Config,
    gate: Option<Arc<DependencyGate>>,
    sessions: Option<Arc<dyn SessionStore>>,
    ai: Option<Arc<dyn AiEngine>>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn gate(mut self, gate: DependencyGate) -> Self {
        self.gate = Some(Arc::new(gate));
        self
    }

    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn ai(mut self, ai: Arc<dyn AiEngine>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn build(self) -> Orchestrator {
        let config = self.config;
        let bus = Arc::new(EventBus::new(config.events.capacity, config.events.heartbeat()));
        let dispatcher = Arc::new(
            Dispatcher::new(Arc::clone(&self.registry), Arc::clone(&bus))
                .with_max_workers(config.dispatcher.max_workers),
        );
        let gate = self.gate.unwrap_or_else(|| Arc::new(DependencyGate::new()));
        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(InMemorySessionStore::new()));
        let ai = self
            .ai
            .unwrap_or_else(|| Arc::new(PlaybookAi::with_registry(Arc::clone(&self.registry))));
        let engine = AttackChainEngine::new(Arc::clone(&dispatcher), Arc::clone(&gate))
            .with_sessions(Arc::clone(&sessions))
            .with_settings(ChainSettings::from(&config.chain));

        Orchestrator {
            registry: self.registry,
            bus,
            dispatcher,
            gate,
            engine,
            sessions,
            ai,
        }
    }
}

/// Entry point to every orchestration operation
pub struct Orchestrator {
    registry: Arc<dyn ToolRegistry>,
    bus: Arc<EventBus>,
    dispatcher: Arc<Dispatcher>,
    gate: Arc<DependencyGate>,
    engine: AttackChainEngine,
    sessions: Arc<dyn SessionStore>,
    ai: Arc<dyn AiEngine>,
}

impl Orchestrator {
    pub fn builder(registry: Arc<dyn ToolRegistry>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            registry,
            config: Config::default(),
            gate: None,
            sessions: None,
            ai: None,
        }
    }

    /// Orchestrator with default collaborators
    pub fn new(registry: Arc<dyn ToolRegistry>, config: Config) -> Self {
        Self::builder(registry).config(config).build()
    }

    /// Orchestrator over the built-in tool catalog
    pub fn from_config(config: Config) -> Result<Self> {
        let catalog = builtin_catalog(config.tools.timeout())?;
        Ok(Self::new(Arc::new(catalog), config))
    }

    pub fn registry(&self) -> &Arc<dyn ToolRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn engine(&self) -> &AttackChainEngine {
        &self.engine
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    // Tools and dependencies

    pub fn check_dependency(&self, tool: &str) -> DependencyStatus {
        self.gate.check(tool)
    }

    pub fn link_status(&self) -> LinkReport {
        self.gate.link_status(self.registry.as_ref())
    }

    // Execution

    pub async fn execute(
        &self,
        tool: &str,
        params: Params,
        session_id: Option<&str>,
    ) -> Result<ExecutionResponse> {
        self.dispatcher.execute(tool, params, session_id).await
    }

    pub async fn batch_scan(&self, request: BatchRequest) -> Result<BatchReport> {
        self.dispatcher.run_batch(request).await
    }

    pub async fn infer_and_execute(
        &self,
        tools: &[String],
        text: &str,
        overrides: &HashMap<String, Params>,
        session_id: Option<&str>,
    ) -> InferReport {
        let report = self
            .dispatcher
            .infer_and_execute(tools, text, overrides, session_id)
            .await;
        if let Some(id) = session_id {
            self.record(id, "infer", &report);
        }
        report
    }

    /// Free-text request
    ///
    /// With tools, infers and runs them. Without tools, analyses the
    /// extracted target. A trailing `{"tool_params": {...}}` object in the
    /// text supplies per-tool overrides; keys in `overrides` take precedence.
    /// A session is created when none is given.
    pub async fn analyze_text(
        &self,
        text: &str,
        tools: &[String],
        overrides: &HashMap<String, Params>,
        session_id: Option<&str>,
    ) -> ChatResponse {
        const SERVICE: &str = "/chat";
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => self.sessions.create("chat").id,
        };
        let (text, mut embedded) = split_tool_params(text);
        for (tool, params) in overrides {
            embedded
                .entry(tool.clone())
                .or_default()
                .extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let overrides = embedded;
        let target = extract_target(text);

        let response = if !tools.is_empty() {
            let report = self
                .dispatcher
                .infer_and_execute(tools, text, &overrides, Some(&session_id))
                .await;
            ChatResponse {
                session_id: session_id.clone(),
                target: report.target,
                results: Some(report.results),
                analysis: None,
                message: None,
            }
        } else if target.is_unknown() {
            let message = "No target found in request".to_string();
            self.bus.publish(
                NewEvent::new(SERVICE, Status::Warning)
                    .error(message.as_str())
                    .session(Some(&session_id)),
            );
            ChatResponse {
                session_id: session_id.clone(),
                target,
                results: None,
                analysis: None,
                message: Some(message),
            }
        } else {
            let analysis = self.ai.analyze_target(&target, text);
            self.bus.publish(
                NewEvent::new(SERVICE, Status::Success)
                    .params(serde_json::json!({ "target": target.value, "type": target.kind }))
                    .session(Some(&session_id)),
            );
            ChatResponse {
                session_id: session_id.clone(),
                target,
                results: None,
                analysis: Some(analysis),
                message: None,
            }
        };

        self.record(&session_id, "chat", &response);
        response
    }

    pub fn generate_plan(&self, text: &str, objectives: &[String]) -> AttackPlan {
        self.ai.generate_plan(&extract_target(text), objectives)
    }

    // Events

    pub fn subscribe_events(&self, since: u64) -> impl Stream<Item = StreamFrame> + Send + 'static {
        self.bus.subscribe(since)
    }

    pub fn replay_events(&self, since: u64) -> Vec<Event> {
        self.bus.replay_since(since)
    }

    // Chains

    pub fn create_chain(
        &self,
        target: &str,
        target_type: &str,
        objectives: &[String],
    ) -> Result<ChainCreated> {
        self.engine.create_chain(target, target_type, objectives)
    }

    pub fn create_chain_from_nodes(
        &self,
        target: &str,
        target_type: &str,
        objectives: &[String],
        nodes: Vec<NodeSpec>,
    ) -> Result<ChainCreated> {
        self.engine
            .create_chain_from_nodes(target, target_type, objectives, nodes)
    }

    pub async fn execute_chain(&self, chain_id: &str, session_id: Option<&str>) -> Result<ChainSummary> {
        self.engine.execute_chain(chain_id, session_id).await
    }

    pub async fn execute_wave(&self, chain_id: &str, session_id: Option<&str>) -> Result<WaveReport> {
        self.engine.execute_wave(chain_id, session_id).await
    }

    pub fn get_chain_status(&self, chain_id: &str) -> Result<ChainStatus> {
        self.engine.get_chain_status(chain_id)
    }

    pub fn suggest_next_steps(&self, chain_id: &str) -> Result<Vec<Suggestion>> {
        self.engine.suggest_next_steps(chain_id)
    }

    // Sessions

    pub fn create_session(&self, name: &str) -> SessionInfo {
        self.sessions.create(name)
    }

    pub fn session_results(&self, session_id: &str) -> Result<Vec<SessionRecord>> {
        self.sessions.results(session_id)
    }

    fn record<T: Serialize>(&self, session_id: &str, kind: &str, data: &T) {
        let outcome = serde_json::to_value(data)
            .map_err(Into::into)
            .and_then(|value| self.sessions.add_result(session_id, kind, value));
        if let Err(e) = outcome {
            warn!(session_id, kind, error = %e, "could not record session result");
        }
    }
}

/// Split a trailing `{"tool_params": {...}}` object off the request text
fn split_tool_params(text: &str) -> (&str, HashMap<String, Params>) {
    let Some(start) = text.rfind('{') else {
        return (text, HashMap::new());
    };
    // The overrides object nests, so try each opening brace from the right
    let mut candidate = Some(start);
    while let Some(pos) = candidate {
        if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(text[pos..].trim_end()) {
            if let Some(Value::Object(per_tool)) = obj.get("tool_params") {
                let overrides = per_tool
                    .iter()
                    .filter_map(|(tool, params)| match params {
                        Value::Object(p) => Some((tool.clone(), p.clone())),
                        _ => None,
                    })
                    .collect();
                return (text[..pos].trim_end(), overrides);
            }
        }
        candidate = text[..pos].rfind('{');
    }
    (text, HashMap::new())
}
