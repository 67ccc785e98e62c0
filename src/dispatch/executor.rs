//! Semaphore-bounded dispatcher
//!
//! Every tool call runs on a blocking worker via `spawn_blocking`. A panic
//! inside a tool surfaces as a `JoinError` and is reported like any other
//! failure; nothing is retried.

use crate::dispatch::types::{
    BatchEntry, BatchReport, BatchRequest, ExecutionResponse, InferEntry, InferReport, Invocation,
};
use crate::errors::{OrchestratorError, Result};
use crate::events::{EventBus, Level, NewEvent, Status};
use crate::target::{bind, extract_target, infer_for_target, TargetDescriptor, TargetKind};
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{Params, ToolError};
use futures_util::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Default worker pool size
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Dispatcher for tool invocations
pub struct Dispatcher {
    registry: Arc<dyn ToolRegistry>,
    bus: Arc<EventBus>,
    max_workers: usize,
}

impl Dispatcher {
    /// Create new dispatcher with the default pool size
    pub fn new(registry: Arc<dyn ToolRegistry>, bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            bus,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<dyn ToolRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Execute one tool, publishing RUNNING then SUCCESS or ERROR
    ///
    /// Unknown tools are a caller error. Tool failures are returned as an
    /// unsuccessful response.
    pub async fn execute(
        &self,
        tool: &str,
        params: Params,
        session_id: Option<&str>,
    ) -> Result<ExecutionResponse> {
        if self.registry.get_tool(tool).is_none() {
            return Err(OrchestratorError::UnknownTool(tool.to_string()));
        }
        Ok(self.invoke("/execute", tool, params, session_id).await)
    }

    /// Run one invocation under the given service name
    pub async fn invoke(
        &self,
        service: &str,
        tool: &str,
        params: Params,
        session_id: Option<&str>,
    ) -> ExecutionResponse {
        self.bus.publish(
            NewEvent::new(service, Status::Running)
                .tool(tool)
                .params(Value::Object(params.clone()))
                .session(session_id),
        );

        let start = Instant::now();
        let outcome = run_blocking(&self.registry, tool, params.clone(), session_id).await;
        let duration = start.elapsed().as_secs_f64();

        match &outcome {
            Ok(_) => {
                debug!(tool, service, duration, "tool succeeded");
                self.bus.publish(
                    NewEvent::new(service, Status::Success)
                        .tool(tool)
                        .params(Value::Object(params))
                        .duration(duration)
                        .session(session_id),
                );
            }
            Err(err) => {
                let level = match err {
                    ToolError::InvalidParams(_) => Level::Warning,
                    _ => Level::Error,
                };
                warn!(tool, service, error = %err, "tool failed");
                self.bus.publish(
                    NewEvent::new(service, Status::Error)
                        .level(level)
                        .tool(tool)
                        .params(Value::Object(params))
                        .duration(duration)
                        .error(err.to_string())
                        .session(session_id),
                );
            }
        }

        ExecutionResponse::from_outcome(tool, outcome, duration)
    }

    /// Run invocations concurrently, at most `max_workers` at a time
    ///
    /// Responses come back in input order.
    pub async fn run_many(
        &self,
        service: &str,
        invocations: Vec<Invocation>,
        max_workers: usize,
        session_id: Option<&str>,
    ) -> Vec<ExecutionResponse> {
        let semaphore = Semaphore::new(max_workers.max(1));
        let units = invocations.into_iter().map(|inv| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.ok();
                self.invoke(service, &inv.tool, inv.params, session_id).await
            }
        });
        join_all(units).await
    }

    /// Run one tool against many targets
    ///
    /// Produces exactly one entry per target. Binding failures and tool
    /// failures, panics included, become `success: false` entries.
    pub async fn run_batch(&self, request: BatchRequest) -> Result<BatchReport> {
        let descriptor = self
            .registry
            .get_tool(&request.tool)
            .ok_or_else(|| OrchestratorError::UnknownTool(request.tool.clone()))?;
        let max_workers = request.max_workers.unwrap_or(self.max_workers).max(1);
        info!(
            tool = %request.tool,
            targets = request.targets.len(),
            max_workers,
            "starting batch"
        );

        let semaphore = Semaphore::new(max_workers);
        let units = request.targets.iter().map(|url| {
            let semaphore = &semaphore;
            let descriptor = &descriptor;
            let shared = &request.params;
            async move {
                let binding = bind(descriptor, &batch_target(url), shared);
                if !binding.is_complete() {
                    let err = OrchestratorError::MissingRequiredParameter {
                        tool: descriptor.name.clone(),
                        missing: binding.missing,
                    };
                    return BatchEntry::failed(url, err.to_string());
                }

                let _permit = semaphore.acquire().await.ok();
                let start = Instant::now();
                let outcome = run_blocking(&self.registry, &descriptor.name, binding.params, None).await;
                let response = ExecutionResponse::from_outcome(
                    &descriptor.name,
                    outcome,
                    start.elapsed().as_secs_f64(),
                );
                BatchEntry::from_response(url, response)
            }
        });

        let report = BatchReport::from_entries(join_all(units).await);
        info!(
            tool = %request.tool,
            total = report.total,
            found = report.found,
            errors = report.errors,
            "batch finished"
        );
        Ok(report)
    }

    /// Infer params for each tool from free text and run them
    ///
    /// A tool that is unknown or cannot be bound yields a failed entry and
    /// a WARNING event; the remaining tools still run. Entries follow the
    /// order of `tools`.
    pub async fn infer_and_execute(
        &self,
        tools: &[String],
        text: &str,
        overrides: &HashMap<String, Params>,
        session_id: Option<&str>,
    ) -> InferReport {
        const SERVICE: &str = "/chat.tool";
        let target = extract_target(text);
        let empty = Params::new();

        let mut entries: Vec<Option<InferEntry>> = Vec::with_capacity(tools.len());
        let mut planned = Vec::new();
        for (index, name) in tools.iter().enumerate() {
            let bound = self
                .registry
                .get_tool(name)
                .ok_or_else(|| OrchestratorError::UnknownTool(name.clone()))
                .and_then(|tool| {
                    infer_for_target(&tool, &target, overrides.get(name).unwrap_or(&empty))
                });
            match bound {
                Ok(params) => {
                    planned.push((index, params));
                    entries.push(None);
                }
                Err(err) => {
                    self.bus.publish(
                        NewEvent::new(SERVICE, Status::Warning)
                            .tool(name.as_str())
                            .error(err.to_string())
                            .session(session_id),
                    );
                    entries.push(Some(InferEntry::rejected(name, err.to_string())));
                }
            }
        }

        let invocations = planned
            .iter()
            .map(|(index, params)| Invocation::new(tools[*index].clone(), params.clone()))
            .collect();
        let responses = self
            .run_many(SERVICE, invocations, self.max_workers, session_id)
            .await;
        for ((index, params), response) in planned.into_iter().zip(responses) {
            entries[index] = Some(InferEntry::from_response(params, response));
        }

        InferReport {
            target,
            results: entries.into_iter().flatten().collect(),
        }
    }
}

/// Target descriptor for one batch entry; unparseable input is used verbatim
fn batch_target(raw: &str) -> TargetDescriptor {
    let target = extract_target(raw);
    if target.is_unknown() {
        TargetDescriptor::new(TargetKind::Unknown, raw.trim())
    } else {
        target
    }
}

async fn run_blocking(
    registry: &Arc<dyn ToolRegistry>,
    tool: &str,
    params: Params,
    session_id: Option<&str>,
) -> std::result::Result<Value, ToolError> {
    let registry = Arc::clone(registry);
    let tool = tool.to_string();
    let session_id = session_id.map(str::to_string);
    let task = tokio::task::spawn_blocking(move || {
        registry.execute(&tool, &params, session_id.as_deref())
    });
    match task.await {
        Ok(outcome) => outcome,
        Err(join_err) if join_err.is_panic() => {
            Err(ToolError::Execution("tool panicked during execution".to_string()))
        }
        Err(join_err) => Err(ToolError::Execution(join_err.to_string())),
    }
}
