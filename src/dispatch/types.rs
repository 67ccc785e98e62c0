//! Request and report shapes for the dispatcher

use crate::target::TargetDescriptor;
use crate::tools::types::{Params, ToolError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Statuses counted as errors in a batch report
pub const ERROR_STATUSES: [&str; 3] = ["error", "timeout", "connection_error"];

/// Status counted as a finding in a batch report
pub const FOUND_STATUS: &str = "found";

/// One planned tool call
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub tool: String,
    pub params: Params,
}

impl Invocation {
    pub fn new(tool: impl Into<String>, params: Params) -> Self {
        Self {
            tool: tool.into(),
            params,
        }
    }
}

/// Outcome of one tool call
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResponse {
    pub success: bool,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds
    pub duration: f64,
    #[serde(skip)]
    pub failure: Option<ToolError>,
}

impl ExecutionResponse {
    pub(crate) fn from_outcome(tool: &str, outcome: Result<Value, ToolError>, duration: f64) -> Self {
        match outcome {
            Ok(value) => Self {
                success: true,
                tool: tool.to_string(),
                result: Some(value),
                error: None,
                duration,
                failure: None,
            },
            Err(err) => Self {
                success: false,
                tool: tool.to_string(),
                result: None,
                error: Some(err.to_string()),
                duration,
                failure: Some(err),
            },
        }
    }

    /// Batch status for this outcome
    ///
    /// Successful results report their own `status` field when present.
    pub fn status(&self) -> String {
        match (&self.result, &self.failure) {
            (_, Some(err)) => err.status().to_string(),
            (Some(value), None) => value
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("completed")
                .to_string(),
            (None, None) => "error".to_string(),
        }
    }
}

/// Same tool over many targets
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    pub targets: Vec<String>,
    pub tool: String,
    /// Params shared by every target
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub max_workers: Option<usize>,
}

impl BatchRequest {
    pub fn new(tool: impl Into<String>, targets: Vec<String>) -> Self {
        Self {
            targets,
            tool: tool.into(),
            ..Self::default()
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Per-target batch outcome
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub url: String,
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchEntry {
    pub(crate) fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            status: "error".to_string(),
            result: None,
            error: Some(error.into()),
        }
    }

    pub(crate) fn from_response(url: &str, response: ExecutionResponse) -> Self {
        Self {
            url: url.to_string(),
            success: response.success,
            status: response.status(),
            result: response.result,
            error: response.error,
        }
    }
}

/// Aggregated batch outcome; one entry per target
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub success: bool,
    pub total: usize,
    pub found: usize,
    pub errors: usize,
    pub results: Vec<BatchEntry>,
}

impl BatchReport {
    pub(crate) fn from_entries(results: Vec<BatchEntry>) -> Self {
        let found = results.iter().filter(|e| e.status == FOUND_STATUS).count();
        let errors = results
            .iter()
            .filter(|e| ERROR_STATUSES.contains(&e.status.as_str()))
            .count();
        Self {
            success: true,
            total: results.len(),
            found,
            errors,
            results,
        }
    }
}

/// Per-tool outcome of an inferred execution
#[derive(Debug, Clone, Serialize)]
pub struct InferEntry {
    pub tool: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl InferEntry {
    pub(crate) fn rejected(tool: &str, error: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            success: false,
            params: None,
            result: None,
            error: Some(error.into()),
            duration: None,
        }
    }

    pub(crate) fn from_response(params: Params, response: ExecutionResponse) -> Self {
        Self {
            tool: response.tool,
            success: response.success,
            params: Some(params),
            result: response.result,
            error: response.error,
            duration: Some(response.duration),
        }
    }
}

/// Outcome of inferring and executing several tools from free text
#[derive(Debug, Clone, Serialize)]
pub struct InferReport {
    pub target: TargetDescriptor,
    pub results: Vec<InferEntry>,
}
