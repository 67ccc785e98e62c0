//! Tool capability types
//!
//! Descriptors, parameter schemas, and the failure taxonomy shared by all
//! tool wrappers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Bound tool arguments
pub type Params = Map<String, Value>;

/// Tool category, ordered by how early it belongs in an engagement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Recon,
    VulnScan,
    WebAttack,
    NetworkAttack,
    Exploit,
    Cloud,
    Other,
}

impl ToolCategory {
    /// Ranking used for advisory ordering: recon > vuln-scan > attack > exploit
    pub fn priority(&self) -> u8 {
        match self {
            ToolCategory::Recon => 0,
            ToolCategory::VulnScan => 1,
            ToolCategory::WebAttack | ToolCategory::NetworkAttack | ToolCategory::Cloud => 2,
            ToolCategory::Exploit => 3,
            ToolCategory::Other => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Recon => "recon",
            ToolCategory::VulnScan => "vuln_scan",
            ToolCategory::WebAttack => "web_attack",
            ToolCategory::NetworkAttack => "network_attack",
            ToolCategory::Exploit => "exploit",
            ToolCategory::Cloud => "cloud",
            ToolCategory::Other => "other",
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared parameter value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

/// One entry in a tool's parameter schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSpec {
    /// Required parameter without default
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            default: None,
        }
    }

    /// Optional parameter without default
    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default: None,
        }
    }

    /// Attach a default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Declared capability of one external tool
///
/// Immutable once registered; registries hand out shared references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub parameters: Vec<ParameterSpec>,
    pub requires_root: bool,
}

impl ToolDescriptor {
    /// Create new descriptor with no parameters
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ToolCategory,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            parameters: Vec::new(),
            requires_root: false,
        }
    }

    /// Append a parameter spec
    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// Mark as needing root privileges
    pub fn root(mut self) -> Self {
        self.requires_root = true;
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.iter().filter(|p| p.required)
    }
}

/// Failure reported by a tool wrapper
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Executable not installed: {0}")]
    NotInstalled(String),

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    /// Batch status string for this failure
    pub fn status(&self) -> &'static str {
        match self {
            ToolError::Timeout(_) => "timeout",
            ToolError::Connection(_) => "connection_error",
            _ => "error",
        }
    }
}
