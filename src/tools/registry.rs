//! Tool capability registry
//!
//! The core only reads from the registry: descriptors are looked up by name
//! and invocations are forwarded to the handler registered for that name.
//! Handlers are synchronous black boxes; the dispatcher moves them onto
//! blocking worker threads.

use crate::errors::{OrchestratorError, Result};
use crate::tools::types::{Params, ToolCategory, ToolDescriptor, ToolError};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Synchronous tool implementation
pub trait ToolHandler: Send + Sync {
    fn execute(
        &self,
        params: &Params,
        session_id: Option<&str>,
    ) -> std::result::Result<Value, ToolError>;
}

impl<F> ToolHandler for F
where
    F: Fn(&Params) -> std::result::Result<Value, ToolError> + Send + Sync,
{
    fn execute(
        &self,
        params: &Params,
        _session_id: Option<&str>,
    ) -> std::result::Result<Value, ToolError> {
        self(params)
    }
}

/// Registry boundary consumed by the orchestration core
pub trait ToolRegistry: Send + Sync {
    /// All registered descriptors, sorted by name
    fn list_tools(&self) -> Vec<Arc<ToolDescriptor>>;

    /// Descriptor for one tool
    fn get_tool(&self, name: &str) -> Option<Arc<ToolDescriptor>>;

    /// Invoke a tool synchronously
    fn execute(
        &self,
        name: &str,
        params: &Params,
        session_id: Option<&str>,
    ) -> std::result::Result<Value, ToolError>;

    /// Case-insensitive search over names and descriptions
    fn search_tools(&self, keyword: &str) -> Vec<Arc<ToolDescriptor>> {
        let needle = keyword.to_lowercase();
        self.list_tools()
            .into_iter()
            .filter(|t| {
                t.name.to_lowercase().contains(&needle)
                    || t.description.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Tool counts per category
    fn stats(&self) -> RegistryStats {
        let tools = self.list_tools();
        let mut by_category = BTreeMap::new();
        for tool in &tools {
            *by_category.entry(tool.category).or_insert(0) += 1;
        }
        RegistryStats {
            total: tools.len(),
            requires_root: tools.iter().filter(|t| t.requires_root).count(),
            by_category,
        }
    }
}

/// Registry summary
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub requires_root: usize,
    pub by_category: BTreeMap<ToolCategory, usize>,
}

struct CatalogEntry {
    descriptor: Arc<ToolDescriptor>,
    handler: Arc<dyn ToolHandler>,
}

/// In-process registry of descriptors and their handlers
///
/// Populated once at startup, then shared read-only behind an `Arc`.
#[derive(Default)]
pub struct ToolCatalog {
    tools: HashMap<String, CatalogEntry>,
}

impl ToolCatalog {
    /// Create empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names are unique
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: impl ToolHandler + 'static,
    ) -> Result<()> {
        self.register_shared(descriptor, Arc::new(handler))
    }

    /// Register a tool with an already shared handler
    pub fn register_shared(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<()> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(OrchestratorError::DuplicateTool(descriptor.name));
        }
        self.tools.insert(
            descriptor.name.clone(),
            CatalogEntry {
                descriptor: Arc::new(descriptor),
                handler,
            },
        );
        Ok(())
    }

    /// Check if tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get total number of tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if catalog is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolRegistry for ToolCatalog {
    fn list_tools(&self) -> Vec<Arc<ToolDescriptor>> {
        let mut tools: Vec<_> = self.tools.values().map(|e| e.descriptor.clone()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    fn get_tool(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        self.tools.get(name).map(|e| e.descriptor.clone())
    }

    fn execute(
        &self,
        name: &str,
        params: &Params,
        session_id: Option<&str>,
    ) -> std::result::Result<Value, ToolError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::Execution(format!("Unknown tool: {}", name)))?;
        entry.handler.execute(params, session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::types::{ParamType, ParameterSpec};
    use serde_json::json;

    fn echo_catalog() -> ToolCatalog {
        let mut catalog = ToolCatalog::new();
        catalog
            .register(
                ToolDescriptor::new("echo", "Echo params back", ToolCategory::Recon)
                    .param(ParameterSpec::required("target", ParamType::String)),
                |params: &Params| Ok(Value::Object(params.clone())),
            )
            .unwrap();
        catalog
            .register(
                ToolDescriptor::new("fail", "Always fails", ToolCategory::Exploit).root(),
                |_: &Params| Err(ToolError::Execution("boom".into())),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn test_register_and_lookup() {
        let catalog = echo_catalog();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("echo"));
        assert_eq!(catalog.get_tool("echo").unwrap().name, "echo");
        assert!(catalog.get_tool("missing").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut catalog = echo_catalog();
        let result = catalog.register(
            ToolDescriptor::new("echo", "again", ToolCategory::Recon),
            |_: &Params| Ok(json!({})),
        );
        assert!(matches!(result, Err(OrchestratorError::DuplicateTool(name)) if name == "echo"));
    }

    #[test]
    fn test_execute_routes_to_handler() {
        let catalog = echo_catalog();
        let mut params = Params::new();
        params.insert("target".into(), json!("10.0.0.1"));

        let out = catalog.execute("echo", &params, None).unwrap();
        assert_eq!(out["target"], "10.0.0.1");

        let err = catalog.execute("fail", &params, None).unwrap_err();
        assert_eq!(err, ToolError::Execution("boom".into()));

        assert!(catalog.execute("nope", &params, None).is_err());
    }

    #[test]
    fn test_list_tools_sorted() {
        let catalog = echo_catalog();
        let names: Vec<_> = catalog.list_tools().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["echo", "fail"]);
    }

    #[test]
    fn test_search_and_stats() {
        let catalog = echo_catalog();
        assert_eq!(catalog.search_tools("ECHO").len(), 1);
        assert_eq!(catalog.search_tools("always").len(), 1);

        let stats = catalog.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.requires_root, 1);
        assert_eq!(stats.by_category[&ToolCategory::Recon], 1);
    }
}
