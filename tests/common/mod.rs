//! Shared fixtures: closure-backed tool catalogs

#![allow(dead_code)]

use parking_lot::Mutex;
use reconchain::gate::{DependencyGate, PathLookup};
use reconchain::tools::{ParamType, ParameterSpec, Params, ToolCatalog, ToolCategory, ToolDescriptor, ToolError};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Every executable is on PATH
pub struct AllInstalled;

impl PathLookup for AllInstalled {
    fn exists(&self, _program: &str) -> bool {
        true
    }
}

pub fn installed_gate() -> DependencyGate {
    DependencyGate::with_lookup(Arc::new(AllInstalled))
}

pub fn descriptor(name: &str, category: ToolCategory, required: &[&str]) -> ToolDescriptor {
    required.iter().fold(ToolDescriptor::new(name, "test tool", category), |t, p| {
        t.param(ParameterSpec::required(*p, ParamType::String))
    })
}

/// Invocation log shared with tool closures
#[derive(Default, Clone)]
pub struct Calls(Arc<Mutex<Vec<(String, Params)>>>);

impl Calls {
    pub fn count(&self, tool: &str) -> usize {
        self.0.lock().iter().filter(|(t, _)| t == tool).count()
    }

    pub fn params(&self, tool: &str) -> Option<Params> {
        self.0.lock().iter().find(|(t, _)| t == tool).map(|(_, p)| p.clone())
    }

    pub fn total(&self) -> usize {
        self.0.lock().len()
    }

    pub fn push(&self, tool: &str, params: &Params) {
        self.0.lock().push((tool.to_string(), params.clone()));
    }
}

/// Register a tool returning a fixed result and recording its calls
pub fn register_ok(
    catalog: &mut ToolCatalog,
    calls: &Calls,
    name: &str,
    category: ToolCategory,
    required: &[&str],
    result: Value,
) {
    let calls = calls.clone();
    let tool = name.to_string();
    catalog
        .register(descriptor(name, category, required), move |params: &Params| {
            calls.push(&tool, params);
            Ok(result.clone())
        })
        .unwrap();
}

/// Register a tool that always fails
pub fn register_failing(
    catalog: &mut ToolCatalog,
    calls: &Calls,
    name: &str,
    category: ToolCategory,
    required: &[&str],
) {
    let calls = calls.clone();
    let tool = name.to_string();
    catalog
        .register(descriptor(name, category, required), move |params: &Params| {
            calls.push(&tool, params);
            Err(ToolError::Execution(format!("{} exited with code 1", tool)))
        })
        .unwrap();
}

/// Tracks how many invocations overlap
#[derive(Default, Clone)]
pub struct Overlap {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Overlap {
    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
