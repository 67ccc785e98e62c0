//! Structured findings lifted from tool results
//!
//! Only a handful of well-known result fields are read; everything else in
//! a result stays opaque.

use crate::tools::types::{Params, ToolDescriptor};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

static CVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCVE-\d{4}-\d{4,}\b").expect("valid cve regex"));

/// Open port reported by a scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenPort {
    pub port: u16,
    pub service: Option<String>,
}

/// Findings a dependent node can consume
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Findings {
    pub open_ports: Vec<OpenPort>,
    pub subdomains: Vec<String>,
    pub urls: Vec<String>,
    pub vulnerabilities: Vec<String>,
    pub technologies: Vec<String>,
}

impl Findings {
    /// Read findings from a result, looking at the top level and under `findings`
    pub fn from_result(result: &Value) -> Self {
        let mut findings = Findings::default();
        findings.collect(result);
        if let Some(nested) = result.get("findings") {
            findings.collect(nested);
        }
        findings
    }

    fn collect(&mut self, value: &Value) {
        for item in array(value, "open_ports") {
            let port = match item {
                Value::Object(map) => map.get("port").and_then(as_port).map(|port| OpenPort {
                    port,
                    service: map.get("service").and_then(Value::as_str).map(str::to_string),
                }),
                other => as_port(other).map(|port| OpenPort {
                    port,
                    service: None,
                }),
            };
            if let Some(port) = port {
                self.open_ports.push(port);
            }
        }
        self.subdomains.extend(array(value, "subdomains").filter_map(label));
        self.urls.extend(array(value, "urls").filter_map(label));
        self.vulnerabilities
            .extend(array(value, "vulnerabilities").filter_map(vulnerability_label));
        self.technologies.extend(array(value, "technologies").filter_map(label));
    }

    pub fn is_empty(&self) -> bool {
        self.open_ports.is_empty()
            && self.subdomains.is_empty()
            && self.urls.is_empty()
            && self.vulnerabilities.is_empty()
            && self.technologies.is_empty()
    }

    /// Value for a parameter name, if these findings can supply one
    pub fn value_for(&self, param: &str) -> Option<Value> {
        match param {
            "ports" if !self.open_ports.is_empty() => Some(Value::String(
                self.open_ports
                    .iter()
                    .map(|p| p.port.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            )),
            "service" => self
                .open_ports
                .iter()
                .find_map(|p| p.service.clone())
                .map(Value::String),
            "targets" if !self.subdomains.is_empty() => Some(Value::Array(
                self.subdomains.iter().cloned().map(Value::String).collect(),
            )),
            "query" => self
                .vulnerabilities
                .first()
                .map(|v| CVE.find(v).map(|m| m.as_str().to_uppercase()).unwrap_or_else(|| v.clone()))
                .or_else(|| self.technologies.first().cloned())
                .map(Value::String),
            "url" => self.urls.first().cloned().map(Value::String),
            "urls" if !self.urls.is_empty() => Some(Value::Array(
                self.urls.iter().cloned().map(Value::String).collect(),
            )),
            _ => None,
        }
    }

    /// Fill the tool's declared but unbound params
    ///
    /// Returns the names that were bound.
    pub fn apply(&self, tool: &ToolDescriptor, params: &mut Params) -> Vec<String> {
        let mut bound = Vec::new();
        for spec in &tool.parameters {
            if params.contains_key(&spec.name) {
                continue;
            }
            if let Some(value) = self.value_for(&spec.name) {
                params.insert(spec.name.clone(), value);
                bound.push(spec.name.clone());
            }
        }
        bound
    }

    /// Short human-readable description
    pub fn describe(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.open_ports.is_empty() {
            let ports: Vec<String> = self
                .open_ports
                .iter()
                .map(|p| match &p.service {
                    Some(service) => format!("{}/{}", p.port, service),
                    None => p.port.to_string(),
                })
                .collect();
            parts.push(format!("{} open ports ({})", ports.len(), ports.join(", ")));
        }
        if !self.subdomains.is_empty() {
            parts.push(format!("{} subdomains", self.subdomains.len()));
        }
        if !self.urls.is_empty() {
            parts.push(format!("{} urls", self.urls.len()));
        }
        if !self.technologies.is_empty() {
            parts.push(format!("technologies: {}", self.technologies.join(", ")));
        }
        if !self.vulnerabilities.is_empty() {
            parts.push(format!("{} vulnerabilities", self.vulnerabilities.len()));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

fn array<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter())
        .into_iter()
        .flatten()
}

fn as_port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.split('/').next().and_then(|p| p.trim().parse().ok()),
        _ => None,
    }
}

fn label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn vulnerability_label(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => ["id", "name", "type"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        other => label(other),
    }
}
