//! Command-line tool wrapper
//!
//! Renders an argv from bound params, runs the executable directly (no
//! shell), enforces a per-call timeout and lifts the few findings the chain
//! engine consumes out of line-oriented output.
//!
//! Handlers are called on blocking workers, so the async child process is
//! driven with the ambient runtime's `block_on`. Outside a runtime a
//! throwaway current-thread runtime is built instead.

use crate::tools::registry::ToolHandler;
use crate::tools::types::{Params, ToolError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::runtime::{Builder, Handle};
use tokio::time::timeout;

/// Maximum bytes of stdout kept in a result
const MAX_OUTPUT_BYTES: usize = 512 * 1024;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("valid placeholder regex"));

static OPEN_PORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\d+)/(tcp|udp)\s+open\s+(\S+)").expect("valid port regex"));

/// One argv element
#[derive(Debug, Clone)]
pub enum ArgSpec {
    /// Emitted verbatim
    Literal(&'static str),
    /// Value of a param; the call fails if unbound
    Param(&'static str),
    /// Flag followed by a param value, emitted only when bound
    Flag(&'static str, &'static str),
    /// Single argument with `{param}` placeholders substituted
    Format(&'static str),
}

/// How stdout is turned into structured findings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Text,
    /// `PORT/PROTO open SERVICE` rows become `open_ports`
    Ports,
    /// Each non-empty line becomes an entry of the named field
    Lines(&'static str),
}

/// Wrapper around one external executable
#[derive(Debug, Clone)]
pub struct CommandTool {
    program: String,
    args: Vec<ArgSpec>,
    output: OutputKind,
    timeout: Duration,
}

impl CommandTool {
    pub fn new(program: impl Into<String>, args: Vec<ArgSpec>) -> Self {
        Self {
            program: program.into(),
            args,
            output: OutputKind::Text,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_output(mut self, output: OutputKind) -> Self {
        self.output = output;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build argv from params
    pub fn render_args(&self, params: &Params) -> Result<Vec<String>, ToolError> {
        let mut argv = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            match arg {
                ArgSpec::Literal(s) => argv.push((*s).to_string()),
                ArgSpec::Param(name) => {
                    let value = params
                        .get(*name)
                        .and_then(render_value)
                        .ok_or_else(|| ToolError::InvalidParams(format!("missing {}", name)))?;
                    argv.push(value);
                }
                ArgSpec::Flag(flag, name) => {
                    if let Some(value) = params.get(*name).and_then(render_value) {
                        argv.push((*flag).to_string());
                        argv.push(value);
                    }
                }
                ArgSpec::Format(template) => argv.push(render_template(template, params)?),
            }
        }
        Ok(argv)
    }

    fn run(&self, argv: &[String]) -> Result<Value, ToolError> {
        match Handle::try_current() {
            Ok(handle) => handle.block_on(self.run_async(argv)),
            Err(_) => Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| ToolError::Execution(format!("Failed to start runtime: {}", e)))?
                .block_on(self.run_async(argv)),
        }
    }

    async fn run_async(&self, argv: &[String]) -> Result<Value, ToolError> {
        let start = Instant::now();
        let mut cmd = Command::new(&self.program);
        cmd.args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Dropping the pending output on timeout kills the child
        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::NotInstalled(self.program.clone()))
            }
            Ok(Err(e)) => {
                return Err(ToolError::Execution(format!(
                    "Failed to start {}: {}",
                    self.program, e
                )))
            }
            Err(_) => return Err(ToolError::Timeout(self.timeout.as_secs())),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            let detail = stderr.lines().next().unwrap_or("").trim();
            return Err(ToolError::Execution(format!(
                "{} exited with code {}{}",
                self.program,
                exit_code,
                if detail.is_empty() { String::new() } else { format!(": {}", detail) }
            )));
        }

        let mut result = json!({
            "status": "completed",
            "exit_code": exit_code,
            "duration_ms": start.elapsed().as_millis() as u64,
            "stdout": truncate(&stdout),
        });
        if let Value::Object(map) = &mut result {
            for (key, value) in parse_findings(self.output, &stdout) {
                map.insert(key, value);
            }
        }
        Ok(result)
    }
}

impl ToolHandler for CommandTool {
    fn execute(&self, params: &Params, _session_id: Option<&str>) -> Result<Value, ToolError> {
        let argv = self.render_args(params)?;
        self.run(&argv)
    }
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(render_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

fn render_template(template: &str, params: &Params) -> Result<String, ToolError> {
    let mut missing = None;
    let rendered = PLACEHOLDER.replace_all(template, |cap: &regex::Captures<'_>| {
        match params.get(&cap[1]).and_then(render_value) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| cap[1].to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(ToolError::InvalidParams(format!("missing {}", name))),
        None => Ok(rendered.into_owned()),
    }
}

fn truncate(s: &str) -> String {
    if s.len() <= MAX_OUTPUT_BYTES {
        return s.to_string();
    }
    let mut end = MAX_OUTPUT_BYTES;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Extract structured findings from raw output
pub fn parse_findings(kind: OutputKind, stdout: &str) -> Vec<(String, Value)> {
    match kind {
        OutputKind::Text => Vec::new(),
        OutputKind::Ports => {
            let ports: Vec<Value> = OPEN_PORT
                .captures_iter(stdout)
                .filter_map(|cap| {
                    let port: u16 = cap[1].parse().ok()?;
                    Some(json!({
                        "port": port,
                        "protocol": &cap[2],
                        "service": &cap[3],
                    }))
                })
                .collect();
            vec![("open_ports".to_string(), Value::Array(ports))]
        }
        OutputKind::Lines(field) => {
            let lines: Vec<Value> = stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| Value::String(l.to_string()))
                .collect();
            vec![(field.to_string(), Value::Array(lines))]
        }
    }
}
