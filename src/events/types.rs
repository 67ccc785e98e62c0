//! Event types and stream framing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// Execution status carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Running,
    Success,
    Error,
    Warning,
}

impl Status {
    /// Level used when the publisher does not pick one
    pub fn default_level(&self) -> Level {
        match self {
            Status::Running | Status::Success => Level::Info,
            Status::Warning => Level::Warning,
            Status::Error => Level::Error,
        }
    }
}

/// Stored execution event; immutable once appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub status: Status,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Event awaiting publication
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub timestamp: Option<DateTime<Utc>>,
    pub level: Level,
    pub status: Status,
    pub service: String,
    pub tool: Option<String>,
    pub params: Option<Value>,
    pub duration: Option<f64>,
    pub error: Option<String>,
    pub session_id: Option<String>,
}

impl NewEvent {
    pub fn new(service: impl Into<String>, status: Status) -> Self {
        Self {
            timestamp: None,
            level: status.default_level(),
            status,
            service: service.into(),
            tool: None,
            params: None,
            duration: None,
            error: None,
            session_id: None,
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn session(mut self, session_id: Option<&str>) -> Self {
        self.session_id = session_id.map(str::to_string);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub(crate) fn into_event(self, id: u64) -> Event {
        Event {
            id,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            level: self.level,
            status: self.status,
            service: self.service,
            tool: self.tool,
            params: self.params,
            duration: self.duration,
            error: self.error,
            session_id: self.session_id,
        }
    }
}

/// One item of a live subscription
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// First frame of every subscription
    Connected,
    Event(Event),
    /// Idle keep-alive after a quiet wait
    Heartbeat,
}

impl StreamFrame {
    /// Render as a server-sent-events frame
    pub fn to_sse(&self) -> String {
        match self {
            StreamFrame::Connected => ": connected\n\n".to_string(),
            StreamFrame::Event(event) => {
                format!("data: {}\n\n", serde_json::to_string(event).unwrap_or_default())
            }
            StreamFrame::Heartbeat => ": ping\n\n".to_string(),
        }
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            StreamFrame::Event(event) => Some(event),
            _ => None,
        }
    }
}
