//! Session store
//!
//! Sessions group the opaque result blobs recorded by chain runs and
//! inferred executions. The core only creates sessions and appends to them.

use crate::errors::{OrchestratorError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Session metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One recorded result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// What produced the record, e.g. `chain` or `chat`
    pub kind: String,
    pub recorded_at: DateTime<Utc>,
    pub data: Value,
}

/// Key-value store of result blobs keyed by session id
pub trait SessionStore: Send + Sync {
    /// Create a new session
    fn create(&self, name: &str) -> SessionInfo;

    fn get(&self, id: &str) -> Option<SessionInfo>;

    /// Append a result blob to an existing session
    fn add_result(&self, id: &str, kind: &str, data: Value) -> Result<()>;

    /// All results of a session, oldest first
    fn results(&self, id: &str) -> Result<Vec<SessionRecord>>;
}

struct SessionEntry {
    info: SessionInfo,
    records: Vec<SessionRecord>,
}

/// Process-local session store
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, name: &str) -> SessionInfo {
        let info = SessionInfo {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.sessions.write().insert(
            info.id.clone(),
            SessionEntry {
                info: info.clone(),
                records: Vec::new(),
            },
        );
        info
    }

    fn get(&self, id: &str) -> Option<SessionInfo> {
        self.sessions.read().get(id).map(|e| e.info.clone())
    }

    fn add_result(&self, id: &str, kind: &str, data: Value) -> Result<()> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::SessionNotFound(id.to_string()))?;
        entry.records.push(SessionRecord {
            kind: kind.to_string(),
            recorded_at: Utc::now(),
            data,
        });
        Ok(())
    }

    fn results(&self, id: &str) -> Result<Vec<SessionRecord>> {
        self.sessions
            .read()
            .get(id)
            .map(|e| e.records.clone())
            .ok_or_else(|| OrchestratorError::SessionNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_and_get() {
        let store = InMemorySessionStore::new();
        let info = store.create("engagement");
        assert_eq!(store.get(&info.id), Some(info.clone()));
        assert_eq!(store.len(), 1);
        assert_ne!(store.create("other").id, info.id);
    }

    #[test]
    fn test_results_in_order() {
        let store = InMemorySessionStore::new();
        let id = store.create("s").id;
        store.add_result(&id, "chain", json!({"n": 1})).unwrap();
        store.add_result(&id, "chat", json!({"n": 2})).unwrap();

        let records = store.results(&id).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, "chain");
        assert_eq!(records[1].data["n"], 2);
    }

    #[test]
    fn test_unknown_session() {
        let store = InMemorySessionStore::new();
        assert!(matches!(
            store.add_result("missing", "chain", json!({})),
            Err(OrchestratorError::SessionNotFound(_))
        ));
        assert!(store.results("missing").is_err());
        assert!(store.get("missing").is_none());
    }
}
