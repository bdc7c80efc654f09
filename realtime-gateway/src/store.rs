// realtime-gateway/src/store.rs
use async_trait::async_trait;
use common::{SessionIdentifier, SessionRecord, StoreError};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Read access to the session store owned by the HTTP session subsystem.
///
/// `Ok(None)` means the lookup worked and there is no such session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &SessionIdentifier) -> Result<Option<SessionRecord>, StoreError>;
}

/// In-process session store, used for development and tests
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, record: SessionRecord) {
        self.sessions.insert(id.into(), record);
    }

    pub fn remove(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.remove(id).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Load sessions from a JSON object of `{ "<session id>": { ...record } }`
    pub fn load_seed_file(&self, path: &Path) -> Result<usize, StoreError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        self.load_seed_json(&contents)
    }

    pub fn load_seed_json(&self, contents: &str) -> Result<usize, StoreError> {
        let entries: HashMap<String, Value> = serde_json::from_str(contents)
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        let mut loaded = 0;
        for (id, value) in entries {
            match SessionRecord::from_value(value) {
                Some(record) => {
                    self.sessions.insert(id, record);
                    loaded += 1;
                }
                None => tracing::warn!("Skipping seeded session {}: record is not an object", id),
            }
        }

        Ok(loaded)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionIdentifier) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.sessions.get(id.as_str()).map(|entry| entry.value().clone()))
    }
}
