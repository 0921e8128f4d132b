//! In-memory run store

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::AgentError;
use crate::models::run::RunState;
use crate::store::RunStore;

struct Entry {
    json: String,
    updated_at: DateTime<Utc>,
    terminal: bool,
}

/// Run store holding serialized runs in memory
pub struct InMemoryRunStore {
    entries: RwLock<HashMap<String, Entry>>,
    capacity: usize,
}

impl InMemoryRunStore {
    /// Create a store that keeps at most `capacity` runs
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryRunStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn load(&self, run_id: &str) -> Result<Option<RunState>, AgentError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        match entries.get(run_id) {
            Some(entry) => Ok(Some(serde_json::from_str(&entry.json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, state: &RunState) -> Result<(), AgentError> {
        let json = serde_json::to_string(state)?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        // Evict the least recently updated finished run if at capacity; runs
        // still in progress must stay resumable
        if !entries.contains_key(&state.run_id) && entries.len() >= self.capacity {
            let oldest_id = entries
                .iter()
                .filter(|(_, e)| e.terminal)
                .min_by_key(|(_, e)| e.updated_at)
                .map(|(id, _)| id.clone());
            match oldest_id {
                Some(oldest_id) => {
                    debug!("Run store at capacity, evicting run {}", oldest_id);
                    entries.remove(&oldest_id);
                }
                None => {
                    warn!(
                        "Run store full of active runs, rejecting run {}",
                        state.run_id
                    );
                    return Err(AgentError::StorageError(format!(
                        "Run store is full: {} runs are still in progress",
                        entries.len()
                    )));
                }
            }
        }

        entries.insert(
            state.run_id.clone(),
            Entry {
                json,
                updated_at: state.updated_at,
                terminal: state.is_terminal(),
            },
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, AgentError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, run_id: &str) -> Result<bool, AgentError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Ok(entries.remove(run_id).is_some())
    }
}
