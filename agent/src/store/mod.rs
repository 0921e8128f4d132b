//! Run persistence
//!
//! Runs are keyed by `run_id` and stored as serialized `RunState` JSON.

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::errors::AgentError;
use crate::models::run::RunState;

pub use file::FileRunStore;
pub use memory::InMemoryRunStore;

/// Keyed persistence of run state
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Load a run; `None` if it was never saved
    async fn load(&self, run_id: &str) -> Result<Option<RunState>, AgentError>;

    /// Insert or replace a run
    async fn save(&self, state: &RunState) -> Result<(), AgentError>;

    /// All known run ids, sorted
    async fn list(&self) -> Result<Vec<String>, AgentError>;

    /// Remove a run; returns whether it existed
    async fn delete(&self, run_id: &str) -> Result<bool, AgentError>;
}
