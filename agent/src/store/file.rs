//! File-backed run store: one `<run_id>.json` per run

use async_trait::async_trait;
use tracing::debug;

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::run::{validate_run_id, RunState};
use crate::store::RunStore;

const EXTENSION: &str = "json";

/// Run store writing each run atomically to its own file
pub struct FileRunStore {
    dir: Dir,
}

impl FileRunStore {
    pub fn new(dir: Dir) -> Self {
        Self { dir }
    }

    fn run_file(&self, run_id: &str) -> Result<File, AgentError> {
        validate_run_id(run_id)?;
        Ok(self.dir.file(&format!("{}.{}", run_id, EXTENSION)))
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn load(&self, run_id: &str) -> Result<Option<RunState>, AgentError> {
        let file = self.run_file(run_id)?;
        if !file.exists().await {
            return Ok(None);
        }
        let state = file.read_json::<RunState>().await.map_err(|e| {
            AgentError::StorageError(format!("Unable to read run {}: {}", run_id, e))
        })?;
        Ok(Some(state))
    }

    async fn save(&self, state: &RunState) -> Result<(), AgentError> {
        let file = self.run_file(&state.run_id)?;
        debug!("Persisting run {} to {}", state.run_id, file.path().display());
        file.write_json(state).await
    }

    async fn list(&self) -> Result<Vec<String>, AgentError> {
        let mut ids: Vec<String> = self
            .dir
            .list_files()
            .await?
            .into_iter()
            .filter(|path| path.extension().is_some_and(|ext| ext == EXTENSION))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, run_id: &str) -> Result<bool, AgentError> {
        let file = self.run_file(run_id)?;
        let existed = file.exists().await;
        file.delete().await?;
        Ok(existed)
    }
}
