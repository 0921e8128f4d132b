//! Deployment run state

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::{RunEvent, RunStatus};
use crate::errors::AgentError;
use crate::models::plan::{DeploymentPlan, DeploymentStep, Strategy};

const MAX_RUN_ID_LEN: usize = 128;

/// Check that a run id is usable as a store key and file name
pub fn validate_run_id(run_id: &str) -> Result<(), AgentError> {
    if run_id.is_empty() || run_id.len() > MAX_RUN_ID_LEN {
        return Err(AgentError::ValidationError(format!(
            "run_id must be 1..={} characters",
            MAX_RUN_ID_LEN
        )));
    }
    if run_id == "." || run_id == ".." {
        return Err(AgentError::ValidationError(format!(
            "Invalid run_id: {}",
            run_id
        )));
    }
    if !run_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(AgentError::ValidationError(format!(
            "run_id may only contain [A-Za-z0-9._-]: {}",
            run_id
        )));
    }
    Ok(())
}

/// Parameters passed through to the static-site deploy backend
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticSiteParams {
    pub repo_url: String,
    pub app_name: String,
    pub branch: String,
    pub output_dir: String,
    pub build_command: String,
    pub github_token: String,
}

impl StaticSiteParams {
    /// Fill unset fields with the agent defaults
    pub fn with_defaults(
        service_id: &str,
        repo_url: Option<String>,
        app_name: Option<String>,
        branch: Option<String>,
        output_dir: Option<String>,
        build_command: Option<String>,
        github_token: Option<String>,
    ) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            repo_url: repo_url.unwrap_or_default(),
            app_name: non_empty(app_name).unwrap_or_else(|| service_id.to_string()),
            branch: non_empty(branch).unwrap_or_else(|| "main".to_string()),
            output_dir: non_empty(output_dir).unwrap_or_else(|| "dist".to_string()),
            build_command: non_empty(build_command).unwrap_or_else(|| "npm run build".to_string()),
            github_token: github_token.unwrap_or_default(),
        }
    }
}

impl fmt::Debug for StaticSiteParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSiteParams")
            .field("repo_url", &self.repo_url)
            .field("app_name", &self.app_name)
            .field("branch", &self.branch)
            .field("output_dir", &self.output_dir)
            .field("build_command", &self.build_command)
            .field(
                "github_token",
                &if self.github_token.is_empty() { "" } else { "<redacted>" },
            )
            .finish()
    }
}

/// Request to create or resume a run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_id: String,
    pub service_id: String,
    pub strategy: Strategy,
    pub message: String,
    pub version: Option<String>,
    pub rerun: bool,
    pub static_site: StaticSiteParams,
}

/// Full orchestration state of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub service_id: String,
    pub strategy: Strategy,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub version: Option<String>,
    pub plan: Option<DeploymentPlan>,
    pub current_step_index: usize,
    pub status: RunStatus,
    pub rollout_id: Option<String>,
    pub static_site: StaticSiteParams,
    /// Append-only event log
    pub log: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    /// Create a new run in the planning state
    pub fn new(request: RunRequest) -> Self {
        let now = Utc::now();
        let mut state = Self {
            run_id: request.run_id,
            service_id: request.service_id,
            strategy: request.strategy,
            message: request.message,
            version: request.version,
            plan: None,
            current_step_index: 0,
            status: RunStatus::Planning,
            rollout_id: None,
            static_site: request.static_site,
            log: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state.record(format!(
            "Deploy service '{}' using '{}' strategy. Note: {}",
            state.service_id, state.strategy, state.message
        ));
        state
    }

    /// Append a timestamped entry to the run log
    pub fn record(&mut self, entry: impl AsRef<str>) {
        self.log.push(format!(
            "[{}] {}",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            entry.as_ref()
        ));
    }

    /// Apply a state machine event
    pub fn apply(&mut self, event: RunEvent) -> Result<(), AgentError> {
        let next = self
            .status
            .next(&event)
            .map_err(AgentError::TransitionError)?;
        self.status = next;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn current_step(&self) -> Option<&DeploymentStep> {
        self.plan
            .as_ref()
            .and_then(|plan| plan.steps.get(self.current_step_index))
    }

    pub fn current_step_mut(&mut self) -> Option<&mut DeploymentStep> {
        let idx = self.current_step_index;
        self.plan.as_mut().and_then(|plan| plan.steps.get_mut(idx))
    }

    /// Reset a finished run so it is planned and executed again
    pub fn restart(&mut self, request: RunRequest) -> Result<(), AgentError> {
        self.apply(RunEvent::Restart)?;
        self.strategy = request.strategy;
        self.message = request.message;
        self.version = request.version;
        self.static_site = request.static_site;
        self.plan = None;
        self.current_step_index = 0;
        self.rollout_id = None;
        self.record(format!(
            "Re-running deployment of '{}' using '{}' strategy. Note: {}",
            self.service_id, self.strategy, self.message
        ));
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
