//! Agent API models

use serde::{Deserialize, Serialize};

/// Body of `POST /deploy`
///
/// Unknown fields are ignored. Optional static-site fields fall back to the
/// agent defaults when absent or null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub service_id: String,

    #[serde(default, alias = "thread_id")]
    pub run_id: Option<String>,

    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default = "default_message")]
    pub message: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub rerun: bool,

    // Static site params
    #[serde(default)]
    pub github_token: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub build_command: Option<String>,
}

fn default_strategy() -> String {
    "canary".to_string()
}

fn default_message() -> String {
    "Deploying new version".to_string()
}

/// Response of `POST /deploy` and `GET /deploy/{run_id}/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse {
    pub run_id: String,
    pub status: String,
    pub plan: Option<PlanView>,
    pub current_step_index: Option<usize>,
    pub rollout_id: Option<String>,
    pub log: Vec<String>,
}

/// Deployment plan as exposed over the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanView {
    pub service_id: String,
    pub strategy: String,
    pub steps: Vec<StepView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepView {
    pub name: String,
    pub description: String,
    pub status: String,
}

/// Known runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunListResponse {
    pub runs: Vec<String>,
    pub total: usize,
}

/// Static message response (liveness)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
