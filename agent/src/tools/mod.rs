//! Tool gateway: uniform access to the CI, deploy and metrics backends
//!
//! Every operation returns a [`ToolResult`]; backends never surface errors
//! any other way. The gateway does not retry or time out on its own behalf,
//! the orchestrator owns both policies.

pub mod simulated;
pub mod static_site;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::plan::Strategy;
use crate::models::run::StaticSiteParams;

/// Result of a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResult {
    Success { fields: Map<String, Value> },
    Failure { error: String },
}

impl ToolResult {
    pub fn success(fields: Map<String, Value>) -> Self {
        ToolResult::Success { fields }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ToolResult::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    /// String field of a successful result
    pub fn field_str(&self, key: &str) -> Option<&str> {
        match self {
            ToolResult::Success { fields } => fields.get(key).and_then(Value::as_str),
            ToolResult::Failure { .. } => None,
        }
    }
}

/// External deployment backends
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Trigger a CI pipeline stage; success carries `build_id`
    async fn trigger_ci_pipeline(&self, service_id: &str, step_name: &str) -> ToolResult;

    /// Roll out a version to Kubernetes; success carries `rollout_id` and `message`
    async fn deploy_to_k8s(&self, service_id: &str, version: &str, strategy: Strategy)
        -> ToolResult;

    /// Build and publish a static site
    async fn deploy_static_site(&self, params: &StaticSiteParams) -> ToolResult;

    /// Read rollout metrics; success carries the `MetricsSnapshot` fields
    async fn fetch_metrics(&self, service_id: &str, window_minutes: u32) -> ToolResult;

    /// Shift a rollout to full traffic
    async fn promote_rollout(&self, service_id: &str, rollout_id: &str) -> ToolResult;

    /// Revert to the previous stable version
    async fn rollback_deployment(
        &self,
        service_id: &str,
        rollout_id: &str,
        reason: &str,
    ) -> ToolResult;
}

/// A single gateway invocation with its arguments
#[derive(Debug, Clone)]
pub enum ToolCall<'a> {
    TriggerCiPipeline {
        service_id: &'a str,
        step_name: &'a str,
    },
    DeployToK8s {
        service_id: &'a str,
        version: &'a str,
        strategy: Strategy,
    },
    DeployStaticSite {
        params: &'a StaticSiteParams,
    },
    FetchMetrics {
        service_id: &'a str,
        window_minutes: u32,
    },
    PromoteRollout {
        service_id: &'a str,
        rollout_id: &'a str,
    },
    RollbackDeployment {
        service_id: &'a str,
        rollout_id: &'a str,
        reason: &'a str,
    },
}

impl ToolCall<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::TriggerCiPipeline { .. } => "trigger_ci_pipeline",
            ToolCall::DeployToK8s { .. } => "deploy_to_k8s",
            ToolCall::DeployStaticSite { .. } => "deploy_static_site",
            ToolCall::FetchMetrics { .. } => "fetch_metrics",
            ToolCall::PromoteRollout { .. } => "promote_rollout",
            ToolCall::RollbackDeployment { .. } => "rollback_deployment",
        }
    }

    /// Dispatch the call to a gateway
    pub async fn invoke(&self, gateway: &dyn ToolGateway) -> ToolResult {
        match *self {
            ToolCall::TriggerCiPipeline {
                service_id,
                step_name,
            } => gateway.trigger_ci_pipeline(service_id, step_name).await,
            ToolCall::DeployToK8s {
                service_id,
                version,
                strategy,
            } => gateway.deploy_to_k8s(service_id, version, strategy).await,
            ToolCall::DeployStaticSite { params } => gateway.deploy_static_site(params).await,
            ToolCall::FetchMetrics {
                service_id,
                window_minutes,
            } => gateway.fetch_metrics(service_id, window_minutes).await,
            ToolCall::PromoteRollout {
                service_id,
                rollout_id,
            } => gateway.promote_rollout(service_id, rollout_id).await,
            ToolCall::RollbackDeployment {
                service_id,
                rollout_id,
                reason,
            } => {
                gateway
                    .rollback_deployment(service_id, rollout_id, reason)
                    .await
            }
        }
    }
}
