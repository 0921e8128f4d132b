//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use openapi_server::models::{
    DeployRequest, DeployResponse, HealthResponse, MessageResponse, PlanView, RunListResponse,
    StepView, VersionResponse,
};
use tracing::info;

use crate::models::plan::Strategy;
use crate::models::run::{validate_run_id, RunRequest, RunState, StaticSiteParams};
use crate::server::error::{ApiError, ApiResult};
use crate::server::state::ServerState;
use crate::utils::{generate_uuid, version_info};

/// Liveness probe
pub async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Kube-Garden Deployment Agent is running".to_string(),
    })
}

/// Health check handler
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "kgarden".to_string(),
        version: version_info().version,
    })
}

/// Version handler
pub async fn version_handler() -> Json<VersionResponse> {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Create or resume a run and drive it
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<DeployRequest>,
) -> ApiResult<Json<DeployResponse>> {
    let request = to_run_request(body)?;
    info!(
        "Deploy requested: run {} for service {}",
        request.run_id, request.service_id
    );

    let run_id = request.run_id.clone();
    state.orchestrator.submit(request).await?;
    let run = state.orchestrator.drive(&run_id).await?;

    Ok(Json(to_response(&run)))
}

/// Persisted status of a run
pub async fn status_handler(
    State(state): State<Arc<ServerState>>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<DeployResponse>> {
    validate_run_id(&run_id).map_err(|_| ApiError::NotFound("Deployment not found".into()))?;
    let run = state.orchestrator.status(&run_id).await?;
    Ok(Json(to_response(&run)))
}

/// Known run ids
pub async fn runs_handler(
    State(state): State<Arc<ServerState>>,
) -> ApiResult<Json<RunListResponse>> {
    let runs = state.orchestrator.store().list().await?;
    let total = runs.len();
    Ok(Json(RunListResponse { runs, total }))
}

fn to_run_request(body: DeployRequest) -> Result<RunRequest, ApiError> {
    if body.service_id.trim().is_empty() {
        return Err(ApiError::BadRequest("service_id is required".to_string()));
    }

    let run_id = body.run_id.unwrap_or_else(generate_uuid);
    validate_run_id(&run_id)?;

    let strategy: Strategy = body.strategy.parse().map_err(ApiError::BadRequest)?;

    let static_site = StaticSiteParams::with_defaults(
        &body.service_id,
        body.repo_url,
        body.app_name,
        body.branch,
        body.output_dir,
        body.build_command,
        body.github_token,
    );

    Ok(RunRequest {
        run_id,
        service_id: body.service_id,
        strategy,
        message: body.message,
        version: body.version.filter(|v| !v.is_empty()),
        rerun: body.rerun,
        static_site,
    })
}

/// Map a run to the wire response
pub fn to_response(run: &RunState) -> DeployResponse {
    DeployResponse {
        run_id: run.run_id.clone(),
        status: run.status.as_str().to_string(),
        plan: run.plan.as_ref().map(|plan| PlanView {
            service_id: plan.service_id.clone(),
            strategy: plan.strategy.as_str().to_string(),
            steps: plan
                .steps
                .iter()
                .map(|step| StepView {
                    name: step.name.as_str().to_string(),
                    description: step.description.clone(),
                    status: step.status.as_str().to_string(),
                })
                .collect(),
        }),
        current_step_index: Some(run.current_step_index),
        rollout_id: run.rollout_id.clone(),
        log: run.log.clone(),
    }
}
