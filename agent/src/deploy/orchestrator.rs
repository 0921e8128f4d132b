//! Deployment orchestrator
//!
//! Drives a run through `planning -> executing -> verifying -> ...` one
//! transition at a time. Every transition is persisted before the caller sees
//! the new state, and transitions on the same run are serialized by a per-run
//! lock so different runs can progress in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::catalog::ServiceCatalog;
use crate::deploy::fsm::{RunEvent, RunStatus};
use crate::deploy::health::{evaluate, HealthVerdict};
use crate::deploy::planner::Planner;
use crate::errors::AgentError;
use crate::models::metrics::MetricsSnapshot;
use crate::models::plan::{StepAction, StepStatus};
use crate::models::run::{RunRequest, RunState};
use crate::store::RunStore;
use crate::tools::{ToolCall, ToolGateway, ToolResult};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Rollout id passed to promote/rollback when no deploy step reported one
const UNKNOWN_ROLLOUT: &str = "unknown";

/// How far a single `drive` call advances a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// Exactly one transition
    Step,

    /// Until a terminal state (bounded by `max_transitions`)
    UntilStopped,
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Upper bound on a single tool call
    pub tool_timeout: Duration,

    /// Extra attempts after a failed tool call
    pub retry_count: u32,

    /// Delay between attempts
    pub retry_backoff: CooldownOptions,

    pub drive_mode: DriveMode,

    /// Transition budget of one `drive` call
    pub max_transitions: usize,

    pub metrics_window_minutes: u32,

    /// Version deployed when the request does not name one
    pub default_version: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            tool_timeout: Duration::from_secs(60),
            retry_count: 0,
            retry_backoff: CooldownOptions::default(),
            drive_mode: DriveMode::UntilStopped,
            max_transitions: 100,
            metrics_window_minutes: 5,
            default_version: "v1.2.1".to_string(),
        }
    }
}

type LockMap = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Handle on a run's lock; the map entry is dropped with the last handle
struct RunLock<'a> {
    locks: &'a LockMap,
    run_id: String,
    lock: Arc<Mutex<()>>,
}

impl Drop for RunLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Handles are only cloned under the map lock: the map's copy plus ours
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.run_id);
        }
    }
}

/// Deployment orchestrator
pub struct Orchestrator {
    catalog: Arc<dyn ServiceCatalog>,
    planner: Arc<dyn Planner>,
    gateway: Arc<dyn ToolGateway>,
    store: Arc<dyn RunStore>,
    settings: OrchestratorSettings,
    locks: LockMap,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<dyn ServiceCatalog>,
        planner: Arc<dyn Planner>,
        gateway: Arc<dyn ToolGateway>,
        store: Arc<dyn RunStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            catalog,
            planner,
            gateway,
            store,
            settings,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    fn run_lock(&self, run_id: &str) -> RunLock<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let lock = locks
            .entry(run_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        RunLock {
            locks: &self.locks,
            run_id: run_id.to_string(),
            lock,
        }
    }

    /// Number of run ids with a live lock entry
    pub fn active_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Create a run, or resume an existing one
    ///
    /// `rerun` restarts an existing run that already reached a terminal
    /// state; otherwise an existing run is returned as persisted.
    pub async fn submit(&self, request: RunRequest) -> Result<RunState, AgentError> {
        let lease = self.run_lock(&request.run_id);
        let _guard = lease.lock.lock().await;

        match self.store.load(&request.run_id).await? {
            None => {
                info!(
                    "Creating run {} for service {} ({})",
                    request.run_id, request.service_id, request.strategy
                );
                let state = RunState::new(request);
                self.store.save(&state).await?;
                Ok(state)
            }
            Some(mut state) if request.rerun && state.is_terminal() => {
                info!("Re-running run {} from {}", state.run_id, state.status.as_str());
                state.restart(request)?;
                state.touch();
                self.store.save(&state).await?;
                Ok(state)
            }
            Some(state) => {
                if request.service_id != state.service_id
                    || request.strategy != state.strategy
                    || (request.version.is_some() && request.version != state.version)
                {
                    warn!(
                        "Run {} already exists for {} ({}); ignoring request for {} ({})",
                        state.run_id,
                        state.service_id,
                        state.strategy,
                        request.service_id,
                        request.strategy
                    );
                }
                debug!("Resuming run {} in {}", state.run_id, state.status.as_str());
                Ok(state)
            }
        }
    }

    /// Persisted state of a run, without advancing it
    pub async fn status(&self, run_id: &str) -> Result<RunState, AgentError> {
        self.store
            .load(run_id)
            .await?
            .ok_or_else(|| AgentError::NotFound(format!("Deployment not found: {}", run_id)))
    }

    /// Advance a run by exactly one transition
    pub async fn advance(&self, run_id: &str) -> Result<RunState, AgentError> {
        self.drive_with(run_id, DriveMode::Step).await
    }

    /// Advance a run according to the configured drive mode
    pub async fn drive(&self, run_id: &str) -> Result<RunState, AgentError> {
        self.drive_with(run_id, self.settings.drive_mode).await
    }

    async fn drive_with(&self, run_id: &str, mode: DriveMode) -> Result<RunState, AgentError> {
        let lease = self.run_lock(run_id);
        let _guard = lease.lock.lock().await;

        let mut state = self.status(run_id).await?;
        let budget = match mode {
            DriveMode::Step => 1,
            DriveMode::UntilStopped => self.settings.max_transitions.max(1),
        };

        for _ in 0..budget {
            if state.is_terminal() {
                break;
            }
            self.transition(&mut state).await?;
            state.touch();
            self.store.save(&state).await?;
        }

        if !state.is_terminal() && mode == DriveMode::UntilStopped {
            warn!(
                "Run {} still {} after {} transitions",
                state.run_id,
                state.status.as_str(),
                budget
            );
        }

        Ok(state)
    }

    /// Perform one transition in place. Terminal runs are left untouched.
    async fn transition(&self, state: &mut RunState) -> Result<(), AgentError> {
        match state.status {
            RunStatus::Planning => self.plan(state).await,
            RunStatus::Executing => self.execute(state).await,
            RunStatus::Verifying => self.verify(state).await,
            RunStatus::Completed | RunStatus::Failed | RunStatus::RolledBack => Ok(()),
        }
    }

    // ================================ PLANNING ================================= //

    async fn plan(&self, state: &mut RunState) -> Result<(), AgentError> {
        let planned = match self.catalog.lookup(&state.service_id).await {
            Ok(metadata) => self.planner.plan(&metadata, state.strategy),
            Err(e) => Err(e),
        };

        match planned {
            Ok(plan) => {
                let names: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
                info!(
                    "Run {}: plan generated with {} steps",
                    state.run_id,
                    plan.len()
                );
                state.record(format!(
                    "Plan generated with {} steps: {}",
                    plan.len(),
                    names.join(", ")
                ));
                state.plan = Some(plan);
                state.current_step_index = 0;
                state.apply(RunEvent::PlanReady)
            }
            Err(e) => {
                error!("Run {}: planning failed: {}", state.run_id, e);
                state.record(format!("Planning failed: {}", e));
                state.apply(RunEvent::LookupFailed(e.to_string()))
            }
        }
    }

    // ================================ EXECUTION ================================ //

    async fn execute(&self, state: &mut RunState) -> Result<(), AgentError> {
        let Some(step) = state.current_step().cloned() else {
            let steps = state.plan.as_ref().map(|p| p.len());
            return match steps {
                Some(len) => {
                    // Cursor never moves past the end of the plan
                    state.current_step_index = state.current_step_index.min(len);
                    state.record("All steps completed");
                    info!("Run {}: completed", state.run_id);
                    state.apply(RunEvent::Finished)
                }
                None => {
                    state.record("Run is executing without a plan");
                    state.apply(RunEvent::ToolFailed("missing plan".to_string()))
                }
            };
        };

        info!(
            "Run {}: executing step {} ({})",
            state.run_id, state.current_step_index, step.name
        );

        let service_id = state.service_id.clone();
        let result = match step.name.action() {
            StepAction::CiPipeline => {
                self.call_tool(ToolCall::TriggerCiPipeline {
                    service_id: &service_id,
                    step_name: step.name.as_str(),
                })
                .await
            }
            StepAction::DeployK8s => {
                let version = state
                    .version
                    .clone()
                    .unwrap_or_else(|| self.settings.default_version.clone());
                self.call_tool(ToolCall::DeployToK8s {
                    service_id: &service_id,
                    version: &version,
                    strategy: state.strategy,
                })
                .await
            }
            StepAction::DeployStaticSite => {
                let params = state.static_site.clone();
                self.call_tool(ToolCall::DeployStaticSite { params: &params })
                    .await
            }
            StepAction::VerifyMetrics => {
                self.set_step_status(state, StepStatus::Running);
                state.record(format!("Step {}: verifying rollout health", step.name));
                return state.apply(RunEvent::VerificationStarted);
            }
            StepAction::PromoteFull => {
                self.set_step_status(state, StepStatus::Succeeded);
                state.current_step_index += 1;
                state.record(format!("Step {}: rollout fully promoted", step.name));
                info!("Run {}: completed", state.run_id);
                return state.apply(RunEvent::Finished);
            }
        };

        match result {
            ToolResult::Success { fields } => {
                self.set_step_status(state, StepStatus::Succeeded);
                if let Some(rollout_id) = fields.get("rollout_id").and_then(|v| v.as_str()) {
                    state.rollout_id = Some(rollout_id.to_string());
                }
                state.record(format!(
                    "Step {} succeeded: {}",
                    step.name,
                    serde_json::Value::Object(fields)
                ));
                state.current_step_index += 1;
                state.apply(RunEvent::StepSucceeded)
            }
            ToolResult::Failure { error } => {
                warn!("Run {}: step {} failed: {}", state.run_id, step.name, error);
                self.set_step_status(state, StepStatus::Failed);
                state.record(format!("Step {} failed: {}", step.name, error));
                state.apply(RunEvent::ToolFailed(error))
            }
        }
    }

    // =============================== VERIFICATION ============================== //

    async fn verify(&self, state: &mut RunState) -> Result<(), AgentError> {
        let service_id = state.service_id.clone();
        let rollout_id = state
            .rollout_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_ROLLOUT.to_string());

        let metrics = self
            .call_tool(ToolCall::FetchMetrics {
                service_id: &service_id,
                window_minutes: self.settings.metrics_window_minutes,
            })
            .await;

        let snapshot = match metrics {
            ToolResult::Success { fields } => MetricsSnapshot::from_fields(&fields),
            ToolResult::Failure { error } => Err(AgentError::ToolFailure(error)),
        };
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => return self.fail_verification(state, e.to_string()),
        };

        state.record(format!(
            "Metrics: latency {}ms, error rate {}%, cpu {}%",
            snapshot.avg_latency_ms, snapshot.error_rate_percent, snapshot.cpu_usage_percent
        ));

        match evaluate(&snapshot) {
            HealthVerdict::Healthy => {
                let result = self
                    .call_tool(ToolCall::PromoteRollout {
                        service_id: &service_id,
                        rollout_id: &rollout_id,
                    })
                    .await;
                match result {
                    ToolResult::Success { .. } => {
                        info!("Run {}: rollout {} promoted", state.run_id, rollout_id);
                        self.set_step_status(state, StepStatus::Succeeded);
                        state.record(format!("Healthy: promoted rollout {}", rollout_id));
                        state.current_step_index += 1;
                        state.apply(RunEvent::Promoted)
                    }
                    ToolResult::Failure { error } => self.fail_verification(state, error),
                }
            }
            HealthVerdict::Unhealthy { violation, reason } => {
                warn!(
                    "Run {}: unhealthy ({}), rolling back {}",
                    state.run_id, violation, rollout_id
                );
                let result = self
                    .call_tool(ToolCall::RollbackDeployment {
                        service_id: &service_id,
                        rollout_id: &rollout_id,
                        reason: &reason,
                    })
                    .await;
                match result {
                    ToolResult::Success { .. } => {
                        self.set_step_status(state, StepStatus::Failed);
                        state.record(format!(
                            "Unhealthy: rolled back rollout {} ({})",
                            rollout_id, reason
                        ));
                        state.apply(RunEvent::RolledBack(reason))
                    }
                    ToolResult::Failure { error } => self.fail_verification(state, error),
                }
            }
        }
    }

    fn fail_verification(&self, state: &mut RunState, error: String) -> Result<(), AgentError> {
        warn!("Run {}: verification failed: {}", state.run_id, error);
        self.set_step_status(state, StepStatus::Failed);
        state.record(format!("Verification failed: {}", error));
        state.apply(RunEvent::ToolFailed(error))
    }

    fn set_step_status(&self, state: &mut RunState, status: StepStatus) {
        if let Some(step) = state.current_step_mut() {
            step.status = status;
        }
    }

    // ================================ TOOL CALLS =============================== //

    /// Invoke a gateway call under the timeout and retry policy
    async fn call_tool(&self, call: ToolCall<'_>) -> ToolResult {
        let mut attempt = 0;
        loop {
            debug!("Calling {} (attempt {})", call.name(), attempt + 1);
            let result = match tokio::time::timeout(
                self.settings.tool_timeout,
                call.invoke(self.gateway.as_ref()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => ToolResult::failure(format!(
                    "{} timed out after {:?}",
                    call.name(),
                    self.settings.tool_timeout
                )),
            };

            if result.is_success() || attempt >= self.settings.retry_count {
                return result;
            }

            let delay = calc_exp_backoff(&self.settings.retry_backoff, attempt);
            warn!(
                "{} failed, retrying in {:?} ({}/{})",
                call.name(),
                delay,
                attempt + 1,
                self.settings.retry_count
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
