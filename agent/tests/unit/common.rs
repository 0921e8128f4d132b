//! Shared test fixtures

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use kgarden::catalog::StaticCatalog;
use kgarden::deploy::orchestrator::{DriveMode, Orchestrator, OrchestratorSettings};
use kgarden::deploy::planner::{DefaultPlanner, Planner, TemplatePlanner};
use kgarden::models::metrics::MetricsSnapshot;
use kgarden::models::plan::{StepName, Strategy};
use kgarden::models::run::{RunRequest, StaticSiteParams};
use kgarden::store::InMemoryRunStore;
use kgarden::tools::{ToolGateway, ToolResult};

/// Gateway returning scripted results and recording every call
pub struct RecordingGateway {
    ci_results: Mutex<VecDeque<ToolResult>>,
    metrics: MetricsSnapshot,
    metrics_failure: Option<String>,
    metrics_fields: Option<Map<String, Value>>,
    promote_failure: Option<String>,
    rollback_failure: Option<String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl RecordingGateway {
    pub fn healthy() -> Self {
        Self {
            ci_results: Mutex::new(VecDeque::new()),
            metrics: MetricsSnapshot::new(50.0, 0.1, 40.0),
            metrics_failure: None,
            metrics_fields: None,
            promote_failure: None,
            rollback_failure: None,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsSnapshot) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_metrics_failure(mut self, error: &str) -> Self {
        self.metrics_failure = Some(error.to_string());
        self
    }

    /// Successful metrics read carrying these raw fields
    pub fn with_metrics_fields(mut self, fields: Value) -> Self {
        self.metrics_fields = fields.as_object().cloned();
        self
    }

    pub fn with_promote_failure(mut self, error: &str) -> Self {
        self.promote_failure = Some(error.to_string());
        self
    }

    pub fn with_rollback_failure(mut self, error: &str) -> Self {
        self.rollback_failure = Some(error.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue CI results; CI calls succeed once the queue is drained
    pub fn with_ci_results(self, results: Vec<ToolResult>) -> Self {
        *self.ci_results.lock().unwrap() = results.into();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    async fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn ok(pairs: &[(&str, &str)]) -> ToolResult {
    let mut fields = Map::new();
    fields.insert("status".into(), json!("success"));
    for (key, value) in pairs {
        fields.insert((*key).into(), json!(value));
    }
    ToolResult::success(fields)
}

#[async_trait]
impl ToolGateway for RecordingGateway {
    async fn trigger_ci_pipeline(&self, service_id: &str, step_name: &str) -> ToolResult {
        self.record(format!("trigger_ci_pipeline:{}:{}", service_id, step_name))
            .await;
        let scripted = self.ci_results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| ok(&[("build_id", "build-1000")]))
    }

    async fn deploy_to_k8s(
        &self,
        service_id: &str,
        version: &str,
        strategy: Strategy,
    ) -> ToolResult {
        self.record(format!("deploy_to_k8s:{}:{}:{}", service_id, version, strategy))
            .await;
        ok(&[("rollout_id", "ro-1234"), ("message", "Deployed")])
    }

    async fn deploy_static_site(&self, params: &StaticSiteParams) -> ToolResult {
        self.record(format!("deploy_static_site:{}", params.app_name))
            .await;
        ok(&[])
    }

    async fn fetch_metrics(&self, service_id: &str, window_minutes: u32) -> ToolResult {
        self.record(format!("fetch_metrics:{}:{}", service_id, window_minutes))
            .await;
        match (&self.metrics_failure, &self.metrics_fields) {
            (Some(error), _) => ToolResult::failure(error.clone()),
            (None, Some(fields)) => ToolResult::success(fields.clone()),
            (None, None) => ToolResult::success(self.metrics.to_fields()),
        }
    }

    async fn promote_rollout(&self, service_id: &str, rollout_id: &str) -> ToolResult {
        self.record(format!("promote_rollout:{}:{}", service_id, rollout_id))
            .await;
        match &self.promote_failure {
            Some(error) => ToolResult::failure(error.clone()),
            None => ok(&[]),
        }
    }

    async fn rollback_deployment(
        &self,
        service_id: &str,
        rollout_id: &str,
        _reason: &str,
    ) -> ToolResult {
        self.record(format!("rollback_deployment:{}:{}", service_id, rollout_id))
            .await;
        match &self.rollback_failure {
            Some(error) => ToolResult::failure(error.clone()),
            None => ok(&[]),
        }
    }
}

/// Backend plan with a verification gate
pub fn canary_template() -> Arc<dyn Planner> {
    let mut templates = HashMap::new();
    templates.insert(
        "backend".to_string(),
        vec![
            StepName::RunUnitTests,
            StepName::DeployCanary,
            StepName::VerifyMetrics,
            StepName::PromoteFull,
        ],
    );
    Arc::new(TemplatePlanner::new(templates).unwrap())
}

pub fn default_planner() -> Arc<dyn Planner> {
    Arc::new(DefaultPlanner)
}

pub fn settings(drive_mode: DriveMode) -> OrchestratorSettings {
    OrchestratorSettings {
        drive_mode,
        ..Default::default()
    }
}

pub fn orchestrator(
    gateway: Arc<RecordingGateway>,
    planner: Arc<dyn Planner>,
    settings: OrchestratorSettings,
) -> Orchestrator {
    orchestrator_with_store(gateway, planner, settings, InMemoryRunStore::default())
}

pub fn orchestrator_with_store(
    gateway: Arc<RecordingGateway>,
    planner: Arc<dyn Planner>,
    settings: OrchestratorSettings,
    store: InMemoryRunStore,
) -> Orchestrator {
    Orchestrator::new(
        Arc::new(StaticCatalog::with_demo_services(Vec::new())),
        planner,
        gateway,
        Arc::new(store),
        settings,
    )
}

pub fn request(run_id: &str, service_id: &str) -> RunRequest {
    RunRequest {
        run_id: run_id.to_string(),
        service_id: service_id.to_string(),
        strategy: Strategy::Canary,
        message: "integration test".to_string(),
        version: None,
        rerun: false,
        static_site: StaticSiteParams::with_defaults(
            service_id, None, None, None, None, None, None,
        ),
    }
}
