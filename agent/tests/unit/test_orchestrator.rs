//! Orchestrator behavior against a scripted gateway

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use kgarden::deploy::fsm::RunStatus;
use kgarden::deploy::orchestrator::{DriveMode, OrchestratorSettings};
use kgarden::deploy::planner::TemplatePlanner;
use kgarden::errors::AgentError;
use kgarden::models::metrics::MetricsSnapshot;
use kgarden::models::plan::{StepName, StepStatus};
use kgarden::tools::ToolResult;
use kgarden::utils::CooldownOptions;

use serde_json::json;

use kgarden::models::run::RunState;
use kgarden::store::InMemoryRunStore;

use crate::common::{
    canary_template, default_planner, orchestrator, orchestrator_with_store, request, settings,
    RecordingGateway,
};

/// Run a canary to its end and check it failed on the verification gate
async fn assert_failed_at_verification(gateway: Arc<RecordingGateway>, run_id: &str) -> RunState {
    let orch = orchestrator(gateway, canary_template(), settings(DriveMode::UntilStopped));
    orch.submit(request(run_id, "demo-api")).await.unwrap();
    let state = orch.drive(run_id).await.unwrap();

    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.current_step_index, 2);
    let plan = state.plan.as_ref().unwrap();
    assert_eq!(plan.steps[2].name, StepName::VerifyMetrics);
    assert_eq!(plan.steps[2].status, StepStatus::Failed);
    assert_eq!(plan.steps[3].status, StepStatus::Pending);
    state
}

#[tokio::test]
async fn test_healthy_canary_is_promoted() {
    let gateway = Arc::new(RecordingGateway::healthy());
    let orch = orchestrator(gateway.clone(), canary_template(), settings(DriveMode::UntilStopped));

    assert_ok!(orch.submit(request("run-1", "demo-api")).await);
    let state = orch.drive("run-1").await.unwrap();

    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(state.rollout_id.as_deref(), Some("ro-1234"));
    assert_eq!(state.current_step_index, 4);
    let plan = state.plan.unwrap();
    assert!(plan.steps.iter().all(|s| s.status == StepStatus::Succeeded));

    assert_eq!(
        gateway.calls(),
        vec![
            "trigger_ci_pipeline:demo-api:run_unit_tests",
            "deploy_to_k8s:demo-api:v1.2.1:canary",
            "fetch_metrics:demo-api:5",
            "promote_rollout:demo-api:ro-1234",
        ]
    );
}

#[tokio::test]
async fn test_unhealthy_canary_is_rolled_back() {
    let gateway = Arc::new(
        RecordingGateway::healthy().with_metrics(MetricsSnapshot::new(450.0, 3.0, 90.0)),
    );
    let orch = orchestrator(gateway.clone(), canary_template(), settings(DriveMode::UntilStopped));

    orch.submit(request("run-2", "demo-api")).await.unwrap();
    let state = orch.drive("run-2").await.unwrap();

    assert_eq!(state.status, RunStatus::RolledBack);
    assert_eq!(state.current_step_index, 2);
    let plan = state.plan.as_ref().unwrap();
    assert_eq!(plan.steps[2].name, StepName::VerifyMetrics);
    assert_eq!(plan.steps[2].status, StepStatus::Failed);
    assert_eq!(plan.steps[3].status, StepStatus::Pending);

    assert_eq!(gateway.count("rollback_deployment:demo-api:ro-1234"), 1);
    assert_eq!(gateway.count("promote_rollout"), 0);
    assert!(state.log.iter().any(|e| e.contains("latency")));
}

#[tokio::test]
async fn test_ci_failure_halts_before_deploy() {
    let gateway = Arc::new(
        RecordingGateway::healthy()
            .with_ci_results(vec![ToolResult::failure("Build failed due to test errors")]),
    );
    let orch = orchestrator(gateway.clone(), canary_template(), settings(DriveMode::UntilStopped));

    orch.submit(request("run-3", "demo-api")).await.unwrap();
    let state = orch.drive("run-3").await.unwrap();

    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.current_step_index, 0);
    assert_eq!(state.plan.unwrap().steps[0].status, StepStatus::Failed);
    assert_eq!(gateway.calls().len(), 1);
    assert!(state
        .log
        .iter()
        .any(|e| e.contains("Build failed due to test errors")));
}

#[tokio::test]
async fn test_metrics_failure_fails_run() {
    let gateway =
        Arc::new(RecordingGateway::healthy().with_metrics_failure("metrics backend down"));
    let orch = orchestrator(gateway.clone(), canary_template(), settings(DriveMode::UntilStopped));

    orch.submit(request("run-4", "demo-api")).await.unwrap();
    let state = orch.drive("run-4").await.unwrap();

    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(gateway.count("promote_rollout"), 0);
    assert_eq!(gateway.count("rollback_deployment"), 0);
}

#[tokio::test]
async fn test_promote_failure_fails_run() {
    let gateway = Arc::new(RecordingGateway::healthy().with_promote_failure("promotion rejected"));
    let state = assert_failed_at_verification(gateway.clone(), "run-4a").await;

    assert_eq!(gateway.count("promote_rollout:demo-api:ro-1234"), 1);
    assert_eq!(gateway.count("rollback_deployment"), 0);
    assert!(state.log.iter().any(|e| e.contains("promotion rejected")));
}

#[tokio::test]
async fn test_rollback_failure_fails_run() {
    let gateway = Arc::new(
        RecordingGateway::healthy()
            .with_metrics(MetricsSnapshot::new(20.0, 0.1, 95.0))
            .with_rollback_failure("rollback stuck"),
    );
    let state = assert_failed_at_verification(gateway.clone(), "run-4b").await;

    assert_eq!(gateway.count("rollback_deployment:demo-api:ro-1234"), 1);
    assert_eq!(gateway.count("promote_rollout"), 0);
    assert!(state.log.iter().any(|e| e.contains("rollback stuck")));
}

#[tokio::test]
async fn test_malformed_metrics_fail_run() {
    let malformed = [
        json!({"avg_latency_ms": 42.0}),
        json!({"avg_latency_ms": 42.0, "error_rate_percent": 0.1, "cpu_usage_percent": 140.0}),
        json!({"avg_latency_ms": -5.0, "error_rate_percent": 0.1, "cpu_usage_percent": 40.0}),
    ];
    for (i, fields) in malformed.into_iter().enumerate() {
        let gateway = Arc::new(RecordingGateway::healthy().with_metrics_fields(fields));
        let run_id = format!("run-4c-{}", i);
        let state = assert_failed_at_verification(gateway.clone(), &run_id).await;

        assert_eq!(gateway.count("promote_rollout"), 0);
        assert_eq!(gateway.count("rollback_deployment"), 0);
        assert!(state
            .log
            .iter()
            .any(|e| e.contains("Malformed metrics response")));
    }
}

#[tokio::test]
async fn test_missing_rollout_id_uses_unknown() {
    let mut templates = HashMap::new();
    templates.insert(
        "backend".to_string(),
        vec![StepName::VerifyMetrics, StepName::PromoteFull],
    );
    let planner = Arc::new(TemplatePlanner::new(templates).unwrap());
    let gateway = Arc::new(RecordingGateway::healthy());
    let orch = orchestrator(gateway.clone(), planner, settings(DriveMode::UntilStopped));

    orch.submit(request("run-5", "demo-api")).await.unwrap();
    let state = orch.drive("run-5").await.unwrap();

    assert_eq!(state.status, RunStatus::Completed);
    assert!(state.rollout_id.is_none());
    assert_eq!(gateway.count("promote_rollout:demo-api:unknown"), 1);
}

#[tokio::test]
async fn test_frontend_uses_static_site() {
    let gateway = Arc::new(RecordingGateway::healthy());
    let orch = orchestrator(gateway.clone(), default_planner(), settings(DriveMode::UntilStopped));

    orch.submit(request("run-6", "demo-frontend")).await.unwrap();
    let state = orch.drive("run-6").await.unwrap();

    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(gateway.count("deploy_static_site:demo-frontend"), 1);
    assert_eq!(gateway.count("deploy_to_k8s"), 0);
    assert_eq!(gateway.count("fetch_metrics"), 0);
}

#[tokio::test]
async fn test_requested_version_is_deployed() {
    let gateway = Arc::new(RecordingGateway::healthy());
    let orch = orchestrator(gateway.clone(), default_planner(), settings(DriveMode::UntilStopped));

    let mut req = request("run-7", "demo-api");
    req.version = Some("v2.0.0".to_string());
    orch.submit(req).await.unwrap();
    orch.drive("run-7").await.unwrap();

    assert_eq!(gateway.count("deploy_to_k8s:demo-api:v2.0.0:canary"), 1);
}

#[tokio::test]
async fn test_unknown_service_fails_without_tool_calls() {
    let gateway = Arc::new(RecordingGateway::healthy());
    let orch = orchestrator(gateway.clone(), default_planner(), settings(DriveMode::UntilStopped));

    orch.submit(request("run-8", "payments")).await.unwrap();
    let state = orch.drive("run-8").await.unwrap();

    assert_eq!(state.status, RunStatus::Failed);
    assert!(state.plan.is_none());
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_step_mode_walks_every_transition() {
    let gateway = Arc::new(RecordingGateway::healthy());
    let orch = orchestrator(gateway.clone(), canary_template(), settings(DriveMode::Step));

    let submitted = orch.submit(request("run-9", "demo-api")).await.unwrap();
    assert_eq!(submitted.status, RunStatus::Planning);

    let expected = [
        (RunStatus::Executing, 0),
        (RunStatus::Executing, 1),
        (RunStatus::Executing, 2),
        (RunStatus::Verifying, 2),
        (RunStatus::Executing, 3),
        (RunStatus::Completed, 4),
    ];
    let mut log_len = submitted.log.len();
    for (status, index) in expected {
        let state = orch.advance("run-9").await.unwrap();
        assert_eq!((state.status, state.current_step_index), (status, index));
        assert!(state.log.len() > log_len);
        log_len = state.log.len();
        assert_eq!(orch.status("run-9").await.unwrap(), state);
    }
}

#[tokio::test]
async fn test_terminal_run_is_immutable() {
    let gateway = Arc::new(RecordingGateway::healthy());
    let orch = orchestrator(gateway.clone(), default_planner(), settings(DriveMode::UntilStopped));

    orch.submit(request("run-10", "demo-api")).await.unwrap();
    let done = orch.drive("run-10").await.unwrap();
    let calls = gateway.calls().len();

    let again = orch.drive("run-10").await.unwrap();
    let stepped = orch.advance("run-10").await.unwrap();
    assert_eq!(again, done);
    assert_eq!(stepped, done);
    assert_eq!(gateway.calls().len(), calls);
}

#[tokio::test]
async fn test_resume_without_rerun_returns_persisted_state() {
    let gateway = Arc::new(RecordingGateway::healthy());
    let orch = orchestrator(gateway.clone(), default_planner(), settings(DriveMode::Step));

    orch.submit(request("run-11", "demo-api")).await.unwrap();
    let advanced = orch.advance("run-11").await.unwrap();

    let mut rerun = request("run-11", "demo-api");
    rerun.rerun = true;
    assert_eq!(orch.submit(request("run-11", "demo-api")).await.unwrap(), advanced);
    // Not terminal yet, so rerun is ignored
    assert_eq!(orch.submit(rerun).await.unwrap(), advanced);

    // A conflicting request does not rewrite the persisted run
    let mut conflicting = request("run-11", "demo-frontend");
    conflicting.version = Some("v9.9.9".to_string());
    let resumed = orch.submit(conflicting).await.unwrap();
    assert_eq!(resumed, advanced);
    assert_eq!(resumed.service_id, "demo-api");
}

#[tokio::test]
async fn test_rerun_restarts_terminal_run() {
    let gateway = Arc::new(
        RecordingGateway::healthy().with_ci_results(vec![ToolResult::failure("flaky test")]),
    );
    let orch = orchestrator(gateway.clone(), default_planner(), settings(DriveMode::UntilStopped));

    orch.submit(request("run-12", "demo-api")).await.unwrap();
    let failed = orch.drive("run-12").await.unwrap();
    assert_eq!(failed.status, RunStatus::Failed);

    let mut rerun = request("run-12", "demo-api");
    rerun.rerun = true;
    let restarted = orch.submit(rerun).await.unwrap();
    assert_eq!(restarted.status, RunStatus::Planning);
    assert!(restarted.plan.is_none());
    assert!(restarted.log.starts_with(&failed.log));
    assert!(restarted.log.iter().any(|e| e.contains("Re-running")));

    let state = orch.drive("run-12").await.unwrap();
    assert_eq!(state.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_tool_timeout_fails_step() {
    let gateway = Arc::new(RecordingGateway::healthy().with_delay(Duration::from_millis(500)));
    let orch = orchestrator(
        gateway,
        default_planner(),
        OrchestratorSettings {
            tool_timeout: Duration::from_millis(20),
            ..settings(DriveMode::UntilStopped)
        },
    );

    orch.submit(request("run-13", "demo-api")).await.unwrap();
    let state = orch.drive("run-13").await.unwrap();

    assert_eq!(state.status, RunStatus::Failed);
    assert!(state.log.iter().any(|e| e.contains("timed out")));
}

#[tokio::test]
async fn test_retry_recovers_transient_failure() {
    let gateway = Arc::new(
        RecordingGateway::healthy().with_ci_results(vec![ToolResult::failure("runner lost")]),
    );
    let orch = orchestrator(
        gateway.clone(),
        default_planner(),
        OrchestratorSettings {
            retry_count: 1,
            retry_backoff: CooldownOptions {
                base_delay: Duration::from_millis(1),
                ..Default::default()
            },
            ..settings(DriveMode::UntilStopped)
        },
    );

    orch.submit(request("run-14", "demo-api")).await.unwrap();
    let state = orch.drive("run-14").await.unwrap();

    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(gateway.count("trigger_ci_pipeline"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_runs_progress_concurrently() {
    let gateway = Arc::new(RecordingGateway::healthy().with_delay(Duration::from_millis(5)));
    let orch = Arc::new(orchestrator(
        gateway,
        canary_template(),
        settings(DriveMode::UntilStopped),
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move {
            let run_id = format!("parallel-{}", i);
            orch.submit(request(&run_id, "demo-api")).await?;
            orch.drive(&run_id).await
        }));
    }

    for handle in handles {
        let state = handle.await.unwrap().unwrap();
        assert_eq!(state.status, RunStatus::Completed);
    }
    assert_eq!(orch.store().list().await.unwrap().len(), 8);
    assert_eq!(orch.active_locks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_run_transitions_are_serialized() {
    let gateway = Arc::new(RecordingGateway::healthy().with_delay(Duration::from_millis(5)));
    let orch = Arc::new(orchestrator(
        gateway.clone(),
        canary_template(),
        settings(DriveMode::Step),
    ));
    orch.submit(request("shared", "demo-api")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move { orch.advance("shared").await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let state = orch.status("shared").await.unwrap();
    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(orch.active_locks(), 0);
    // Each tool was called exactly once despite the racing callers
    assert_eq!(gateway.count("trigger_ci_pipeline"), 1);
    assert_eq!(gateway.count("deploy_to_k8s"), 1);
    assert_eq!(gateway.count("promote_rollout"), 1);
}

#[tokio::test]
async fn test_lock_entries_released_after_use() {
    let gateway = Arc::new(RecordingGateway::healthy());
    let orch = orchestrator_with_store(
        gateway,
        default_planner(),
        settings(DriveMode::UntilStopped),
        InMemoryRunStore::new(10),
    );

    for i in 0..50 {
        let run_id = format!("churn-{}", i);
        orch.submit(request(&run_id, "demo-api")).await.unwrap();
        orch.drive(&run_id).await.unwrap();
    }
    for i in 0..20 {
        assert_err!(orch.advance(&format!("ghost-{}", i)).await);
    }

    assert_eq!(orch.store().list().await.unwrap().len(), 10);
    assert_eq!(orch.active_locks(), 0);
}

#[tokio::test]
async fn test_active_run_survives_store_pressure() {
    let gateway = Arc::new(RecordingGateway::healthy());
    let orch = orchestrator_with_store(
        gateway,
        default_planner(),
        settings(DriveMode::Step),
        InMemoryRunStore::new(2),
    );

    orch.submit(request("active", "demo-api")).await.unwrap();
    let advanced = orch.advance("active").await.unwrap();
    assert_eq!(advanced.status, RunStatus::Executing);

    orch.submit(request("b", "demo-api")).await.unwrap();
    assert!(matches!(
        orch.submit(request("c", "demo-api")).await,
        Err(AgentError::StorageError(_))
    ));

    // The in-progress run is still resumable from where it stopped
    assert_eq!(orch.status("active").await.unwrap(), advanced);
    let next = orch.advance("active").await.unwrap();
    assert_eq!(next.current_step_index, 1);
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let orch = orchestrator(
        Arc::new(RecordingGateway::healthy()),
        default_planner(),
        settings(DriveMode::Step),
    );
    let result = orch.drive("missing").await;
    assert!(matches!(result, Err(AgentError::NotFound(_))));
    assert_err!(orch.status("missing").await);
}
