//! Simulated CI / Kubernetes / metrics backends
//!
//! Stands in for real backends in demos and local runs. All randomness comes
//! from a [`RandomSource`] so runs can be made reproducible.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map};
use tracing::{info, warn};

use crate::models::metrics::MetricsSnapshot;
use crate::models::plan::Strategy;
use crate::models::run::StaticSiteParams;
use crate::tools::static_site::StaticSiteClient;
use crate::tools::{ToolGateway, ToolResult};

/// Uniform samples in `[0, 1)`
pub trait RandomSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Process-wide thread RNG
#[derive(Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn sample(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Reproducible RNG
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn sample(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen::<f64>()
    }
}

/// Always returns the same value
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Simulation knobs
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Probability that a CI stage fails
    pub ci_failure_rate: f64,

    /// Probability that a metrics read is degraded
    pub unhealthy_rate: f64,

    /// Artificial latency per backend call
    pub latency: Duration,

    /// Seed for reproducible runs; thread RNG when unset
    pub seed: Option<u64>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            ci_failure_rate: 0.05,
            unhealthy_rate: 0.2,
            latency: Duration::from_secs(1),
            seed: None,
        }
    }
}

/// Simulated gateway
pub struct SimulatedGateway {
    options: SimulationOptions,
    random: Box<dyn RandomSource>,
    static_site: StaticSiteClient,
}

impl SimulatedGateway {
    pub fn new(
        options: SimulationOptions,
        random: Box<dyn RandomSource>,
        static_site: StaticSiteClient,
    ) -> Self {
        Self {
            options,
            random,
            static_site,
        }
    }

    /// Build the random source the options ask for
    pub fn from_options(options: SimulationOptions, static_site: StaticSiteClient) -> Self {
        let random: Box<dyn RandomSource> = match options.seed {
            Some(seed) => Box::new(SeededRandom::new(seed)),
            None => Box::new(ThreadRandom),
        };
        Self::new(options, random, static_site)
    }

    async fn pause(&self) {
        if !self.options.latency.is_zero() {
            tokio::time::sleep(self.options.latency).await;
        }
    }

    /// Sample in `[low, high)`
    fn between(&self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.random.sample()
    }

    fn id_number(&self) -> u32 {
        self.between(1000.0, 10000.0) as u32
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[async_trait]
impl ToolGateway for SimulatedGateway {
    async fn trigger_ci_pipeline(&self, service_id: &str, step_name: &str) -> ToolResult {
        info!("Triggering CI step: {} for {}", step_name, service_id);
        self.pause().await;

        if self.random.sample() < self.options.ci_failure_rate {
            warn!("Simulated CI failure for {} ({})", service_id, step_name);
            return ToolResult::failure("Build failed due to test errors");
        }

        let mut fields = Map::new();
        fields.insert("status".into(), json!("success"));
        fields.insert("build_id".into(), json!(format!("build-{}", self.id_number())));
        ToolResult::success(fields)
    }

    async fn deploy_to_k8s(
        &self,
        service_id: &str,
        version: &str,
        strategy: Strategy,
    ) -> ToolResult {
        info!(
            "Deploying {} ({}) with {} strategy",
            service_id, version, strategy
        );
        self.pause().await;

        let mut fields = Map::new();
        fields.insert("status".into(), json!("success"));
        fields.insert(
            "message".into(),
            json!(format!("Deployed {}:{} successfully", service_id, version)),
        );
        fields.insert("rollout_id".into(), json!(format!("ro-{}", self.id_number())));
        ToolResult::success(fields)
    }

    async fn deploy_static_site(&self, params: &StaticSiteParams) -> ToolResult {
        self.static_site.deploy(params).await
    }

    async fn fetch_metrics(&self, service_id: &str, window_minutes: u32) -> ToolResult {
        info!(
            "Fetching metrics for {} (last {}m)",
            service_id, window_minutes
        );

        let degraded = self.random.sample() < self.options.unhealthy_rate;
        let snapshot = if degraded {
            MetricsSnapshot::new(
                self.between(200.0, 500.0).floor(),
                round2(self.between(2.0, 5.0)),
                self.between(80.0, 95.0).floor(),
            )
        } else {
            MetricsSnapshot::new(
                self.between(20.0, 100.0).floor(),
                round2(self.between(0.0, 0.5)),
                self.between(30.0, 60.0).floor(),
            )
        };

        ToolResult::success(snapshot.to_fields())
    }

    async fn promote_rollout(&self, service_id: &str, rollout_id: &str) -> ToolResult {
        info!("Promoting rollout {} for {}", rollout_id, service_id);

        let mut fields = Map::new();
        fields.insert("status".into(), json!("success"));
        fields.insert("message".into(), json!("Promotion completed"));
        ToolResult::success(fields)
    }

    async fn rollback_deployment(
        &self,
        service_id: &str,
        rollout_id: &str,
        reason: &str,
    ) -> ToolResult {
        info!(
            "Rolling back {} (rollout: {}). Reason: {}",
            service_id, rollout_id, reason
        );

        let mut fields = Map::new();
        fields.insert("status".into(), json!("success"));
        fields.insert("message".into(), json!("Rollback completed"));
        ToolResult::success(fields)
    }
}
