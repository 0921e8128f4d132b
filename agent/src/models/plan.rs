//! Deployment plan models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Service type whose plans deploy a static site instead of a canary
pub const FRONTEND_SERVICE_TYPE: &str = "frontend";

/// Rollout strategy requested for a deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    #[default]
    Canary,
    BlueGreen,
    Rolling,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Canary => "canary",
            Strategy::BlueGreen => "blue-green",
            Strategy::Rolling => "rolling",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "canary" => Ok(Strategy::Canary),
            "blue-green" | "blue_green" | "bluegreen" => Ok(Strategy::BlueGreen),
            "rolling" => Ok(Strategy::Rolling),
            _ => Err(format!("Unknown strategy: {}", s)),
        }
    }
}

/// Fixed step vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    RunUnitTests,
    RunLint,
    SecurityScan,
    BuildImage,
    DeployCanary,
    DeployStaticSite,
    VerifyMetrics,
    PromoteFull,
}

/// What the orchestrator does when the cursor reaches a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Trigger a CI pipeline stage named after the step
    CiPipeline,
    /// Roll the new version out to Kubernetes
    DeployK8s,
    /// Build and publish a static site
    DeployStaticSite,
    /// Enter verification (metrics, then promote or rollback)
    VerifyMetrics,
    /// Finish the run
    PromoteFull,
}

impl StepName {
    pub const ALL: [StepName; 8] = [
        StepName::RunUnitTests,
        StepName::RunLint,
        StepName::SecurityScan,
        StepName::BuildImage,
        StepName::DeployCanary,
        StepName::DeployStaticSite,
        StepName::VerifyMetrics,
        StepName::PromoteFull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::RunUnitTests => "run_unit_tests",
            StepName::RunLint => "run_lint",
            StepName::SecurityScan => "security_scan",
            StepName::BuildImage => "build_image",
            StepName::DeployCanary => "deploy_canary",
            StepName::DeployStaticSite => "deploy_static_site",
            StepName::VerifyMetrics => "verify_metrics",
            StepName::PromoteFull => "promote_full",
        }
    }

    /// Dispatch table from step name to action
    pub fn action(&self) -> StepAction {
        match self {
            StepName::RunUnitTests
            | StepName::RunLint
            | StepName::SecurityScan
            | StepName::BuildImage => StepAction::CiPipeline,
            StepName::DeployCanary => StepAction::DeployK8s,
            StepName::DeployStaticSite => StepAction::DeployStaticSite,
            StepName::VerifyMetrics => StepAction::VerifyMetrics,
            StepName::PromoteFull => StepAction::PromoteFull,
        }
    }

    /// Human-readable description used when a planner builds a step
    pub fn describe(&self, strategy: Strategy) -> String {
        match self {
            StepName::RunUnitTests => "Run unit tests via CI".to_string(),
            StepName::RunLint => "Run lint checks via CI".to_string(),
            StepName::SecurityScan => "Run security scan via CI".to_string(),
            StepName::BuildImage => "Build container image via CI".to_string(),
            StepName::DeployCanary => format!("Deploy {} version (10% traffic)", strategy),
            StepName::DeployStaticSite => "Deploy static site to AWS Lambda".to_string(),
            StepName::VerifyMetrics => "Verify rollout health metrics".to_string(),
            StepName::PromoteFull => "Promote rollout to 100% traffic".to_string(),
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepName::ALL
            .iter()
            .find(|name| name.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown step name: {}", s))
    }
}

/// Step status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
        }
    }
}

/// A single plan step. Only `status` changes after the plan is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStep {
    pub name: StepName,
    pub description: String,
    #[serde(default)]
    pub status: StepStatus,
}

impl DeploymentStep {
    pub fn new(name: StepName, strategy: Strategy) -> Self {
        Self {
            name,
            description: name.describe(strategy),
            status: StepStatus::Pending,
        }
    }
}

/// Ordered deployment plan; insertion order is execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub service_id: String,
    pub strategy: Strategy,
    pub steps: Vec<DeploymentStep>,
}

impl DeploymentPlan {
    /// Default two-step plan: unit tests, then either a static-site deploy
    /// (frontend services) or a canary deploy (everything else).
    pub fn new(service_id: &str, strategy: Strategy, service_type: &str) -> Self {
        let deploy = if service_type == FRONTEND_SERVICE_TYPE {
            StepName::DeployStaticSite
        } else {
            StepName::DeployCanary
        };
        Self::from_steps(service_id, strategy, &[StepName::RunUnitTests, deploy])
    }

    /// Build a plan from an explicit step sequence
    pub fn from_steps(service_id: &str, strategy: Strategy, names: &[StepName]) -> Self {
        Self {
            service_id: service_id.to_string(),
            strategy,
            steps: names
                .iter()
                .map(|name| DeploymentStep::new(*name, strategy))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<StepName> {
        self.steps.iter().map(|s| s.name).collect()
    }
}
