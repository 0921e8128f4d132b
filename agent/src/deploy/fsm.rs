//! Finite state machine for deployment runs

use serde::{Deserialize, Serialize};

/// Run status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting for a plan
    #[default]
    Planning,

    /// Working through plan steps
    Executing,

    /// Checking rollout health before promotion
    Verifying,

    /// All steps done
    Completed,

    /// Unrecoverable lookup or tool error
    Failed,

    /// Health-triggered rollback
    RolledBack,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Planning => "planning",
            RunStatus::Executing => "executing",
            RunStatus::Verifying => "verifying",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::RolledBack => "rolled_back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::RolledBack
        )
    }

    /// Compute the status reached by applying `event`
    pub fn next(&self, event: &RunEvent) -> Result<RunStatus, String> {
        let next = match (self, event) {
            // From Planning
            (RunStatus::Planning, RunEvent::PlanReady) => RunStatus::Executing,
            (RunStatus::Planning, RunEvent::LookupFailed(_)) => RunStatus::Failed,

            // From Executing
            (RunStatus::Executing, RunEvent::StepSucceeded) => RunStatus::Executing,
            (RunStatus::Executing, RunEvent::VerificationStarted) => RunStatus::Verifying,
            (RunStatus::Executing, RunEvent::Finished) => RunStatus::Completed,
            (RunStatus::Executing, RunEvent::ToolFailed(_)) => RunStatus::Failed,

            // From Verifying
            (RunStatus::Verifying, RunEvent::Promoted) => RunStatus::Executing,
            (RunStatus::Verifying, RunEvent::RolledBack(_)) => RunStatus::RolledBack,
            (RunStatus::Verifying, RunEvent::ToolFailed(_)) => RunStatus::Failed,

            // Explicit re-run of a finished run
            (status, RunEvent::Restart) if status.is_terminal() => RunStatus::Planning,

            // Invalid transitions
            (status, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", status, event));
            }
        };
        Ok(next)
    }
}

/// Run event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Plan generated
    PlanReady,

    /// Service metadata lookup failed
    LookupFailed(String),

    /// Current step completed, cursor advanced
    StepSucceeded,

    /// Cursor reached a verification step
    VerificationStarted,

    /// Plan exhausted or full promotion reached
    Finished,

    /// A tool gateway call failed
    ToolFailed(String),

    /// Healthy rollout promoted
    Promoted,

    /// Unhealthy rollout rolled back
    RolledBack(String),

    /// Re-run a finished run from planning
    Restart,
}
