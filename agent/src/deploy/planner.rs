//! Deployment planners

use std::collections::HashMap;

use crate::errors::AgentError;
use crate::models::plan::{DeploymentPlan, StepName, Strategy};
use crate::models::service::ServiceMetadata;

/// Builds the step sequence for a run
pub trait Planner: Send + Sync {
    fn plan(
        &self,
        metadata: &ServiceMetadata,
        strategy: Strategy,
    ) -> Result<DeploymentPlan, AgentError>;
}

/// Two-step plan keyed on the service type
#[derive(Debug, Clone, Default)]
pub struct DefaultPlanner;

impl Planner for DefaultPlanner {
    fn plan(
        &self,
        metadata: &ServiceMetadata,
        strategy: Strategy,
    ) -> Result<DeploymentPlan, AgentError> {
        Ok(DeploymentPlan::new(
            &metadata.id,
            strategy,
            &metadata.service_type,
        ))
    }
}

/// Plans from configured per-service-type step lists
///
/// Service types without a template get the default plan.
#[derive(Debug, Clone, Default)]
pub struct TemplatePlanner {
    templates: HashMap<String, Vec<StepName>>,
}

impl TemplatePlanner {
    pub fn new(templates: HashMap<String, Vec<StepName>>) -> Result<Self, AgentError> {
        if let Some((service_type, _)) = templates.iter().find(|(_, steps)| steps.is_empty()) {
            return Err(AgentError::ConfigError(format!(
                "Plan template for '{}' has no steps",
                service_type
            )));
        }
        Ok(Self { templates })
    }

    /// Parse templates given as step name strings
    pub fn from_names(templates: &HashMap<String, Vec<String>>) -> Result<Self, AgentError> {
        let mut parsed = HashMap::new();
        for (service_type, names) in templates {
            let steps = names
                .iter()
                .map(|name| name.parse::<StepName>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(AgentError::ConfigError)?;
            parsed.insert(service_type.clone(), steps);
        }
        Self::new(parsed)
    }
}

impl Planner for TemplatePlanner {
    fn plan(
        &self,
        metadata: &ServiceMetadata,
        strategy: Strategy,
    ) -> Result<DeploymentPlan, AgentError> {
        match self.templates.get(&metadata.service_type) {
            Some(steps) => Ok(DeploymentPlan::from_steps(&metadata.id, strategy, steps)),
            None => DefaultPlanner.plan(metadata, strategy),
        }
    }
}
