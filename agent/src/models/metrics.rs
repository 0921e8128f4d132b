//! Health metrics snapshot

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AgentError;

/// Metrics observed for a rollout window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub avg_latency_ms: f64,
    pub error_rate_percent: f64,
    pub cpu_usage_percent: f64,
}

impl MetricsSnapshot {
    pub fn new(avg_latency_ms: f64, error_rate_percent: f64, cpu_usage_percent: f64) -> Self {
        Self {
            avg_latency_ms,
            error_rate_percent,
            cpu_usage_percent,
        }
    }

    /// Parse the fields of a successful metrics tool result
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, AgentError> {
        let snapshot: MetricsSnapshot = serde_json::from_value(Value::Object(fields.clone()))
            .map_err(|e| AgentError::ToolFailure(format!("Malformed metrics response: {}", e)))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("avg_latency_ms".into(), self.avg_latency_ms.into());
        fields.insert("error_rate_percent".into(), self.error_rate_percent.into());
        fields.insert("cpu_usage_percent".into(), self.cpu_usage_percent.into());
        fields
    }

    fn validate(&self) -> Result<(), AgentError> {
        let in_percent = |v: f64| (0.0..=100.0).contains(&v);
        if !(self.avg_latency_ms >= 0.0 && self.avg_latency_ms.is_finite()) {
            return Err(AgentError::ToolFailure(format!(
                "Malformed metrics response: avg_latency_ms = {}",
                self.avg_latency_ms
            )));
        }
        if !in_percent(self.error_rate_percent) || !in_percent(self.cpu_usage_percent) {
            return Err(AgentError::ToolFailure(format!(
                "Malformed metrics response: percentages out of range ({}, {})",
                self.error_rate_percent, self.cpu_usage_percent
            )));
        }
        Ok(())
    }
}
