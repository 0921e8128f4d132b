//! Rollout health evaluation
//!
//! Thresholds are fixed: a snapshot is healthy only when latency, error rate
//! and CPU are all below their limits. Violations are checked in the order
//! latency, error rate, CPU and the first one found is reported.

use std::fmt;

use crate::models::metrics::MetricsSnapshot;

pub const MAX_LATENCY_MS: f64 = 200.0;
pub const MAX_ERROR_RATE_PERCENT: f64 = 1.0;
pub const MAX_CPU_USAGE_PERCENT: f64 = 80.0;

/// Threshold that a snapshot violated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Latency,
    ErrorRate,
    Cpu,
}

impl Violation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Violation::Latency => "latency",
            Violation::ErrorRate => "error_rate",
            Violation::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a health evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum HealthVerdict {
    Healthy,
    Unhealthy { violation: Violation, reason: String },
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthVerdict::Healthy)
    }
}

/// Evaluate a metrics snapshot against the fixed thresholds
pub fn evaluate(snapshot: &MetricsSnapshot) -> HealthVerdict {
    let checks = [
        (
            Violation::Latency,
            snapshot.avg_latency_ms,
            MAX_LATENCY_MS,
            "ms",
        ),
        (
            Violation::ErrorRate,
            snapshot.error_rate_percent,
            MAX_ERROR_RATE_PERCENT,
            "%",
        ),
        (
            Violation::Cpu,
            snapshot.cpu_usage_percent,
            MAX_CPU_USAGE_PERCENT,
            "%",
        ),
    ];

    for (violation, value, limit, unit) in checks {
        // NaN fails the comparison and counts as a violation
        if !(value < limit) {
            return HealthVerdict::Unhealthy {
                violation,
                reason: format!(
                    "{} {}{} is not below the {}{} threshold",
                    violation, value, unit, limit, unit
                ),
            };
        }
    }

    HealthVerdict::Healthy
}
