//! Settings file management

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::deploy::orchestrator::DriveMode;
use crate::deploy::planner::TemplatePlanner;
use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::models::service::ServiceMetadata;

/// Environment variable overriding the static-site API URL
pub const STATIC_SITE_API_URL_ENV: &str = "STATIC_SITE_DEPLOY_API_URL";

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Also write daily-rolling log files to the layout's log directory
    #[serde(default)]
    pub log_to_file: bool,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Run store configuration
    #[serde(default)]
    pub store: StoreSettings,

    /// Orchestrator configuration
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Static-site deployment API
    #[serde(default)]
    pub static_site: StaticSiteSettings,

    /// Simulated backends
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Services known in addition to the demo services
    #[serde(default)]
    pub services: Vec<ServiceMetadata>,

    /// Step lists per service type; types without one get the default plan
    #[serde(default)]
    pub plan_templates: HashMap<String, Vec<String>>,

    /// Maximum delay for graceful shutdown in seconds
    #[serde(default = "default_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,
}

fn default_shutdown_delay() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_json: false,
            log_to_file: false,
            server: ServerSettings::default(),
            store: StoreSettings::default(),
            orchestrator: OrchestratorConfig::default(),
            static_site: StaticSiteSettings::default(),
            simulation: SimulationSettings::default(),
            services: Vec::new(),
            plan_templates: HashMap::new(),
            max_shutdown_delay_secs: default_shutdown_delay(),
        }
    }
}

impl Settings {
    /// Read settings from a file, falling back to defaults when it is absent
    pub async fn load(file: &File) -> Result<Self, AgentError> {
        let mut settings = if file.exists().await {
            file.read_json::<Settings>().await.map_err(|e| {
                AgentError::ConfigError(format!(
                    "Unable to read settings file {}: {}",
                    file.path().display(),
                    e
                ))
            })?
        } else {
            warn!(
                "Settings file {} not found, using defaults",
                file.path().display()
            );
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(STATIC_SITE_API_URL_ENV) {
            self.static_site.api_url = Some(url);
        }
    }

    /// Reject settings the agent cannot run with
    pub fn validate(&self) -> Result<(), AgentError> {
        let rate_ok = |rate: f64| (0.0..=1.0).contains(&rate);
        if !rate_ok(self.simulation.ci_failure_rate) || !rate_ok(self.simulation.unhealthy_rate) {
            return Err(AgentError::ConfigError(
                "simulation rates must be within [0, 1]".to_string(),
            ));
        }

        if let Some(api_url) = self.static_site.api_url.as_deref() {
            let api_url = api_url.trim();
            if !api_url.is_empty() && api_url != crate::tools::static_site::MOCK_SENTINEL {
                url::Url::parse(api_url).map_err(|e| {
                    AgentError::ConfigError(format!(
                        "Invalid static_site.api_url {}: {}",
                        api_url, e
                    ))
                })?;
            }
        }

        if self.orchestrator.max_transitions == 0 {
            return Err(AgentError::ConfigError(
                "orchestrator.max_transitions must be positive".to_string(),
            ));
        }

        TemplatePlanner::from_names(&self.plan_templates)?;
        Ok(())
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Run store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

/// Run store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory for the file backend; the layout's runs directory when unset
    #[serde(default)]
    pub dir: Option<String>,

    /// Maximum runs kept by the memory backend
    #[serde(default = "default_store_capacity")]
    pub capacity: usize,
}

fn default_store_capacity() -> usize {
    1000
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            dir: None,
            capacity: default_store_capacity(),
        }
    }
}

/// Orchestrator settings as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_drive_mode")]
    pub drive_mode: DriveMode,

    #[serde(default = "default_max_transitions")]
    pub max_transitions: usize,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    #[serde(default)]
    pub retry_count: u32,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_metrics_window")]
    pub metrics_window_minutes: u32,

    #[serde(default = "default_version")]
    pub default_version: String,
}

fn default_drive_mode() -> DriveMode {
    DriveMode::UntilStopped
}

fn default_max_transitions() -> usize {
    100
}

fn default_tool_timeout() -> u64 {
    60
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_metrics_window() -> u32 {
    5
}

fn default_version() -> String {
    "v1.2.1".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            drive_mode: default_drive_mode(),
            max_transitions: default_max_transitions(),
            tool_timeout_secs: default_tool_timeout(),
            retry_count: 0,
            retry_base_delay_ms: default_retry_base_delay(),
            metrics_window_minutes: default_metrics_window(),
            default_version: default_version(),
        }
    }
}

/// Static-site API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSiteSettings {
    /// Endpoint URL; unset or `MOCK` uses the built-in mock
    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(default = "default_static_site_timeout")]
    pub timeout_secs: u64,
}

fn default_static_site_timeout() -> u64 {
    30
}

impl Default for StaticSiteSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_secs: default_static_site_timeout(),
        }
    }
}

/// Simulated backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    #[serde(default = "default_ci_failure_rate")]
    pub ci_failure_rate: f64,

    #[serde(default = "default_unhealthy_rate")]
    pub unhealthy_rate: f64,

    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,

    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_ci_failure_rate() -> f64 {
    0.05
}

fn default_unhealthy_rate() -> f64 {
    0.2
}

fn default_latency_ms() -> u64 {
    1000
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            ci_failure_rate: default_ci_failure_rate(),
            unhealthy_rate: default_unhealthy_rate(),
            latency_ms: default_latency_ms(),
            seed: None,
        }
    }
}
