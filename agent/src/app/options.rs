//! Application configuration options

use std::collections::HashMap;
use std::time::Duration;

use crate::deploy::orchestrator::OrchestratorSettings;
use crate::filesys::dir::Dir;
use crate::models::service::ServiceMetadata;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{Settings, StoreBackend};
use crate::tools::simulated::SimulationOptions;
use crate::tools::static_site::StaticSiteOptions;
use crate::utils::CooldownOptions;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Orchestrator settings
    pub orchestrator: OrchestratorSettings,

    /// Simulated CI / deploy / metrics backends
    pub simulation: SimulationOptions,

    /// Static-site deployment API
    pub static_site: StaticSiteOptions,

    /// Services registered next to the demo services
    pub services: Vec<ServiceMetadata>,

    /// Plan templates keyed by service type
    pub plan_templates: HashMap<String, Vec<String>>,
}

impl AppOptions {
    /// Build runtime options from the settings file
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        let orchestrator = &settings.orchestrator;
        let runs_dir = match settings.store.dir.as_deref() {
            Some(dir) => Dir::new(dir),
            None => layout.runs_dir(),
        };

        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(settings.max_shutdown_delay_secs),
            },
            storage: StorageOptions {
                layout,
                backend: settings.store.backend,
                runs_dir,
                capacity: settings.store.capacity,
            },
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            orchestrator: OrchestratorSettings {
                tool_timeout: Duration::from_secs(orchestrator.tool_timeout_secs),
                retry_count: orchestrator.retry_count,
                retry_backoff: CooldownOptions {
                    base_delay: Duration::from_millis(orchestrator.retry_base_delay_ms),
                    ..Default::default()
                },
                drive_mode: orchestrator.drive_mode,
                max_transitions: orchestrator.max_transitions,
                metrics_window_minutes: orchestrator.metrics_window_minutes,
                default_version: orchestrator.default_version.clone(),
            },
            simulation: SimulationOptions {
                ci_failure_rate: settings.simulation.ci_failure_rate,
                unhealthy_rate: settings.simulation.unhealthy_rate,
                latency: Duration::from_millis(settings.simulation.latency_ms),
                seed: settings.simulation.seed,
            },
            static_site: StaticSiteOptions {
                api_url: settings.static_site.api_url.clone(),
                timeout: Duration::from_secs(settings.static_site.timeout_secs),
            },
            services: settings.services.clone(),
            plan_templates: settings.plan_templates.clone(),
        }
    }
}

/// Lifecycle options for the agent
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Run store backend
    pub backend: StoreBackend,

    /// Directory of the file backend
    pub runs_dir: Dir,

    /// Capacity of the memory backend
    pub capacity: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        let layout = StorageLayout::default();
        let runs_dir = layout.runs_dir();
        Self {
            layout,
            backend: StoreBackend::Memory,
            runs_dir,
            capacity: 1000,
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}
