//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::catalog::{ServiceCatalog, StaticCatalog};
use crate::deploy::orchestrator::Orchestrator;
use crate::deploy::planner::{DefaultPlanner, Planner, TemplatePlanner};
use crate::errors::AgentError;
use crate::storage::settings::StoreBackend;
use crate::store::{FileRunStore, InMemoryRunStore, RunStore};
use crate::tools::simulated::SimulatedGateway;
use crate::tools::static_site::StaticSiteClient;
use crate::tools::ToolGateway;

/// Main application state
pub struct AppState {
    /// Agent version string
    pub agent_version: String,

    /// Run persistence
    pub store: Arc<dyn RunStore>,

    /// Deployment orchestrator
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Wire the catalog, planner, gateway and store into an orchestrator
    pub async fn init(agent_version: String, options: &AppOptions) -> Result<Self, AgentError> {
        let catalog: Arc<dyn ServiceCatalog> =
            Arc::new(StaticCatalog::with_demo_services(options.services.clone()));

        let planner: Arc<dyn Planner> = if options.plan_templates.is_empty() {
            Arc::new(DefaultPlanner)
        } else {
            Arc::new(TemplatePlanner::from_names(&options.plan_templates)?)
        };

        let static_site = StaticSiteClient::new(&options.static_site)?;
        if static_site.is_mock() {
            info!("Static site deployments use the mock backend");
        }
        let gateway: Arc<dyn ToolGateway> = Arc::new(SimulatedGateway::from_options(
            options.simulation.clone(),
            static_site,
        ));

        let store: Arc<dyn RunStore> = match options.storage.backend {
            StoreBackend::Memory => {
                info!("Using in-memory run store (capacity {})", options.storage.capacity);
                Arc::new(InMemoryRunStore::new(options.storage.capacity))
            }
            StoreBackend::File => {
                let dir = options.storage.runs_dir.clone();
                dir.create().await?;
                info!("Using file run store at {}", dir.path().display());
                Arc::new(FileRunStore::new(dir))
            }
        };

        let orchestrator = Arc::new(Orchestrator::new(
            catalog,
            planner,
            gateway,
            store.clone(),
            options.orchestrator.clone(),
        ));

        Ok(Self {
            agent_version,
            store,
            orchestrator,
        })
    }

    /// Release resources held by the state
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        let runs = self.store.list().await?;
        info!("Shutting down with {} runs persisted", runs.len());
        Ok(())
    }
}
