//! Service metadata lookup

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::AgentError;
use crate::models::service::ServiceMetadata;

/// Source of service metadata used when planning a run
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// Resolve a service id; unknown services are a `LookupError`
    async fn lookup(&self, service_id: &str) -> Result<ServiceMetadata, AgentError>;
}

/// Catalog backed by a fixed set of services
pub struct StaticCatalog {
    services: HashMap<String, ServiceMetadata>,
}

impl StaticCatalog {
    pub fn new(services: impl IntoIterator<Item = ServiceMetadata>) -> Self {
        Self {
            services: services
                .into_iter()
                .map(|service| (service.id.clone(), service))
                .collect(),
        }
    }

    /// Catalog with the two demo services, extended (or overridden) by `extra`
    pub fn with_demo_services(extra: impl IntoIterator<Item = ServiceMetadata>) -> Self {
        Self::new(demo_services().into_iter().chain(extra))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[async_trait]
impl ServiceCatalog for StaticCatalog {
    async fn lookup(&self, service_id: &str) -> Result<ServiceMetadata, AgentError> {
        debug!("Looking up service metadata: {}", service_id);
        self.services
            .get(service_id)
            .cloned()
            .ok_or_else(|| AgentError::LookupError(format!("Service not found: {}", service_id)))
    }
}

fn demo_services() -> Vec<ServiceMetadata> {
    vec![
        ServiceMetadata {
            id: "demo-api".to_string(),
            repo_url: "https://github.com/user/demo-api".to_string(),
            namespace: "default".to_string(),
            current_version: "v1.0.0".to_string(),
            service_type: "backend".to_string(),
        },
        ServiceMetadata {
            id: "demo-frontend".to_string(),
            repo_url: "https://github.com/user/demo-frontend".to_string(),
            namespace: "default".to_string(),
            current_version: "v1.2.0".to_string(),
            service_type: "frontend".to_string(),
        },
    ]
}
