//! Service metadata

use serde::{Deserialize, Serialize};

use crate::models::plan::FRONTEND_SERVICE_TYPE;

/// Metadata describing a deployable service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    pub id: String,

    #[serde(default)]
    pub repo_url: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub current_version: String,

    /// Service type, e.g. `backend` or `frontend`
    #[serde(rename = "type", default = "default_service_type")]
    pub service_type: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_service_type() -> String {
    "backend".to_string()
}

impl ServiceMetadata {
    pub fn is_frontend(&self) -> bool {
        self.service_type == FRONTEND_SERVICE_TYPE
    }
}
