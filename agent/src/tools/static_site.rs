//! Static-site deployment API client

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::errors::AgentError;
use crate::models::run::StaticSiteParams;
use crate::tools::ToolResult;

/// API URL value that forces the built-in mock
pub const MOCK_SENTINEL: &str = "MOCK";

/// Static-site client options
#[derive(Debug, Clone)]
pub struct StaticSiteOptions {
    /// Deployment API endpoint; unset or `MOCK` uses the mock
    pub api_url: Option<String>,

    /// Bound on the whole HTTP exchange
    pub timeout: Duration,
}

impl Default for StaticSiteOptions {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize)]
struct DeployPayload<'a> {
    github_token: &'a str,
    repo_url: &'a str,
    app_name: &'a str,
    branch: &'a str,
    output_dir: &'a str,
    build_command: &'a str,
}

/// Client for the external static-site deployment API
pub struct StaticSiteClient {
    client: Client,
    api_url: Option<String>,
}

impl StaticSiteClient {
    pub fn new(options: &StaticSiteOptions) -> Result<Self, AgentError> {
        let client = Client::builder().timeout(options.timeout).build()?;
        let api_url = options
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty() && *url != MOCK_SENTINEL)
            .map(str::to_string);

        Ok(Self { client, api_url })
    }

    pub fn is_mock(&self) -> bool {
        self.api_url.is_none()
    }

    /// Trigger a deployment; transport and API errors become `Failure`
    pub async fn deploy(&self, params: &StaticSiteParams) -> ToolResult {
        let Some(api_url) = &self.api_url else {
            warn!("Using MOCK static site deployment for {}", params.app_name);
            return mock_success(&params.app_name);
        };

        info!("Triggering static site deployment for {}...", params.app_name);
        let payload = DeployPayload {
            github_token: &params.github_token,
            repo_url: &params.repo_url,
            app_name: &params.app_name,
            branch: &params.branch,
            output_dir: &params.output_dir,
            build_command: &params.build_command,
        };

        match self.post(api_url, &payload).await {
            Ok(response) => {
                debug!("Static site API responded: {}", response);
                let mut fields = Map::new();
                fields.insert("status".into(), json!("success"));
                fields.insert("response".into(), response);
                ToolResult::success(fields)
            }
            Err(e) => {
                error!("Static site deployment failed: {}", e);
                ToolResult::failure(e.to_string())
            }
        }
    }

    async fn post(&self, url: &str, payload: &DeployPayload<'_>) -> Result<Value, AgentError> {
        let response = self.client.post(url).json(payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ToolFailure(format!("{}: {}", status, body)));
        }

        let body = response.json().await?;
        Ok(body)
    }
}

fn mock_success(app_name: &str) -> ToolResult {
    let mut fields = Map::new();
    fields.insert("status".into(), json!("success"));
    fields.insert(
        "response".into(),
        json!({
            "message": "Mock deployment successful",
            "url": format!("https://{}.example.com", app_name),
        }),
    );
    ToolResult::success(fields)
}
