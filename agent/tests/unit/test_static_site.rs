//! Static-site client against a local deployment API

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use kgarden::models::run::StaticSiteParams;
use kgarden::tools::static_site::{StaticSiteClient, StaticSiteOptions};
use kgarden::tools::ToolResult;

type Received = Arc<Mutex<Vec<Value>>>;

async fn deploy_ok(State(received): State<Received>, Json(body): Json<Value>) -> Json<Value> {
    let app_name = body["app_name"].as_str().unwrap_or_default().to_string();
    received.lock().unwrap().push(body);
    Json(json!({"status": "deployed", "url": format!("https://{}.sites.test", app_name)}))
}

async fn deploy_broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "lambda exploded")
}

/// Serve a fake deployment API on an ephemeral port
async fn spawn_api(received: Received) -> String {
    let app = Router::new()
        .route("/deploy", post(deploy_ok))
        .route("/broken", post(deploy_broken))
        .with_state(received);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(url: String) -> StaticSiteClient {
    StaticSiteClient::new(&StaticSiteOptions {
        api_url: Some(url),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn test_posts_payload_and_returns_response() {
    let received: Received = Arc::default();
    let base = spawn_api(received.clone()).await;

    let params = StaticSiteParams::with_defaults(
        "demo-frontend",
        Some("https://github.com/user/demo-frontend".to_string()),
        Some("landing".to_string()),
        None,
        Some("build".to_string()),
        None,
        Some("ghp_secret".to_string()),
    );
    let result = client(format!("{}/deploy", base)).deploy(&params).await;

    match result {
        ToolResult::Success { fields } => {
            assert_eq!(fields["response"]["url"], "https://landing.sites.test");
        }
        ToolResult::Failure { error } => panic!("unexpected failure: {}", error),
    }

    let received = received.lock().unwrap();
    assert_eq!(
        received[0],
        json!({
            "github_token": "ghp_secret",
            "repo_url": "https://github.com/user/demo-frontend",
            "app_name": "landing",
            "branch": "main",
            "output_dir": "build",
            "build_command": "npm run build",
        })
    );
}

#[tokio::test]
async fn test_api_error_becomes_failure() {
    let base = spawn_api(Arc::default()).await;
    let params = StaticSiteParams::with_defaults("site", None, None, None, None, None, None);

    let result = client(format!("{}/broken", base)).deploy(&params).await;
    match result {
        ToolResult::Failure { error } => assert!(error.contains("lambda exploded")),
        ToolResult::Success { .. } => panic!("expected failure"),
    }
}

#[test]
fn test_token_is_redacted_in_debug() {
    let params = StaticSiteParams::with_defaults(
        "site",
        None,
        None,
        None,
        None,
        None,
        Some("ghp_secret".to_string()),
    );
    let debug = format!("{:?}", params);
    assert!(!debug.contains("ghp_secret"));
    assert!(debug.contains("<redacted>"));
}
