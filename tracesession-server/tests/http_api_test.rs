// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Router-level tests: HTTP session routes, health and the MCP endpoint.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tracesession_core::ManualClock;
use tracesession_server::config::ServerConfig;
use tracesession_server::provisioner::RecordingGateway;
use tracesession_server::{build_app, App};

fn app_with(config: ServerConfig) -> App {
    build_app(
        &config,
        Arc::new(RecordingGateway::new()),
        Arc::new(ManualClock::new(Utc::now())),
    )
    .unwrap()
}

fn app() -> Router {
    let mut config = ServerConfig::default();
    config.clusters.names = vec!["gpu-a".to_string()];
    app_with(config).router
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    cluster: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cluster) = cluster {
        builder = builder.header("X-Cluster-Name", cluster);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn mcp(app: &Router, method: &str, params: Value) -> Value {
    let request = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
    let (status, body) = send(app, "POST", "/mcp", Some(request), None).await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["registry"]["layout"], "centralized");
    assert_eq!(body["registry"]["clusters"], json!(["default", "gpu-a"]));
}

#[tokio::test]
async fn test_session_routes() {
    let app = app();
    let create = json!({ "workload_uid": "wl-42", "profiler_file_id": 7 });

    let (status, created) =
        send(&app, "POST", "/api/v1/perfetto/sessions", Some(create.clone()), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["reused"], false);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["estimated_ready_seconds"], 30);
    let id = created["session_id"].as_str().unwrap().to_string();
    assert!(id.starts_with("pfs-"));

    let (status, reused) =
        send(&app, "POST", "/api/v1/perfetto/sessions", Some(create), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reused["session_id"], id.as_str());
    assert_eq!(reused["reused"], true);

    let uri = format!("/api/v1/perfetto/sessions/{}", id);
    let (status, view) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["session_id"], id.as_str());

    let (status, err) = send(&app, "PATCH", &uri, Some(json!({ "extend_minutes": 0 })), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "INVALID_ARGUMENT");

    let (status, ext) = send(&app, "PATCH", &uri, Some(json!({ "extend_minutes": 15 })), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ext["message"], "Session extended by 15 minutes");

    let (status, listed) = send(&app, "GET", "/api/v1/perfetto/sessions", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);

    let (status, listed) = send(&app, "GET", "/api/v1/tracelens/sessions", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 0);

    let (status, body) = send(&app, "DELETE", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], format!("Session {} deleted", id));

    let (status, view) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "deleted");
    assert_eq!(view["ui_path"], "");

    let (status, stats) = send(&app, "GET", "/api/v1/perfetto/sessions/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["by_status"]["deleted"], 1);
}

#[tokio::test]
async fn test_errors() {
    let app = app();

    let (status, err) = send(&app, "GET", "/api/v1/tracelens/sessions/tls-nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["code"], "NOT_FOUND");

    let (status, err) = send(&app, "DELETE", "/api/v1/tracelens/sessions/tls-nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["code"], "NOT_FOUND");

    let (status, err) = send(
        &app,
        "POST",
        "/api/v1/tracelens/sessions",
        Some(json!({ "workload_uid": "", "profiler_file_id": 1 })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "INVALID_ARGUMENT");

    let (status, err) = send(
        &app,
        "POST",
        "/api/v1/tracelens/sessions",
        Some(json!({ "profiler_file_id": "seven" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_cluster_header_is_the_caller_default() {
    let app = app();
    let create = json!({ "workload_uid": "wl-1", "profiler_file_id": 1 });

    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/tracelens/sessions",
        Some(create.clone()),
        Some("gpu-a"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["cluster_name"], "gpu-a");

    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/tracelens/sessions?cluster=default",
        Some(json!({ "workload_uid": "wl-2", "profiler_file_id": 1 })),
        Some("gpu-a"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["cluster_name"], "default");

    let (status, err) = send(
        &app,
        "POST",
        "/api/v1/tracelens/sessions",
        Some(create),
        Some("gpu-z"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["code"], "CLUSTER_NOT_FOUND");

    let (status, stats) = send(&app, "GET", "/api/v1/tracelens/sessions/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["by_cluster"]["gpu-a"], 1);
    assert_eq!(stats["by_cluster"]["default"], 1);
}

#[tokio::test]
async fn test_status_report_and_touch() {
    let app = app();
    let (_, created) = send(
        &app,
        "POST",
        "/api/v1/tracelens/sessions",
        Some(json!({ "workload_uid": "wl-3", "profiler_file_id": 2 })),
        None,
    )
    .await;
    let id = created["session_id"].as_str().unwrap().to_string();

    let (status, view) = send(
        &app,
        "PUT",
        &format!("/api/v1/tracelens/sessions/{}/status", id),
        Some(json!({ "status": "ready", "pod_ip": "10.1.1.1" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "ready");
    assert_eq!(view["ui_path"], format!("/api/v1/tracelens/sessions/{}/ui/", id));

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/tracelens/sessions/{}/touch", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, listed) = send(&app, "GET", "/api/v1/tracelens/workloads/wl-3/sessions", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);
}

#[tokio::test]
async fn test_unknown_status_passes_through() {
    let app = app();
    let (_, created) = send(
        &app,
        "POST",
        "/api/v1/perfetto/sessions",
        Some(json!({ "workload_uid": "wl-4", "profiler_file_id": 1 })),
        None,
    )
    .await;
    let id = created["session_id"].as_str().unwrap().to_string();
    let status_uri = format!("/api/v1/perfetto/sessions/{}/status", id);

    let (status, view) = send(
        &app,
        "PUT",
        &status_uri,
        Some(json!({ "status": "initializing", "message": "pulling image" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "initializing");
    assert_eq!(view["status_message"], "pulling image");

    let (_, listed) = send(&app, "GET", "/api/v1/perfetto/sessions", None, None).await;
    assert_eq!(listed["total"], 0);
    let (_, listed) = send(
        &app,
        "GET",
        "/api/v1/perfetto/sessions?status=initializing",
        None,
        None,
    )
    .await;
    assert_eq!(listed["total"], 1);

    let (status, body) = send(&app, "PUT", &status_uri, Some(json!({ "status": "pending" })), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_resource_profiles() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/v1/perfetto/resource-profiles", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let profiles = body["profiles"].as_array().unwrap();
    assert_eq!(profiles.len(), 3);
    assert!(profiles
        .iter()
        .any(|p| p["value"] == "medium" && p["is_default"] == true));
}

#[tokio::test]
async fn test_mcp_tools() {
    let app = app();

    let init = mcp(
        &app,
        "initialize",
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "test", "version": "0.0.1" }
        }),
    )
    .await;
    assert_eq!(init["result"]["serverInfo"]["name"], "tracesession-mcp");

    let listed = mcp(&app, "tools/list", json!({})).await;
    let names: Vec<&str> = listed["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 13);
    assert!(names.contains(&"perfetto_create_session"));
    assert!(names.contains(&"tracelens_session_stats"));
    assert!(names.contains(&"list_resource_profiles"));

    let created = mcp(
        &app,
        "tools/call",
        json!({
            "name": "tracelens_create_session",
            "arguments": { "workload_uid": "wl-9", "profiler_file_id": 3 }
        }),
    )
    .await;
    let text = created["result"]["content"][0]["text"].as_str().unwrap();
    let session: Value = serde_json::from_str(text).unwrap();
    assert!(session["session_id"].as_str().unwrap().starts_with("tls-"));

    let missing = mcp(
        &app,
        "tools/call",
        json!({ "name": "tracelens_get_session", "arguments": { "session_id": "tls-nope" } }),
    )
    .await;
    assert_eq!(missing["result"]["isError"], true);

    let invalid = mcp(
        &app,
        "tools/call",
        json!({
            "name": "tracelens_extend_session",
            "arguments": { "session_id": session["session_id"], "extend_minutes": 0 }
        }),
    )
    .await;
    assert_eq!(invalid["error"]["code"], -32602);

    let unknown = mcp(&app, "resources/list", json!({})).await;
    assert_eq!(unknown["error"]["code"], -32601);

    let pong = mcp(&app, "ping", json!({})).await;
    assert_eq!(pong["result"], json!({}));
}
