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

//! Session tools, one set per viewer flavor.
//!
//! Tool names are prefixed with the viewer (`perfetto_create_session`,
//! `tracelens_get_session`, ...). Arguments mirror the HTTP bodies and query
//! strings.

use crate::lifecycle::{
    CreateSessionRequest, ExtendSessionRequest, ListSessionsQuery, SessionManager,
};
use crate::mcp::tools::registry::{
    McpTool, RegistrationError, ToolContext, ToolError, ToolRegistry, ToolResult,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracesession_core::{ResourceProfile, MAX_EXTEND_MINUTES, MIN_EXTEND_MINUTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionOp {
    Create,
    Get,
    Extend,
    Delete,
    List,
    Stats,
}

impl SessionOp {
    const ALL: [SessionOp; 6] = [
        SessionOp::Create,
        SessionOp::Get,
        SessionOp::Extend,
        SessionOp::Delete,
        SessionOp::List,
        SessionOp::Stats,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            SessionOp::Create => "create_session",
            SessionOp::Get => "get_session",
            SessionOp::Extend => "extend_session",
            SessionOp::Delete => "delete_session",
            SessionOp::List => "list_sessions",
            SessionOp::Stats => "session_stats",
        }
    }

    fn description(&self, viewer: &str) -> String {
        match self {
            SessionOp::Create => format!(
                "Open a {} viewer session for a profiler file, reusing an active one if present",
                viewer
            ),
            SessionOp::Get => format!("Get a {} session, including its UI path once ready", viewer),
            SessionOp::Extend => format!(
                "Extend a {} session's expiry by {}-{} minutes",
                viewer, MIN_EXTEND_MINUTES, MAX_EXTEND_MINUTES
            ),
            SessionOp::Delete => format!("Delete a {} session and tear down its pod", viewer),
            SessionOp::List => format!("List {} sessions, newest first", viewer),
            SessionOp::Stats => format!("Count {} sessions by status and cluster", viewer),
        }
    }

    fn schema(&self) -> Value {
        let cluster = json!({
            "type": "string",
            "description": "Target cluster; defaults to the caller's cluster"
        });
        let session_id = json!({ "type": "string", "minLength": 1 });
        let profiles: Vec<&str> = ResourceProfile::ALL.iter().map(|p| p.as_str()).collect();

        match self {
            SessionOp::Create => json!({
                "type": "object",
                "properties": {
                    "workload_uid": { "type": "string", "minLength": 1 },
                    "profiler_file_id": { "type": "integer", "minimum": 1 },
                    "ttl_minutes": { "type": "integer" },
                    "cluster": cluster,
                    "resource_profile": { "type": "string", "enum": profiles }
                },
                "required": ["workload_uid", "profiler_file_id"]
            }),
            SessionOp::Get | SessionOp::Delete => json!({
                "type": "object",
                "properties": { "session_id": session_id, "cluster": cluster },
                "required": ["session_id"]
            }),
            SessionOp::Extend => json!({
                "type": "object",
                "properties": {
                    "session_id": session_id,
                    "extend_minutes": {
                        "type": "integer",
                        "minimum": MIN_EXTEND_MINUTES,
                        "maximum": MAX_EXTEND_MINUTES
                    },
                    "cluster": cluster
                },
                "required": ["session_id", "extend_minutes"]
            }),
            SessionOp::List => json!({
                "type": "object",
                "properties": {
                    "cluster": cluster,
                    "status": { "type": "string" },
                    "workload_uid": { "type": "string" },
                    "active_only": { "type": "boolean" }
                }
            }),
            SessionOp::Stats => json!({
                "type": "object",
                "properties": { "cluster": cluster }
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionRef {
    session_id: String,
    #[serde(default)]
    cluster: Option<String>,
    #[serde(default)]
    extend_minutes: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ClusterArg {
    #[serde(default)]
    cluster: Option<String>,
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

fn to_content<T: serde::Serialize>(value: &T) -> Result<ToolResult, ToolError> {
    serde_json::to_value(value)
        .map(|content| ToolResult { content })
        .map_err(|e| ToolError::Execution(e.to_string()))
}

/// Explicit argument first, then the caller default.
fn cluster_or_default(explicit: Option<String>, context: &ToolContext) -> Option<String> {
    explicit
        .filter(|c| !c.trim().is_empty())
        .or_else(|| context.caller_cluster.clone())
}

pub struct SessionTool {
    op: SessionOp,
    name: String,
    description: String,
    schema: Value,
    manager: Arc<SessionManager>,
}

impl SessionTool {
    fn new(op: SessionOp, manager: Arc<SessionManager>) -> Self {
        let viewer = manager.viewer().as_str();
        Self {
            op,
            name: format!("{}_{}", viewer, op.suffix()),
            description: op.description(viewer),
            schema: op.schema(),
            manager,
        }
    }
}

#[async_trait]
impl McpTool for SessionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let manager = &self.manager;
        match self.op {
            SessionOp::Create => {
                let mut request: CreateSessionRequest = parse(params)?;
                request.cluster = cluster_or_default(request.cluster, context);
                to_content(&manager.create(request).await?)
            }
            SessionOp::Get => {
                let args: SessionRef = parse(params)?;
                let cluster = cluster_or_default(args.cluster, context);
                to_content(&manager.get(&args.session_id, cluster.as_deref()).await?)
            }
            SessionOp::Extend => {
                let args: SessionRef = parse(params)?;
                let request = ExtendSessionRequest {
                    extend_minutes: args.extend_minutes,
                    cluster: cluster_or_default(args.cluster, context),
                };
                to_content(&manager.extend(&args.session_id, request).await?)
            }
            SessionOp::Delete => {
                let args: SessionRef = parse(params)?;
                let cluster = cluster_or_default(args.cluster, context);
                to_content(&manager.delete(&args.session_id, cluster.as_deref()).await?)
            }
            SessionOp::List => {
                let query: ListSessionsQuery = parse(params)?;
                to_content(&manager.list(query).await?)
            }
            SessionOp::Stats => {
                let args: ClusterArg = parse(params)?;
                to_content(&manager.stats(args.cluster.as_deref()).await?)
            }
        }
    }
}

/// Lists the pod sizes a session can request.
pub struct ResourceProfilesTool {
    schema: Value,
}

impl Default for ResourceProfilesTool {
    fn default() -> Self {
        Self {
            schema: json!({ "type": "object", "properties": {} }),
        }
    }
}

#[async_trait]
impl McpTool for ResourceProfilesTool {
    fn name(&self) -> &str {
        "list_resource_profiles"
    }

    fn description(&self) -> &str {
        "List the resource profiles (pod sizes) available for viewer sessions"
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, _params: Value, _context: &ToolContext) -> Result<ToolResult, ToolError> {
        let profiles: Vec<_> = ResourceProfile::ALL.iter().map(|p| p.info()).collect();
        to_content(&json!({ "profiles": profiles }))
    }
}

/// Register the session tools of every manager plus the shared profile tool.
pub fn register_session_tools(
    registry: &ToolRegistry,
    managers: &[Arc<SessionManager>],
) -> Result<(), RegistrationError> {
    for manager in managers {
        for op in SessionOp::ALL {
            registry.register(Arc::new(SessionTool::new(op, manager.clone())))?;
        }
    }
    registry.register(Arc::new(ResourceProfilesTool::default()))
}
