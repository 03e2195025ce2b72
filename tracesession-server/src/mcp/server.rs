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

//! MCP Server Implementation
//!
//! JSON-RPC over HTTP POST. The `X-Cluster-Name` header sets the cluster
//! tools fall back to when a call names none.

use crate::api::CallerCluster;
use crate::mcp::handlers::MCPHandler;
use crate::mcp::protocol::*;
use crate::mcp::tools::{ToolContext, ToolRegistry};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::warn;

/// MCP Server state
#[derive(Clone)]
pub struct MCPServerState {
    pub handler: Arc<MCPHandler>,
    pub tools: Arc<ToolRegistry>,
}

/// MCP Server
pub struct MCPServer {
    state: MCPServerState,
}

impl MCPServer {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        let handler = Arc::new(MCPHandler::new(tools.clone()));
        Self {
            state: MCPServerState { handler, tools },
        }
    }

    /// Get the Axum router for the MCP server
    pub fn router(&self) -> Router {
        Router::new()
            .route("/mcp", post(handle_mcp_request))
            .route("/mcp/health", get(handle_mcp_health))
            .with_state(self.state.clone())
    }
}

/// GET /mcp/health
async fn handle_mcp_health(State(state): State<MCPServerState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "protocol_version": MCP_PROTOCOL_VERSION,
        "server_name": SERVER_NAME,
        "server_version": env!("CARGO_PKG_VERSION"),
        "tools": state.tools.len(),
    }))
}

/// POST /mcp
async fn handle_mcp_request(
    State(state): State<MCPServerState>,
    caller: CallerCluster,
    payload: Result<Json<JsonRpcRequest>, JsonRejection>,
) -> Json<JsonRpcResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection, "Invalid JSON-RPC request");
            return Json(JsonRpcResponse::error(
                JsonRpcId::Null,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", rejection.body_text())),
            ));
        }
    };

    let context = ToolContext {
        caller_cluster: caller.0,
    };
    Json(state.handler.handle_request(request, &context).await)
}
