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

//! MCP Request Handlers
//!
//! Dispatches JSON-RPC 2.0 requests to the tool registry.

use crate::mcp::protocol::*;
use crate::mcp::tools::{ToolContext, ToolError, ToolRegistry};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracesession_core::SessionError;
use tracing::{error, info, warn};

/// MCP request handler
pub struct MCPHandler {
    tools: Arc<ToolRegistry>,
}

impl MCPHandler {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        context: &ToolContext,
    ) -> JsonRpcResponse {
        info!(method = %request.method, "MCP request received");

        if request.jsonrpc != JSONRPC_VERSION {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request(format!(
                    "Unsupported jsonrpc version: {}",
                    request.jsonrpc
                )),
            );
        }

        match request.method.as_str() {
            "ping" => JsonRpcResponse::success(request.id, json!({})),

            "initialize" => self.handle_initialize(request.id, request.params),
            "initialized" | "notifications/initialized" => {
                JsonRpcResponse::success(request.id, json!({}))
            }

            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => {
                self.handle_tools_call(request.id, request.params, context)
                    .await
            }

            _ => {
                warn!(method = %request.method, "Unknown MCP method");
                JsonRpcResponse::error(request.id, JsonRpcError::method_not_found(&request.method))
            }
        }
    }

    fn handle_initialize(
        &self,
        id: JsonRpcId,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        let init_params: InitializeParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)),
                    )
                }
            },
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing initialize params"),
                )
            }
        };
        info!(
            client = %init_params.client_info.name,
            client_version = %init_params.client_info.version,
            protocol = %init_params.protocol_version,
            "MCP client initializing"
        );

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        respond(id, &result)
    }

    fn handle_tools_list(&self, id: JsonRpcId) -> JsonRpcResponse {
        let tools = self
            .tools
            .list()
            .into_iter()
            .map(|entry| Tool {
                name: entry.name,
                description: Some(entry.description),
                input_schema: entry.input_schema,
            })
            .collect();

        respond(
            id,
            &ListToolsResult {
                tools,
                next_cursor: None,
            },
        )
    }

    async fn handle_tools_call(
        &self,
        id: JsonRpcId,
        params: Option<serde_json::Value>,
        context: &ToolContext,
    ) -> JsonRpcResponse {
        let call_params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid tool call params: {}", e)),
                    )
                }
            },
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing tool call params"),
                )
            }
        };

        info!(tool = %call_params.name, "Executing MCP tool");

        let arguments = serde_json::Value::Object(call_params.arguments.into_iter().collect());
        match self.tools.execute(&call_params.name, arguments, context).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result.content)
                    .unwrap_or_else(|_| result.content.to_string());
                respond(id, &CallToolResult::text(text))
            }
            Err(e) => tool_error_response(id, &call_params.name, e),
        }
    }
}

/// Invalid input is a protocol error. A missing session is a tool result the
/// model can act on. Everything else is an internal error.
fn tool_error_response(id: JsonRpcId, tool: &str, err: ToolError) -> JsonRpcResponse {
    match err {
        ToolError::NotFound(name) => {
            JsonRpcResponse::error(id, JsonRpcError::invalid_params(format!("Unknown tool: {}", name)))
        }
        ToolError::InvalidParams(message) => {
            JsonRpcResponse::error(id, JsonRpcError::invalid_params(message))
        }
        ToolError::Session(e @ SessionError::InvalidArgument(_)) => JsonRpcResponse::error(
            id,
            JsonRpcError::invalid_params(e.to_string()).with_data(json!({ "code": e.code() })),
        ),
        ToolError::Session(e @ (SessionError::NotFound(_) | SessionError::ClusterNotFound(_))) => {
            respond(id, &CallToolResult::failure(format!("{}: {}", e.code(), e)))
        }
        ToolError::Session(e) => {
            error!(tool, error = %e, "MCP tool failed");
            JsonRpcResponse::error(
                id,
                JsonRpcError::internal_error(e.to_string()).with_data(json!({ "code": e.code() })),
            )
        }
        ToolError::Execution(message) => {
            error!(tool, error = %message, "MCP tool failed");
            JsonRpcResponse::error(id, JsonRpcError::internal_error(message))
        }
    }
}

fn respond<T: Serialize>(id: JsonRpcId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
    }
}
