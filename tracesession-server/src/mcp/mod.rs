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

//! Model Context Protocol surface
//!
//! Exposes the session lifecycle of both viewers as MCP tools so AI agents
//! can open, inspect, extend and close viewer sessions. JSON-RPC 2.0 over
//! `POST /mcp`; every tool's arguments are validated against its JSON schema
//! before the call reaches a [`crate::lifecycle::SessionManager`].

pub mod handlers;
pub mod protocol;
pub mod server;
pub mod tools;

pub use handlers::MCPHandler;
pub use protocol::*;
pub use server::MCPServer;
pub use tools::{
    register_session_tools, McpTool, RegistrationError, ToolContext, ToolError, ToolListEntry,
    ToolRegistry, ToolResult,
};
