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

//! Request and response shapes shared by the HTTP and MCP surfaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracesession_core::{ResourceProfile, Session, SessionStatus, ViewerType};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CreateSessionRequest {
    pub workload_uid: String,
    pub profiler_file_id: i32,
    #[serde(default)]
    pub ttl_minutes: Option<i64>,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub resource_profile: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtendSessionRequest {
    pub extend_minutes: i64,
    #[serde(default)]
    pub cluster: Option<String>,
}

/// Progress report from the provisioner side.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportStatusRequest {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub pod_name: Option<String>,
    #[serde(default)]
    pub pod_ip: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListSessionsQuery {
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub workload_uid: Option<String>,
    /// Defaults to true unless a status filter is given.
    #[serde(default)]
    pub active_only: Option<bool>,
}

// ============================================================================
// Responses
// ============================================================================

/// Public projection of a session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub workload_uid: String,
    pub profiler_file_id: i32,
    pub cluster_name: String,
    pub viewer_type: ViewerType,
    pub status: SessionStatus,
    pub status_message: String,
    pub resource_profile: ResourceProfile,
    pub pod_name: Option<String>,
    pub pod_ip: Option<String>,
    pub pod_namespace: String,
    pub pod_port: u16,
    /// Empty unless the viewer is ready.
    pub ui_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_ready_seconds: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl SessionView {
    pub fn from_session(session: &Session, estimated_ready_seconds: u32) -> Self {
        let viewer_type = session.viewer_type();
        let ui_path = if session.status == SessionStatus::Ready {
            viewer_type.ui_path(&session.session_id)
        } else {
            String::new()
        };
        Self {
            session_id: session.session_id.clone(),
            workload_uid: session.workload_uid.clone(),
            profiler_file_id: session.profiler_file_id,
            cluster_name: session.cluster_name.clone(),
            viewer_type,
            status: session.status.clone(),
            status_message: session.status_message.clone(),
            resource_profile: session.resource_profile,
            pod_name: session.pod_name.clone(),
            pod_ip: session.pod_ip.clone(),
            pod_namespace: session.pod_namespace.clone(),
            pod_port: session.pod_port,
            ui_path,
            estimated_ready_seconds: session
                .status
                .is_starting()
                .then_some(estimated_ready_seconds),
            created_at: session.created_at,
            ready_at: session.ready_at,
            expires_at: session.expires_at,
            last_accessed_at: session.last_accessed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub workload_uid: String,
    pub profiler_file_id: i32,
    pub cluster_name: String,
    pub status: SessionStatus,
    pub viewer_type: ViewerType,
    pub resource_profile: ResourceProfile,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_ready_seconds: Option<u32>,
    /// An existing active session was returned instead of a new one.
    pub reused: bool,
}

impl CreateSessionResponse {
    pub fn new(session: &Session, reused: bool, estimated_ready_seconds: u32) -> Self {
        Self {
            session_id: session.session_id.clone(),
            workload_uid: session.workload_uid.clone(),
            profiler_file_id: session.profiler_file_id,
            cluster_name: session.cluster_name.clone(),
            status: session.status.clone(),
            viewer_type: session.viewer_type(),
            resource_profile: session.resource_profile,
            created_at: session.created_at,
            expires_at: session.expires_at,
            estimated_ready_seconds: session
                .status
                .is_starting()
                .then_some(estimated_ready_seconds),
            reused,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendSessionResponse {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionView>,
    pub total: usize,
}

impl ListSessionsResponse {
    pub fn new(sessions: Vec<SessionView>) -> Self {
        let total = sessions.len();
        Self { sessions, total }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub by_status: BTreeMap<String, usize>,
    /// Active sessions per cluster; omitted when scoped to one cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_cluster: Option<BTreeMap<String, usize>>,
}
