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

//! Session endpoints, mounted once per viewer flavor.

use crate::api::{ApiError, CallerCluster};
use crate::lifecycle::{
    CreateSessionRequest, CreateSessionResponse, ExtendSessionRequest, ExtendSessionResponse,
    ListSessionsQuery, ListSessionsResponse, MessageResponse, ReportStatusRequest, SessionManager,
    SessionStats, SessionView,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracesession_core::{ResourceProfile, ResourceProfileInfo};
use tracing::debug;

type Manager = Arc<SessionManager>;

/// `?cluster=` on single-session routes.
#[derive(Debug, Default, Deserialize)]
pub struct ClusterQuery {
    #[serde(default)]
    pub cluster: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceProfilesResponse {
    pub profiles: Vec<ResourceProfileInfo>,
}

pub fn sessions_router<S>(manager: Manager) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/stats", get(session_stats))
        .route(
            "/sessions/:session_id",
            get(get_session).patch(extend_session).delete(delete_session),
        )
        .route("/sessions/:session_id/status", put(report_status))
        .route("/sessions/:session_id/touch", post(touch_session))
        .route("/workloads/:workload_uid/sessions", get(list_workload_sessions))
        .route("/resource-profiles", get(list_resource_profiles))
        .with_state(manager)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// POST /sessions - 201 for a new session, 200 when an active one is reused
#[tracing::instrument(skip(manager, payload), fields(viewer = %manager.viewer()))]
pub async fn create_session(
    State(manager): State<Manager>,
    caller: CallerCluster,
    Query(query): Query<ClusterQuery>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let mut request = body(payload)?;
    request.cluster = caller.or_explicit(request.cluster.or(query.cluster));

    let response = manager.create(request).await?;
    let status = if response.reused {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(response)))
}

/// GET /sessions
#[tracing::instrument(skip(manager), fields(viewer = %manager.viewer()))]
pub async fn list_sessions(
    State(manager): State<Manager>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    debug!("Listing sessions with params: {:?}", query);
    Ok(Json(manager.list(query).await?))
}

/// GET /sessions/stats
#[tracing::instrument(skip(manager), fields(viewer = %manager.viewer()))]
pub async fn session_stats(
    State(manager): State<Manager>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<SessionStats>, ApiError> {
    Ok(Json(manager.stats(query.cluster.as_deref()).await?))
}

#[tracing::instrument(skip(manager), fields(viewer = %manager.viewer()))]
pub async fn get_session(
    State(manager): State<Manager>,
    Path(session_id): Path<String>,
    caller: CallerCluster,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<SessionView>, ApiError> {
    let cluster = caller.or_explicit(query.cluster);
    Ok(Json(manager.get(&session_id, cluster.as_deref()).await?))
}

/// PATCH /sessions/:session_id - extend the TTL
#[tracing::instrument(skip(manager, payload), fields(viewer = %manager.viewer()))]
pub async fn extend_session(
    State(manager): State<Manager>,
    Path(session_id): Path<String>,
    caller: CallerCluster,
    Query(query): Query<ClusterQuery>,
    payload: Result<Json<ExtendSessionRequest>, JsonRejection>,
) -> Result<Json<ExtendSessionResponse>, ApiError> {
    let mut request = body(payload)?;
    request.cluster = caller.or_explicit(request.cluster.or(query.cluster));
    Ok(Json(manager.extend(&session_id, request).await?))
}

#[tracing::instrument(skip(manager), fields(viewer = %manager.viewer()))]
pub async fn delete_session(
    State(manager): State<Manager>,
    Path(session_id): Path<String>,
    caller: CallerCluster,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let cluster = caller.or_explicit(query.cluster);
    Ok(Json(manager.delete(&session_id, cluster.as_deref()).await?))
}

/// PUT /sessions/:session_id/status - provisioner progress callback
#[tracing::instrument(skip(manager, payload), fields(viewer = %manager.viewer()))]
pub async fn report_status(
    State(manager): State<Manager>,
    Path(session_id): Path<String>,
    caller: CallerCluster,
    payload: Result<Json<ReportStatusRequest>, JsonRejection>,
) -> Result<Json<SessionView>, ApiError> {
    let mut request = body(payload)?;
    request.cluster = caller.or_explicit(request.cluster);
    Ok(Json(manager.report_status(&session_id, request).await?))
}

#[tracing::instrument(skip(manager), fields(viewer = %manager.viewer()))]
pub async fn touch_session(
    State(manager): State<Manager>,
    Path(session_id): Path<String>,
    caller: CallerCluster,
    Query(query): Query<ClusterQuery>,
) -> Result<StatusCode, ApiError> {
    let cluster = caller.or_explicit(query.cluster);
    manager.touch(&session_id, cluster.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(manager), fields(viewer = %manager.viewer()))]
pub async fn list_workload_sessions(
    State(manager): State<Manager>,
    Path(workload_uid): Path<String>,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    Ok(Json(manager.list_workload_sessions(&workload_uid).await?))
}

pub async fn list_resource_profiles() -> Json<ResourceProfilesResponse> {
    Json(ResourceProfilesResponse {
        profiles: ResourceProfile::ALL.iter().map(|p| p.info()).collect(),
    })
}
