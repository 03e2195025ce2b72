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

//! HTTP API
//!
//! Session routes are mounted once per viewer flavor:
//!
//! ```text
//! /api/v1/perfetto/...   -> SessionManager(Perfetto)
//! /api/v1/tracelens/...  -> SessionManager(TraceLens)
//! /health
//! ```

pub mod health;
pub mod sessions;

pub use health::health_check;
pub use sessions::sessions_router;

use crate::lifecycle::SessionManager;
use crate::provisioner::ProvisioningOutbox;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracesession_core::{SessionError, ViewerType};
use tracesession_storage::RegistryLayout;
use tracing::error;

/// Header carrying the caller's default cluster.
pub const CLUSTER_HEADER: &str = "x-cluster-name";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
            ApiError::Session(e) => {
                let status = match e {
                    SessionError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                    SessionError::NotFound(_) | SessionError::ClusterNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    SessionError::Database(_) | SessionError::ProvisioningFailure(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.code())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        if status.is_server_error() {
            error!(code, error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub perfetto: Arc<SessionManager>,
    pub tracelens: Arc<SessionManager>,
    pub outbox: ProvisioningOutbox,
    pub layout: RegistryLayout,
    pub clusters: Vec<String>,
    pub started_at: Instant,
}

impl AppState {
    pub fn manager(&self, viewer: ViewerType) -> &Arc<SessionManager> {
        match viewer {
            ViewerType::Perfetto => &self.perfetto,
            ViewerType::Tracelens => &self.tracelens,
        }
    }
}

/// Cluster the caller defaults to, from the `X-Cluster-Name` header.
///
/// Only consulted when the request itself names no cluster.
#[derive(Debug, Clone, Default)]
pub struct CallerCluster(pub Option<String>);

impl CallerCluster {
    /// The explicit request value if present, else the caller default.
    pub fn or_explicit(&self, explicit: Option<String>) -> Option<String> {
        explicit
            .filter(|c| !c.trim().is_empty())
            .or_else(|| self.0.clone())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerCluster
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let cluster = parts
            .headers
            .get(CLUSTER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Ok(CallerCluster(cluster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let err = ApiError::from(SessionError::invalid("bad"));
        assert_eq!(err.parts(), (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"));

        let err = ApiError::from(SessionError::ClusterNotFound("gpu-z".into()));
        assert_eq!(err.parts(), (StatusCode::NOT_FOUND, "CLUSTER_NOT_FOUND"));

        let err = ApiError::from(SessionError::Database(
            tracesession_core::StoreError::Unavailable("down".into()),
        ));
        assert_eq!(err.parts(), (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"));
    }

    #[test]
    fn test_explicit_cluster_wins_over_header() {
        let caller = CallerCluster(Some("gpu-b".to_string()));
        assert_eq!(caller.or_explicit(Some("gpu-a".into())).as_deref(), Some("gpu-a"));
        assert_eq!(caller.or_explicit(Some(" ".into())).as_deref(), Some("gpu-b"));
        assert_eq!(CallerCluster::default().or_explicit(None), None);
    }
}
