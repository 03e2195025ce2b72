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

use crate::status::{InvalidTransition, SessionStatus};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures of the session store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("session {session_id} is {status} and cannot be extended")]
    NotExtendable {
        session_id: String,
        status: SessionStatus,
    },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Database error: {0}")]
    Database(#[source] StoreError),

    /// Reserved for sessions whose pod failed; this is recorded as
    /// `status = failed` by the provisioner and never returned synchronously.
    #[error("Provisioning failure: {0}")]
    ProvisioningFailure(String),
}

impl SessionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidArgument(_) => "INVALID_ARGUMENT",
            SessionError::NotFound(_) => "NOT_FOUND",
            SessionError::ClusterNotFound(_) => "CLUSTER_NOT_FOUND",
            SessionError::Database(_) => "DATABASE_ERROR",
            SessionError::ProvisioningFailure(_) => "PROVISIONING_FAILURE",
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        SessionError::InvalidArgument(message.into())
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SessionError::NotFound(id),
            StoreError::InvalidTransition(t) => SessionError::InvalidArgument(t.to_string()),
            e @ StoreError::NotExtendable { .. } => SessionError::InvalidArgument(e.to_string()),
            other => SessionError::Database(other),
        }
    }
}
