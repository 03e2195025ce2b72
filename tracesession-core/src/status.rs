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

//! Session status state machine.
//!
//! ```text
//! pending ──► creating ──► ready ──► expired
//!    │            │          └─────► deleted
//!    └────────────┴──► failed ──► {expired | deleted}
//! ```
//!
//! Statuses the provisioner reports that this crate does not know about are
//! carried verbatim as [`SessionStatus::Other`] instead of being rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionStatus {
    Pending,
    Creating,
    Ready,
    Failed,
    Expired,
    Deleted,
    /// Unrecognized status string, passed through unchanged
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status transition: {current} -> {next}")]
pub struct InvalidTransition {
    pub current: SessionStatus,
    pub next: SessionStatus,
}

impl SessionStatus {
    /// Statuses that count as holding a viewer for dedup purposes.
    pub const ACTIVE: [SessionStatus; 3] = [
        SessionStatus::Pending,
        SessionStatus::Creating,
        SessionStatus::Ready,
    ];

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => SessionStatus::Pending,
            "creating" => SessionStatus::Creating,
            "ready" => SessionStatus::Ready,
            "failed" => SessionStatus::Failed,
            "expired" => SessionStatus::Expired,
            "deleted" => SessionStatus::Deleted,
            other => SessionStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Creating => "creating",
            SessionStatus::Ready => "ready",
            SessionStatus::Failed => "failed",
            SessionStatus::Expired => "expired",
            SessionStatus::Deleted => "deleted",
            SessionStatus::Other(s) => s,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionStatus::Pending | SessionStatus::Creating | SessionStatus::Ready
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Failed | SessionStatus::Expired | SessionStatus::Deleted
        )
    }

    /// Still waiting on the provisioner.
    pub fn is_starting(&self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Creating)
    }

    /// Position in the lifecycle; `None` for pass-through statuses.
    fn rank(&self) -> Option<u8> {
        match self {
            SessionStatus::Pending => Some(0),
            SessionStatus::Creating => Some(1),
            SessionStatus::Ready => Some(2),
            SessionStatus::Failed | SessionStatus::Expired | SessionStatus::Deleted => Some(3),
            SessionStatus::Other(_) => None,
        }
    }

    /// Validate a move to `next`. Re-asserting the current status is allowed.
    /// `pending` is only ever an initial state, so no move may lead into it.
    pub fn transition(&self, next: SessionStatus) -> Result<SessionStatus, InvalidTransition> {
        use SessionStatus::*;

        if *self == next {
            return Ok(next);
        }

        let allowed = match (self, &next) {
            // cleanup of a failed session
            (Failed, Expired | Deleted) => true,
            (current, _) if current.is_terminal() => false,
            (_, Pending) => false,
            (_, Other(_)) => true,
            (Other(_), _) => true,
            (current, next) => match (current.rank(), next.rank()) {
                (Some(a), Some(b)) => b > a,
                _ => false,
            },
        };

        if allowed {
            Ok(next)
        } else {
            Err(InvalidTransition {
                current: self.clone(),
                next,
            })
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Pending
    }
}

impl From<String> for SessionStatus {
    fn from(s: String) -> Self {
        SessionStatus::parse(&s)
    }
}

impl From<SessionStatus> for String {
    fn from(status: SessionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
