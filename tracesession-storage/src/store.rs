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

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracesession_core::{
    ActiveKey, Session, SessionPolicy, SessionStatus, StoreError, ViewerType,
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Predicate for list and count queries. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub cluster: Option<String>,
    pub viewer_type: Option<ViewerType>,
    pub workload_uid: Option<String>,
    pub status: Option<SessionStatus>,
    pub active_only: bool,
    pub exclude_deleted: bool,
}

impl SessionFilter {
    pub fn for_viewer(viewer_type: ViewerType) -> Self {
        Self {
            viewer_type: Some(viewer_type),
            ..Default::default()
        }
    }

    pub fn cluster(mut self, cluster: Option<String>) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn workload(mut self, workload_uid: Option<String>) -> Self {
        self.workload_uid = workload_uid;
        self
    }

    pub fn status(mut self, status: Option<SessionStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn active_only(mut self, active_only: bool) -> Self {
        self.active_only = active_only;
        self
    }

    pub fn exclude_deleted(mut self) -> Self {
        self.exclude_deleted = true;
        self
    }

    pub fn matches(&self, session: &Session) -> bool {
        if let Some(ref cluster) = self.cluster {
            if &session.cluster_name != cluster {
                return false;
            }
        }
        if let Some(viewer) = self.viewer_type {
            if session.viewer_type() != viewer {
                return false;
            }
        }
        if let Some(ref uid) = self.workload_uid {
            if &session.workload_uid != uid {
                return false;
            }
        }
        if let Some(ref status) = self.status {
            if &session.status != status {
                return false;
            }
        }
        if self.active_only && !session.is_active() {
            return false;
        }
        if self.exclude_deleted && session.status == SessionStatus::Deleted {
            return false;
        }
        true
    }
}

/// Keyed persistence of session records.
///
/// Implementations give read-your-writes per session id and apply each
/// single-record write atomically. There is no cross-record transaction:
/// `find_active` followed by `extend_expiry` on the returned record is two
/// independent calls.
pub trait SessionStore: Send + Sync {
    /// Registry name used in logs ("control-plane" or a cluster name).
    fn name(&self) -> &str;

    /// Insert a new record. Fails with `AlreadyExists` on id collision.
    fn insert(&self, session: Session) -> StoreResult<Session>;

    fn get(&self, session_id: &str) -> StoreResult<Option<Session>>;

    /// Move `expires_at` forward to `expires_at`. A value earlier than the
    /// stored one leaves the record unchanged. Deleted or expired records fail
    /// with `NotExtendable`.
    fn extend_expiry(&self, session_id: &str, expires_at: DateTime<Utc>) -> StoreResult<Session>;

    /// Add `extend_minutes` to the stored expiry, capped at the policy
    /// ceiling, in one write. Deleted or expired records fail with
    /// `NotExtendable`.
    fn extend_by(
        &self,
        session_id: &str,
        extend_minutes: i64,
        policy: &SessionPolicy,
    ) -> StoreResult<Session>;

    /// Apply a status transition; regressions fail with `InvalidTransition`.
    fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Session>;

    /// Record pod placement. `None` leaves the stored value untouched.
    fn update_pod_info(
        &self,
        session_id: &str,
        pod_name: Option<String>,
        pod_ip: Option<String>,
    ) -> StoreResult<Session>;

    fn touch(&self, session_id: &str, now: DateTime<Utc>) -> StoreResult<()>;

    /// Soft delete: status becomes `deleted`, the record stays readable.
    fn mark_deleted(
        &self,
        session_id: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Session>;

    /// Unexpired active session for `key`, optionally restricted to a cluster.
    fn find_active(
        &self,
        key: &ActiveKey,
        cluster: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>>;

    /// Matching sessions, newest first.
    fn list(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>>;

    fn count_by_status(&self, filter: &SessionFilter) -> StoreResult<BTreeMap<String, usize>>;

    fn count_active_by_cluster(
        &self,
        viewer_type: Option<ViewerType>,
    ) -> StoreResult<BTreeMap<String, usize>>;

    /// Sessions past `expires_at` that are not yet deleted or expired. Read by
    /// the external expiry sweep.
    fn list_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Session>>;

    /// Distinct cluster names that have at least one record.
    fn clusters(&self) -> StoreResult<Vec<String>>;
}
