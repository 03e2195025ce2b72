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

//! Session Lifecycle Manager
//!
//! One [`SessionManager`] per viewer flavor. Both share the registry, the
//! cluster resolver and the provisioning outbox held in [`ManagerContext`].
//!
//! Create is "reuse or create": an active, unexpired session for the same
//! (workload, profiler file, viewer) is refreshed and returned instead of a
//! new one. The lookup and the write are separate store calls, so two
//! concurrent creates can both miss and both insert. With
//! `sessions.advisory_lock` enabled the decision is serialized per key inside
//! this process.

pub mod types;

pub use types::{
    CreateSessionRequest, CreateSessionResponse, ExtendSessionRequest, ExtendSessionResponse,
    ListSessionsQuery, ListSessionsResponse, MessageResponse, ReportStatusRequest, SessionStats,
    SessionView,
};

use crate::clusters::ClusterResolver;
use crate::provisioner::{PodRequest, ProvisioningIntent, ProvisioningOutbox};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracesession_core::{
    pod_name_for, ActiveKey, Clock, ResourceProfile, Result, Session, SessionConfig, SessionError,
    SessionIdGenerator, SessionPolicy, SessionStatus, StoreError, ViewerType,
};
use tracesession_storage::{SessionFilter, SessionRegistry, SessionStore};
use tracing::{debug, info, warn};

/// Fresh ids drawn before an insert collision is reported as a database error.
const MAX_INSERT_ATTEMPTS: u32 = 3;

/// Where new viewer pods are placed.
#[derive(Debug, Clone)]
pub struct PodDefaults {
    pub namespace: String,
    pub port: u16,
}

/// Collaborators shared by every manager.
#[derive(Clone)]
pub struct ManagerContext {
    pub registry: Arc<dyn SessionRegistry>,
    pub clusters: Arc<ClusterResolver>,
    pub outbox: ProvisioningOutbox,
    pub clock: Arc<dyn Clock>,
    pub policy: SessionPolicy,
    pub pods: PodDefaults,
    pub advisory_lock: bool,
}

pub struct SessionManager {
    viewer: ViewerType,
    ctx: ManagerContext,
    create_locks: Option<DashMap<ActiveKey, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(viewer: ViewerType, ctx: ManagerContext) -> Self {
        let create_locks = ctx.advisory_lock.then(DashMap::new);
        Self {
            viewer,
            ctx,
            create_locks,
        }
    }

    pub fn viewer(&self) -> ViewerType {
        self.viewer
    }

    fn view(&self, session: &Session) -> SessionView {
        SessionView::from_session(session, self.ctx.policy.estimated_ready_seconds)
    }

    fn store_for(&self, cluster: &str) -> Result<Arc<dyn SessionStore>> {
        self.ctx
            .registry
            .store_for(cluster)
            .ok_or_else(|| SessionError::ClusterNotFound(cluster.to_string()))
    }

    /// Store holding `session_id` for the resolved cluster. Records of the
    /// other viewer flavor are invisible here.
    fn load(
        &self,
        session_id: &str,
        cluster: Option<&str>,
    ) -> Result<(Arc<dyn SessionStore>, Session)> {
        if session_id.trim().is_empty() {
            return Err(SessionError::invalid("session_id is required"));
        }
        let cluster = self.ctx.clusters.resolve(cluster)?;
        let store = self.store_for(&cluster)?;
        let session = store
            .get(session_id)?
            .filter(|s| s.viewer_type() == self.viewer)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        Ok((store, session))
    }

    // ========================================================================
    // Create / reuse
    // ========================================================================

    /// `response.reused` tells whether an existing session was returned.
    pub async fn create(&self, request: CreateSessionRequest) -> Result<CreateSessionResponse> {
        let workload_uid = request.workload_uid.trim();
        if workload_uid.is_empty() {
            return Err(SessionError::invalid("workload_uid is required"));
        }
        if request.profiler_file_id <= 0 {
            return Err(SessionError::invalid(format!(
                "profiler_file_id must be positive (got {})",
                request.profiler_file_id
            )));
        }
        let resource_profile = match request.resource_profile.as_deref().map(str::trim) {
            None | Some("") => ResourceProfile::default(),
            Some(tag) => ResourceProfile::parse(tag).ok_or_else(|| {
                SessionError::invalid(format!("invalid resource_profile: {}", tag))
            })?,
        };

        let cluster = self.ctx.clusters.resolve(request.cluster.as_deref())?;
        let store = self.store_for(&cluster)?;
        let key = ActiveKey::new(workload_uid, request.profiler_file_id, self.viewer);

        let guard = match self.create_locks {
            Some(ref locks) => {
                let lock = locks.entry(key.clone()).or_default().value().clone();
                Some(lock.lock_owned().await)
            }
            None => None,
        };

        let result = self.create_or_reuse(
            &*store,
            &key,
            &cluster,
            resource_profile,
            request.ttl_minutes,
        );

        drop(guard);
        if let Some(ref locks) = self.create_locks {
            locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        }

        let (session, reused) = result?;
        Ok(CreateSessionResponse::new(
            &session,
            reused,
            self.ctx.policy.estimated_ready_seconds,
        ))
    }

    fn create_or_reuse(
        &self,
        store: &dyn SessionStore,
        key: &ActiveKey,
        cluster: &str,
        resource_profile: ResourceProfile,
        ttl_minutes: Option<i64>,
    ) -> Result<(Session, bool)> {
        let policy = &self.ctx.policy;
        let now = self.ctx.clock.now();
        let ttl = policy.effective_ttl(ttl_minutes);

        if let Some(existing) = store.find_active(key, None, now)? {
            let expires_at = policy.refreshed_expiry(&existing, now, ttl);
            let refreshed = match store.extend_expiry(&existing.session_id, expires_at) {
                Ok(session) => Some(session),
                // deleted or expired since the lookup; fall through to a new session
                Err(StoreError::NotExtendable { .. } | StoreError::NotFound(_)) => None,
                Err(e) => {
                    warn!(
                        session_id = %existing.session_id,
                        error = %e,
                        "Failed to refresh reused session TTL"
                    );
                    Some(existing)
                }
            };
            if let Some(session) = refreshed {
                info!(
                    session_id = %session.session_id,
                    viewer = %self.viewer,
                    key = %key,
                    expires_at = %session.expires_at,
                    "Reusing active session"
                );
                return Ok((session, true));
            }
        }

        let session = self.insert_new(store, key, cluster, resource_profile, now, ttl)?;
        info!(
            session_id = %session.session_id,
            viewer = %self.viewer,
            cluster = %cluster,
            key = %key,
            "Created session"
        );

        self.ctx.outbox.enqueue(ProvisioningIntent::Create(PodRequest {
            session_id: session.session_id.clone(),
            viewer_type: self.viewer,
            workload_uid: session.workload_uid.clone(),
            profiler_file_id: session.profiler_file_id,
            cluster_name: session.cluster_name.clone(),
            pod_name: pod_name_for(self.viewer, &session.session_id),
            namespace: session.pod_namespace.clone(),
            port: session.pod_port,
            resource_profile,
        }));

        Ok((session, false))
    }

    /// Insert a pending record under a fresh id, drawing another id if the
    /// store already holds one.
    fn insert_new(
        &self,
        store: &dyn SessionStore,
        key: &ActiveKey,
        cluster: &str,
        resource_profile: ResourceProfile,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Session> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let session_id = SessionIdGenerator::generate(
                self.viewer,
                &key.workload_uid,
                key.profiler_file_id,
                now,
            );
            let session = Session {
                session_id,
                workload_uid: key.workload_uid.clone(),
                profiler_file_id: key.profiler_file_id,
                cluster_name: cluster.to_string(),
                pod_name: None,
                pod_ip: None,
                pod_namespace: self.ctx.pods.namespace.clone(),
                pod_port: self.ctx.pods.port,
                status: SessionStatus::Pending,
                status_message: "Waiting for viewer pod".to_string(),
                resource_profile,
                config: SessionConfig::new(self.viewer),
                created_at: now,
                ready_at: None,
                expires_at: now + ttl,
                last_accessed_at: None,
            };
            match store.insert(session) {
                Ok(session) => return Ok(session),
                Err(StoreError::AlreadyExists(id)) if attempt < MAX_INSERT_ATTEMPTS => {
                    warn!(session_id = %id, attempt, "Session id collision, retrying");
                }
                Err(e) => return Err(SessionError::Database(e)),
            }
        }
    }

    // ========================================================================
    // Extend / delete
    // ========================================================================

    pub async fn extend(
        &self,
        session_id: &str,
        request: ExtendSessionRequest,
    ) -> Result<ExtendSessionResponse> {
        SessionPolicy::validate_extend(request.extend_minutes)?;
        let (store, _) = self.load(session_id, request.cluster.as_deref())?;

        let policy = &self.ctx.policy;
        let updated = store.extend_by(session_id, request.extend_minutes, policy)?;

        let message = if updated.expires_at >= policy.ceiling(updated.created_at) {
            "Session extended to its maximum lifetime".to_string()
        } else {
            format!("Session extended by {} minutes", request.extend_minutes)
        };
        info!(
            session_id,
            extend_minutes = request.extend_minutes,
            expires_at = %updated.expires_at,
            "Extended session"
        );

        Ok(ExtendSessionResponse {
            session_id: updated.session_id,
            expires_at: updated.expires_at,
            message,
        })
    }

    /// Soft-delete the session and queue its pod teardown. The status write
    /// is best-effort; only an unknown session fails the call.
    pub async fn delete(&self, session_id: &str, cluster: Option<&str>) -> Result<MessageResponse> {
        let (store, session) = self.load(session_id, cluster)?;

        let pod_name = session
            .pod_name
            .clone()
            .unwrap_or_else(|| pod_name_for(self.viewer, &session.session_id));
        self.ctx.outbox.enqueue(ProvisioningIntent::Teardown {
            session_id: session.session_id.clone(),
            cluster_name: session.cluster_name.clone(),
            namespace: session.pod_namespace.clone(),
            pod_name,
        });

        let now = self.ctx.clock.now();
        if let Err(e) = store.mark_deleted(session_id, "Session deleted by user", now) {
            warn!(session_id, error = %e, "Failed to mark session deleted");
        }
        info!(session_id, viewer = %self.viewer, "Deleted session");

        Ok(MessageResponse {
            message: format!("Session {} deleted", session_id),
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get(&self, session_id: &str, cluster: Option<&str>) -> Result<SessionView> {
        let (_, session) = self.load(session_id, cluster)?;
        Ok(self.view(&session))
    }

    /// Stores a read should visit: the cluster's own store when a cluster
    /// is given, otherwise every store of the deployment.
    fn read_stores(&self, cluster: Option<&str>) -> Result<Vec<Arc<dyn SessionStore>>> {
        match cluster {
            Some(cluster) => Ok(vec![self.store_for(cluster)?]),
            None => Ok(self.ctx.registry.all_stores()),
        }
    }

    pub async fn list(&self, query: ListSessionsQuery) -> Result<ListSessionsResponse> {
        let cluster = self.ctx.clusters.filter(query.cluster.as_deref())?;
        let status = query
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SessionStatus::parse);
        let active_only = query.active_only.unwrap_or(status.is_none());

        let filter = SessionFilter::for_viewer(self.viewer)
            .cluster(cluster.clone())
            .workload(query.workload_uid.filter(|w| !w.trim().is_empty()))
            .status(status)
            .active_only(active_only);

        let mut sessions = Vec::new();
        for store in self.read_stores(cluster.as_deref())? {
            sessions.extend(store.list(&filter)?);
        }
        sort_newest_first(&mut sessions);

        debug!(viewer = %self.viewer, count = sessions.len(), "Listed sessions");
        Ok(ListSessionsResponse::new(
            sessions.iter().map(|s| self.view(s)).collect(),
        ))
    }

    /// Non-deleted sessions of one workload across every store.
    pub async fn list_workload_sessions(&self, workload_uid: &str) -> Result<ListSessionsResponse> {
        if workload_uid.trim().is_empty() {
            return Err(SessionError::invalid("workload_uid is required"));
        }
        let filter = SessionFilter::for_viewer(self.viewer)
            .workload(Some(workload_uid.to_string()))
            .exclude_deleted();

        let mut sessions = Vec::new();
        for store in self.ctx.registry.all_stores() {
            sessions.extend(store.list(&filter)?);
        }
        sort_newest_first(&mut sessions);

        Ok(ListSessionsResponse::new(
            sessions.iter().map(|s| self.view(s)).collect(),
        ))
    }

    pub async fn stats(&self, cluster: Option<&str>) -> Result<SessionStats> {
        let cluster = self.ctx.clusters.filter(cluster)?;
        let filter = SessionFilter::for_viewer(self.viewer).cluster(cluster.clone());

        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_cluster: BTreeMap<String, usize> = BTreeMap::new();
        for store in self.read_stores(cluster.as_deref())? {
            for (status, count) in store.count_by_status(&filter)? {
                *by_status.entry(status).or_insert(0) += count;
            }
            if cluster.is_none() {
                match store.count_active_by_cluster(Some(self.viewer)) {
                    Ok(counts) => {
                        for (name, count) in counts {
                            *by_cluster.entry(name).or_insert(0) += count;
                        }
                    }
                    Err(e) => {
                        warn!(store = %store.name(), error = %e, "Failed to count by cluster")
                    }
                }
            }
        }

        Ok(SessionStats {
            by_status,
            by_cluster: cluster.is_none().then_some(by_cluster),
        })
    }

    // ========================================================================
    // Provisioner and viewer callbacks
    // ========================================================================

    /// Record provisioner progress. Regressions are rejected and leave the
    /// record unchanged; unrecognized statuses are stored verbatim.
    pub async fn report_status(
        &self,
        session_id: &str,
        request: ReportStatusRequest,
    ) -> Result<SessionView> {
        let status = request.status.trim();
        if status.is_empty() {
            return Err(SessionError::invalid("status is required"));
        }
        let (store, _) = self.load(session_id, request.cluster.as_deref())?;

        let now = self.ctx.clock.now();
        let mut session =
            store.update_status(session_id, SessionStatus::parse(status), request.message, now)?;
        if request.pod_name.is_some() || request.pod_ip.is_some() {
            session = store.update_pod_info(session_id, request.pod_name, request.pod_ip)?;
        }

        info!(session_id, status = %session.status, "Session status reported");
        Ok(self.view(&session))
    }

    /// Stamp `last_accessed_at`.
    pub async fn touch(&self, session_id: &str, cluster: Option<&str>) -> Result<()> {
        let (store, _) = self.load(session_id, cluster)?;
        store.touch(session_id, self.ctx.clock.now())?;
        Ok(())
    }
}

fn sort_newest_first(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
}
