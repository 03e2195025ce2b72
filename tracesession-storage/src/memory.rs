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

//! In-memory session store.

use crate::store::{SessionFilter, SessionStore, StoreResult};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracesession_core::{
    ActiveKey, Session, SessionPolicy, SessionStatus, StoreError, ViewerType,
};
use tracing::debug;

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    /// workload_uid -> session ids
    by_workload: HashMap<String, BTreeSet<String>>,
}

impl Inner {
    fn index(&mut self, session: &Session) {
        self.by_workload
            .entry(session.workload_uid.clone())
            .or_default()
            .insert(session.session_id.clone());
    }
}

/// Thread-safe in-memory store with a workload index.
pub struct MemorySessionStore {
    name: String,
    inner: RwLock<Inner>,
}

impl MemorySessionStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Replace the whole contents, rebuilding indexes.
    pub fn load(&self, sessions: Vec<Session>) {
        let mut inner = self.inner.write();
        *inner = Inner::default();
        for session in sessions {
            inner.index(&session);
            inner.sessions.insert(session.session_id.clone(), session);
        }
    }

    /// All records, ordered by session id.
    pub fn snapshot(&self) -> Vec<Session> {
        let inner = self.inner.read();
        let mut sessions: Vec<Session> = inner.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        sessions
    }

    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, session_id: &str) -> Option<Session> {
        let mut inner = self.inner.write();
        let removed = inner.sessions.remove(session_id)?;
        if let Some(ids) = inner.by_workload.get_mut(&removed.workload_uid) {
            ids.remove(session_id);
            if ids.is_empty() {
                inner.by_workload.remove(&removed.workload_uid);
            }
        }
        Some(removed)
    }

    /// Mutate a copy of the record and write it back only if `f` succeeds, so
    /// a rejected change leaves the stored record untouched.
    fn modify<F>(&self, session_id: &str, f: F) -> StoreResult<Session>
    where
        F: FnOnce(&mut Session) -> StoreResult<()>,
    {
        let mut inner = self.inner.write();
        let stored = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        let mut updated = stored.clone();
        f(&mut updated)?;
        *stored = updated.clone();
        Ok(updated)
    }

    fn ensure_extendable(session: &Session) -> StoreResult<()> {
        if session.can_extend() {
            return Ok(());
        }
        Err(StoreError::NotExtendable {
            session_id: session.session_id.clone(),
            status: session.status.clone(),
        })
    }

    fn sorted(mut sessions: Vec<Session>) -> Vec<Session> {
        sessions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        sessions
    }
}

impl SessionStore for MemorySessionStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, session: Session) -> StoreResult<Session> {
        let mut inner = self.inner.write();
        if inner.sessions.contains_key(&session.session_id) {
            return Err(StoreError::AlreadyExists(session.session_id));
        }
        inner.index(&session);
        inner
            .sessions
            .insert(session.session_id.clone(), session.clone());
        debug!(store = %self.name, session_id = %session.session_id, "Inserted session");
        Ok(session)
    }

    fn get(&self, session_id: &str) -> StoreResult<Option<Session>> {
        Ok(self.inner.read().sessions.get(session_id).cloned())
    }

    fn extend_expiry(&self, session_id: &str, expires_at: DateTime<Utc>) -> StoreResult<Session> {
        self.modify(session_id, |session| {
            Self::ensure_extendable(session)?;
            if expires_at > session.expires_at {
                session.expires_at = expires_at;
            }
            Ok(())
        })
    }

    fn extend_by(
        &self,
        session_id: &str,
        extend_minutes: i64,
        policy: &SessionPolicy,
    ) -> StoreResult<Session> {
        self.modify(session_id, |session| {
            Self::ensure_extendable(session)?;
            session.expires_at = policy.extended_expiry(session, extend_minutes);
            Ok(())
        })
    }

    fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Session> {
        self.modify(session_id, |session| {
            session.apply_status(status, message, now)?;
            Ok(())
        })
    }

    fn update_pod_info(
        &self,
        session_id: &str,
        pod_name: Option<String>,
        pod_ip: Option<String>,
    ) -> StoreResult<Session> {
        self.modify(session_id, |session| {
            if pod_name.is_some() {
                session.pod_name = pod_name;
            }
            if pod_ip.is_some() {
                session.pod_ip = pod_ip;
            }
            Ok(())
        })
    }

    fn touch(&self, session_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        self.modify(session_id, |session| {
            session.last_accessed_at = Some(now);
            Ok(())
        })
        .map(|_| ())
    }

    fn mark_deleted(
        &self,
        session_id: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Session> {
        self.modify(session_id, |session| {
            session.apply_status(SessionStatus::Deleted, Some(message.to_string()), now)?;
            Ok(())
        })
    }

    fn find_active(
        &self,
        key: &ActiveKey,
        cluster: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        let inner = self.inner.read();
        let Some(ids) = inner.by_workload.get(&key.workload_uid) else {
            return Ok(None);
        };
        let found = ids
            .iter()
            .filter_map(|id| inner.sessions.get(id))
            .filter(|s| {
                s.profiler_file_id == key.profiler_file_id
                    && s.viewer_type() == key.viewer_type
                    && s.is_active()
                    && s.expires_at > now
                    && cluster.map_or(true, |c| s.cluster_name == c)
            })
            // newest wins if a create race left more than one
            .max_by_key(|s| s.created_at)
            .cloned();
        Ok(found)
    }

    fn list(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>> {
        let inner = self.inner.read();
        let sessions: Vec<Session> = match filter.workload_uid {
            Some(ref uid) => inner
                .by_workload
                .get(uid)
                .into_iter()
                .flatten()
                .filter_map(|id| inner.sessions.get(id))
                .filter(|s| filter.matches(s))
                .cloned()
                .collect(),
            None => inner
                .sessions
                .values()
                .filter(|s| filter.matches(s))
                .cloned()
                .collect(),
        };
        Ok(Self::sorted(sessions))
    }

    fn count_by_status(&self, filter: &SessionFilter) -> StoreResult<BTreeMap<String, usize>> {
        let inner = self.inner.read();
        let mut counts = BTreeMap::new();
        for session in inner.sessions.values().filter(|s| filter.matches(s)) {
            *counts.entry(session.status.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn count_active_by_cluster(
        &self,
        viewer_type: Option<ViewerType>,
    ) -> StoreResult<BTreeMap<String, usize>> {
        let inner = self.inner.read();
        let mut counts = BTreeMap::new();
        for session in inner.sessions.values() {
            if !session.is_active() {
                continue;
            }
            if viewer_type.map_or(false, |v| session.viewer_type() != v) {
                continue;
            }
            *counts.entry(session.cluster_name.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn list_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Session>> {
        let inner = self.inner.read();
        let expired = inner
            .sessions
            .values()
            .filter(|s| {
                s.expires_at < now
                    && !matches!(s.status, SessionStatus::Deleted | SessionStatus::Expired)
            })
            .cloned()
            .collect();
        Ok(Self::sorted(expired))
    }

    fn clusters(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.read();
        let clusters: BTreeSet<String> = inner
            .sessions
            .values()
            .map(|s| s.cluster_name.clone())
            .collect();
        Ok(clusters.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tracesession_core::{ResourceProfile, SessionConfig};

    fn session(id: &str, uid: &str, file: i32, viewer: ViewerType, cluster: &str) -> Session {
        let now = Utc::now();
        Session {
            session_id: id.to_string(),
            workload_uid: uid.to_string(),
            profiler_file_id: file,
            cluster_name: cluster.to_string(),
            pod_name: None,
            pod_ip: None,
            pod_namespace: "primus-lens".to_string(),
            pod_port: 8080,
            status: SessionStatus::Pending,
            status_message: String::new(),
            resource_profile: ResourceProfile::Medium,
            config: SessionConfig::new(viewer),
            created_at: now,
            ready_at: None,
            expires_at: now + Duration::minutes(30),
            last_accessed_at: None,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = MemorySessionStore::new("test");
        store
            .insert(session("tls-1", "wl-1", 1, ViewerType::Tracelens, "a"))
            .unwrap();
        assert!(store.get("tls-1").unwrap().is_some());
        assert!(store.get("tls-2").unwrap().is_none());

        let dup = store.insert(session("tls-1", "wl-1", 1, ViewerType::Tracelens, "a"));
        assert!(matches!(dup, Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn test_find_active_respects_key_and_status() {
        let store = MemorySessionStore::new("test");
        store
            .insert(session("tls-1", "wl-1", 1, ViewerType::Tracelens, "a"))
            .unwrap();
        store
            .insert(session("pfs-1", "wl-1", 1, ViewerType::Perfetto, "a"))
            .unwrap();
        let now = Utc::now();

        let key = ActiveKey::new("wl-1", 1, ViewerType::Tracelens);
        let found = store.find_active(&key, None, now).unwrap().unwrap();
        assert_eq!(found.session_id, "tls-1");
        assert!(store.find_active(&key, Some("b"), now).unwrap().is_none());

        store.mark_deleted("tls-1", "gone", now).unwrap();
        assert!(store.find_active(&key, None, now).unwrap().is_none());

        let key = ActiveKey::new("wl-1", 2, ViewerType::Perfetto);
        assert!(store.find_active(&key, None, now).unwrap().is_none());
    }

    #[test]
    fn test_find_active_skips_lapsed_sessions() {
        let store = MemorySessionStore::new("test");
        store
            .insert(session("tls-1", "wl-1", 1, ViewerType::Tracelens, "a"))
            .unwrap();
        let key = ActiveKey::new("wl-1", 1, ViewerType::Tracelens);
        let later = Utc::now() + Duration::hours(1);
        assert!(store.find_active(&key, None, later).unwrap().is_none());
        assert_eq!(store.list_expired(later).unwrap().len(), 1);
    }

    #[test]
    fn test_rejected_transition_leaves_record() {
        let store = MemorySessionStore::new("test");
        store
            .insert(session("tls-1", "wl-1", 1, ViewerType::Tracelens, "a"))
            .unwrap();
        let now = Utc::now();
        store
            .update_status("tls-1", SessionStatus::Ready, None, now)
            .unwrap();
        let err = store
            .update_status("tls-1", SessionStatus::Creating, Some("late".into()), now)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition(_)));

        let stored = store.get("tls-1").unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Ready);
        assert_eq!(stored.status_message, "");
    }

    #[test]
    fn test_extend_expiry_is_monotonic() {
        let store = MemorySessionStore::new("test");
        let s = store
            .insert(session("tls-1", "wl-1", 1, ViewerType::Tracelens, "a"))
            .unwrap();
        let earlier = s.expires_at - Duration::minutes(10);
        let kept = store.extend_expiry("tls-1", earlier).unwrap();
        assert_eq!(kept.expires_at, s.expires_at);

        let later = s.expires_at + Duration::minutes(10);
        assert_eq!(store.extend_expiry("tls-1", later).unwrap().expires_at, later);

        assert!(matches!(
            store.extend_expiry("tls-404", later),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_extend_by_accumulates_and_caps() {
        let store = MemorySessionStore::new("test");
        let s = store
            .insert(session("tls-1", "wl-1", 1, ViewerType::Tracelens, "a"))
            .unwrap();
        let policy = SessionPolicy::default();

        let first = store.extend_by("tls-1", 30, &policy).unwrap();
        let second = store.extend_by("tls-1", 30, &policy).unwrap();
        assert_eq!(first.expires_at, s.expires_at + Duration::minutes(30));
        assert_eq!(second.expires_at, s.expires_at + Duration::minutes(60));

        for _ in 0..10 {
            store.extend_by("tls-1", 60, &policy).unwrap();
        }
        let stored = store.get("tls-1").unwrap().unwrap();
        assert_eq!(stored.expires_at, policy.ceiling(s.created_at));
    }

    #[test]
    fn test_deleted_session_keeps_its_expiry() {
        let store = MemorySessionStore::new("test");
        let s = store
            .insert(session("tls-1", "wl-1", 1, ViewerType::Tracelens, "a"))
            .unwrap();
        store.mark_deleted("tls-1", "gone", Utc::now()).unwrap();

        let err = store
            .extend_by("tls-1", 45, &SessionPolicy::default())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotExtendable {
                status: SessionStatus::Deleted,
                ..
            }
        ));
        let later = s.expires_at + Duration::minutes(45);
        assert!(matches!(
            store.extend_expiry("tls-1", later),
            Err(StoreError::NotExtendable { .. })
        ));

        let stored = store.get("tls-1").unwrap().unwrap();
        assert_eq!(stored.expires_at, s.expires_at);
    }

    #[test]
    fn test_counts_and_filters() {
        let store = MemorySessionStore::new("test");
        store
            .insert(session("tls-1", "wl-1", 1, ViewerType::Tracelens, "a"))
            .unwrap();
        store
            .insert(session("tls-2", "wl-2", 1, ViewerType::Tracelens, "b"))
            .unwrap();
        store
            .insert(session("pfs-1", "wl-1", 1, ViewerType::Perfetto, "a"))
            .unwrap();
        store
            .update_status("tls-2", SessionStatus::Failed, None, Utc::now())
            .unwrap();

        let filter = SessionFilter::for_viewer(ViewerType::Tracelens);
        let by_status = store.count_by_status(&filter).unwrap();
        assert_eq!(by_status.get("pending"), Some(&1));
        assert_eq!(by_status.get("failed"), Some(&1));

        let by_cluster = store
            .count_active_by_cluster(Some(ViewerType::Tracelens))
            .unwrap();
        assert_eq!(by_cluster.get("a"), Some(&1));
        assert_eq!(by_cluster.get("b"), None);

        let listed = store
            .list(&SessionFilter::default().workload(Some("wl-1".into())))
            .unwrap();
        assert_eq!(listed.len(), 2);

        assert_eq!(store.clusters().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_remove_cleans_index() {
        let store = MemorySessionStore::new("test");
        store
            .insert(session("tls-1", "wl-1", 1, ViewerType::Tracelens, "a"))
            .unwrap();
        assert!(store.remove("tls-1").is_some());
        assert!(store.is_empty());
        let key = ActiveKey::new("wl-1", 1, ViewerType::Tracelens);
        assert!(store.find_active(&key, None, Utc::now()).unwrap().is_none());
    }
}
