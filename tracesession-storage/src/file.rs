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

//! JSON-snapshot session store.
//!
//! Keeps every record in a [`MemorySessionStore`] and rewrites the whole
//! snapshot after each mutation using a temp file and an atomic rename. The
//! previous snapshot is kept as `<file>.json.bak`.
//!
//! If the snapshot write fails the mutation stays applied in memory and the
//! error is returned to the caller.

use crate::memory::MemorySessionStore;
use crate::store::{SessionFilter, SessionStore, StoreResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracesession_core::{
    ActiveKey, Session, SessionPolicy, SessionStatus, StoreError, ViewerType,
};
use tracing::{error, info, warn};

pub struct FileSessionStore {
    memory: MemorySessionStore,
    storage_path: PathBuf,
    /// Serializes snapshot writes so renames never interleave.
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Open (or create) the store at `storage_path`.
    ///
    /// A missing file starts an empty store; an unreadable one is an error so
    /// a corrupt snapshot is never silently overwritten.
    pub fn open(name: impl Into<String>, storage_path: impl AsRef<Path>) -> StoreResult<Self> {
        let store = Self {
            memory: MemorySessionStore::new(name),
            storage_path: storage_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        };
        store.load_from_disk()?;
        Ok(store)
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    fn load_from_disk(&self) -> StoreResult<()> {
        if !self.storage_path.exists() {
            info!(path = ?self.storage_path, "Session snapshot not found, starting empty");
            return Ok(());
        }

        let file = File::open(&self.storage_path)?;
        let sessions: Vec<Session> = serde_json::from_reader(BufReader::new(file))?;
        info!(
            store = %self.memory.name(),
            count = sessions.len(),
            "Loaded sessions from snapshot"
        );
        self.memory.load(sessions);
        Ok(())
    }

    fn save_to_disk(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock();

        if let Some(parent) = self.storage_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if self.storage_path.exists() {
            let backup_path = self.storage_path.with_extension("json.bak");
            if let Err(e) = fs::copy(&self.storage_path, &backup_path) {
                warn!(error = %e, "Failed to back up session snapshot");
            }
        }

        let temp_path = self.storage_path.with_extension("json.tmp");
        {
            let writer = BufWriter::new(File::create(&temp_path)?);
            serde_json::to_writer_pretty(writer, &self.memory.snapshot())?;
        }
        fs::rename(&temp_path, &self.storage_path)?;
        Ok(())
    }

    fn persisted<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        let value = result?;
        if let Err(e) = self.save_to_disk() {
            error!(store = %self.memory.name(), error = %e, "Failed to persist session snapshot");
            return Err(e);
        }
        Ok(value)
    }
}

impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        self.memory.name()
    }

    fn insert(&self, session: Session) -> StoreResult<Session> {
        let session_id = session.session_id.clone();
        let result = self.memory.insert(session);
        match self.persisted(result) {
            Ok(session) => Ok(session),
            Err(StoreError::AlreadyExists(id)) => Err(StoreError::AlreadyExists(id)),
            Err(e) => {
                // a create that could not be made durable is rolled back
                self.memory.remove(&session_id);
                Err(e)
            }
        }
    }

    fn get(&self, session_id: &str) -> StoreResult<Option<Session>> {
        self.memory.get(session_id)
    }

    fn extend_expiry(&self, session_id: &str, expires_at: DateTime<Utc>) -> StoreResult<Session> {
        self.persisted(self.memory.extend_expiry(session_id, expires_at))
    }

    fn extend_by(
        &self,
        session_id: &str,
        extend_minutes: i64,
        policy: &SessionPolicy,
    ) -> StoreResult<Session> {
        self.persisted(self.memory.extend_by(session_id, extend_minutes, policy))
    }

    fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Session> {
        self.persisted(self.memory.update_status(session_id, status, message, now))
    }

    fn update_pod_info(
        &self,
        session_id: &str,
        pod_name: Option<String>,
        pod_ip: Option<String>,
    ) -> StoreResult<Session> {
        self.persisted(self.memory.update_pod_info(session_id, pod_name, pod_ip))
    }

    fn touch(&self, session_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        self.persisted(self.memory.touch(session_id, now))
    }

    fn mark_deleted(
        &self,
        session_id: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Session> {
        self.persisted(self.memory.mark_deleted(session_id, message, now))
    }

    fn find_active(
        &self,
        key: &ActiveKey,
        cluster: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        self.memory.find_active(key, cluster, now)
    }

    fn list(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>> {
        self.memory.list(filter)
    }

    fn count_by_status(&self, filter: &SessionFilter) -> StoreResult<BTreeMap<String, usize>> {
        self.memory.count_by_status(filter)
    }

    fn count_active_by_cluster(
        &self,
        viewer_type: Option<ViewerType>,
    ) -> StoreResult<BTreeMap<String, usize>> {
        self.memory.count_active_by_cluster(viewer_type)
    }

    fn list_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Session>> {
        self.memory.list_expired(now)
    }

    fn clusters(&self) -> StoreResult<Vec<String>> {
        self.memory.clusters()
    }
}
