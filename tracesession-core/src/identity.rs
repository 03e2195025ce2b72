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

//! Session identity and dedup keys.
//!
//! Two things are derived from a create request:
//!
//! - an [`ActiveKey`], which is stable for a given artifact and viewer and is
//!   used to find a live session to reuse;
//! - a session id, which mixes in the request time and a process-wide
//!   sequence number, so two creates for the same artifact never collide even
//!   when the clock reads the same instant.

use crate::viewer::ViewerType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of hex characters kept from the digest.
const SESSION_HASH_LEN: usize = 12;

/// Dedup key: at most one active session exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveKey {
    pub workload_uid: String,
    pub profiler_file_id: i32,
    pub viewer_type: ViewerType,
}

impl ActiveKey {
    pub fn new(
        workload_uid: impl Into<String>,
        profiler_file_id: i32,
        viewer_type: ViewerType,
    ) -> Self {
        Self {
            workload_uid: workload_uid.into(),
            profiler_file_id,
            viewer_type,
        }
    }
}

impl fmt::Display for ActiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.viewer_type, self.workload_uid, self.profiler_file_id
        )
    }
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generates `{prefix}-{hash}` session ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionIdGenerator;

impl SessionIdGenerator {
    /// Fresh id for a create request. Every call draws a new sequence number.
    pub fn generate(
        viewer: ViewerType,
        workload_uid: &str,
        profiler_file_id: i32,
        now: DateTime<Utc>,
    ) -> String {
        let sequence = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self::derive(viewer, workload_uid, profiler_file_id, now, sequence)
    }

    /// Deterministic id for the given inputs.
    pub fn derive(
        viewer: ViewerType,
        workload_uid: &str,
        profiler_file_id: i32,
        now: DateTime<Utc>,
        sequence: u64,
    ) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(viewer.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(workload_uid.as_bytes());
        hasher.update(b"\0");
        hasher.update(&profiler_file_id.to_le_bytes());
        hasher.update(&now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        hasher.update(&sequence.to_le_bytes());
        let digest = hasher.finalize().to_hex();
        format!(
            "{}-{}",
            viewer.session_id_prefix(),
            &digest.as_str()[..SESSION_HASH_LEN]
        )
    }
}

/// Name of the pod backing `session_id`.
pub fn pod_name_for(viewer: ViewerType, session_id: &str) -> String {
    format!("{}-{}", viewer.as_str(), session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_id_format() {
        let now = Utc::now();
        let id = SessionIdGenerator::generate(ViewerType::Tracelens, "wl-42", 7, now);
        assert!(id.starts_with("tls-"));
        assert_eq!(id.len(), 4 + SESSION_HASH_LEN);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));

        let id = SessionIdGenerator::generate(ViewerType::Perfetto, "wl-42", 7, now);
        assert!(id.starts_with("pfs-"));
    }

    #[test]
    fn test_derive_is_deterministic() {
        let now = Utc::now();
        let a = SessionIdGenerator::derive(ViewerType::Perfetto, "wl-42", 7, now, 3);
        let b = SessionIdGenerator::derive(ViewerType::Perfetto, "wl-42", 7, now, 3);
        assert_eq!(a, b);
        let c = SessionIdGenerator::derive(ViewerType::Perfetto, "wl-42", 7, now, 4);
        assert_ne!(a, c);
    }

    #[test]
    fn test_same_instant_generates_distinct_ids() {
        let now = Utc::now();
        let ids: std::collections::HashSet<_> = (0..64)
            .map(|_| SessionIdGenerator::generate(ViewerType::Perfetto, "wl-42", 7, now))
            .collect();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn test_session_id_changes_over_time_and_inputs() {
        let now = Utc::now();
        let a = SessionIdGenerator::derive(ViewerType::Perfetto, "wl-42", 7, now, 0);
        let later = SessionIdGenerator::derive(
            ViewerType::Perfetto,
            "wl-42",
            7,
            now + Duration::seconds(1),
            0,
        );
        let other_file = SessionIdGenerator::derive(ViewerType::Perfetto, "wl-42", 8, now, 0);
        assert_ne!(a, later);
        assert_ne!(a, other_file);
    }

    #[test]
    fn test_active_key_ignores_time() {
        let a = ActiveKey::new("wl-42", 7, ViewerType::Tracelens);
        let b = ActiveKey::new("wl-42".to_string(), 7, ViewerType::Tracelens);
        assert_eq!(a, b);
        assert_ne!(a, ActiveKey::new("wl-42", 7, ViewerType::Perfetto));
        assert_eq!(a.to_string(), "tracelens/wl-42/7");
    }

    #[test]
    fn test_pod_name() {
        assert_eq!(
            pod_name_for(ViewerType::Perfetto, "pfs-0123456789ab"),
            "perfetto-pfs-0123456789ab"
        );
    }
}
