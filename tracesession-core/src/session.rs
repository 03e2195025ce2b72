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

//! Session record and TTL policy.
//!
//! # TTL rules
//!
//! - A new session expires `ttl` minutes after creation (default 30, minimum 1).
//! - No operation may push `expires_at` past `created_at + max_session_ttl`.
//! - `expires_at` only moves forward while the session is alive.
//!
//! All expiry arithmetic reads `created_at`/`expires_at` from the stored
//! record; nothing here accepts a client-supplied timestamp.

use crate::error::SessionError;
use crate::identity::ActiveKey;
use crate::status::{InvalidTransition, SessionStatus};
use crate::viewer::{ResourceProfile, ViewerType};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TTL_MINUTES: i64 = 30;
pub const MIN_TTL_MINUTES: i64 = 1;
pub const DEFAULT_MAX_SESSION_TTL_MINUTES: i64 = 240;
pub const MIN_EXTEND_MINUTES: i64 = 1;
pub const MAX_EXTEND_MINUTES: i64 = 60;
pub const DEFAULT_ESTIMATED_READY_SECONDS: u32 = 30;
pub const DEFAULT_POD_NAMESPACE: &str = "primus-lens";
pub const DEFAULT_POD_PORT: u16 = 8080;

// ============================================================================
// Session Record
// ============================================================================

/// Open configuration map stored with each session.
///
/// `viewer_type` is lifted out of the map into a closed enum so a missing or
/// misspelled key fails deserialization instead of silently matching nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub viewer_type: ViewerType,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SessionConfig {
    pub fn new(viewer_type: ViewerType) -> Self {
        Self {
            viewer_type,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub workload_uid: String,
    pub profiler_file_id: i32,
    pub cluster_name: String,
    #[serde(default)]
    pub pod_name: Option<String>,
    #[serde(default)]
    pub pod_ip: Option<String>,
    pub pod_namespace: String,
    pub pod_port: u16,
    pub status: SessionStatus,
    #[serde(default)]
    pub status_message: String,
    #[serde(default)]
    pub resource_profile: ResourceProfile,
    pub config: SessionConfig,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub ready_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn viewer_type(&self) -> ViewerType {
        self.config.viewer_type
    }

    pub fn active_key(&self) -> ActiveKey {
        ActiveKey::new(
            self.workload_uid.clone(),
            self.profiler_file_id,
            self.viewer_type(),
        )
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Deleted and expired sessions keep their expiry forever.
    pub fn can_extend(&self) -> bool {
        !matches!(self.status, SessionStatus::Deleted | SessionStatus::Expired)
    }

    /// Move to `next`, refusing regressions. Stamps `ready_at` on first ready.
    pub fn apply_status(
        &mut self,
        next: SessionStatus,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        let next = self.status.transition(next)?;
        if next == SessionStatus::Ready && self.ready_at.is_none() {
            self.ready_at = Some(now);
        }
        self.status = next;
        if let Some(message) = message {
            self.status_message = message;
        }
        Ok(())
    }
}

// ============================================================================
// TTL Policy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    pub default_ttl_minutes: i64,
    pub max_session_ttl_minutes: i64,
    pub estimated_ready_seconds: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            default_ttl_minutes: DEFAULT_TTL_MINUTES,
            max_session_ttl_minutes: DEFAULT_MAX_SESSION_TTL_MINUTES,
            estimated_ready_seconds: DEFAULT_ESTIMATED_READY_SECONDS,
        }
    }
}

impl SessionPolicy {
    pub fn max_session_ttl(&self) -> Duration {
        Duration::minutes(self.max_session_ttl_minutes)
    }

    /// TTL for a create request. Absent or non-positive values use the default.
    pub fn effective_ttl(&self, requested: Option<i64>) -> Duration {
        let minutes = match requested {
            Some(m) if m > 0 => m,
            _ => self.default_ttl_minutes,
        };
        let max = self.max_session_ttl_minutes.max(MIN_TTL_MINUTES);
        Duration::minutes(minutes.clamp(MIN_TTL_MINUTES, max))
    }

    /// Latest instant a session created at `created_at` may live until.
    pub fn ceiling(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + self.max_session_ttl()
    }

    /// Expiry after a create request reuses `session` at `now`.
    pub fn refreshed_expiry(
        &self,
        session: &Session,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> DateTime<Utc> {
        let wanted = (now + ttl).min(self.ceiling(session.created_at));
        wanted.max(session.expires_at)
    }

    /// Expiry after an explicit extension. Overshoot truncates to the ceiling.
    pub fn extended_expiry(&self, session: &Session, extend_minutes: i64) -> DateTime<Utc> {
        let wanted = session.expires_at + Duration::minutes(extend_minutes);
        wanted
            .min(self.ceiling(session.created_at))
            .max(session.expires_at)
    }

    pub fn validate_extend(extend_minutes: i64) -> Result<(), SessionError> {
        if !(MIN_EXTEND_MINUTES..=MAX_EXTEND_MINUTES).contains(&extend_minutes) {
            return Err(SessionError::invalid(format!(
                "extend_minutes must be between {} and {} (got {})",
                MIN_EXTEND_MINUTES, MAX_EXTEND_MINUTES, extend_minutes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_at(created_at: DateTime<Utc>, ttl_minutes: i64) -> Session {
        Session {
            session_id: "tls-000000000000".to_string(),
            workload_uid: "wl-42".to_string(),
            profiler_file_id: 7,
            cluster_name: "default".to_string(),
            pod_name: None,
            pod_ip: None,
            pod_namespace: DEFAULT_POD_NAMESPACE.to_string(),
            pod_port: DEFAULT_POD_PORT,
            status: SessionStatus::Pending,
            status_message: String::new(),
            resource_profile: ResourceProfile::Medium,
            config: SessionConfig::new(ViewerType::Tracelens),
            created_at,
            ready_at: None,
            expires_at: created_at + Duration::minutes(ttl_minutes),
            last_accessed_at: None,
        }
    }

    #[test]
    fn test_effective_ttl_defaults_and_bounds() {
        let policy = SessionPolicy::default();
        assert_eq!(policy.effective_ttl(None), Duration::minutes(30));
        assert_eq!(policy.effective_ttl(Some(0)), Duration::minutes(30));
        assert_eq!(policy.effective_ttl(Some(-5)), Duration::minutes(30));
        assert_eq!(policy.effective_ttl(Some(1)), Duration::minutes(1));
        assert_eq!(policy.effective_ttl(Some(10_000)), Duration::minutes(240));
    }

    #[test]
    fn test_extension_clamps_to_ceiling() {
        let policy = SessionPolicy::default();
        let created = Utc::now();
        let mut session = session_at(created, 30);

        // 30 + 4 * 60 would overshoot 240
        for _ in 0..4 {
            session.expires_at = policy.extended_expiry(&session, 60);
        }
        assert_eq!(session.expires_at, created + Duration::minutes(240));

        // further extensions are no-ops, never errors
        assert_eq!(policy.extended_expiry(&session, 1), session.expires_at);
    }

    #[test]
    fn test_refresh_never_moves_backwards() {
        let policy = SessionPolicy::default();
        let created = Utc::now();
        let session = session_at(created, 120);

        let refreshed = policy.refreshed_expiry(&session, created, Duration::minutes(30));
        assert_eq!(refreshed, session.expires_at);

        let later = created + Duration::minutes(100);
        let refreshed = policy.refreshed_expiry(&session, later, Duration::minutes(30));
        assert_eq!(refreshed, later + Duration::minutes(30));

        let much_later = created + Duration::minutes(230);
        let refreshed = policy.refreshed_expiry(&session, much_later, Duration::minutes(30));
        assert_eq!(refreshed, created + Duration::minutes(240));
    }

    #[test]
    fn test_validate_extend_range() {
        assert!(SessionPolicy::validate_extend(0).is_err());
        assert!(SessionPolicy::validate_extend(61).is_err());
        assert!(SessionPolicy::validate_extend(1).is_ok());
        assert!(SessionPolicy::validate_extend(60).is_ok());
    }

    #[test]
    fn test_apply_status_stamps_ready_at() {
        let now = Utc::now();
        let mut session = session_at(now, 30);
        session
            .apply_status(SessionStatus::Creating, None, now)
            .unwrap();
        assert!(session.ready_at.is_none());
        session
            .apply_status(SessionStatus::Ready, Some("up".into()), now)
            .unwrap();
        assert_eq!(session.ready_at, Some(now));
        assert_eq!(session.status_message, "up");
        assert!(session
            .apply_status(SessionStatus::Pending, None, now)
            .is_err());
    }

    #[test]
    fn test_config_serializes_viewer_type_inline() {
        let mut config = SessionConfig::new(ViewerType::Perfetto);
        config
            .extra
            .insert("trace_format".to_string(), serde_json::json!("pftrace"));
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["viewer_type"], "perfetto");
        assert_eq!(value["trace_format"], "pftrace");

        let missing: Result<SessionConfig, _> =
            serde_json::from_value(serde_json::json!({ "trace_format": "x" }));
        assert!(missing.is_err());
    }
}
