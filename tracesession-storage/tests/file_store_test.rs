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

use chrono::{Duration, Utc};
use tempfile::TempDir;
use tracesession_core::{
    ActiveKey, ResourceProfile, Session, SessionConfig, SessionStatus, ViewerType,
};
use tracesession_storage::{
    build_registry, FileSessionStore, RegistryLayout, SessionFilter, SessionStore,
};

fn session(id: &str, uid: &str, cluster: &str) -> Session {
    let now = Utc::now();
    Session {
        session_id: id.to_string(),
        workload_uid: uid.to_string(),
        profiler_file_id: 7,
        cluster_name: cluster.to_string(),
        pod_name: None,
        pod_ip: None,
        pod_namespace: "primus-lens".to_string(),
        pod_port: 8080,
        status: SessionStatus::Pending,
        status_message: String::new(),
        resource_profile: ResourceProfile::Large,
        config: SessionConfig::new(ViewerType::Perfetto),
        created_at: now,
        ready_at: None,
        expires_at: now + Duration::minutes(30),
        last_accessed_at: None,
    }
}

#[test]
fn test_snapshot_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sessions.json");

    {
        let store = FileSessionStore::open("control-plane", &path).unwrap();
        store.insert(session("pfs-1", "wl-42", "gpu-a")).unwrap();
        store
            .update_pod_info("pfs-1", Some("perfetto-pfs-1".into()), Some("10.0.0.9".into()))
            .unwrap();
        store
            .update_status("pfs-1", SessionStatus::Ready, None, Utc::now())
            .unwrap();
    }

    assert!(path.exists());
    let reopened = FileSessionStore::open("control-plane", &path).unwrap();
    let loaded = reopened.get("pfs-1").unwrap().unwrap();
    assert_eq!(loaded.status, SessionStatus::Ready);
    assert!(loaded.ready_at.is_some());
    assert_eq!(loaded.pod_ip.as_deref(), Some("10.0.0.9"));
    assert_eq!(loaded.resource_profile, ResourceProfile::Large);

    // the workload index is rebuilt on load
    let key = ActiveKey::new("wl-42", 7, ViewerType::Perfetto);
    assert!(reopened.find_active(&key, None, Utc::now()).unwrap().is_some());
}

#[test]
fn test_second_write_keeps_backup() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sessions.json");

    let store = FileSessionStore::open("control-plane", &path).unwrap();
    store.insert(session("pfs-1", "wl-1", "gpu-a")).unwrap();
    store.insert(session("pfs-2", "wl-2", "gpu-a")).unwrap();

    assert!(path.with_extension("json.bak").exists());
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn test_corrupt_snapshot_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sessions.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(FileSessionStore::open("control-plane", &path).is_err());
}

#[test]
fn test_soft_delete_is_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sessions.json");

    {
        let store = FileSessionStore::open("control-plane", &path).unwrap();
        store.insert(session("pfs-1", "wl-1", "gpu-a")).unwrap();
        store.mark_deleted("pfs-1", "deleted by user", Utc::now()).unwrap();
    }

    let reopened = FileSessionStore::open("control-plane", &path).unwrap();
    let listed = reopened
        .list(&SessionFilter::default().exclude_deleted())
        .unwrap();
    assert!(listed.is_empty());
    let stored = reopened.get("pfs-1").unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Deleted);
    assert_eq!(stored.status_message, "deleted by user");
}

#[test]
fn test_per_cluster_layout_writes_one_file_per_cluster() {
    let temp_dir = TempDir::new().unwrap();
    let clusters = vec!["gpu-a".to_string(), "gpu-b".to_string()];

    let registry =
        build_registry(RegistryLayout::PerCluster, &clusters, Some(temp_dir.path())).unwrap();
    registry
        .store_for("gpu-a")
        .unwrap()
        .insert(session("pfs-1", "wl-1", "gpu-a"))
        .unwrap();
    registry
        .store_for("gpu-b")
        .unwrap()
        .insert(session("pfs-2", "wl-1", "gpu-b"))
        .unwrap();

    for cluster in &clusters {
        let file = temp_dir
            .path()
            .join("clusters")
            .join(cluster)
            .join("sessions.json");
        assert!(file.exists(), "missing snapshot for {}", cluster);
    }

    let gpu_a = registry.store_for("gpu-a").unwrap();
    assert!(gpu_a.get("pfs-2").unwrap().is_none());
}
