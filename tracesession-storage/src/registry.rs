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

//! Deployment layouts: how session stores map onto clusters.

use crate::file::FileSessionStore;
use crate::memory::MemorySessionStore;
use crate::store::{SessionStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const CONTROL_PLANE_STORE: &str = "control-plane";
const SNAPSHOT_FILE: &str = "sessions.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryLayout {
    /// One control-plane store holds sessions for every cluster.
    #[default]
    Centralized,
    /// Each cluster owns its own store.
    PerCluster,
}

impl RegistryLayout {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "centralized" | "central" | "control_plane" => Some(RegistryLayout::Centralized),
            "per_cluster" | "cluster" => Some(RegistryLayout::PerCluster),
            _ => None,
        }
    }
}

/// Resolves the store responsible for a cluster.
pub trait SessionRegistry: Send + Sync {
    fn layout(&self) -> RegistryLayout;

    /// Store holding sessions of `cluster`, if the deployment has one.
    fn store_for(&self, cluster: &str) -> Option<Arc<dyn SessionStore>>;

    /// Every distinct store, for union reads.
    fn all_stores(&self) -> Vec<Arc<dyn SessionStore>>;
}

/// Control-plane registry shared across clusters.
pub struct CentralizedRegistry {
    store: Arc<dyn SessionStore>,
}

impl CentralizedRegistry {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new(CONTROL_PLANE_STORE)))
    }
}

impl SessionRegistry for CentralizedRegistry {
    fn layout(&self) -> RegistryLayout {
        RegistryLayout::Centralized
    }

    fn store_for(&self, _cluster: &str) -> Option<Arc<dyn SessionStore>> {
        Some(self.store.clone())
    }

    fn all_stores(&self) -> Vec<Arc<dyn SessionStore>> {
        vec![self.store.clone()]
    }
}

/// Legacy layout: one registry per cluster.
pub struct PerClusterRegistry {
    stores: BTreeMap<String, Arc<dyn SessionStore>>,
}

impl PerClusterRegistry {
    pub fn new(stores: BTreeMap<String, Arc<dyn SessionStore>>) -> Self {
        Self { stores }
    }

    pub fn in_memory<I, S>(clusters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stores = clusters
            .into_iter()
            .map(|name| {
                let name = name.into();
                let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(name.clone()));
                (name, store)
            })
            .collect();
        Self::new(stores)
    }

    pub fn cluster_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }
}

impl SessionRegistry for PerClusterRegistry {
    fn layout(&self) -> RegistryLayout {
        RegistryLayout::PerCluster
    }

    fn store_for(&self, cluster: &str) -> Option<Arc<dyn SessionStore>> {
        self.stores.get(cluster).cloned()
    }

    fn all_stores(&self) -> Vec<Arc<dyn SessionStore>> {
        self.stores.values().cloned().collect()
    }
}

/// Build the registry for a deployment.
///
/// With `data_dir` the stores are file-backed: `<data_dir>/sessions.json` for
/// the centralized layout, `<data_dir>/clusters/<name>/sessions.json` per
/// cluster otherwise. Without it everything lives in memory.
pub fn build_registry(
    layout: RegistryLayout,
    clusters: &[String],
    data_dir: Option<&Path>,
) -> StoreResult<Arc<dyn SessionRegistry>> {
    let registry: Arc<dyn SessionRegistry> = match (layout, data_dir) {
        (RegistryLayout::Centralized, None) => Arc::new(CentralizedRegistry::in_memory()),
        (RegistryLayout::Centralized, Some(dir)) => {
            let store = FileSessionStore::open(CONTROL_PLANE_STORE, dir.join(SNAPSHOT_FILE))?;
            Arc::new(CentralizedRegistry::new(Arc::new(store)))
        }
        (RegistryLayout::PerCluster, None) => {
            Arc::new(PerClusterRegistry::in_memory(clusters.iter().cloned()))
        }
        (RegistryLayout::PerCluster, Some(dir)) => {
            let mut stores: BTreeMap<String, Arc<dyn SessionStore>> = BTreeMap::new();
            for cluster in clusters {
                let path = dir.join("clusters").join(cluster).join(SNAPSHOT_FILE);
                let store = FileSessionStore::open(cluster.clone(), path)?;
                stores.insert(cluster.clone(), Arc::new(store));
            }
            Arc::new(PerClusterRegistry::new(stores))
        }
    };

    info!(
        layout = ?layout,
        stores = registry.all_stores().len(),
        persistent = data_dir.is_some(),
        "Session registry ready"
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_parse() {
        assert_eq!(
            RegistryLayout::parse("per-cluster"),
            Some(RegistryLayout::PerCluster)
        );
        assert_eq!(
            RegistryLayout::parse("Centralized"),
            Some(RegistryLayout::Centralized)
        );
        assert_eq!(RegistryLayout::parse("sharded"), None);
    }

    #[test]
    fn test_centralized_shares_one_store() {
        let registry = CentralizedRegistry::in_memory();
        let a = registry.store_for("a").unwrap();
        let b = registry.store_for("b").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.all_stores().len(), 1);
    }

    #[test]
    fn test_per_cluster_isolates_stores() {
        let registry = PerClusterRegistry::in_memory(["a", "b"]);
        let a = registry.store_for("a").unwrap();
        let b = registry.store_for("b").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(registry.store_for("c").is_none());
        assert_eq!(registry.all_stores().len(), 2);
        assert_eq!(a.name(), "a");
    }

    #[test]
    fn test_build_in_memory_registries() {
        let clusters = vec!["x".to_string(), "y".to_string()];
        let registry = build_registry(RegistryLayout::PerCluster, &clusters, None).unwrap();
        assert_eq!(registry.layout(), RegistryLayout::PerCluster);
        assert_eq!(registry.all_stores().len(), 2);

        let registry = build_registry(RegistryLayout::Centralized, &clusters, None).unwrap();
        assert_eq!(registry.layout(), RegistryLayout::Centralized);
        assert_eq!(registry.all_stores().len(), 1);
    }
}
