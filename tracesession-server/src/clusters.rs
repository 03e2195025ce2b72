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

//! Cluster name resolution.
//!
//! A request names its cluster explicitly or through the caller's default
//! (see [`crate::api::CallerCluster`]); otherwise the process default applies.

use std::collections::BTreeSet;
use tracesession_core::{Result, SessionError};

#[derive(Debug, Clone)]
pub struct ClusterResolver {
    default_cluster: String,
    known: BTreeSet<String>,
}

impl ClusterResolver {
    pub fn new(default_cluster: impl Into<String>, known: impl IntoIterator<Item = String>) -> Self {
        let default_cluster = default_cluster.into();
        let mut known: BTreeSet<String> = known.into_iter().collect();
        known.insert(default_cluster.clone());
        Self {
            default_cluster,
            known,
        }
    }

    pub fn default_cluster(&self) -> &str {
        &self.default_cluster
    }

    pub fn known(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }

    pub fn is_known(&self, cluster: &str) -> bool {
        self.known.contains(cluster)
    }

    /// Pick the cluster for a request. Blank values count as absent.
    pub fn resolve(&self, requested: Option<&str>) -> Result<String> {
        let chosen = requested
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(self.default_cluster.as_str());

        if !self.is_known(chosen) {
            return Err(SessionError::ClusterNotFound(chosen.to_string()));
        }
        Ok(chosen.to_string())
    }

    /// Validate an optional read filter without falling back to the default.
    pub fn filter(&self, requested: Option<&str>) -> Result<Option<String>> {
        match requested.map(str::trim).filter(|c| !c.is_empty()) {
            None => Ok(None),
            Some(cluster) if self.is_known(cluster) => Ok(Some(cluster.to_string())),
            Some(cluster) => Err(SessionError::ClusterNotFound(cluster.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ClusterResolver {
        ClusterResolver::new("default", vec!["gpu-a".to_string(), "gpu-b".to_string()])
    }

    #[test]
    fn test_falls_back_to_default() {
        let r = resolver();
        assert_eq!(r.resolve(Some("gpu-a")).unwrap(), "gpu-a");
        assert_eq!(r.resolve(Some("  ")).unwrap(), "default");
        assert_eq!(r.resolve(None).unwrap(), "default");
        assert_eq!(r.default_cluster(), "default");
    }

    #[test]
    fn test_unknown_cluster() {
        let r = resolver();
        let err = r.resolve(Some("gpu-z")).unwrap_err();
        assert_eq!(err.code(), "CLUSTER_NOT_FOUND");
        assert!(r.filter(Some("gpu-z")).is_err());
        assert_eq!(r.filter(Some("")).unwrap(), None);
        assert_eq!(r.filter(Some("gpu-b")).unwrap().as_deref(), Some("gpu-b"));
    }
}
