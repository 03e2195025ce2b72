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

use crate::provisioner::DEFAULT_MAX_IN_FLIGHT;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracesession_core::{
    SessionPolicy, DEFAULT_ESTIMATED_READY_SECONDS, DEFAULT_MAX_SESSION_TTL_MINUTES,
    DEFAULT_POD_NAMESPACE, DEFAULT_POD_PORT, DEFAULT_TTL_MINUTES,
};
use tracesession_storage::RegistryLayout;

/// Tracesession Server Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub clusters: ClusterConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub provisioner: ProvisionerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP API listen address (e.g., "127.0.0.1:47200")
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Cluster used when a request names none
    #[serde(default = "default_cluster")]
    pub default_cluster: String,

    /// Known clusters (empty = only the default cluster)
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionsConfig {
    #[serde(default = "default_ttl_minutes")]
    pub default_ttl_minutes: i64,

    /// Hard lifetime ceiling measured from creation
    #[serde(default = "default_max_session_ttl_minutes")]
    pub max_session_ttl_minutes: i64,

    #[serde(default = "default_estimated_ready_seconds")]
    pub estimated_ready_seconds: u32,

    /// Serialize create-or-reuse per (workload, file, viewer) in process
    #[serde(default)]
    pub advisory_lock: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    /// `centralized` (control-plane registry) or `per_cluster`
    #[serde(default)]
    pub layout: RegistryLayout,

    /// Snapshot directory; unset keeps sessions in memory only
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvisionerConfig {
    #[serde(default = "default_pod_namespace")]
    pub pod_namespace: String,

    #[serde(default = "default_pod_port")]
    pub pod_port: u16,

    /// Upper bound on a single gateway call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Outbox channel capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Intents the worker runs concurrently
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human format
    #[serde(default)]
    pub json: bool,
}

// Default values
fn default_http_addr() -> String {
    "127.0.0.1:47200".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_enable_cors() -> bool {
    true
}

fn default_cluster() -> String {
    "default".to_string()
}

fn default_ttl_minutes() -> i64 {
    DEFAULT_TTL_MINUTES
}

fn default_max_session_ttl_minutes() -> i64 {
    DEFAULT_MAX_SESSION_TTL_MINUTES
}

fn default_estimated_ready_seconds() -> u32 {
    DEFAULT_ESTIMATED_READY_SECONDS
}

fn default_pod_namespace() -> String {
    DEFAULT_POD_NAMESPACE.to_string()
}

fn default_pod_port() -> u16 {
    DEFAULT_POD_PORT
}

fn default_call_timeout() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_http_addr(),
            request_timeout_secs: default_request_timeout(),
            enable_cors: default_enable_cors(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            default_cluster: default_cluster(),
            names: vec![],
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            default_ttl_minutes: default_ttl_minutes(),
            max_session_ttl_minutes: default_max_session_ttl_minutes(),
            estimated_ready_seconds: default_estimated_ready_seconds(),
            advisory_lock: false,
        }
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            pod_namespace: default_pod_namespace(),
            pod_port: default_pod_port(),
            call_timeout_secs: default_call_timeout(),
            queue_capacity: default_queue_capacity(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl ClusterConfig {
    /// Configured clusters with the default cluster always included.
    pub fn cluster_names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self
            .names
            .iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        names.insert(self.default_cluster.clone());
        names.into_iter().collect()
    }
}

impl SessionsConfig {
    pub fn policy(&self) -> SessionPolicy {
        SessionPolicy {
            default_ttl_minutes: self.default_ttl_minutes,
            max_session_ttl_minutes: self.max_session_ttl_minutes,
            estimated_ready_seconds: self.estimated_ready_seconds,
        }
    }
}

impl ProvisionerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - TRACESESSION_HTTP_ADDR: HTTP listen address (default: 127.0.0.1:47200)
    /// - TRACESESSION_REQUEST_TIMEOUT: Request timeout in seconds (default: 30)
    /// - TRACESESSION_ENABLE_CORS: Enable CORS (default: true)
    /// - TRACESESSION_DEFAULT_CLUSTER: Cluster used when none is named (default: default)
    /// - TRACESESSION_CLUSTERS: Comma-separated known clusters
    /// - TRACESESSION_DEFAULT_TTL_MINUTES: Session TTL on create (default: 30)
    /// - TRACESESSION_MAX_SESSION_TTL_MINUTES: Lifetime ceiling (default: 240)
    /// - TRACESESSION_ADVISORY_LOCK: Serialize create-or-reuse (default: false)
    /// - TRACESESSION_STORAGE_LAYOUT: centralized | per_cluster
    /// - TRACESESSION_DATA_DIR: Snapshot directory (default: in-memory)
    /// - TRACESESSION_POD_NAMESPACE: Viewer pod namespace (default: primus-lens)
    /// - TRACESESSION_POD_PORT: Viewer pod port (default: 8080)
    /// - TRACESESSION_PROVISIONER_TIMEOUT: Gateway call timeout in seconds (default: 30)
    /// - TRACESESSION_PROVISIONER_MAX_IN_FLIGHT: Concurrent provisioning intents (default: 8)
    /// - TRACESESSION_LOG_JSON: JSON log output (default: false)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        // Override with environment variables
        Ok(Self::merge_with_env(config))
    }

    /// Merge config with environment variables (env takes priority)
    fn merge_with_env(mut config: Self) -> Self {
        config.apply_env();
        config
    }

    /// Overwrite only the fields whose variable is set and parses.
    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("TRACESESSION_HTTP_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(val) = env_parse("TRACESESSION_REQUEST_TIMEOUT") {
            self.server.request_timeout_secs = val;
        }
        if let Some(val) = env_parse("TRACESESSION_ENABLE_CORS") {
            self.server.enable_cors = val;
        }

        if let Ok(cluster) = std::env::var("TRACESESSION_DEFAULT_CLUSTER") {
            self.clusters.default_cluster = cluster;
        }
        if let Ok(names) = std::env::var("TRACESESSION_CLUSTERS") {
            self.clusters.names = names
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
        }

        if let Some(val) = env_parse("TRACESESSION_DEFAULT_TTL_MINUTES") {
            self.sessions.default_ttl_minutes = val;
        }
        if let Some(val) = env_parse("TRACESESSION_MAX_SESSION_TTL_MINUTES") {
            self.sessions.max_session_ttl_minutes = val;
        }
        if let Some(val) = env_parse("TRACESESSION_ADVISORY_LOCK") {
            self.sessions.advisory_lock = val;
        }

        if let Ok(layout) = std::env::var("TRACESESSION_STORAGE_LAYOUT") {
            match RegistryLayout::parse(&layout) {
                Some(layout) => self.storage.layout = layout,
                None => tracing::warn!("Ignoring unknown storage layout: {}", layout),
            }
        }
        if let Ok(data_dir) = std::env::var("TRACESESSION_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(data_dir));
        }

        if let Ok(namespace) = std::env::var("TRACESESSION_POD_NAMESPACE") {
            self.provisioner.pod_namespace = namespace;
        }
        if let Some(val) = env_parse("TRACESESSION_POD_PORT") {
            self.provisioner.pod_port = val;
        }
        if let Some(val) = env_parse("TRACESESSION_PROVISIONER_TIMEOUT") {
            self.provisioner.call_timeout_secs = val;
        }
        if let Some(val) = env_parse("TRACESESSION_PROVISIONER_MAX_IN_FLIGHT") {
            self.provisioner.max_in_flight = val;
        }

        if let Some(val) = env_parse("TRACESESSION_LOG_JSON") {
            self.logging.json = val;
        }
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.clusters.default_cluster.trim().is_empty() {
            anyhow::bail!("clusters.default_cluster must not be empty");
        }

        let sessions = &self.sessions;
        if sessions.default_ttl_minutes < 1 {
            anyhow::bail!("sessions.default_ttl_minutes must be at least 1");
        }
        if sessions.max_session_ttl_minutes < sessions.default_ttl_minutes {
            anyhow::bail!(
                "sessions.max_session_ttl_minutes ({}) is below default_ttl_minutes ({})",
                sessions.max_session_ttl_minutes,
                sessions.default_ttl_minutes
            );
        }

        if self.provisioner.call_timeout_secs == 0 {
            anyhow::bail!("provisioner.call_timeout_secs must be positive");
        }
        if self.provisioner.queue_capacity == 0 {
            anyhow::bail!("provisioner.queue_capacity must be positive");
        }
        if self.provisioner.max_in_flight == 0 {
            anyhow::bail!("provisioner.max_in_flight must be positive");
        }

        if let Some(ref data_dir) = self.storage.data_dir {
            if !data_dir.exists() {
                std::fs::create_dir_all(data_dir)?;
            }
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:47200");
        assert_eq!(config.sessions.default_ttl_minutes, 30);
        assert_eq!(config.sessions.max_session_ttl_minutes, 240);
        assert_eq!(config.storage.layout, RegistryLayout::Centralized);
        assert!(!config.sessions.advisory_lock);
        assert_eq!(config.provisioner.max_in_flight, 8);
        assert!(config.validate().is_ok());

        let mut config = ServerConfig::default();
        config.provisioner.max_in_flight = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let config: ServerConfig = toml::from_str(
            r#"
            [clusters]
            default_cluster = "gpu-a"
            names = ["gpu-a", "gpu-b"]

            [sessions]
            max_session_ttl_minutes = 120
            advisory_lock = true

            [storage]
            layout = "per_cluster"
            "#,
        )
        .unwrap();

        assert_eq!(config.clusters.cluster_names(), vec!["gpu-a", "gpu-b"]);
        assert_eq!(config.sessions.default_ttl_minutes, 30);
        assert_eq!(config.sessions.policy().max_session_ttl_minutes, 120);
        assert!(config.sessions.advisory_lock);
        assert_eq!(config.storage.layout, RegistryLayout::PerCluster);
        assert_eq!(config.provisioner.pod_port, 8080);
    }

    #[test]
    fn test_default_cluster_always_known() {
        let clusters = ClusterConfig {
            default_cluster: "local".to_string(),
            names: vec!["gpu-a".to_string(), " ".to_string()],
        };
        assert_eq!(clusters.cluster_names(), vec!["gpu-a", "local"]);
    }

    #[test]
    fn test_validate_rejects_inverted_ttls() {
        let mut config = ServerConfig::default();
        config.sessions.max_session_ttl_minutes = 10;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.server.listen_addr = "not-an-addr".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("TRACESESSION_HTTP_ADDR", "0.0.0.0:9090");
        std::env::set_var("TRACESESSION_CLUSTERS", "gpu-a, gpu-b");
        std::env::set_var("TRACESESSION_STORAGE_LAYOUT", "per-cluster");

        let config = ServerConfig::from_env();
        assert_eq!(config.server.listen_addr, "0.0.0.0:9090");
        assert_eq!(config.clusters.names, vec!["gpu-a", "gpu-b"]);
        assert_eq!(config.storage.layout, RegistryLayout::PerCluster);

        std::env::remove_var("TRACESESSION_HTTP_ADDR");
        std::env::remove_var("TRACESESSION_CLUSTERS");
        std::env::remove_var("TRACESESSION_STORAGE_LAYOUT");
    }
}
