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

//! Boundary to the pod scheduler.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracesession_core::{ResourceProfile, ViewerType};
use tracing::info;

/// Everything the scheduler needs to start one viewer pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRequest {
    pub session_id: String,
    pub viewer_type: ViewerType,
    pub workload_uid: String,
    pub profiler_file_id: i32,
    pub cluster_name: String,
    pub pod_name: String,
    pub namespace: String,
    pub port: u16,
    pub resource_profile: ResourceProfile,
}

/// Where the scheduler placed the pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodHandle {
    pub pod_name: String,
    pub pod_ip: Option<String>,
    /// The viewer is already serving; otherwise readiness arrives later via
    /// a status report.
    pub ready: bool,
}

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("Scheduler rejected pod: {0}")]
    Rejected(String),

    #[error("Scheduler unavailable: {0}")]
    Unavailable(String),

    #[error("Scheduler call timed out after {0}s")]
    Timeout(u64),
}

#[async_trait]
pub trait ProvisionerGateway: Send + Sync {
    async fn create_pod(&self, request: &PodRequest) -> Result<PodHandle, ProvisionerError>;

    async fn delete_pod(
        &self,
        cluster: &str,
        namespace: &str,
        pod_name: &str,
    ) -> Result<(), ProvisionerError>;
}

/// Gateway used when no scheduler is wired in: logs each call and reports
/// the pod as ready immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingGateway;

#[async_trait]
impl ProvisionerGateway for LoggingGateway {
    async fn create_pod(&self, request: &PodRequest) -> Result<PodHandle, ProvisionerError> {
        info!(
            session_id = %request.session_id,
            cluster = %request.cluster_name,
            pod = %request.pod_name,
            namespace = %request.namespace,
            profile = %request.resource_profile,
            "Pod create requested"
        );
        Ok(PodHandle {
            pod_name: request.pod_name.clone(),
            pod_ip: None,
            ready: true,
        })
    }

    async fn delete_pod(
        &self,
        cluster: &str,
        namespace: &str,
        pod_name: &str,
    ) -> Result<(), ProvisionerError> {
        info!(cluster = %cluster, namespace = %namespace, pod = %pod_name, "Pod delete requested");
        Ok(())
    }
}

/// Recorded gateway traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Create(PodRequest),
    Delete {
        cluster: String,
        namespace: String,
        pod_name: String,
    },
}

/// In-process gateway that records every call and answers with a scripted
/// outcome. Backs the lifecycle tests and local dry runs.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    fail_creates: Mutex<Option<String>>,
    create_delay: Mutex<Option<Duration>>,
    pod_ip: Option<String>,
    ready: bool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer creates with `ready = true` and the given pod IP.
    pub fn ready_with_ip(ip: impl Into<String>) -> Self {
        Self {
            pod_ip: Some(ip.into()),
            ready: true,
            ..Self::default()
        }
    }

    /// Make subsequent creates fail with `message`.
    pub fn fail_creates(&self, message: impl Into<String>) {
        *self.fail_creates.lock() = Some(message.into());
    }

    /// Hold every subsequent create for `delay` before answering. The call is
    /// recorded once the delay has passed.
    pub fn delay_creates(&self, delay: Duration) {
        *self.create_delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Create(_)))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Delete { .. }))
            .count()
    }
}

#[async_trait]
impl ProvisionerGateway for RecordingGateway {
    async fn create_pod(&self, request: &PodRequest) -> Result<PodHandle, ProvisionerError> {
        let delay = *self.create_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push(GatewayCall::Create(request.clone()));
        if let Some(message) = self.fail_creates.lock().clone() {
            return Err(ProvisionerError::Rejected(message));
        }
        Ok(PodHandle {
            pod_name: request.pod_name.clone(),
            pod_ip: self.pod_ip.clone(),
            ready: self.ready,
        })
    }

    async fn delete_pod(
        &self,
        cluster: &str,
        namespace: &str,
        pod_name: &str,
    ) -> Result<(), ProvisionerError> {
        self.calls.lock().push(GatewayCall::Delete {
            cluster: cluster.to_string(),
            namespace: namespace.to_string(),
            pod_name: pod_name.to_string(),
        });
        Ok(())
    }
}
