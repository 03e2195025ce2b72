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

//! Provisioning Worker - drains the outbox against the scheduler
//!
//! Each intent runs on its own task, at most `max_in_flight` at a time, so a
//! slow scheduler call for one session does not hold up the others. Intents
//! for the same session run in queue order: a teardown queued by a delete
//! always waits for the create it races with. Every gateway call is bounded
//! by the configured timeout; failures are recorded on the session
//! (`status = failed`) or logged, never returned to an API caller.

use crate::provisioner::gateway::{PodRequest, ProvisionerError, ProvisionerGateway};
use crate::provisioner::outbox::{
    ProvisioningIntent, ProvisioningOutbox, ProvisioningStatsInternal,
};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracesession_core::{Clock, SessionStatus};
use tracesession_storage::{SessionRegistry, SessionStore};
use tracing::{debug, error, info, warn};

/// Intents handled concurrently unless configured otherwise.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

pub struct ProvisioningWorker {
    registry: Arc<dyn SessionRegistry>,
    gateway: Arc<dyn ProvisionerGateway>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
    max_in_flight: usize,
}

impl ProvisioningWorker {
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        gateway: Arc<dyn ProvisionerGateway>,
        clock: Arc<dyn Clock>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            gateway,
            clock,
            call_timeout,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Spawn the worker and return the outbox feeding it.
    pub fn spawn(self, capacity: usize) -> ProvisioningOutbox {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(ProvisioningStatsInternal::new());

        let worker_stats = stats.clone();
        tokio::spawn(async move {
            self.run(receiver, worker_stats).await;
        });

        ProvisioningOutbox::new(sender, stats)
    }

    async fn run(
        self,
        mut receiver: mpsc::Receiver<ProvisioningIntent>,
        stats: Arc<ProvisioningStatsInternal>,
    ) {
        info!(
            timeout_secs = self.call_timeout.as_secs(),
            max_in_flight = self.max_in_flight,
            "Provisioning worker started"
        );

        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let worker = Arc::new(self);
        // latest task per session; the next intent for it waits on this one
        let mut lanes: HashMap<String, JoinHandle<()>> = HashMap::new();

        while let Some(intent) = receiver.recv().await {
            lanes.retain(|_, task| !task.is_finished());

            let session_id = intent.session_id().to_string();
            let previous = lanes.remove(&session_id);
            let worker = worker.clone();
            let permits = permits.clone();
            let stats = stats.clone();

            let task = tokio::spawn(async move {
                if let Some(previous) = previous {
                    let _ = previous.await;
                }
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                worker.handle(intent, &stats).await;
                stats.processed.fetch_add(1, Ordering::Relaxed);
            });
            lanes.insert(session_id, task);
        }

        for (_, task) in lanes {
            let _ = task.await;
        }
        info!("Provisioning worker shutting down");
    }

    async fn handle(&self, intent: ProvisioningIntent, stats: &ProvisioningStatsInternal) {
        match intent {
            ProvisioningIntent::Create(request) => self.create(request, stats).await,
            ProvisioningIntent::Teardown {
                session_id,
                cluster_name,
                namespace,
                pod_name,
            } => {
                self.teardown(&session_id, &cluster_name, &namespace, &pod_name, stats)
                    .await
            }
        }
    }

    async fn create(&self, request: PodRequest, stats: &ProvisioningStatsInternal) {
        let session_id = request.session_id.as_str();
        let Some(store) = self.registry.store_for(&request.cluster_name) else {
            warn!(
                session_id,
                cluster = %request.cluster_name,
                "No registry for cluster, create skipped"
            );
            return;
        };

        match store.get(session_id) {
            Ok(Some(session)) if session.status == SessionStatus::Pending => {}
            Ok(Some(session)) => {
                debug!(session_id, status = %session.status, "Session left pending, create skipped");
                return;
            }
            Ok(None) => {
                warn!(session_id, "Session vanished before provisioning");
                return;
            }
            Err(e) => {
                error!(session_id, error = %e, "Failed to load session for provisioning");
                return;
            }
        }

        let now = self.clock.now();
        if let Err(e) = store.update_status(
            session_id,
            SessionStatus::Creating,
            Some("Creating viewer pod".to_string()),
            now,
        ) {
            warn!(session_id, error = %e, "Could not mark session creating");
            return;
        }

        let call = self.gateway.create_pod(&request);
        let outcome = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProvisionerError::Timeout(self.call_timeout.as_secs())),
        };

        match outcome {
            Ok(handle) => {
                stats.pods_created.fetch_add(1, Ordering::Relaxed);
                let placed = store.update_pod_info(
                    session_id,
                    Some(handle.pod_name.clone()),
                    handle.pod_ip.clone(),
                );
                if let Err(e) = placed {
                    warn!(session_id, error = %e, "Failed to record pod placement");
                }
                if handle.ready {
                    self.report(&*store, session_id, SessionStatus::Ready, "Viewer pod ready");
                }
                info!(
                    session_id,
                    pod = %handle.pod_name,
                    ready = handle.ready,
                    "Viewer pod provisioned"
                );
            }
            Err(e) => {
                stats.pods_failed.fetch_add(1, Ordering::Relaxed);
                error!(session_id, error = %e, "Viewer pod creation failed");
                self.report(&*store, session_id, SessionStatus::Failed, &e.to_string());
            }
        }
    }

    async fn teardown(
        &self,
        session_id: &str,
        cluster: &str,
        namespace: &str,
        pod_name: &str,
        stats: &ProvisioningStatsInternal,
    ) {
        stats.teardowns.fetch_add(1, Ordering::Relaxed);
        let call = self.gateway.delete_pod(cluster, namespace, pod_name);
        let outcome = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProvisionerError::Timeout(self.call_timeout.as_secs())),
        };

        match outcome {
            Ok(()) => info!(session_id, pod = %pod_name, "Viewer pod torn down"),
            Err(e) => {
                stats.teardown_errors.fetch_add(1, Ordering::Relaxed);
                warn!(session_id, pod = %pod_name, error = %e, "Viewer pod teardown failed");
            }
        }
    }

    /// Status write that tolerates losing a race with a delete.
    fn report(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
        status: SessionStatus,
        message: &str,
    ) {
        let now = self.clock.now();
        if let Err(e) = store.update_status(session_id, status, Some(message.to_string()), now) {
            debug!(session_id, error = %e, "Status update skipped");
        }
    }
}
