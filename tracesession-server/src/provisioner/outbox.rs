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

use crate::provisioner::gateway::PodRequest;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

/// Work for the provisioning worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningIntent {
    /// Start the viewer pod for a freshly created session.
    Create(PodRequest),
    /// Remove the viewer pod of a deleted session.
    Teardown {
        session_id: String,
        cluster_name: String,
        namespace: String,
        pod_name: String,
    },
}

impl ProvisioningIntent {
    pub fn session_id(&self) -> &str {
        match self {
            ProvisioningIntent::Create(request) => &request.session_id,
            ProvisioningIntent::Teardown { session_id, .. } => session_id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ProvisioningIntent::Create(_) => "create",
            ProvisioningIntent::Teardown { .. } => "teardown",
        }
    }
}

/// Counters shared by the outbox and the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub processed: u64,
    pub pods_created: u64,
    pub pods_failed: u64,
    pub teardowns: u64,
    pub teardown_errors: u64,
}

pub(crate) struct ProvisioningStatsInternal {
    pub(crate) enqueued: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) processed: AtomicU64,
    pub(crate) pods_created: AtomicU64,
    pub(crate) pods_failed: AtomicU64,
    pub(crate) teardowns: AtomicU64,
    pub(crate) teardown_errors: AtomicU64,
}

impl ProvisioningStatsInternal {
    pub(crate) fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            pods_created: AtomicU64::new(0),
            pods_failed: AtomicU64::new(0),
            teardowns: AtomicU64::new(0),
            teardown_errors: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> ProvisioningStats {
        ProvisioningStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            pods_created: self.pods_created.load(Ordering::Relaxed),
            pods_failed: self.pods_failed.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::Relaxed),
            teardown_errors: self.teardown_errors.load(Ordering::Relaxed),
        }
    }
}

/// Sending half of the provisioning queue.
///
/// `enqueue` never waits and never reports failure to the caller: a full or
/// closed queue is logged and counted as dropped.
#[derive(Clone)]
pub struct ProvisioningOutbox {
    sender: mpsc::Sender<ProvisioningIntent>,
    stats: Arc<ProvisioningStatsInternal>,
}

impl ProvisioningOutbox {
    pub(crate) fn new(
        sender: mpsc::Sender<ProvisioningIntent>,
        stats: Arc<ProvisioningStatsInternal>,
    ) -> Self {
        Self { sender, stats }
    }

    /// An outbox with no worker behind it; every intent is dropped.
    pub fn disconnected() -> Self {
        let (sender, _) = mpsc::channel(1);
        Self::new(sender, Arc::new(ProvisioningStatsInternal::new()))
    }

    pub fn enqueue(&self, intent: ProvisioningIntent) {
        let session_id = intent.session_id().to_string();
        let kind = intent.kind();
        match self.sender.try_send(intent) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                debug!(session_id = %session_id, kind, "Provisioning intent queued");
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                error!(session_id = %session_id, kind, "Provisioning queue full, intent dropped");
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(session_id = %session_id, kind, "Provisioning worker stopped, intent dropped");
            }
        }
    }

    pub fn stats(&self) -> ProvisioningStats {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teardown(id: &str) -> ProvisioningIntent {
        ProvisioningIntent::Teardown {
            session_id: id.to_string(),
            cluster_name: "default".to_string(),
            namespace: "primus-lens".to_string(),
            pod_name: format!("perfetto-{}", id),
        }
    }

    #[tokio::test]
    async fn test_enqueue_counts() {
        let (tx, mut rx) = mpsc::channel(1);
        let outbox = ProvisioningOutbox::new(tx, Arc::new(ProvisioningStatsInternal::new()));

        outbox.enqueue(teardown("pfs-1"));
        // capacity 1: the second intent does not fit
        outbox.enqueue(teardown("pfs-2"));

        let stats = outbox.stats();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(rx.recv().await.unwrap().session_id(), "pfs-1");
    }

    #[test]
    fn test_disconnected_outbox_never_fails() {
        let outbox = ProvisioningOutbox::disconnected();
        outbox.enqueue(teardown("pfs-1"));
        assert_eq!(outbox.stats().dropped, 1);
    }
}
