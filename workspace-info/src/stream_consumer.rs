// Copyright 2024-2026 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use workspace_info_api::proto::workspace::manager::v1 as proto;

use crate::dialer::{Dialer, ManagerConnection};
use crate::error::SnapshotError;
use crate::index::WorkspaceIndex;
use crate::record::WorkspaceRecord;

/// Bound on the initial `GetWorkspaces` snapshot RPC (spec.md 5).
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Readiness flag read by request handlers (spec.md 4.2, "readiness"), kept
/// deliberately separate from the index's own lock so a reader never blocks
/// behind an in-flight index mutation just to check whether the stream is up.
#[derive(Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, value: bool) {
        self.0.store(value, Ordering::Release);
    }
}

/// The long-running reconnect/snapshot/subscribe loop (spec.md 4.2). Owns
/// the only connection the refresh coordinator is handed; on every
/// reconnect it republishes a fresh connection so the coordinator never
/// issues an RPC over a transport this loop has already given up on.
pub struct StreamConsumer<D: Dialer> {
    config: crate::config::WorkspaceManagerConfig,
    dialer: Arc<D>,
    index: Arc<WorkspaceIndex>,
    connection_tx: watch::Sender<Option<D::Connection>>,
    readiness: Readiness,
    cancellation: CancellationToken,
}

impl<D: Dialer + 'static> StreamConsumer<D> {
    pub fn new(
        config: crate::config::WorkspaceManagerConfig,
        dialer: Arc<D>,
        index: Arc<WorkspaceIndex>,
        connection_tx: watch::Sender<Option<D::Connection>>,
        readiness: Readiness,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            config,
            dialer,
            index,
            connection_tx,
            readiness,
            cancellation,
        }
    }

    /// Runs until `cancellation` fires. Never returns an error: every
    /// failure is logged and followed by a bounded sleep before retrying
    /// (spec.md 4.2, steps 6-7).
    pub async fn run(self) {
        loop {
            if self.cancellation.is_cancelled() {
                return;
            }

            if let Err(err) = self.run_once().await {
                tracing::warn!(error = %err, "workspace manager stream failed, reconnecting");
            }

            self.readiness.set(false);
            let _ = self.connection_tx.send(None);

            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_interval) => {}
                _ = self.cancellation.cancelled() => return,
            }
        }
    }

    #[tracing::instrument(skip(self), fields(connection_id = %Uuid::new_v4()))]
    async fn run_once(&self) -> Result<(), SnapshotError> {
        let mut connection = self.dialer.dial(&self.config.address).await?;

        let statuses = tokio::time::timeout(SNAPSHOT_TIMEOUT, connection.get_workspaces())
            .await
            .map_err(|_| SnapshotError::Timeout)??;

        let records = statuses.into_iter().map(WorkspaceRecord::from_status).collect();
        self.index.snapshot_replace(records);

        let mut updates = connection.subscribe().await?;

        let _ = self.connection_tx.send(Some(connection));
        self.readiness.set(true);

        loop {
            tokio::select! {
                item = updates.next() => match item {
                    Some(Ok(response)) => self.apply(response),
                    Some(Err(status)) => return Err(SnapshotError::Status(status)),
                    None => return Ok(()),
                },
                _ = self.cancellation.cancelled() => return Ok(()),
            }
        }
    }

    fn apply(&self, response: proto::SubscribeResponse) {
        if let Some(status) = response.status {
            let phase = proto::WorkspacePhase::try_from(status.phase)
                .unwrap_or(proto::WorkspacePhase::Unspecified);

            if WorkspaceRecord::is_stopped(phase) {
                let workspace_id = status
                    .metadata
                    .map(|metadata| metadata.meta_id)
                    .unwrap_or_default();
                self.index.delete(&workspace_id);
            } else {
                self.index.insert(WorkspaceRecord::from_status(status));
            }
        }

        if let Some(log) = response.log {
            tracing::info!(message = %log.message, "workspace manager log event");
        }
    }
}
