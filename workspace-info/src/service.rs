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

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::{SafeDisplay, WorkspaceInfoConfig};
use crate::dialer::{Dialer, TonicDialer};
use crate::error::ConfigError;
use crate::index::WorkspaceIndex;
use crate::record::{WorkspaceCoordinates, WorkspaceRecord};
use crate::refresh::{RefreshCoordinator, RefreshHandle};
use crate::stream_consumer::{Readiness, StreamConsumer};

/// Top-level handle to the live workspace-fleet view (spec.md 2, "System
/// Overview"). Construction spawns the stream consumer and refresh
/// coordinator and returns immediately; `ready()` reports whether the
/// stream consumer has completed at least one snapshot.
pub struct WorkspaceInfo {
    index: Arc<WorkspaceIndex>,
    readiness: Readiness,
    refresh: RefreshHandle,
    cancellation: CancellationToken,
}

impl WorkspaceInfo {
    /// Validates `config` and connects using the default `tonic`-backed
    /// dialer. Must be called from within a running Tokio runtime: it
    /// spawns the stream consumer and refresh coordinator onto it rather
    /// than driving its own (spec.md, Non-goals: "no CLI of its own").
    pub fn connect(config: WorkspaceInfoConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::connect_with_dialer(config, Arc::new(TonicDialer::default())))
    }

    pub fn connect_with_dialer<D: Dialer + 'static>(
        config: WorkspaceInfoConfig,
        dialer: Arc<D>,
    ) -> Self {
        tracing::info!(config = %config.to_safe_string(), "connecting to workspace manager");

        let index = Arc::new(WorkspaceIndex::new());
        let readiness = Readiness::new();
        let cancellation = CancellationToken::new();
        let (client_tx, client_rx) = watch::channel(None);

        let stream_consumer = StreamConsumer::new(
            config.workspace_manager.clone(),
            dialer,
            index.clone(),
            client_tx,
            readiness.clone(),
            cancellation.clone(),
        );

        let (refresh_coordinator, refresh_handle) = RefreshCoordinator::new(
            client_rx,
            index.clone(),
            config.refresh.interval,
            cancellation.clone(),
        );

        let mut tasks = JoinSet::new();
        tasks.spawn(stream_consumer.run());
        tasks.spawn(refresh_coordinator.run());

        // Keeps both tasks alive and reaps them as they finish; the only
        // way either returns is `cancellation` firing.
        tokio::spawn(async move {
            let mut tasks = tasks;
            while tasks.join_next().await.is_some() {}
        });

        Self {
            index,
            readiness,
            refresh: refresh_handle,
            cancellation,
        }
    }

    /// Whether the stream consumer has a live subscription and has applied
    /// at least one snapshot (spec.md 4.2, "readiness").
    pub fn ready(&self) -> bool {
        self.readiness.get()
    }

    /// Index-only lookup, used to route a forwarded-port request (spec.md
    /// 4.1). Never waits: an unknown public port is simply not routable
    /// yet.
    pub fn workspace_coords(&self, public_port: &str) -> Option<WorkspaceCoordinates> {
        self.index.get_coords_by_public_port(public_port)
    }

    /// Resolves a workspace id to its current record (spec.md 4.5). Returns
    /// immediately if already known; otherwise registers as a waiter on the
    /// index and submits a refresh request concurrently (spec.md 4.5 step
    /// 2), returning whichever resolves it first. If the refresh completes
    /// without finding the workspace, falls back to waiting on the stream
    /// consumer alone rather than refreshing again. Returns `None` only
    /// once `cancellation` fires.
    pub async fn workspace_info(
        &self,
        cancellation: &CancellationToken,
        workspace_id: &str,
    ) -> Option<WorkspaceRecord> {
        if let Some(record) = self.index.get(workspace_id) {
            return Some(record);
        }

        if cancellation.is_cancelled() {
            return None;
        }

        let wait = self.index.wait_for(cancellation, workspace_id);
        tokio::pin!(wait);
        let refresh = self.refresh.refresh_and_wait();
        tokio::pin!(refresh);

        tokio::select! {
            record = &mut wait => record,
            _ = &mut refresh => {
                if let Some(record) = self.index.get(workspace_id) {
                    Some(record)
                } else {
                    wait.await
                }
            }
        }
    }

    /// Stops the stream consumer and refresh coordinator. The index keeps
    /// serving whatever it last held (spec.md, Non-goals: "no persistence
    /// across restarts" — there is also no attempt to clear it on
    /// shutdown).
    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }
}
