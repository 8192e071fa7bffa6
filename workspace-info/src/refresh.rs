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

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::dialer::ManagerConnection;
use crate::index::WorkspaceIndex;
use crate::record::WorkspaceRecord;

/// Bound on an on-demand refresh's `GetWorkspaces` call (spec.md 5).
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle used by request handlers to ask for an out-of-band refresh and
/// wait for it to land (spec.md 4.4, 4.5 "wait-then-refresh"). Cheap to
/// clone; any number of outstanding handles can be in flight at once.
#[derive(Clone)]
pub struct RefreshHandle {
    request_tx: mpsc::Sender<()>,
    generation_rx: watch::Receiver<u64>,
}

impl RefreshHandle {
    /// Nudges the coordinator and waits until a fetch that started at or
    /// after this call completes. Concurrent callers that arrive while a
    /// fetch is already in flight observe the same completion instead of
    /// each triggering their own RPC (spec.md 4.4, "single-flight").
    pub async fn refresh_and_wait(&self) {
        let mut generation_rx = self.generation_rx.clone();
        let observed = *generation_rx.borrow();

        // A full channel means a refresh is already queued; this request
        // rides along with it rather than queuing a second one.
        let _ = self.request_tx.try_send(());

        while *generation_rx.borrow() <= observed {
            if generation_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Single task that owns all on-demand and periodic refreshes (spec.md
/// 4.4). Reuses the connection handed off by the stream consumer rather
/// than dialing its own; a refresh with no connection available is a
/// logged no-op, not an error callers see.
pub struct RefreshCoordinator<C: ManagerConnection + Clone> {
    connection_rx: watch::Receiver<Option<C>>,
    index: Arc<WorkspaceIndex>,
    interval: Duration,
    request_rx: mpsc::Receiver<()>,
    generation_tx: watch::Sender<u64>,
    cancellation: CancellationToken,
}

impl<C: ManagerConnection + Clone> RefreshCoordinator<C> {
    pub fn new(
        connection_rx: watch::Receiver<Option<C>>,
        index: Arc<WorkspaceIndex>,
        interval: Duration,
        cancellation: CancellationToken,
    ) -> (Self, RefreshHandle) {
        let (request_tx, request_rx) = mpsc::channel(1);
        let (generation_tx, generation_rx) = watch::channel(0u64);

        let coordinator = Self {
            connection_rx,
            index,
            interval,
            request_rx,
            generation_tx,
            cancellation,
        };
        let handle = RefreshHandle {
            request_tx,
            generation_rx,
        };

        (coordinator, handle)
    }

    pub async fn run(mut self) {
        // Set once a caller registers interest via `request_rx`, cleared
        // once the next tick has served it. Ticks that find no pending
        // request are a no-op (spec.md 4.4 step 3): the manager only sees
        // an RPC when a caller is actually waiting on one.
        let mut pending = false;

        loop {
            tokio::select! {
                received = self.request_rx.recv() => {
                    if received.is_none() {
                        return;
                    }
                    pending = true;
                }
                _ = tokio::time::sleep(self.interval) => {
                    if pending {
                        self.fetch_and_publish().await;
                        pending = false;
                    }
                }
                _ = self.cancellation.cancelled() => return,
            }
        }
    }

    async fn fetch_and_publish(&mut self) {
        let connection = self.connection_rx.borrow().clone();
        match connection {
            Some(mut connection) => {
                match tokio::time::timeout(FETCH_TIMEOUT, connection.get_workspaces()).await {
                    Ok(Ok(statuses)) => {
                        let records = statuses.into_iter().map(WorkspaceRecord::from_status).collect();
                        self.index.snapshot_replace(records);
                    }
                    Ok(Err(status)) => {
                        tracing::warn!(error = %status, "on-demand refresh failed");
                    }
                    Err(_) => {
                        tracing::warn!("on-demand refresh timed out");
                    }
                }
            }
            None => {
                tracing::warn!("on-demand refresh skipped, no workspace manager connection");
            }
        }

        // Waiters are released whether or not the fetch succeeded
        // (spec.md 7): a stale-but-unblocked caller can retry, a wedged
        // one cannot.
        self.generation_tx.send_modify(|generation| *generation += 1);
    }
}
