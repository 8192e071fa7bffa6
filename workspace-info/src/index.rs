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

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::record::{WorkspaceCoordinates, WorkspaceRecord};

struct IndexState {
    by_id: HashMap<String, WorkspaceRecord>,
    by_port: HashMap<String, WorkspaceCoordinates>,
}

/// Concurrent by-id/by-port map shared by every proxied request (spec.md
/// 4.1). A single `RwLock` serializes mutations (I4); `Notify` wakes
/// waiters after a mutation that may satisfy them is fully applied (I5).
pub struct WorkspaceIndex {
    state: RwLock<IndexState>,
    notify: Notify,
}

impl Default for WorkspaceIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceIndex {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IndexState {
                by_id: HashMap::new(),
                by_port: HashMap::new(),
            }),
            notify: Notify::new(),
        }
    }

    /// Atomically discards both maps and rebuilds them from `records`.
    /// Readers never observe a partially-rebuilt index: the write lock is
    /// held for the whole rebuild (spec.md 5, "never a partial rebuild").
    pub fn snapshot_replace(&self, records: Vec<WorkspaceRecord>) {
        // Sized from the new input, not the old map's length — spec.md 9
        // flags the latter as a minor inefficiency worth not repeating here.
        let mut by_id = HashMap::with_capacity(records.len());
        let mut by_port = HashMap::with_capacity(records.len());

        for record in records {
            Self::index_ports(&mut by_port, &record);
            by_id.insert(record.workspace_id.clone(), record);
        }

        {
            let mut state = self.state.write().unwrap();
            state.by_id = by_id;
            state.by_port = by_port;
        }
        self.notify.notify_waiters();
    }

    /// Adds or overwrites the entry for `record.workspace_id` (I1/I2).
    pub fn insert(&self, record: WorkspaceRecord) {
        {
            let mut state = self.state.write().unwrap();
            Self::index_ports(&mut state.by_port, &record);
            state.by_id.insert(record.workspace_id.clone(), record);
        }
        self.notify.notify_waiters();
    }

    fn index_ports(by_port: &mut HashMap<String, WorkspaceCoordinates>, record: &WorkspaceRecord) {
        if !record.ide_public_port.is_empty() {
            by_port.insert(record.ide_public_port.clone(), record.primary_coordinates());
        }
        for port in &record.ports {
            by_port.insert(
                port.public_port.clone(),
                WorkspaceCoordinates {
                    workspace_id: record.workspace_id.clone(),
                    port: port.port.to_string(),
                },
            );
        }
    }

    /// Removes the entry and its ide-public-port by-port entry; a no-op if
    /// absent. Per spec.md 4.1, deletion does not signal waiters — a
    /// waiter can only ever be satisfied by something appearing.
    ///
    /// Known limitation (spec.md 3, I3 / spec.md 9): by-port entries for
    /// the workspace's *forwarded* ports are not cleaned up here; they
    /// linger until the next snapshot-replace or until overwritten by a
    /// later insert that reuses the same public port.
    pub fn delete(&self, workspace_id: &str) {
        let mut state = self.state.write().unwrap();
        if let Some(record) = state.by_id.remove(workspace_id) {
            if !record.ide_public_port.is_empty() {
                state.by_port.remove(&record.ide_public_port);
            }
        }
    }

    pub fn get(&self, workspace_id: &str) -> Option<WorkspaceRecord> {
        self.state.read().unwrap().by_id.get(workspace_id).cloned()
    }

    pub fn get_coords_by_public_port(&self, public_port: &str) -> Option<WorkspaceCoordinates> {
        self.state
            .read()
            .unwrap()
            .by_port
            .get(public_port)
            .cloned()
    }

    /// Returns immediately if `workspace_id` is present; otherwise blocks
    /// until it appears or `cancellation` fires. Re-checks under the lock
    /// on every wake to tolerate spurious wake-ups and to never miss an
    /// update that raced with registering interest.
    pub async fn wait_for(
        &self,
        cancellation: &CancellationToken,
        workspace_id: &str,
    ) -> Option<WorkspaceRecord> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Registers interest before the re-check below, so a
            // notify_waiters() racing with this call is never lost.
            notified.as_mut().enable();

            if let Some(record) = self.get(workspace_id) {
                return Some(record);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancellation.cancelled() => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    fn record(id: &str, ide_public_port: &str, ports: Vec<(u32, &str)>) -> WorkspaceRecord {
        WorkspaceRecord {
            workspace_id: id.to_string(),
            instance_id: format!("{id}-instance"),
            url: format!("https://{id}/"),
            ide_image: "golem/ide:latest".to_string(),
            ide_public_port: ide_public_port.to_string(),
            ports: ports
                .into_iter()
                .map(|(port, public_port)| crate::record::PortRecord {
                    port,
                    url: format!("http://{id}:{port}/"),
                    public_port: public_port.to_string(),
                })
                .collect(),
            auth: vec![],
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let index = WorkspaceIndex::new();
        index.insert(record("w1", "443", vec![]));
        assert_eq!(index.get("w1").unwrap().workspace_id, "w1");
    }

    #[test]
    fn insert_populates_primary_and_port_coords() {
        let index = WorkspaceIndex::new();
        index.insert(record("w1", "8080", vec![(3000, "4000")]));

        let primary = index.get_coords_by_public_port("8080").unwrap();
        assert_eq!(primary.workspace_id, "w1");
        assert_eq!(primary.port, "");

        let forwarded = index.get_coords_by_public_port("4000").unwrap();
        assert_eq!(forwarded.workspace_id, "w1");
        assert_eq!(forwarded.port, "3000");
    }

    #[test]
    fn delete_removes_id_and_primary_port_entry() {
        let index = WorkspaceIndex::new();
        index.insert(record("w1", "443", vec![]));
        index.delete("w1");

        assert!(index.get("w1").is_none());
        assert!(index.get_coords_by_public_port("443").is_none());
    }

    #[test]
    fn delete_is_a_no_op_when_absent() {
        let index = WorkspaceIndex::new();
        index.delete("unknown");
        assert!(index.get("unknown").is_none());
    }

    #[test]
    fn snapshot_replace_discards_previous_contents() {
        let index = WorkspaceIndex::new();
        index.insert(record("stale", "443", vec![]));
        index.snapshot_replace(vec![record("fresh", "8080", vec![])]);

        assert!(index.get("stale").is_none());
        assert!(index.get_coords_by_public_port("443").is_none());
        assert_eq!(index.get("fresh").unwrap().workspace_id, "fresh");
    }

    #[tokio::test]
    async fn wait_for_returns_immediately_when_already_present() {
        let index = WorkspaceIndex::new();
        index.insert(record("w1", "443", vec![]));

        let cancellation = CancellationToken::new();
        let record = index.wait_for(&cancellation, "w1").await;
        assert_eq!(record.unwrap().workspace_id, "w1");
    }

    #[tokio::test]
    async fn wait_for_returns_none_on_cancellation() {
        let index = WorkspaceIndex::new();
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let record = index.wait_for(&cancellation, "never-appears").await;
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn wait_for_observes_a_concurrent_insert() {
        use std::sync::Arc;

        let index = Arc::new(WorkspaceIndex::new());
        let cancellation = CancellationToken::new();

        let waiter = {
            let index = index.clone();
            let cancellation = cancellation.clone();
            tokio::spawn(async move { index.wait_for(&cancellation, "w1").await })
        };

        // Give the waiter a chance to register before the insert lands.
        tokio::task::yield_now().await;
        index.insert(record("w1", "443", vec![]));

        let result = waiter.await.unwrap();
        assert_eq!(result.unwrap().workspace_id, "w1");
    }
}
