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

use crate::config::SafeDisplay;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ws_manager_addr must not be empty")]
    MissingWorkspaceManagerAddress,
}

impl SafeDisplay for ConfigError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}

/// Failure to establish the transport to the workspace manager (spec.md 6,
/// "Dialer contract"). Always logged at warn and retried; never surfaced.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("connect timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl SafeDisplay for DialError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}

/// Failure of a bounded snapshot RPC (initial or on-demand refresh).
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot request timed out")]
    Timeout,
    #[error("manager returned an error: {0}")]
    Status(#[from] tonic::Status),
    #[error(transparent)]
    Dial(#[from] DialError),
}

impl SnapshotError {
    /// Whether a caller may reasonably retry the same snapshot attempt
    /// (used by the stream consumer to decide whether to log at warn vs.
    /// treat the connection as unusable).
    pub fn is_retriable(&self) -> bool {
        matches!(self, SnapshotError::Timeout | SnapshotError::Dial(_))
    }
}

impl SafeDisplay for SnapshotError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}

/// Failure to map a manager status message into a `WorkspaceRecord`
/// (spec.md 4.3). Per spec these never abort the enclosing insert; only
/// the affected port entry (or the ide public port) is dropped.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to parse URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl SafeDisplay for MappingError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}
