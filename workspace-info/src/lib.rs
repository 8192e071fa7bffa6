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

#[cfg(test)]
test_r::enable!();

pub mod config;
pub mod dialer;
pub mod error;
pub mod index;
pub mod record;
pub mod refresh;
pub mod service;
pub mod stream_consumer;

pub use config::WorkspaceInfoConfig;
pub use error::{DialError, MappingError, SnapshotError};
pub use record::{PortRecord, WorkspaceCoordinates, WorkspaceRecord};
pub use service::WorkspaceInfo;
