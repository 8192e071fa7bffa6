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

use crate::error::MappingError;
use workspace_info_api::proto::workspace::manager::v1 as proto;

/// One running workspace at one point in time. Replaced wholesale, never
/// mutated in place, by the stream consumer (spec.md 3, "Lifecycle").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceRecord {
    pub workspace_id: String,
    pub instance_id: String,
    pub url: String,
    pub ide_image: String,
    /// Derived from `url` (spec.md 4.3). Empty string if `url` could not be
    /// parsed or has an indeterminate public port.
    pub ide_public_port: String,
    pub ports: Vec<PortRecord>,
    /// Opaque to the core; forwarded to the proxy layer untouched.
    pub auth: Vec<u8>,
}

/// An upstream forwarded-port specification paired with its derived
/// public port (spec.md 3, "Port Record").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortRecord {
    pub port: u32,
    pub url: String,
    pub public_port: String,
}

/// The query result returned to request handlers (spec.md 3, "Workspace
/// Coordinates"). An empty `port` means "primary IDE endpoint".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceCoordinates {
    pub workspace_id: String,
    pub port: String,
}

/// Derives the public-port string for a URL per spec.md 4.3:
/// - parses with an explicit port -> that port's decimal string
/// - parses with no explicit port -> "80" for `http`, "443" for `https`,
///   otherwise `None` (caller must drop the associated port record)
/// - fails to parse -> `Err`
fn derive_public_port(raw_url: &str) -> Result<Option<String>, MappingError> {
    let parsed = url::Url::parse(raw_url).map_err(|source| MappingError::InvalidUrl {
        url: raw_url.to_string(),
        source,
    })?;

    if let Some(port) = parsed.port() {
        return Ok(Some(port.to_string()));
    }

    Ok(match parsed.scheme() {
        "http" => Some("80".to_string()),
        "https" => Some("443".to_string()),
        _ => None,
    })
}

/// Public port for the workspace's primary IDE URL. A workspace with an
/// unparseable primary URL is still inserted (spec.md 4.3) with an empty
/// `ide_public_port`; it remains reachable by workspace id only.
fn ide_public_port(url: &str) -> String {
    match derive_public_port(url) {
        Ok(Some(port)) => port,
        Ok(None) => String::new(),
        Err(err) => {
            tracing::error!(url, error = %err, "failed to parse primary IDE URL");
            String::new()
        }
    }
}

/// Maps one exposed port into a `PortRecord`, or `None` if the port's URL
/// should be dropped (spec.md 4.3: indeterminate scheme with no explicit
/// port, or a parse failure).
fn map_port(port: u32, url: &str) -> Option<PortRecord> {
    match derive_public_port(url) {
        Ok(Some(public_port)) => Some(PortRecord {
            port,
            url: url.to_string(),
            public_port,
        }),
        Ok(None) => None,
        Err(err) => {
            tracing::error!(url, error = %err, "failed to parse exposed port URL, dropping port record");
            None
        }
    }
}

impl WorkspaceRecord {
    /// Maps one `WorkspaceStatus` message into a `WorkspaceRecord`
    /// (spec.md 4.3). Always succeeds: malformed URLs only drop the
    /// affected port entry, never the whole record.
    pub fn from_status(status: proto::WorkspaceStatus) -> Self {
        let meta_id = status
            .metadata
            .map(|metadata| metadata.meta_id)
            .unwrap_or_default();
        let spec = status.spec.unwrap_or_default();

        let ports = spec
            .exposed_ports
            .into_iter()
            .filter_map(|exposed| map_port(exposed.port, &exposed.url))
            .collect();

        WorkspaceRecord {
            workspace_id: meta_id,
            instance_id: status.id,
            ide_public_port: ide_public_port(&spec.url),
            url: spec.url,
            ide_image: spec.ide_image,
            ports,
            auth: status.auth.map(|auth| auth.value).unwrap_or_default(),
        }
    }

    pub fn is_stopped(phase: proto::WorkspacePhase) -> bool {
        phase == proto::WorkspacePhase::Stopped
    }

    pub fn primary_coordinates(&self) -> WorkspaceCoordinates {
        WorkspaceCoordinates {
            workspace_id: self.workspace_id.clone(),
            port: String::new(),
        }
    }
}
