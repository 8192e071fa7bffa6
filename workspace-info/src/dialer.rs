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

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::Stream;
use tonic::transport::{Channel, Endpoint};

use workspace_info_api::proto::workspace::manager::v1 as proto;
use workspace_info_api::proto::workspace::manager::v1::workspace_manager_service_client::WorkspaceManagerServiceClient;

use crate::error::DialError;

/// Bound on establishing the transport to the workspace manager (spec.md 5,
/// "bounded dial").
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub type ResponseStream =
    Pin<Box<dyn Stream<Item = Result<proto::SubscribeResponse, tonic::Status>> + Send>>;

/// The two RPCs the core needs from a workspace manager connection
/// (spec.md 6, "Manager contract"). Kept separate from the raw generated
/// client so tests can drive the stream consumer and refresh coordinator
/// against an in-memory fake instead of a real socket.
#[async_trait]
pub trait ManagerConnection: Send + Sync + 'static {
    async fn get_workspaces(&mut self) -> Result<Vec<proto::WorkspaceStatus>, tonic::Status>;
    async fn subscribe(&mut self) -> Result<ResponseStream, tonic::Status>;
}

/// Establishes the transport used by both the stream consumer and the
/// refresh coordinator (spec.md 6, "Dialer contract"). `Connection` must be
/// cheap to clone: the stream consumer hands a clone to the refresh
/// coordinator over a `watch` channel rather than sharing one behind a
/// lock.
#[async_trait]
pub trait Dialer: Send + Sync {
    type Connection: ManagerConnection + Clone;

    async fn dial(&self, address: &str) -> Result<Self::Connection, DialError>;
}

/// `ManagerConnection` backed by a real `tonic` client.
#[derive(Clone)]
pub struct TonicManagerConnection(WorkspaceManagerServiceClient<Channel>);

#[async_trait]
impl ManagerConnection for TonicManagerConnection {
    async fn get_workspaces(&mut self) -> Result<Vec<proto::WorkspaceStatus>, tonic::Status> {
        let response = self.0.get_workspaces(proto::GetWorkspacesRequest {}).await?;
        Ok(response.into_inner().status)
    }

    async fn subscribe(&mut self) -> Result<ResponseStream, tonic::Status> {
        let stream = self.0.subscribe(proto::SubscribeRequest {}).await?.into_inner();
        let boxed: ResponseStream = Box::pin(stream);
        Ok(boxed)
    }
}

/// Default `Dialer`, backed by a `tonic` HTTP/2 channel.
pub struct TonicDialer {
    connect_timeout: Duration,
}

impl TonicDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TonicDialer {
    fn default() -> Self {
        Self::new(CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Dialer for TonicDialer {
    type Connection = TonicManagerConnection;

    async fn dial(&self, address: &str) -> Result<Self::Connection, DialError> {
        let endpoint = Endpoint::from_shared(address.to_string())?.connect_timeout(self.connect_timeout);

        let channel = tokio::time::timeout(self.connect_timeout, endpoint.connect())
            .await
            .map_err(|_| DialError::Timeout)??;

        Ok(TonicManagerConnection(WorkspaceManagerServiceClient::new(channel)))
    }
}
