use crate::datastore::address::MemberAddress;
use crate::datastore::channel::{CommandChannel, Connection, ConnectionSettings, TransportError};
use crate::datastore::document::Document;
use crate::grpc::grpc_node_agent_client::GrpcNodeAgentClient;
use crate::grpc::ProtoCommandReq;
use serde_json::Value;
use tonic::transport::{Channel, Endpoint};
use tonic::Code;

/// GrpcCommandChannel reaches datastore nodes through the node agent running beside each of
/// them (see `CommandServer`).
#[derive(Clone, Default)]
pub struct GrpcCommandChannel {}

impl GrpcCommandChannel {
    pub fn new() -> Self {
        GrpcCommandChannel {}
    }

    fn endpoint(address: &MemberAddress, settings: &ConnectionSettings) -> Result<Endpoint, TransportError> {
        let url = format!("http://{}", address);
        let mut endpoint =
            Endpoint::from_shared(url.clone()).map_err(|_| TransportError::InvalidAddress(url))?;

        if let Some(timeout) = settings.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        if let Some(interval) = settings.keep_alive {
            endpoint = endpoint
                .tcp_keepalive(Some(interval))
                .http2_keep_alive_interval(interval)
                .keep_alive_while_idle(true);
        }

        Ok(endpoint)
    }
}

#[async_trait::async_trait]
impl CommandChannel for GrpcCommandChannel {
    async fn connect(
        &self,
        address: &MemberAddress,
        settings: &ConnectionSettings,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let endpoint = Self::endpoint(address, settings)?;
        let connect = endpoint.connect();

        let channel = match settings.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| TransportError::Timeout)?,
            None => connect.await,
        }
        .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Box::new(GrpcConnection {
            inner: GrpcNodeAgentClient::new(channel),
        }))
    }
}

struct GrpcConnection {
    inner: GrpcNodeAgentClient<Channel>,
}

#[async_trait::async_trait]
impl Connection for GrpcConnection {
    async fn run_command(&mut self, database: &str, command: &Document) -> Result<Document, TransportError> {
        let request = ProtoCommandReq {
            database: database.to_string(),
            command_json: Value::Object(command.clone()).to_string(),
        };

        let reply = self.inner.run_command(request).await.map_err(|status| match status.code() {
            Code::DeadlineExceeded => TransportError::Timeout,
            _ => TransportError::Rpc(status.to_string()),
        })?;

        match serde_json::from_str::<Value>(&reply.into_inner().reply_json) {
            Ok(Value::Object(doc)) => Ok(doc),
            Ok(other) => Err(TransportError::MalformedReply(format!("expected a document, got {}", other))),
            Err(e) => Err(TransportError::MalformedReply(e.to_string())),
        }
    }

    async fn close(self: Box<Self>) {
        // Dropping the last handle to the channel tears down the underlying connection.
        drop(self);
    }
}
