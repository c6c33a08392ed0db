use crate::datastore::{error_reply, Document};
use crate::grpc::grpc_node_agent_server::{GrpcNodeAgent, GrpcNodeAgentServer};
use crate::grpc::{ProtoCommandReply, ProtoCommandReq};
use crate::server::ShutdownSignal;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// CommandHandler executes one datastore command on the node the server runs beside.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn handle(&self, database: &str, command: Document) -> Document;
}

/// CommandServer is the node agent: it exposes `RunCommand` over gRPC and hands each command
/// to a `CommandHandler`.
pub struct CommandServer {
    logger: slog::Logger,
    handler: Arc<dyn CommandHandler>,
}

impl CommandServer {
    pub fn new(logger: slog::Logger, handler: Arc<dyn CommandHandler>) -> Self {
        CommandServer { logger, handler }
    }

    pub async fn run(self, socket_addr: SocketAddr, shutdown_signal: ShutdownSignal) {
        let logger = self.logger.clone();
        slog::info!(logger, "Listening on '{:?}'", socket_addr);

        let result = Server::builder()
            .add_service(GrpcNodeAgentServer::new(self))
            .serve_with_shutdown(socket_addr, shutdown_signal)
            .await;

        slog::info!(logger, "Server run() has exited: {:?}", result);
    }

    async fn handle_run_command(&self, rpc_request: ProtoCommandReq) -> Result<ProtoCommandReply, Status> {
        let command = Self::convert_command(&rpc_request.command_json)?;
        if command.is_empty() {
            return Err(Status::invalid_argument("Command document is empty"));
        }

        let reply = if rpc_request.database.is_empty() {
            error_reply("No database given")
        } else {
            self.handler.handle(&rpc_request.database, command).await
        };

        Ok(ProtoCommandReply {
            reply_json: Value::Object(reply).to_string(),
        })
    }

    fn convert_command(command_json: &str) -> Result<Document, Status> {
        match serde_json::from_str::<Value>(command_json) {
            Ok(Value::Object(command)) => Ok(command),
            Ok(_) => Err(Status::invalid_argument("Command is not a document")),
            Err(e) => Err(Status::invalid_argument(format!("Command is not valid JSON: {}", e))),
        }
    }
}

#[async_trait::async_trait]
impl GrpcNodeAgent for CommandServer {
    async fn run_command(
        &self,
        rpc_request_wrapped: Request<ProtoCommandReq>,
    ) -> Result<Response<ProtoCommandReply>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        let rpc_result = self.handle_run_command(rpc_request).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }
}
