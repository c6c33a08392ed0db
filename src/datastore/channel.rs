use crate::datastore::address::MemberAddress;
use crate::datastore::document::Document;
use std::time::Duration;

/// CommandChannel opens connections to datastore nodes. It is the only thing that knows how
/// bytes reach a node; `DatastoreClient` is written purely against this trait.
#[async_trait::async_trait]
pub trait CommandChannel: Send + Sync {
    async fn connect(
        &self,
        address: &MemberAddress,
        settings: &ConnectionSettings,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// Connection is a single open connection to one datastore node.
#[async_trait::async_trait]
pub trait Connection: Send {
    /// Issue `command` against `database`. An `Ok` reply may still be a logical failure; check
    /// it with `reply_ok()`.
    async fn run_command(&mut self, database: &str, command: &Document) -> Result<Document, TransportError>;

    /// Release the connection. Callers must always close, even after a failed command, so the
    /// remote node doesn't accumulate half-dead sockets.
    async fn close(self: Box<Self>);
}

/// ConnectionSettings describes how a connection should behave, independent of transport.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionSettings {
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub keep_alive: Option<Duration>,
}

impl ConnectionSettings {
    /// Short lived connection for a liveness probe. Fails fast instead of hanging on a node
    /// that is half up.
    pub fn probe(timeout: Duration) -> Self {
        ConnectionSettings {
            connect_timeout: Some(timeout),
            request_timeout: Some(timeout),
            keep_alive: None,
        }
    }

    /// Connection for real commands. Reconfigurations can legitimately take a long time while
    /// the set holds an election, so there is no request timeout.
    pub fn pooled(keep_alive: Duration) -> Self {
        ConnectionSettings {
            connect_timeout: None,
            request_timeout: None,
            keep_alive: Some(keep_alive),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),
    #[error("Failed to connect: {0}")]
    Connect(String),
    #[error("Timed out")]
    Timeout,
    #[error("RPC failed: {0}")]
    Rpc(String),
    #[error("Malformed reply: {0}")]
    MalformedReply(String),
}
