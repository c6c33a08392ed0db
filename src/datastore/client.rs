use crate::controller::{MemberRole, ReplicaSetAdmin};
use crate::datastore::address::MemberAddress;
use crate::datastore::backoff::ExponentialBackoff;
use crate::datastore::channel::{CommandChannel, Connection, ConnectionSettings};
use crate::datastore::document::{
    self, command_with_argument, reply_error_message, reply_ok, simple_command, Document, ADMIN_DATABASE,
};
use crate::datastore::options::{DatastoreClientOptions, DatastoreClientOptionsValidated};
use crate::replset::{MemberId, ReplicaSetConfigBuilder, ReplicaSetConfiguration};
use serde_json::Value;
use std::convert::TryFrom;
use std::sync::Arc;

/// DatastoreClientFactory hands out a `DatastoreClient` per node. All clients share the
/// transport and options.
#[derive(Clone)]
pub struct DatastoreClientFactory {
    logger: slog::Logger,
    channel: Arc<dyn CommandChannel>,
    options: DatastoreClientOptionsValidated,
}

#[derive(Debug, thiserror::Error)]
pub enum DatastoreClientCreationError {
    #[error("Illegal options for configuring client: {0}")]
    IllegalClientOptions(String),
}

impl DatastoreClientFactory {
    pub fn new(
        logger: slog::Logger,
        channel: Arc<dyn CommandChannel>,
        options: DatastoreClientOptions,
    ) -> Result<Self, DatastoreClientCreationError> {
        let options = DatastoreClientOptionsValidated::try_from(options)
            .map_err(|e| DatastoreClientCreationError::IllegalClientOptions(e.to_string()))?;

        Ok(DatastoreClientFactory {
            logger,
            channel,
            options,
        })
    }

    pub fn client(&self, address: MemberAddress) -> DatastoreClient {
        DatastoreClient {
            logger: self.logger.new(slog::o!("Node" => address.to_string())),
            address,
            channel: self.channel.clone(),
            options: self.options.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ReplicaSetAdmin for DatastoreClientFactory {
    async fn initialize_replica_set(&self, node: &MemberAddress, name: &str, id: MemberId) -> bool {
        self.client(node.clone()).initialize_replica_set(name, id).await
    }

    async fn add_member(&self, primary: &MemberAddress, secondary: &MemberAddress, id: MemberId) -> bool {
        self.client(primary.clone()).add_member(secondary, id).await
    }

    async fn remove_member(&self, primary: &MemberAddress, member: &MemberAddress) -> bool {
        self.client(primary.clone()).remove_member(member).await
    }
}

/// DatastoreClient issues commands to a single datastore node.
///
/// Every call opens its own connection and closes it before returning, so callers can't rely
/// on any connection affinity between calls. Nothing here returns an error: transport failures
/// are retried, logged, and surface as `false`/`None`/an empty document.
#[derive(Clone)]
pub struct DatastoreClient {
    logger: slog::Logger,
    address: MemberAddress,
    channel: Arc<dyn CommandChannel>,
    options: DatastoreClientOptionsValidated,
}

impl DatastoreClient {
    pub fn address(&self) -> &MemberAddress {
        &self.address
    }

    /// `ping()` returns true iff the node answers a trivial command within the probe timeout.
    pub async fn ping(&self) -> bool {
        let timeout = self.options.probe_timeout;
        match tokio::time::timeout(timeout, self.ping_once(timeout)).await {
            Ok(alive) => alive,
            Err(_) => {
                slog::debug!(self.logger, "Ping timed out after {:?}", timeout);
                false
            }
        }
    }

    async fn ping_once(&self, timeout: tokio::time::Duration) -> bool {
        let mut connection = match self.channel.connect(&self.address, &ConnectionSettings::probe(timeout)).await {
            Ok(connection) => connection,
            Err(e) => {
                slog::debug!(self.logger, "Ping failed to connect: {}", e);
                return false;
            }
        };

        let result = connection
            .run_command(ADMIN_DATABASE, &simple_command(document::PING))
            .await;
        connection.close().await;

        match result {
            Ok(reply) => reply_ok(&reply),
            Err(e) => {
                slog::debug!(self.logger, "Ping failed: {}", e);
                false
            }
        }
    }

    /// `run_command()` returns the node's reply, whether it reports success or not. It returns
    /// `None` only if no connection could be opened or every attempt failed in transport.
    pub async fn run_command(&self, database: &str, command: &Document) -> Option<Document> {
        let settings = ConnectionSettings::pooled(self.options.keep_alive_interval);
        let mut connection = match self.channel.connect(&self.address, &settings).await {
            Ok(connection) => connection,
            Err(e) => {
                slog::warn!(
                    self.logger,
                    "Failed to connect to run {:?}: {}",
                    document::command_name(command),
                    e
                );
                return None;
            }
        };

        let result = self
            .run_command_with_retries(connection.as_mut(), database, command)
            .await;
        connection.close().await;

        result
    }

    async fn run_command_with_retries(
        &self,
        connection: &mut dyn Connection,
        database: &str,
        command: &Document,
    ) -> Option<Document> {
        let command_name = document::command_name(command).unwrap_or("<empty>");
        let max_attempts = self.options.max_attempts;
        let mut backoff = ExponentialBackoff::new(
            self.options.initial_backoff,
            self.options.backoff_multiplier,
            self.options.max_backoff,
        );

        for attempt in 1..=max_attempts {
            match connection.run_command(database, command).await {
                Ok(reply) => {
                    if !reply_ok(&reply) {
                        slog::debug!(
                            self.logger,
                            "Command {} returned not ok: {:?}",
                            command_name,
                            reply_error_message(&reply)
                        );
                    }
                    return Some(reply);
                }
                Err(e) => {
                    slog::warn!(
                        self.logger,
                        "Command {} failed (attempt {}/{}): {}",
                        command_name,
                        attempt,
                        max_attempts,
                        e
                    );
                    if attempt < max_attempts {
                        if let Some(delay) = backoff.next() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        slog::error!(
            self.logger,
            "Giving up on command {} after {} attempts",
            command_name,
            max_attempts
        );
        None
    }

    pub async fn get_server_status(&self) -> Document {
        self.run_admin_command(simple_command(document::SERVER_STATUS))
            .await
            .unwrap_or_default()
    }

    pub async fn get_replica_set_status(&self) -> Document {
        self.run_admin_command(simple_command(document::REPL_SET_GET_STATUS))
            .await
            .unwrap_or_default()
    }

    /// Role this node reports for itself in `replSetGetStatus`.
    pub async fn member_role(&self) -> MemberRole {
        MemberRole::from_replica_set_status(&self.get_replica_set_status().await)
    }

    /// `None` means the configuration can't be read right now (node unreachable, not yet
    /// initialized, mid-election). Callers should try again later.
    pub async fn get_replica_set_config(&self) -> Option<ReplicaSetConfiguration> {
        let reply = self
            .run_admin_command(simple_command(document::REPL_SET_GET_CONFIG))
            .await?;

        let config_doc = match reply.get("config") {
            Some(Value::Object(config_doc)) => config_doc,
            _ => {
                slog::warn!(self.logger, "Replica set config reply has no config document");
                return None;
            }
        };

        match ReplicaSetConfiguration::from_document(config_doc) {
            Ok(config) => Some(config),
            Err(e) => {
                slog::warn!(self.logger, "Failed to parse replica set config: {}", e);
                None
            }
        }
    }

    /// Initializes a new replica set with this node as its only member.
    pub async fn initialize_replica_set(&self, name: &str, id: MemberId) -> bool {
        let config = ReplicaSetConfigBuilder::builder(name)
            .member(self.address.clone(), id)
            .build();

        slog::info!(self.logger, "Initializing replica set {} with member id {}", name, id);
        let command = command_with_argument(document::REPL_SET_INITIATE, Value::Object(config.to_document()));
        self.run_admin_command(command).await.is_some()
    }

    /// Adds `secondary` to the replica set this node is primary of.
    pub async fn add_member(&self, secondary: &MemberAddress, id: MemberId) -> bool {
        let existing = match self.get_replica_set_config().await {
            Some(existing) => existing,
            None => {
                slog::warn!(
                    self.logger,
                    "Could not read replica set config; not adding {} to the set",
                    secondary
                );
                return false;
            }
        };

        slog::info!(
            self.logger,
            "Adding {} with member id {} to replica set {}",
            secondary,
            id,
            existing.name()
        );
        let builder = ReplicaSetConfigBuilder::from_existing_config(&existing)
            .primary(self.address.clone())
            .member(secondary.clone(), id);
        self.reconfigure(builder).await
    }

    /// Removes `member` from the replica set this node is primary of.
    pub async fn remove_member(&self, member: &MemberAddress) -> bool {
        let existing = match self.get_replica_set_config().await {
            Some(existing) => existing,
            None => {
                slog::warn!(
                    self.logger,
                    "Could not read replica set config; not removing {} from the set",
                    member
                );
                return false;
            }
        };

        slog::info!(self.logger, "Removing {} from replica set {}", member, existing.name());
        let builder = ReplicaSetConfigBuilder::from_existing_config(&existing)
            .primary(self.address.clone())
            .remove(member);
        self.reconfigure(builder).await
    }

    async fn reconfigure(&self, builder: ReplicaSetConfigBuilder) -> bool {
        let target = match builder.target() {
            Some(target) if target != &self.address => self.with_address(target.clone()),
            _ => self.clone(),
        };
        let config = builder.build();

        slog::debug!(
            target.logger,
            "Reconfiguring replica set {} to version {}",
            config.name(),
            config.version()
        );
        let command = command_with_argument(document::REPL_SET_RECONFIG, Value::Object(config.to_document()));
        target.run_admin_command(command).await.is_some()
    }

    /// Runs against the admin database and only keeps replies that report success.
    async fn run_admin_command(&self, command: Document) -> Option<Document> {
        self.run_command(ADMIN_DATABASE, &command)
            .await
            .filter(|reply| reply_ok(reply))
    }

    fn with_address(&self, address: MemberAddress) -> DatastoreClient {
        DatastoreClient {
            logger: self.logger.new(slog::o!("Node" => address.to_string())),
            address,
            channel: self.channel.clone(),
            options: self.options.clone(),
        }
    }
}
