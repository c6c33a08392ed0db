use crate::datastore::address::MemberAddress;
use crate::datastore::channel::{CommandChannel, Connection, ConnectionSettings, TransportError};
use crate::datastore::document::{self, command_name, error_reply, ok_reply, Document};
use crate::replset::ReplicaSetConfiguration;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// InMemoryReplicaSet emulates one replica set across any number of nodes. Every node sees the
/// same configuration. Like the real datastore, it only accepts a reconfiguration through the
/// primary and only if it carries a newer version.
#[derive(Clone, Default)]
pub(crate) struct InMemoryReplicaSet {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    config: Option<ReplicaSetConfiguration>,
    primary: Option<MemberAddress>,
    unreachable: HashSet<MemberAddress>,
    written_versions: Vec<u64>,
    rejected_writes: usize,
    commands: Vec<(MemberAddress, String)>,
    connections_opened: usize,
    connections_closed: usize,
}

impl InMemoryReplicaSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_unreachable(&self, address: MemberAddress) {
        self.state.lock().unwrap().unreachable.insert(address);
    }

    pub(crate) fn set_primary(&self, address: MemberAddress) {
        self.state.lock().unwrap().primary = Some(address);
    }

    pub(crate) fn config(&self) -> Option<ReplicaSetConfiguration> {
        self.state.lock().unwrap().config.clone()
    }

    pub(crate) fn written_versions(&self) -> Vec<u64> {
        self.state.lock().unwrap().written_versions.clone()
    }

    pub(crate) fn rejected_writes(&self) -> usize {
        self.state.lock().unwrap().rejected_writes
    }

    pub(crate) fn commands_received(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .commands
            .iter()
            .filter(|(_, command)| command == name)
            .count()
    }

    pub(crate) fn connections_opened(&self) -> usize {
        self.state.lock().unwrap().connections_opened
    }

    pub(crate) fn connections_closed(&self) -> usize {
        self.state.lock().unwrap().connections_closed
    }

    fn handle(&self, node: &MemberAddress, command: &Document) -> Document {
        let mut state = self.state.lock().unwrap();
        let name = command_name(command).unwrap_or_default().to_string();
        state.commands.push((node.clone(), name.clone()));

        match name.as_str() {
            document::PING => ok_reply(Document::new()),
            document::SERVER_STATUS => ok_reply(server_status()),
            document::REPL_SET_GET_STATUS => match &state.config {
                None => error_reply("no replset config has been received"),
                Some(config) => {
                    let my_state = if state.primary.as_ref() == Some(node) {
                        1
                    } else if config.member(node).is_some() {
                        2
                    } else {
                        10
                    };
                    ok_reply(as_document(json!({"set": config.name(), "myState": my_state})))
                }
            },
            document::REPL_SET_GET_CONFIG => match &state.config {
                None => error_reply("no replset config has been received"),
                Some(config) => ok_reply(as_document(json!({"config": Value::Object(config.to_document())}))),
            },
            document::REPL_SET_INITIATE => {
                if state.config.is_some() {
                    return error_reply("already initialized");
                }
                let new_config = match parse_config_argument(command, &name) {
                    Ok(config) => config,
                    Err(reply) => return reply,
                };
                state.written_versions.push(new_config.version());
                state.config = Some(new_config);
                state.primary = Some(node.clone());
                ok_reply(Document::new())
            }
            document::REPL_SET_RECONFIG => {
                let current_version = match &state.config {
                    None => return error_reply("no replset config has been received"),
                    Some(config) => config.version(),
                };
                if state.primary.as_ref() != Some(node) {
                    return error_reply("replSetReconfig should only be run on PRIMARY");
                }
                let new_config = match parse_config_argument(command, &name) {
                    Ok(config) => config,
                    Err(reply) => return reply,
                };
                if new_config.version() <= current_version {
                    state.rejected_writes += 1;
                    return error_reply(format!(
                        "version {} must be greater than {}",
                        new_config.version(),
                        current_version
                    ));
                }
                state.written_versions.push(new_config.version());
                state.config = Some(new_config);
                ok_reply(Document::new())
            }
            _ => error_reply(format!("no such command: '{}'", name)),
        }
    }
}

#[async_trait::async_trait]
impl CommandChannel for InMemoryReplicaSet {
    async fn connect(
        &self,
        address: &MemberAddress,
        _settings: &ConnectionSettings,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable.contains(address) {
            return Err(TransportError::Connect(format!("{} refused connection", address)));
        }
        state.connections_opened += 1;

        Ok(Box::new(InMemoryConnection {
            node: address.clone(),
            store: self.clone(),
        }))
    }
}

struct InMemoryConnection {
    node: MemberAddress,
    store: InMemoryReplicaSet,
}

#[async_trait::async_trait]
impl Connection for InMemoryConnection {
    async fn run_command(&mut self, _database: &str, command: &Document) -> Result<Document, TransportError> {
        Ok(self.store.handle(&self.node, command))
    }

    async fn close(self: Box<Self>) {
        self.store.state.lock().unwrap().connections_closed += 1;
    }
}

fn parse_config_argument(command: &Document, name: &str) -> Result<ReplicaSetConfiguration, Document> {
    match command.get(name) {
        Some(Value::Object(config)) => {
            ReplicaSetConfiguration::from_document(config).map_err(|e| error_reply(e.to_string()))
        }
        _ => Err(error_reply("expected a configuration document")),
    }
}

fn as_document(value: Value) -> Document {
    match value {
        Value::Object(doc) => doc,
        _ => Document::new(),
    }
}

fn server_status() -> Document {
    as_document(json!({
        "opcounters": {"insert": 0, "query": 0, "update": 0, "delete": 0, "getmore": 0, "command": 1},
        "network": {"bytesIn": 0, "bytesOut": 0, "numRequests": 1},
    }))
}

/// FlakyChannel fails a fixed number of commands in transport before succeeding, or never
/// lets a connection complete at all.
#[derive(Clone)]
pub(crate) struct FlakyChannel {
    failures_remaining: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    hang: bool,
}

impl FlakyChannel {
    pub(crate) fn failing_times(failures: usize) -> Self {
        FlakyChannel {
            failures_remaining: Arc::new(AtomicUsize::new(failures)),
            attempts: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            hang: false,
        }
    }

    pub(crate) fn hanging() -> Self {
        FlakyChannel {
            hang: true,
            ..Self::failing_times(0)
        }
    }

    pub(crate) fn attempts(&self) -> Arc<AtomicUsize> {
        self.attempts.clone()
    }

    pub(crate) fn connections_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CommandChannel for FlakyChannel {
    async fn connect(
        &self,
        _address: &MemberAddress,
        _settings: &ConnectionSettings,
    ) -> Result<Box<dyn Connection>, TransportError> {
        if self.hang {
            std::future::pending::<()>().await;
        }

        Ok(Box::new(self.clone()))
    }
}

#[async_trait::async_trait]
impl Connection for FlakyChannel {
    async fn run_command(&mut self, _database: &str, _command: &Document) -> Result<Document, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Rpc("connection reset by peer".to_string()));
        }

        Ok(ok_reply(Document::new()))
    }

    async fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
