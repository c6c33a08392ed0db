use crate::controller::admin::ReplicaSetAdmin;
use crate::datastore::MemberAddress;
use crate::replset::MemberId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::time::Duration;

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum AdminCall {
    Initialize {
        node: MemberAddress,
        name: String,
        id: MemberId,
    },
    AddMember {
        primary: MemberAddress,
        member: MemberAddress,
        id: MemberId,
    },
    RemoveMember {
        primary: MemberAddress,
        member: MemberAddress,
    },
}

/// RecordingAdmin remembers every call made to it and answers with whatever result it was
/// told to (success by default), after an optional delay.
pub(crate) struct RecordingAdmin {
    calls: Mutex<Vec<AdminCall>>,
    delay: Mutex<Duration>,
    initialize_succeeds: AtomicBool,
    add_succeeds: AtomicBool,
    remove_succeeds: AtomicBool,
}

impl RecordingAdmin {
    pub(crate) fn new() -> Self {
        RecordingAdmin {
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::from_secs(0)),
            initialize_succeeds: AtomicBool::new(true),
            add_succeeds: AtomicBool::new(true),
            remove_succeeds: AtomicBool::new(true),
        }
    }

    pub(crate) fn set_initialize_succeeds(&self, succeeds: bool) {
        self.initialize_succeeds.store(succeeds, Ordering::SeqCst);
    }

    pub(crate) fn set_add_succeeds(&self, succeeds: bool) {
        self.add_succeeds.store(succeeds, Ordering::SeqCst);
    }

    pub(crate) fn set_remove_succeeds(&self, succeeds: bool) {
        self.remove_succeeds.store(succeeds, Ordering::SeqCst);
    }

    /// Every call takes this long to answer from now on.
    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub(crate) fn calls(&self) -> Vec<AdminCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, call: AdminCall) {
        self.calls.lock().unwrap().push(call);
        let delay = *self.delay.lock().unwrap();
        if delay > Duration::from_secs(0) {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl ReplicaSetAdmin for RecordingAdmin {
    async fn initialize_replica_set(&self, node: &MemberAddress, name: &str, id: MemberId) -> bool {
        self.record(AdminCall::Initialize {
            node: node.clone(),
            name: name.to_string(),
            id,
        })
        .await;
        self.initialize_succeeds.load(Ordering::SeqCst)
    }

    async fn add_member(&self, primary: &MemberAddress, secondary: &MemberAddress, id: MemberId) -> bool {
        self.record(AdminCall::AddMember {
            primary: primary.clone(),
            member: secondary.clone(),
            id,
        })
        .await;
        self.add_succeeds.load(Ordering::SeqCst)
    }

    async fn remove_member(&self, primary: &MemberAddress, member: &MemberAddress) -> bool {
        self.record(AdminCall::RemoveMember {
            primary: primary.clone(),
            member: member.clone(),
        })
        .await;
        self.remove_succeeds.load(Ordering::SeqCst)
    }
}
