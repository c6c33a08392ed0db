use crate::datastore::{Document, MemberAddress};
use crate::replset::MemberId;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

/// Role a member currently plays in the replica set, as last reported for it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemberRole {
    Unknown,
    Primary,
    Secondary,
}

impl MemberRole {
    /// Maps the datastore's numeric member state (`myState`) to a role.
    pub fn from_state_code(code: i64) -> Self {
        match code {
            1 => MemberRole::Primary,
            2 => MemberRole::Secondary,
            _ => MemberRole::Unknown,
        }
    }

    /// Reads the role out of a `replSetGetStatus` reply. An empty or failed reply is `Unknown`.
    pub fn from_replica_set_status(status: &Document) -> Self {
        let code = match status.get("myState") {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        };

        code.map(Self::from_state_code).unwrap_or(MemberRole::Unknown)
    }

    fn as_u8(self) -> u8 {
        match self {
            MemberRole::Unknown => 0,
            MemberRole::Primary => 1,
            MemberRole::Secondary => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => MemberRole::Primary,
            2 => MemberRole::Secondary,
            _ => MemberRole::Unknown,
        }
    }
}

/// Member is a handle to one node of the pool. Clones share the same status, which whatever
/// observes the node (health checks, role polling) updates at any time from any thread.
///
/// Two handles are the same member iff they have the same address.
#[derive(Clone)]
pub struct Member {
    address: MemberAddress,
    status: Arc<MemberStatus>,
}

struct MemberStatus {
    healthy: AtomicBool,
    role: AtomicU8,
    id: OnceLock<MemberId>,
    removed: AtomicBool,
}

impl Member {
    pub fn new(address: MemberAddress) -> Self {
        Member {
            address,
            status: Arc::new(MemberStatus {
                healthy: AtomicBool::new(false),
                role: AtomicU8::new(MemberRole::Unknown.as_u8()),
                id: OnceLock::new(),
                removed: AtomicBool::new(false),
            }),
        }
    }

    pub fn address(&self) -> &MemberAddress {
        &self.address
    }

    /// Whether the node is up and serving.
    pub fn is_healthy(&self) -> bool {
        self.status.healthy.load(Ordering::Acquire)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.status.healthy.store(healthy, Ordering::Release);
    }

    pub fn role(&self) -> MemberRole {
        MemberRole::from_u8(self.status.role.load(Ordering::Acquire))
    }

    pub fn set_role(&self, role: MemberRole) {
        self.status.role.store(role.as_u8(), Ordering::Release);
    }

    /// The id this member was successfully added to the replica set with, if it has been.
    pub fn id(&self) -> Option<MemberId> {
        self.status.id.get().copied()
    }

    /// Whether the pool has reported this member gone.
    pub fn is_removed(&self) -> bool {
        self.status.removed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_removed(&self) {
        self.status.removed.store(true, Ordering::Release);
    }

    pub(crate) fn assign_id(&self, id: MemberId) {
        // First assignment wins. A member is only ever added once.
        let _ = self.status.id.set(id);
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Member {}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("address", &self.address)
            .field("id", &self.id())
            .field("role", &self.role())
            .field("healthy", &self.is_healthy())
            .finish()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}
