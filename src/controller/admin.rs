use crate::datastore::MemberAddress;
use crate::replset::MemberId;

/// ReplicaSetAdmin is what the controller needs from the datastore to change membership. Each
/// method reports whether the change took effect; the controller decides whether to retry.
#[async_trait::async_trait]
pub trait ReplicaSetAdmin: Send + Sync {
    /// Create the replica set `name` with `node` as its only member.
    async fn initialize_replica_set(&self, node: &MemberAddress, name: &str, id: MemberId) -> bool;

    /// Add `secondary` to the set, issued through `primary`.
    async fn add_member(&self, primary: &MemberAddress, secondary: &MemberAddress, id: MemberId) -> bool;

    /// Remove `member` from the set, issued through `primary`.
    async fn remove_member(&self, primary: &MemberAddress, member: &MemberAddress) -> bool;
}
