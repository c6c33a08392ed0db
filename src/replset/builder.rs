use crate::datastore::{Document, MemberAddress};
use crate::replset::config::{MemberId, ReplicaSetConfiguration, ReplicaSetMemberEntry};

/// ReplicaSetConfigBuilder computes the next configuration document to hand the datastore.
///
/// Whatever it is seeded with, `build()` produces version `seed + 1`, so a configuration built
/// from the one we just read is exactly one ahead of it. Built from scratch, the result is
/// version 1.
#[derive(Clone, Debug)]
pub struct ReplicaSetConfigBuilder {
    name: String,
    base_version: u64,
    members: Vec<ReplicaSetMemberEntry>,
    extra: Document,
    primary: Option<MemberAddress>,
}

impl ReplicaSetConfigBuilder {
    pub fn builder(name: impl Into<String>) -> Self {
        ReplicaSetConfigBuilder {
            name: name.into(),
            base_version: 0,
            members: Vec::new(),
            extra: Document::new(),
            primary: None,
        }
    }

    pub fn from_existing_config(config: &ReplicaSetConfiguration) -> Self {
        let (name, version, members, extra) = config.clone().into_parts();
        ReplicaSetConfigBuilder {
            name,
            base_version: version,
            members,
            extra,
            primary: None,
        }
    }

    /// Appends a member. Adding an id or address that is already present is the caller's
    /// mistake and is not checked here; the datastore will reject the result.
    pub fn member(mut self, address: MemberAddress, id: MemberId) -> Self {
        self.members.push(ReplicaSetMemberEntry::new(id, address));
        self
    }

    /// Removes the entry for `address`, if there is one.
    pub fn remove(mut self, address: &MemberAddress) -> Self {
        self.members.retain(|m| m.host() != address);
        self
    }

    /// Records the node this change is issued through. Not part of the written document.
    pub fn primary(mut self, address: MemberAddress) -> Self {
        self.primary = Some(address);
        self
    }

    pub fn target(&self) -> Option<&MemberAddress> {
        self.primary.as_ref()
    }

    pub fn build(self) -> ReplicaSetConfiguration {
        ReplicaSetConfiguration::new(self.name, self.base_version + 1, self.members, self.extra)
    }
}
