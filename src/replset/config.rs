use crate::datastore::{Document, MemberAddress};
use serde_json::{json, Value};
use std::fmt;

/// MemberId is a replica set member's `_id` in the configuration document. Ids only need to be
/// unique within a set; they are never reused, but gaps are fine.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct MemberId(u64);

impl MemberId {
    pub fn new(id: u64) -> Self {
        MemberId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the `members` array.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplicaSetMemberEntry {
    id: MemberId,
    host: MemberAddress,
    // Fields we don't interpret (priority, votes, hidden, ...). Carried through untouched so a
    // reconfiguration doesn't silently reset them.
    extra: Document,
}

impl ReplicaSetMemberEntry {
    pub fn new(id: MemberId, host: MemberAddress) -> Self {
        ReplicaSetMemberEntry {
            id,
            host,
            extra: Document::new(),
        }
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn host(&self) -> &MemberAddress {
        &self.host
    }

    fn from_value(value: &Value) -> Result<Self, ConfigParseError> {
        let mut extra = value.as_object().cloned().ok_or(ConfigParseError::MalformedMember)?;

        let id = extra
            .remove("_id")
            .as_ref()
            .and_then(integral)
            .map(MemberId::new)
            .ok_or(ConfigParseError::MissingMemberId)?;
        let host = match extra.remove("host") {
            Some(Value::String(host)) => host
                .parse::<MemberAddress>()
                .map_err(|_| ConfigParseError::InvalidMemberHost(host))?,
            _ => return Err(ConfigParseError::InvalidMemberHost(String::new())),
        };

        Ok(ReplicaSetMemberEntry { id, host, extra })
    }

    fn to_value(&self) -> Value {
        let mut doc = self.extra.clone();
        doc.insert("_id".to_string(), json!(self.id.as_u64()));
        doc.insert("host".to_string(), json!(self.host.to_string()));
        Value::Object(doc)
    }
}

/// ReplicaSetConfiguration is the datastore's versioned membership document:
///
/// ```text
/// { _id: <name>, version: <n>, members: [ { _id: <id>, host: "<host:port>" }, ... ] }
/// ```
///
/// The datastore only accepts a reconfiguration whose version is greater than the one it
/// currently holds.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplicaSetConfiguration {
    name: String,
    version: u64,
    members: Vec<ReplicaSetMemberEntry>,
    extra: Document,
}

impl ReplicaSetConfiguration {
    pub(crate) fn new(name: String, version: u64, members: Vec<ReplicaSetMemberEntry>, extra: Document) -> Self {
        ReplicaSetConfiguration {
            name,
            version,
            members,
            extra,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn members(&self) -> &[ReplicaSetMemberEntry] {
        &self.members
    }

    pub fn member(&self, host: &MemberAddress) -> Option<&ReplicaSetMemberEntry> {
        self.members.iter().find(|m| &m.host == host)
    }

    pub(crate) fn into_parts(self) -> (String, u64, Vec<ReplicaSetMemberEntry>, Document) {
        (self.name, self.version, self.members, self.extra)
    }

    pub fn from_document(doc: &Document) -> Result<Self, ConfigParseError> {
        let mut extra = doc.clone();

        let name = match extra.remove("_id") {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => return Err(ConfigParseError::MissingName),
        };
        let version = extra
            .remove("version")
            .as_ref()
            .and_then(integral)
            .ok_or(ConfigParseError::MissingVersion)?;
        let members = match extra.remove("members") {
            Some(Value::Array(members)) => members
                .iter()
                .map(ReplicaSetMemberEntry::from_value)
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(ConfigParseError::MissingMembers),
        };

        Ok(ReplicaSetConfiguration {
            name,
            version,
            members,
            extra,
        })
    }

    pub fn to_document(&self) -> Document {
        let mut doc = self.extra.clone();
        doc.insert("_id".to_string(), json!(self.name));
        doc.insert("version".to_string(), json!(self.version));
        doc.insert(
            "members".to_string(),
            Value::Array(self.members.iter().map(ReplicaSetMemberEntry::to_value).collect()),
        );
        doc
    }
}

// The datastore may hand integers back as doubles.
fn integral(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum ConfigParseError {
    #[error("Configuration has no replica set name")]
    MissingName,
    #[error("Configuration has no version")]
    MissingVersion,
    #[error("Configuration has no members array")]
    MissingMembers,
    #[error("Member entry is not a document")]
    MalformedMember,
    #[error("Member entry has no _id")]
    MissingMemberId,
    #[error("Member entry has an invalid host '{0}'")]
    InvalidMemberHost(String),
}
