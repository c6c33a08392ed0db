use std::fmt;
use std::str::FromStr;

/// Port the datastore listens on when an address doesn't say otherwise.
pub const DEFAULT_PORT: u16 = 27017;

/// MemberAddress is the `host:port` a replica set member is reachable at. It is also the
/// `host` field of that member's entry in the replica set configuration document, so two
/// members are the same member iff their addresses are equal.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct MemberAddress {
    host: String,
    port: u16,
}

impl MemberAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        MemberAddress {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for MemberAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum AddressParseError {
    #[error("Address has an empty host: '{0}'")]
    EmptyHost(String),
    #[error("Address has an invalid port: '{0}'")]
    InvalidPort(String),
}

impl FromStr for MemberAddress {
    type Err = AddressParseError;

    /// Parses `host:port`, or a bare `host` which gets the default port.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| AddressParseError::InvalidPort(s.to_string()))?;
                (host, port)
            }
            None => (s, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(AddressParseError::EmptyHost(s.to_string()));
        }

        Ok(MemberAddress::new(host, port))
    }
}
