mod builder;
mod config;

pub use builder::ReplicaSetConfigBuilder;
pub use config::ConfigParseError;
pub use config::MemberId;
pub use config::ReplicaSetConfiguration;
pub use config::ReplicaSetMemberEntry;
