mod address;
mod backoff;
mod channel;
mod client;
mod document;
mod grpc;
mod options;
#[cfg(test)]
pub(crate) mod test_utils;

pub use address::AddressParseError;
pub use address::MemberAddress;
pub use address::DEFAULT_PORT;
pub use channel::CommandChannel;
pub use channel::Connection;
pub use channel::ConnectionSettings;
pub use channel::TransportError;
pub use client::DatastoreClient;
pub use client::DatastoreClientCreationError;
pub use client::DatastoreClientFactory;
pub use document::command_name;
pub use document::error_reply;
pub use document::ok_reply;
pub use document::reply_error_message;
pub use document::reply_ok;
pub use document::Document;
pub use grpc::GrpcCommandChannel;
pub use options::DatastoreClientOptions;
