mod controller;
mod datastore;
mod replset;
mod server;
mod status;
mod grpc {
    include!("../generated/datastore.rs");
}

pub use controller::create_replica_set_controller;
pub use controller::select_member_for_removal;
pub use controller::ClusterLifecycle;
pub use controller::ClusterStatus;
pub use controller::ClusterStatusListener;
pub use controller::ControllerCreationError;
pub use controller::ControllerOptions;
pub use controller::Member;
pub use controller::MemberRole;
pub use controller::MembershipEvents;
pub use controller::ReplicaSetAdmin;
pub use controller::ReplicaSetController;
pub use controller::ReplicaSetControllerConfig;
pub use datastore::command_name;
pub use datastore::error_reply;
pub use datastore::ok_reply;
pub use datastore::reply_error_message;
pub use datastore::reply_ok;
pub use datastore::AddressParseError;
pub use datastore::CommandChannel;
pub use datastore::Connection;
pub use datastore::ConnectionSettings;
pub use datastore::DatastoreClient;
pub use datastore::DatastoreClientCreationError;
pub use datastore::DatastoreClientFactory;
pub use datastore::DatastoreClientOptions;
pub use datastore::Document;
pub use datastore::GrpcCommandChannel;
pub use datastore::MemberAddress;
pub use datastore::TransportError;
pub use datastore::DEFAULT_PORT;
pub use replset::ConfigParseError;
pub use replset::MemberId;
pub use replset::ReplicaSetConfigBuilder;
pub use replset::ReplicaSetConfiguration;
pub use replset::ReplicaSetMemberEntry;
pub use server::shutdown_signal;
pub use server::CommandHandler;
pub use server::CommandServer;
pub use server::ShutdownHandle;
pub use server::ShutdownSignal;
pub use status::datastore_url;
pub use status::primary_endpoint;
pub use status::replica_set_endpoints;
pub use status::ServerStatusSummary;
