mod admin;
mod cluster_state;
mod controller;
mod jobs;
mod member;
mod options;
mod removal;
mod status_listener;
#[cfg(test)]
pub(crate) mod test_utils;
mod worker;

pub use admin::ReplicaSetAdmin;
pub use controller::create_replica_set_controller;
pub use controller::ControllerCreationError;
pub use controller::MembershipEvents;
pub use controller::ReplicaSetController;
pub use controller::ReplicaSetControllerConfig;
pub use member::Member;
pub use member::MemberRole;
pub use options::ControllerOptions;
pub use removal::select_member_for_removal;
pub use status_listener::ClusterLifecycle;
pub use status_listener::ClusterStatus;
pub use status_listener::ClusterStatusListener;
