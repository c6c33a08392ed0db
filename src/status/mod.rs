mod endpoints;
mod server_status;

pub use endpoints::datastore_url;
pub use endpoints::primary_endpoint;
pub use endpoints::replica_set_endpoints;
pub use server_status::ServerStatusSummary;
