mod server;
mod shutdown;

pub use server::CommandHandler;
pub use server::CommandServer;
pub use shutdown::shutdown_signal;
pub use shutdown::ShutdownHandle;
pub use shutdown::ShutdownSignal;
