pub mod connection;
pub mod handler;
pub mod pool;
pub mod server;
pub mod session;

pub use server::Server;
pub use session::{SessionState, SharedSession};
