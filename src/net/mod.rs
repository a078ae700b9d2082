pub mod broadcaster;
pub mod connection;
pub mod server;

pub use broadcaster::Broadcaster;
pub use connection::{write_loop, Connection};
pub use server::GameServer;
