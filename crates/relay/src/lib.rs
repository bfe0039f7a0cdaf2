pub mod connection;
pub mod relay;
pub mod server;

pub use connection::{ChannelHandle, ConnectionManager};
pub use relay::Relay;
pub use server::{router, serve, AppState};
