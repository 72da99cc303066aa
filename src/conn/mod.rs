//! Connection state machines: the shared engine, the active opener, the
//! passive side and the listener.

mod client;
mod connection;
mod listener;
mod server;

pub use client::Client;
pub use connection::Connection;
pub use listener::Listener;
pub use server::ServerConnection;
