//! Live updates over WebSocket.
//!
//! The home feed subscribes to listing events. Each user receives their own
//! notifications, messages and conversation previews on every open connection.

pub mod connection;
pub mod dispatcher;

pub use connection::verify_token;
pub use dispatcher::Dispatcher;
