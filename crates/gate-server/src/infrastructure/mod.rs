//! Infrastructure layer for gate-server.
//!
//! Everything that touches a socket, the file system or the runtime:
//!
//! - `listener`   – bind the configured addresses and run the accept loops
//! - `connection` – drive one connection's pipeline with real reads and writes
//! - `resources`  – the gateway's own request handler

pub mod connection;
pub mod listener;
pub mod resources;

pub use connection::{handle_connection, ConnectionContext};
pub use listener::{run_server, serve};
pub use resources::{GameInbound, GatewayHandler};
