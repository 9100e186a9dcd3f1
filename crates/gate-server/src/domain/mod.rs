//! Domain layer for gate-server.
//!
//! Plain types with no I/O: which protocol a connection speaks, what transport
//! carries it, how a session is identified, and how the gateway is configured.
//! Nothing in here touches a socket or the runtime.

pub mod config;
pub mod protocol;
pub mod session;

pub use config::{ConfigError, GatewayConfig, ListenerConfig, ListenerProtocol};
pub use protocol::{ProtocolFamily, Transport};
pub use session::SessionId;
