//! gate-server library crate.
//!
//! The ingress gateway for the game world.  It accepts client connections,
//! works out which legacy protocol each one speaks, and runs a per-connection
//! pipeline that turns bytes into typed requests for a handler.
//!
//! # Architecture
//!
//! ```text
//! Game client (raw TCP or WebSocket)
//!         ↕
//! [gate-server]
//!   ├── domain/           Protocol families, session ids, GatewayConfig
//!   ├── application/      Detection, stages, pipeline assembly, handler seam
//!   └── infrastructure/
//!         ├── listener/   Accept loops (tokio)
//!         ├── connection/ Per-connection read/dispatch/write driver
//!         └── resources/  File-grab resources and the game frame sink
//!         ↕
//! Game world
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` depends on `domain` and `gate-core`; it never awaits.
//! - `infrastructure` depends on every other layer plus `tokio`.

/// Domain layer: plain types and configuration.
pub mod domain;

/// Application layer: protocol detection and connection pipelines.
pub mod application;

/// Infrastructure layer: sockets, tasks and the default handler.
pub mod infrastructure;
