//! # gate-core
//!
//! Shared library for the game-world gateway containing the wire codecs used
//! by every connection pipeline, the connection failure taxonomy, and the
//! per-tick synchronization block aggregator.
//!
//! This crate has zero dependencies on sockets, async runtimes, or the file
//! system.  Everything here is a plain value or a plain state machine that can
//! be driven byte-by-byte from a unit test.
//!
//! # Architecture overview
//!
//! The gateway sits between game clients and the game world.  It has two
//! jobs, and this crate holds the pure half of each:
//!
//! - **`protocol`** – How bytes become requests.  Clients speak one of several
//!   legacy protocols (a raw game protocol, the line-delimited "file-grab"
//!   protocol, or either of those behind an HTTP WebSocket upgrade).  Each
//!   protocol is decoded by a small chain of codecs: a framer splits the byte
//!   stream into frames, a text decoder turns frames into strings, and a
//!   request decoder turns strings into typed requests.
//!
//! - **`sync`** – How entity changes become update blocks.  Once per game tick
//!   every player and NPC describes what changed about it (it moved, it spoke,
//!   it played an animation) as a set of typed blocks, at most one per kind.
//!   The serializer that builds the outbound update packet reads a snapshot
//!   of each set.

pub mod protocol;
pub mod sync;

// Re-export the most-used types at the crate root so callers can write
// `gate_core::SynchronizationBlockSet` instead of the full module path.
pub use protocol::error::{FailureKind, PipelineError};
pub use protocol::metrics::FailureCounters;
pub use protocol::messages::{ConnectionEvent, Request, Response};
pub use sync::block::{BlockKind, SynchronizationBlock};
pub use sync::block_set::SynchronizationBlockSet;
pub use sync::cycle::{EntityId, EntityKind, TickSnapshot, UpdateCycle};
