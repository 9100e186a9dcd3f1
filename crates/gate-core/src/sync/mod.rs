//! Per-tick entity synchronization.
//!
//! During a tick, game logic records what changed about each entity by adding
//! [`SynchronizationBlock`]s to the entity's [`SynchronizationBlockSet`].  At
//! the end of the tick, [`UpdateCycle`] snapshots every set for the update
//! packet serializer and clears the live sets for the next tick.

pub mod block;
pub mod block_set;
pub mod cycle;

pub use block::{BlockKind, Position, SynchronizationBlock};
pub use block_set::SynchronizationBlockSet;
pub use cycle::{EntityId, EntityKind, EntityUpdate, TickSnapshot, UpdateCycle};
