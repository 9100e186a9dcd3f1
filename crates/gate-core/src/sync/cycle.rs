//! End-of-tick synchronization.
//!
//! Game logic fills each entity's [`SynchronizationBlockSet`] while a tick is
//! processed.  When the tick ends the owner calls
//! [`UpdateCycle::complete_tick`], which:
//!
//! 1. takes a snapshot of every non-empty set for the update serializer,
//! 2. clears every live set so the next tick starts from nothing.
//!
//! Both steps happen under the same `&mut` borrow of each set, so no change
//! recorded during the tick can slip in between the snapshot and the clear.

use tracing::{debug, trace};

use crate::sync::block_set::SynchronizationBlockSet;

/// Whether an entity is a player or an NPC; they are indexed separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Player,
    Npc,
}

/// Identifies a live entity by kind and world index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub kind: EntityKind,
    pub index: u16,
}

impl EntityId {
    pub const fn player(index: u16) -> Self {
        Self {
            kind: EntityKind::Player,
            index,
        }
    }

    pub const fn npc(index: u16) -> Self {
        Self {
            kind: EntityKind::Npc,
            index,
        }
    }
}

/// One entity's blocks for a completed tick.
#[derive(Debug, Clone)]
pub struct EntityUpdate {
    pub id: EntityId,
    pub blocks: SynchronizationBlockSet,
}

/// Everything the serializer needs for one tick.
#[derive(Debug, Clone, Default)]
pub struct TickSnapshot {
    pub tick: u64,
    /// Entities with at least one block, in the order they were supplied.
    pub updates: Vec<EntityUpdate>,
}

impl TickSnapshot {
    pub fn get(&self, id: EntityId) -> Option<&SynchronizationBlockSet> {
        self.updates
            .iter()
            .find(|update| update.id == id)
            .map(|update| &update.blocks)
    }
}

/// Counts ticks and performs the end-of-tick snapshot/clear.
#[derive(Debug, Default)]
pub struct UpdateCycle {
    tick: u64,
}

impl UpdateCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ticks completed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Snapshots the non-empty sets, clears all of them, and advances the
    /// tick counter.
    pub fn complete_tick<'a, I>(&mut self, entities: I) -> TickSnapshot
    where
        I: IntoIterator<Item = (EntityId, &'a mut SynchronizationBlockSet)>,
    {
        let mut updates = Vec::new();
        let mut visited = 0usize;

        for (id, set) in entities {
            visited += 1;
            if set.is_empty() {
                continue;
            }
            trace!(?id, blocks = set.len(), "snapshotting block set");
            updates.push(EntityUpdate {
                id,
                blocks: set.snapshot(),
            });
            set.clear();
        }

        let tick = self.tick;
        self.tick += 1;
        debug!(tick, visited, updated = updates.len(), "tick synchronized");

        TickSnapshot { tick, updates }
    }
}
