//! The per-entity block set.
//!
//! # Why an array and not a map?
//!
//! There are exactly [`BlockKind::COUNT`] kinds and each has a dense index, so
//! the set is a fixed array of optional slots.  Every operation is a single
//! index and there is no hashing or allocation on the hot path: game logic
//! calls `add` for every entity many times per tick.
//!
//! # Snapshots
//!
//! Blocks are immutable and stored behind `Arc`, so [`snapshot`] copies only
//! the slot array and bumps reference counts.  The snapshot and the live set
//! can then be mutated independently.
//!
//! [`snapshot`]: SynchronizationBlockSet::snapshot

use std::sync::Arc;

use crate::sync::block::{BlockKind, SynchronizationBlock};

/// At most one [`SynchronizationBlock`] per [`BlockKind`].
///
/// # Examples
///
/// ```rust
/// use gate_core::{BlockKind, SynchronizationBlock, SynchronizationBlockSet};
///
/// let mut set = SynchronizationBlockSet::new();
/// set.add(SynchronizationBlock::animation(866, 0));
/// set.add(SynchronizationBlock::animation(867, 0));
///
/// assert_eq!(set.len(), 1);
/// assert_eq!(
///     set.get(BlockKind::Animation),
///     Some(&SynchronizationBlock::animation(867, 0))
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct SynchronizationBlockSet {
    slots: [Option<Arc<SynchronizationBlock>>; BlockKind::COUNT],
    len: usize,
}

impl SynchronizationBlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `block`, replacing any block of the same kind.
    pub fn add(&mut self, block: impl Into<Arc<SynchronizationBlock>>) {
        let block = block.into();
        let slot = &mut self.slots[block.kind().index()];
        if slot.is_none() {
            self.len += 1;
        }
        *slot = Some(block);
    }

    pub fn get(&self, kind: BlockKind) -> Option<&SynchronizationBlock> {
        self.slots[kind.index()].as_deref()
    }

    pub fn contains(&self, kind: BlockKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Removes and returns the block of `kind`, if one is resident.
    pub fn remove(&mut self, kind: BlockKind) -> Option<Arc<SynchronizationBlock>> {
        let removed = self.slots[kind.index()].take();
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
        self.len = 0;
    }

    /// Number of distinct kinds resident.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns an independent copy sharing the (immutable) blocks.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Resident blocks in ascending [`BlockKind`] order.
    pub fn iter(&self) -> impl Iterator<Item = &SynchronizationBlock> + '_ {
        self.slots.iter().filter_map(Option::as_deref)
    }
}

impl<'a> IntoIterator for &'a SynchronizationBlockSet {
    type Item = &'a SynchronizationBlock;
    type IntoIter = Box<dyn Iterator<Item = &'a SynchronizationBlock> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl Extend<SynchronizationBlock> for SynchronizationBlockSet {
    fn extend<I: IntoIterator<Item = SynchronizationBlock>>(&mut self, blocks: I) {
        for block in blocks {
            self.add(block);
        }
    }
}

impl FromIterator<SynchronizationBlock> for SynchronizationBlockSet {
    fn from_iter<I: IntoIterator<Item = SynchronizationBlock>>(blocks: I) -> Self {
        let mut set = Self::new();
        set.extend(blocks);
        set
    }
}
