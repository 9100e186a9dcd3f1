//! Typed synchronization blocks.
//!
//! A block describes one kind of observable change to an entity during the
//! current tick.  The set of kinds is closed: [`BlockKind`] enumerates them and
//! [`SynchronizationBlock`] carries exactly one payload per kind.  Blocks are
//! never modified after construction; to change what an entity will report,
//! add a new block of the same kind and it replaces the old one.

/// A tile coordinate in the game world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    /// Plane, 0 (ground) to 3.
    pub height: u8,
}

impl Position {
    pub const fn new(x: u16, y: u16, height: u8) -> Self {
        Self { x, y, height }
    }
}

// ── Kinds ─────────────────────────────────────────────────────────────────────

/// Discriminates the kind of a [`SynchronizationBlock`].
///
/// The declaration order is the order the update packet serializer writes
/// blocks in, and [`index`](Self::index) is dense in `0..COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockKind {
    ForceMovement,
    Graphic,
    Animation,
    ForceChat,
    Chat,
    InteractingMob,
    Appearance,
    TurnToPosition,
    HitUpdate,
    SecondaryHitUpdate,
    Transform,
    Movement,
}

impl BlockKind {
    /// Number of distinct kinds.
    pub const COUNT: usize = 12;

    /// Every kind, in index order.
    pub const ALL: [BlockKind; BlockKind::COUNT] = [
        BlockKind::ForceMovement,
        BlockKind::Graphic,
        BlockKind::Animation,
        BlockKind::ForceChat,
        BlockKind::Chat,
        BlockKind::InteractingMob,
        BlockKind::Appearance,
        BlockKind::TurnToPosition,
        BlockKind::HitUpdate,
        BlockKind::SecondaryHitUpdate,
        BlockKind::Transform,
        BlockKind::Movement,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

/// How a player looks to everyone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appearance {
    pub name: String,
    pub combat_level: u8,
    pub skill_total: u16,
    pub gender: Gender,
    /// Equipment or body-part model per slot; `0` means nothing drawn.
    pub slots: [u16; 12],
    pub colours: [u8; 5],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Movement {
    pub from: Position,
    pub to: Position,
    pub running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrivilegeLevel {
    Standard,
    Moderator,
    Administrator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub message: String,
    pub colour: u8,
    pub effects: u8,
    pub privilege: PrivilegeLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Animation {
    pub id: u16,
    pub delay: u8,
}

/// A spot graphic drawn on the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Graphic {
    pub id: u16,
    pub height: u16,
    pub delay: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

/// Scripted movement (knockback, agility shortcuts).
///
/// Speeds are in client ticks from the start of the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceMovement {
    pub start: Position,
    pub end: Position,
    pub travel_start: u16,
    pub travel_end: u16,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitType {
    Block,
    Normal,
    Poison,
    Disease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub damage: u8,
    pub hit_type: HitType,
    pub current_health: u8,
    pub maximum_health: u8,
}

// ── Blocks ────────────────────────────────────────────────────────────────────

/// One typed update for an entity in the current tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynchronizationBlock {
    Appearance(Appearance),
    Movement(Movement),
    Chat(Chat),
    ForceChat(String),
    Animation(Animation),
    Graphic(Graphic),
    ForceMovement(ForceMovement),
    HitUpdate(Hit),
    SecondaryHitUpdate(Hit),
    /// Index of the mob now being interacted with; `None` resets it.
    InteractingMob(Option<u16>),
    TurnToPosition(Position),
    /// NPC definition the mob now appears as.
    Transform(u16),
}

impl SynchronizationBlock {
    /// Returns the slot this block occupies.
    pub fn kind(&self) -> BlockKind {
        match self {
            SynchronizationBlock::Appearance(_) => BlockKind::Appearance,
            SynchronizationBlock::Movement(_) => BlockKind::Movement,
            SynchronizationBlock::Chat(_) => BlockKind::Chat,
            SynchronizationBlock::ForceChat(_) => BlockKind::ForceChat,
            SynchronizationBlock::Animation(_) => BlockKind::Animation,
            SynchronizationBlock::Graphic(_) => BlockKind::Graphic,
            SynchronizationBlock::ForceMovement(_) => BlockKind::ForceMovement,
            SynchronizationBlock::HitUpdate(_) => BlockKind::HitUpdate,
            SynchronizationBlock::SecondaryHitUpdate(_) => BlockKind::SecondaryHitUpdate,
            SynchronizationBlock::InteractingMob(_) => BlockKind::InteractingMob,
            SynchronizationBlock::TurnToPosition(_) => BlockKind::TurnToPosition,
            SynchronizationBlock::Transform(_) => BlockKind::Transform,
        }
    }

    pub fn animation(id: u16, delay: u8) -> Self {
        Self::Animation(Animation { id, delay })
    }

    pub fn graphic(id: u16, height: u16, delay: u16) -> Self {
        Self::Graphic(Graphic { id, height, delay })
    }

    pub fn force_chat(message: impl Into<String>) -> Self {
        Self::ForceChat(message.into())
    }

    pub fn walk(from: Position, to: Position) -> Self {
        Self::Movement(Movement {
            from,
            to,
            running: false,
        })
    }

    pub fn interacting(index: u16) -> Self {
        Self::InteractingMob(Some(index))
    }

    pub fn reset_interacting() -> Self {
        Self::InteractingMob(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_lists_each_kind_once_in_index_order() {
        for (i, kind) in BlockKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i, "{kind:?}");
        }
    }

    #[test]
    fn test_block_reports_its_kind() {
        let hit = Hit {
            damage: 3,
            hit_type: HitType::Normal,
            current_health: 7,
            maximum_health: 10,
        };
        let cases = [
            (SynchronizationBlock::animation(866, 0), BlockKind::Animation),
            (SynchronizationBlock::graphic(100, 92, 0), BlockKind::Graphic),
            (SynchronizationBlock::force_chat("Ow!"), BlockKind::ForceChat),
            (SynchronizationBlock::HitUpdate(hit), BlockKind::HitUpdate),
            (SynchronizationBlock::SecondaryHitUpdate(hit), BlockKind::SecondaryHitUpdate),
            (SynchronizationBlock::reset_interacting(), BlockKind::InteractingMob),
            (SynchronizationBlock::Transform(1), BlockKind::Transform),
            (
                SynchronizationBlock::TurnToPosition(Position::new(3222, 3218, 0)),
                BlockKind::TurnToPosition,
            ),
        ];

        for (block, kind) in cases {
            assert_eq!(block.kind(), kind);
        }
    }

    #[test]
    fn test_hit_updates_occupy_different_slots() {
        assert_ne!(BlockKind::HitUpdate, BlockKind::SecondaryHitUpdate);
    }
}
