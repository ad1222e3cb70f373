//! Strongly-typed slot handles.

use std::fmt;

/// Index of a frond (slot) inside one [`Fern`](crate::arena::Fern).
///
/// Ids are opaque outside the arena that produced them. The two sentinels
/// occupy the first two slots of every arena and are never handed out by
/// allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FrondId(u32);

impl FrondId {
    /// "No node". Slot 0 also carries the head of the free-list.
    pub const INVALID: FrondId = FrondId(0);
    /// Implicit top of every tree in the arena.
    pub const ROOT: FrondId = FrondId(1);

    /// First slot that allocation can hand out.
    pub(crate) const FIRST_ALLOCATABLE: u32 = 2;

    pub const fn from_raw(raw: u32) -> Self {
        FrondId(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Position in the slot table.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_invalid(self) -> bool {
        self.0 == Self::INVALID.0
    }

    pub const fn is_sentinel(self) -> bool {
        self.0 < Self::FIRST_ALLOCATABLE
    }
}

impl From<FrondId> for u32 {
    fn from(id: FrondId) -> Self {
        id.0
    }
}

impl fmt::Display for FrondId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::INVALID => write!(f, "invalid"),
            Self::ROOT => write!(f, "root"),
            FrondId(raw) => write!(f, "#{}", raw),
        }
    }
}
