//! Intrusive doubly-linked chains threaded through the slot table.
//!
//! The free pool and every child list share the same `previous`/`next`
//! links, so a frond is a member of exactly one chain at a time. The only
//! difference between the two kinds is where the head is stored.

use crate::arena::Frond;
use crate::id::FrondId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Chain {
    /// Free pool; head lives in the `next` link of the Invalid slot.
    Pool,
    /// Child list of the given frond; head lives in its `child` link.
    Children(FrondId),
}

impl Chain {
    pub(crate) fn head<P>(self, slots: &[Frond<P>]) -> FrondId {
        match self {
            Chain::Pool => slots[FrondId::INVALID.index()].next,
            Chain::Children(parent) => slots[parent.index()].child,
        }
    }

    fn set_head<P>(self, slots: &mut [Frond<P>], head: FrondId) {
        match self {
            Chain::Pool => slots[FrondId::INVALID.index()].next = head,
            Chain::Children(parent) => slots[parent.index()].child = head,
        }
    }

    /// Links `id` in front of the current head. `id` must not be in any chain.
    pub(crate) fn push_front<P>(self, slots: &mut [Frond<P>], id: FrondId) {
        let head = self.head(slots);
        let frond = &mut slots[id.index()];
        frond.previous = FrondId::INVALID;
        frond.next = head;
        if !head.is_invalid() {
            slots[head.index()].previous = id;
        }
        self.set_head(slots, id);
    }

    /// Removes `id` from this chain and clears its links.
    pub(crate) fn unlink<P>(self, slots: &mut [Frond<P>], id: FrondId) {
        let (previous, next) = {
            let frond = &slots[id.index()];
            (frond.previous, frond.next)
        };
        if previous.is_invalid() {
            self.set_head(slots, next);
        } else {
            slots[previous.index()].next = next;
        }
        if !next.is_invalid() {
            slots[next.index()].previous = previous;
        }
        let frond = &mut slots[id.index()];
        frond.previous = FrondId::INVALID;
        frond.next = FrondId::INVALID;
    }

    pub(crate) fn pop_front<P>(self, slots: &mut [Frond<P>]) -> Option<FrondId> {
        let head = self.head(slots);
        if head.is_invalid() {
            return None;
        }
        self.unlink(slots, head);
        Some(head)
    }

    pub(crate) fn iter<P>(self, slots: &[Frond<P>]) -> Siblings<'_, P> {
        Siblings::new(slots, self.head(slots))
    }
}

/// Forward walk along `next` links, starting at (and including) a frond.
///
/// The walk stops after visiting as many fronds as the table holds, so a
/// corrupted (cyclic) chain cannot hang a caller.
pub struct Siblings<'a, P> {
    slots: &'a [Frond<P>],
    cursor: FrondId,
    remaining: usize,
}

impl<'a, P> Siblings<'a, P> {
    pub(crate) fn new(slots: &'a [Frond<P>], start: FrondId) -> Self {
        Self {
            slots,
            cursor: start,
            remaining: slots.len(),
        }
    }
}

impl<'a, P> Iterator for Siblings<'a, P> {
    type Item = FrondId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_invalid() || self.remaining == 0 {
            return None;
        }
        let current = self.cursor;
        self.cursor = self
            .slots
            .get(current.index())
            .map_or(FrondId::INVALID, |frond| frond.next);
        self.remaining -= 1;
        Some(current)
    }
}
