use tracing::{debug, instrument, trace};

use crate::chain::{Chain, Siblings};
use crate::config::Settings;
use crate::errors::{FernError, FernResult};
use crate::id::FrondId;

/// One slot of the table.
///
/// `previous`/`next` link the frond into whichever chain currently holds it:
/// the free pool or its parent's child list.
#[derive(Debug)]
pub(crate) struct Frond<P> {
    /// Owning frond while attached, Invalid while in the free pool
    pub(crate) parent: FrondId,
    /// Head of the child chain (most recently attached child)
    pub(crate) child: FrondId,
    /// Preceding frond in the current chain, Invalid at the head
    pub(crate) previous: FrondId,
    /// Following frond in the current chain, Invalid at the tail
    pub(crate) next: FrondId,
    /// Caller data, present exactly while attached
    pub(crate) payload: Option<P>,
}

impl<P> Frond<P> {
    pub(crate) const fn vacant() -> Self {
        Self {
            parent: FrondId::INVALID,
            child: FrondId::INVALID,
            previous: FrondId::INVALID,
            next: FrondId::INVALID,
            payload: None,
        }
    }
}

/// Fixed-capacity forest of fronds addressed by [`FrondId`].
///
/// Slot 0 is the Invalid sentinel and holds the free-list head, slot 1 is the
/// Root of the forest. The table is sized once in [`Fern::new`]; allocation
/// and release only relink existing slots.
#[derive(Debug)]
pub struct Fern<P> {
    /// `capacity + 2` slots: both sentinels, then the allocatable fronds
    slots: Vec<Frond<P>>,
    /// Number of allocatable fronds requested at construction
    capacity: usize,
    /// Run [`Fern::verify`] around every release
    verify_on_release: bool,
}

impl<P> Fern<P> {
    /// Largest capacity whose ids still fit in a `u32`.
    pub const MAX_CAPACITY: usize = (u32::MAX - FrondId::FIRST_ALLOCATABLE) as usize;

    /// Creates an arena with `capacity` allocatable fronds, all in the free
    /// pool in ascending id order.
    ///
    /// The table is reserved up front; if the allocator cannot provide it the
    /// error is `CapacityUnavailable`.
    #[instrument(level = "debug")]
    pub fn new(capacity: usize) -> FernResult<Self> {
        if capacity > Self::MAX_CAPACITY {
            return Err(FernError::CapacityTooLarge {
                requested: capacity,
                max: Self::MAX_CAPACITY,
            });
        }
        let len = capacity + FrondId::FIRST_ALLOCATABLE as usize;
        let mut slots = Vec::new();
        if let Err(e) = slots.try_reserve_exact(len) {
            debug!(capacity, error = %e, "cannot reserve slot table");
            return Err(FernError::CapacityUnavailable {
                requested: capacity,
            });
        }
        slots.resize_with(len, Frond::vacant);

        // Threading starts at the Invalid slot, so its `next` becomes the pool head.
        let mut previous = FrondId::INVALID;
        for raw in FrondId::FIRST_ALLOCATABLE..len as u32 {
            let id = FrondId::from_raw(raw);
            slots[id.index()].previous = previous;
            slots[previous.index()].next = id;
            previous = id;
        }

        Ok(Self {
            slots,
            capacity,
            verify_on_release: false,
        })
    }

    #[instrument(level = "debug")]
    pub fn from_settings(settings: &Settings) -> FernResult<Self> {
        let mut fern = Self::new(settings.capacity)?;
        fern.verify_on_release = settings.verify_on_release;
        Ok(fern)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn slots(&self) -> &[Frond<P>] {
        &self.slots
    }

    #[cfg(test)]
    pub(crate) fn slots_mut(&mut self) -> &mut [Frond<P>] {
        &mut self.slots
    }

    /// Attaches a frond from the free pool as the newest child of `parent`.
    ///
    /// `parent` must be Root or attached. Fails without touching the arena
    /// when the parent is unusable or the pool is empty.
    #[instrument(level = "trace", skip(self, payload))]
    pub fn allocate(&mut self, parent: FrondId, payload: P) -> FernResult<FrondId> {
        if !self.is_anchor(parent) {
            debug!(%parent, "rejecting allocation under unattached parent");
            return Err(FernError::InvalidParent(parent));
        }
        let Some(id) = Chain::Pool.pop_front(&mut self.slots) else {
            debug!(%parent, capacity = self.capacity, "pool exhausted");
            return Err(FernError::PoolExhausted {
                capacity: self.capacity,
            });
        };

        let frond = &mut self.slots[id.index()];
        frond.payload = Some(payload);
        frond.parent = parent;
        Chain::Children(parent).push_front(&mut self.slots, id);

        trace!(%id, %parent, "attached frond");
        Ok(id)
    }

    pub fn payload_of(&self, id: FrondId) -> FernResult<&P> {
        self.live(id)?;
        self.slots[id.index()]
            .payload
            .as_ref()
            .ok_or(FernError::Detached(id))
    }

    pub fn payload_of_mut(&mut self, id: FrondId) -> FernResult<&mut P> {
        self.live(id)?;
        self.slots[id.index()]
            .payload
            .as_mut()
            .ok_or(FernError::Detached(id))
    }

    /// Stored parent of `id`; Invalid for free, sentinel or out-of-range ids.
    pub fn parent_of(&self, id: FrondId) -> FrondId {
        self.slots
            .get(id.index())
            .map_or(FrondId::INVALID, |frond| frond.parent)
    }

    /// Number of fronds currently in the free pool.
    ///
    /// This is the length of the free-list, not the capacity a release of
    /// some subtree would recover; see [`Fern::subtree_size`] for that.
    #[instrument(level = "trace", skip(self))]
    pub fn free_count(&self) -> usize {
        Chain::Pool.iter(&self.slots).count()
    }

    pub fn attached_count(&self) -> usize {
        self.capacity - self.free_count()
    }

    pub fn is_attached(&self, id: FrondId) -> bool {
        self.live(id).is_ok()
    }

    /// Whether `other` shares a chain with `id`, scanning forward then
    /// backward from `id`. A frond is not its own sibling.
    ///
    /// Only the chain `id` belongs to is scanned; callers comparing fronds
    /// of different parents simply get `false`.
    #[instrument(level = "trace", skip(self))]
    pub fn are_siblings(&self, id: FrondId, other: FrondId) -> FernResult<bool> {
        self.check(id)?;
        self.check(other)?;

        let start = &self.slots[id.index()];
        if Siblings::new(&self.slots, start.next).any(|sibling| sibling == other) {
            return Ok(true);
        }

        let mut cursor = start.previous;
        for _ in 0..self.slots.len() {
            if cursor.is_invalid() {
                break;
            }
            if cursor == other {
                return Ok(true);
            }
            cursor = self.slots[cursor.index()].previous;
        }
        Ok(false)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn is_child(&self, parent: FrondId, id: FrondId) -> FernResult<bool> {
        self.check(parent)?;
        self.check(id)?;
        Ok(Chain::Children(parent)
            .iter(&self.slots)
            .any(|child| child == id))
    }

    /// Whether walking up from `id` reaches `ancestor` before Invalid.
    #[instrument(level = "trace", skip(self))]
    pub fn is_descendant(&self, ancestor: FrondId, id: FrondId) -> FernResult<bool> {
        self.check(ancestor)?;
        self.check(id)?;
        Ok(self.reaches(ancestor, id))
    }

    /// Returns `id` and every frond below it to the free pool.
    ///
    /// See [`Fern::release_with`].
    pub fn release(&mut self, id: FrondId) -> FernResult<usize> {
        self.release_with(id, |_, _| {})
    }

    /// Returns `id` and its subtree to the free pool, leaves first, handing
    /// each payload to `reclaim`. Yields the number of released fronds.
    ///
    /// The walk follows parent links back up, so no scratch memory is used.
    /// Released fronds go to the head of the pool and are reused first.
    ///
    /// With `verify_on_release` the arena is verified before anything is
    /// touched, and a corrupted arena is left as is. The second check after
    /// the walk can only fail if the release itself broke a link; the
    /// subtree has been returned to the pool by then.
    #[instrument(level = "trace", skip(self, reclaim))]
    pub fn release_with<F>(&mut self, id: FrondId, mut reclaim: F) -> FernResult<usize>
    where
        F: FnMut(FrondId, P),
    {
        if let Err(e) = self.live(id) {
            debug!(%id, error = %e, "rejecting release");
            return Err(e);
        }
        if self.verify_on_release {
            self.verify()?;
        }

        let mut released = 0;
        let mut current = id;
        loop {
            loop {
                let child = self.slots[current.index()].child;
                if child.is_invalid() {
                    break;
                }
                current = child;
            }

            let parent = self.slots[current.index()].parent;
            Chain::Children(parent).unlink(&mut self.slots, current);
            let frond = &mut self.slots[current.index()];
            frond.parent = FrondId::INVALID;
            let payload = frond.payload.take();
            Chain::Pool.push_front(&mut self.slots, current);
            if let Some(payload) = payload {
                reclaim(current, payload);
            }
            released += 1;

            if current == id {
                break;
            }
            current = parent;
        }

        debug!(%id, released, "released subtree");
        if self.verify_on_release {
            self.verify()?;
        }
        Ok(released)
    }

    /// Direct children of `parent`, newest first.
    pub fn children(&self, parent: FrondId) -> FernResult<Siblings<'_, P>> {
        self.anchor(parent)?;
        Ok(Chain::Children(parent).iter(&self.slots))
    }

    /// Parent, grandparent, ... up to and including Root.
    pub fn ancestors(&self, id: FrondId) -> FernResult<Ancestors<'_, P>> {
        self.check(id)?;
        Ok(Ancestors {
            slots: &self.slots,
            cursor: self.slots[id.index()].parent,
            remaining: self.slots.len(),
        })
    }

    /// Every frond below `top`, depth first.
    pub fn descendants(&self, top: FrondId) -> FernResult<Descendants<'_, P>> {
        self.anchor(top)?;
        Ok(Descendants {
            slots: &self.slots,
            top,
            cursor: self.slots[top.index()].child,
        })
    }

    /// Number of fronds below `top`: what releasing it would return to the
    /// pool, minus `top` itself.
    pub fn subtree_size(&self, top: FrondId) -> FernResult<usize> {
        Ok(self.descendants(top)?.count())
    }

    /// Parent hops from `id` to Root. Root has depth 0.
    pub fn depth(&self, id: FrondId) -> FernResult<usize> {
        self.anchor(id)?;
        Ok(self.ancestors(id)?.count())
    }

    /// Fronds in the free pool, in the order allocation will take them.
    pub fn free_ids(&self) -> Siblings<'_, P> {
        Chain::Pool.iter(&self.slots)
    }

    fn reaches(&self, ancestor: FrondId, id: FrondId) -> bool {
        let mut cursor = self.slots[id.index()].parent;
        for _ in 0..self.slots.len() {
            if cursor.is_invalid() {
                return false;
            }
            if cursor == ancestor {
                return true;
            }
            cursor = match self.slots.get(cursor.index()) {
                Some(frond) => frond.parent,
                None => return false,
            };
        }
        false
    }

    pub(crate) fn is_anchor(&self, id: FrondId) -> bool {
        id == FrondId::ROOT
            || (!id.is_sentinel()
                && id.index() < self.slots.len()
                && self.reaches(FrondId::ROOT, id))
    }

    /// In range and not the Invalid sentinel.
    fn check(&self, id: FrondId) -> FernResult<()> {
        if id.index() >= self.slots.len() {
            return Err(FernError::OutOfRange {
                id,
                len: self.slots.len(),
            });
        }
        if id.is_invalid() {
            return Err(FernError::Sentinel(id));
        }
        Ok(())
    }

    /// An allocated frond currently attached below Root.
    fn live(&self, id: FrondId) -> FernResult<()> {
        self.check(id)?;
        if id.is_sentinel() {
            return Err(FernError::Sentinel(id));
        }
        if self.slots[id.index()].parent.is_invalid() {
            return Err(FernError::Detached(id));
        }
        Ok(())
    }

    /// Root or a live frond.
    fn anchor(&self, id: FrondId) -> FernResult<()> {
        if id == FrondId::ROOT {
            return Ok(());
        }
        self.live(id)
    }
}

pub struct Ancestors<'a, P> {
    slots: &'a [Frond<P>],
    cursor: FrondId,
    remaining: usize,
}

impl<'a, P> Iterator for Ancestors<'a, P> {
    type Item = FrondId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_invalid() || self.remaining == 0 {
            return None;
        }
        let current = self.cursor;
        self.cursor = self
            .slots
            .get(current.index())
            .map_or(FrondId::INVALID, |frond| frond.parent);
        self.remaining -= 1;
        Some(current)
    }
}

/// Pre-order walk below a frond using only the stored links.
pub struct Descendants<'a, P> {
    slots: &'a [Frond<P>],
    top: FrondId,
    cursor: FrondId,
}

impl<'a, P> Iterator for Descendants<'a, P> {
    type Item = FrondId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_invalid() {
            return None;
        }
        let current = self.cursor;
        let frond = &self.slots[current.index()];
        if !frond.child.is_invalid() {
            self.cursor = frond.child;
            return Some(current);
        }

        // Climb until a frond with a next sibling turns up, stopping at `top`.
        self.cursor = FrondId::INVALID;
        let mut climber = current;
        while climber != self.top && !climber.is_invalid() {
            let frond = &self.slots[climber.index()];
            if !frond.next.is_invalid() {
                self.cursor = frond.next;
                break;
            }
            climber = frond.parent;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::testing;
    use rstest::{fixture, rstest};

    #[fixture]
    fn fern() -> Fern<&'static str> {
        testing::init_test_setup();
        Fern::new(8).unwrap()
    }

    #[rstest]
    fn given_new_arena_then_pool_is_threaded_in_ascending_order(fern: Fern<&'static str>) {
        let ids: Vec<u32> = fern.free_ids().map(FrondId::raw).collect();
        assert_eq!(ids, (2..10).collect::<Vec<_>>());
        assert_eq!(fern.slots()[2].previous, FrondId::INVALID);
        assert_eq!(fern.slots()[9].next, FrondId::INVALID);
        assert_eq!(fern.parent_of(FrondId::ROOT), FrondId::INVALID);
    }

    #[rstest]
    fn given_allocation_then_lowest_free_id_is_used(mut fern: Fern<&'static str>) {
        let a = fern.allocate(FrondId::ROOT, "a").unwrap();
        let b = fern.allocate(FrondId::ROOT, "b").unwrap();
        assert_eq!(a, FrondId::from_raw(2));
        assert_eq!(b, FrondId::from_raw(3));
        assert_eq!(fern.slots()[4].previous, FrondId::INVALID);
    }

    #[rstest]
    fn given_children_when_listing_then_newest_comes_first(mut fern: Fern<&'static str>) {
        let a = fern.allocate(FrondId::ROOT, "a").unwrap();
        let b = fern.allocate(FrondId::ROOT, "b").unwrap();
        let c = fern.allocate(FrondId::ROOT, "c").unwrap();

        let children: Vec<_> = fern.children(FrondId::ROOT).unwrap().collect();
        assert_eq!(children, vec![c, b, a]);
        assert_eq!(fern.slots()[a.index()].previous, b);
    }

    #[rstest]
    fn given_nested_tree_when_walking_descendants_then_visits_preorder(
        mut fern: Fern<&'static str>,
    ) {
        let a = fern.allocate(FrondId::ROOT, "a").unwrap();
        let a1 = fern.allocate(a, "a1").unwrap();
        let a2 = fern.allocate(a, "a2").unwrap();
        let a21 = fern.allocate(a2, "a21").unwrap();
        let b = fern.allocate(FrondId::ROOT, "b").unwrap();

        let all: Vec<_> = fern.descendants(FrondId::ROOT).unwrap().collect();
        assert_eq!(all, vec![b, a, a2, a21, a1]);
        let below_a: Vec<_> = fern.descendants(a).unwrap().collect();
        assert_eq!(below_a, vec![a2, a21, a1]);
        assert_eq!(fern.subtree_size(a2).unwrap(), 1);
        assert_eq!(fern.subtree_size(b).unwrap(), 0);
    }

    #[rstest]
    fn given_grandchild_then_ancestors_end_at_root(mut fern: Fern<&'static str>) {
        let a = fern.allocate(FrondId::ROOT, "a").unwrap();
        let g = fern.allocate(a, "g").unwrap();

        let up: Vec<_> = fern.ancestors(g).unwrap().collect();
        assert_eq!(up, vec![a, FrondId::ROOT]);
        assert_eq!(fern.depth(g).unwrap(), 2);
        assert_eq!(fern.depth(FrondId::ROOT).unwrap(), 0);
    }

    #[rstest]
    fn given_released_leaf_then_links_are_cleared(mut fern: Fern<&'static str>) {
        let a = fern.allocate(FrondId::ROOT, "a").unwrap();
        let b = fern.allocate(FrondId::ROOT, "b").unwrap();
        fern.release(b).unwrap();

        let frond = &fern.slots()[b.index()];
        assert_eq!(frond.parent, FrondId::INVALID);
        assert_eq!(frond.child, FrondId::INVALID);
        assert!(frond.payload.is_none());
        assert_eq!(fern.children(FrondId::ROOT).unwrap().collect::<Vec<_>>(), vec![a]);
        assert_eq!(fern.free_ids().next(), Some(b));
    }

    #[test]
    fn given_verify_on_release_and_corrupted_arena_when_releasing_then_nothing_moves() {
        let settings = Settings {
            capacity: 4,
            verify_on_release: true,
        };
        let mut fern = Fern::from_settings(&settings).unwrap();
        let a = fern.allocate(FrondId::ROOT, "a").unwrap();
        let b = fern.allocate(FrondId::ROOT, "b").unwrap();
        fern.slots_mut()[a.index()].previous = FrondId::INVALID;

        assert!(matches!(fern.release(b), Err(FernError::Corrupted { .. })));
        assert_eq!(fern.free_count(), 2);
        assert!(fern.is_attached(b));
        assert_eq!(*fern.payload_of(b).unwrap(), "b");
    }

    #[rstest]
    fn given_payload_when_mutated_then_new_value_is_returned(mut fern: Fern<&'static str>) {
        let a = fern.allocate(FrondId::ROOT, "a").unwrap();
        *fern.payload_of_mut(a).unwrap() = "z";
        assert_eq!(*fern.payload_of(a).unwrap(), "z");
    }
}
