//! Structural consistency checks for a [`Fern`].
//!
//! Corruption is a programming error, not a runtime condition: nothing in the
//! arena calls [`Fern::verify`] implicitly unless `verify_on_release` is set.

use tracing::{instrument, trace};

use crate::arena::Fern;
use crate::chain::Chain;
use crate::errors::{FernError, FernResult};
use crate::id::FrondId;

fn corrupted(message: impl Into<String>) -> FernError {
    FernError::Corrupted {
        message: message.into(),
    }
}

impl<P> Fern<P> {
    /// Checks linkage, membership and accounting across the whole table and
    /// reports the first violation found.
    #[instrument(level = "trace", skip(self))]
    pub fn verify(&self) -> FernResult<()> {
        let slots = self.slots();
        let len = slots.len();

        let invalid = &slots[FrondId::INVALID.index()];
        if !invalid.parent.is_invalid() || !invalid.child.is_invalid() || invalid.payload.is_some() {
            return Err(corrupted("invalid sentinel carries tree state"));
        }
        let root = &slots[FrondId::ROOT.index()];
        if !root.parent.is_invalid() || !root.previous.is_invalid() || !root.next.is_invalid() {
            return Err(corrupted("root is linked into a chain"));
        }
        if root.payload.is_some() {
            return Err(corrupted("root carries a payload"));
        }

        // How many chains each slot was found in.
        let mut memberships = vec![0u8; len];

        let free = self.walk_chain(Chain::Pool, &mut memberships)?;
        for id in self.free_ids() {
            let frond = &slots[id.index()];
            if !frond.parent.is_invalid() || !frond.child.is_invalid() {
                return Err(corrupted(format!("free frond {id} still has tree links")));
            }
            if frond.payload.is_some() {
                return Err(corrupted(format!("free frond {id} still holds a payload")));
            }
        }

        let mut attached = 0;
        for raw in FrondId::FIRST_ALLOCATABLE..len as u32 {
            let id = FrondId::from_raw(raw);
            let frond = &slots[id.index()];
            if frond.parent.is_invalid() {
                continue;
            }
            if frond.parent.index() >= len {
                return Err(corrupted(format!("frond {id} has out-of-range parent")));
            }
            if frond.payload.is_none() {
                return Err(corrupted(format!("attached frond {id} has no payload")));
            }
            if !self.is_anchor(id) {
                return Err(corrupted(format!("frond {id} is not reachable from root")));
            }
            attached += 1;
        }

        let mut anchored = 0;
        for raw in FrondId::ROOT.raw()..len as u32 {
            let parent = FrondId::from_raw(raw);
            if parent == FrondId::ROOT || !slots[parent.index()].parent.is_invalid() {
                anchored += self.walk_chain(Chain::Children(parent), &mut memberships)?;
            } else if !slots[parent.index()].child.is_invalid() {
                return Err(corrupted(format!("free frond {parent} has children")));
            }
        }
        if anchored != attached {
            return Err(corrupted(format!(
                "{attached} attached fronds but {anchored} found in child chains"
            )));
        }

        for raw in FrondId::FIRST_ALLOCATABLE..len as u32 {
            let count = memberships[raw as usize];
            if count != 1 {
                return Err(corrupted(format!(
                    "frond #{raw} is in {count} chains instead of one"
                )));
            }
        }

        let below_root = self.subtree_size(FrondId::ROOT)?;
        if free + below_root != self.capacity() {
            return Err(corrupted(format!(
                "{free} free + {below_root} attached != capacity {}",
                self.capacity()
            )));
        }

        trace!(free, attached, "arena verified");
        Ok(())
    }

    /// Walks one chain checking back links and parentage, bumping
    /// `memberships` for every frond met. Returns the chain length.
    fn walk_chain(&self, chain: Chain, memberships: &mut [u8]) -> FernResult<usize> {
        let slots = self.slots();
        let owner = match chain {
            Chain::Pool => FrondId::INVALID,
            Chain::Children(parent) => parent,
        };

        let mut previous = FrondId::INVALID;
        let mut cursor = chain.head(slots);
        let mut length = 0;
        while !cursor.is_invalid() {
            if cursor.is_sentinel() || cursor.index() >= slots.len() {
                return Err(corrupted(format!("chain of {owner} links to {cursor}")));
            }
            let frond = &slots[cursor.index()];
            if frond.previous != previous {
                return Err(corrupted(format!(
                    "frond {cursor} points back to {} instead of {previous}",
                    frond.previous
                )));
            }
            if frond.parent != owner {
                return Err(corrupted(format!(
                    "frond {cursor} sits in the chain of {owner} but names {} as parent",
                    frond.parent
                )));
            }
            memberships[cursor.index()] = memberships[cursor.index()].saturating_add(1);
            length += 1;
            if length > slots.len() {
                return Err(corrupted(format!("chain of {owner} is cyclic")));
            }
            previous = cursor;
            cursor = frond.next;
        }
        Ok(length)
    }
}
