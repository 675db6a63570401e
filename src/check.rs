//! Structural self-check.

use std::collections::HashSet;
use std::ops::Index;

use crate::error::{Error, Result};
use crate::node::{RecordId, Slot, SLOT_MASK, SLOT_ODDMAN, SLOT_ROOT};
use crate::ops::{Match, TreeOps};
use crate::tree::{Parent, PatriciaTree};

/// A branch on the way down, and the slot the walk took out of it.
#[derive(Clone, Copy)]
struct Ancestor {
    owner: RecordId,
    bitoff: u32,
    bitlen: u32,
    slot: usize,
}

#[derive(Default)]
struct Walk {
    leaves: HashSet<RecordId>,
    branches: HashSet<RecordId>,
    /// Records whose branch was seen above their own leaf.
    rooted: HashSet<RecordId>,
    ancestors: Vec<Ancestor>,
}

impl<O: TreeOps> PatriciaTree<O> {
    /// Verify every structural invariant of the trie.
    ///
    /// Walks the whole tree and re-tests each leaf against every branch above
    /// it, so it costs `O(n * depth)`; meant for tests and
    /// [`Config::self_check`](crate::Config::self_check).
    pub fn check<S>(&self, store: &S) -> Result<()>
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        let mut walk = Walk::default();

        match self.root.slot(SLOT_ODDMAN) {
            Slot::Empty => {}
            Slot::Leaf(id) if self.entry_bitlen(store, id) == 0 => {
                self.check_leaf(store, &mut walk, id, SLOT_ODDMAN)?;
            }
            other => return Err(Error::Oddman(other)),
        }

        self.check_child(store, &mut walk, Parent::Root, SLOT_ROOT, 0)?;

        if let Some(&owner) = walk.branches.difference(&walk.rooted).next() {
            return Err(Error::BranchNotAncestor(owner));
        }
        if walk.leaves.len() != self.count {
            return Err(Error::Count {
                expected: self.count,
                found: walk.leaves.len(),
            });
        }
        Ok(())
    }

    fn check_child<S>(
        &self,
        store: &S,
        walk: &mut Walk,
        parent: Parent,
        slot: usize,
        min_bitoff: u32,
    ) -> Result<()>
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        let owner = match self.slot(store, parent, slot) {
            Slot::Empty => {
                return match parent {
                    Parent::Root => Ok(()),
                    Parent::Branch(owner) => Err(Error::EmptyBranchSlot { owner, slot }),
                };
            }
            Slot::Leaf(id) => return self.check_leaf(store, walk, id, slot),
            Slot::Branch(owner) => owner,
        };

        let node = self.node(store, owner);
        if node.branch_position() != slot {
            return Err(Error::PositionMismatch {
                record: owner,
                stored: node.branch_position(),
                actual: slot,
            });
        }
        if !walk.branches.insert(owner) {
            return Err(Error::DuplicateLink(owner));
        }
        let (bitoff, bitlen) = (node.branch_bitoff(), node.branch_bitlen());
        if bitoff < min_bitoff {
            return Err(Error::BitOffsetOrder {
                owner,
                bitoff,
                min: min_bitoff,
            });
        }
        if bitlen == 0 && !node.slot(SLOT_MASK).is_leaf() {
            return Err(Error::MaskBranch(owner));
        }

        for child_slot in 0..2 {
            walk.ancestors.push(Ancestor {
                owner,
                bitoff,
                bitlen,
                slot: child_slot,
            });
            let min = bitoff + bitlen;
            let result = self.check_child(store, walk, Parent::Branch(owner), child_slot, min);
            walk.ancestors.pop();
            result?;
        }
        Ok(())
    }

    fn check_leaf<S>(&self, store: &S, walk: &mut Walk, id: RecordId, slot: usize) -> Result<()>
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        let node = self.node(store, id);
        if !node.is_linked() || !walk.leaves.insert(id) {
            return Err(Error::DuplicateLink(id));
        }
        if node.leaf_position() != slot {
            return Err(Error::PositionMismatch {
                record: id,
                stored: node.leaf_position(),
                actual: slot,
            });
        }

        let len = self.entry_bitlen(store, id);
        for ancestor in &walk.ancestors {
            let misrouted = Error::Misrouted {
                record: id,
                owner: ancestor.owner,
                bitoff: ancestor.bitoff,
            };

            let shared = ancestor.bitoff.min(len);
            if shared > 0 {
                let matched = self
                    .ops
                    .match_node(&store[id], &store[ancestor.owner], 0, shared);
                if matched != Match::Equal {
                    return Err(misrouted);
                }
            }

            if ancestor.bitlen == 0 {
                if ancestor.slot == SLOT_MASK {
                    if !node.is_mask() || len != ancestor.bitoff {
                        return Err(Error::MaskBranch(ancestor.owner));
                    }
                } else if len <= ancestor.bitoff {
                    return Err(misrouted);
                }
            } else if len <= ancestor.bitoff
                || (self.ops.test_node(&store[id], ancestor.bitoff, ancestor.bitlen) & 1)
                    != ancestor.slot
            {
                return Err(misrouted);
            }

            if ancestor.owner == id {
                walk.rooted.insert(id);
            }
        }
        Ok(())
    }
}
