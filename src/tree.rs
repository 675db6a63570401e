use std::ops::{Index, IndexMut};

use smallvec::SmallVec;
use tracing::{debug, error, trace, warn};

use crate::bits::BITLEN_ALL;
use crate::config::Config;
use crate::error::Result;
use crate::node::{PtNode, RecordId, Slot, SLOT_LEFT, SLOT_MASK, SLOT_ODDMAN, SLOT_RIGHT, SLOT_ROOT};
use crate::ops::{FilterFlags, Match, TreeOps};

/// Order of [`PatriciaTree::iterate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Bit-string order, a prefix before its extensions.
    Ascending,
    /// The reverse of [`Direction::Ascending`].
    Descending,
}

/// Holder of a slot: the root sentinel or the branch role of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Parent {
    Root,
    Branch(RecordId),
}

/// One step of a descent: slot `slot` of `parent`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Step {
    pub(crate) parent: Parent,
    pub(crate) slot: usize,
}

type Path = SmallVec<[Step; 32]>;

/// A PATRICIA trie over records held in caller storage.
///
/// Records are addressed by [`RecordId`] in any `Index<usize>` store (`Vec`,
/// slice, slab). Every record embeds a [`PtNode`] reached through
/// [`TreeOps::node`]; the tree links and unlinks those nodes and never
/// allocates, frees or moves records. Keeping the store and the tree in step
/// is up to the caller: do not drop, move or rewrite the key of a linked
/// record.
///
/// Entries are either exact keys or masks (prefixes) of a given bit length.
/// Lookups return the exact entry for a key or, failing that, the longest
/// mask covering it.
#[derive(Debug)]
pub struct PatriciaTree<O: TreeOps> {
    /// Sentinel: [`SLOT_ROOT`] holds the root, [`SLOT_ODDMAN`] the
    /// zero-length mask.
    pub(crate) root: PtNode,
    pub(crate) ops: O,
    pub(crate) config: Config,
    pub(crate) count: usize,
}

impl<O: TreeOps> PatriciaTree<O> {
    pub fn new(ops: O) -> Self {
        Self {
            root: PtNode::new(),
            ops,
            config: Config::default(),
            count: 0,
        }
    }

    pub fn with_config(ops: O, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(ops)
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// The real root of the trie.
    pub fn root(&self) -> Slot {
        self.root.slot(SLOT_ROOT)
    }

    /// The zero-length mask entry, if any.
    pub fn oddman(&self) -> Option<RecordId> {
        match self.root.slot(SLOT_ODDMAN) {
            Slot::Leaf(id) => Some(id),
            _ => None,
        }
    }
}

// =============================================================================
// Slot plumbing
// =============================================================================

impl<O: TreeOps> PatriciaTree<O> {
    #[inline]
    pub(crate) fn node<'s, S>(&self, store: &'s S, id: RecordId) -> &'s PtNode
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
        O::Record: 's,
    {
        self.ops.node(&store[id])
    }

    #[inline]
    fn node_mut<'s, S>(&self, store: &'s mut S, id: RecordId) -> &'s mut PtNode
    where
        S: IndexMut<RecordId, Output = O::Record> + ?Sized,
        O::Record: 's,
    {
        self.ops.node_mut(&mut store[id])
    }

    #[inline]
    pub(crate) fn slot<S>(&self, store: &S, parent: Parent, slot: usize) -> Slot
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        match parent {
            Parent::Root => self.root.slot(slot),
            Parent::Branch(owner) => self.node(store, owner).slot(slot),
        }
    }

    /// Store `child` in `slot` of `parent` and record the position in the
    /// child.
    fn link<S>(&mut self, store: &mut S, parent: Parent, slot: usize, child: Slot)
    where
        S: IndexMut<RecordId, Output = O::Record> + ?Sized,
    {
        match parent {
            Parent::Root => self.root.set_slot(slot, child),
            Parent::Branch(owner) => self.node_mut(store, owner).set_slot(slot, child),
        }
        match child {
            Slot::Leaf(id) => self.node_mut(store, id).set_leaf_position(slot),
            Slot::Branch(id) => self.node_mut(store, id).set_branch_position(slot),
            Slot::Empty => {}
        }
    }

    /// Bits of the key that make up the entry: the prefix length of a mask,
    /// [`BITLEN_ALL`] for an exact key.
    #[inline]
    pub(crate) fn entry_bitlen<S>(&self, store: &S, id: RecordId) -> u32
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        let node = self.node(store, id);
        if node.is_mask() {
            node.mask_bitlen()
        } else {
            BITLEN_ALL
        }
    }

    /// Slots of `parent` in visiting order. A prefix sorts before its
    /// extensions, so the root and mask branches visit their mask first.
    fn visit_order<S>(&self, store: &S, parent: Parent, direction: Direction) -> [usize; 2]
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        let ascending = match parent {
            Parent::Root => [SLOT_ODDMAN, SLOT_ROOT],
            Parent::Branch(owner) if self.node(store, owner).is_mask_branch() => {
                [SLOT_MASK, SLOT_LEFT]
            }
            Parent::Branch(_) => [SLOT_LEFT, SLOT_RIGHT],
        };
        match direction {
            Direction::Ascending => ascending,
            Direction::Descending => [ascending[1], ascending[0]],
        }
    }

    fn self_check<S>(&self, store: &S)
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        if !self.config.self_check {
            return;
        }
        let result = self.check(store);
        if let Err(err) = &result {
            error!(error = %err, "tree failed self-check");
        }
        debug_assert!(result.is_ok(), "tree failed self-check: {result:?}");
    }
}

// =============================================================================
// Insertion
// =============================================================================

impl<O: TreeOps> PatriciaTree<O> {
    /// Link record `id` as an exact-key entry.
    ///
    /// Returns `false`, leaving the tree unchanged, when an entry with the
    /// same key exists or the record is already linked.
    pub fn insert_node<S>(&mut self, store: &mut S, id: RecordId) -> bool
    where
        S: IndexMut<RecordId, Output = O::Record> + ?Sized,
    {
        self.insert_common(store, id, None)
    }

    /// Link record `id` as a mask entry covering the first `bitlen` bits of
    /// its key. A zero-length mask goes to the oddman slot and matches every
    /// key.
    ///
    /// Fails like [`insert_node`](Self::insert_node) when a mask with the
    /// same prefix and length exists.
    pub fn insert_mask_node<S>(&mut self, store: &mut S, id: RecordId, bitlen: u32) -> bool
    where
        S: IndexMut<RecordId, Output = O::Record> + ?Sized,
    {
        if bitlen > self.config.max_key_bits {
            warn!(
                record = id,
                bitlen,
                max_key_bits = self.config.max_key_bits,
                "mask longer than the key size"
            );
            return false;
        }
        self.insert_common(store, id, Some(bitlen))
    }

    /// The prefix length of record `id` if it is a mask entry.
    pub fn mask_node_p<S>(&self, store: &S, id: RecordId) -> Option<u32>
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        let node = self.node(store, id);
        node.is_mask().then_some(node.mask_bitlen())
    }

    fn insert_common<S>(&mut self, store: &mut S, id: RecordId, mask: Option<u32>) -> bool
    where
        S: IndexMut<RecordId, Output = O::Record> + ?Sized,
    {
        if self.node(store, id).is_linked() {
            debug!(record = id, "record already linked");
            return false;
        }

        let node = self.node_mut(store, id);
        node.reset();
        if let Some(bitlen) = mask {
            node.set_mask(bitlen);
        }

        if !self.place(store, id, mask.unwrap_or(BITLEN_ALL)) {
            self.node_mut(store, id).reset();
            return false;
        }

        self.node_mut(store, id).set_linked();
        self.count += 1;
        trace!(record = id, ?mask, len = self.count, "inserted");
        self.self_check(store);
        true
    }

    /// Find where `target` belongs and link it there.
    fn place<S>(&mut self, store: &mut S, target: RecordId, target_len: u32) -> bool
    where
        S: IndexMut<RecordId, Output = O::Record> + ?Sized,
    {
        if target_len == 0 {
            if !self.root.slot(SLOT_ODDMAN).is_empty() {
                debug!(record = target, "oddman slot already taken");
                return false;
            }
            self.link(store, Parent::Root, SLOT_ODDMAN, Slot::Leaf(target));
            return true;
        }

        let mut at = Step {
            parent: Parent::Root,
            slot: SLOT_ROOT,
        };
        let mut bitoff = 0u32;
        loop {
            let child = self.slot(store, at.parent, at.slot);
            let (existing, test) = match child {
                Slot::Empty => {
                    self.link(store, at.parent, at.slot, Slot::Leaf(target));
                    return true;
                }
                Slot::Leaf(id) => (id, None),
                Slot::Branch(id) => {
                    let node = self.node(store, id);
                    (id, Some((node.branch_bitoff(), node.branch_bitlen())))
                }
            };

            // Everything under `child` shares the key of `existing` up to the
            // bit `child` tests, or up to the end of a leaf entry.
            let existing_len = match test {
                Some((branch_bitoff, _)) => branch_bitoff,
                None => self.entry_bitlen(store, existing),
            };
            let limit = existing_len.min(target_len);
            if bitoff < limit {
                let span = if limit == BITLEN_ALL {
                    BITLEN_ALL
                } else {
                    limit - bitoff
                };
                let matched = self
                    .ops
                    .match_node(&store[target], &store[existing], bitoff, span);
                if let Match::Differ { bitoff: diff, slot } = matched {
                    if diff >= self.config.max_key_bits {
                        warn!(
                            record = target,
                            bitoff = diff,
                            max_key_bits = self.config.max_key_bits,
                            "keys differ past the key size"
                        );
                        return false;
                    }
                    debug_assert!(diff >= bitoff && diff < limit);
                    self.graft(store, at, target, diff, 1, slot & 1);
                    return true;
                }
            }

            match test {
                None if existing_len == target_len => {
                    debug!(record = target, existing, "duplicate key");
                    return false;
                }
                None if target_len < existing_len => {
                    // The target is a mask covering the leaf.
                    self.graft(store, at, target, target_len, 0, SLOT_MASK);
                    return true;
                }
                None => {
                    // The leaf is a mask covering the target.
                    self.graft(store, at, target, existing_len, 0, SLOT_LEFT);
                    return true;
                }
                Some((branch_bitoff, branch_bitlen)) => {
                    if target_len < branch_bitoff
                        || (target_len == branch_bitoff && branch_bitlen != 0)
                    {
                        // The target is a mask covering the whole subtree.
                        self.graft(store, at, target, target_len, 0, SLOT_MASK);
                        return true;
                    }
                    if branch_bitlen == 0 {
                        if target_len == branch_bitoff {
                            debug!(record = target, existing, "duplicate mask");
                            return false;
                        }
                        at = Step {
                            parent: Parent::Branch(existing),
                            slot: SLOT_LEFT,
                        };
                        bitoff = branch_bitoff;
                    } else {
                        let slot = self
                            .ops
                            .test_node(&store[target], branch_bitoff, branch_bitlen);
                        at = Step {
                            parent: Parent::Branch(existing),
                            slot: slot & 1,
                        };
                        bitoff = branch_bitoff + branch_bitlen;
                    }
                }
            }
        }
    }

    /// Put the branch role of `owner` at `at`, with the leaf of `owner` in
    /// `owner_slot` and whatever `at` held in the other slot.
    fn graft<S>(
        &mut self,
        store: &mut S,
        at: Step,
        owner: RecordId,
        bitoff: u32,
        bitlen: u32,
        owner_slot: usize,
    ) where
        S: IndexMut<RecordId, Output = O::Record> + ?Sized,
    {
        let displaced = self.slot(store, at.parent, at.slot);
        self.node_mut(store, owner).set_branch(bitoff, bitlen);

        let branch = Parent::Branch(owner);
        self.link(store, branch, owner_slot, Slot::Leaf(owner));
        self.link(store, branch, owner_slot ^ 1, displaced);
        self.link(store, at.parent, at.slot, Slot::Branch(owner));
        trace!(record = owner, bitoff, bitlen, "grafted branch");
    }
}

// =============================================================================
// Lookup
// =============================================================================

impl<O: TreeOps> PatriciaTree<O> {
    /// The entry for `key`: an exact match, or else the longest mask covering
    /// `key`. `filter` sees every candidate with its [`FilterFlags`] and must
    /// accept it for it to be returned.
    pub fn find_filtered_node<S, F>(&self, store: &S, key: &O::Key, mut filter: F) -> Option<RecordId>
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
        F: FnMut(&O::Record, FilterFlags) -> bool,
    {
        let mut best = None;
        if let Some(oddman) = self.oddman() {
            if filter(&store[oddman], FilterFlags::MASK) {
                best = Some(oddman);
            }
        }

        let mut child = self.root.slot(SLOT_ROOT);
        loop {
            match child {
                Slot::Empty => return best,
                Slot::Leaf(id) => {
                    let record = &store[id];
                    let node = self.ops.node(record);
                    let (bitlen, flags) = if node.is_mask() {
                        (node.mask_bitlen(), FilterFlags::MASK)
                    } else {
                        (BITLEN_ALL, FilterFlags::empty())
                    };
                    if self.ops.match_key(record, key, 0, bitlen) && filter(record, flags) {
                        return Some(id);
                    }
                    return best;
                }
                Slot::Branch(owner) => {
                    let node = self.node(store, owner);
                    let (bitoff, bitlen) = (node.branch_bitoff(), node.branch_bitlen());
                    if bitlen == 0 {
                        if let Slot::Leaf(mask) = node.slot(SLOT_MASK) {
                            let record = &store[mask];
                            // Everything below extends this prefix.
                            if !self.ops.match_key(record, key, 0, bitoff) {
                                return best;
                            }
                            if filter(record, FilterFlags::MASK) {
                                best = Some(mask);
                            }
                        }
                        child = node.slot(SLOT_LEFT);
                    } else {
                        child = node.slot(self.ops.test_key(key, bitoff, bitlen) & 1);
                    }
                }
            }
        }
    }

    /// [`find_filtered_node`](Self::find_filtered_node) accepting every
    /// candidate.
    pub fn find_node<S>(&self, store: &S, key: &O::Key) -> Option<RecordId>
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        self.find_filtered_node(store, key, |_, _| true)
    }

    /// The path from the root to the leaf of record `id`, following its own
    /// key.
    fn locate<S>(&self, store: &S, id: RecordId) -> Option<Path>
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        let len = self.entry_bitlen(store, id);
        let mut path = Path::new();
        if len == 0 {
            if self.oddman() != Some(id) {
                return None;
            }
            path.push(Step {
                parent: Parent::Root,
                slot: SLOT_ODDMAN,
            });
            return Some(path);
        }

        let mut step = Step {
            parent: Parent::Root,
            slot: SLOT_ROOT,
        };
        loop {
            path.push(step);
            let owner = match self.slot(store, step.parent, step.slot) {
                Slot::Empty => return None,
                Slot::Leaf(leaf) => return (leaf == id).then_some(path),
                Slot::Branch(owner) => owner,
            };
            let node = self.node(store, owner);
            let (bitoff, bitlen) = (node.branch_bitoff(), node.branch_bitlen());
            let slot = if bitlen == 0 {
                match len.cmp(&bitoff) {
                    std::cmp::Ordering::Less => return None,
                    std::cmp::Ordering::Equal => SLOT_MASK,
                    std::cmp::Ordering::Greater => SLOT_LEFT,
                }
            } else {
                if len <= bitoff {
                    return None;
                }
                self.ops.test_node(&store[id], bitoff, bitlen) & 1
            };
            step = Step {
                parent: Parent::Branch(owner),
                slot,
            };
        }
    }
}

// =============================================================================
// Removal
// =============================================================================

impl<O: TreeOps> PatriciaTree<O> {
    /// Unlink record `id`. Its sibling moves up into the slot that held the
    /// parent branch; the record itself is left for the caller to reuse.
    ///
    /// Returns `false`, leaving the tree unchanged, if the record is not in
    /// this tree.
    pub fn remove_node<S>(&mut self, store: &mut S, id: RecordId) -> bool
    where
        S: IndexMut<RecordId, Output = O::Record> + ?Sized,
    {
        if !self.node(store, id).is_linked() {
            debug!(record = id, "record not linked");
            return false;
        }
        let Some(path) = self.locate(store, id) else {
            debug!(record = id, "record not in this tree");
            return false;
        };

        let leaf = path[path.len() - 1];
        match leaf.parent {
            Parent::Root => self.root.set_slot(leaf.slot, Slot::Empty),
            Parent::Branch(owner) => {
                let sibling = self.slot(store, leaf.parent, leaf.slot ^ 1);
                let above = path[path.len() - 2];
                self.link(store, above.parent, above.slot, sibling);

                // The branch of `owner` is now free. If the branch of `id`
                // is still in use, `owner` takes it over so `id` can go.
                if owner != id {
                    let held = path
                        .iter()
                        .position(|step| step.parent == Parent::Branch(id));
                    match held {
                        Some(k) => {
                            let into = path[k - 1];
                            let branch = *self.node(store, id);
                            self.node_mut(store, owner).take_branch(&branch);
                            self.link(store, into.parent, into.slot, Slot::Branch(owner));
                            trace!(record = owner, from = id, "moved branch");
                        }
                        None => self.node_mut(store, owner).clear_branch(),
                    }
                }
            }
        }

        self.node_mut(store, id).reset();
        self.count -= 1;
        trace!(record = id, len = self.count, "removed");
        self.self_check(store);
        true
    }
}

// =============================================================================
// Iteration
// =============================================================================

impl<O: TreeOps> PatriciaTree<O> {
    /// The entry after `prev` in `direction`, or the first entry when `prev`
    /// is `None`.
    ///
    /// The position is rebuilt from the key of `prev` on every call, so no
    /// cursor state is kept. Returns `None` at the end or when `prev` is not
    /// in the tree.
    pub fn iterate<S>(&self, store: &S, prev: Option<RecordId>, direction: Direction) -> Option<RecordId>
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        let Some(prev) = prev else {
            return self
                .visit_order(store, Parent::Root, direction)
                .into_iter()
                .find_map(|slot| self.extreme(store, self.root.slot(slot), direction));
        };
        if !self.node(store, prev).is_linked() {
            return None;
        }

        let path = self.locate(store, prev)?;
        for step in path.iter().rev() {
            let [first, second] = self.visit_order(store, step.parent, direction);
            if first == step.slot {
                let next = self.slot(store, step.parent, second);
                if let Some(found) = self.extreme(store, next, direction) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// First entry under `child` in `direction`.
    fn extreme<S>(&self, store: &S, mut child: Slot, direction: Direction) -> Option<RecordId>
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        loop {
            match child {
                Slot::Empty => return None,
                Slot::Leaf(id) => return Some(id),
                Slot::Branch(owner) => {
                    let parent = Parent::Branch(owner);
                    let [first, _] = self.visit_order(store, parent, direction);
                    child = self.slot(store, parent, first);
                }
            }
        }
    }

    /// All entries in `direction`, driven by [`iterate`](Self::iterate).
    pub fn iter<'a, S>(&'a self, store: &'a S, direction: Direction) -> Iter<'a, O, S>
    where
        S: Index<RecordId, Output = O::Record> + ?Sized,
    {
        Iter {
            tree: self,
            store,
            cursor: None,
            direction,
            finished: false,
        }
    }
}

/// Iterator over the [`RecordId`]s of a tree, returned by [`PatriciaTree::iter`].
pub struct Iter<'a, O: TreeOps, S: ?Sized> {
    tree: &'a PatriciaTree<O>,
    store: &'a S,
    cursor: Option<RecordId>,
    direction: Direction,
    finished: bool,
}

impl<'a, O, S> Iterator for Iter<'a, O, S>
where
    O: TreeOps,
    S: Index<RecordId, Output = O::Record> + ?Sized,
{
    type Item = RecordId;

    fn next(&mut self) -> Option<RecordId> {
        if self.finished {
            return None;
        }
        let next = self.tree.iterate(self.store, self.cursor, self.direction);
        match next {
            Some(id) => self.cursor = Some(id),
            None => self.finished = true,
        }
        next
    }
}
