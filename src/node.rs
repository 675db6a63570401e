//! The node embedded in every record linked into a [`PatriciaTree`].
//!
//! Each record's node plays two roles. As a **leaf** it stands for the record
//! itself. As a **branch** it is an internal decision point; the tree borrows
//! the branch role of some record whenever it needs one, so linking `n`
//! records never needs more than `n - 1` branches and the tree allocates
//! nothing.
//!
//! [`PatriciaTree`]: crate::PatriciaTree

/// Index of a record in caller-owned storage.
pub type RecordId = usize;

/// Left child of a branch (tested bit is `0`).
pub const SLOT_LEFT: usize = 0;
/// Right child of a branch (tested bit is `1`).
pub const SLOT_RIGHT: usize = 1;
/// Root sentinel slot holding the real root.
pub const SLOT_ROOT: usize = 0;
/// Root sentinel slot holding the zero-length mask.
pub const SLOT_ODDMAN: usize = 1;
/// Mask branch slot holding the mask leaf; the subtree sits in [`SLOT_LEFT`].
pub const SLOT_MASK: usize = 1;

/// A child link, tagged with the role of the record it points at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Slot {
    #[default]
    Empty,
    /// The leaf role of a record.
    Leaf(RecordId),
    /// The branch role of a record.
    Branch(RecordId),
}

impl Slot {
    #[inline]
    pub fn is_empty(self) -> bool {
        matches!(self, Slot::Empty)
    }

    #[inline]
    pub fn is_leaf(self) -> bool {
        matches!(self, Slot::Leaf(_))
    }

    #[inline]
    pub fn is_branch(self) -> bool {
        matches!(self, Slot::Branch(_))
    }

    /// The record behind the link, whatever its role.
    #[inline]
    pub fn record(self) -> Option<RecordId> {
        match self {
            Slot::Empty => None,
            Slot::Leaf(id) | Slot::Branch(id) => Some(id),
        }
    }
}

// =============================================================================
// Packed metadata
// =============================================================================

// Node data word.
const LEAF_POSITION_SHIFT: u32 = 0;
const BRANCH_POSITION_SHIFT: u32 = 1;
const LINKED_FLAG: u32 = 1 << 2;
const MASK_BITLEN_SHIFT: u32 = 8;
const MASK_BITLEN_BITS: u32 = 23;
const MASK_FLAG: u32 = 1 << 31;

// Branch data word.
const BRANCH_BITOFF_SHIFT: u32 = 0;
const BRANCH_BITOFF_BITS: u32 = 23;
const BRANCH_BITLEN_SHIFT: u32 = 23;
const BRANCH_BITLEN_BITS: u32 = 8;
const XBRANCH_FLAG: u32 = 1 << 31;

/// Largest bit offset (and mask length) the packed fields can hold.
pub const MAX_BITOFF: u32 = (1 << BRANCH_BITOFF_BITS) - 1;

/// Largest branch width the packed field can hold.
pub const MAX_BITLEN: u32 = (1 << BRANCH_BITLEN_BITS) - 1;

#[inline]
fn field(word: u32, shift: u32, bits: u32) -> u32 {
    (word >> shift) & ((1 << bits) - 1)
}

#[inline]
fn set_field(word: &mut u32, shift: u32, bits: u32, value: u32) {
    let mask = ((1 << bits) - 1) << shift;
    debug_assert!(value < (1 << bits), "value {value} overflows a {bits}-bit field");
    *word = (*word & !mask) | ((value << shift) & mask);
}

/// Trie linkage embedded in a caller record.
///
/// A fresh node (`PtNode::new()` or `Default`) is unlinked. The tree owns the
/// contents while the record is linked; callers only read them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PtNode {
    slots: [Slot; 2],
    nodedata: u32,
    branchdata: u32,
}

impl PtNode {
    pub const fn new() -> Self {
        Self {
            slots: [Slot::Empty, Slot::Empty],
            nodedata: 0,
            branchdata: 0,
        }
    }

    /// Child `slot` of this node's branch role.
    #[inline]
    pub fn slot(&self, slot: usize) -> Slot {
        self.slots[slot]
    }

    #[inline]
    pub(crate) fn set_slot(&mut self, slot: usize, child: Slot) {
        self.slots[slot] = child;
    }

    /// Whether the record is currently linked into a tree.
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.nodedata & LINKED_FLAG != 0
    }

    #[inline]
    pub(crate) fn set_linked(&mut self) {
        self.nodedata |= LINKED_FLAG;
    }

    /// Slot of the parent holding this record's leaf.
    #[inline]
    pub fn leaf_position(&self) -> usize {
        field(self.nodedata, LEAF_POSITION_SHIFT, 1) as usize
    }

    #[inline]
    pub(crate) fn set_leaf_position(&mut self, slot: usize) {
        set_field(&mut self.nodedata, LEAF_POSITION_SHIFT, 1, slot as u32);
    }

    /// Slot of the parent holding this record's branch.
    #[inline]
    pub fn branch_position(&self) -> usize {
        field(self.nodedata, BRANCH_POSITION_SHIFT, 1) as usize
    }

    #[inline]
    pub(crate) fn set_branch_position(&mut self, slot: usize) {
        set_field(&mut self.nodedata, BRANCH_POSITION_SHIFT, 1, slot as u32);
    }

    /// Whether this record is a mask (prefix) entry.
    #[inline]
    pub fn is_mask(&self) -> bool {
        self.nodedata & MASK_FLAG != 0
    }

    /// Prefix length of a mask entry, `0` otherwise.
    #[inline]
    pub fn mask_bitlen(&self) -> u32 {
        field(self.nodedata, MASK_BITLEN_SHIFT, MASK_BITLEN_BITS)
    }

    #[inline]
    pub(crate) fn set_mask(&mut self, bitlen: u32) {
        self.nodedata |= MASK_FLAG;
        set_field(&mut self.nodedata, MASK_BITLEN_SHIFT, MASK_BITLEN_BITS, bitlen);
    }

    /// First key bit tested by this node's branch role.
    #[inline]
    pub fn branch_bitoff(&self) -> u32 {
        field(self.branchdata, BRANCH_BITOFF_SHIFT, BRANCH_BITOFF_BITS)
    }

    /// Number of key bits tested by this node's branch role. Mask branches
    /// test none.
    #[inline]
    pub fn branch_bitlen(&self) -> u32 {
        field(self.branchdata, BRANCH_BITLEN_SHIFT, BRANCH_BITLEN_BITS)
    }

    /// Whether the branch tests a field wider than one bit.
    #[inline]
    pub fn is_xbranch(&self) -> bool {
        self.branchdata & XBRANCH_FLAG != 0
    }

    /// Whether the branch is a mask branch: slot [`SLOT_MASK`] holds a mask
    /// leaf of length [`branch_bitoff`](Self::branch_bitoff).
    #[inline]
    pub fn is_mask_branch(&self) -> bool {
        self.branch_bitlen() == 0
    }

    pub(crate) fn set_branch(&mut self, bitoff: u32, bitlen: u32) {
        self.branchdata = 0;
        set_field(&mut self.branchdata, BRANCH_BITOFF_SHIFT, BRANCH_BITOFF_BITS, bitoff);
        set_field(&mut self.branchdata, BRANCH_BITLEN_SHIFT, BRANCH_BITLEN_BITS, bitlen);
        if bitlen > 1 {
            self.branchdata |= XBRANCH_FLAG;
        }
    }

    /// Take over the branch role of `other`: its test and its children.
    pub(crate) fn take_branch(&mut self, other: &PtNode) {
        self.slots = other.slots;
        self.branchdata = other.branchdata;
    }

    /// Forget the branch role, keeping the leaf role intact.
    pub(crate) fn clear_branch(&mut self) {
        self.slots = [Slot::Empty, Slot::Empty];
        self.branchdata = 0;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}
