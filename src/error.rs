use crate::node::{RecordId, Slot};

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A branch with a missing child.
    #[error("branch of record {owner} has an empty slot {slot}")]
    EmptyBranchSlot { owner: RecordId, slot: usize },
    /// A branch testing bits its ancestors already consumed.
    #[error("branch of record {owner} tests bit {bitoff}, below the {min} its parent leaves")]
    BitOffsetOrder { owner: RecordId, bitoff: u32, min: u32 },
    /// A stored leaf or branch position disagreeing with the slot in use.
    #[error("record {record} sits in slot {actual} but records slot {stored}")]
    PositionMismatch {
        record: RecordId,
        stored: usize,
        actual: usize,
    },
    /// A leaf or branch reachable more than once, or an unlinked record in
    /// the tree.
    #[error("record {0} is linked more than once or not marked linked")]
    DuplicateLink(RecordId),
    /// A branch role with no matching leaf below it.
    #[error("branch of record {0} is not an ancestor of its leaf")]
    BranchNotAncestor(RecordId),
    /// A mask branch whose mask slot does not hold a mask of its length.
    #[error("mask branch of record {0} does not carry a mask leaf of its length")]
    MaskBranch(RecordId),
    /// Something other than a zero-length mask in the oddman slot.
    #[error("oddman slot holds {0:?}, expected a zero-length mask leaf")]
    Oddman(Slot),
    /// A leaf unreachable by descending with its own key.
    #[error("record {record} is misplaced under the branch of record {owner} at bit {bitoff}")]
    Misrouted {
        record: RecordId,
        owner: RecordId,
        bitoff: u32,
    },
    /// The entry count drifted from the linked leaves.
    #[error("tree counts {expected} entries but links {found}")]
    Count { expected: usize, found: usize },
}
