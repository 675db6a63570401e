//! Callbacks a [`PatriciaTree`] uses to reach into caller records.
//!
//! [`PatriciaTree`]: crate::PatriciaTree

use std::fmt;
use std::marker::PhantomData;

use crate::bits::{extract_bits, first_difference, BitString, BITLEN_ALL};
use crate::node::PtNode;

/// Outcome of comparing two keys over a bit range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Match {
    /// The keys agree over the whole range.
    Equal,
    /// The keys first differ at `bitoff`; `slot` is the value of the first
    /// key's bit there, i.e. the slot it takes under a branch at `bitoff`.
    Differ { bitoff: u32, slot: usize },
}

/// Flags passed to a lookup filter alongside a candidate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FilterFlags(u32);

impl FilterFlags {
    /// The candidate is a mask entry matched on its prefix.
    pub const MASK: FilterFlags = FilterFlags(1);

    pub const fn empty() -> Self {
        FilterFlags(0)
    }

    #[inline]
    pub const fn contains(self, other: FilterFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Key access and bit tests for one record type.
///
/// Implementations carry whatever context the callbacks need as fields of
/// `Self`. All bit ranges are `[bitoff, bitoff + bitlen)`; `bitlen` may be
/// [`BITLEN_ALL`](crate::BITLEN_ALL) to run to the end of the longer key.
pub trait TreeOps {
    type Record;
    type Key: ?Sized;

    /// The node embedded in `record`.
    fn node<'r>(&self, record: &'r Self::Record) -> &'r PtNode;

    fn node_mut<'r>(&self, record: &'r mut Self::Record) -> &'r mut PtNode;

    /// Compare the keys of `a` and `b`.
    fn match_node(&self, a: &Self::Record, b: &Self::Record, bitoff: u32, bitlen: u32) -> Match;

    /// Whether the key of `record` equals `key` over the range.
    fn match_key(&self, record: &Self::Record, key: &Self::Key, bitoff: u32, bitlen: u32)
        -> bool;

    /// Slot (`0` or `1`) selected by the tested bits of `record`'s key.
    fn test_node(&self, record: &Self::Record, bitoff: u32, bitlen: u32) -> usize;

    /// Slot (`0` or `1`) selected by the tested bits of `key`.
    fn test_key(&self, key: &Self::Key, bitoff: u32, bitlen: u32) -> usize;
}

/// A record that embeds a [`PtNode`] and exposes a bit-string key.
pub trait Keyed {
    type Key: BitString + ?Sized;

    fn key(&self) -> &Self::Key;

    fn node(&self) -> &PtNode;

    fn node_mut(&mut self) -> &mut PtNode;
}

/// [`TreeOps`] for any [`Keyed`] record, comparing keys with [`BitString`].
pub struct KeyedOps<R>(PhantomData<fn() -> R>);

impl<R> KeyedOps<R> {
    pub const fn new() -> Self {
        KeyedOps(PhantomData)
    }
}

impl<R> Default for KeyedOps<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for KeyedOps<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for KeyedOps<R> {}

impl<R> fmt::Debug for KeyedOps<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyedOps")
    }
}

/// A multi-bit field selects the right slot as soon as any tested bit is set.
#[inline]
fn field_slot(bits: u32) -> usize {
    (bits != 0) as usize
}

impl<R: Keyed> TreeOps for KeyedOps<R> {
    type Record = R;
    type Key = R::Key;

    #[inline]
    fn node<'r>(&self, record: &'r R) -> &'r PtNode {
        record.node()
    }

    #[inline]
    fn node_mut<'r>(&self, record: &'r mut R) -> &'r mut PtNode {
        record.node_mut()
    }

    fn match_node(&self, a: &R, b: &R, bitoff: u32, bitlen: u32) -> Match {
        match first_difference(a.key(), b.key(), bitoff, bitlen) {
            None => Match::Equal,
            Some(bit) => Match::Differ {
                bitoff: bit,
                slot: a.key().bit(bit) as usize,
            },
        }
    }

    fn match_key(&self, record: &R, key: &R::Key, bitoff: u32, bitlen: u32) -> bool {
        if bitlen == BITLEN_ALL && record.key().bit_len() != key.bit_len() {
            return false;
        }
        first_difference(record.key(), key, bitoff, bitlen).is_none()
    }

    fn test_node(&self, record: &R, bitoff: u32, bitlen: u32) -> usize {
        field_slot(extract_bits(record.key(), bitoff, bitlen))
    }

    fn test_key(&self, key: &R::Key, bitoff: u32, bitlen: u32) -> usize {
        field_slot(extract_bits(key, bitoff, bitlen))
    }
}
