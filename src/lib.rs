//! # ptree
//!
//! A path-compressed binary trie (PATRICIA trie) over bit-string keys, with
//! exact entries and mask (prefix) entries for longest-prefix matching.
//!
//! The trie never allocates. Records live in storage the caller owns (a
//! `Vec`, slice or slab) and embed a [`PtNode`]; the tree only links those
//! nodes together. Each node can serve both as a leaf and as a branch, which
//! is why `n` records always carry enough nodes for their own `n - 1`
//! branches.
//!
//! ## Example
//!
//! ```rust
//! use ptree::{Keyed, KeyedOps, PatriciaTree, PtNode};
//!
//! struct Route {
//!     prefix: u32,
//!     node: PtNode,
//! }
//!
//! impl Keyed for Route {
//!     type Key = u32;
//!
//!     fn key(&self) -> &u32 {
//!         &self.prefix
//!     }
//!
//!     fn node(&self) -> &PtNode {
//!         &self.node
//!     }
//!
//!     fn node_mut(&mut self) -> &mut PtNode {
//!         &mut self.node
//!     }
//! }
//!
//! let route = |prefix| Route { prefix, node: PtNode::new() };
//! let mut routes = vec![route(0x0a00_0000), route(0x0a01_0000), route(0x0a01_0203)];
//!
//! let mut tree = PatriciaTree::new(KeyedOps::<Route>::new());
//! assert!(tree.insert_mask_node(&mut routes, 0, 8)); // 10.0.0.0/8
//! assert!(tree.insert_mask_node(&mut routes, 1, 16)); // 10.1.0.0/16
//! assert!(tree.insert_node(&mut routes, 2)); // 10.1.2.3
//!
//! assert_eq!(tree.find_node(&routes, &0x0a01_0203), Some(2));
//! assert_eq!(tree.find_node(&routes, &0x0a01_0909), Some(1));
//! assert_eq!(tree.find_node(&routes, &0x0a02_0000), Some(0));
//! assert_eq!(tree.find_node(&routes, &0x0b00_0000), None);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

mod bits;
mod check;
mod config;
mod error;
mod node;
mod ops;
mod tree;

pub use bits::{extract_bits, first_difference, BitString, BITLEN_ALL, BYTE_STRING_STRIDE};
pub use config::Config;
pub use error::{Error, Result};
pub use node::{
    PtNode, RecordId, Slot, MAX_BITLEN, MAX_BITOFF, SLOT_LEFT, SLOT_MASK, SLOT_ODDMAN,
    SLOT_RIGHT, SLOT_ROOT,
};
pub use ops::{FilterFlags, Keyed, KeyedOps, Match, TreeOps};
pub use tree::{Direction, Iter, PatriciaTree};


#[cfg(test)]
mod proptests;
