use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

struct Rec {
    key: u32,
    node: PtNode,
}

impl Keyed for Rec {
    type Key = u32;

    fn key(&self) -> &u32 {
        &self.key
    }

    fn node(&self) -> &PtNode {
        &self.node
    }

    fn node_mut(&mut self) -> &mut PtNode {
        &mut self.node
    }
}

type Tree = PatriciaTree<KeyedOps<Rec>>;

/// Exact keys rank after every mask of the same bits.
const EXACT_RANK: u32 = 33;

/// The part of `key` a mask of `len` bits covers.
fn truncate(key: u32, len: u32) -> u32 {
    match len {
        0 => 0,
        1..=31 => key & (u32::MAX << (32 - len)),
        _ => key,
    }
}

/// Model key: the covered bits, then the entry length. Its `Ord` is the
/// trie's ascending order.
fn model_key(key: u32, mask: Option<u32>) -> (u32, u32) {
    match mask {
        Some(len) => (truncate(key, len), len),
        None => (key, EXACT_RANK),
    }
}

fn model_find(m: &BTreeMap<(u32, u32), RecordId>, query: u32) -> Option<RecordId> {
    m.iter()
        .filter(|&(&(bits, rank), _)| truncate(query, rank.min(32)) == bits)
        .max_by_key(|&(&(_, rank), _)| rank)
        .map(|(_, &id)| id)
}

fn insert(t: &mut Tree, recs: &mut Vec<Rec>, key: u32, mask: Option<u32>) -> (RecordId, bool) {
    let id = recs.len();
    recs.push(Rec {
        key,
        node: PtNode::new(),
    });
    let inserted = match mask {
        Some(len) => t.insert_mask_node(recs, id, len),
        None => t.insert_node(recs, id),
    };
    (id, inserted)
}

fn assert_matches_model(t: &Tree, recs: &[Rec], m: &BTreeMap<(u32, u32), RecordId>) {
    assert_eq!(t.check(recs), Ok(()));
    assert_eq!(t.len(), m.len());

    let expected: Vec<RecordId> = m.values().copied().collect();
    let ascending: Vec<RecordId> = t.iter(recs, Direction::Ascending).collect();
    assert_eq!(ascending, expected);

    let mut descending: Vec<RecordId> = t.iter(recs, Direction::Descending).collect();
    descending.reverse();
    assert_eq!(descending, expected);
}

#[derive(Clone, Debug)]
enum Op {
    Insert(u32, Option<u32>),
    Remove(u32, Option<u32>),
    Find(u32),
}

fn exact_key_strategy() -> impl Strategy<Value = u32> + Clone {
    // Dense ranges so that removes and lookups hit existing keys, sparse
    // ones for deep splits.
    prop_oneof![
        0u32..64,
        (0u32..16).prop_map(|x| x << 28),
        any::<u32>(),
    ]
}

fn masked_key_strategy() -> impl Strategy<Value = u32> + Clone {
    (any::<u8>(), 0u32..4).prop_map(|(hi, lo)| ((hi as u32) << 24) | lo)
}

fn mask_strategy() -> impl Strategy<Value = Option<u32>> + Clone {
    prop_oneof![
        3 => Just(None),
        1 => Just(Some(0)),
        3 => (1u32..=12).prop_map(Some),
        3 => (24u32..=32).prop_map(Some),
    ]
}

fn exact_ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = exact_key_strategy();
    let op = prop_oneof![
        50 => key.clone().prop_map(|k| Op::Insert(k, None)),
        25 => key.clone().prop_map(|k| Op::Remove(k, None)),
        25 => key.clone().prop_map(Op::Find),
    ];
    prop::collection::vec(op, 0..=500)
}

fn mask_ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = masked_key_strategy();
    let op = prop_oneof![
        50 => (key.clone(), mask_strategy()).prop_map(|(k, m)| Op::Insert(k, m)),
        20 => (key.clone(), mask_strategy()).prop_map(|(k, m)| Op::Remove(k, m)),
        30 => key.clone().prop_map(Op::Find),
    ];
    prop::collection::vec(op, 0..=300)
}

fn run_ops(ops: Vec<Op>) -> std::result::Result<(), TestCaseError> {
    let mut t = Tree::new(KeyedOps::new());
    let mut recs: Vec<Rec> = Vec::new();
    let mut m: BTreeMap<(u32, u32), RecordId> = BTreeMap::new();

    for op in ops {
        match op {
            Op::Insert(key, mask) => {
                let (id, inserted) = insert(&mut t, &mut recs, key, mask);
                let fresh = !m.contains_key(&model_key(key, mask));
                prop_assert_eq!(inserted, fresh);
                if inserted {
                    m.insert(model_key(key, mask), id);
                } else {
                    prop_assert!(!recs[id].node.is_linked());
                }
            }
            Op::Remove(key, mask) => match m.remove(&model_key(key, mask)) {
                Some(id) => {
                    prop_assert!(t.remove_node(&mut recs, id));
                    prop_assert!(!recs[id].node.is_linked());
                }
                None => {
                    // An unlinked record with the same key is not in the tree.
                    let id = recs.len();
                    recs.push(Rec {
                        key,
                        node: PtNode::new(),
                    });
                    prop_assert!(!t.remove_node(&mut recs, id));
                }
            },
            Op::Find(key) => {
                prop_assert_eq!(t.find_node(&recs, &key), model_find(&m, key));
            }
        }

        prop_assert_eq!(t.len(), m.len());
    }

    assert_matches_model(&t, &recs, &m);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_exact(ops in exact_ops_strategy()) {
        run_ops(ops)?;
    }

    #[test]
    fn prop_equivalence_masks(ops in mask_ops_strategy()) {
        run_ops(ops)?;
    }

    #[test]
    fn prop_iterate_resumes_from_any_entry(
        keys in prop::collection::btree_set(any::<u32>(), 1..=64),
    ) {
        let mut t = Tree::new(KeyedOps::new());
        let mut recs: Vec<Rec> = Vec::new();
        for &key in &keys {
            let (_, inserted) = insert(&mut t, &mut recs, key, None);
            prop_assert!(inserted);
        }

        // `keys` is sorted and ids follow insertion order.
        for id in 0..recs.len() {
            let next = t.iterate(&recs, Some(id), Direction::Ascending);
            prop_assert_eq!(next, (id + 1 < recs.len()).then_some(id + 1));
            let prev = t.iterate(&recs, Some(id), Direction::Descending);
            prop_assert_eq!(prev, id.checked_sub(1));
        }
    }
}

struct ByteRec {
    key: Vec<u8>,
    node: PtNode,
}

impl Keyed for ByteRec {
    type Key = [u8];

    fn key(&self) -> &[u8] {
        &self.key
    }

    fn node(&self) -> &PtNode {
        &self.node
    }

    fn node_mut(&mut self) -> &mut PtNode {
        &mut self.node
    }
}

type ByteTree = PatriciaTree<KeyedOps<ByteRec>>;

#[derive(Clone, Debug)]
enum ByteOp {
    Insert(Vec<u8>),
    Remove(Vec<u8>),
    Find(Vec<u8>),
}

fn byte_key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    // Zero bytes are common so that keys often differ only in trailing zeros.
    let byte = prop_oneof![
        4 => Just(0u8),
        2 => Just(b'a'),
        1 => any::<u8>(),
    ];
    prop::collection::vec(byte, 0..=6)
}

fn byte_ops_strategy() -> impl Strategy<Value = Vec<ByteOp>> {
    let key = byte_key_strategy();
    let op = prop_oneof![
        50 => key.clone().prop_map(ByteOp::Insert),
        25 => key.clone().prop_map(ByteOp::Remove),
        25 => key.clone().prop_map(ByteOp::Find),
    ];
    prop::collection::vec(op, 0..=300)
}

fn assert_bytes_match_model(t: &ByteTree, recs: &[ByteRec], m: &BTreeMap<Vec<u8>, RecordId>) {
    assert_eq!(t.check(recs), Ok(()));
    assert_eq!(t.len(), m.len());

    let expected: Vec<&[u8]> = m.keys().map(Vec::as_slice).collect();
    let ascending: Vec<&[u8]> = t
        .iter(recs, Direction::Ascending)
        .map(|id| recs[id].key.as_slice())
        .collect();
    assert_eq!(ascending, expected);

    let mut descending: Vec<&[u8]> = t
        .iter(recs, Direction::Descending)
        .map(|id| recs[id].key.as_slice())
        .collect();
    descending.reverse();
    assert_eq!(descending, expected);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_byte_strings(ops in byte_ops_strategy()) {
        let mut t = ByteTree::new(KeyedOps::new());
        let mut recs: Vec<ByteRec> = Vec::new();
        let mut m: BTreeMap<Vec<u8>, RecordId> = BTreeMap::new();

        for op in ops {
            match op {
                ByteOp::Insert(key) => {
                    let id = recs.len();
                    recs.push(ByteRec {
                        key: key.clone(),
                        node: PtNode::new(),
                    });
                    let inserted = t.insert_node(&mut recs, id);
                    prop_assert_eq!(inserted, !m.contains_key(&key));
                    if inserted {
                        m.insert(key, id);
                    }
                }
                ByteOp::Remove(key) => {
                    if let Some(id) = m.remove(&key) {
                        prop_assert!(t.remove_node(&mut recs, id));
                    }
                }
                ByteOp::Find(key) => {
                    prop_assert_eq!(t.find_node(&recs, &key), m.get(&key).copied());
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        for (key, &id) in &m {
            prop_assert_eq!(t.find_node(&recs, key), Some(id));
        }
        assert_bytes_match_model(&t, &recs, &m);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

/// Routes that nest, share bits and include both a /32 and the exact key.
fn small_route_set() -> Vec<(u32, Option<u32>)> {
    vec![
        (0x0000_0000, Some(0)),
        (0x0a00_0000, Some(8)),
        (0x0a01_0000, Some(16)),
        (0x0a01_0203, Some(32)),
        (0x0a01_0203, None),
        (0x0a01_0204, None),
        (0x0b00_0000, None),
    ]
}

fn checked_tree() -> Tree {
    let config = Config {
        self_check: true,
        ..Config::default()
    };
    Tree::with_config(KeyedOps::new(), config).unwrap()
}

#[test]
fn exhaustive_insert_order_small_set() {
    let routes = small_route_set();
    let queries = [0x0a01_0203, 0x0a01_0204, 0x0a01_0205, 0x0a01_ff00, 0x0aff_0000, 0x0b00_0000, 0x0c00_0000];

    for_each_permutation(&routes, |perm| {
        let mut t = checked_tree();
        let mut recs: Vec<Rec> = Vec::new();
        let mut m: BTreeMap<(u32, u32), RecordId> = BTreeMap::new();

        for (key, mask) in perm {
            let (id, inserted) = insert(&mut t, &mut recs, key, mask);
            assert!(inserted);
            m.insert(model_key(key, mask), id);
        }

        assert_matches_model(&t, &recs, &m);
        for query in queries {
            assert_eq!(t.find_node(&recs, &query), model_find(&m, query));
        }
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let routes = small_route_set();
    let order: Vec<RecordId> = (0..routes.len()).collect();

    // Insert in a fixed order, then remove in all permutations.
    for_each_permutation(&order, |perm| {
        let mut t = checked_tree();
        let mut recs: Vec<Rec> = Vec::new();
        let mut m: BTreeMap<(u32, u32), RecordId> = BTreeMap::new();
        for &(key, mask) in &routes {
            let (id, inserted) = insert(&mut t, &mut recs, key, mask);
            assert!(inserted);
            m.insert(model_key(key, mask), id);
        }

        for id in perm {
            let (key, mask) = routes[id];
            assert!(t.remove_node(&mut recs, id));
            m.remove(&model_key(key, mask));
            assert_matches_model(&t, &recs, &m);
            assert_eq!(t.find_node(&recs, &key), model_find(&m, key));
        }
        assert!(t.is_empty());
        assert_eq!(t.root(), Slot::Empty);
        assert_eq!(t.oddman(), None);
    });
}

#[test]
fn exhaustive_insert_order_zero_padded_bytes() {
    let keys: [&[u8]; 6] = [b"", b"\0", b"\0\0", b"\0a", b"a", b"a\0"];

    for_each_permutation(&keys, |perm| {
        let config = Config {
            self_check: true,
            ..Config::default()
        };
        let mut t = ByteTree::with_config(KeyedOps::new(), config).unwrap();
        let mut recs: Vec<ByteRec> = Vec::new();
        let mut m: BTreeMap<Vec<u8>, RecordId> = BTreeMap::new();

        for key in perm {
            let id = recs.len();
            recs.push(ByteRec {
                key: key.to_vec(),
                node: PtNode::new(),
            });
            assert!(t.insert_node(&mut recs, id), "{key:?}");
            m.insert(key.to_vec(), id);
        }

        assert_bytes_match_model(&t, &recs, &m);
        for (key, &id) in &m {
            assert_eq!(t.find_node(&recs, key), Some(id));
        }
    });
}
