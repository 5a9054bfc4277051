//! Tests for in-memory node operations
//!
//! These tests verify:
//! - Leaf upsert / remove / lookup keep keys ordered
//! - Child slot selection (greatest key <= target)
//! - Splitting oversize nodes into 2 or 3 fitting pieces
//! - Sibling merge and its size accounting
//! - Kind checks on leaf-only / internal-only operations

use pagekv::btree::{codec, Node};
use pagekv::{Key, KvError, Value, MAX_KEY_SIZE, MAX_VALUE_SIZE, PAGE_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =============================================================================
// Helper Functions
// =============================================================================

fn key(bytes: &[u8]) -> Key {
    Key::from_slice(bytes).unwrap()
}

fn value(bytes: &[u8]) -> Value {
    Value::from_slice(bytes).unwrap()
}

fn max_leaf(count: u8) -> Node {
    let mut node = Node::new_leaf();
    for i in 0..count {
        let mut k = vec![b'k'; MAX_KEY_SIZE];
        k[0] = i;
        node.upsert(Key::new(k).unwrap(), Value::new(vec![i; MAX_VALUE_SIZE]).unwrap())
            .unwrap();
    }
    node
}

fn assert_valid_split(original: &Node, pieces: &[Node]) {
    for piece in pieces {
        assert!(piece.encoded_size() <= PAGE_SIZE, "piece of {} bytes", piece.encoded_size());
        assert!(!piece.is_empty());
        assert!(piece.is_sorted());
        assert_eq!(piece.is_leaf(), original.is_leaf());
    }
    let joined: Vec<Key> = pieces.iter().flat_map(|p| p.keys().iter().cloned()).collect();
    assert_eq!(joined, original.keys());
}

// =============================================================================
// Leaf Operation Tests
// =============================================================================

#[test]
fn test_upsert_keeps_keys_sorted() {
    let mut node = Node::new_leaf();
    for k in [b"d", b"a", b"c", b"b"] {
        assert_eq!(node.upsert(key(k), value(k)).unwrap(), None);
    }

    assert_eq!(node.keys(), &[key(b"a"), key(b"b"), key(b"c"), key(b"d")]);
    assert_eq!(node.values().unwrap()[2], value(b"c"));
}

#[test]
fn test_upsert_replaces_existing_value() {
    let mut node = Node::new_leaf();
    node.upsert(key(b"k"), value(b"old")).unwrap();

    let previous = node.upsert(key(b"k"), value(b"new")).unwrap();

    assert_eq!(previous, Some(value(b"old")));
    assert_eq!(node.len(), 1);
    assert_eq!(node.find(&key(b"k")).unwrap(), Some(&value(b"new")));
}

#[test]
fn test_remove() {
    let mut node = Node::new_leaf();
    node.upsert(key(b"a"), value(b"1")).unwrap();
    node.upsert(key(b"b"), value(b"2")).unwrap();

    assert_eq!(node.remove(&key(b"a")).unwrap(), Some(value(b"1")));
    assert_eq!(node.remove(&key(b"a")).unwrap(), None);
    assert_eq!(node.keys(), &[key(b"b")]);
    assert_eq!(node.find(&key(b"a")).unwrap(), None);
}

#[test]
fn test_find_is_exact_match() {
    let node = Node::leaf_from(vec![Key::null(), key(b"m")], vec![Value::empty(), value(b"v")])
        .unwrap();

    assert_eq!(node.find(&key(b"m")).unwrap(), Some(&value(b"v")));
    assert_eq!(node.find(&key(b"n")).unwrap(), None);
    assert_eq!(node.find(&key(b"ma")).unwrap(), None);
    assert_eq!(node.find(&Key::null()).unwrap(), Some(&Value::empty()));
}

#[test]
fn test_leaf_from_rejects_unsorted_keys() {
    let err = Node::leaf_from(vec![key(b"b"), key(b"a")], vec![value(b""), value(b"")]);
    assert!(matches!(err, Err(KvError::CorruptPage(_))));

    let err = Node::leaf_from(vec![key(b"a"), key(b"a")], vec![value(b""), value(b"")]);
    assert!(matches!(err, Err(KvError::CorruptPage(_))));
}

#[test]
fn test_leaf_from_rejects_length_mismatch() {
    let err = Node::leaf_from(vec![key(b"a")], vec![]);
    assert!(matches!(err, Err(KvError::CorruptPage(_))));
}

// =============================================================================
// Internal Operation Tests
// =============================================================================

#[test]
fn test_child_slot_picks_greatest_key_not_above_target() {
    let node = Node::internal_from(vec![Key::null(), key(b"g"), key(b"p")], vec![10, 11, 12])
        .unwrap();

    assert_eq!(node.child_slot(&Key::null()).unwrap(), Some(0));
    assert_eq!(node.child_slot(&key(b"a")).unwrap(), Some(0));
    assert_eq!(node.child_slot(&key(b"g")).unwrap(), Some(1));
    assert_eq!(node.child_slot(&key(b"h")).unwrap(), Some(1));
    assert_eq!(node.child_slot(&key(b"p")).unwrap(), Some(2));
    assert_eq!(node.child_slot(&key(&[0xff; 10])).unwrap(), Some(2));
    assert_eq!(node.child_at(1).unwrap(), 11);
}

#[test]
fn test_child_slot_below_first_key() {
    let node = Node::internal_from(vec![key(b"g")], vec![3]).unwrap();
    assert_eq!(node.child_slot(&key(b"a")).unwrap(), None);
}

#[test]
fn test_splice_children() {
    let mut node = Node::internal_from(vec![key(b"a"), key(b"m")], vec![1, 2]).unwrap();

    node.splice_children(0..1, vec![(key(b"a"), 7), (key(b"f"), 8)]).unwrap();
    assert_eq!(node.keys(), &[key(b"a"), key(b"f"), key(b"m")]);
    assert_eq!(node.children().unwrap(), &[7, 8, 2]);

    node.splice_children(1..3, vec![(key(b"f"), 9)]).unwrap();
    assert_eq!(node.keys(), &[key(b"a"), key(b"f")]);
    assert_eq!(node.children().unwrap(), &[7, 9]);

    node.splice_children(0..1, Vec::new()).unwrap();
    assert_eq!(node.children().unwrap(), &[9]);

    assert!(node.splice_children(0..5, Vec::new()).is_err());
}

#[test]
fn test_wrong_kind_operations_are_rejected() {
    let mut leaf = Node::new_leaf();
    let mut internal = Node::new_internal();

    assert!(matches!(
        leaf.child_slot(&key(b"a")),
        Err(KvError::WrongNodeKind { expected: "internal", found: "leaf" })
    ));
    assert!(matches!(leaf.children(), Err(KvError::WrongNodeKind { .. })));
    assert!(matches!(
        leaf.splice_children(0..0, vec![(key(b"a"), 1)]),
        Err(KvError::WrongNodeKind { .. })
    ));
    assert!(matches!(
        internal.find(&key(b"a")),
        Err(KvError::WrongNodeKind { expected: "leaf", found: "internal" })
    ));
    assert!(matches!(
        internal.upsert(key(b"a"), Value::empty()),
        Err(KvError::WrongNodeKind { .. })
    ));
    assert!(matches!(internal.remove(&key(b"a")), Err(KvError::WrongNodeKind { .. })));
}

// =============================================================================
// Split Tests
// =============================================================================

#[test]
fn test_split_fitting_node_is_identity() {
    let node = max_leaf(5);
    let pieces = node.clone().split().unwrap();

    assert_eq!(pieces, vec![node]);
}

#[test]
fn test_split_into_two() {
    let node = max_leaf(6);
    assert!(node.encoded_size() > PAGE_SIZE);

    let pieces = node.clone().split().unwrap();

    assert_eq!(pieces.len(), 2);
    assert_valid_split(&node, &pieces);
    assert_eq!(pieces[0].len(), 3);
    assert_eq!(pieces[1].len(), 3);
}

#[test]
fn test_split_into_three() {
    // 11 maximal entries need more than two pages
    let node = max_leaf(11);
    assert!(node.encoded_size() > 2 * PAGE_SIZE);

    let pieces = node.clone().split().unwrap();

    assert_eq!(pieces.len(), 3);
    assert_valid_split(&node, &pieces);
}

#[test]
fn test_split_internal_node() {
    let mut keys = Vec::new();
    let mut children = Vec::new();
    for i in 0..20u8 {
        let mut k = vec![0xaa; MAX_KEY_SIZE];
        k[0] = i;
        keys.push(Key::new(k).unwrap());
        children.push(i as u32 * 3);
    }
    let node = Node::internal_from(keys, children).unwrap();
    assert!(node.encoded_size() > PAGE_SIZE);

    let pieces = node.clone().split().unwrap();

    assert_eq!(pieces.len(), 2);
    assert_valid_split(&node, &pieces);
    let refs: Vec<u32> = pieces
        .iter()
        .flat_map(|p| p.children().unwrap().to_vec())
        .collect();
    assert_eq!(refs, node.children().unwrap());
}

#[test]
fn test_split_uneven_entries() {
    // One huge entry followed by many tiny ones: the cut must move left of the middle
    let mut node = Node::new_leaf();
    for i in 0..5u8 {
        let mut k = vec![b'a'; MAX_KEY_SIZE];
        k[1] = i;
        node.upsert(Key::new(k).unwrap(), Value::new(vec![1; MAX_VALUE_SIZE]).unwrap())
            .unwrap();
    }
    for i in 0..60u8 {
        node.upsert(key(&[b'z', i]), value(&[2; 4])).unwrap();
    }
    assert!(node.encoded_size() > PAGE_SIZE);

    let pieces = node.clone().split().unwrap();
    assert_valid_split(&node, &pieces);
}

#[test]
fn test_split_random_oversize_nodes() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..200 {
        let mut node = Node::new_leaf();
        let target = rng.gen_range(PAGE_SIZE + 1..2 * PAGE_SIZE);
        while node.encoded_size() <= target {
            let klen = rng.gen_range(1..=MAX_KEY_SIZE);
            let vlen = rng.gen_range(0..=MAX_VALUE_SIZE);
            let k: Vec<u8> = (0..klen).map(|_| rng.gen()).collect();
            let v: Vec<u8> = (0..vlen).map(|_| rng.gen()).collect();
            node.upsert(Key::new(k).unwrap(), Value::new(v).unwrap()).unwrap();
        }

        let pieces = node.clone().split().unwrap();
        assert!((2..=3).contains(&pieces.len()));
        assert_valid_split(&node, &pieces);
        for piece in &pieces {
            assert!(codec::encode(piece).is_ok());
        }
    }
}

// =============================================================================
// Merge Tests
// =============================================================================

#[test]
fn test_merge_leaves() {
    let left = Node::leaf_from(vec![key(b"a"), key(b"b")], vec![value(b"1"), value(b"2")])
        .unwrap();
    let right = Node::leaf_from(vec![key(b"c")], vec![value(b"3")]).unwrap();
    let expected_size = Node::merged_size(&left, &right);

    let merged = Node::merge(left, right).unwrap();

    assert_eq!(merged.keys(), &[key(b"a"), key(b"b"), key(b"c")]);
    assert_eq!(merged.values().unwrap(), &[value(b"1"), value(b"2"), value(b"3")]);
    assert_eq!(merged.encoded_size(), expected_size);
}

#[test]
fn test_merge_internal_nodes() {
    let left = Node::internal_from(vec![key(b"a")], vec![1]).unwrap();
    let right = Node::internal_from(vec![key(b"k"), key(b"z")], vec![2, 3]).unwrap();

    let merged = Node::merge(left, right).unwrap();

    assert_eq!(merged.children().unwrap(), &[1, 2, 3]);
    assert!(merged.is_sorted());
}

#[test]
fn test_merge_with_empty_node() {
    let left = Node::leaf_from(vec![key(b"a")], vec![value(b"1")]).unwrap();
    let merged = Node::merge(left.clone(), Node::new_leaf()).unwrap();
    assert_eq!(merged, left);
}

#[test]
fn test_merge_mixed_kinds_rejected() {
    let leaf = Node::new_leaf();
    let internal = Node::new_internal();
    assert!(matches!(Node::merge(leaf, internal), Err(KvError::WrongNodeKind { .. })));
}
