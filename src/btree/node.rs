//! B-tree nodes
//!
//! Nodes are plain values: the engine decodes one from a page, edits it in
//! memory and writes the result to a new page. Nothing here touches storage.

use std::ops::Range;

use crate::error::{KvError, Result};
use crate::storage::{PageId, PAGE_SIZE};
use crate::types::{Key, Value};

use super::codec::{CHILD_REF_SIZE, LEN_PREFIX_SIZE, NODE_HEADER_SIZE};

/// A leaf or internal node
///
/// `keys` is strictly ascending. In an internal node `children[i]` holds every
/// key in `[keys[i], keys[i + 1])`, and `keys[i]` is that subtree's minimum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(super) keys: Vec<Key>,
    pub(super) body: NodeBody,
}

/// Per-key payload, parallel to `Node::keys`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBody {
    Leaf(Vec<Value>),
    Internal(Vec<PageId>),
}

impl Node {
    // =========================================================================
    // Construction
    // =========================================================================

    pub fn new_leaf() -> Self {
        Self {
            keys: Vec::new(),
            body: NodeBody::Leaf(Vec::new()),
        }
    }

    pub fn new_internal() -> Self {
        Self {
            keys: Vec::new(),
            body: NodeBody::Internal(Vec::new()),
        }
    }

    /// Build a leaf from parallel, strictly ascending entries
    pub fn leaf_from(keys: Vec<Key>, values: Vec<Value>) -> Result<Self> {
        Self::from_parts(keys, NodeBody::Leaf(values))
    }

    /// Build an internal node from parallel, strictly ascending entries
    pub fn internal_from(keys: Vec<Key>, children: Vec<PageId>) -> Result<Self> {
        Self::from_parts(keys, NodeBody::Internal(children))
    }

    fn from_parts(keys: Vec<Key>, body: NodeBody) -> Result<Self> {
        let node = Self { keys, body };
        if node.body_len() != node.keys.len() {
            return Err(KvError::CorruptPage(format!(
                "{} keys but {} payload entries",
                node.keys.len(),
                node.body_len()
            )));
        }
        if !node.is_sorted() {
            return Err(KvError::CorruptPage("node keys are not strictly ascending".to_string()));
        }
        Ok(node)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_leaf(&self) -> bool {
        matches!(self.body, NodeBody::Leaf(_))
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn first_key(&self) -> Option<&Key> {
        self.keys.first()
    }

    pub fn values(&self) -> Result<&[Value]> {
        match &self.body {
            NodeBody::Leaf(values) => Ok(values),
            NodeBody::Internal(_) => Err(self.wrong_kind("leaf")),
        }
    }

    pub fn children(&self) -> Result<&[PageId]> {
        match &self.body {
            NodeBody::Internal(children) => Ok(children),
            NodeBody::Leaf(_) => Err(self.wrong_kind("internal")),
        }
    }

    /// Strictly ascending key order
    pub fn is_sorted(&self) -> bool {
        self.keys.windows(2).all(|pair| pair[0] < pair[1])
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Exact-match lookup in a leaf
    pub fn find(&self, key: &Key) -> Result<Option<&Value>> {
        let values = self.values()?;
        Ok(self.keys.binary_search(key).ok().map(|idx| &values[idx]))
    }

    /// Slot of the child whose range holds `key`: the greatest key <= `key`.
    /// `None` if `key` sorts before the first key.
    pub fn child_slot(&self, key: &Key) -> Result<Option<usize>> {
        self.children()?;
        Ok(match self.keys.binary_search(key) {
            Ok(idx) => Some(idx),
            Err(0) => None,
            Err(idx) => Some(idx - 1),
        })
    }

    pub fn child_at(&self, slot: usize) -> Result<PageId> {
        let children = self.children()?;
        children.get(slot).copied().ok_or_else(|| {
            KvError::CorruptPage(format!(
                "child slot {} out of range ({} children)",
                slot,
                children.len()
            ))
        })
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert or replace `key` in a leaf; returns the previous value
    pub fn upsert(&mut self, key: Key, value: Value) -> Result<Option<Value>> {
        let found = self.kind_name();
        let values = match &mut self.body {
            NodeBody::Leaf(values) => values,
            NodeBody::Internal(_) => {
                return Err(KvError::WrongNodeKind {
                    expected: "leaf",
                    found,
                })
            }
        };
        match self.keys.binary_search(&key) {
            Ok(idx) => Ok(Some(std::mem::replace(&mut values[idx], value))),
            Err(idx) => {
                self.keys.insert(idx, key);
                values.insert(idx, value);
                Ok(None)
            }
        }
    }

    /// Remove `key` from a leaf; returns the removed value
    pub fn remove(&mut self, key: &Key) -> Result<Option<Value>> {
        let found = self.kind_name();
        let values = match &mut self.body {
            NodeBody::Leaf(values) => values,
            NodeBody::Internal(_) => {
                return Err(KvError::WrongNodeKind {
                    expected: "leaf",
                    found,
                })
            }
        };
        match self.keys.binary_search(key) {
            Ok(idx) => {
                self.keys.remove(idx);
                Ok(Some(values.remove(idx)))
            }
            Err(_) => Ok(None),
        }
    }

    /// Replace the child entries in `range` with `entries`
    ///
    /// `entries` must be ascending and fit between the neighbors of `range`.
    pub fn splice_children<I>(&mut self, range: Range<usize>, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (Key, PageId)>,
    {
        let found = self.kind_name();
        let children = match &mut self.body {
            NodeBody::Internal(children) => children,
            NodeBody::Leaf(_) => {
                return Err(KvError::WrongNodeKind {
                    expected: "internal",
                    found,
                })
            }
        };
        if range.start > range.end || range.end > self.keys.len() {
            return Err(KvError::CorruptPage(format!(
                "child range {:?} out of bounds ({} children)",
                range,
                self.keys.len()
            )));
        }
        let (keys, ids): (Vec<Key>, Vec<PageId>) = entries.into_iter().unzip();
        self.keys.splice(range.clone(), keys);
        children.splice(range, ids);
        Ok(())
    }

    // =========================================================================
    // Split / Merge
    // =========================================================================

    /// Split an oversize node into 2 or 3 pieces that each fit a page.
    /// A node that already fits is returned unchanged as the only piece.
    pub fn split(self) -> Result<Vec<Node>> {
        if self.encoded_size() <= PAGE_SIZE {
            return Ok(vec![self]);
        }

        let (left, right) = self.split_in_two()?;
        if left.encoded_size() <= PAGE_SIZE {
            return Ok(vec![left, right]);
        }

        let (left_left, left_right) = left.split_in_two()?;
        Ok(vec![left_left, left_right, right])
    }

    /// Concatenate two siblings, `left` first
    pub fn merge(left: Node, right: Node) -> Result<Node> {
        let Node { mut keys, body } = left;
        let body = match (body, right.body) {
            (NodeBody::Leaf(mut a), NodeBody::Leaf(b)) => {
                a.extend(b);
                NodeBody::Leaf(a)
            }
            (NodeBody::Internal(mut a), NodeBody::Internal(b)) => {
                a.extend(b);
                NodeBody::Internal(a)
            }
            (NodeBody::Leaf(_), NodeBody::Internal(_)) => {
                return Err(KvError::WrongNodeKind {
                    expected: "leaf",
                    found: "internal",
                })
            }
            (NodeBody::Internal(_), NodeBody::Leaf(_)) => {
                return Err(KvError::WrongNodeKind {
                    expected: "internal",
                    found: "leaf",
                })
            }
        };
        keys.extend(right.keys);
        Ok(Node { keys, body })
    }

    /// Exact encoded size of `merge(left, right)`
    pub fn merged_size(left: &Node, right: &Node) -> usize {
        left.encoded_size() + right.encoded_size() - NODE_HEADER_SIZE
    }

    /// Cut at the largest balanced prefix whose encoding fits, then push the
    /// cut right until the suffix fits too.
    fn split_in_two(self) -> Result<(Node, Node)> {
        let total = self.keys.len();
        if total < 2 {
            return Err(KvError::NodeUnsplittable { keys: total });
        }

        let mut cut = total / 2;
        while cut > 0 && self.partial_size(0..cut) > PAGE_SIZE {
            cut -= 1;
        }
        cut = cut.max(1);
        while cut < total && self.partial_size(cut..total) > PAGE_SIZE {
            cut += 1;
        }
        cut = cut.min(total - 1);

        let Node { mut keys, body } = self;
        let right_keys = keys.split_off(cut);
        let (left_body, right_body) = match body {
            NodeBody::Leaf(mut values) => {
                let right = values.split_off(cut);
                (NodeBody::Leaf(values), NodeBody::Leaf(right))
            }
            NodeBody::Internal(mut children) => {
                let right = children.split_off(cut);
                (NodeBody::Internal(children), NodeBody::Internal(right))
            }
        };

        Ok((
            Node {
                keys,
                body: left_body,
            },
            Node {
                keys: right_keys,
                body: right_body,
            },
        ))
    }

    /// Encoded size of the entries in `range` as a standalone node
    fn partial_size(&self, range: Range<usize>) -> usize {
        let keys: usize = self.keys[range.clone()]
            .iter()
            .map(|key| LEN_PREFIX_SIZE + key.len())
            .sum();
        let payload: usize = match &self.body {
            NodeBody::Leaf(values) => values[range]
                .iter()
                .map(|value| LEN_PREFIX_SIZE + value.len())
                .sum(),
            NodeBody::Internal(_) => range.len() * CHILD_REF_SIZE,
        };
        NODE_HEADER_SIZE + keys + payload
    }

    pub(super) fn body_len(&self) -> usize {
        match &self.body {
            NodeBody::Leaf(values) => values.len(),
            NodeBody::Internal(children) => children.len(),
        }
    }

    pub(super) fn kind_name(&self) -> &'static str {
        if self.is_leaf() {
            "leaf"
        } else {
            "internal"
        }
    }

    fn wrong_kind(&self, expected: &'static str) -> KvError {
        KvError::WrongNodeKind {
            expected,
            found: self.kind_name(),
        }
    }

    /// Encoded size of the whole node
    pub fn encoded_size(&self) -> usize {
        self.partial_size(0..self.keys.len())
    }

    /// Small enough (<= PAGE_SIZE / 4) to try merging with a sibling
    pub fn is_merge_candidate(&self) -> bool {
        self.encoded_size() <= PAGE_SIZE / 4
    }
}
