//! B-Tree Module
//!
//! Copy-on-write B-tree over a [`PageStore`].
//!
//! ## Responsibilities
//! - Ordered point lookup, insert (upsert) and delete
//! - Split oversize nodes into 2-3 pages on the way back up from an insert
//! - Merge undersized nodes with a sibling on the way back up from a delete
//! - Keep the single root pointer in the store's Meta page
//!
//! ## Copy-on-write
//! A node is never rewritten in place. Every step of a mutation decodes the
//! page, edits the node in memory and stores the result under a newly
//! allocated (or recycled) id. Replaced ids are released only after the new
//! root is set; a mutation that fails midway releases the pages it wrote and
//! leaves the previous tree untouched. Page ids are the only handles that
//! live across recursive calls.
//!
//! ## Null key
//! The first insert into an empty tree also stores the null key with an empty
//! value, so every descent finds a lower bound in the root.

pub mod codec;
mod node;

pub use node::{Node, NodeBody};

use std::ops::Range;

use tracing::{debug, warn};

use crate::error::{KvError, Result};
use crate::storage::{PageId, PageStore, PAGE_SIZE};
use crate::types::{Key, Value};

/// Outcome of deleting from a subtree
enum Removal {
    /// Key not present; nothing was released or written
    Absent,

    /// Key removed; the edited (unstored) node replaces the subtree root
    Removed(Node),
}

/// Page ids touched by one mutation
#[derive(Default)]
struct Changes {
    /// Pages stored by this mutation
    written: Vec<PageId>,

    /// Pages the mutation replaces, released once the new root is set
    released: Vec<PageId>,
}

/// Shape summary returned by [`BTree::check`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Levels from root to leaves (0 for an empty tree)
    pub depth: usize,

    /// Pages reachable from the root
    pub pages: usize,

    /// Leaf entries, the null key included
    pub entries: usize,
}

/// Disk-backed B-tree
///
/// ## Concurrency:
/// Mutations take `&mut self`; one owner per tree serializes all writers.
pub struct BTree<S: PageStore> {
    store: S,
    root: Option<PageId>,
}

impl<S: PageStore> BTree<S> {
    /// Attach to a store, picking up its persisted root
    pub fn open(store: S) -> Result<Self> {
        let root = store.root()?;
        Ok(Self { store, root })
    }

    pub fn root(&self) -> Option<PageId> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Look up the value stored under `key`
    pub fn search(&self, key: &Key) -> Result<Option<Value>> {
        let Some(mut id) = self.root else {
            return Ok(None);
        };

        loop {
            let node = self.read_node(id)?;
            if node.is_leaf() {
                return Ok(node.find(key)?.cloned());
            }
            match node.child_slot(key)? {
                Some(slot) => id = node.child_at(slot)?,
                None => return Ok(None),
            }
        }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert `key`, replacing the value if it already exists
    pub fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        let mut changes = Changes::default();
        let root = self.insert_root(key, value, &mut changes);
        self.finish(root.map(Some), changes)
    }

    fn insert_root(&mut self, key: Key, value: Value, changes: &mut Changes) -> Result<PageId> {
        let root = match self.root {
            Some(id) => {
                let node = self.read_node(id)?;
                changes.released.push(id);
                node
            }
            None => {
                let mut leaf = Node::new_leaf();
                leaf.upsert(Key::null(), Value::empty())?;
                leaf
            }
        };

        let node = self.insert_into(root, key, value, changes)?;
        self.store_root(node, changes)
    }

    fn insert_into(
        &mut self,
        mut node: Node,
        key: Key,
        value: Value,
        changes: &mut Changes,
    ) -> Result<Node> {
        if node.is_leaf() {
            node.upsert(key, value)?;
            return Ok(node);
        }

        // A key below the first separator goes to the leftmost child.
        let slot = node.child_slot(&key)?.unwrap_or(0);
        let child_id = node.child_at(slot)?;
        let child = self.read_node(child_id)?;
        changes.released.push(child_id);

        let child = self.insert_into(child, key, value, changes)?;
        let entries = self.store_split(child, changes)?;
        node.splice_children(slot..slot + 1, entries)?;
        Ok(node)
    }

    /// Split `node` as needed and store every piece, returning (min key, id) pairs
    fn store_split(&mut self, node: Node, changes: &mut Changes) -> Result<Vec<(Key, PageId)>> {
        let pieces = node.split()?;
        if pieces.len() > 1 {
            debug!(pieces = pieces.len(), leaf = pieces[0].is_leaf(), "split node");
        }

        let mut entries = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let first = piece
                .first_key()
                .cloned()
                .ok_or_else(|| KvError::CorruptPage("split produced an empty node".to_string()))?;
            entries.push((first, self.write_node(&piece, changes)?));
        }
        Ok(entries)
    }

    /// Store `node` as the root, adding a level if it had to be split
    fn store_root(&mut self, node: Node, changes: &mut Changes) -> Result<PageId> {
        let pieces = self.store_split(node, changes)?;
        if pieces.len() == 1 {
            return Ok(pieces[0].1);
        }

        let count = pieces.len();
        let mut root = Node::new_internal();
        root.splice_children(0..0, pieces)?;
        let id = self.write_node(&root, changes)?;
        debug!(pieces = count, root = id, "root split, tree grew a level");
        Ok(id)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Remove `key`; returns false (and changes nothing) if it was absent
    pub fn delete(&mut self, key: &Key) -> Result<bool> {
        let Some(root_id) = self.root else {
            return Ok(false);
        };

        let mut changes = Changes::default();
        let root = self.read_node(root_id)?;
        let node = match self.delete_from(root, key, &mut changes) {
            Ok(Removal::Absent) => return Ok(false),
            Ok(Removal::Removed(node)) => node,
            Err(e) => {
                self.discard(&changes);
                return Err(e);
            }
        };

        changes.released.push(root_id);
        let root = self.collapse_root(node, &mut changes);
        self.finish(root, changes)?;
        Ok(true)
    }

    fn delete_from(&mut self, mut node: Node, key: &Key, changes: &mut Changes) -> Result<Removal> {
        if node.is_leaf() {
            return Ok(match node.remove(key)? {
                Some(_) => Removal::Removed(node),
                None => Removal::Absent,
            });
        }

        let Some(slot) = node.child_slot(key)? else {
            return Ok(Removal::Absent);
        };
        let child_id = node.child_at(slot)?;
        let child = self.read_node(child_id)?;

        let child = match self.delete_from(child, key, changes)? {
            Removal::Absent => return Ok(Removal::Absent),
            Removal::Removed(child) => child,
        };
        changes.released.push(child_id);

        self.rebalance(&mut node, slot, child, changes)?;
        Ok(Removal::Removed(node))
    }

    /// Put the edited child at `slot` back into `parent`, merging it with a
    /// sibling when it has become small and the pair fits one page.
    fn rebalance(
        &mut self,
        parent: &mut Node,
        slot: usize,
        child: Node,
        changes: &mut Changes,
    ) -> Result<()> {
        if !child.is_merge_candidate() {
            return self.replace_children(parent, slot..slot + 1, child, changes);
        }

        if slot > 0 {
            let left_id = parent.child_at(slot - 1)?;
            let left = self.read_node(left_id)?;
            if Node::merged_size(&left, &child) <= PAGE_SIZE {
                changes.released.push(left_id);
                debug!(left = left_id, "merged node into left sibling");
                let merged = Node::merge(left, child)?;
                return self.replace_children(parent, slot - 1..slot + 1, merged, changes);
            }
        }

        if slot + 1 < parent.len() {
            let right_id = parent.child_at(slot + 1)?;
            let right = self.read_node(right_id)?;
            if Node::merged_size(&child, &right) <= PAGE_SIZE {
                changes.released.push(right_id);
                debug!(right = right_id, "merged right sibling into node");
                let merged = Node::merge(child, right)?;
                return self.replace_children(parent, slot..slot + 2, merged, changes);
            }
        }

        self.replace_children(parent, slot..slot + 1, child, changes)
    }

    /// Store `child` (split if needed) and point the entries in `range` at its
    /// pieces; an empty child just drops the entries.
    ///
    /// A longer first key can push a child past a page on the delete path too.
    /// `parent` may then exceed a page itself and is split by its own caller.
    fn replace_children(
        &mut self,
        parent: &mut Node,
        range: Range<usize>,
        child: Node,
        changes: &mut Changes,
    ) -> Result<()> {
        if child.is_empty() {
            return parent.splice_children(range, std::iter::empty());
        }
        let entries = self.store_split(child, changes)?;
        parent.splice_children(range, entries)
    }

    /// Pick the new root after a delete.
    ///
    /// Internal roots with a single child are replaced by that child (repeatedly),
    /// and a root holding nothing but the null key empties the tree.
    fn collapse_root(&mut self, mut node: Node, changes: &mut Changes) -> Result<Option<PageId>> {
        // Page already holding `node`, if it was loaded rather than edited
        let mut stored: Option<PageId> = None;

        loop {
            let drained = if node.is_leaf() {
                node.is_empty() || (node.len() == 1 && node.keys()[0].is_null())
            } else {
                node.is_empty()
            };

            if drained {
                changes.released.extend(stored);
                debug!("tree emptied");
                return Ok(None);
            }

            if !node.is_leaf() && node.len() == 1 {
                let child = node.child_at(0)?;
                changes.released.extend(stored);
                debug!(child = child, "promoting single child to root");
                node = self.read_node(child)?;
                stored = Some(child);
                continue;
            }

            return match stored {
                Some(id) => Ok(Some(id)),
                None => Ok(Some(self.store_root(node, changes)?)),
            };
        }
    }

    /// Publish the new root and release the pages it replaced, or undo the
    /// writes of a failed mutation.
    ///
    /// Old pages stay allocated until the new root is in place, so a failure
    /// at any step leaves the previous tree intact.
    fn finish(&mut self, root: Result<Option<PageId>>, changes: Changes) -> Result<()> {
        if let Err(e) = root.and_then(|root| self.set_root(root)) {
            self.discard(&changes);
            return Err(e);
        }
        for id in changes.released {
            self.store.delete(id)?;
        }
        Ok(())
    }

    /// Release the pages written by a mutation that did not complete
    fn discard(&mut self, changes: &Changes) {
        for &id in &changes.written {
            if let Err(e) = self.store.delete(id) {
                warn!(page_id = id, error = %e, "failed to release page of aborted mutation");
            }
        }
        debug!(pages = changes.written.len(), "aborted mutation");
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Walk the whole tree and verify its structural invariants
    pub fn check(&self) -> Result<TreeStats> {
        let Some(root) = self.root else {
            return Ok(TreeStats::default());
        };

        let mut stats = TreeStats::default();
        let depth = self.check_node(root, None, None, &mut stats)?;
        stats.depth = depth;
        Ok(stats)
    }

    /// Returns the depth below and including `id`
    fn check_node(
        &self,
        id: PageId,
        lower: Option<&Key>,
        upper: Option<&Key>,
        stats: &mut TreeStats,
    ) -> Result<usize> {
        let node = self.read_node(id)?;
        stats.pages += 1;

        let corrupt = |what: &str| KvError::CorruptPage(format!("page {}: {}", id, what));

        if !node.is_sorted() {
            return Err(corrupt("keys not strictly ascending"));
        }
        if node.encoded_size() > PAGE_SIZE {
            return Err(corrupt("node exceeds page size"));
        }
        if let Some(lower) = lower {
            if node.first_key() != Some(lower) {
                return Err(corrupt("first key differs from parent separator"));
            }
        }
        if let (Some(upper), Some(last)) = (upper, node.keys().last()) {
            if last >= upper {
                return Err(corrupt("key beyond next parent separator"));
            }
        }

        let children = match node.body() {
            NodeBody::Leaf(_) => {
                stats.entries += node.len();
                return Ok(1);
            }
            NodeBody::Internal(children) => children,
        };
        if children.is_empty() {
            return Err(corrupt("internal node without children"));
        }

        let mut depth = None;
        for (slot, &child) in children.iter().enumerate() {
            let next = node.keys().get(slot + 1).or(upper);
            let below = self.check_node(child, Some(&node.keys()[slot]), next, stats)?;
            match depth {
                None => depth = Some(below),
                Some(d) if d != below => return Err(corrupt("leaves at different depths")),
                Some(_) => {}
            }
        }
        Ok(depth.unwrap_or(0) + 1)
    }

    /// All entries in key order, the null key included
    pub fn entries(&self) -> Result<Vec<(Key, Value)>> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.collect(root, &mut out)?;
        }
        Ok(out)
    }

    fn collect(&self, id: PageId, out: &mut Vec<(Key, Value)>) -> Result<()> {
        let node = self.read_node(id)?;
        match node.body() {
            NodeBody::Leaf(values) => {
                out.extend(node.keys().iter().cloned().zip(values.iter().cloned()));
            }
            NodeBody::Internal(children) => {
                for &child in children {
                    self.collect(child, out)?;
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn read_node(&self, id: PageId) -> Result<Node> {
        codec::decode(&self.store.get(id)?)
    }

    fn write_node(&mut self, node: &Node, changes: &mut Changes) -> Result<PageId> {
        let page = codec::encode(node)?;
        let id = self.store.set(&page)?;
        changes.written.push(id);
        Ok(id)
    }

    fn set_root(&mut self, root: Option<PageId>) -> Result<()> {
        self.store.set_root(root)?;
        self.root = root;
        Ok(())
    }
}
