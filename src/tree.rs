//! The piece tree: a balanced fixed-fanout B+-style tree over pieces.
//!
//! Branches hold `(child, subtree_length)` pairs; leaves hold piece entries
//! and are doubly linked to their siblings, so a full scan never touches the
//! branches. All nodes live in one arena `Vec` addressed by `u32` indices
//! (`u32::MAX` = none), which replaces parent/child pointer cycles with plain
//! index fields. Splitting is proactive: a node splits once it is within two
//! slots of capacity, because a single insert can materialize up to two new
//! entries (splitting an existing piece around the new one).

use smallvec::SmallVec;

use crate::piece::Piece;
use crate::slot_array::SlotArray;

/// Maximum children per branch / entries per leaf.
pub(crate) const BRANCH_FANOUT: usize = 26;
pub(crate) const LEAF_FANOUT: usize = 26;

pub(crate) type NodeIdx = u32;

/// Sentinel index for no node.
pub(crate) const NONE: NodeIdx = u32::MAX;

/// A branch's record of one child: the child node plus the total virtual
/// length under it, so descent never dereferences the child.
#[derive(Clone, Copy, Debug)]
struct Child {
    node: NodeIdx,
    length: u64,
}

impl Default for Child {
    fn default() -> Child {
        return Child { node: NONE, length: 0 };
    }
}

#[derive(Clone, Debug)]
enum NodeKind {
    Branch {
        children: SlotArray<Child, BRANCH_FANOUT>,
    },
    Leaf {
        entries: SlotArray<Piece, LEAF_FANOUT>,
        /// Sibling links along the bottom of the tree, independent of the
        /// branch hierarchy.
        prev: NodeIdx,
        next: NodeIdx,
    },
}

#[derive(Clone, Debug)]
struct Node {
    /// Always a branch, or `NONE` for the root.
    parent: NodeIdx,
    kind: NodeKind,
}

/// The tree proper. The root is always a branch, even when the whole tree is
/// one leaf, which keeps the insert and split paths uniform.
#[derive(Clone, Debug)]
pub(crate) struct PieceTree {
    nodes: Vec<Node>,
    free: Vec<NodeIdx>,
    root: NodeIdx,
}

impl PieceTree {
    pub(crate) fn new() -> PieceTree {
        let mut tree = PieceTree {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NONE,
        };

        // Bootstrap shape: a root branch over a single empty leaf. Delete
        // restores this shape rather than ever leaving the tree leafless.
        let root = tree.alloc(Node {
            parent: NONE,
            kind: NodeKind::Branch { children: SlotArray::new() },
        });
        let leaf = tree.alloc(Node {
            parent: root,
            kind: NodeKind::Leaf { entries: SlotArray::new(), prev: NONE, next: NONE },
        });
        tree.root = root;
        tree.children_mut(root).push_head(Child { node: leaf, length: 0 });

        return tree;
    }

    // -------------------------------------------------------------------
    // Arena plumbing
    // -------------------------------------------------------------------

    fn alloc(&mut self, node: Node) -> NodeIdx {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx as usize] = node;
            return idx;
        }
        let idx = self.nodes.len() as NodeIdx;
        self.nodes.push(node);
        return idx;
    }

    fn release(&mut self, idx: NodeIdx) {
        self.free.push(idx);
    }

    fn is_leaf(&self, idx: NodeIdx) -> bool {
        return matches!(self.nodes[idx as usize].kind, NodeKind::Leaf { .. });
    }

    fn parent(&self, idx: NodeIdx) -> NodeIdx {
        return self.nodes[idx as usize].parent;
    }

    fn children(&self, idx: NodeIdx) -> &SlotArray<Child, BRANCH_FANOUT> {
        match &self.nodes[idx as usize].kind {
            NodeKind::Branch { children } => return children,
            NodeKind::Leaf { .. } => unreachable!("expected a branch node"),
        }
    }

    fn children_mut(&mut self, idx: NodeIdx) -> &mut SlotArray<Child, BRANCH_FANOUT> {
        match &mut self.nodes[idx as usize].kind {
            NodeKind::Branch { children } => return children,
            NodeKind::Leaf { .. } => unreachable!("expected a branch node"),
        }
    }

    fn entries(&self, idx: NodeIdx) -> &SlotArray<Piece, LEAF_FANOUT> {
        match &self.nodes[idx as usize].kind {
            NodeKind::Leaf { entries, .. } => return entries,
            NodeKind::Branch { .. } => unreachable!("expected a leaf node"),
        }
    }

    fn entries_mut(&mut self, idx: NodeIdx) -> &mut SlotArray<Piece, LEAF_FANOUT> {
        match &mut self.nodes[idx as usize].kind {
            NodeKind::Leaf { entries, .. } => return entries,
            NodeKind::Branch { .. } => unreachable!("expected a leaf node"),
        }
    }

    fn leaf_prev(&self, idx: NodeIdx) -> NodeIdx {
        match &self.nodes[idx as usize].kind {
            NodeKind::Leaf { prev, .. } => return *prev,
            NodeKind::Branch { .. } => unreachable!("expected a leaf node"),
        }
    }

    fn leaf_next(&self, idx: NodeIdx) -> NodeIdx {
        match &self.nodes[idx as usize].kind {
            NodeKind::Leaf { next, .. } => return *next,
            NodeKind::Branch { .. } => unreachable!("expected a leaf node"),
        }
    }

    fn set_leaf_prev(&mut self, idx: NodeIdx, to: NodeIdx) {
        match &mut self.nodes[idx as usize].kind {
            NodeKind::Leaf { prev, .. } => *prev = to,
            NodeKind::Branch { .. } => unreachable!("expected a leaf node"),
        }
    }

    fn set_leaf_next(&mut self, idx: NodeIdx, to: NodeIdx) {
        match &mut self.nodes[idx as usize].kind {
            NodeKind::Leaf { next, .. } => *next = to,
            NodeKind::Branch { .. } => unreachable!("expected a leaf node"),
        }
    }

    // -------------------------------------------------------------------
    // Measurement
    // -------------------------------------------------------------------

    /// Length directly under `idx`: recorded child lengths for a branch,
    /// entry lengths for a leaf.
    fn subtree_length(&self, idx: NodeIdx) -> u64 {
        match &self.nodes[idx as usize].kind {
            NodeKind::Branch { children } => return children.iter().map(|c| c.length).sum(),
            NodeKind::Leaf { entries, .. } => return entries.iter().map(|e| e.length).sum(),
        }
    }

    /// Total virtual length of the whole tree.
    pub(crate) fn total_length(&self) -> u64 {
        return self.subtree_length(self.root);
    }

    /// A node splits once it is within two slots of capacity, so an insert
    /// always has room to materialize a head fragment, the new piece, and a
    /// tail fragment.
    fn needs_split(&self, idx: NodeIdx) -> bool {
        match &self.nodes[idx as usize].kind {
            NodeKind::Branch { children } => {
                return children.len() >= children.capacity() - 2;
            }
            NodeKind::Leaf { entries, .. } => {
                return entries.len() >= entries.capacity() - 2;
            }
        }
    }

    /// Logical position of `node` in `parent`'s child list.
    fn child_position(&self, parent: NodeIdx, node: NodeIdx) -> usize {
        for (nth, child) in self.children(parent).iter().enumerate() {
            if child.node == node {
                return nth;
            }
        }
        unreachable!("node missing from its parent's child list");
    }

    // -------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------

    /// Descend to the leaf owning `position`, returning the leaf and the
    /// position made relative to it.
    ///
    /// Boundary ties resolve to the *left* child (`<=` rather than `<`), so
    /// an insert at a boundary lands at the tail of the left leaf where tail
    /// chaining is tried first. If the position exceeds every child, fall
    /// through to the last child with all lengths already subtracted.
    fn search(&self, mut position: u64) -> (NodeIdx, u64) {
        let mut idx = self.root;
        loop {
            match &self.nodes[idx as usize].kind {
                NodeKind::Leaf { .. } => return (idx, position),
                NodeKind::Branch { children } => {
                    debug_assert!(!children.is_empty());
                    let mut descend = NONE;
                    for child in children.iter() {
                        if position <= child.length {
                            descend = child.node;
                            break;
                        }
                        position -= child.length;
                        descend = child.node;
                    }
                    idx = descend;
                }
            }
        }
    }

    /// Like [`search`](Self::search), but boundary ties resolve to the
    /// *right* child. Delete and copy need the entry *containing* a
    /// position, not the one ending at it.
    fn search_right(&self, mut position: u64) -> (NodeIdx, u64) {
        let mut idx = self.root;
        loop {
            match &self.nodes[idx as usize].kind {
                NodeKind::Leaf { .. } => return (idx, position),
                NodeKind::Branch { children } => {
                    debug_assert!(!children.is_empty());
                    let mut descend = NONE;
                    for child in children.iter() {
                        if position < child.length {
                            descend = child.node;
                            break;
                        }
                        position -= child.length;
                        descend = child.node;
                    }
                    idx = descend;
                }
            }
        }
    }

    /// Leftmost leaf, the start of the sibling chain.
    fn first_leaf(&self) -> NodeIdx {
        let mut idx = self.root;
        loop {
            match &self.nodes[idx as usize].kind {
                NodeKind::Leaf { .. } => {
                    debug_assert_eq!(self.leaf_prev(idx), NONE);
                    return idx;
                }
                NodeKind::Branch { children } => {
                    debug_assert!(!children.is_empty());
                    idx = children.first().node;
                }
            }
        }
    }

    // -------------------------------------------------------------------
    // Splitting
    // -------------------------------------------------------------------

    /// Split `idx`, first splitting any ancestors that lack room. Splitting
    /// the parent before the child guarantees the parent can take the new
    /// sibling entry.
    fn split(&mut self, idx: NodeIdx) {
        let parent = self.parent(idx);
        if parent != NONE && self.needs_split(parent) {
            self.split(parent);
        }

        // The parent link may have changed if an ancestor split reparented
        // this node, so each case re-reads it.
        if self.is_leaf(idx) {
            self.split_leaf(idx);
        } else if self.parent(idx) == NONE {
            self.split_root();
        } else {
            self.split_branch(idx);
        }
    }

    /// Point every child of branch `idx` back at it.
    fn reparent_children(&mut self, idx: NodeIdx) {
        let ids: SmallVec<[NodeIdx; BRANCH_FANOUT]> =
            self.children(idx).iter().map(|c| c.node).collect();
        for child in ids {
            self.nodes[child as usize].parent = idx;
        }
    }

    /// Split the root by pushing its children down into two new branches.
    /// The only operation that increases tree height.
    fn split_root(&mut self) {
        let root = self.root;
        let mut left_children = match &mut self.nodes[root as usize].kind {
            NodeKind::Branch { children } => std::mem::replace(children, SlotArray::new()),
            NodeKind::Leaf { .. } => unreachable!("the root is always a branch"),
        };
        let right_children = left_children.split();

        let left = self.alloc(Node {
            parent: root,
            kind: NodeKind::Branch { children: left_children },
        });
        let right = self.alloc(Node {
            parent: root,
            kind: NodeKind::Branch { children: right_children },
        });
        self.reparent_children(left);
        self.reparent_children(right);

        let left_child = Child { node: left, length: self.subtree_length(left) };
        let right_child = Child { node: right, length: self.subtree_length(right) };
        let children = self.children_mut(root);
        children.push_head(right_child);
        children.push_head(left_child);

        debug_assert_eq!(self.children(root).len(), 2);
    }

    /// Split a non-root branch by moving its tail half of children into a
    /// new right sibling, spliced into the parent just after it. Height is
    /// unchanged and no lengths outside the two siblings move.
    fn split_branch(&mut self, left: NodeIdx) {
        let parent = self.parent(left);
        debug_assert!(parent != NONE);

        let right_children = self.children_mut(left).split();
        let right = self.alloc(Node {
            parent,
            kind: NodeKind::Branch { children: right_children },
        });
        self.reparent_children(right);

        let left_length = self.subtree_length(left);
        let right_length = self.subtree_length(right);

        let nth = self.child_position(parent, left);
        self.children_mut(parent).nth_mut(nth).length = left_length;
        self.children_mut(parent)
            .insert(nth + 1, Child { node: right, length: right_length });
    }

    /// Split a leaf the same way, additionally relinking the sibling chain.
    fn split_leaf(&mut self, left: NodeIdx) {
        let parent = self.parent(left);
        debug_assert!(parent != NONE);
        debug_assert!(!self.children(parent).is_full());

        let (right_entries, old_next) = match &mut self.nodes[left as usize].kind {
            NodeKind::Leaf { entries, next, .. } => (entries.split(), *next),
            NodeKind::Branch { .. } => unreachable!("expected a leaf node"),
        };

        let right = self.alloc(Node {
            parent,
            kind: NodeKind::Leaf { entries: right_entries, prev: left, next: old_next },
        });
        self.set_leaf_next(left, right);
        if old_next != NONE {
            self.set_leaf_prev(old_next, right);
        }

        let right_length = self.subtree_length(right);
        let nth = self.child_position(parent, left);
        self.children_mut(parent).nth_mut(nth).length -= right_length;
        self.children_mut(parent)
            .insert(nth + 1, Child { node: right, length: right_length });
    }

    // -------------------------------------------------------------------
    // Insert
    // -------------------------------------------------------------------

    /// Insert `piece` at virtual `position`.
    ///
    /// The caller (the table facade) has already validated the position and
    /// rejected zero lengths.
    pub(crate) fn insert(&mut self, position: u64, piece: Piece) {
        debug_assert!(piece.length > 0);

        let (mut target, mut rel) = self.search(position);
        debug_assert!(rel <= self.subtree_length(target));

        if self.entries(target).is_empty() {
            // Only an empty tree searches to an empty leaf.
            debug_assert_eq!(rel, 0);
            self.entries_mut(target).push_head(piece);
        } else {
            if self.needs_split(target) {
                // Splitting may hand this position to another leaf, so redo
                // the search from the original absolute position rather than
                // patching up the stale result.
                self.split(target);
                (target, rel) = self.search(position);
                debug_assert!(rel <= self.subtree_length(target));
            }
            self.insert_in_leaf(target, rel, piece);
        }

        self.propagate(target, piece.length as i64);
    }

    /// Sink `piece` into `leaf` at leaf-relative offset `rel`, chaining onto
    /// an adjacent entry when the source runs line up.
    fn insert_in_leaf(&mut self, leaf: NodeIdx, mut rel: u64, piece: Piece) {
        let mut nth = 0usize;
        let mut cur = self.entries(leaf).head_id();

        while let Some(id) = cur {
            let entry_length = self.entries(leaf).get(id).length;

            if rel == 0 {
                // Landing at the head of this entry: grow it downward if the
                // source runs chain, otherwise insert before it.
                if !self.entries_mut(leaf).get_mut(id).chain_head(&piece) {
                    self.entries_mut(leaf).insert(nth, piece);
                }
                return;
            }

            if rel == entry_length {
                // Landing exactly between this entry and the next: prefer
                // growing this entry's tail, then the next entry's head,
                // then fall back to a fresh entry after this one.
                let next = self.entries(leaf).next_id(id);
                let mut chained = self.entries_mut(leaf).get_mut(id).chain_tail(&piece);
                if !chained {
                    if let Some(next) = next {
                        chained = self.entries_mut(leaf).get_mut(next).chain_head(&piece);
                    }
                }
                if !chained {
                    self.entries_mut(leaf).insert(nth + 1, piece);
                }
                return;
            }

            if rel < entry_length {
                // Landing strictly inside this entry: carve it into a head
                // remainder and a tail remainder with the new piece between.
                let entry = self.entries_mut(leaf).get_mut(id);
                let tail = Piece::new(entry.kind, entry.offset + rel, entry.length - rel);
                entry.length = rel;
                self.entries_mut(leaf).insert(nth + 1, piece);
                self.entries_mut(leaf).insert(nth + 2, tail);
                return;
            }

            rel -= entry_length;
            nth += 1;
            cur = self.entries(leaf).next_id(id);
        }

        unreachable!("insert position not owned by the searched leaf");
    }

    /// Apply a length delta to every branch entry on the path from `from` up
    /// to the root.
    fn propagate(&mut self, from: NodeIdx, delta: i64) {
        let mut node = from;
        let mut parent = self.parent(from);

        while parent != NONE {
            let nth = self.child_position(parent, node);
            let child = self.children_mut(parent).nth_mut(nth);
            child.length = (child.length as i64 + delta) as u64;
            node = parent;
            parent = self.parent(parent);
        }
    }

    // -------------------------------------------------------------------
    // Delete
    // -------------------------------------------------------------------

    /// Remove `length` virtual bytes starting at `position`.
    ///
    /// Works one entry (or part of one) at a time: each round re-searches,
    /// removes what it can from the owning entry, propagates the delta, and
    /// prunes the leaf if it emptied. An interior trim materializes a tail
    /// remainder, so the leaf gets the same proactive split treatment as
    /// insert before the trim happens.
    pub(crate) fn delete(&mut self, position: u64, length: u64) {
        let mut remaining = length;

        while remaining > 0 {
            let (leaf, rel) = self.search_right(position);

            if self.needs_split(leaf) {
                self.split(leaf);
                continue;
            }

            let removed = self.delete_in_leaf(leaf, rel, remaining);
            debug_assert!(removed > 0 && removed <= remaining);

            self.propagate(leaf, -(removed as i64));
            if self.entries(leaf).is_empty() {
                self.prune_leaf(leaf);
            }

            remaining -= removed;
        }
    }

    /// Remove up to `want` bytes from the entry owning leaf-relative offset
    /// `rel`. Returns how many bytes actually came out.
    fn delete_in_leaf(&mut self, leaf: NodeIdx, mut rel: u64, want: u64) -> u64 {
        let mut nth = 0usize;
        let mut cur = self.entries(leaf).head_id();

        while let Some(id) = cur {
            let entry = *self.entries(leaf).get(id);

            if rel < entry.length {
                let avail = entry.length - rel;

                if rel == 0 && want >= entry.length {
                    // The whole entry goes.
                    self.entries_mut(leaf).remove(nth);
                    return entry.length;
                }
                if rel == 0 {
                    // Trim the head of the entry.
                    let e = self.entries_mut(leaf).get_mut(id);
                    e.offset += want;
                    e.length -= want;
                    return want;
                }
                if want >= avail {
                    // Trim the tail of the entry.
                    self.entries_mut(leaf).get_mut(id).length = rel;
                    return avail;
                }

                // Interior: shrink to the head remainder and materialize the
                // tail remainder after it.
                let tail = Piece::new(
                    entry.kind,
                    entry.offset + rel + want,
                    entry.length - rel - want,
                );
                self.entries_mut(leaf).get_mut(id).length = rel;
                self.entries_mut(leaf).insert(nth + 1, tail);
                return want;
            }

            rel -= entry.length;
            nth += 1;
            cur = self.entries(leaf).next_id(id);
        }

        unreachable!("delete position not owned by the searched leaf");
    }

    /// Drop an emptied leaf: unlink it from the sibling chain, remove it
    /// from its parent, and prune any ancestors that emptied with it. The
    /// last leaf in the tree stays put, restoring the bootstrap shape.
    fn prune_leaf(&mut self, leaf: NodeIdx) {
        let prev = self.leaf_prev(leaf);
        let next = self.leaf_next(leaf);
        if prev == NONE && next == NONE {
            return;
        }

        if prev != NONE {
            self.set_leaf_next(prev, next);
        }
        if next != NONE {
            self.set_leaf_prev(next, prev);
        }

        self.remove_from_parent(leaf);
    }

    fn remove_from_parent(&mut self, node: NodeIdx) {
        let parent = self.parent(node);
        debug_assert!(parent != NONE);

        let nth = self.child_position(parent, node);
        self.children_mut(parent).remove(nth);
        self.release(node);

        // Underflowed branches are left alone; only emptied ones go. The
        // root keeps its last child no matter what.
        if self.children(parent).is_empty() && parent != self.root {
            self.remove_from_parent(parent);
        }
    }

    // -------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------

    /// Snapshot the piece runs covering `[from, from + length)`, trimming
    /// the first and last runs to the range. The caller has validated the
    /// range against the total length.
    pub(crate) fn collect_range(&self, from: u64, length: u64) -> SmallVec<[Piece; 8]> {
        let mut out = SmallVec::new();
        if length == 0 {
            return out;
        }

        let (mut leaf, mut rel) = self.search_right(from);
        let mut remaining = length;
        let mut cur = self.entries(leaf).head_id();

        while remaining > 0 {
            let Some(id) = cur else {
                leaf = self.leaf_next(leaf);
                debug_assert!(leaf != NONE, "range runs past the last leaf");
                cur = self.entries(leaf).head_id();
                continue;
            };

            let entry = *self.entries(leaf).get(id);
            if rel >= entry.length {
                rel -= entry.length;
            } else {
                let take = (entry.length - rel).min(remaining);
                out.push(Piece::new(entry.kind, entry.offset + rel, take));
                remaining -= take;
                rel = 0;
            }
            cur = self.entries(leaf).next_id(id);
        }

        return out;
    }

    /// Iterate every piece in virtual order by walking the sibling chain.
    pub(crate) fn pieces(&self) -> Pieces<'_> {
        let leaf = self.first_leaf();
        return Pieces {
            tree: self,
            leaf,
            entry: self.entries(leaf).head_id(),
        };
    }

    // -------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------

    /// Full structural check. Panics on any violation; a broken tree must
    /// not keep running.
    pub(crate) fn validate(&self) {
        self.validate_node(self.root, NONE);

        // The sibling chain must cover exactly the leaves, in tree order,
        // doubly linked, starting with no predecessor.
        let mut in_tree_order = Vec::new();
        self.collect_leaves(self.root, &mut in_tree_order);

        let mut chain = Vec::new();
        let mut prev = NONE;
        let mut leaf = self.first_leaf();
        while leaf != NONE {
            assert_eq!(self.leaf_prev(leaf), prev, "sibling back-link broken");
            chain.push(leaf);
            prev = leaf;
            leaf = self.leaf_next(leaf);
        }
        assert_eq!(chain, in_tree_order, "sibling chain out of sync with the tree");
    }

    fn validate_node(&self, idx: NodeIdx, parent: NodeIdx) {
        assert_eq!(self.parent(idx), parent, "parent back-link mismatch");

        match &self.nodes[idx as usize].kind {
            NodeKind::Branch { children } => {
                assert!(!children.is_empty(), "branch with no children");
                children.check_links();
                for child in children.iter() {
                    assert!(child.node != NONE);
                    assert_eq!(
                        child.length,
                        self.subtree_length(child.node),
                        "recorded child length out of date",
                    );
                    self.validate_node(child.node, idx);
                }
            }
            NodeKind::Leaf { entries, .. } => {
                entries.check_links();
                for entry in entries.iter() {
                    assert!(entry.length > 0, "zero-length piece entry");
                }
            }
        }
    }

    fn collect_leaves(&self, idx: NodeIdx, out: &mut Vec<NodeIdx>) {
        match &self.nodes[idx as usize].kind {
            NodeKind::Leaf { .. } => out.push(idx),
            NodeKind::Branch { children } => {
                for child in children.iter() {
                    self.collect_leaves(child.node, out);
                }
            }
        }
    }
}

/// Iterator over every piece in virtual order.
pub struct Pieces<'a> {
    tree: &'a PieceTree,
    leaf: NodeIdx,
    entry: Option<u8>,
}

impl<'a> Iterator for Pieces<'a> {
    type Item = Piece;

    fn next(&mut self) -> Option<Piece> {
        while self.leaf != NONE {
            if let Some(id) = self.entry {
                let piece = *self.tree.entries(self.leaf).get(id);
                self.entry = self.tree.entries(self.leaf).next_id(id);
                if self.entry.is_none() {
                    self.advance_leaf();
                }
                return Some(piece);
            }
            // An empty leaf only exists in an empty tree, but skipping keeps
            // the iterator total.
            self.advance_leaf();
        }
        return None;
    }
}

impl<'a> Pieces<'a> {
    fn advance_leaf(&mut self) {
        self.leaf = self.tree.leaf_next(self.leaf);
        if self.leaf != NONE {
            self.entry = self.tree.entries(self.leaf).head_id();
        } else {
            self.entry = None;
        }
    }
}
