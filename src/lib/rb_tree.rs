use std::cmp::Ordering;

use compare::Compare;
use log::{debug, trace};
use slab::Slab;

use crate::rb_node::{Color, Node, NodeId, NodeRef, RbLinks, Side};

/// Outcome of a key search that may end in an insertion.
pub(super) enum Slot {
    Found(NodeId),
    /// Where a node with the searched key would hang.
    Vacant {
        parent: Option<NodeId>,
        side: Side,
    },
}

/// Red-black tree over an arena of nodes, with every node also threaded
/// into a doubly-linked list in key order.
///
/// The head and tail sentinels of the list are not nodes: `first` and `last`
/// play the role of `head.next` and `tail.prev`.
pub(super) struct RbTree<K, V, C> {
    nodes: Slab<Node<K, V>>,
    root: Option<NodeId>,
    first: Option<NodeId>,
    last: Option<NodeId>,
    next_stamp: u64,
    cmp: C,
}

impl<K, V, C> RbTree<K, V, C> {
    pub(super) fn new(cmp: C) -> Self {
        RbTree {
            nodes: Slab::new(),
            root: None,
            first: None,
            last: None,
            next_stamp: 0,
            cmp,
        }
    }

    pub(super) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(super) fn first(&self) -> Option<NodeId> {
        self.first
    }

    pub(super) fn last(&self) -> Option<NodeId> {
        self.last
    }

    pub(super) fn cmp(&self) -> &C {
        &self.cmp
    }

    pub(super) fn node(&self, id: NodeId) -> &Node<K, V> {
        &self.nodes[id]
    }

    pub(super) fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        &mut self.nodes[id]
    }

    pub(super) fn node_ref(&self, id: NodeId) -> NodeRef {
        NodeRef {
            id,
            stamp: self.nodes[id].stamp,
        }
    }

    /// Resolves a handle, returning `None` if its node has been erased.
    pub(super) fn resolve(&self, node: NodeRef) -> Option<NodeId> {
        self.nodes
            .get(node.id)
            .filter(|n| n.stamp == node.stamp)
            .map(|_| node.id)
    }

    pub(super) fn nodes(&self) -> &Slab<Node<K, V>> {
        &self.nodes
    }

    pub(super) fn nodes_mut(&mut self) -> &mut Slab<Node<K, V>> {
        &mut self.nodes
    }

    pub(super) fn into_nodes(self) -> Slab<Node<K, V>> {
        self.nodes
    }

    /// Drops every node. Slots are released through the arena in one pass,
    /// so no link is followed after its target is gone.
    pub(super) fn clear(&mut self) {
        if !self.nodes.is_empty() {
            debug!("releasing {} nodes", self.nodes.len());
        }
        self.nodes.clear();
        self.root = None;
        self.first = None;
        self.last = None;
    }

    fn links(&self, id: NodeId) -> &RbLinks {
        &self.nodes[id].rb
    }

    fn links_mut(&mut self, id: NodeId) -> &mut RbLinks {
        &mut self.nodes[id].rb
    }

    fn is_red(&self, id: Option<NodeId>) -> bool {
        id.map_or(false, |id| self.links(id).color == Color::Red)
    }

    fn set_color(&mut self, id: NodeId, color: Color) {
        self.links_mut(id).color = color;
    }

    fn sibling(&self, id: NodeId) -> Option<NodeId> {
        let links = self.links(id);
        links
            .parent
            .and_then(|p| self.links(p).child(links.side.flip()))
    }

    /// Makes `next` follow `prev` in the list; `None` stands for a sentinel.
    fn link(&mut self, prev: Option<NodeId>, next: Option<NodeId>) {
        match prev {
            Some(p) => self.links_mut(p).next = next,
            None => self.first = next,
        }
        match next {
            Some(n) => self.links_mut(n).prev = prev,
            None => self.last = prev,
        }
    }

    /// Hangs `child` under `parent` on `side`, or makes it the root.
    fn attach(&mut self, parent: Option<NodeId>, side: Side, child: Option<NodeId>) {
        match parent {
            Some(p) => self.links_mut(p).children[side.index()] = child,
            None => self.root = child,
        }
        if let Some(c) = child {
            let links = self.links_mut(c);
            links.parent = parent;
            links.side = side;
        }
    }

    /// Points every neighbour of `id` back at it.
    fn relink(&mut self, id: NodeId) {
        let links = *self.links(id);
        self.link(links.prev, Some(id));
        self.link(Some(id), links.next);
        self.attach(links.parent, links.side, Some(id));
        self.attach(Some(id), Side::Left, links.children[0]);
        self.attach(Some(id), Side::Right, links.children[1]);
    }

    /// Single rotation around `pivot`: its child on the `dir.flip()` side
    /// takes its place and `pivot` becomes that child's `dir` child.
    fn rotate(&mut self, pivot: NodeId, dir: Side) {
        let pivot_links = *self.links(pivot);
        let up = pivot_links
            .child(dir.flip())
            .expect("rotation needs a child to promote");
        let inner = self.links(up).child(dir);
        self.attach(Some(pivot), dir.flip(), inner);
        self.attach(pivot_links.parent, pivot_links.side, Some(up));
        self.attach(Some(up), dir, Some(pivot));
    }

    /// Exchanges the tree and list positions of two nodes, leaving their
    /// payloads in place.
    fn swap_positions(&mut self, a: NodeId, b: NodeId) {
        let la = *self.links(a);
        let lb = *self.links(b);
        *self.links_mut(a) = lb.retarget(a, b);
        *self.links_mut(b) = la.retarget(b, a);
        self.relink(a);
        self.relink(b);
    }

    fn insert_rebalance(&mut self, mut node: NodeId) {
        loop {
            let Some(parent) = self.links(node).parent else {
                trace!("node {} becomes the root", node);
                self.set_color(node, Color::Black);
                return;
            };
            if self.links(parent).color == Color::Black {
                return;
            }
            let grand = self
                .links(parent)
                .parent
                .expect("a red node is never the root");
            let parent_side = self.links(parent).side;
            let uncle = self.links(grand).child(parent_side.flip());

            if let Some(uncle) = uncle.filter(|&u| self.is_red(Some(u))) {
                self.set_color(parent, Color::Black);
                self.set_color(uncle, Color::Black);
                self.set_color(grand, Color::Red);
                node = grand;
                continue;
            }

            let node_side = self.links(node).side;
            if node_side == parent_side {
                self.set_color(parent, Color::Black);
                self.set_color(grand, Color::Red);
                self.rotate(grand, parent_side.flip());
            } else {
                self.set_color(node, Color::Black);
                self.set_color(grand, Color::Red);
                self.rotate(parent, node_side.flip());
                self.rotate(grand, parent_side.flip());
            }
            return;
        }
    }

    /// Restores the black height around `target`, a node with at most one
    /// child that is about to be unlinked. Must run while it is still linked.
    fn erase_rebalance(&mut self, target: NodeId) {
        let links = *self.links(target);
        if links.color == Color::Red {
            return;
        }
        if let Some(child) = links.sole_child().filter(|&c| self.is_red(Some(c))) {
            self.set_color(child, Color::Black);
            return;
        }

        let mut node = target;
        loop {
            let Some(parent) = self.links(node).parent else {
                self.set_color(node, Color::Black);
                return;
            };
            let side = self.links(node).side;
            let mut brother = self
                .sibling(node)
                .expect("a black non-root node has a sibling");

            if self.links(parent).color == Color::Black
                && self.links(brother).color == Color::Black
                && !self.is_red(self.links(brother).child(Side::Left))
                && !self.is_red(self.links(brother).child(Side::Right))
            {
                self.set_color(brother, Color::Red);
                node = parent;
                continue;
            }

            if self.links(brother).color == Color::Red {
                self.set_color(parent, Color::Red);
                self.set_color(brother, Color::Black);
                self.rotate(parent, side);
                brother = self
                    .sibling(node)
                    .expect("rotation leaves a sibling in place");
            }

            let near = self.links(brother).child(side);
            let far = self.links(brother).child(side.flip());

            if self.links(parent).color == Color::Red && !self.is_red(near) && !self.is_red(far) {
                self.set_color(parent, Color::Black);
                self.set_color(brother, Color::Red);
                return;
            }

            if !self.is_red(far) {
                let near = near.expect("a red near cousin exists when the far one is black");
                self.set_color(near, Color::Black);
                self.set_color(brother, Color::Red);
                self.rotate(brother, side.flip());
                brother = self
                    .sibling(node)
                    .expect("rotation leaves a sibling in place");
            }

            let parent_color = self.links(parent).color;
            self.set_color(parent, self.links(brother).color);
            self.set_color(brother, parent_color);
            if let Some(far) = self.links(brother).child(side.flip()) {
                self.set_color(far, Color::Black);
            }
            self.rotate(parent, side);
            return;
        }
    }

    /// Unlinks `id` from the tree and the list and returns its payload.
    pub(super) fn erase(&mut self, id: NodeId) -> (K, V) {
        if self.links(id).has_two_children() {
            let successor = self
                .links(id)
                .next
                .expect("a node with a right subtree has a successor");
            trace!("node {} trades places with successor {}", id, successor);
            self.swap_positions(id, successor);
        }
        self.erase_rebalance(id);

        let links = *self.links(id);
        self.link(links.prev, links.next);
        self.attach(links.parent, links.side, links.sole_child());
        let node = self.nodes.remove(id);
        (node.key, node.value)
    }

    /// Links a new red leaf at `parent`/`side` and rebalances.
    pub(super) fn insert_at(
        &mut self,
        parent: Option<NodeId>,
        side: Side,
        key: K,
        value: V,
    ) -> NodeId {
        let (prev, next) = match parent {
            None => (None, None),
            Some(p) => match side {
                Side::Left => (self.links(p).prev, Some(p)),
                Side::Right => (Some(p), self.links(p).next),
            },
        };
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        let id = self
            .nodes
            .insert(Node::leaf(key, value, stamp, parent, side, prev, next));
        self.link(prev, Some(id));
        self.link(Some(id), next);
        self.attach(parent, side, Some(id));
        self.insert_rebalance(id);
        id
    }

    /// Looks up `key` without creating anything.
    pub(super) fn find<Q: ?Sized>(&self, key: &Q) -> Option<NodeId>
    where
        C: Compare<Q, K>,
    {
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            cur = match self.cmp.compare(key, &node.key) {
                Ordering::Less => node.rb.child(Side::Left),
                Ordering::Greater => node.rb.child(Side::Right),
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    pub(super) fn find_slot(&self, key: &K) -> Slot
    where
        C: Compare<K>,
    {
        let mut parent = None;
        let mut side = Side::Left;
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            side = match self.cmp.compare(key, &node.key) {
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
                Ordering::Equal => return Slot::Found(id),
            };
            parent = Some(id);
            cur = node.rb.child(side);
        }
        Slot::Vacant { parent, side }
    }

    /// Inserts unless an equivalent key is present; the flag tells which.
    pub(super) fn insert(&mut self, key: K, value: V) -> (NodeId, bool)
    where
        C: Compare<K>,
    {
        match self.find_slot(&key) {
            Slot::Found(id) => (id, false),
            Slot::Vacant { parent, side } => (self.insert_at(parent, side, key, value), true),
        }
    }
}

impl<K: Clone, V: Clone, C: Clone> Clone for RbTree<K, V, C> {
    /// Slot-for-slot copy, so shape, colors and list order carry over as is.
    fn clone(&self) -> Self {
        RbTree {
            nodes: self.nodes.clone(),
            root: self.root,
            first: self.first,
            last: self.last,
            next_stamp: self.next_stamp,
            cmp: self.cmp.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.clear();
        self.nodes.clone_from(&source.nodes);
        self.root = source.root;
        self.first = source.first;
        self.last = source.last;
        self.next_stamp = self.next_stamp.max(source.next_stamp);
        self.cmp = source.cmp.clone();
    }
}

#[cfg(test)]
impl<K: std::fmt::Debug, V, C: Compare<K>> RbTree<K, V, C> {
    /// Checks every structural invariant, returning a description of the
    /// first violation found.
    pub(super) fn check_invariants(&self) -> Result<(), String> {
        let mut in_order = Vec::with_capacity(self.len());
        if let Some(root) = self.root {
            let links = self.links(root);
            if links.color != Color::Black {
                return Err(format!("root {:?} is red", self.nodes[root].key));
            }
            if links.parent.is_some() {
                return Err("root has a parent".to_string());
            }
            self.check_subtree(root, &mut in_order)?;
        }
        if in_order.len() != self.len() {
            return Err(format!(
                "{} nodes reachable from the root but len() is {}",
                in_order.len(),
                self.len()
            ));
        }

        let mut listed = Vec::with_capacity(self.len());
        let mut prev = None;
        let mut cur = self.first;
        while let Some(id) = cur {
            if self.links(id).prev != prev {
                return Err(format!("broken prev link at {:?}", self.nodes[id].key));
            }
            if listed.len() > self.len() {
                return Err("list is longer than the tree".to_string());
            }
            listed.push(id);
            prev = cur;
            cur = self.links(id).next;
        }
        if self.last != prev {
            return Err("last does not match the end of the list".to_string());
        }
        if listed != in_order {
            return Err("list order differs from in-order traversal".to_string());
        }
        for pair in in_order.windows(2) {
            let (a, b) = (&self.nodes[pair[0]].key, &self.nodes[pair[1]].key);
            if self.cmp.compare(a, b) != Ordering::Less {
                return Err(format!("keys out of order: {:?} then {:?}", a, b));
            }
        }
        Ok(())
    }

    /// Returns the black height of the subtree at `id`.
    fn check_subtree(&self, id: NodeId, in_order: &mut Vec<NodeId>) -> Result<usize, String> {
        let links = *self.links(id);
        let mut heights = [1, 1];
        for side in [Side::Left, Side::Right] {
            let Some(child) = links.child(side) else {
                if side == Side::Right {
                    in_order.push(id);
                }
                continue;
            };
            let child_links = self.links(child);
            if child_links.parent != Some(id) || child_links.side != side {
                return Err(format!(
                    "child {:?} has stale parent or side",
                    self.nodes[child].key
                ));
            }
            if links.color == Color::Red && child_links.color == Color::Red {
                return Err(format!(
                    "red node {:?} has red child {:?}",
                    self.nodes[id].key, self.nodes[child].key
                ));
            }
            if side == Side::Right {
                in_order.push(id);
            }
            heights[side.index()] = self.check_subtree(child, in_order)?;
        }
        if heights[0] != heights[1] {
            return Err(format!(
                "black heights differ under {:?}: {} vs {}",
                self.nodes[id].key, heights[0], heights[1]
            ));
        }
        Ok(heights[0] + usize::from(links.color == Color::Black))
    }

    pub(super) fn height(&self) -> usize {
        fn depth<K, V, C>(tree: &RbTree<K, V, C>, id: Option<NodeId>) -> usize {
            id.map_or(0, |id| {
                let links = tree.links(id);
                1 + depth(tree, links.child(Side::Left)).max(depth(tree, links.child(Side::Right)))
            })
        }
        depth(self, self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compare::Natural;

    fn tree_of(keys: &[u32]) -> RbTree<u32, u32, Natural<u32>> {
        let mut tree = RbTree::new(compare::natural());
        for &k in keys {
            tree.insert(k, k * 10);
            tree.check_invariants().unwrap();
        }
        tree
    }

    fn keys_in_list_order<V, C>(tree: &RbTree<u32, V, C>) -> Vec<u32> {
        let mut keys = Vec::new();
        let mut cur = tree.first();
        while let Some(id) = cur {
            keys.push(tree.node(id).key);
            cur = tree.node(id).rb.next;
        }
        keys
    }

    fn keys_in_reverse<V, C>(tree: &RbTree<u32, V, C>) -> Vec<u32> {
        let mut keys = Vec::new();
        let mut cur = tree.last();
        while let Some(id) = cur {
            keys.push(tree.node(id).key);
            cur = tree.node(id).rb.prev;
        }
        keys
    }

    fn erase_key(tree: &mut RbTree<u32, u32, Natural<u32>>, key: u32) -> (u32, u32) {
        let id = tree.find(&key).unwrap();
        let out = tree.erase(id);
        tree.check_invariants().unwrap();
        out
    }

    #[test]
    fn first_node_becomes_black_root() {
        let tree = tree_of(&[7]);
        let root = tree.root.unwrap();
        assert_eq!(tree.links(root).color, Color::Black);
        assert_eq!(tree.first(), Some(root));
        assert_eq!(tree.last(), Some(root));
    }

    #[test]
    fn duplicate_insert_keeps_existing_node() {
        let mut tree = tree_of(&[1, 2, 3]);
        let existing = tree.find(&2).unwrap();
        let (id, inserted) = tree.insert(2, 999);
        assert!(!inserted);
        assert_eq!(id, existing);
        assert_eq!(tree.node(id).value, 20);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn single_rotation_on_ascending_run() {
        let tree = tree_of(&[1, 2, 3]);
        let root = tree.root.unwrap();
        assert_eq!(tree.node(root).key, 2);
        assert_eq!(keys_in_list_order(&tree), vec![1, 2, 3]);
    }

    #[test]
    fn double_rotation_on_zigzag() {
        let tree = tree_of(&[3, 1, 2]);
        let root = tree.root.unwrap();
        assert_eq!(tree.node(root).key, 2);
        assert_eq!(tree.links(root).color, Color::Black);
        let left = tree.links(root).child(Side::Left).unwrap();
        let right = tree.links(root).child(Side::Right).unwrap();
        assert_eq!(tree.node(left).key, 1);
        assert_eq!(tree.node(right).key, 3);
        assert_eq!(tree.links(left).color, Color::Red);
        assert_eq!(tree.links(right).color, Color::Red);
    }

    #[test]
    fn red_uncle_pushes_recolor_upward() {
        let tree = tree_of(&[10, 5, 15, 1]);
        let root = tree.root.unwrap();
        assert_eq!(tree.node(root).key, 10);
        let five = tree.find(&5).unwrap();
        let fifteen = tree.find(&15).unwrap();
        assert_eq!(tree.links(five).color, Color::Black);
        assert_eq!(tree.links(fifteen).color, Color::Black);
        assert_eq!(tree.links(tree.find(&1).unwrap()).color, Color::Red);
    }

    #[test]
    fn rotate_preserves_order_and_back_links() {
        let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);
        let root = tree.root.unwrap();
        tree.rotate(root, Side::Left);
        let new_root = tree.root.unwrap();
        assert_eq!(tree.node(new_root).key, 6);
        assert_eq!(tree.links(root).parent, Some(new_root));
        assert_eq!(tree.links(root).side, Side::Left);
        let moved = tree.find(&5).unwrap();
        assert_eq!(tree.links(moved).parent, Some(root));
        assert_eq!(tree.links(moved).side, Side::Right);
        assert_eq!(keys_in_list_order(&tree), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn erase_red_leaf() {
        let mut tree = tree_of(&[2, 1, 3]);
        assert_eq!(erase_key(&mut tree, 3), (3, 30));
        assert_eq!(keys_in_list_order(&tree), vec![1, 2]);
    }

    #[test]
    fn erase_black_node_with_red_child() {
        let mut tree = tree_of(&[10, 5, 15, 1]);
        let five = tree.find(&5).unwrap();
        assert_eq!(tree.links(five).color, Color::Black);
        erase_key(&mut tree, 5);
        let one = tree.find(&1).unwrap();
        assert_eq!(tree.links(one).color, Color::Black);
        assert_eq!(keys_in_list_order(&tree), vec![1, 10, 15]);
    }

    #[test]
    fn erase_root_with_two_children() {
        let mut tree = tree_of(&[5, 3, 8, 1, 4, 7, 9]);
        let six = tree.insert(6, 60).0;
        erase_key(&mut tree, 5);
        assert_eq!(keys_in_list_order(&tree), vec![1, 3, 4, 6, 7, 8, 9]);
        assert_eq!(keys_in_reverse(&tree), vec![9, 8, 7, 6, 4, 3, 1]);
        assert_eq!(tree.find(&5), None);
        // payload of the successor never moves
        assert_eq!(tree.node(six).key, 6);
    }

    #[test]
    fn erase_when_successor_is_right_child() {
        let mut tree = tree_of(&[2, 1, 3]);
        let three = tree.find(&3).unwrap();
        erase_key(&mut tree, 2);
        assert_eq!(tree.root, Some(three));
        assert_eq!(tree.links(three).color, Color::Black);
        assert_eq!(keys_in_list_order(&tree), vec![1, 3]);
    }

    #[test]
    fn erase_black_leaf_with_black_sibling_pushes_up() {
        let mut tree = tree_of(&[1, 2, 3, 4, 5, 6, 7, 8]);
        for k in [8, 1, 3, 2, 7, 4, 6, 5] {
            erase_key(&mut tree, k);
        }
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.root, None);
        assert_eq!(tree.first(), None);
        assert_eq!(tree.last(), None);
    }

    #[test]
    fn stale_handle_does_not_resolve_after_slot_reuse() {
        let mut tree = tree_of(&[1, 2]);
        let handle = tree.node_ref(tree.find(&1).unwrap());
        erase_key(&mut tree, 1);
        let (reused, _) = tree.insert(0, 0);
        assert_eq!(reused, handle.id);
        assert_eq!(tree.resolve(handle), None);
        assert_eq!(tree.resolve(tree.node_ref(reused)), Some(reused));
    }

    #[test]
    fn height_stays_logarithmic() {
        let keys: Vec<u32> = (0..1024).collect();
        let tree = tree_of(&keys);
        // 2 * log2(n + 1)
        assert!(tree.height() <= 20, "height {}", tree.height());
    }

    #[test]
    fn clone_from_replaces_contents() {
        let source = tree_of(&[4, 8, 15]);
        let mut target = tree_of(&[16, 23, 42, 99]);
        target.clone_from(&source);
        target.check_invariants().unwrap();
        assert_eq!(keys_in_list_order(&target), vec![4, 8, 15]);
        assert_eq!(target.len(), 3);
    }

    #[test]
    fn clear_resets_sentinels() {
        let mut tree = tree_of(&[3, 1, 2]);
        tree.clear();
        tree.check_invariants().unwrap();
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.first(), None);
        assert_eq!(tree.last(), None);
        tree.insert(5, 50);
        tree.check_invariants().unwrap();
    }
}
