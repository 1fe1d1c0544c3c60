/// Index of a node slot in the tree's arena.
pub(super) type NodeId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Color {
    Red,
    Black,
}

/// Which child slot of its parent a node occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Side {
    Left = 0,
    Right = 1,
}

impl Side {
    pub(super) fn flip(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub(super) fn index(self) -> usize {
        self as usize
    }
}

/// Structural part of a node: its place in the tree and in the ordered list.
///
/// `prev == None` stands for the head sentinel and `next == None` for the tail
/// sentinel. Erasing a node with two children exchanges these links between
/// the node and its successor while the payloads stay where they are.
#[derive(Clone, Copy, Debug)]
pub(super) struct RbLinks {
    pub(super) color: Color,
    pub(super) side: Side,
    pub(super) parent: Option<NodeId>,
    pub(super) children: [Option<NodeId>; 2],
    pub(super) prev: Option<NodeId>,
    pub(super) next: Option<NodeId>,
}

impl RbLinks {
    pub(super) fn child(&self, side: Side) -> Option<NodeId> {
        self.children[side.index()]
    }

    /// The only child of a node with at most one child.
    pub(super) fn sole_child(&self) -> Option<NodeId> {
        self.children[0].or(self.children[1])
    }

    pub(super) fn has_two_children(&self) -> bool {
        self.children[0].is_some() && self.children[1].is_some()
    }

    /// Rewrites every link equal to `from` into `to`.
    pub(super) fn retarget(mut self, from: NodeId, to: NodeId) -> Self {
        let fix = |link: &mut Option<NodeId>| {
            if *link == Some(from) {
                *link = Some(to);
            }
        };
        fix(&mut self.parent);
        fix(&mut self.children[0]);
        fix(&mut self.children[1]);
        fix(&mut self.prev);
        fix(&mut self.next);
        self
    }
}

#[derive(Clone, Debug)]
pub(super) struct Node<K, V> {
    pub(super) key: K,
    pub(super) value: V,
    pub(super) stamp: u64,
    pub(super) rb: RbLinks,
}

impl<K, V> Node<K, V> {
    /// A red leaf hanging off `parent` on `side`, between `prev` and `next`.
    pub(super) fn leaf(
        key: K,
        value: V,
        stamp: u64,
        parent: Option<NodeId>,
        side: Side,
        prev: Option<NodeId>,
        next: Option<NodeId>,
    ) -> Self {
        Node {
            key,
            value,
            stamp,
            rb: RbLinks {
                color: Color::Red,
                side,
                parent,
                children: [None, None],
                prev,
                next,
            },
        }
    }
}

/// Generational handle to a node: the slot plus the stamp the node was
/// created with, so a reused slot is not mistaken for the erased node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(super) struct NodeRef {
    pub(super) id: NodeId,
    pub(super) stamp: u64,
}
