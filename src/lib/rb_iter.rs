use std::iter::FusedIterator;

use slab::Slab;

use crate::rb_error::Result;
use crate::rb_node::{Node, NodeId, NodeRef};
use crate::{MapId, RbMap};

/// A detached iterator into an [`RbMap`]: the map it came from plus an
/// element of that map, or the past-the-end position.
///
/// A position does not borrow the map, so it can be kept across mutations
/// and handed back to [`RbMap::erase`] or [`RbMap::cursor_mut`]. It stays
/// valid until its own element is erased; erasing other elements never
/// moves it. `Position::default()` is an uninitialized position that every
/// map rejects.
///
/// Two positions are equal when they come from the same map and denote the
/// same element, or are both that map's past-the-end position.
#[derive(Clone, Copy, Debug, Default)]
pub struct Position {
    pub(crate) owner: MapId,
    pub(crate) node: Option<NodeRef>,
}

impl Position {
    pub(crate) fn new(owner: MapId, node: Option<NodeRef>) -> Self {
        Position { owner, node }
    }

    /// Returns true for the past-the-end position (and uninitialized ones).
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.node == other.node
    }
}

impl Eq for Position {}

/// Read-only cursor over an [`RbMap`], moving in key order.
pub struct Cursor<'a, K, V, C> {
    map: &'a RbMap<K, V, C>,
    pos: Position,
}

impl<'a, K, V, C> Cursor<'a, K, V, C> {
    pub(crate) fn new(map: &'a RbMap<K, V, C>, pos: Position) -> Self {
        Cursor { map, pos }
    }

    /// The position the cursor is at.
    pub fn position(&self) -> Position {
        self.pos
    }

    /// The element under the cursor.
    pub fn get(&self) -> Result<(&'a K, &'a V)> {
        self.map.get_at(self.pos)
    }

    /// The key under the cursor.
    pub fn key(&self) -> Result<&'a K> {
        self.get().map(|(k, _)| k)
    }

    /// The value under the cursor.
    pub fn value(&self) -> Result<&'a V> {
        self.get().map(|(_, v)| v)
    }

    /// Moves to the next element, or to the end after the last one.
    pub fn move_next(&mut self) -> Result<()> {
        self.pos = self.map.next_position(self.pos)?;
        Ok(())
    }

    /// Moves to the previous element; from the end this is the last one.
    pub fn move_prev(&mut self) -> Result<()> {
        self.pos = self.map.prev_position(self.pos)?;
        Ok(())
    }
}

impl<'a, K, V, C> Clone for Cursor<'a, K, V, C> {
    fn clone(&self) -> Self {
        Cursor {
            map: self.map,
            pos: self.pos,
        }
    }
}

/// Cursor over an [`RbMap`] that can modify values and erase elements.
pub struct CursorMut<'a, K, V, C> {
    map: &'a mut RbMap<K, V, C>,
    pos: Position,
}

impl<'a, K, V, C> CursorMut<'a, K, V, C> {
    pub(crate) fn new(map: &'a mut RbMap<K, V, C>, pos: Position) -> Self {
        CursorMut { map, pos }
    }

    /// The position the cursor is at.
    pub fn position(&self) -> Position {
        self.pos
    }

    /// The element under the cursor.
    pub fn get(&self) -> Result<(&K, &V)> {
        self.map.get_at(self.pos)
    }

    /// The element under the cursor, with its value writable.
    pub fn get_mut(&mut self) -> Result<(&K, &mut V)> {
        self.map.get_at_mut(self.pos)
    }

    /// The value under the cursor, writable.
    pub fn value_mut(&mut self) -> Result<&mut V> {
        self.get_mut().map(|(_, v)| v)
    }

    /// Moves to the next element, or to the end after the last one.
    pub fn move_next(&mut self) -> Result<()> {
        self.pos = self.map.next_position(self.pos)?;
        Ok(())
    }

    /// Moves to the previous element; from the end this is the last one.
    pub fn move_prev(&mut self) -> Result<()> {
        self.pos = self.map.prev_position(self.pos)?;
        Ok(())
    }

    /// Erases the element under the cursor and moves to its successor.
    pub fn remove(&mut self) -> Result<(K, V)> {
        let next = self.map.next_position(self.pos)?;
        let removed = self.map.erase(self.pos)?;
        self.pos = next;
        Ok(removed)
    }
}

/// Iterator over the entries of an [`RbMap`] in key order.
pub struct Iter<'a, K, V> {
    nodes: &'a Slab<Node<K, V>>,
    front: Option<NodeId>,
    back: Option<NodeId>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(
        nodes: &'a Slab<Node<K, V>>,
        front: Option<NodeId>,
        back: Option<NodeId>,
    ) -> Self {
        Iter {
            nodes,
            front,
            back,
            remaining: nodes.len(),
        }
    }
}

impl<'a, K, V> Clone for Iter<'a, K, V> {
    fn clone(&self) -> Self {
        Iter {
            nodes: self.nodes,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.nodes[self.front?];
        self.front = node.rb.next;
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.nodes[self.back?];
        self.back = node.rb.prev;
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}

impl<'a, K, V> FusedIterator for Iter<'a, K, V> {}

/// Mutable iterator over the entries of an [`RbMap`] in key order.
///
/// Building it indexes the arena once so that each node can be handed out
/// mutably exactly one time. That costs O(n) time and a table as long as the
/// highest occupied slot, paid up front even if only one item is taken.
pub struct IterMut<'a, K, V> {
    table: Vec<Option<&'a mut Node<K, V>>>,
    front: Option<NodeId>,
    back: Option<NodeId>,
    remaining: usize,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new(
        nodes: &'a mut Slab<Node<K, V>>,
        front: Option<NodeId>,
        back: Option<NodeId>,
    ) -> Self {
        let remaining = nodes.len();
        let mut table = Vec::new();
        for (id, node) in nodes.iter_mut() {
            if table.len() <= id {
                table.resize_with(id + 1, || None);
            }
            table[id] = Some(node);
        }
        IterMut {
            table,
            front,
            back,
            remaining,
        }
    }

    fn take(&mut self, id: NodeId) -> Option<&'a mut Node<K, V>> {
        self.table.get_mut(id)?.take()
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.front?;
        let Node { key, value, rb, .. } = self.take(id)?;
        self.front = rb.next;
        self.remaining -= 1;
        Some((&*key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.back?;
        let Node { key, value, rb, .. } = self.take(id)?;
        self.back = rb.prev;
        self.remaining -= 1;
        Some((&*key, value))
    }
}

impl<'a, K, V> ExactSizeIterator for IterMut<'a, K, V> {}

impl<'a, K, V> FusedIterator for IterMut<'a, K, V> {}

/// Owning iterator over the entries of an [`RbMap`] in key order.
pub struct IntoIter<K, V> {
    nodes: Slab<Node<K, V>>,
    front: Option<NodeId>,
    back: Option<NodeId>,
}

impl<K, V> IntoIter<K, V> {
    pub(crate) fn new(
        nodes: Slab<Node<K, V>>,
        front: Option<NodeId>,
        back: Option<NodeId>,
    ) -> Self {
        IntoIter { nodes, front, back }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.nodes.is_empty() {
            return None;
        }
        let node = self.nodes.try_remove(self.front?)?;
        self.front = node.rb.next;
        Some((node.key, node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.nodes.len(), Some(self.nodes.len()))
    }
}

impl<K, V> DoubleEndedIterator for IntoIter<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.nodes.is_empty() {
            return None;
        }
        let node = self.nodes.try_remove(self.back?)?;
        self.back = node.rb.prev;
        Some((node.key, node.value))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

impl<K, V> FusedIterator for IntoIter<K, V> {}

/// Iterator over the keys of an [`RbMap`] in order.
pub struct Keys<'a, K, V>(pub(crate) Iter<'a, K, V>);

impl<'a, K, V> Clone for Keys<'a, K, V> {
    fn clone(&self) -> Self {
        Keys(self.0.clone())
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for Keys<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(k, _)| k)
    }
}

impl<'a, K, V> ExactSizeIterator for Keys<'a, K, V> {}

impl<'a, K, V> FusedIterator for Keys<'a, K, V> {}

/// Iterator over the values of an [`RbMap`] in key order.
pub struct Values<'a, K, V>(pub(crate) Iter<'a, K, V>);

impl<'a, K, V> Clone for Values<'a, K, V> {
    fn clone(&self) -> Self {
        Values(self.0.clone())
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for Values<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(_, v)| v)
    }
}

impl<'a, K, V> ExactSizeIterator for Values<'a, K, V> {}

impl<'a, K, V> FusedIterator for Values<'a, K, V> {}

/// Mutable iterator over the values of an [`RbMap`] in key order.
pub struct ValuesMut<'a, K, V>(pub(crate) IterMut<'a, K, V>);

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for ValuesMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(_, v)| v)
    }
}

impl<'a, K, V> ExactSizeIterator for ValuesMut<'a, K, V> {}

impl<'a, K, V> FusedIterator for ValuesMut<'a, K, V> {}
