//! An ordered map backed by a red-black tree.
//!
//! Besides the tree links, every node sits in a doubly-linked list in key
//! order, so stepping to the neighbouring element and reaching either end of
//! the map are O(1). Nodes live in an arena and never move while they are
//! stored, which lets a [`Position`] outlive mutations of other elements.
#![warn(missing_docs)]

use std::fmt;
use std::ops::Index;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use compare::{Compare, Natural};
use log::debug;

mod rb_error;
mod rb_iter;
mod rb_node;
mod rb_tree;

pub use compare;
pub use rb_error::{Error, IteratorFault, Result};
pub use rb_iter::{Cursor, CursorMut, IntoIter, Iter, IterMut, Keys, Position, Values, ValuesMut};

use rb_node::NodeId;
use rb_tree::{RbTree, Slot};

/// Identity of one map instance, carried by every [`Position`] it hands out.
/// Zero is never assigned and marks an uninitialized position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) struct MapId(u64);

impl MapId {
    fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        MapId(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// An ordered map with unique keys, ordered by the comparator `C`.
///
/// Keys compare equivalent when `C` reports [`Ordering::Equal`]; inserting a
/// key equivalent to a stored one leaves the map unchanged.
///
/// [`Ordering::Equal`]: std::cmp::Ordering::Equal
pub struct RbMap<K, V, C = Natural<K>> {
    id: MapId,
    tree: RbTree<K, V, C>,
}

impl<K: Ord, V> RbMap<K, V> {
    /// Creates an empty map ordered by the natural order of its keys.
    pub fn new() -> Self {
        RbMap::with_cmp(compare::natural())
    }
}

impl<K: Ord, V> Default for RbMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> RbMap<K, V, C> {
    /// Creates an empty map ordered by `cmp`.
    pub fn with_cmp(cmp: C) -> Self {
        RbMap {
            id: MapId::fresh(),
            tree: RbTree::new(cmp),
        }
    }

    /// Returns the number of elements in the map.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns true if the map contains no elements.
    pub fn is_empty(&self) -> bool {
        self.tree.len() == 0
    }

    /// Returns the comparator ordering the keys.
    pub fn comparator(&self) -> &C {
        self.tree.cmp()
    }

    /// Removes every element. Positions taken before become stale.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Position of the smallest element, or [`end`](Self::end) if empty.
    pub fn begin(&self) -> Position {
        self.position_of(self.tree.first())
    }

    /// The past-the-end position.
    pub fn end(&self) -> Position {
        Position::new(self.id, None)
    }

    fn position_of(&self, id: Option<NodeId>) -> Position {
        Position::new(self.id, id.map(|id| self.tree.node_ref(id)))
    }

    /// Checks that `pos` belongs to this map and still refers to a live
    /// element; `Ok(None)` is the end position.
    fn locate(&self, pos: Position) -> Result<Option<NodeId>> {
        if pos.owner != self.id {
            return Err(IteratorFault::ForeignContainer.into());
        }
        match pos.node {
            None => Ok(None),
            Some(node) => self
                .tree
                .resolve(node)
                .map(Some)
                .ok_or(Error::InvalidIterator(IteratorFault::Stale)),
        }
    }

    fn locate_element(&self, pos: Position) -> Result<NodeId> {
        self.locate(pos)?
            .ok_or(Error::InvalidIterator(IteratorFault::PastEnd))
    }

    /// Returns the element at `pos`.
    pub fn get_at(&self, pos: Position) -> Result<(&K, &V)> {
        let node = self.tree.node(self.locate_element(pos)?);
        Ok((&node.key, &node.value))
    }

    /// Returns the element at `pos` with its value writable.
    pub fn get_at_mut(&mut self, pos: Position) -> Result<(&K, &mut V)> {
        let id = self.locate_element(pos)?;
        let node = self.tree.node_mut(id);
        Ok((&node.key, &mut node.value))
    }

    /// Returns the position following `pos`. Fails at the end.
    pub fn next_position(&self, pos: Position) -> Result<Position> {
        let id = self.locate_element(pos)?;
        Ok(self.position_of(self.tree.node(id).rb.next))
    }

    /// Returns the position preceding `pos`. Fails at the beginning; the
    /// predecessor of the end is the largest element.
    pub fn prev_position(&self, pos: Position) -> Result<Position> {
        let prev = match self.locate(pos)? {
            Some(id) => self.tree.node(id).rb.prev,
            None => self.tree.last(),
        };
        match prev {
            Some(id) => Ok(self.position_of(Some(id))),
            None => Err(IteratorFault::BeforeBegin.into()),
        }
    }

    /// Erases the element at `pos` and returns it.
    ///
    /// Fails with [`Error::InvalidIterator`] if `pos` is the end, belongs to
    /// another map, or its element was already erased. Positions of all
    /// other elements stay valid.
    pub fn erase(&mut self, pos: Position) -> Result<(K, V)> {
        let id = self.locate_element(pos)?;
        Ok(self.tree.erase(id))
    }

    /// A read-only cursor starting at `pos`.
    pub fn cursor(&self, pos: Position) -> Cursor<'_, K, V, C> {
        Cursor::new(self, pos)
    }

    /// A cursor starting at `pos` that can change values and erase.
    pub fn cursor_mut(&mut self, pos: Position) -> CursorMut<'_, K, V, C> {
        CursorMut::new(self, pos)
    }

    /// Returns the smallest element.
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        let node = self.tree.node(self.tree.first()?);
        Some((&node.key, &node.value))
    }

    /// Returns the largest element.
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        let node = self.tree.node(self.tree.last()?);
        Some((&node.key, &node.value))
    }

    /// Gets an iterator over the entries of the map, sorted by key.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let (front, back) = (self.tree.first(), self.tree.last());
        Iter::new(self.tree.nodes(), front, back)
    }

    /// Gets a mutable iterator over the entries of the map, sorted by key.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let (front, back) = (self.tree.first(), self.tree.last());
        IterMut::new(self.tree.nodes_mut(), front, back)
    }

    /// Gets an iterator over the keys, in order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys(self.iter())
    }

    /// Gets an iterator over the values, in key order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values(self.iter())
    }

    /// Gets a mutable iterator over the values, in key order.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut(self.iter_mut())
    }
}

impl<K, V, C: Compare<K>> RbMap<K, V, C> {
    /// Inserts `key` with `value` unless an equivalent key is present.
    ///
    /// Returns the position of the element with that key and whether it was
    /// inserted. An existing element keeps its value; `key` and `value` are
    /// dropped in that case.
    pub fn insert(&mut self, key: K, value: V) -> (Position, bool) {
        let (id, inserted) = self.tree.insert(key, value);
        (self.position_of(Some(id)), inserted)
    }

    /// Returns the value for `key`, inserting the result of `default` first
    /// if the key is absent.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, default: F) -> &mut V {
        let id = match self.tree.find_slot(&key) {
            Slot::Found(id) => id,
            Slot::Vacant { parent, side } => self.tree.insert_at(parent, side, key, default()),
        };
        &mut self.tree.node_mut(id).value
    }

    /// Returns the value for `key`, inserting `V::default()` first if the
    /// key is absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }
}

impl<K, V, C> RbMap<K, V, C> {
    /// Returns the position of the element with a key equivalent to `key`,
    /// or [`end`](Self::end).
    pub fn find<Q: ?Sized>(&self, key: &Q) -> Position
    where
        C: Compare<Q, K>,
    {
        match self.tree.find(key) {
            Some(id) => self.position_of(Some(id)),
            None => self.end(),
        }
    }

    /// Returns 1 if an equivalent key is stored, 0 otherwise.
    pub fn count<Q: ?Sized>(&self, key: &Q) -> usize
    where
        C: Compare<Q, K>,
    {
        usize::from(self.tree.find(key).is_some())
    }

    /// Returns true if an equivalent key is stored.
    pub fn contains_key<Q: ?Sized>(&self, key: &Q) -> bool
    where
        C: Compare<Q, K>,
    {
        self.tree.find(key).is_some()
    }

    /// Returns a reference to the value for `key`.
    pub fn get<Q: ?Sized>(&self, key: &Q) -> Option<&V>
    where
        C: Compare<Q, K>,
    {
        self.tree.find(key).map(|id| &self.tree.node(id).value)
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut<Q: ?Sized>(&mut self, key: &Q) -> Option<&mut V>
    where
        C: Compare<Q, K>,
    {
        let id = self.tree.find(key)?;
        Some(&mut self.tree.node_mut(id).value)
    }

    /// Returns a reference to the value for `key`, failing with
    /// [`Error::KeyNotFound`] if it is absent.
    pub fn at<Q: ?Sized>(&self, key: &Q) -> Result<&V>
    where
        C: Compare<Q, K>,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Returns a mutable reference to the value for `key`, failing with
    /// [`Error::KeyNotFound`] if it is absent.
    pub fn at_mut<Q: ?Sized>(&mut self, key: &Q) -> Result<&mut V>
    where
        C: Compare<Q, K>,
    {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    /// Removes `key` from the map, returning its value if it was present.
    pub fn remove<Q: ?Sized>(&mut self, key: &Q) -> Option<V>
    where
        C: Compare<Q, K>,
    {
        let id = self.tree.find(key)?;
        Some(self.tree.erase(id).1)
    }
}

impl<K: Clone, V: Clone, C: Clone> Clone for RbMap<K, V, C> {
    /// Deep copy with its own identity: positions of `self` are foreign to
    /// the copy.
    fn clone(&self) -> Self {
        RbMap {
            id: MapId::fresh(),
            tree: self.tree.clone(),
        }
    }

    /// Releases every node of `self` before copying `source`. The map takes
    /// a new identity, so positions handed out before are rejected.
    fn clone_from(&mut self, source: &Self) {
        debug!(
            "copy-assigning {} elements over {}",
            source.len(),
            self.len()
        );
        self.tree.clone_from(&source.tree);
        self.id = MapId::fresh();
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for RbMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq, C> PartialEq for RbMap<K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq, C> Eq for RbMap<K, V, C> {}

impl<'a, K, V, C, Q: ?Sized> Index<&'a Q> for RbMap<K, V, C>
where
    C: Compare<Q, K>,
{
    type Output = V;

    /// Read-only lookup; never inserts.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present in the map.
    fn index(&self, key: &'a Q) -> &V {
        self.at(key).expect("no entry found for key")
    }
}

impl<K, V, C: Compare<K>> Extend<(K, V)> for RbMap<K, V, C> {
    /// Inserts every pair; pairs whose key is already present are ignored.
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for RbMap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = RbMap::new();
        map.extend(iter);
        map
    }
}

impl<K, V, C> IntoIterator for RbMap<K, V, C> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let (front, back) = (self.tree.first(), self.tree.last());
        IntoIter::new(self.tree.into_nodes(), front, back)
    }
}

impl<'a, K, V, C> IntoIterator for &'a RbMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, C> IntoIterator for &'a mut RbMap<K, V, C> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
