// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dual-keyed ordered item index.
//!
//! [`OrderedItemIndex`] keeps two views over one item set:
//!
//! - the *order view*, sorted by `(sort_key, id)`, and
//! - the *identity view*, sorted by `id`.
//!
//! Sort keys may repeat. Items with equal sort keys are ordered by their
//! identity key, so repeated range queries over unchanged data always yield the
//! same sequence regardless of insertion order.
//!
//! Both views are private; every mutation goes through the index so they can
//! never disagree.
//!
//! ```rust
//! use understory_flyweight_list::{Cursor, Direction, OrderedItemIndex};
//!
//! let mut index = OrderedItemIndex::new();
//! index.insert(20_u32, 'b', "second").unwrap();
//! index.insert(10_u32, 'z', "first").unwrap();
//! index.insert(20_u32, 'a', "tied").unwrap();
//!
//! let ids: Vec<char> = index
//!     .range(Cursor::Edge, Direction::After, 10)
//!     .map(|(_, id, _)| *id)
//!     .collect();
//! assert_eq!(ids, ['z', 'a', 'b']);
//! ```

use alloc::collections::{BTreeMap, BTreeSet, btree_map, btree_set};
use core::ops::Bound;

use crate::error::IndexError;

/// Which way to walk the order view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Toward the beginning of the list (smaller sort keys).
    Before,
    /// Toward the end of the list (larger sort keys).
    After,
}

impl Direction {
    /// The other direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Before => Self::After,
            Self::After => Self::Before,
        }
    }

    pub(crate) const fn slot(self) -> usize {
        match self {
            Self::Before => 0,
            Self::After => 1,
        }
    }
}

/// Starting point of a [`OrderedItemIndex::range`] query.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cursor<'a, K, I> {
    /// Start at the list edge the walk moves away from: the first item when
    /// walking [`Direction::After`], the last item when walking
    /// [`Direction::Before`].
    Edge,
    /// Start at the given item, yielding it first.
    Including(&'a I),
    /// Start next to the given item, skipping it.
    Excluding(&'a I),
    /// Start at the first item whose sort key is at least the given one when
    /// walking [`Direction::After`], or the last whose sort key is at most it
    /// when walking [`Direction::Before`]. Every item sharing the key is
    /// included.
    SortKey(&'a K),
}

/// Identity half of an order-view entry.
///
/// `Start` and `End` never name stored items; they bracket every identity
/// under one sort key so the order view can be sliced by sort key alone.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Position<I> {
    Start,
    Item(I),
    End,
}

impl<I> Position<I> {
    fn id(&self) -> Option<&I> {
        match self {
            Self::Item(id) => Some(id),
            Self::Start | Self::End => None,
        }
    }
}

#[derive(Clone, Debug)]
struct Slot<K, V> {
    sort_key: K,
    value: V,
}

/// Ordered container keyed both by sort key and by identity key.
///
/// Insert, erase, and lookup are `O(log n)`. Range iteration is lazy and costs
/// `O(log n)` per yielded item.
#[derive(Clone, Debug)]
pub struct OrderedItemIndex<K, I, V> {
    order: BTreeSet<(K, Position<I>)>,
    by_id: BTreeMap<I, Slot<K, V>>,
}

impl<K, I, V> Default for OrderedItemIndex<K, I, V>
where
    K: Ord + Clone,
    I: Ord + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, I, V> OrderedItemIndex<K, I, V>
where
    K: Ord + Clone,
    I: Ord + Clone,
{
    /// Creates an empty index.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            order: BTreeSet::new(),
            by_id: BTreeMap::new(),
        }
    }

    /// Number of indexed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` if no items are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Inserts an item into both views.
    ///
    /// Fails with [`IndexError::DuplicateIdentity`] if `id` is already present;
    /// the index is left unchanged in that case.
    pub fn insert(&mut self, sort_key: K, id: I, value: V) -> Result<(), IndexError> {
        match self.by_id.entry(id.clone()) {
            btree_map::Entry::Occupied(_) => Err(IndexError::DuplicateIdentity),
            btree_map::Entry::Vacant(vacant) => {
                self.order.insert((sort_key.clone(), Position::Item(id)));
                vacant.insert(Slot { sort_key, value });
                Ok(())
            }
        }
    }

    /// Removes an item from both views, returning its sort key and value.
    ///
    /// Absent ids are a no-op and return `None`.
    pub fn erase(&mut self, id: &I) -> Option<(K, V)> {
        let slot = self.by_id.remove(id)?;
        let removed = self
            .order
            .remove(&(slot.sort_key.clone(), Position::Item(id.clone())));
        debug_assert!(removed, "order view lost an item the identity view still had");
        Some((slot.sort_key, slot.value))
    }

    /// Like [`erase`](Self::erase), but reports absent ids as [`IndexError::NotFound`].
    pub fn try_erase(&mut self, id: &I) -> Result<(K, V), IndexError> {
        self.erase(id).ok_or(IndexError::NotFound)
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.order.clear();
        self.by_id.clear();
    }

    /// Returns `true` if `id` is indexed.
    #[must_use]
    pub fn contains(&self, id: &I) -> bool {
        self.by_id.contains_key(id)
    }

    /// Looks up an item, returning its sort key and value.
    #[must_use]
    pub fn find(&self, id: &I) -> Option<(&K, &V)> {
        self.by_id.get(id).map(|slot| (&slot.sort_key, &slot.value))
    }

    /// Returns the value stored for `id`.
    #[must_use]
    pub fn get(&self, id: &I) -> Option<&V> {
        self.by_id.get(id).map(|slot| &slot.value)
    }

    /// Returns the value stored for `id` mutably.
    ///
    /// Keys are not reachable through this borrow, so the views stay consistent.
    pub fn get_mut(&mut self, id: &I) -> Option<&mut V> {
        self.by_id.get_mut(id).map(|slot| &mut slot.value)
    }

    /// Returns the sort key of `id`.
    #[must_use]
    pub fn sort_key(&self, id: &I) -> Option<&K> {
        self.by_id.get(id).map(|slot| &slot.sort_key)
    }

    /// Returns the `(sort_key, id)` order key of `id`.
    #[must_use]
    pub fn order_key(&self, id: &I) -> Option<(K, I)> {
        self.sort_key(id).map(|k| (k.clone(), id.clone()))
    }

    fn position_key(&self, id: &I) -> Option<(K, Position<I>)> {
        self.sort_key(id)
            .map(|k| (k.clone(), Position::Item(id.clone())))
    }

    /// First item of the order view.
    #[must_use]
    pub fn first(&self) -> Option<&I> {
        self.order.first().and_then(|(_, p)| p.id())
    }

    /// Last item of the order view.
    #[must_use]
    pub fn last(&self) -> Option<&I> {
        self.order.last().and_then(|(_, p)| p.id())
    }

    /// Order-view neighbor of `id` in `direction`.
    #[must_use]
    pub fn neighbor(&self, id: &I, direction: Direction) -> Option<&I> {
        self.range(Cursor::Excluding(id), direction, 1)
            .next()
            .map(|(_, id, _)| id)
    }

    /// Item following `id` in the order view.
    #[must_use]
    pub fn next_of(&self, id: &I) -> Option<&I> {
        self.neighbor(id, Direction::After)
    }

    /// Item preceding `id` in the order view.
    #[must_use]
    pub fn prev_of(&self, id: &I) -> Option<&I> {
        self.neighbor(id, Direction::Before)
    }

    /// Item preceding the position `(sort_key, id)` would occupy.
    ///
    /// Works whether or not `id` is indexed.
    #[must_use]
    pub fn predecessor_of_key(&self, sort_key: &K, id: &I) -> Option<&I> {
        let bound = (sort_key.clone(), Position::Item(id.clone()));
        self.order
            .range((Bound::Unbounded, Bound::Excluded(bound)))
            .next_back()
            .and_then(|(_, p)| p.id())
    }

    /// Walks the order view from `cursor` in `direction`, yielding at most
    /// `count` items.
    ///
    /// The iterator is lazy and `Clone`, so it can be restarted from a saved
    /// copy. An absent cursor id yields an empty sequence.
    #[must_use]
    pub fn range<'a>(
        &'a self,
        cursor: Cursor<'_, K, I>,
        direction: Direction,
        count: usize,
    ) -> Range<'a, K, I, V> {
        let inner = match cursor {
            Cursor::Edge => Some(self.order.range::<(K, Position<I>), _>(..)),
            Cursor::SortKey(key) => Some(match direction {
                Direction::After => self.order.range((
                    Bound::Included((key.clone(), Position::Start)),
                    Bound::Unbounded,
                )),
                Direction::Before => self.order.range((
                    Bound::Unbounded,
                    Bound::Included((key.clone(), Position::End)),
                )),
            }),
            Cursor::Including(id) | Cursor::Excluding(id) => {
                let inclusive = matches!(cursor, Cursor::Including(_));
                self.position_key(id).map(|key| {
                    let bounds = match (direction, inclusive) {
                        (Direction::After, true) => (Bound::Included(key), Bound::Unbounded),
                        (Direction::After, false) => (Bound::Excluded(key), Bound::Unbounded),
                        (Direction::Before, true) => (Bound::Unbounded, Bound::Included(key)),
                        (Direction::Before, false) => (Bound::Unbounded, Bound::Excluded(key)),
                    };
                    self.order.range(bounds)
                })
            }
        };
        Range {
            inner,
            by_id: &self.by_id,
            direction,
            remaining: count,
        }
    }

    /// Counts items strictly between `from` and `to` in the order view,
    /// stopping once `limit` is reached.
    ///
    /// `None` stands for the list edge on that side. Returns `0` if either id is
    /// absent or `from` does not precede `to`.
    #[must_use]
    pub fn count_between(&self, from: Option<&I>, to: Option<&I>, limit: usize) -> usize {
        let lower = match from {
            None => Bound::Unbounded,
            Some(id) => match self.position_key(id) {
                Some(key) => Bound::Excluded(key),
                None => return 0,
            },
        };
        let upper = match to {
            None => Bound::Unbounded,
            Some(id) => match self.position_key(id) {
                Some(key) => Bound::Excluded(key),
                None => return 0,
            },
        };
        if let (Bound::Excluded(lo), Bound::Excluded(hi)) = (&lower, &upper) {
            if lo >= hi {
                return 0;
            }
        }
        self.order.range((lower, upper)).take(limit).count()
    }

    /// Iterates the order view from first to last.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &I, &V)> + '_ {
        self.order.iter().filter_map(|(k, p)| {
            let id = p.id()?;
            Some((k, id, &self.by_id.get(id)?.value))
        })
    }

    /// Iterates every value mutably, in identity-key order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.by_id.values_mut().map(|slot| &mut slot.value)
    }

    /// Iterates the identity view in identity-key order.
    pub fn iter_by_id(&self) -> impl DoubleEndedIterator<Item = (&I, &K, &V)> + '_ {
        self.by_id
            .iter()
            .map(|(id, slot)| (id, &slot.sort_key, &slot.value))
    }
}

/// Lazy order-view walk returned by [`OrderedItemIndex::range`].
#[derive(Debug)]
pub struct Range<'a, K, I, V> {
    inner: Option<btree_set::Range<'a, (K, Position<I>)>>,
    by_id: &'a BTreeMap<I, Slot<K, V>>,
    direction: Direction,
    remaining: usize,
}

impl<K, I, V> Clone for Range<'_, K, I, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            by_id: self.by_id,
            direction: self.direction,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, I: Ord, V> Iterator for Range<'a, K, I, V> {
    type Item = (&'a K, &'a I, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let inner = self.inner.as_mut()?;
        let (key, position) = match self.direction {
            Direction::After => inner.next()?,
            Direction::Before => inner.next_back()?,
        };
        self.remaining -= 1;
        let id = position.id()?;
        let slot = self.by_id.get(id)?;
        Some((key, id, &slot.value))
    }
}
