// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Prefetch requests and the loaded range they extend.
//!
//! The list asks its data source for more items through [`PrefetchRequest`]s.
//! At most one request per [`Direction`] is outstanding at a time; a new one on
//! the same side is suppressed until the previous one resolves. Each request
//! carries a fresh [`RequestId`], so a response for a request that was
//! cancelled (by [`clear`](crate::FlyweightList::clear) or a reload) is
//! recognized as stale.
//!
//! [`LoadedRange`] tracks the part of the order view that is known to match the
//! data source without gaps. Requests are anchored at its boundaries.

use core::fmt;

use crate::index::Direction;

/// Identifier of an issued [`PrefetchRequest`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Raw value, increasing with every request.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A request for more items, emitted as
/// [`ListEvent::Prefetch`](crate::ListEvent::Prefetch).
///
/// Answer it with [`FlyweightList::complete_prefetch`](crate::FlyweightList::complete_prefetch),
/// delivering up to `count` items adjacent to `anchor` on the `direction` side,
/// in order. With no anchor, the request starts at the list edge opposite to
/// `direction`: [`Direction::After`] asks for the first `count` items of the
/// data set and [`Direction::Before`] for the last `count`.
///
/// Delivering fewer than `count` items tells the list that the edge on that
/// side has been reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefetchRequest<I> {
    /// Identifier to pass back with the response.
    pub id: RequestId,
    /// Side the items are wanted on.
    pub direction: Direction,
    /// Identity key of the boundary item the items follow or precede.
    pub anchor: Option<I>,
    /// Maximum number of items wanted.
    pub count: usize,
}

/// An outstanding request matched by [`PrefetchController::resolve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved<I> {
    /// Side the request was for.
    pub direction: Direction,
    /// Number of items requested.
    pub count: usize,
    /// Anchor the request was issued with.
    pub anchor: Option<I>,
}

/// Gap-free run of the order view, bounded by `(sort_key, id)` order keys.
///
/// Both bounds are inclusive and name indexed items. Items outside the range
/// are indexed but detached: they are never materialized until a response
/// extends the range over them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedRange<K, I> {
    lower: Option<(K, I)>,
    upper: Option<(K, I)>,
}

impl<K, I> Default for LoadedRange<K, I> {
    fn default() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }
}

impl<K: Ord + Clone, I: Ord + Clone> LoadedRange<K, I> {
    /// Returns `true` if nothing is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lower.is_none()
    }

    /// Returns `true` if the item ordered at `(key, id)` is inside the range.
    #[must_use]
    pub fn contains(&self, key: &K, id: &I) -> bool {
        match (&self.lower, &self.upper) {
            (Some((lk, li)), Some((uk, ui))) => (key, id) >= (lk, li) && (key, id) <= (uk, ui),
            _ => false,
        }
    }

    /// Boundary on the `direction` side.
    #[must_use]
    pub fn bound(&self, direction: Direction) -> Option<(&K, &I)> {
        let bound = match direction {
            Direction::Before => &self.lower,
            Direction::After => &self.upper,
        };
        bound.as_ref().map(|(k, i)| (k, i))
    }

    /// Identity key of the boundary on the `direction` side.
    #[must_use]
    pub fn bound_id(&self, direction: Direction) -> Option<&I> {
        self.bound(direction).map(|(_, id)| id)
    }

    /// Grows the range to include `(key, id)`.
    pub fn extend(&mut self, key: &K, id: &I) {
        let lower_moves = self
            .lower
            .as_ref()
            .is_none_or(|(lk, li)| (key, id) < (lk, li));
        if lower_moves {
            self.lower = Some((key.clone(), id.clone()));
        }
        let upper_moves = self
            .upper
            .as_ref()
            .is_none_or(|(uk, ui)| (key, id) > (uk, ui));
        if upper_moves {
            self.upper = Some((key.clone(), id.clone()));
        }
    }

    /// Replaces the boundary on the `direction` side.
    ///
    /// Passing `None`, or a bound that crosses the opposite one, empties the
    /// range.
    pub fn set_bound(&mut self, direction: Direction, bound: Option<(K, I)>) {
        match direction {
            Direction::Before => self.lower = bound,
            Direction::After => self.upper = bound,
        }
        let crossed = match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => lower > upper,
            (None, None) => false,
            _ => true,
        };
        if crossed {
            self.clear();
        }
    }

    /// Forgets the range.
    pub fn clear(&mut self) {
        self.lower = None;
        self.upper = None;
    }
}

/// Issues prefetch requests with per-direction back-pressure.
#[derive(Clone, Debug)]
pub struct PrefetchController<K, I> {
    next_id: u64,
    outstanding: [Option<(RequestId, Resolved<I>)>; 2],
    range: LoadedRange<K, I>,
}

impl<K, I> Default for PrefetchController<K, I> {
    fn default() -> Self {
        Self {
            next_id: 0,
            outstanding: [None, None],
            range: LoadedRange::default(),
        }
    }
}

impl<K: Ord + Clone, I: Ord + Clone> PrefetchController<K, I> {
    /// Creates a controller with nothing loaded or outstanding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The loaded range.
    #[must_use]
    pub fn range(&self) -> &LoadedRange<K, I> {
        &self.range
    }

    /// The loaded range, mutably.
    pub fn range_mut(&mut self) -> &mut LoadedRange<K, I> {
        &mut self.range
    }

    /// Returns `true` if a request on `direction` awaits its response.
    #[must_use]
    pub fn is_outstanding(&self, direction: Direction) -> bool {
        self.outstanding[direction.slot()].is_some()
    }

    /// Identifier of the outstanding request on `direction`.
    #[must_use]
    pub fn outstanding(&self, direction: Direction) -> Option<RequestId> {
        self.outstanding[direction.slot()]
            .as_ref()
            .map(|(id, _)| *id)
    }

    /// Number of outstanding requests.
    #[must_use]
    pub fn outstanding_len(&self) -> usize {
        self.outstanding.iter().flatten().count()
    }

    /// Decides whether the `direction` side needs more items.
    ///
    /// `remaining` is the number of loaded items beyond the visible run on that
    /// side. A request for `window - remaining` items is issued when
    /// `remaining < threshold * window`, the edge is not reached, and no request
    /// is outstanding on that side.
    pub fn evaluate(
        &mut self,
        direction: Direction,
        remaining: usize,
        window: usize,
        threshold: f64,
        reached: bool,
    ) -> Option<PrefetchRequest<I>> {
        if reached || self.is_outstanding(direction) || remaining >= window {
            return None;
        }
        if remaining as f64 >= threshold * window as f64 {
            return None;
        }
        self.request(direction, window - remaining)
    }

    /// Issues a request anchored at the loaded range's boundary, unless one is
    /// already outstanding on `direction`.
    pub fn request(&mut self, direction: Direction, count: usize) -> Option<PrefetchRequest<I>> {
        if self.is_outstanding(direction) {
            return None;
        }
        let anchor = self.range.bound_id(direction).cloned();
        Some(self.issue(direction, anchor, count))
    }

    /// Issues an unanchored request starting at a list edge.
    ///
    /// Any outstanding request on `direction` is superseded; its response will
    /// be treated as stale.
    pub fn request_from_edge(&mut self, direction: Direction, count: usize) -> PrefetchRequest<I> {
        self.issue(direction, None, count)
    }

    /// Issues the one-item request that re-checks an edge after its edge item
    /// was removed.
    pub fn request_recheck(&mut self, direction: Direction) -> Option<PrefetchRequest<I>> {
        self.request(direction, 1)
    }

    fn issue(&mut self, direction: Direction, anchor: Option<I>, count: usize) -> PrefetchRequest<I> {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        self.outstanding[direction.slot()] = Some((
            id,
            Resolved {
                direction,
                count,
                anchor: anchor.clone(),
            },
        ));
        PrefetchRequest {
            id,
            direction,
            anchor,
            count,
        }
    }

    /// Matches a response to its outstanding request and retires it.
    ///
    /// Returns `None` for unknown or superseded ids.
    pub fn resolve(&mut self, id: RequestId) -> Option<Resolved<I>> {
        let slot = self
            .outstanding
            .iter()
            .position(|o| o.as_ref().is_some_and(|(oid, _)| *oid == id))?;
        self.outstanding[slot].take().map(|(_, resolved)| resolved)
    }

    /// Returns `true` if `resolved` continues the loaded range: it was issued
    /// from a list edge, or its anchor is still the boundary on its side.
    #[must_use]
    pub fn continues_range(&self, resolved: &Resolved<I>) -> bool {
        resolved
            .anchor
            .as_ref()
            .is_none_or(|anchor| self.range.bound_id(resolved.direction) == Some(anchor))
    }

    /// Cancels the outstanding request on `direction` if its anchor is no
    /// longer the boundary of the loaded range on that side.
    pub fn cancel_if_unanchored(&mut self, direction: Direction) -> Option<RequestId> {
        let slot = direction.slot();
        let moved = self.outstanding[slot]
            .as_ref()
            .is_some_and(|(_, resolved)| !self.continues_range(resolved));
        if moved {
            self.outstanding[slot].take().map(|(id, _)| id)
        } else {
            None
        }
    }

    /// Cancels every outstanding request.
    pub fn cancel_all(&mut self) {
        self.outstanding = [None, None];
    }

    /// Cancels every request and forgets the loaded range.
    pub fn reset(&mut self) {
        self.cancel_all();
        self.range.clear();
    }
}
