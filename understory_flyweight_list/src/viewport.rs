// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Viewport tracking over the materialized rows.
//!
//! [`ViewportTracker`] owns two pieces of state:
//!
//! - the list's edge state machine ([`ListState`]), driven by load results, and
//! - the visible run of rows, recomputed after every scroll, resize, or edit.
//!
//! Recomputation starts at the *anchor* row (the first visible row from the
//! previous pass) and walks outward, so a small scroll costs a few steps rather
//! than a scan from the head.

use core::ops::Range;

use crate::error::RowError;
use crate::index::Direction;
use crate::rows::{LinkedRowContainer, RowHandle};

/// Load state of the list's two logical edges.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ListState {
    /// Nothing is loaded.
    #[default]
    Empty,
    /// Items are loaded but neither edge is known to be reached.
    Interior,
    /// The beginning of the data is loaded; the end is not.
    AtBegin,
    /// The end of the data is loaded; the beginning is not.
    AtEnd,
    /// Both edges are loaded; the list holds the whole data set.
    AtBoth,
}

impl ListState {
    /// Derives the state from index emptiness and the per-side reached flags.
    #[must_use]
    pub const fn from_flags(populated: bool, begin_reached: bool, end_reached: bool) -> Self {
        match (populated, begin_reached, end_reached) {
            (false, _, _) => Self::Empty,
            (true, false, false) => Self::Interior,
            (true, true, false) => Self::AtBegin,
            (true, false, true) => Self::AtEnd,
            (true, true, true) => Self::AtBoth,
        }
    }

    /// Returns `true` if the edge in `direction` is known to be loaded.
    #[must_use]
    pub const fn is_reached(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Self::AtBoth, _) | (Self::AtBegin, Direction::Before) | (Self::AtEnd, Direction::After)
        )
    }
}

/// Whether each list edge is materialized as a row.
///
/// Passed to [`ViewportTracker::recompute`]: the viewport can only be *at* an
/// edge when that edge is both reached and materialized.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeRows {
    /// The head row is the first loaded item and the beginning is reached.
    pub begin: bool,
    /// The tail row is the last loaded item and the end is reached.
    pub end: bool,
}

/// Visible-run tracker and edge state machine.
#[derive(Clone, Debug)]
pub struct ViewportTracker<I> {
    populated: bool,
    reached: [bool; 2],
    anchor: Option<RowHandle>,
    first: Option<RowHandle>,
    last: Option<RowHandle>,
    first_id: Option<I>,
    last_id: Option<I>,
    at_begin: bool,
    at_end: bool,
    last_visible_edge: f64,
}

impl<I> Default for ViewportTracker<I> {
    fn default() -> Self {
        Self {
            populated: false,
            reached: [false; 2],
            anchor: None,
            first: None,
            last: None,
            first_id: None,
            last_id: None,
            at_begin: false,
            at_end: false,
            last_visible_edge: 0.0,
        }
    }
}

impl<I: Clone + PartialEq> ViewportTracker<I> {
    /// Creates a tracker in [`ListState::Empty`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current edge state.
    #[must_use]
    pub fn state(&self) -> ListState {
        ListState::from_flags(self.populated, self.reached[0], self.reached[1])
    }

    /// Returns `true` if the edge in `direction` is known to be loaded.
    #[must_use]
    pub fn is_reached(&self, direction: Direction) -> bool {
        self.reached[direction.slot()]
    }

    /// Records whether any items are loaded.
    pub fn set_populated(&mut self, populated: bool) {
        self.populated = populated;
    }

    /// Marks the edge in `direction` as reached or not.
    pub fn set_reached(&mut self, direction: Direction, reached: bool) {
        self.reached[direction.slot()] = reached;
    }

    /// Returns to [`ListState::Empty`] and forgets the visible run.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Anchor row the next recomputation starts from.
    #[must_use]
    pub fn anchor(&self) -> Option<RowHandle> {
        self.anchor
    }

    /// Forgets the anchor so the next recomputation starts at the head.
    pub fn clear_anchor(&mut self) {
        self.anchor = None;
        self.first = None;
        self.last = None;
    }

    /// First visible row.
    #[must_use]
    pub fn first_visible(&self) -> Option<RowHandle> {
        self.first
    }

    /// Last visible row.
    #[must_use]
    pub fn last_visible(&self) -> Option<RowHandle> {
        self.last
    }

    /// Identity key of the first visible row.
    #[must_use]
    pub fn first_visible_id(&self) -> Option<&I> {
        self.first_id.as_ref()
    }

    /// Identity key of the last visible row.
    #[must_use]
    pub fn last_visible_id(&self) -> Option<&I> {
        self.last_id.as_ref()
    }

    /// `true` when the beginning is loaded, materialized, and scrolled to.
    #[must_use]
    pub fn at_begin(&self) -> bool {
        self.at_begin
    }

    /// `true` when the end is loaded, materialized, and scrolled to.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.at_end
    }

    /// Trailing edge of the last visible row, in viewport coordinates.
    #[must_use]
    pub fn last_visible_edge(&self) -> f64 {
        self.last_visible_edge
    }

    /// Recomputes the visible run for the main-axis window
    /// `[offset, offset + viewport_extent)`.
    ///
    /// Returns `Ok(true)` if the first or last visible identity changed. A
    /// stale anchor is reported as [`RowError::StaleHandle`] and leaves the
    /// tracker with no anchor, so the caller can re-layout and retry.
    pub fn recompute(
        &mut self,
        rows: &LinkedRowContainer<I>,
        offset: f64,
        viewport_extent: f64,
        edges: EdgeRows,
        epsilon: f64,
    ) -> Result<bool, RowError> {
        let start = match self.anchor {
            Some(anchor) if rows.contains(anchor) => Some(anchor),
            Some(_) => {
                self.clear_anchor();
                return Err(RowError::StaleHandle);
            }
            None => rows.head(),
        };

        let Some(start) = start else {
            let changed = self.first_id.is_some() || self.last_id.is_some();
            self.first_id = None;
            self.last_id = None;
            self.first = None;
            self.last = None;
            self.at_begin = edges.begin;
            self.at_end = edges.end;
            self.last_visible_edge = 0.0;
            return Ok(changed);
        };

        let view = offset..offset + viewport_extent.max(0.0);
        let first = Self::first_intersecting(rows, start, &view);
        let last = Self::last_intersecting(rows, first, &view);

        self.anchor = Some(first);
        self.first = Some(first);
        self.last = Some(last);
        self.at_begin = edges.begin && offset <= epsilon;
        self.at_end = edges.end && view.end >= rows.total_extent() - epsilon;
        self.last_visible_edge = rows.span(last).map_or(0.0, |s| s.end - offset);

        let first_id = rows.id(first).cloned();
        let last_id = rows.id(last).cloned();
        let changed = first_id != self.first_id || last_id != self.last_id;
        self.first_id = first_id;
        self.last_id = last_id;
        Ok(changed)
    }

    /// First row whose span ends past `view.start`, walking from `from`.
    fn first_intersecting(
        rows: &LinkedRowContainer<I>,
        from: RowHandle,
        view: &Range<f64>,
    ) -> RowHandle {
        let mut h = from;
        while let Some(prev) = rows.prev(h) {
            match rows.span(h) {
                Some(span) if span.start > view.start => h = prev,
                _ => break,
            }
        }
        while let Some(next) = rows.next(h) {
            match rows.span(h) {
                Some(span) if span.end <= view.start => h = next,
                _ => break,
            }
        }
        h
    }

    /// Last row starting before `view.end`, walking forward from `first`.
    fn last_intersecting(
        rows: &LinkedRowContainer<I>,
        first: RowHandle,
        view: &Range<f64>,
    ) -> RowHandle {
        let mut h = first;
        while let Some(next) = rows.next(h) {
            match rows.span(next) {
                Some(span) if span.start < view.end => h = next,
                _ => break,
            }
        }
        h
    }

    /// Moves every reference to `handle` onto a surviving neighbor before the
    /// row is removed: the next row, else the previous one.
    pub fn reanchor_before_removal(&mut self, rows: &LinkedRowContainer<I>, handle: RowHandle) {
        let fallback = rows.next(handle).or_else(|| rows.prev(handle));
        if self.anchor == Some(handle) {
            self.anchor = fallback;
        }
        if self.first == Some(handle) {
            self.first = fallback;
        }
        if self.last == Some(handle) {
            self.last = rows.prev(handle).or_else(|| rows.next(handle));
        }
    }

    /// Number of rows from the first to the last visible row, inclusive.
    #[must_use]
    pub fn visible_len(&self, rows: &LinkedRowContainer<I>) -> usize {
        match (self.first, self.last) {
            (Some(first), Some(last)) => match (rows.position(first), rows.position(last)) {
                (Some(a), Some(b)) if b >= a => b - a + 1,
                _ => 0,
            },
            _ => 0,
        }
    }

    /// Hidden rows before the first visible row.
    #[must_use]
    pub fn hidden_before(&self, rows: &LinkedRowContainer<I>) -> usize {
        self.first.and_then(|h| rows.position(h)).unwrap_or(0)
    }

    /// Hidden rows after the last visible row.
    #[must_use]
    pub fn hidden_after(&self, rows: &LinkedRowContainer<I>) -> usize {
        self.last
            .and_then(|h| rows.position(h))
            .map_or(rows.len(), |p| rows.len() - p - 1)
    }
}
