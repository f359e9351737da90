// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The flyweight window manager.
//!
//! [`FlyweightList`] owns the item index, the materialized rows, and the scroll
//! state, and keeps one invariant after every structural change: the
//! materialized rows are exactly the visible rows plus a margin of hidden rows
//! on each side, limited to the loaded range.
//!
//! The list is driven entirely by the host:
//!
//! - data edits: [`insert_continuous_items`](FlyweightList::insert_continuous_items),
//!   [`insert_item`](FlyweightList::insert_item),
//!   [`remove_item`](FlyweightList::remove_item),
//!   [`complete_prefetch`](FlyweightList::complete_prefetch),
//!   [`clear`](FlyweightList::clear);
//! - input: [`scroll_to`](FlyweightList::scroll_to),
//!   [`scroll_bar_moved`](FlyweightList::scroll_bar_moved),
//!   [`wheel`](FlyweightList::wheel),
//!   [`jump_to_edge`](FlyweightList::jump_to_edge),
//!   [`set_viewport_size`](FlyweightList::set_viewport_size);
//! - time: [`tick`](FlyweightList::tick).
//!
//! Outgoing notifications, prefetch requests included, are queued as
//! [`ListEvent`]s and drained with [`take_events`](FlyweightList::take_events).

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Debug;
use core::mem;
use core::ops::{Deref, DerefMut};
use core::time::Duration;

use kurbo::{Rect, Size};
use tracing::{debug, trace, warn};

use crate::config::{ListConfig, PrefetchSize};
use crate::error::{IndexError, ListError};
use crate::index::{Cursor, Direction, OrderedItemIndex};
use crate::jump::{JumpEdgeControl, Modifiers};
use crate::orientation::{Axis, Orientation};
use crate::prefetch::{LoadedRange, PrefetchController, PrefetchRequest, RequestId};
use crate::rows::{LinkedRowContainer, RowHandle};
use crate::scrollbar::{ScrollBar, ScrollBarSync, ScrollGeometry, ScrollTarget};
use crate::timer::{TimerKind, Timers};
use crate::viewport::{EdgeRows, ListState, ViewportTracker};

/// Upper bound on grow/trim/clamp rounds in one maintenance pass.
const MAX_SETTLE_PASSES: usize = 4;

/// Host data stored in a [`FlyweightList`].
pub trait Keyed {
    /// Totally ordered sort key. May repeat across items.
    type SortKey: Ord + Clone + Debug;
    /// Unique, stable identity key.
    type Id: Ord + Clone + Debug;

    /// Sort key of this item.
    fn sort_key(&self) -> Self::SortKey;

    /// Identity key of this item.
    fn id(&self) -> Self::Id;
}

/// Builds and disposes the host row objects for items.
///
/// `build` must be pure with respect to ordering: a row never changes the sort
/// key or identity of the item it was built for.
pub trait RowFactory<D> {
    /// Host row object.
    type Row;
    /// Error reported by [`build`](Self::build) or [`dispose`](Self::dispose).
    type Error;

    /// Builds the row for `data`.
    fn build(&mut self, data: &D) -> Result<Self::Row, Self::Error>;

    /// Measured size of a built row.
    fn size_of(&self, row: &Self::Row) -> Size;

    /// Releases a row. Defaults to dropping it; override to return rows to a
    /// pool.
    fn dispose(&mut self, row: Self::Row) -> Result<(), Self::Error> {
        drop(row);
        Ok(())
    }
}

/// Notifications queued for the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListEvent<I> {
    /// The data source should deliver more items.
    Prefetch(PrefetchRequest<I>),
    /// The first or last visible item changed.
    ViewportChanged {
        /// First visible item.
        first: Option<I>,
        /// Last visible item.
        last: Option<I>,
    },
    /// The first or last materialized item changed.
    ItemRangeChanged {
        /// First materialized item.
        first: Option<I>,
        /// Last materialized item.
        last: Option<I>,
    },
    /// A scroll bar's range, value, or visibility changed.
    ScrollBarsChanged,
    /// The jump control's visibility or badge changed.
    JumpControlChanged,
}

/// How [`FlyweightList::jump_to_edge`] reached its edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum JumpKind {
    /// Scrolled inside the materialized rows.
    Short,
    /// Re-seeded the rows at the edge from the item index.
    Local,
    /// Cleared everything and requested a fresh load at the edge.
    Reload,
}

/// Where the next window is seeded when no rows are materialized.
#[derive(Clone, Debug)]
enum Seed<I> {
    Edge(Direction),
    Item { id: I, in_item: f64 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RunSource {
    /// Host edit. Duplicate identities are an error.
    Host,
    /// Prefetch response, current or stale. Duplicates are skipped.
    Source,
}

struct Materialized<R> {
    handle: RowHandle,
    row: R,
}

struct ItemRecord<D, R> {
    data: D,
    row: Option<Materialized<R>>,
}

type Index<D, R> = OrderedItemIndex<<D as Keyed>::SortKey, <D as Keyed>::Id, ItemRecord<D, R>>;

type Built<I, R> = (I, Size, R);

/// Flyweight virtualized list.
///
/// `D` is the host item type and `F` builds its rows. See the
/// [module documentation](self) for how a host drives it.
pub struct FlyweightList<D: Keyed, F: RowFactory<D>> {
    factory: F,
    config: ListConfig,
    config_dirty: bool,
    index: Index<D, F::Row>,
    rows: LinkedRowContainer<D::Id>,
    tracker: ViewportTracker<D::Id>,
    prefetch: PrefetchController<D::SortKey, D::Id>,
    scroll_bars: ScrollBarSync,
    jump: JumpEdgeControl,
    timers: Timers,
    events: Vec<ListEvent<D::Id>>,
    viewport: Size,
    offset: f64,
    cross_offset: f64,
    seed: Option<Seed<D::Id>>,
    pending_edge_load: Option<Direction>,
    materialized: Option<(D::Id, D::Id)>,
    batch_depth: usize,
    batch_dirty: bool,
    batch_prefetch: bool,
    deferred_error: Option<ListError<F::Error>>,
}

impl<D: Keyed, F: RowFactory<D>> Debug for FlyweightList<D, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlyweightList")
            .field("len", &self.index.len())
            .field("materialized", &self.rows.len())
            .field("state", &self.tracker.state())
            .field("offset", &self.offset)
            .field("viewport", &self.viewport)
            .field("first_visible", &self.tracker.first_visible_id())
            .field("last_visible", &self.tracker.last_visible_id())
            .finish_non_exhaustive()
    }
}

impl<D: Keyed, F: RowFactory<D>> FlyweightList<D, F> {
    /// Creates an empty list and queues the initial load request, anchored at
    /// [`ListConfig::initial_edge`].
    ///
    /// With [`PrefetchSize::Screens`](crate::PrefetchSize::Screens) the request
    /// is held back until [`set_viewport_size`](Self::set_viewport_size) gives
    /// the screen a size.
    pub fn new(factory: F, config: ListConfig) -> Self {
        let timers = Timers::new(
            config.resize_settle_delay,
            config.scroll_bar_refresh_delay,
            config.item_count_check_delay,
        );
        let mut list = Self {
            factory,
            rows: LinkedRowContainer::new(config.orientation),
            jump: JumpEdgeControl::new(config.jump_edge, config.jump_control_enabled),
            config,
            config_dirty: false,
            index: OrderedItemIndex::new(),
            tracker: ViewportTracker::new(),
            prefetch: PrefetchController::new(),
            scroll_bars: ScrollBarSync::new(),
            timers,
            events: Vec::new(),
            viewport: Size::ZERO,
            offset: 0.0,
            cross_offset: 0.0,
            seed: None,
            pending_edge_load: None,
            materialized: None,
            batch_depth: 0,
            batch_dirty: false,
            batch_prefetch: false,
            deferred_error: None,
        };
        list.request_edge_load(list.config.initial_edge);
        list
    }

    // --- Accessors ---

    /// Current configuration.
    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// Configuration, mutably. Changes are applied on the next maintenance
    /// pass; call [`refresh`](Self::refresh) to apply them right away.
    pub fn config_mut(&mut self) -> &mut ListConfig {
        self.config_dirty = true;
        &mut self.config
    }

    /// The row factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// The row factory, mutably.
    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no items are indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of materialized rows.
    pub fn materialized_len(&self) -> usize {
        self.rows.len()
    }

    /// Edge load state.
    pub fn state(&self) -> ListState {
        self.tracker.state()
    }

    /// Main-axis scroll offset, relative to the first materialized row.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Cross-axis scroll offset.
    pub fn cross_offset(&self) -> f64 {
        self.cross_offset
    }

    /// Viewport size.
    pub fn viewport_size(&self) -> Size {
        self.viewport
    }

    /// Orientation rows are currently laid out along.
    pub fn orientation(&self) -> Orientation {
        self.rows.orientation()
    }

    /// Materialized row linkage and layout.
    pub fn rows(&self) -> &LinkedRowContainer<D::Id> {
        &self.rows
    }

    /// Layout revision of the materialized rows; see
    /// [`LinkedRowContainer::revision`].
    pub fn layout_revision(&self) -> u64 {
        self.rows.revision()
    }

    /// The loaded range.
    pub fn loaded_range(&self) -> &LoadedRange<D::SortKey, D::Id> {
        self.prefetch.range()
    }

    /// Returns `true` if `id` is indexed.
    pub fn contains(&self, id: &D::Id) -> bool {
        self.index.contains(id)
    }

    /// Returns `true` if `id` is inside the loaded range.
    pub fn is_attached(&self, id: &D::Id) -> bool {
        self.index
            .sort_key(id)
            .is_some_and(|key| self.prefetch.range().contains(key, id))
    }

    /// Returns `true` if `id` has a materialized row.
    pub fn is_materialized(&self, id: &D::Id) -> bool {
        self.row_handle(id).is_some()
    }

    /// Host data of `id`.
    pub fn item(&self, id: &D::Id) -> Option<&D> {
        self.index.get(id).map(|r| &r.data)
    }

    /// Iterates indexed items in order.
    pub fn items(&self) -> impl Iterator<Item = &D> + '_ {
        self.index.iter().map(|(_, _, r)| &r.data)
    }

    /// Materialized row of `id`.
    pub fn row(&self, id: &D::Id) -> Option<&F::Row> {
        self.index
            .get(id)
            .and_then(|r| r.row.as_ref())
            .map(|m| &m.row)
    }

    /// Materialized row of `id`, mutably.
    pub fn row_mut(&mut self, id: &D::Id) -> Option<&mut F::Row> {
        self.index
            .get_mut(id)
            .and_then(|r| r.row.as_mut())
            .map(|m| &mut m.row)
    }

    fn row_handle(&self, id: &D::Id) -> Option<RowHandle> {
        self.index
            .get(id)
            .and_then(|r| r.row.as_ref())
            .map(|m| m.handle)
    }

    /// Rectangle of `id`'s row in viewport coordinates.
    pub fn row_rect(&self, id: &D::Id) -> Option<Rect> {
        let handle = self.row_handle(id)?;
        let rect = self.rows.row_rect(handle, self.cross_offset)?;
        Some(rect - self.orientation().point(self.offset, 0.0).to_vec2())
    }

    /// First visible item.
    pub fn first_visible(&self) -> Option<&D::Id> {
        self.tracker.first_visible_id()
    }

    /// Last visible item.
    pub fn last_visible(&self) -> Option<&D::Id> {
        self.tracker.last_visible_id()
    }

    /// Trailing edge of the last visible row, in viewport coordinates.
    pub fn last_visible_edge(&self) -> f64 {
        self.tracker.last_visible_edge()
    }

    /// `true` when the beginning is loaded and scrolled to.
    pub fn at_begin(&self) -> bool {
        self.tracker.at_begin()
    }

    /// `true` when the end is loaded and scrolled to.
    pub fn at_end(&self) -> bool {
        self.tracker.at_end()
    }

    /// Iterates the visible items in order.
    pub fn visible_ids(&self) -> impl Iterator<Item = &D::Id> + '_ {
        let last = self.tracker.last_visible();
        core::iter::successors(self.tracker.first_visible(), move |h| {
            if Some(*h) == last {
                None
            } else {
                self.rows.next(*h)
            }
        })
        .filter_map(|h| self.rows.id(h))
    }

    /// Iterates the materialized items in order.
    pub fn materialized_ids(&self) -> impl Iterator<Item = &D::Id> + '_ {
        self.rows.iter().filter_map(|h| self.rows.id(h))
    }

    /// Jump-to-edge control state.
    pub fn jump_control(&self) -> &JumpEdgeControl {
        &self.jump
    }

    /// Scroll bar state for `axis`, as of the last sync.
    pub fn scroll_bar(&self, axis: Axis) -> ScrollBar {
        self.scroll_bars.bar(axis)
    }

    /// Outstanding prefetch request on `direction`.
    pub fn outstanding_request(&self, direction: Direction) -> Option<RequestId> {
        self.prefetch.outstanding(direction)
    }

    /// Number of outstanding prefetch requests.
    pub fn outstanding_requests(&self) -> usize {
        self.prefetch.outstanding_len()
    }

    /// Earliest pending timer deadline; call [`tick`](Self::tick) then.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Returns `true` if `kind` is armed.
    pub fn is_timer_armed(&self, kind: TimerKind) -> bool {
        self.timers.is_armed(kind)
    }

    /// Drains queued events.
    pub fn take_events(&mut self) -> Vec<ListEvent<D::Id>> {
        mem::take(&mut self.events)
    }

    /// Returns `true` inside an [`ItemRangeChange`] batch.
    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    fn viewport_main(&self) -> f64 {
        self.orientation().main(self.viewport)
    }

    fn viewport_cross(&self) -> f64 {
        self.orientation().cross(self.viewport)
    }

    fn average_extent(&self) -> f64 {
        let measured = if self.rows.is_empty() {
            0.0
        } else {
            self.rows.total_extent() / self.rows.len() as f64
        };
        if measured > 0.0 {
            measured
        } else if self.config.estimated_row_extent > 0.0 {
            self.config.estimated_row_extent
        } else {
            1.0
        }
    }

    fn prefetch_window(&self) -> usize {
        self.config
            .prefetch_items(self.viewport_main(), self.average_extent())
    }

    /// Screen-relative windows need a measured viewport.
    fn can_size_window(&self) -> bool {
        !matches!(self.config.prefetch, PrefetchSize::Screens(_)) || self.viewport_main() > 0.0
    }

    fn margin(&self) -> usize {
        self.config
            .margin_items(self.viewport_main(), self.average_extent())
    }

    fn head_id(&self) -> Option<&D::Id> {
        self.rows.head().and_then(|h| self.rows.id(h))
    }

    fn tail_id(&self) -> Option<&D::Id> {
        self.rows.tail().and_then(|h| self.rows.id(h))
    }

    fn take_deferred(&mut self) -> Result<(), ListError<F::Error>> {
        match self.deferred_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // --- Data edits ---

    /// Inserts a contiguous run of items.
    ///
    /// Input already in `(sort_key, id)` order is used as is; anything else is
    /// sorted first. Items landing inside the materialized rows are spliced in
    /// groups next to their order-view predecessor. Items beyond the
    /// materialized rows are registered and materialized by the maintenance
    /// pass when they come into range.
    ///
    /// Fails without changing anything if an identity is already indexed or
    /// repeats within the run, or if a row fails to build.
    pub fn insert_continuous_items(
        &mut self,
        items: impl IntoIterator<Item = D>,
    ) -> Result<(), ListError<F::Error>> {
        self.take_deferred()?;
        self.insert_run(items.into_iter().collect(), RunSource::Host)?;
        self.maintain(true)
    }

    /// Inserts a single item, materializing it immediately when it lands
    /// inside the materialized rows.
    pub fn insert_item(&mut self, item: D) -> Result<(), ListError<F::Error>> {
        self.insert_continuous_items([item])
    }

    /// Removes an item, returning its data.
    ///
    /// Absent ids are a no-op returning `Ok(None)`. Removing the edge item of
    /// a reached side makes that side unreached and queues a one-item request
    /// to re-check it.
    pub fn remove_item(&mut self, id: &D::Id) -> Result<Option<D>, ListError<F::Error>> {
        self.take_deferred()?;
        if !self.index.contains(id) {
            return Ok(None);
        }

        let mut rechecks = [false; 2];
        for side in [Direction::Before, Direction::After] {
            if self.prefetch.range().bound_id(side) == Some(id) {
                rechecks[side.slot()] = self.tracker.is_reached(side);
                let inward = self.attached_neighbor(id, side.opposite());
                let bound = inward.and_then(|n| self.index.order_key(&n));
                self.prefetch.range_mut().set_bound(side, bound);
                self.cancel_unanchored_request(side);
            }
        }

        let destroyed = self.destroy_preserving_anchor(id);
        let data = self.index.erase(id).map(|(_, record)| record.data);
        trace!(?id, "removed item");

        if self.index.is_empty() {
            self.tracker.reset();
            self.prefetch.reset();
            self.request_edge_load(self.config.initial_edge);
        } else {
            for side in [Direction::Before, Direction::After] {
                if rechecks[side.slot()] {
                    self.tracker.set_reached(side, false);
                    if let Some(request) = self.prefetch.request_recheck(side) {
                        debug!(id = %request.id, ?side, "re-checking edge after removal");
                        self.events.push(ListEvent::Prefetch(request));
                    }
                }
            }
        }

        self.maintain(true)?;
        destroyed?;
        Ok(data)
    }

    /// Delivers the items answering a [`PrefetchRequest`].
    ///
    /// Items already indexed are skipped. Fewer items than requested marks the
    /// requested side as reached. A response whose request is unknown, was
    /// cancelled, or was superseded is stale: its items are indexed like
    /// ordinary inserts but never extend the loaded range.
    pub fn complete_prefetch(
        &mut self,
        request: RequestId,
        items: impl IntoIterator<Item = D>,
    ) -> Result<(), ListError<F::Error>> {
        self.take_deferred()?;
        let items: Vec<D> = items.into_iter().collect();

        let Some(resolved) = self.prefetch.resolve(request) else {
            debug!(id = %request, count = items.len(), "stale prefetch response");
            self.insert_run(items, RunSource::Source)?;
            return self.maintain(true);
        };
        if !self.prefetch.continues_range(&resolved) {
            debug!(
                id = %request,
                direction = ?resolved.direction,
                count = items.len(),
                "prefetch anchor left the loaded range; response detached"
            );
            self.insert_run(items, RunSource::Source)?;
            return self.maintain(true);
        }

        let returned = items.len();
        debug!(
            id = %request,
            direction = ?resolved.direction,
            requested = resolved.count,
            returned,
            "prefetch resolved"
        );

        let lowest = items.iter().map(|d| (d.sort_key(), d.id())).min();
        let highest = items.iter().map(|d| (d.sort_key(), d.id())).max();
        if let (Some((lk, li)), Some((hk, hi))) = (lowest, highest) {
            let range = self.prefetch.range_mut();
            range.extend(&lk, &li);
            range.extend(&hk, &hi);
        }
        if resolved.anchor.is_none() {
            self.tracker.set_reached(resolved.direction.opposite(), true);
        }
        if returned < resolved.count {
            self.tracker.set_reached(resolved.direction, true);
        }

        self.insert_run(items, RunSource::Source)?;
        self.evict(resolved.direction.opposite())?;
        self.maintain(true)
    }

    fn insert_run(&mut self, mut items: Vec<D>, source: RunSource) -> Result<(), ListError<F::Error>> {
        let sorted = items
            .windows(2)
            .all(|w| (w[0].sort_key(), w[0].id()) <= (w[1].sort_key(), w[1].id()));
        if !sorted {
            items.sort_by_cached_key(|d| (d.sort_key(), d.id()));
        }

        let mut seen = BTreeSet::new();
        match source {
            RunSource::Host => {
                for item in &items {
                    let id = item.id();
                    if self.index.contains(&id) || !seen.insert(id) {
                        return Err(IndexError::DuplicateIdentity.into());
                    }
                }
            }
            RunSource::Source => {
                items.retain(|d| {
                    let id = d.id();
                    !self.index.contains(&id) && seen.insert(id)
                });
            }
        }
        if items.is_empty() {
            return Ok(());
        }

        // Build rows for items landing strictly inside the materialized run
        // before touching the index, so a failed build leaves no trace.
        let mut built: Vec<Option<(F::Row, Size)>> = Vec::with_capacity(items.len());
        for item in &items {
            let row = if self.inside_window(&item.sort_key(), &item.id()) {
                match self.factory.build(item) {
                    Ok(row) => {
                        let size = self.factory.size_of(&row);
                        Some((row, size))
                    }
                    Err(err) => {
                        self.discard(built.into_iter().flatten().map(|(row, _)| row));
                        return Err(ListError::Build(err));
                    }
                }
            } else {
                None
            };
            built.push(row);
        }

        let establish = source == RunSource::Host && self.prefetch.range().is_empty();
        let mut spliced: Vec<(D::Id, F::Row, Size)> = Vec::new();
        for (item, row) in items.into_iter().zip(built) {
            let (key, id) = (item.sort_key(), item.id());
            if establish {
                self.prefetch.range_mut().extend(&key, &id);
            }
            if let Some((row, size)) = row {
                spliced.push((id.clone(), row, size));
            }
            self.index.insert(key, id, ItemRecord { data: item, row: None })?;
        }
        self.attach_beyond_reached();
        self.tracker.set_populated(true);

        // Group consecutive spliced items that follow each other in the order
        // view and insert each group after its predecessor's row.
        let mut group: Vec<Built<D::Id, F::Row>> = Vec::new();
        let mut group_after = None;
        for (id, row, size) in spliced {
            let prev = self.index.prev_of(&id).cloned();
            let continues = !group.is_empty()
                && prev.as_ref() == group.last().map(|(last, _, _)| last);
            if !continues {
                self.splice_group(group_after, mem::take(&mut group))?;
                group_after = match prev.as_ref().and_then(|p| self.row_handle(p)) {
                    Some(handle) => Some(handle),
                    None => {
                        self.discard([row]);
                        return Err(ListError::InconsistentWindow(
                            "predecessor of a spliced item is not materialized",
                        ));
                    }
                };
            }
            group.push((id, size, row));
        }
        self.splice_group(group_after, group)
    }

    fn splice_group(
        &mut self,
        after: Option<RowHandle>,
        group: Vec<Built<D::Id, F::Row>>,
    ) -> Result<(), ListError<F::Error>> {
        if group.is_empty() {
            return Ok(());
        }
        trace!(count = group.len(), "splicing rows");
        let before = self.anchor_offset();
        self.attach_rows(after, group)?;
        self.shift_for_anchor(before);
        Ok(())
    }

    /// Returns `true` if `(key, id)` orders strictly between the first and last
    /// materialized items.
    fn inside_window(&self, key: &D::SortKey, id: &D::Id) -> bool {
        let (Some(head), Some(tail)) = (self.head_id(), self.tail_id()) else {
            return false;
        };
        let (Some(head_key), Some(tail_key)) =
            (self.index.sort_key(head), self.index.sort_key(tail))
        else {
            return false;
        };
        (key, id) > (head_key, head) && (key, id) < (tail_key, tail)
    }

    /// Extends the loaded range over indexed items beyond a reached edge.
    fn attach_beyond_reached(&mut self) {
        if self.tracker.is_reached(Direction::Before) {
            if let Some((key, id)) = self.index.first().and_then(|f| self.index.order_key(f)) {
                self.prefetch.range_mut().extend(&key, &id);
            }
        }
        if self.tracker.is_reached(Direction::After) {
            if let Some((key, id)) = self.index.last().and_then(|l| self.index.order_key(l)) {
                self.prefetch.range_mut().extend(&key, &id);
            }
        }
    }

    fn attached_neighbor(&self, id: &D::Id, direction: Direction) -> Option<D::Id> {
        self.index
            .range(Cursor::Excluding(id), direction, 1)
            .next()
            .filter(|(key, id, _)| self.prefetch.range().contains(key, id))
            .map(|(_, id, _)| id.clone())
    }

    /// Evicts items from `side` while the index holds more than
    /// [`ListConfig::max_retained`], stopping at the visible run.
    fn evict(&mut self, side: Direction) -> Result<(), ListError<F::Error>> {
        let Some(max) = self.config.max_retained else {
            return Ok(());
        };
        let stop = match side {
            Direction::Before => self.tracker.first_visible_id(),
            Direction::After => self.tracker.last_visible_id(),
        }
        .cloned();

        let mut evicted = 0_usize;
        while self.index.len() > max {
            let candidate = match side {
                Direction::Before => self.index.first(),
                Direction::After => self.index.last(),
            }
            .cloned();
            let Some(candidate) = candidate else {
                break;
            };
            if stop.as_ref() == Some(&candidate) {
                break;
            }
            if self.prefetch.range().bound_id(side) == Some(&candidate) {
                let inward = self.attached_neighbor(&candidate, side.opposite());
                let bound = inward.and_then(|n| self.index.order_key(&n));
                self.prefetch.range_mut().set_bound(side, bound);
            }
            self.destroy_preserving_anchor(&candidate)?;
            self.index.erase(&candidate);
            evicted += 1;
        }
        if evicted > 0 {
            self.cancel_unanchored_request(side);
            self.tracker.set_reached(side, false);
            debug!(?side, evicted, "evicted items beyond the retained window");
        }
        Ok(())
    }

    fn cancel_unanchored_request(&mut self, side: Direction) {
        if let Some(id) = self.prefetch.cancel_if_unanchored(side) {
            debug!(%id, ?side, "cancelled prefetch anchored at a dropped bound");
        }
    }

    /// Removes every item and row, cancels outstanding requests and timers,
    /// and returns to [`ListState::Empty`].
    ///
    /// Does not request a new load; use [`reload`](Self::reload) for that.
    /// Every row is disposed even if one disposal fails; the first failure is
    /// returned.
    pub fn clear(&mut self) -> Result<(), ListError<F::Error>> {
        let disposed = self.clear_rows();
        self.index.clear();
        self.tracker.reset();
        self.prefetch.reset();
        self.timers.cancel_all();
        self.scroll_bars.reset_wheel();
        self.offset = 0.0;
        self.cross_offset = 0.0;
        self.seed = None;
        self.pending_edge_load = None;
        self.refresh_viewport();
        if self.jump.hide() {
            self.events.push(ListEvent::JumpControlChanged);
        }
        debug!("list cleared");
        disposed
    }

    /// Clears the list and requests a fresh load anchored at `edge`.
    pub fn reload(&mut self, edge: Direction) -> Result<(), ListError<F::Error>> {
        let cleared = self.clear();
        self.request_edge_load(edge);
        cleared
    }

    fn request_edge_load(&mut self, edge: Direction) {
        self.seed = Some(Seed::Edge(edge));
        if !self.can_size_window() {
            debug!(?edge, "edge load waits for a viewport size");
            self.pending_edge_load = Some(edge);
            return;
        }
        self.pending_edge_load = None;
        let count = self.prefetch_window();
        let request = self.prefetch.request_from_edge(edge.opposite(), count);
        debug!(id = %request.id, ?edge, count, "loading from edge");
        self.events.push(ListEvent::Prefetch(request));
    }

    // --- Navigation ---

    /// Jumps to the list edge in `direction`.
    ///
    /// - *Short jump*: the edge is reached and its row is materialized; scrolls
    ///   to it.
    /// - *Local long jump*: the edge is reached but not materialized; drops the
    ///   current rows and re-seeds them at the edge from the index.
    /// - *Reload*: otherwise, or when `force_long_jump` is set or
    ///   [`Modifiers::CONTROL`] is held; clears everything and requests a fresh
    ///   load at the edge.
    pub fn jump_to_edge(
        &mut self,
        direction: Direction,
        force_long_jump: bool,
        modifiers: Modifiers,
    ) -> Result<JumpKind, ListError<F::Error>> {
        self.take_deferred()?;
        let force = force_long_jump || modifiers.contains(Modifiers::CONTROL);
        let edge = self.prefetch.range().bound_id(direction).cloned();
        if let Some(edge) = edge.filter(|_| !force && self.tracker.is_reached(direction)) {
            if self.is_materialized(&edge) {
                self.offset = match direction {
                    Direction::Before => 0.0,
                    Direction::After => self.rows.total_extent() - self.viewport_main(),
                };
                debug!(?direction, "short jump");
                self.maintain(true)?;
                return Ok(JumpKind::Short);
            }
            debug!(?direction, "local long jump");
            self.clear_rows()?;
            self.offset = 0.0;
            self.seed = Some(Seed::Edge(direction));
            self.maintain(true)?;
            return Ok(JumpKind::Local);
        }
        debug!(?direction, force, "long jump: reloading");
        self.reload(direction)?;
        Ok(JumpKind::Reload)
    }

    /// Activates the jump control, performing its jump if it is visible.
    pub fn activate_jump_control(
        &mut self,
        modifiers: Modifiers,
    ) -> Result<Option<JumpKind>, ListError<F::Error>> {
        match self.jump.activate(modifiers) {
            Some(request) => self
                .jump_to_edge(request.direction, request.force_long_jump, request.modifiers)
                .map(Some),
            None => Ok(None),
        }
    }

    /// Scrolls so that `in_item` into `id`'s row is at the viewport start.
    ///
    /// Returns `Ok(false)` if the item is indexed but detached. Items outside
    /// the materialized rows re-seed the window around them.
    pub fn scroll_to_item(
        &mut self,
        id: &D::Id,
        in_item: f64,
    ) -> Result<bool, ListError<F::Error>> {
        self.take_deferred()?;
        if !self.index.contains(id) {
            return Err(IndexError::NotFound.into());
        }
        if !self.is_attached(id) {
            return Ok(false);
        }
        let in_item = if in_item.is_finite() { in_item } else { 0.0 };
        if let Some(offset) = self.row_handle(id).and_then(|h| self.rows.offset(h)) {
            self.offset = offset + in_item;
        } else {
            self.clear_rows()?;
            self.offset = 0.0;
            self.seed = Some(Seed::Item {
                id: id.clone(),
                in_item,
            });
        }
        self.maintain(true)?;
        Ok(true)
    }

    /// Scrolls the main axis to `offset`, relative to the first materialized
    /// row. Non-finite offsets are ignored.
    pub fn scroll_to(&mut self, offset: f64) -> Result<(), ListError<F::Error>> {
        self.take_deferred()?;
        if !offset.is_finite() {
            return Ok(());
        }
        self.offset = offset;
        self.maintain(true)
    }

    /// Scrolls the main axis by `delta`.
    pub fn scroll_by(&mut self, delta: f64) -> Result<(), ListError<F::Error>> {
        self.scroll_to(self.offset + delta)
    }

    /// Sets the cross-axis offset, clamped to the widest row.
    pub fn set_cross_offset(&mut self, offset: f64) {
        let max = (self.rows.max_cross_extent() - self.viewport_cross()).max(0.0);
        let offset = if offset.is_finite() {
            offset.clamp(0.0, max)
        } else {
            0.0
        };
        if offset != self.cross_offset {
            self.cross_offset = offset;
            self.timers.arm(TimerKind::ScrollBarRefresh);
        }
    }

    /// Handles a value reported by the host's scroll bar for `axis`.
    ///
    /// Values this list pushed itself are ignored.
    pub fn scroll_bar_moved(&mut self, axis: Axis, value: i32) -> Result<(), ListError<F::Error>> {
        match self.scroll_bars.user_value(axis, value) {
            None => self.take_deferred(),
            Some(ScrollTarget::Offset(offset)) => self.scroll_to(offset),
            Some(ScrollTarget::CrossOffset(offset)) => {
                self.set_cross_offset(offset);
                self.take_deferred()
            }
            Some(ScrollTarget::Item {
                from,
                count,
                in_item,
            }) => match self.nth_attached(from, count) {
                Some(id) => self.scroll_to_item(&id, in_item).map(|_| ()),
                None => self.take_deferred(),
            },
        }
    }

    /// The `count`-th attached item from the loaded range's `from` edge.
    fn nth_attached(&self, from: Direction, count: usize) -> Option<D::Id> {
        let bound = self.prefetch.range().bound_id(from)?;
        self.index
            .range(Cursor::Including(bound), from.opposite(), count.saturating_add(1))
            .filter(|(key, id, _)| self.prefetch.range().contains(key, id))
            .last()
            .map(|(_, id, _)| id.clone())
    }

    /// Handles a wheel delta (120 per notch, positive toward the beginning).
    pub fn wheel(&mut self, axis: Axis, delta: f64) -> Result<(), ListError<F::Error>> {
        let steps = self.scroll_bars.accumulate_wheel(axis, delta);
        if steps == 0 {
            return self.take_deferred();
        }
        let row = match axis {
            Axis::Main => self.average_extent(),
            Axis::Cross => self.config.cross_step.max(0.0),
        };
        let amount = -f64::from(steps) * row * self.config.wheel_rows_per_step as f64;
        match axis {
            Axis::Main => self.scroll_by(amount),
            Axis::Cross => {
                self.set_cross_offset(self.cross_offset + amount);
                self.take_deferred()
            }
        }
    }

    // --- Geometry ---

    /// Resizes the viewport.
    ///
    /// The window is adjusted right away; prefetch is re-evaluated once
    /// resizing settles (see [`TimerKind::ResizeSettle`]).
    pub fn set_viewport_size(&mut self, size: Size) -> Result<(), ListError<F::Error>> {
        self.take_deferred()?;
        if size == self.viewport {
            return Ok(());
        }
        self.viewport = size;
        self.timers.arm(TimerKind::ResizeSettle);
        self.maintain(false)
    }

    /// Re-measures `id`'s row. Returns `Ok(false)` if it is not materialized.
    pub fn set_row_size(&mut self, id: &D::Id, size: Size) -> Result<bool, ListError<F::Error>> {
        self.take_deferred()?;
        let Some(handle) = self.row_handle(id) else {
            return Ok(false);
        };
        let before = self.anchor_offset();
        self.rows.set_size(handle, size)?;
        self.shift_for_anchor(before);
        self.maintain(false)?;
        Ok(true)
    }

    /// Applies pending configuration changes and runs a maintenance pass.
    pub fn refresh(&mut self) -> Result<(), ListError<F::Error>> {
        self.take_deferred()?;
        self.maintain(true)
    }

    /// Recomputes both scroll bars from the current geometry.
    ///
    /// Counts the hidden loaded items on each side, which is linear in the
    /// loaded range; maintenance passes schedule it through
    /// [`TimerKind::ScrollBarRefresh`] instead of calling it directly.
    pub fn sync_scroll_bars(&mut self) -> bool {
        let hidden_before = self.hidden_items(Direction::Before);
        let hidden_after = self.hidden_items(Direction::After);
        let average = self.average_extent();
        let geometry = ScrollGeometry {
            before_estimate: hidden_before as f64 * average,
            content_extent: self.rows.total_extent(),
            after_estimate: hidden_after as f64 * average,
            hidden_before,
            hidden_after,
            average_extent: average,
            offset: self.offset,
            viewport_main: self.viewport_main(),
            cross_content: self.rows.max_cross_extent(),
            cross_offset: self.cross_offset,
            viewport_cross: self.viewport_cross(),
            cross_step: self.config.cross_step,
        };
        let changed = self.scroll_bars.sync_from_content(
            geometry,
            self.config.main_scroll_bar,
            self.config.cross_scroll_bar,
        );
        if changed {
            self.events.push(ListEvent::ScrollBarsChanged);
        }
        changed
    }

    /// Attached items beyond the materialized rows on `side`.
    fn hidden_items(&self, side: Direction) -> usize {
        let edge_row = match side {
            Direction::Before => self.head_id(),
            Direction::After => self.tail_id(),
        };
        let (Some(bound), Some(edge_row)) = (self.prefetch.range().bound_id(side), edge_row) else {
            return 0;
        };
        if bound == edge_row {
            return 0;
        }
        let between = match side {
            Direction::Before => self.index.count_between(Some(bound), Some(edge_row), usize::MAX),
            Direction::After => self.index.count_between(Some(edge_row), Some(bound), usize::MAX),
        };
        between + 1
    }

    // --- Time ---

    /// Records the host's current time without firing timers.
    ///
    /// Debounce timers armed by later calls are measured from `now`. Hosts that
    /// tick only while timers are pending should call this before dispatching
    /// input, so a burst of resizes is settled after it ends rather than
    /// against the time of the last [`tick`](Self::tick). Times earlier than one
    /// already seen are ignored.
    pub fn set_now(&mut self, now: Duration) {
        self.timers.set_now(now);
    }

    /// Fires every timer due at `now`.
    pub fn tick(&mut self, now: Duration) -> Result<(), ListError<F::Error>> {
        self.take_deferred()?;
        for kind in self.timers.advance(now) {
            match kind {
                TimerKind::ResizeSettle => self.maintain(true)?,
                TimerKind::ScrollBarRefresh => {
                    self.sync_scroll_bars();
                }
                TimerKind::ItemCountCheck => {
                    if let Some(reason) = self.find_inconsistency() {
                        warn!(reason, "materialized window is inconsistent; re-laying out");
                        self.relayout()?;
                    }
                }
            }
        }
        Ok(())
    }

    // --- Batching ---

    /// Starts a batch of edits.
    ///
    /// Until the returned guard (and every guard nested inside it) ends,
    /// edits update the index and splice rows but defer window growth,
    /// viewport recomputation, prefetch, and scroll bar updates. The batch ends
    /// when the guard is dropped or [`finish`](ItemRangeChange::finish)ed.
    pub fn begin_item_range_change(&mut self) -> ItemRangeChange<'_, D, F> {
        self.batch_depth += 1;
        ItemRangeChange {
            list: self,
            finished: false,
        }
    }

    fn end_item_range_change(&mut self) -> Result<(), ListError<F::Error>> {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 && self.batch_dirty {
            self.batch_dirty = false;
            let prefetch = mem::take(&mut self.batch_prefetch);
            self.maintain(prefetch)?;
        }
        Ok(())
    }

    // --- Invariants ---

    /// Cross-checks the materialized rows against the item index.
    ///
    /// Verifies row positions and offsets, that every row belongs to an
    /// attached item that owns it, that rows follow the order view without
    /// gaps, and that no item owns a row the container does not know about.
    ///
    /// Outside a batch, and once configuration changes have been applied, it
    /// also checks that the window is settled: each side keeps at most
    /// `margin + window_slack` hidden rows, and fewer than `margin` only when
    /// no attached item remains beyond that side's edge row.
    pub fn check_invariants(&self) -> Result<(), ListError<F::Error>> {
        match self
            .find_inconsistency()
            .or_else(|| self.find_unsettled_side())
        {
            Some(reason) => Err(ListError::InconsistentWindow(reason)),
            None => Ok(()),
        }
    }

    fn find_unsettled_side(&self) -> Option<&'static str> {
        if self.batch_depth > 0 || self.config_dirty {
            return None;
        }
        let margin = self.margin();
        let limit = margin.saturating_add(self.config.window_slack);
        for side in [Direction::Before, Direction::After] {
            let hidden = self.hidden_rows(side, limit.saturating_add(1));
            if hidden > limit {
                return Some("more hidden rows than margin plus slack");
            }
            let edge = match side {
                Direction::Before => self.head_id(),
                Direction::After => self.tail_id(),
            };
            let more = edge.is_some_and(|id| self.attached_neighbor(id, side).is_some());
            if hidden < margin && more {
                return Some("margin left short of attached items");
            }
        }
        None
    }

    fn find_inconsistency(&self) -> Option<&'static str> {
        if !self.rows.check_positions() {
            return Some("row positions are out of sequence");
        }
        let mut prev: Option<&D::Id> = None;
        for handle in self.rows.iter() {
            let Some(id) = self.rows.id(handle) else {
                return Some("row has no identity");
            };
            let Some((key, record)) = self.index.find(id) else {
                return Some("materialized row has no indexed item");
            };
            if record.row.as_ref().map(|m| m.handle) != Some(handle) {
                return Some("item does not own its row");
            }
            if !self.prefetch.range().contains(key, id) {
                return Some("detached item is materialized");
            }
            if prev.is_some_and(|p| self.index.next_of(p) != Some(id)) {
                return Some("gap inside the materialized window");
            }
            prev = Some(id);
        }
        let owned = self
            .index
            .iter()
            .filter(|(_, _, record)| record.row.is_some())
            .count();
        if owned != self.rows.len() {
            return Some("materialized item count does not match the rows");
        }
        None
    }

    /// Drops every row, including any an item still holds without the
    /// container knowing, and rebuilds the window at the first visible item.
    fn relayout(&mut self) -> Result<(), ListError<F::Error>> {
        let seed = self.tracker.first_visible().and_then(|h| {
            let id = self.rows.id(h)?.clone();
            let in_item = self.offset - self.rows.offset(h)?;
            Some(Seed::Item { id, in_item })
        });
        self.rows.clear();
        self.tracker.clear_anchor();
        let stray: Vec<F::Row> = self
            .index
            .values_mut()
            .filter_map(|record| record.row.take())
            .map(|m| m.row)
            .collect();
        let disposed = self.dispose_all(stray);
        self.offset = 0.0;
        self.seed = seed;
        self.maintain(true)?;
        disposed
    }

    // --- Row lifecycle ---

    fn build(&mut self, id: &D::Id) -> Result<(F::Row, Size), ListError<F::Error>> {
        let record = self.index.get(id).ok_or(IndexError::NotFound)?;
        let row = self.factory.build(&record.data).map_err(ListError::Build)?;
        let size = self.factory.size_of(&row);
        trace!(?id, "materialized row");
        Ok((row, size))
    }

    fn attach_rows(
        &mut self,
        after: Option<RowHandle>,
        built: Vec<Built<D::Id, F::Row>>,
    ) -> Result<(), ListError<F::Error>> {
        let handles = self
            .rows
            .insert_range_after(after, built.iter().map(|(id, size, _)| (id.clone(), *size)))?;
        for ((id, _, row), handle) in built.into_iter().zip(handles) {
            if let Some(record) = self.index.get_mut(&id) {
                record.row = Some(Materialized { handle, row });
            }
        }
        Ok(())
    }

    /// Unlinks and disposes `id`'s row, if it has one. Returns the removed
    /// main-axis extent.
    fn destroy_row(&mut self, id: &D::Id) -> Result<f64, ListError<F::Error>> {
        let Some(materialized) = self.index.get_mut(id).and_then(|r| r.row.take()) else {
            return Ok(0.0);
        };
        self.tracker
            .reanchor_before_removal(&self.rows, materialized.handle);
        let extent = self.rows.extent(materialized.handle).unwrap_or(0.0);
        self.rows.remove(materialized.handle)?;
        trace!(?id, "destroyed row");
        self.factory
            .dispose(materialized.row)
            .map_err(ListError::Dispose)?;
        Ok(extent)
    }

    /// Destroys `id`'s row while keeping the anchor row still on screen.
    fn destroy_preserving_anchor(&mut self, id: &D::Id) -> Result<(), ListError<F::Error>> {
        let Some(handle) = self.row_handle(id) else {
            return Ok(());
        };
        self.tracker.reanchor_before_removal(&self.rows, handle);
        let before = self.anchor_offset();
        let result = self.destroy_row(id);
        self.shift_for_anchor(before);
        result.map(|_| ())
    }

    fn anchor_offset(&self) -> Option<f64> {
        self.tracker.anchor().and_then(|h| self.rows.offset(h))
    }

    fn shift_for_anchor(&mut self, before: Option<f64>) {
        if let (Some(before), Some(after)) = (before, self.anchor_offset()) {
            self.offset += after - before;
        }
    }

    /// Disposes every materialized row, keeping the index.
    fn clear_rows(&mut self) -> Result<(), ListError<F::Error>> {
        let ids = self.rows.clear();
        self.tracker.clear_anchor();
        let rows: Vec<F::Row> = ids
            .iter()
            .filter_map(|id| self.index.get_mut(id).and_then(|r| r.row.take()))
            .map(|m| m.row)
            .collect();
        self.dispose_all(rows)
    }

    /// Disposes every row, returning the first failure.
    fn dispose_all(&mut self, rows: impl IntoIterator<Item = F::Row>) -> Result<(), ListError<F::Error>> {
        let mut first_err = None;
        for row in rows {
            if let Err(err) = self.factory.dispose(row) {
                first_err.get_or_insert(ListError::Dispose(err));
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Disposes rows on an error path that already has an error to report.
    fn discard(&mut self, rows: impl IntoIterator<Item = F::Row>) {
        if self.dispose_all(rows).is_err() {
            warn!("row disposer failed while unwinding a failed edit");
        }
    }

    // --- Maintenance ---

    fn apply_config(&mut self) {
        if !mem::take(&mut self.config_dirty) {
            return;
        }
        self.rows.set_orientation(self.config.orientation);
        self.jump
            .configure(self.config.jump_edge, self.config.jump_control_enabled);
        self.timers.set_delays(
            self.config.resize_settle_delay,
            self.config.scroll_bar_refresh_delay,
            self.config.item_count_check_delay,
        );
    }

    /// Restores the window to the visible rows plus the margin on each side,
    /// then refreshes everything derived from it.
    fn maintain(&mut self, prefetch: bool) -> Result<(), ListError<F::Error>> {
        if self.batch_depth > 0 {
            self.batch_dirty = true;
            self.batch_prefetch |= prefetch;
            return Ok(());
        }
        self.apply_config();
        if let Some(edge) = self.pending_edge_load.filter(|_| self.can_size_window()) {
            self.request_edge_load(edge);
        }
        self.seed_window()?;

        let slack = self.config.window_slack;
        for _ in 0..MAX_SETTLE_PASSES {
            let before = (self.rows.revision(), self.offset);
            let margin = self.margin();
            self.grow_before(margin)?;
            self.grow_after(margin)?;
            self.trim(margin, slack)?;
            self.clamp_offset();
            if (self.rows.revision(), self.offset) == before {
                break;
            }
        }

        self.refresh_viewport();
        if prefetch {
            self.evaluate_prefetch();
        }
        self.refresh_jump_control();
        self.timers.arm(TimerKind::ScrollBarRefresh);
        self.timers.arm(TimerKind::ItemCountCheck);
        Ok(())
    }

    fn seed_window(&mut self) -> Result<(), ListError<F::Error>> {
        if !self.rows.is_empty() || self.prefetch.range().is_empty() {
            return Ok(());
        }
        let edge = match self.seed.take() {
            Some(Seed::Item { id, in_item }) if self.is_attached(&id) => {
                return self.seed_at(id, in_item, false);
            }
            Some(Seed::Edge(edge)) => edge,
            Some(Seed::Item { .. }) | None => self.config.initial_edge,
        };
        let Some(id) = self.prefetch.range().bound_id(edge).cloned() else {
            return Ok(());
        };
        self.seed_at(id, 0.0, edge == Direction::After)
    }

    fn seed_at(&mut self, id: D::Id, in_item: f64, align_end: bool) -> Result<(), ListError<F::Error>> {
        let (row, size) = self.build(&id)?;
        let extent = self.orientation().main(size);
        debug!(?id, align_end, "seeding window");
        self.attach_rows(None, alloc::vec![(id, size, row)])?;
        self.offset = if align_end {
            extent - self.viewport_main()
        } else {
            in_item
        };
        self.tracker.clear_anchor();
        Ok(())
    }

    /// Rows entirely before (or after) the viewport, counted up to `limit`.
    fn hidden_rows(&self, side: Direction, limit: usize) -> usize {
        let start = self.offset;
        let end = self.offset + self.viewport_main();
        match side {
            Direction::Before => self
                .rows
                .iter()
                .take_while(|h| self.rows.span(*h).is_some_and(|s| s.end <= start))
                .take(limit)
                .count(),
            Direction::After => self
                .rows
                .iter_rev()
                .take_while(|h| self.rows.span(*h).is_some_and(|s| s.start >= end))
                .take(limit)
                .count(),
        }
    }

    fn grow_before(&mut self, margin: usize) -> Result<(), ListError<F::Error>> {
        let Some(mut cursor) = self.head_id().cloned() else {
            return Ok(());
        };
        let mut hidden = self.hidden_rows(Direction::Before, margin);
        let mut offset = self.offset;
        let mut built = Vec::new();
        while offset < 0.0 || hidden < margin {
            let Some(prev) = self.attached_neighbor(&cursor, Direction::Before) else {
                break;
            };
            let (row, size) = match self.build(&prev) {
                Ok(pair) => pair,
                Err(err) => {
                    self.discard(built.into_iter().map(|(_, _, row)| row));
                    return Err(err);
                }
            };
            if offset >= 0.0 {
                hidden += 1;
            }
            offset += self.orientation().main(size);
            built.push((prev.clone(), size, row));
            cursor = prev;
        }
        if built.is_empty() {
            return Ok(());
        }
        built.reverse();
        self.attach_rows(None, built)?;
        self.offset = offset;
        Ok(())
    }

    fn grow_after(&mut self, margin: usize) -> Result<(), ListError<F::Error>> {
        let Some(mut cursor) = self.tail_id().cloned() else {
            return Ok(());
        };
        let view_end = self.offset + self.viewport_main();
        let mut hidden = self.hidden_rows(Direction::After, margin);
        let mut total = self.rows.total_extent();
        let mut built = Vec::new();
        while total < view_end || hidden < margin {
            let Some(next) = self.attached_neighbor(&cursor, Direction::After) else {
                break;
            };
            let (row, size) = match self.build(&next) {
                Ok(pair) => pair,
                Err(err) => {
                    self.discard(built.into_iter().map(|(_, _, row)| row));
                    return Err(err);
                }
            };
            if total >= view_end {
                hidden += 1;
            }
            total += self.orientation().main(size);
            built.push((next.clone(), size, row));
            cursor = next;
        }
        if built.is_empty() {
            return Ok(());
        }
        self.attach_rows(self.rows.tail(), built)
    }

    /// Trims a side back to `margin` hidden rows once it exceeds
    /// `margin + slack`.
    fn trim(&mut self, margin: usize, slack: usize) -> Result<(), ListError<F::Error>> {
        let limit = margin.saturating_add(slack);
        if self.hidden_rows(Direction::Before, limit.saturating_add(1)) > limit {
            let excess = self.hidden_rows(Direction::Before, usize::MAX) - margin;
            for _ in 0..excess {
                let Some(head) = self.head_id().cloned() else {
                    break;
                };
                self.offset -= self.destroy_row(&head)?;
            }
        }
        if self.hidden_rows(Direction::After, limit.saturating_add(1)) > limit {
            let excess = self.hidden_rows(Direction::After, usize::MAX) - margin;
            for _ in 0..excess {
                let Some(tail) = self.tail_id().cloned() else {
                    break;
                };
                self.destroy_row(&tail)?;
            }
        }
        Ok(())
    }

    fn clamp_offset(&mut self) {
        let max = (self.rows.total_extent() - self.viewport_main()).max(0.0);
        self.offset = if self.offset.is_finite() {
            self.offset.clamp(0.0, max)
        } else {
            0.0
        };
    }

    fn edge_rows(&self) -> EdgeRows {
        let range = self.prefetch.range();
        EdgeRows {
            begin: self.tracker.is_reached(Direction::Before)
                && self.head_id().is_some()
                && self.head_id() == range.bound_id(Direction::Before),
            end: self.tracker.is_reached(Direction::After)
                && self.tail_id().is_some()
                && self.tail_id() == range.bound_id(Direction::After),
        }
    }

    fn refresh_viewport(&mut self) {
        let edges = self.edge_rows();
        let viewport = self.viewport_main();
        let epsilon = self.config.edge_epsilon;
        let changed =
            match self
                .tracker
                .recompute(&self.rows, self.offset, viewport, edges, epsilon)
            {
                Ok(changed) => changed,
                Err(_) => {
                    warn!("viewport anchor was stale; re-laying out from the first row");
                    self.tracker
                        .recompute(&self.rows, self.offset, viewport, edges, epsilon)
                        .unwrap_or(true)
                }
            };
        if changed {
            self.events.push(ListEvent::ViewportChanged {
                first: self.tracker.first_visible_id().cloned(),
                last: self.tracker.last_visible_id().cloned(),
            });
        }

        let materialized = self.head_id().cloned().zip(self.tail_id().cloned());
        if materialized != self.materialized {
            self.events.push(ListEvent::ItemRangeChanged {
                first: materialized.as_ref().map(|(first, _)| first.clone()),
                last: materialized.as_ref().map(|(_, last)| last.clone()),
            });
            self.materialized = materialized;
        }
    }

    /// Loaded items beyond the visible run on `side`, counted up to `limit`.
    fn remaining_beyond_visible(&self, side: Direction, limit: usize) -> usize {
        let visible = match side {
            Direction::Before => self.tracker.first_visible_id(),
            Direction::After => self.tracker.last_visible_id(),
        };
        let (Some(visible), Some(bound)) = (visible, self.prefetch.range().bound_id(side)) else {
            return 0;
        };
        if visible == bound {
            return 0;
        }
        let between = match side {
            Direction::Before => self.index.count_between(Some(bound), Some(visible), limit),
            Direction::After => self.index.count_between(Some(visible), Some(bound), limit),
        };
        (between + 1).min(limit)
    }

    fn evaluate_prefetch(&mut self) {
        if self.prefetch.range().is_empty() {
            return;
        }
        let window = self.prefetch_window();
        let threshold = self.config.threshold();
        for side in [Direction::Before, Direction::After] {
            let remaining = self.remaining_beyond_visible(side, window);
            let reached = self.tracker.is_reached(side);
            if let Some(request) = self
                .prefetch
                .evaluate(side, remaining, window, threshold, reached)
            {
                debug!(
                    id = %request.id,
                    ?side,
                    count = request.count,
                    remaining,
                    "prefetch requested"
                );
                self.events.push(ListEvent::Prefetch(request));
            }
        }
    }

    fn refresh_jump_control(&mut self) {
        let changed = if self.index.is_empty() {
            self.jump.hide()
        } else {
            let edge = self.jump.edge();
            let limit = self.config.badge_limit;
            let shown = match edge {
                Direction::Before => self.tracker.at_begin(),
                Direction::After => self.tracker.at_end(),
            };
            let visible = match edge {
                Direction::Before => self.tracker.first_visible_id(),
                Direction::After => self.tracker.last_visible_id(),
            };
            let hidden = match (edge, visible) {
                (_, None) => self.index.len().min(limit.saturating_add(1)),
                (Direction::Before, Some(v)) => {
                    self.index.count_between(None, Some(v), limit.saturating_add(1))
                }
                (Direction::After, Some(v)) => {
                    self.index.count_between(Some(v), None, limit.saturating_add(1))
                }
            };
            let reached = self.tracker.is_reached(edge);
            self.jump.update(shown, reached, hidden, limit)
        };
        if changed {
            self.events.push(ListEvent::JumpControlChanged);
        }
    }
}

/// Guard returned by [`FlyweightList::begin_item_range_change`].
///
/// Dereferences to the list, so edits go through the guard. Dropping the guard
/// ends the batch; an error raised while doing so is kept and returned by the
/// list's next fallible call. Use [`finish`](Self::finish) to receive it
/// directly instead.
#[must_use = "the batch ends as soon as the guard is dropped"]
pub struct ItemRangeChange<'a, D: Keyed, F: RowFactory<D>> {
    list: &'a mut FlyweightList<D, F>,
    finished: bool,
}

impl<D: Keyed, F: RowFactory<D>> ItemRangeChange<'_, D, F> {
    /// Ends the batch, running the deferred maintenance pass if this was the
    /// outermost guard.
    pub fn finish(mut self) -> Result<(), ListError<F::Error>> {
        self.finished = true;
        self.list.end_item_range_change()
    }
}

impl<D: Keyed, F: RowFactory<D>> Deref for ItemRangeChange<'_, D, F> {
    type Target = FlyweightList<D, F>;

    fn deref(&self) -> &Self::Target {
        self.list
    }
}

impl<D: Keyed, F: RowFactory<D>> DerefMut for ItemRangeChange<'_, D, F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.list
    }
}

impl<D: Keyed, F: RowFactory<D>> Drop for ItemRangeChange<'_, D, F> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.list.end_item_range_change() {
            self.list.deferred_error.get_or_insert(err);
        }
    }
}

impl<D: Keyed, F: RowFactory<D>> Debug for ItemRangeChange<'_, D, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRangeChange")
            .field("depth", &self.list.batch_depth)
            .finish_non_exhaustive()
    }
}
