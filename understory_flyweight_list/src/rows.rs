// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Doubly-linked container of materialized rows.
//!
//! [`LinkedRowContainer`] is an arena of row linkage records addressed by
//! generation-checked [`RowHandle`]s. It stores only layout metadata (neighbors,
//! sequential position, main-axis offset, size) and the identity key of the
//! item the row belongs to; the host row object itself is owned by its item.
//!
//! Rows are stacked along the main axis of the container's [`Orientation`]
//! with no gaps: a row's offset is the sum of its predecessors' main-axis
//! extents and its position is the number of predecessors.
//!
//! ```rust
//! use kurbo::Size;
//! use understory_flyweight_list::{LinkedRowContainer, Orientation};
//!
//! let mut rows = LinkedRowContainer::new(Orientation::Vertical);
//! let a = rows.insert_after(None, "a", Size::new(100.0, 10.0)).unwrap();
//! let c = rows.insert_after(Some(a), "c", Size::new(100.0, 30.0)).unwrap();
//! let b = rows.insert_after(Some(a), "b", Size::new(100.0, 20.0)).unwrap();
//!
//! assert_eq!(rows.position(c), Some(2));
//! assert_eq!(rows.offset(c), Some(30.0));
//! assert_eq!(rows.total_extent(), 60.0);
//!
//! rows.remove(b).unwrap();
//! assert_eq!(rows.position(c), Some(1));
//! assert_eq!(rows.offset(c), Some(10.0));
//! ```

use alloc::vec::Vec;
use core::ops::Range;

use kurbo::{Rect, Size};
use smallvec::SmallVec;

use crate::error::RowError;
use crate::orientation::Orientation;

/// Identifier for a row in a [`LinkedRowContainer`] (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RowHandle(u32, u32);

impl RowHandle {
    const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Handles returned by [`LinkedRowContainer::insert_range_after`].
pub type RowHandles = SmallVec<[RowHandle; 16]>;

#[derive(Clone, Debug)]
struct RowNode<I> {
    generation: u32,
    id: I,
    prev: Option<RowHandle>,
    next: Option<RowHandle>,
    position: usize,
    offset: f64,
    size: Size,
}

/// Arena-backed doubly-linked list of row layout records.
#[derive(Clone, Debug)]
pub struct LinkedRowContainer<I> {
    slots: Vec<Option<RowNode<I>>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    head: Option<RowHandle>,
    tail: Option<RowHandle>,
    len: usize,
    total_extent: f64,
    orientation: Orientation,
    revision: u64,
}

impl<I> LinkedRowContainer<I> {
    /// Creates an empty container laying rows out along `orientation`.
    #[must_use]
    pub fn new(orientation: Orientation) -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            total_extent: 0.0,
            orientation,
            revision: 0,
        }
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First row.
    #[must_use]
    pub const fn head(&self) -> Option<RowHandle> {
        self.head
    }

    /// Last row.
    #[must_use]
    pub const fn tail(&self) -> Option<RowHandle> {
        self.tail
    }

    /// Sum of every row's main-axis extent.
    #[must_use]
    pub const fn total_extent(&self) -> f64 {
        self.total_extent
    }

    /// Orientation rows are laid out along.
    #[must_use]
    pub const fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Layout revision, bumped on every edit that moves or resizes a row.
    ///
    /// Hosts compare it against the last revision they laid out to decide
    /// whether row visuals need repositioning.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns `true` if `handle` refers to a live row.
    #[must_use]
    pub fn contains(&self, handle: RowHandle) -> bool {
        self.node(handle).is_some()
    }

    fn node(&self, handle: RowHandle) -> Option<&RowNode<I>> {
        self.slots
            .get(handle.idx())?
            .as_ref()
            .filter(|node| node.generation == handle.1)
    }

    fn node_mut(&mut self, handle: RowHandle) -> Option<&mut RowNode<I>> {
        self.slots
            .get_mut(handle.idx())?
            .as_mut()
            .filter(|node| node.generation == handle.1)
    }

    /// Identity key of the item `handle` belongs to.
    #[must_use]
    pub fn id(&self, handle: RowHandle) -> Option<&I> {
        self.node(handle).map(|n| &n.id)
    }

    /// Row following `handle`.
    #[must_use]
    pub fn next(&self, handle: RowHandle) -> Option<RowHandle> {
        self.node(handle)?.next
    }

    /// Row preceding `handle`.
    #[must_use]
    pub fn prev(&self, handle: RowHandle) -> Option<RowHandle> {
        self.node(handle)?.prev
    }

    /// Zero-based position of `handle`, equal to the number of rows before it.
    #[must_use]
    pub fn position(&self, handle: RowHandle) -> Option<usize> {
        self.node(handle).map(|n| n.position)
    }

    /// Main-axis offset of the row's leading edge.
    #[must_use]
    pub fn offset(&self, handle: RowHandle) -> Option<f64> {
        self.node(handle).map(|n| n.offset)
    }

    /// Main-axis extent of the row.
    #[must_use]
    pub fn extent(&self, handle: RowHandle) -> Option<f64> {
        self.node(handle).map(|n| self.orientation.main(n.size))
    }

    /// Measured size of the row.
    #[must_use]
    pub fn size(&self, handle: RowHandle) -> Option<Size> {
        self.node(handle).map(|n| n.size)
    }

    /// Main-axis span `[offset, offset + extent)` of the row.
    #[must_use]
    pub fn span(&self, handle: RowHandle) -> Option<Range<f64>> {
        self.node(handle).map(|n| {
            let extent = self.orientation.main(n.size);
            n.offset..n.offset + extent
        })
    }

    /// Row rectangle in content coordinates, shifted by `cross_offset` along
    /// the cross axis.
    #[must_use]
    pub fn row_rect(&self, handle: RowHandle, cross_offset: f64) -> Option<Rect> {
        self.node(handle).map(|n| {
            self.orientation.rect(
                n.offset,
                -cross_offset,
                self.orientation.main(n.size),
                self.orientation.cross(n.size),
            )
        })
    }

    /// Largest cross-axis extent among the rows.
    #[must_use]
    pub fn max_cross_extent(&self) -> f64 {
        self.slots
            .iter()
            .flatten()
            .map(|n| self.orientation.cross(n.size))
            .fold(0.0, f64::max)
    }

    /// Iterates row handles from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = RowHandle> + '_ {
        core::iter::successors(self.head, |h| self.next(*h))
    }

    /// Iterates row handles from tail to head.
    pub fn iter_rev(&self) -> impl Iterator<Item = RowHandle> + '_ {
        core::iter::successors(self.tail, |h| self.prev(*h))
    }

    fn alloc(&mut self, id: I, size: Size) -> RowHandle {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].wrapping_add(1);
            self.generations[idx] = generation;
            (idx, generation)
        } else {
            self.slots.push(None);
            self.generations.push(0);
            (self.slots.len() - 1, 0)
        };
        self.slots[idx] = Some(RowNode {
            generation,
            id,
            prev: None,
            next: None,
            position: 0,
            offset: 0.0,
            size,
        });
        #[expect(
            clippy::cast_possible_truncation,
            reason = "Row slots are bounded by the materialized window, far below u32::MAX"
        )]
        let slot = idx as u32;
        RowHandle::new(slot, generation)
    }

    /// Inserts a row after `after`, or before the current head when `after` is
    /// `None`.
    pub fn insert_after(
        &mut self,
        after: Option<RowHandle>,
        id: I,
        size: Size,
    ) -> Result<RowHandle, RowError> {
        let handles = self.insert_range_after(after, core::iter::once((id, size)))?;
        Ok(handles[0])
    }

    /// Splices a run of rows after `after` (or before the head when `None`),
    /// keeping the run's order.
    ///
    /// Every row following the insertion point has its position advanced by the
    /// run length and its offset by the run's total extent.
    pub fn insert_range_after(
        &mut self,
        after: Option<RowHandle>,
        rows: impl IntoIterator<Item = (I, Size)>,
    ) -> Result<RowHandles, RowError> {
        let (mut position, mut offset, follower) = match after {
            Some(h) => {
                let node = self.node(h).ok_or(RowError::StaleHandle)?;
                (
                    node.position + 1,
                    node.offset + self.orientation.main(node.size),
                    node.next,
                )
            }
            None => (0, 0.0, self.head),
        };

        let mut handles = RowHandles::new();
        let mut prev = after;
        for (id, size) in rows {
            let handle = self.alloc(id, size);
            let extent = self.orientation.main(size);
            if let Some(node) = self.node_mut(handle) {
                node.prev = prev;
                node.position = position;
                node.offset = offset;
            }
            match prev {
                Some(p) => {
                    if let Some(node) = self.node_mut(p) {
                        node.next = Some(handle);
                    }
                }
                None => self.head = Some(handle),
            }
            prev = Some(handle);
            position += 1;
            offset += extent;
            handles.push(handle);
        }

        let Some(last) = prev.filter(|_| !handles.is_empty()) else {
            return Ok(handles);
        };
        if let Some(node) = self.node_mut(last) {
            node.next = follower;
        }
        match follower {
            Some(f) => {
                if let Some(node) = self.node_mut(f) {
                    node.prev = Some(last);
                }
            }
            None => self.tail = Some(last),
        }

        let count = handles.len();
        let inserted_extent = offset - self.start_of(handles[0]);
        self.shift_from(follower, count as isize, inserted_extent);
        self.len += count;
        self.total_extent += inserted_extent;
        self.revision += 1;
        Ok(handles)
    }

    fn start_of(&self, handle: RowHandle) -> f64 {
        self.node(handle).map_or(0.0, |n| n.offset)
    }

    /// Renumbers `from` and every row after it.
    fn shift_from(&mut self, from: Option<RowHandle>, positions: isize, extent: f64) {
        let mut cursor = from;
        while let Some(h) = cursor {
            let Some(node) = self.node_mut(h) else {
                break;
            };
            node.position = node.position.wrapping_add_signed(positions);
            node.offset += extent;
            cursor = node.next;
        }
    }

    /// Unlinks and frees a row, returning the identity key it carried.
    ///
    /// Every following row moves back by one position and by the removed
    /// row's extent.
    pub fn remove(&mut self, handle: RowHandle) -> Result<I, RowError> {
        let node = self.node(handle).ok_or(RowError::StaleHandle)?;
        let (prev, next) = (node.prev, node.next);
        let extent = self.orientation.main(node.size);

        match prev {
            Some(p) => {
                if let Some(n) = self.node_mut(p) {
                    n.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        self.shift_from(next, -1, -extent);

        let idx = handle.idx();
        let node = self.slots[idx].take().ok_or(RowError::StaleHandle)?;
        self.free_list.push(idx);
        self.len -= 1;
        self.total_extent -= extent;
        if self.len == 0 {
            self.total_extent = 0.0;
        }
        self.revision += 1;
        Ok(node.id)
    }

    /// Updates a row's measured size, shifting every following row by the
    /// change in main-axis extent.
    pub fn set_size(&mut self, handle: RowHandle, size: Size) -> Result<(), RowError> {
        let orientation = self.orientation;
        let node = self.node_mut(handle).ok_or(RowError::StaleHandle)?;
        if node.size == size {
            return Ok(());
        }
        let delta = orientation.main(size) - orientation.main(node.size);
        node.size = size;
        let next = node.next;
        if delta != 0.0 {
            self.shift_from(next, 0, delta);
            self.total_extent += delta;
        }
        self.revision += 1;
        Ok(())
    }

    /// Switches the main axis and re-derives every row offset.
    pub fn set_orientation(&mut self, orientation: Orientation) {
        if self.orientation == orientation {
            return;
        }
        self.orientation = orientation;
        let mut offset = 0.0;
        let mut cursor = self.head;
        while let Some(h) = cursor {
            let Some(node) = self.node_mut(h) else {
                break;
            };
            node.offset = offset;
            offset += orientation.main(node.size);
            cursor = node.next;
        }
        self.total_extent = offset;
        self.revision += 1;
    }

    /// Removes every row, returning their identity keys from head to tail.
    pub fn clear(&mut self) -> Vec<I> {
        let mut ids = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(h) = cursor {
            cursor = self.next(h);
            if let Some(node) = self.slots[h.idx()].take() {
                ids.push(node.id);
                self.free_list.push(h.idx());
            }
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
        self.total_extent = 0.0;
        self.revision += 1;
        ids
    }

    /// Walks head to tail and checks that positions run `0..len`, offsets are
    /// contiguous, and back links mirror forward links.
    #[must_use]
    pub fn check_positions(&self) -> bool {
        let mut expected_prev = None;
        let mut expected_offset = 0.0;
        let mut count = 0;
        let mut cursor = self.head;
        while let Some(h) = cursor {
            let Some(node) = self.node(h) else {
                return false;
            };
            let drift = node.offset - expected_offset;
            if node.position != count
                || node.prev != expected_prev
                || !(-1e-6..=1e-6).contains(&drift)
            {
                return false;
            }
            expected_prev = Some(h);
            expected_offset += self.orientation.main(node.size);
            count += 1;
            cursor = node.next;
        }
        count == self.len && self.tail == expected_prev
    }
}
