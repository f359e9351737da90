// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two-way binding between integer scroll bars and the list's scroll state.
//!
//! The main-axis bar spans the *virtual* content: the measured extent of the
//! materialized rows plus an estimate (hidden item count * average extent) for
//! the loaded items that are not materialized. Moving the bar inside the
//! materialized part becomes a plain offset change; moving it into an estimated
//! region becomes an item target the list re-anchors at.
//!
//! Values pushed into the bars by [`ScrollBarSync::sync_from_content`] are
//! remembered, so when the host's scroll bar reports them back they are
//! recognized as echoes and ignored instead of scrolling the list again.

use crate::index::Direction;
use crate::orientation::Axis;

/// Angle delta of one wheel notch.
pub const WHEEL_DELTA_PER_STEP: f64 = 120.0;

/// When a scroll bar is shown.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollBarPolicy {
    /// Shown only when the content overflows the viewport.
    #[default]
    AsNeeded,
    /// Always shown.
    AlwaysOn,
    /// Never shown; the axis can still be scrolled programmatically.
    AlwaysOff,
}

impl ScrollBarPolicy {
    const fn shows(self, overflows: bool) -> bool {
        match self {
            Self::AsNeeded => overflows,
            Self::AlwaysOn => true,
            Self::AlwaysOff => false,
        }
    }
}

/// Integer scroll bar model, as exposed to the host's scroll bar widget.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ScrollBar {
    /// Smallest value.
    pub minimum: i32,
    /// Largest value.
    pub maximum: i32,
    /// Amount moved by a page step; also the visible span.
    pub page_step: i32,
    /// Amount moved by an arrow step.
    pub single_step: i32,
    /// Current value.
    pub value: i32,
    /// Whether the bar should be shown.
    pub visible: bool,
}

/// Snapshot of the list geometry a scroll bar sync works from.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ScrollGeometry {
    /// Estimated extent of loaded items before the materialized rows.
    pub before_estimate: f64,
    /// Measured extent of the materialized rows.
    pub content_extent: f64,
    /// Estimated extent of loaded items after the materialized rows.
    pub after_estimate: f64,
    /// Hidden (loaded, not materialized) items before the rows.
    pub hidden_before: usize,
    /// Hidden items after the rows.
    pub hidden_after: usize,
    /// Extent used per hidden item.
    pub average_extent: f64,
    /// Main-axis offset within the materialized rows.
    pub offset: f64,
    /// Viewport extent along the main axis.
    pub viewport_main: f64,
    /// Widest row along the cross axis.
    pub cross_content: f64,
    /// Cross-axis offset.
    pub cross_offset: f64,
    /// Viewport extent along the cross axis.
    pub viewport_cross: f64,
    /// Cross-axis single step.
    pub cross_step: f64,
}

impl ScrollGeometry {
    /// Total virtual extent along the main axis.
    #[must_use]
    pub fn virtual_extent(&self) -> f64 {
        self.before_estimate + self.content_extent + self.after_estimate
    }
}

/// Where a user-originated scroll bar move should take the list.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ScrollTarget {
    /// Main-axis offset inside the materialized rows.
    Offset(f64),
    /// A hidden item, counted from the nearer list edge, plus an offset into it.
    Item {
        /// Edge the count starts from.
        from: Direction,
        /// Zero-based number of loaded items between that edge and the target.
        count: usize,
        /// Offset into the target item along the main axis.
        in_item: f64,
    },
    /// Cross-axis offset.
    CrossOffset(f64),
}

/// Main- and cross-axis scroll bars plus wheel accumulation.
#[derive(Clone, Debug, Default)]
pub struct ScrollBarSync {
    bars: [ScrollBar; 2],
    echo: [Option<i32>; 2],
    wheel: [f64; 2],
    geometry: ScrollGeometry,
}

const fn axis_slot(axis: Axis) -> usize {
    match axis {
        Axis::Main => 0,
        Axis::Cross => 1,
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "Scroll bar values are pixel counts; `as` saturates out-of-range values"
)]
fn round_to_i32(value: f64) -> i32 {
    if value >= 0.0 {
        (value + 0.5) as i32
    } else {
        (value - 0.5) as i32
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "Used for non-negative item counts; `as` saturates out-of-range values"
)]
fn floor_to_usize(value: f64) -> usize {
    value.max(0.0) as usize
}

impl ScrollBarSync {
    /// Creates hidden, empty scroll bars.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of the bar for `axis`.
    #[must_use]
    pub fn bar(&self, axis: Axis) -> ScrollBar {
        self.bars[axis_slot(axis)]
    }

    /// Geometry from the last [`sync_from_content`](Self::sync_from_content).
    #[must_use]
    pub fn geometry(&self) -> ScrollGeometry {
        self.geometry
    }

    /// Recomputes both bars from content geometry.
    ///
    /// Returns `true` if either bar changed. Changed values are remembered so
    /// their echo through [`user_value`](Self::user_value) is ignored.
    pub fn sync_from_content(
        &mut self,
        geometry: ScrollGeometry,
        main_policy: ScrollBarPolicy,
        cross_policy: ScrollBarPolicy,
    ) -> bool {
        self.geometry = geometry;

        let viewport_main = geometry.viewport_main.max(0.0);
        let main_max = round_to_i32((geometry.virtual_extent() - viewport_main).max(0.0));
        let main = ScrollBar {
            minimum: 0,
            maximum: main_max,
            page_step: round_to_i32(viewport_main).max(1),
            single_step: round_to_i32(geometry.average_extent).max(1),
            value: round_to_i32(geometry.before_estimate + geometry.offset).clamp(0, main_max),
            visible: main_policy.shows(main_max > 0),
        };

        let viewport_cross = geometry.viewport_cross.max(0.0);
        let cross_max = round_to_i32((geometry.cross_content - viewport_cross).max(0.0));
        let cross = ScrollBar {
            minimum: 0,
            maximum: cross_max,
            page_step: round_to_i32(viewport_cross).max(1),
            single_step: round_to_i32(geometry.cross_step).max(1),
            value: round_to_i32(geometry.cross_offset).clamp(0, cross_max),
            visible: cross_policy.shows(cross_max > 0),
        };

        let mut changed = false;
        for (axis, bar) in [(Axis::Main, main), (Axis::Cross, cross)] {
            let slot = axis_slot(axis);
            if self.bars[slot] != bar {
                if self.bars[slot].value != bar.value {
                    self.echo[slot] = Some(bar.value);
                }
                self.bars[slot] = bar;
                changed = true;
            }
        }
        changed
    }

    /// Handles a value reported by the host's scroll bar for `axis`.
    ///
    /// Returns `None` when the value is the echo of a value this sync pushed,
    /// or when it does not move the bar.
    pub fn user_value(&mut self, axis: Axis, value: i32) -> Option<ScrollTarget> {
        let slot = axis_slot(axis);
        if self.echo[slot].take() == Some(value) {
            return None;
        }
        let bar = &mut self.bars[slot];
        let value = value.clamp(bar.minimum, bar.maximum.max(bar.minimum));
        if value == bar.value {
            return None;
        }
        bar.value = value;
        let position = f64::from(value);
        Some(match axis {
            Axis::Cross => ScrollTarget::CrossOffset(position),
            Axis::Main => self.map_main(position),
        })
    }

    fn map_main(&self, position: f64) -> ScrollTarget {
        let g = &self.geometry;
        let average = if g.average_extent > 0.0 {
            g.average_extent
        } else {
            1.0
        };
        let window_start = g.before_estimate;
        let window_end = g.before_estimate + g.content_extent;

        if position < window_start && g.hidden_before > 0 {
            let count = floor_to_usize(position / average).min(g.hidden_before - 1);
            ScrollTarget::Item {
                from: Direction::Before,
                count,
                in_item: (position - count as f64 * average).max(0.0),
            }
        } else if position + g.viewport_main > window_end && g.hidden_after > 0 {
            // The viewport's trailing edge is past the rows; count from the end.
            let from_end = g.virtual_extent() - position;
            // Item `count` from the end spans `from_end` in (count * average, (count + 1) * average].
            let count = floor_to_usize((from_end / average).ceil())
                .saturating_sub(1)
                .min(g.hidden_after - 1);
            let item_start = g.virtual_extent() - (count + 1) as f64 * average;
            if item_start < window_end {
                // The trailing region is shorter than the viewport; stay inside the rows.
                ScrollTarget::Offset((position - window_start).max(0.0))
            } else {
                ScrollTarget::Item {
                    from: Direction::After,
                    count,
                    in_item: (position - item_start).max(0.0),
                }
            }
        } else {
            ScrollTarget::Offset((position - window_start).max(0.0))
        }
    }

    /// Accumulates a wheel delta for `axis` and returns the number of whole
    /// notches crossed.
    ///
    /// Positive deltas scroll toward the beginning. The residual fraction of a
    /// notch carries over to the next call.
    pub fn accumulate_wheel(&mut self, axis: Axis, delta: f64) -> i32 {
        if !delta.is_finite() {
            return 0;
        }
        let slot = axis_slot(axis);
        self.wheel[slot] += delta;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "Truncation toward zero is the intended notch count"
        )]
        let steps = (self.wheel[slot] / WHEEL_DELTA_PER_STEP) as i32;
        self.wheel[slot] -= f64::from(steps) * WHEEL_DELTA_PER_STEP;
        steps
    }

    /// Discards partially accumulated wheel deltas.
    pub fn reset_wheel(&mut self) {
        self.wheel = [0.0; 2];
    }
}
