// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! List configuration.
//!
//! Every field can be changed while the list is live through
//! [`FlyweightList::config_mut`](crate::FlyweightList::config_mut); changes take
//! effect on the next maintenance pass.

use core::time::Duration;

use crate::index::Direction;
use crate::orientation::Orientation;
use crate::scrollbar::ScrollBarPolicy;

/// How many items a single prefetch request asks for.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrefetchSize {
    /// A fixed item count.
    Items(usize),
    /// Enough items to fill this many viewports, estimated from the average
    /// row extent.
    Screens(f64),
}

impl Default for PrefetchSize {
    fn default() -> Self {
        Self::Items(50)
    }
}

/// Configuration for a [`FlyweightList`](crate::FlyweightList).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListConfig {
    /// Axis rows are stacked along.
    pub orientation: Orientation,
    /// Size of one prefetch request.
    pub prefetch: PrefetchSize,
    /// Fraction of the prefetch window that may remain loaded beyond the
    /// visible rows before another request fires. Clamped to `[0, 1]`.
    pub prefetch_threshold: f64,
    /// Upper bound on indexed items; older items on the far side are evicted
    /// after a prefetch response pushes the index past it.
    pub max_retained: Option<usize>,
    /// Hidden-item count at which the jump control's badge saturates.
    pub badge_limit: usize,
    /// Hidden rows kept materialized on each side of the viewport. Defaults to
    /// the prefetch window when `None`.
    pub window_margin: Option<usize>,
    /// Extra hidden rows tolerated on a side before it is trimmed back to the
    /// margin.
    pub window_slack: usize,
    /// Edge the first load is anchored at.
    pub initial_edge: Direction,
    /// Whether the jump-to-edge control may be shown.
    pub jump_control_enabled: bool,
    /// Edge the jump control jumps to.
    pub jump_edge: Direction,
    /// Main-axis scroll bar visibility.
    pub main_scroll_bar: ScrollBarPolicy,
    /// Cross-axis scroll bar visibility.
    pub cross_scroll_bar: ScrollBarPolicy,
    /// Rows scrolled per wheel notch. On the cross axis a row is one
    /// [`cross_step`](Self::cross_step).
    pub wheel_rows_per_step: usize,
    /// Cross-axis single step of the scroll bar and the wheel.
    pub cross_step: f64,
    /// Row extent assumed before any row has been measured.
    pub estimated_row_extent: f64,
    /// Distance from an edge still treated as being at that edge.
    pub edge_epsilon: f64,
    /// Quiet period after the last resize before prefetch is re-evaluated.
    pub resize_settle_delay: Duration,
    /// Debounce for scroll bar range refreshes.
    pub scroll_bar_refresh_delay: Duration,
    /// Delay before the materialized rows are cross-checked against the index.
    pub item_count_check_delay: Duration,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::Vertical,
            prefetch: PrefetchSize::default(),
            prefetch_threshold: 0.5,
            max_retained: None,
            badge_limit: 99,
            window_margin: None,
            window_slack: 10,
            initial_edge: Direction::Before,
            jump_control_enabled: true,
            jump_edge: Direction::After,
            main_scroll_bar: ScrollBarPolicy::AsNeeded,
            cross_scroll_bar: ScrollBarPolicy::AsNeeded,
            wheel_rows_per_step: 3,
            cross_step: 20.0,
            estimated_row_extent: 20.0,
            edge_epsilon: 1.0,
            resize_settle_delay: Duration::from_millis(100),
            scroll_bar_refresh_delay: Duration::from_millis(16),
            item_count_check_delay: Duration::from_millis(500),
        }
    }
}

impl ListConfig {
    /// Sets the orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Sets the prefetch request size.
    #[must_use]
    pub fn with_prefetch(mut self, prefetch: PrefetchSize) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Sets the prefetch threshold ratio.
    #[must_use]
    pub fn with_prefetch_threshold(mut self, threshold: f64) -> Self {
        self.prefetch_threshold = threshold;
        self
    }

    /// Bounds the number of indexed items.
    #[must_use]
    pub fn with_max_retained(mut self, max: usize) -> Self {
        self.max_retained = Some(max);
        self
    }

    /// Sets the number of hidden rows kept on each side of the viewport.
    #[must_use]
    pub fn with_window_margin(mut self, margin: usize) -> Self {
        self.window_margin = Some(margin);
        self
    }

    /// Sets the trim slack.
    #[must_use]
    pub fn with_window_slack(mut self, slack: usize) -> Self {
        self.window_slack = slack;
        self
    }

    /// Sets the edge the first load is anchored at.
    #[must_use]
    pub fn with_initial_edge(mut self, edge: Direction) -> Self {
        self.initial_edge = edge;
        self
    }

    /// Sets the row extent assumed before measurement.
    #[must_use]
    pub fn with_estimated_row_extent(mut self, extent: f64) -> Self {
        self.estimated_row_extent = extent;
        self
    }

    /// Sets the cross-axis single step.
    #[must_use]
    pub fn with_cross_step(mut self, step: f64) -> Self {
        self.cross_step = step;
        self
    }

    /// Sets the jump control's edge and whether it may be shown.
    #[must_use]
    pub fn with_jump_control(mut self, enabled: bool, edge: Direction) -> Self {
        self.jump_control_enabled = enabled;
        self.jump_edge = edge;
        self
    }

    /// Sets both scroll bar policies.
    #[must_use]
    pub fn with_scroll_bars(mut self, main: ScrollBarPolicy, cross: ScrollBarPolicy) -> Self {
        self.main_scroll_bar = main;
        self.cross_scroll_bar = cross;
        self
    }

    pub(crate) fn threshold(&self) -> f64 {
        if self.prefetch_threshold.is_finite() {
            self.prefetch_threshold.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Resolves [`ListConfig::prefetch`] to an item count.
    ///
    /// Always at least one so an unreached edge can make progress.
    #[must_use]
    pub fn prefetch_items(&self, viewport_extent: f64, average_extent: f64) -> usize {
        match self.prefetch {
            PrefetchSize::Items(n) => n.max(1),
            PrefetchSize::Screens(screens) => {
                let extent = if average_extent > 0.0 {
                    average_extent
                } else {
                    self.estimated_row_extent.max(1.0)
                };
                let items = (screens.max(0.0) * viewport_extent.max(0.0)) / extent;
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "Item counts are small and non-negative; rounding up is intended"
                )]
                let whole = items as usize;
                let rounded = if items > whole as f64 { whole + 1 } else { whole };
                rounded.max(1)
            }
        }
    }

    /// Resolves the window margin to an item count.
    #[must_use]
    pub fn margin_items(&self, viewport_extent: f64, average_extent: f64) -> usize {
        self.window_margin
            .unwrap_or_else(|| self.prefetch_items(viewport_extent, average_extent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screens_prefetch_rounds_up() {
        let cfg = ListConfig::default().with_prefetch(PrefetchSize::Screens(1.5));
        // 1.5 * 100 / 30 = 5.0 exactly.
        assert_eq!(cfg.prefetch_items(100.0, 30.0), 5);
        // 1.5 * 100 / 40 = 3.75 -> 4.
        assert_eq!(cfg.prefetch_items(100.0, 40.0), 4);
        // Unmeasured rows fall back to the estimate.
        assert_eq!(cfg.prefetch_items(100.0, 0.0), 8);
    }

    #[test]
    fn margin_defaults_to_prefetch_window() {
        let cfg = ListConfig::default().with_prefetch(PrefetchSize::Items(12));
        assert_eq!(cfg.margin_items(100.0, 10.0), 12);
        let cfg = cfg.with_window_margin(3);
        assert_eq!(cfg.margin_items(100.0, 10.0), 3);
    }

    #[test]
    fn threshold_is_clamped() {
        assert_eq!(ListConfig::default().with_prefetch_threshold(4.0).threshold(), 1.0);
        assert_eq!(ListConfig::default().with_prefetch_threshold(f64::NAN).threshold(), 0.0);
    }
}
