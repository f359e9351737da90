// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Orientation-relative geometry accessors.
//!
//! The window manager never reads `width`/`height` or `x`/`y` directly. Every
//! size and position goes through an [`Orientation`], which names one axis the
//! *main* axis (the scroll direction rows are stacked along) and the other the
//! *cross* axis.

use kurbo::{Point, Rect, Size, Vec2};

/// Direction rows are stacked in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    /// Rows are laid out left to right; the main axis is X.
    Horizontal,
    /// Rows are laid out top to bottom; the main axis is Y.
    #[default]
    Vertical,
}

/// One of the two scroll axes, relative to an [`Orientation`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// The axis rows are stacked along.
    Main,
    /// The axis perpendicular to [`Axis::Main`].
    Cross,
}

impl Orientation {
    /// Extent of `size` along the main axis.
    #[must_use]
    pub const fn main(self, size: Size) -> f64 {
        match self {
            Self::Horizontal => size.width,
            Self::Vertical => size.height,
        }
    }

    /// Extent of `size` along the cross axis.
    #[must_use]
    pub const fn cross(self, size: Size) -> f64 {
        match self {
            Self::Horizontal => size.height,
            Self::Vertical => size.width,
        }
    }

    /// Builds a [`Size`] from main- and cross-axis extents.
    #[must_use]
    pub const fn size(self, main: f64, cross: f64) -> Size {
        match self {
            Self::Horizontal => Size::new(main, cross),
            Self::Vertical => Size::new(cross, main),
        }
    }

    /// Builds a [`Point`] from main- and cross-axis coordinates.
    #[must_use]
    pub const fn point(self, main: f64, cross: f64) -> Point {
        match self {
            Self::Horizontal => Point::new(main, cross),
            Self::Vertical => Point::new(cross, main),
        }
    }

    /// Main-axis coordinate of `point`.
    #[must_use]
    pub const fn main_pos(self, point: Point) -> f64 {
        match self {
            Self::Horizontal => point.x,
            Self::Vertical => point.y,
        }
    }

    /// Main-axis component of `delta`.
    #[must_use]
    pub const fn main_delta(self, delta: Vec2) -> f64 {
        match self {
            Self::Horizontal => delta.x,
            Self::Vertical => delta.y,
        }
    }

    /// Cross-axis component of `delta`.
    #[must_use]
    pub const fn cross_delta(self, delta: Vec2) -> f64 {
        match self {
            Self::Horizontal => delta.y,
            Self::Vertical => delta.x,
        }
    }

    /// Rectangle starting at (`main`, `cross`) with the given extents.
    #[must_use]
    pub fn rect(self, main: f64, cross: f64, main_extent: f64, cross_extent: f64) -> Rect {
        Rect::from_origin_size(
            self.point(main, cross),
            self.size(main_extent, cross_extent),
        )
    }

    /// Leading edge of `rect` along the main axis.
    #[must_use]
    pub const fn main_start(self, rect: Rect) -> f64 {
        match self {
            Self::Horizontal => rect.x0,
            Self::Vertical => rect.y0,
        }
    }

    /// Trailing edge of `rect` along the main axis.
    #[must_use]
    pub const fn main_end(self, rect: Rect) -> f64 {
        match self {
            Self::Horizontal => rect.x1,
            Self::Vertical => rect.y1,
        }
    }
}
