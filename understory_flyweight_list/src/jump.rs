// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Jump-to-edge control state.

use bitflags::bitflags;

use crate::index::Direction;

bitflags! {
    /// Keyboard modifiers held while a jump was requested.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// Shift key.
        const SHIFT = 1 << 0;
        /// Control key. Forces a long jump.
        const CONTROL = 1 << 1;
    }
}

/// Count of items hidden beyond the control's edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Badge {
    /// Number of hidden items, capped at the badge limit.
    pub count: usize,
    /// `true` when more items exist than `count` shows, either because the
    /// limit was hit or because the edge has not been reached yet.
    pub saturated: bool,
}

/// A jump the host should perform through
/// [`FlyweightList::jump_to_edge`](crate::FlyweightList::jump_to_edge).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct JumpRequest {
    /// Edge to jump to.
    pub direction: Direction,
    /// Skip the short-jump attempt.
    pub force_long_jump: bool,
    /// Modifiers held on activation.
    pub modifiers: Modifiers,
}

/// Satellite control that offers a jump to one list edge.
///
/// The control is visible while it is enabled and its edge is not on screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JumpEdgeControl {
    edge: Direction,
    enabled: bool,
    visible: bool,
    badge: Option<Badge>,
}

impl JumpEdgeControl {
    /// Creates a hidden control for `edge`.
    #[must_use]
    pub const fn new(edge: Direction, enabled: bool) -> Self {
        Self {
            edge,
            enabled,
            visible: false,
            badge: None,
        }
    }

    /// Edge the control jumps to.
    #[must_use]
    pub const fn edge(&self) -> Direction {
        self.edge
    }

    /// Whether the control may be shown.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the control should currently be shown.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Hidden-item badge, if any items are hidden beyond the edge.
    #[must_use]
    pub const fn badge(&self) -> Option<Badge> {
        self.badge
    }

    pub(crate) fn configure(&mut self, edge: Direction, enabled: bool) {
        self.edge = edge;
        self.enabled = enabled;
    }

    /// Refreshes visibility and badge.
    ///
    /// `hidden` is the number of loaded items beyond the edge, counted up to
    /// `limit + 1`. Returns `true` if anything changed.
    pub(crate) fn update(
        &mut self,
        edge_shown: bool,
        edge_reached: bool,
        hidden: usize,
        limit: usize,
    ) -> bool {
        let visible = self.enabled && !edge_shown;
        let badge = (visible && (hidden > 0 || !edge_reached)).then(|| Badge {
            count: hidden.min(limit),
            saturated: hidden > limit || !edge_reached,
        });
        let changed = visible != self.visible || badge != self.badge;
        self.visible = visible;
        self.badge = badge;
        changed
    }

    pub(crate) fn hide(&mut self) -> bool {
        let changed = self.visible || self.badge.is_some();
        self.visible = false;
        self.badge = None;
        changed
    }

    /// Activates the control, returning the jump to perform.
    ///
    /// Returns `None` while the control is hidden.
    #[must_use]
    pub fn activate(&self, modifiers: Modifiers) -> Option<JumpRequest> {
        self.visible.then_some(JumpRequest {
            direction: self.edge,
            force_long_jump: modifiers.contains(Modifiers::CONTROL),
            modifiers,
        })
    }
}
