// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-shot, rearmable debounce timers driven by host time.
//!
//! The list never reads a clock. Hosts pass the current time to
//! [`FlyweightList::tick`](crate::FlyweightList::tick), which fires whatever
//! timers are due, and may report the time ahead of input through
//! [`FlyweightList::set_now`](crate::FlyweightList::set_now). Rearming a
//! pending timer pushes its deadline back, which is how bursts of resize or
//! scroll events collapse into a single recomputation.

use core::time::Duration;

/// Debounced work the list schedules for itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// The viewport stopped resizing; re-run prefetch evaluation.
    ResizeSettle,
    /// Recompute scroll bar ranges after structural edits.
    ScrollBarRefresh,
    /// Cross-check materialized rows against the item index.
    ItemCountCheck,
}

impl TimerKind {
    const ALL: [Self; 3] = [Self::ResizeSettle, Self::ScrollBarRefresh, Self::ItemCountCheck];

    const fn slot(self) -> usize {
        match self {
            Self::ResizeSettle => 0,
            Self::ScrollBarRefresh => 1,
            Self::ItemCountCheck => 2,
        }
    }
}

/// A single-shot timer with a fixed delay.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SingleShot {
    delay: Duration,
    deadline: Option<Duration>,
}

impl SingleShot {
    /// Creates an idle timer.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Arms the timer to fire `delay` after `now`, replacing any pending deadline.
    pub fn arm(&mut self, now: Duration) {
        self.deadline = Some(now.saturating_add(self.delay));
    }

    /// Cancels a pending deadline.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Returns `true` while a deadline is pending.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Pending deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Changes the delay used by future [`arm`](Self::arm) calls.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Disarms and returns `true` if the deadline has passed.
    pub fn fire_if_due(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// The list's timer set, one [`SingleShot`] per [`TimerKind`].
#[derive(Clone, Debug)]
pub(crate) struct Timers {
    timers: [SingleShot; 3],
    now: Duration,
}

impl Timers {
    pub(crate) fn new(resize: Duration, scrollbars: Duration, count_check: Duration) -> Self {
        Self {
            timers: [
                SingleShot::new(resize),
                SingleShot::new(scrollbars),
                SingleShot::new(count_check),
            ],
            now: Duration::ZERO,
        }
    }

    pub(crate) fn set_delays(&mut self, resize: Duration, scrollbars: Duration, count_check: Duration) {
        self.timers[0].set_delay(resize);
        self.timers[1].set_delay(scrollbars);
        self.timers[2].set_delay(count_check);
    }

    /// Moves the clock forward to `now`. Earlier times are ignored.
    pub(crate) fn set_now(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Arms `kind` relative to the latest time seen by [`Timers::set_now`] or
    /// [`Timers::advance`].
    pub(crate) fn arm(&mut self, kind: TimerKind) {
        let now = self.now;
        self.timers[kind.slot()].arm(now);
    }

    pub(crate) fn cancel_all(&mut self) {
        for timer in &mut self.timers {
            timer.cancel();
        }
    }

    pub(crate) fn is_armed(&self, kind: TimerKind) -> bool {
        self.timers[kind.slot()].is_armed()
    }

    pub(crate) fn next_deadline(&self) -> Option<Duration> {
        self.timers.iter().filter_map(SingleShot::deadline).min()
    }

    /// Records `now` and returns the timers that are due, in [`TimerKind`] order.
    pub(crate) fn advance(&mut self, now: Duration) -> impl Iterator<Item = TimerKind> + use<> {
        self.set_now(now);
        let mut due = [None; 3];
        for kind in TimerKind::ALL {
            if self.timers[kind.slot()].fire_if_due(now) {
                due[kind.slot()] = Some(kind);
            }
        }
        due.into_iter().flatten()
    }
}
