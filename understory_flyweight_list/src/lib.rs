// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Flyweight List: a virtualized list engine for long, ordered,
//! incrementally loaded item sets.
//!
//! Only the rows near the viewport exist as host row objects. Everything else
//! is data: items are indexed by a total order and by identity, loaded lazily
//! from an asynchronous source in windows, and evicted again once they drift
//! far enough away.
//!
//! The crate is split along the same seams as the engine:
//!
//! - [`OrderedItemIndex`]: items kept simultaneously in `(sort_key, id)` order
//!   and by identity, with neighbor walks and bounded range queries.
//! - [`LinkedRowContainer`]: the doubly-linked sequence of materialized rows,
//!   with cached positions and main-axis offsets, addressed by
//!   generation-checked [`RowHandle`]s.
//! - [`ViewportTracker`]: the visible run of rows and the [`ListState`] edge
//!   state machine.
//! - [`PrefetchController`]: back-pressured load requests and the
//!   [`LoadedRange`] they establish.
//! - [`ScrollBarSync`] and [`JumpEdgeControl`]: satellite controls.
//! - [`FlyweightList`]: the window manager tying them together.
//!
//! This crate does not know about widgets, rendering, or any UI framework.
//! The host provides items through [`Keyed`], builds row objects through a
//! [`RowFactory`], answers [`PrefetchRequest`]s, and drains [`ListEvent`]s.
//! Time is host-driven too: the list arms timers and the host calls
//! [`FlyweightList::tick`] at [`FlyweightList::next_deadline`].
//!
//! ## Minimal example
//!
//! ```rust
//! use kurbo::Size;
//! use understory_flyweight_list::{
//!     FlyweightList, Keyed, ListConfig, ListEvent, ListState, RowFactory,
//! };
//!
//! struct Message {
//!     seq: u64,
//! }
//!
//! impl Keyed for Message {
//!     type SortKey = u64;
//!     type Id = u64;
//!     fn sort_key(&self) -> u64 {
//!         self.seq
//!     }
//!     fn id(&self) -> u64 {
//!         self.seq
//!     }
//! }
//!
//! struct Labels;
//!
//! impl RowFactory<Message> for Labels {
//!     type Row = String;
//!     type Error = core::convert::Infallible;
//!     fn build(&mut self, data: &Message) -> Result<String, Self::Error> {
//!         Ok(format!("message {}", data.seq))
//!     }
//!     fn size_of(&self, _row: &String) -> Size {
//!         Size::new(200.0, 20.0)
//!     }
//! }
//!
//! let mut list = FlyweightList::new(Labels, ListConfig::default());
//! list.set_viewport_size(Size::new(200.0, 100.0)).unwrap();
//!
//! // The list asks for its first window right away.
//! let request = list
//!     .take_events()
//!     .into_iter()
//!     .find_map(|event| match event {
//!         ListEvent::Prefetch(request) => Some(request),
//!         _ => None,
//!     })
//!     .unwrap();
//!
//! // The source only has 12 messages: fewer than requested, so both edges are
//! // now known.
//! list.complete_prefetch(request.id, (0..12).map(|seq| Message { seq }))
//!     .unwrap();
//! assert_eq!(list.state(), ListState::AtBoth);
//! assert_eq!(list.first_visible(), Some(&0));
//! assert_eq!(list.last_visible(), Some(&4));
//! assert_eq!(list.row(&3).map(String::as_str), Some("message 3"));
//! ```
//!
//! All extents and offsets live in a caller-chosen coordinate space (typically
//! logical pixels). This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod config;
mod error;
mod index;
mod jump;
mod list;
mod orientation;
mod prefetch;
mod rows;
mod scrollbar;
mod timer;
mod viewport;

pub use config::{ListConfig, PrefetchSize};
pub use error::{IndexError, ListError, RowError};
pub use index::{Cursor, Direction, OrderedItemIndex, Range};
pub use jump::{Badge, JumpEdgeControl, JumpRequest, Modifiers};
pub use list::{FlyweightList, ItemRangeChange, JumpKind, Keyed, ListEvent, RowFactory};
pub use orientation::{Axis, Orientation};
pub use prefetch::{LoadedRange, PrefetchController, PrefetchRequest, RequestId, Resolved};
pub use rows::{LinkedRowContainer, RowHandle, RowHandles};
pub use scrollbar::{
    ScrollBar, ScrollBarPolicy, ScrollBarSync, ScrollGeometry, ScrollTarget, WHEEL_DELTA_PER_STEP,
};
pub use timer::{SingleShot, TimerKind};
pub use viewport::{EdgeRows, ListState, ViewportTracker};
