// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use thiserror::Error;

/// Errors raised by [`OrderedItemIndex`](crate::OrderedItemIndex).
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// An item with the same identity key is already indexed.
    ///
    /// Remove the existing item first to replace it.
    #[error("an item with this identity key is already indexed")]
    DuplicateIdentity,
    /// No item with the given identity key is indexed.
    #[error("no item with this identity key is indexed")]
    NotFound,
}

/// Errors raised by [`LinkedRowContainer`](crate::LinkedRowContainer).
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum RowError {
    /// The handle refers to a row that has been removed.
    #[error("row handle is stale")]
    StaleHandle,
}

/// Errors raised by [`FlyweightList`](crate::FlyweightList).
///
/// `E` is the error type of the host [`RowFactory`](crate::RowFactory).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListError<E> {
    /// The item index rejected an edit.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// The row container was handed a stale handle.
    #[error(transparent)]
    Row(#[from] RowError),
    /// The row factory failed to build a row.
    #[error("row builder failed: {0}")]
    Build(E),
    /// The row factory failed to dispose a row.
    #[error("row disposer failed: {0}")]
    Dispose(E),
    /// Materialized rows no longer match the item index.
    ///
    /// Only reported by [`FlyweightList::check_invariants`](crate::FlyweightList::check_invariants);
    /// the maintenance pass recovers from it with a full re-layout.
    #[error("materialized window is inconsistent: {0}")]
    InconsistentWindow(&'static str),
}
