// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property-based invariant tests.
//!
//! 1. The item index keeps its order view and identity view in agreement.
//! 2. Row positions and offsets stay sequential under arbitrary edits.
//! 3. The list's materialized window stays consistent with the item index
//!    under arbitrary interleavings of edits, scrolling, and loading.

mod common;

use std::collections::BTreeMap;

use common::{List, Msg, Source, list_with, prefetches};
use kurbo::Size;
use proptest::prelude::*;
use understory_flyweight_list::{
    Direction, LinkedRowContainer, ListConfig, Modifiers, OrderedItemIndex, Orientation,
    PrefetchSize,
};

// ── Item index ──────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum IndexOp {
    Insert { id: u16, key: u8 },
    Erase { id: u16 },
}

fn index_op() -> impl Strategy<Value = IndexOp> {
    prop_oneof![
        3 => (0u16..64, 0u8..16).prop_map(|(id, key)| IndexOp::Insert { id, key }),
        1 => (0u16..64).prop_map(|id| IndexOp::Erase { id }),
    ]
}

proptest! {
    #[test]
    fn index_views_agree(ops in proptest::collection::vec(index_op(), 0..200)) {
        let mut index = OrderedItemIndex::new();
        let mut model: BTreeMap<u16, u8> = BTreeMap::new();

        for op in ops {
            match op {
                IndexOp::Insert { id, key } => {
                    let result = index.insert(key, id, u32::from(id) * 7);
                    prop_assert_eq!(result.is_ok(), !model.contains_key(&id));
                    model.entry(id).or_insert(key);
                }
                IndexOp::Erase { id } => {
                    let erased = index.erase(&id).map(|(key, _)| key);
                    prop_assert_eq!(erased, model.remove(&id));
                }
            }
        }

        prop_assert_eq!(index.len(), model.len());

        let order: Vec<(u8, u16)> = index.iter().map(|(k, id, _)| (*k, *id)).collect();
        let mut expected: Vec<(u8, u16)> = model.iter().map(|(id, k)| (*k, *id)).collect();
        expected.sort_unstable();
        prop_assert_eq!(&order, &expected);

        let by_id: Vec<(u16, u8)> = index.iter_by_id().map(|(id, k, _)| (*id, *k)).collect();
        let model_by_id: Vec<(u16, u8)> = model.iter().map(|(id, k)| (*id, *k)).collect();
        prop_assert_eq!(by_id, model_by_id);

        for pair in order.windows(2) {
            prop_assert_eq!(index.next_of(&pair[0].1), Some(&pair[1].1));
            prop_assert_eq!(index.prev_of(&pair[1].1), Some(&pair[0].1));
        }
        if let (Some(first), Some(last)) = (order.first(), order.last()) {
            prop_assert_eq!(index.first(), Some(&first.1));
            prop_assert_eq!(index.last(), Some(&last.1));
            prop_assert_eq!(
                index.count_between(None, None, usize::MAX),
                order.len()
            );
            prop_assert_eq!(
                index.count_between(Some(&first.1), Some(&last.1), usize::MAX),
                order.len().saturating_sub(2)
            );
        }
    }
}

// ── Row container ───────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum RowOp {
    Insert { at: usize, height: u8 },
    Remove { at: usize },
    Resize { at: usize, height: u8 },
}

fn row_op() -> impl Strategy<Value = RowOp> {
    prop_oneof![
        3 => (any::<usize>(), 1u8..40).prop_map(|(at, height)| RowOp::Insert { at, height }),
        1 => any::<usize>().prop_map(|at| RowOp::Remove { at }),
        1 => (any::<usize>(), 1u8..40).prop_map(|(at, height)| RowOp::Resize { at, height }),
    ]
}

proptest! {
    #[test]
    fn row_layout_stays_sequential(ops in proptest::collection::vec(row_op(), 0..150)) {
        let mut rows = LinkedRowContainer::new(Orientation::Vertical);
        let mut order = Vec::new();
        let mut heights = Vec::new();
        let mut next_id = 0_u32;

        for op in ops {
            match op {
                RowOp::Insert { at, height } => {
                    let at = at % (order.len() + 1);
                    let after = at.checked_sub(1).map(|i| order[i]);
                    let size = Size::new(50.0, f64::from(height));
                    let handle = rows.insert_after(after, next_id, size).unwrap();
                    order.insert(at, handle);
                    heights.insert(at, f64::from(height));
                    next_id += 1;
                }
                RowOp::Remove { at } if !order.is_empty() => {
                    let at = at % order.len();
                    let handle = order.remove(at);
                    heights.remove(at);
                    rows.remove(handle).unwrap();
                    prop_assert!(!rows.contains(handle));
                }
                RowOp::Resize { at, height } if !order.is_empty() => {
                    let at = at % order.len();
                    rows.set_size(order[at], Size::new(50.0, f64::from(height))).unwrap();
                    heights[at] = f64::from(height);
                }
                RowOp::Remove { .. } | RowOp::Resize { .. } => {}
            }
        }

        prop_assert!(rows.check_positions());
        prop_assert_eq!(rows.iter().collect::<Vec<_>>(), order.clone());
        let mut offset = 0.0;
        for (position, (handle, height)) in order.iter().zip(&heights).enumerate() {
            prop_assert_eq!(rows.position(*handle), Some(position));
            prop_assert_eq!(rows.offset(*handle), Some(offset));
            offset += height;
        }
        prop_assert_eq!(rows.total_extent(), offset);
    }
}

// ── List window ─────────────────────────────────────────────────────────

const UNIVERSE: u32 = 400;

#[derive(Clone, Debug)]
enum ListOp {
    Insert(u32),
    Remove(usize),
    ScrollTo(f64),
    Resize(f64),
    Serve,
    Jump { to_end: bool, force: bool },
    ScrollToItem(usize),
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        2 => (0..UNIVERSE * 2).prop_map(ListOp::Insert),
        2 => any::<usize>().prop_map(ListOp::Remove),
        3 => (0.0..4000.0).prop_map(ListOp::ScrollTo),
        1 => (0.0..300.0).prop_map(ListOp::Resize),
        3 => Just(ListOp::Serve),
        1 => (any::<bool>(), any::<bool>()).prop_map(|(to_end, force)| ListOp::Jump { to_end, force }),
        1 => any::<usize>().prop_map(ListOp::ScrollToItem),
    ]
}

fn nth_item(list: &List, n: usize) -> Option<u32> {
    let len = list.len();
    (len > 0).then(|| list.items().nth(n % len).map(|m| m.seq)).flatten()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn window_stays_consistent(ops in proptest::collection::vec(list_op(), 0..40)) {
        let source = Source::new(0..UNIVERSE);
        let config = ListConfig::default()
            .with_prefetch(PrefetchSize::Items(20))
            .with_max_retained(120);
        let mut list = list_with(config, 100.0);

        for op in ops {
            match op {
                ListOp::Insert(seq) => {
                    if !list.contains(&seq) {
                        list.insert_item(Msg::new(seq)).unwrap();
                    }
                }
                ListOp::Remove(n) => {
                    if let Some(seq) = nth_item(&list, n) {
                        prop_assert_eq!(list.remove_item(&seq).unwrap().map(|m| m.seq), Some(seq));
                    }
                }
                ListOp::ScrollTo(offset) => list.scroll_to(offset).unwrap(),
                ListOp::Resize(height) => {
                    list.set_viewport_size(Size::new(100.0, height)).unwrap();
                }
                ListOp::Serve => {
                    for request in prefetches(list.take_events()) {
                        list.complete_prefetch(request.id, source.answer(&request)).unwrap();
                    }
                }
                ListOp::Jump { to_end, force } => {
                    let direction = if to_end { Direction::After } else { Direction::Before };
                    list.jump_to_edge(direction, force, Modifiers::empty()).unwrap();
                }
                ListOp::ScrollToItem(n) => {
                    if let Some(seq) = nth_item(&list, n) {
                        list.scroll_to_item(&seq, 0.0).unwrap();
                    }
                }
            }

            prop_assert_eq!(list.check_invariants(), Ok(()));
            prop_assert_eq!(list.factory().live(), list.materialized_len());
            prop_assert!(list.rows().check_positions());
            prop_assert!(list.offset() >= 0.0);
            prop_assert!(list.outstanding_requests() <= 2);
            let materialized: Vec<u32> = list.materialized_ids().copied().collect();
            prop_assert!(materialized.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
