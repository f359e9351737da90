// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end tests for `FlyweightList`.
//!
//! Each test drives the list the way a host would: answering prefetch requests
//! from an in-memory source, scrolling, editing, and draining events.

mod common;

use std::time::Duration;

use common::{List, Msg, Source, list_with, prefetches, single_request};
use kurbo::{Rect, Size};
use understory_flyweight_list::{
    Axis, Badge, Direction, IndexError, JumpKind, ListConfig, ListError, ListEvent, ListState,
    Modifiers, PrefetchSize, TimerKind,
};

/// Answers the initial request from `source` and returns the list.
fn loaded(source: &Source, config: ListConfig, height: f64) -> List {
    let mut list = list_with(config, height);
    let request = single_request(&mut list);
    list.complete_prefetch(request.id, source.answer(&request))
        .unwrap();
    list
}

#[test]
fn short_initial_page_reaches_both_edges() {
    let source = Source::new(0..31);
    let mut list = list_with(ListConfig::default(), 100.0);
    assert_eq!(list.state(), ListState::Empty);

    let request = single_request(&mut list);
    assert_eq!(request.direction, Direction::After);
    assert_eq!(request.anchor, None);
    assert_eq!(request.count, 50);

    list.complete_prefetch(request.id, source.answer(&request))
        .unwrap();
    assert_eq!(list.state(), ListState::AtBoth);
    assert_eq!(list.len(), 31);
    assert_eq!(list.materialized_len(), 31);
    assert_eq!(list.outstanding_requests(), 0);
    assert_eq!(list.first_visible(), Some(&0));
    assert_eq!(list.last_visible(), Some(&9));
    assert!(list.at_begin());
    assert!(!list.at_end());
    assert!(prefetches(list.take_events()).is_empty());
    list.check_invariants().unwrap();
}

#[test]
fn one_outstanding_request_per_side() {
    let source = Source::new(0..1000);
    let config = ListConfig::default().with_prefetch(PrefetchSize::Items(10));
    let mut list = loaded(&source, config, 100.0);
    assert_eq!(list.state(), ListState::AtBegin);

    // The ten loaded rows exactly fill the viewport.
    let request = single_request(&mut list);
    assert_eq!(request.direction, Direction::After);
    assert_eq!(request.anchor, Some(9));
    assert_eq!(request.count, 10);

    for _ in 0..3 {
        list.scroll_by(5.0).unwrap();
        list.refresh().unwrap();
    }
    assert!(prefetches(list.take_events()).is_empty());
    assert_eq!(list.outstanding_requests(), 1);

    list.complete_prefetch(request.id, source.answer(&request))
        .unwrap();
    assert_eq!(list.len(), 20);
    assert_eq!(list.outstanding_requests(), 0);
    assert!(prefetches(list.take_events()).is_empty());

    // Five items left beyond the viewport is exactly the threshold.
    list.scroll_to(50.0).unwrap();
    assert_eq!(list.last_visible(), Some(&14));
    assert!(prefetches(list.take_events()).is_empty());

    list.scroll_to(60.0).unwrap();
    let request = single_request(&mut list);
    assert_eq!(request.direction, Direction::After);
    assert_eq!(request.anchor, Some(19));
    assert_eq!(request.count, 6);
}

#[test]
fn retention_limit_evicts_the_far_side() {
    let source = Source::new(0..1000);
    let config = ListConfig::default()
        .with_prefetch(PrefetchSize::Items(50))
        .with_max_retained(100);
    let mut list = loaded(&source, config, 200.0);
    assert_eq!(list.len(), 50);
    assert!(prefetches(list.take_events()).is_empty());

    list.scroll_to(1e9).unwrap();
    let request = single_request(&mut list);
    assert_eq!(request.anchor, Some(49));
    list.complete_prefetch(request.id, source.answer(&request))
        .unwrap();
    assert_eq!(list.len(), 100);

    list.scroll_to(1e9).unwrap();
    assert_eq!(list.first_visible(), Some(&80));
    let request = single_request(&mut list);
    assert_eq!(request.anchor, Some(99));
    list.complete_prefetch(request.id, source.answer(&request))
        .unwrap();

    assert_eq!(list.len(), 100);
    assert!((0..50).all(|seq| !list.contains(&seq)));
    assert!(list.contains(&50));
    assert!(list.contains(&149));
    assert!(list.materialized_len() <= 100);
    assert_eq!(list.first_visible(), Some(&80));
    assert_eq!(list.state(), ListState::Interior);
    assert_eq!(
        list.loaded_range().bound_id(Direction::Before),
        Some(&50)
    );
    assert_eq!(list.factory().live(), list.materialized_len());
    list.check_invariants().unwrap();
}

/// Every source item between the loaded range's bounds must be attached.
fn assert_loaded_range_is_gap_free(list: &List, source: &Source) {
    let range = list.loaded_range();
    let (Some(lower), Some(upper)) = (
        range.bound_id(Direction::Before),
        range.bound_id(Direction::After),
    ) else {
        return;
    };
    for seq in source.seqs.iter().filter(|s| (*lower..=*upper).contains(*s)) {
        assert!(
            list.is_attached(seq),
            "{seq} is missing from the loaded range {lower}..={upper}"
        );
    }
}

#[test]
fn responses_anchored_at_evicted_items_do_not_extend_the_range() {
    let source = Source::new(0..1000);
    let config = ListConfig::default()
        .with_prefetch(PrefetchSize::Items(50))
        .with_max_retained(100)
        .with_initial_edge(Direction::After);
    let mut list = loaded(&source, config, 100.0);
    assert!(list.contains(&999));

    // Answer requests toward the top right away, but hold the ones toward
    // the bottom while the top side evicts the bottom of the range.
    let mut held = Vec::new();
    for round in 0..8 {
        let offset = if round % 2 == 0 { 1e9 } else { 0.0 };
        list.scroll_to(offset).unwrap();
        list.scroll_to(offset).unwrap();
        held.extend(prefetches(list.take_events()));
        let (before, after): (Vec<_>, Vec<_>) = held
            .into_iter()
            .partition(|r| r.direction == Direction::Before);
        for request in before {
            list.complete_prefetch(request.id, source.answer(&request))
                .unwrap();
            assert_loaded_range_is_gap_free(&list, &source);
            list.check_invariants().unwrap();
        }
        held = after;
    }
    assert!(!held.is_empty());

    for request in held {
        list.complete_prefetch(request.id, source.answer(&request))
            .unwrap();
        assert_loaded_range_is_gap_free(&list, &source);
        list.check_invariants().unwrap();
    }
    assert!(list.outstanding_requests() <= 2);
    assert_eq!(list.factory().live(), list.materialized_len());
}

#[test]
fn forced_long_jump_reloads_at_the_edge() {
    let config = ListConfig::default().with_window_margin(10);
    let mut list = list_with(config, 10.0);
    let request = single_request(&mut list);
    list.complete_prefetch(request.id, (0..10_000).map(Msg::new))
        .unwrap();
    assert_eq!(list.len(), 10_000);

    assert_eq!(list.scroll_to_item(&5000, 0.0), Ok(true));
    let materialized: Vec<u32> = list.materialized_ids().copied().collect();
    assert_eq!(materialized, (4990..=5010).collect::<Vec<_>>());
    assert_eq!(list.first_visible(), Some(&5000));

    assert_eq!(
        list.jump_to_edge(Direction::After, true, Modifiers::empty()),
        Ok(JumpKind::Reload)
    );
    assert!(list.is_empty());
    assert_eq!(list.materialized_len(), 0);
    assert_eq!(list.factory().live(), 0);

    let request = single_request(&mut list);
    assert_eq!(request.direction, Direction::Before);
    assert_eq!(request.anchor, None);
    list.complete_prefetch(request.id, (9950..10_000).map(Msg::new))
        .unwrap();

    assert_eq!(list.state(), ListState::AtEnd);
    assert_eq!(list.last_visible(), Some(&9999));
    assert!(list.at_end());
    assert!((4990..=5010).all(|seq| !list.is_materialized(&seq)));
    list.check_invariants().unwrap();
}

#[test]
fn clear_is_idempotent_and_does_not_reload() {
    let source = Source::new(0..1000);
    let config = ListConfig::default().with_prefetch(PrefetchSize::Items(10));
    let mut list = loaded(&source, config, 100.0);
    assert_eq!(list.outstanding_requests(), 1);
    list.take_events();

    list.clear().unwrap();
    list.clear().unwrap();
    assert_eq!(list.state(), ListState::Empty);
    assert!(list.is_empty());
    assert_eq!(list.outstanding_requests(), 0);
    assert_eq!(list.factory().live(), 0);
    assert_eq!(list.offset(), 0.0);
    assert!(!list.jump_control().is_visible());
    assert!(prefetches(list.take_events()).is_empty());
}

#[test]
fn stale_responses_are_indexed_but_detached() {
    let mut list = list_with(ListConfig::default(), 100.0);
    let first = single_request(&mut list);

    list.reload(Direction::Before).unwrap();
    let second = single_request(&mut list);
    assert_eq!(second.direction, Direction::After);
    assert_ne!(first.id, second.id);

    list.complete_prefetch(first.id, (0..5).map(Msg::new))
        .unwrap();
    assert_eq!(list.len(), 5);
    assert_eq!(list.materialized_len(), 0);
    assert!(!list.is_attached(&0));

    list.complete_prefetch(second.id, (0..20).map(Msg::new))
        .unwrap();
    assert_eq!(list.len(), 20);
    assert_eq!(list.state(), ListState::AtBoth);
    assert!(list.is_attached(&0));
    assert_eq!(list.materialized_len(), 20);
    list.check_invariants().unwrap();
}

#[test]
fn batch_ends_when_the_guard_is_dropped_early() {
    fn edit(list: &mut List) -> Result<(), ListError<String>> {
        let mut batch = list.begin_item_range_change();
        batch.insert_item(Msg::new(100))?;
        assert!(batch.is_batching());
        assert!(!batch.is_materialized(&100));
        batch.insert_item(Msg::new(5))?;
        batch.finish()
    }

    let source = Source::new(0..10);
    let mut list = loaded(&source, ListConfig::default(), 100.0);
    assert_eq!(
        edit(&mut list),
        Err(ListError::Index(IndexError::DuplicateIdentity))
    );
    assert!(!list.is_batching());
    assert!(list.is_materialized(&100));
    assert_eq!(list.len(), 11);
    list.check_invariants().unwrap();
}

#[test]
fn nested_batches_maintain_once() {
    let source = Source::new(0..10);
    let mut list = loaded(&source, ListConfig::default(), 100.0);
    list.take_events();

    let mut outer = list.begin_item_range_change();
    {
        let mut inner = outer.begin_item_range_change();
        inner.insert_item(Msg::new(20)).unwrap();
        inner.finish().unwrap();
    }
    outer.insert_item(Msg::new(21)).unwrap();
    assert!(!outer.is_materialized(&20));
    outer.finish().unwrap();

    assert!(list.is_materialized(&20));
    assert!(list.is_materialized(&21));
    let range_changes = list
        .take_events()
        .into_iter()
        .filter(|e| matches!(e, ListEvent::ItemRangeChanged { .. }))
        .count();
    assert_eq!(range_changes, 1);
}

#[test]
fn failed_build_leaves_the_index_untouched() {
    let source = Source {
        seqs: (0..20).map(|i| i * 10).collect(),
    };
    let config = ListConfig::default().with_window_margin(100);
    let mut list = loaded(&source, config, 100.0);
    assert_eq!(list.materialized_len(), 20);

    list.factory_mut().fail_on = Some(15);
    let result = list.insert_continuous_items([Msg::new(16), Msg::new(14), Msg::new(15)]);
    assert!(matches!(result, Err(ListError::Build(ref msg)) if msg == "cannot build 15"));
    assert_eq!(list.len(), 20);
    assert!(!list.contains(&14));
    assert_eq!(list.factory().live(), list.materialized_len());

    list.factory_mut().fail_on = None;
    list.insert_continuous_items([Msg::new(16), Msg::new(14), Msg::new(15)])
        .unwrap();
    let ids: Vec<u32> = list.materialized_ids().copied().take(6).collect();
    assert_eq!(ids, [0, 10, 14, 15, 16, 20]);
    list.check_invariants().unwrap();
}

#[test]
fn removing_every_item_requests_a_fresh_load() {
    let source = Source::new(0..3);
    let mut list = loaded(&source, ListConfig::default(), 100.0);
    list.remove_item(&0).unwrap();
    list.remove_item(&1).unwrap();
    list.take_events();

    assert_eq!(list.remove_item(&2).unwrap().map(|m| m.seq), Some(2));
    assert_eq!(list.state(), ListState::Empty);
    let request = single_request(&mut list);
    assert_eq!(request.direction, Direction::After);
    assert_eq!(request.anchor, None);
}

#[test]
fn scroll_to_item_reports_missing_and_detached_items() {
    let source = Source::new(0..1000);
    let config = ListConfig::default().with_prefetch(PrefetchSize::Items(20));
    let mut list = loaded(&source, config, 100.0);

    assert_eq!(
        list.scroll_to_item(&999, 0.0),
        Err(ListError::Index(IndexError::NotFound))
    );

    list.insert_item(Msg::new(500)).unwrap();
    assert!(list.contains(&500));
    assert!(!list.is_attached(&500));
    assert_eq!(list.scroll_to_item(&500, 0.0), Ok(false));
    assert!(!list.is_materialized(&500));

    assert_eq!(list.scroll_to_item(&5, 4.0), Ok(true));
    assert_eq!(list.offset(), 54.0);
    assert_eq!(list.first_visible(), Some(&5));
}

#[test]
fn wheel_notches_carry_their_remainder() {
    let source = Source::new(0..30);
    let mut list = loaded(&source, ListConfig::default(), 100.0);

    list.wheel(Axis::Main, -120.0).unwrap();
    assert_eq!(list.offset(), 30.0);

    list.wheel(Axis::Main, -60.0).unwrap();
    assert_eq!(list.offset(), 30.0);
    list.wheel(Axis::Main, -60.0).unwrap();
    assert_eq!(list.offset(), 60.0);

    list.wheel(Axis::Main, 240.0).unwrap();
    assert_eq!(list.offset(), 0.0);
}

#[test]
fn cross_axis_wheel_uses_the_cross_step() {
    let source = Source::new(0..30);
    let config = ListConfig::default().with_cross_step(5.0);
    let mut list = loaded(&source, config, 100.0);
    list.set_viewport_size(Size::new(40.0, 100.0)).unwrap();

    list.wheel(Axis::Cross, -120.0).unwrap();
    assert_eq!(list.cross_offset(), 15.0);
    assert_eq!(list.offset(), 0.0);

    list.wheel(Axis::Cross, -240.0).unwrap();
    assert_eq!(list.cross_offset(), 45.0);
    // Rows are 100 wide in a 40 wide viewport.
    list.wheel(Axis::Cross, -120.0).unwrap();
    assert_eq!(list.cross_offset(), 60.0);

    list.sync_scroll_bars();
    assert_eq!(list.scroll_bar(Axis::Cross).single_step, 5);
}

#[test]
fn scroll_bar_echo_is_ignored() {
    let source = Source::new(0..30);
    let mut list = loaded(&source, ListConfig::default(), 100.0);
    list.scroll_to(40.0).unwrap();
    assert!(list.sync_scroll_bars());

    let bar = list.scroll_bar(Axis::Main);
    assert_eq!(bar.value, 40);
    assert_eq!(bar.maximum, 200);
    assert!(bar.visible);

    list.scroll_bar_moved(Axis::Main, 40).unwrap();
    assert_eq!(list.offset(), 40.0);

    list.scroll_bar_moved(Axis::Main, 100).unwrap();
    assert_eq!(list.offset(), 100.0);
    assert_eq!(list.first_visible(), Some(&10));
}

#[test]
fn row_rects_are_in_viewport_coordinates() {
    let source = Source::new(0..30);
    let mut list = loaded(&source, ListConfig::default(), 100.0);
    list.scroll_to(15.0).unwrap();
    assert_eq!(list.row_rect(&2), Some(Rect::new(0.0, 5.0, 100.0, 15.0)));
    assert_eq!(list.row_rect(&999), None);
}

#[test]
fn resizing_a_row_keeps_the_anchor_still() {
    let source = Source::new(0..30);
    let mut list = loaded(&source, ListConfig::default(), 100.0);
    list.scroll_to(55.0).unwrap();
    assert_eq!(list.first_visible(), Some(&5));

    assert_eq!(list.set_row_size(&2, Size::new(100.0, 30.0)), Ok(true));
    assert_eq!(list.offset(), 75.0);
    assert_eq!(list.first_visible(), Some(&5));
    list.check_invariants().unwrap();
}

#[test]
fn timers_drive_deferred_work() {
    let mut list = list_with(ListConfig::default(), 100.0);
    list.take_events();
    assert!(list.is_timer_armed(TimerKind::ResizeSettle));
    assert_eq!(list.next_deadline(), Some(Duration::from_millis(16)));

    list.tick(Duration::from_millis(16)).unwrap();
    assert!(
        list.take_events()
            .contains(&ListEvent::ScrollBarsChanged)
    );
    assert!(list.is_timer_armed(TimerKind::ResizeSettle));

    list.tick(Duration::from_millis(100)).unwrap();
    assert!(!list.is_timer_armed(TimerKind::ResizeSettle));
}

#[test]
fn resize_bursts_settle_after_the_last_event() {
    let ms = Duration::from_millis;
    let mut list = list_with(ListConfig::default(), 100.0);
    list.tick(ms(5_000)).unwrap();
    assert!(!list.is_timer_armed(TimerKind::ResizeSettle));

    list.set_now(ms(10_000));
    list.set_viewport_size(Size::new(100.0, 120.0)).unwrap();
    assert!(list.is_timer_armed(TimerKind::ResizeSettle));

    list.set_now(ms(10_050));
    list.set_viewport_size(Size::new(100.0, 140.0)).unwrap();
    list.tick(ms(10_100)).unwrap();
    assert!(list.is_timer_armed(TimerKind::ResizeSettle));

    list.tick(ms(10_150)).unwrap();
    assert!(!list.is_timer_armed(TimerKind::ResizeSettle));
}

#[test]
fn jump_control_badge_tracks_hidden_items() {
    let source = Source::new(0..1000);
    let mut list = loaded(&source, ListConfig::default(), 100.0);

    let control = list.jump_control();
    assert!(control.is_visible());
    assert_eq!(
        control.badge(),
        Some(Badge {
            count: 40,
            saturated: true,
        })
    );

    assert_eq!(
        list.activate_jump_control(Modifiers::empty()),
        Ok(Some(JumpKind::Reload))
    );
    let request = single_request(&mut list);
    assert_eq!(request.direction, Direction::Before);
    assert!(!list.jump_control().is_visible());
}

#[test]
fn sources_can_be_served_to_completion() {
    let source = Source::new(0..120);
    let mut list = list_with(ListConfig::default(), 100.0);
    source.serve_all(&mut list);
    list.scroll_to(1e9).unwrap();
    source.serve_all(&mut list);
    list.scroll_to(1e9).unwrap();
    source.serve_all(&mut list);
    list.scroll_to(1e9).unwrap();

    assert_eq!(list.state(), ListState::AtBoth);
    assert_eq!(list.len(), 120);
    assert!(list.at_end());
    assert_eq!(list.last_visible(), Some(&119));
    list.check_invariants().unwrap();
}
