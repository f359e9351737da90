// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use kurbo::Size;
use std::time::Duration;
use understory_flyweight_list::{
    Cursor, Direction, FlyweightList, Keyed, ListConfig, ListEvent, OrderedItemIndex, RowFactory,
};

#[derive(Clone, Debug)]
struct Item {
    seq: u64,
}

impl Keyed for Item {
    type SortKey = u64;
    type Id = u64;

    fn sort_key(&self) -> u64 {
        self.seq
    }

    fn id(&self) -> u64 {
        self.seq
    }
}

struct Rows;

impl RowFactory<Item> for Rows {
    type Row = u64;
    type Error = core::convert::Infallible;

    fn build(&mut self, data: &Item) -> Result<u64, Self::Error> {
        Ok(data.seq)
    }

    fn size_of(&self, row: &u64) -> Size {
        // Mixed row heights so offsets are not trivially uniform.
        Size::new(300.0, 16.0 + (row % 4) as f64 * 8.0)
    }
}

fn loaded_list(len: u64) -> FlyweightList<Item, Rows> {
    let mut list = FlyweightList::new(Rows, ListConfig::default());
    list.set_viewport_size(Size::new(300.0, 600.0)).unwrap();
    let request = list
        .take_events()
        .into_iter()
        .find_map(|e| match e {
            ListEvent::Prefetch(r) => Some(r),
            _ => None,
        })
        .unwrap();
    list.complete_prefetch(request.id, (0..len).map(|seq| Item { seq }))
        .unwrap();
    list
}

fn bench_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("flyweight_list/index");

    for len in [1_024_u64, 16_384, 131_072] {
        group.throughput(Throughput::Elements(len));

        // Interleaved keys so every insert lands in the middle of the order view.
        group.bench_with_input(BenchmarkId::new("insert", len), &len, |b, &len| {
            b.iter_batched(
                OrderedItemIndex::<u64, u64, ()>::new,
                |mut index| {
                    for i in 0..len {
                        let id = (i * 7919) % len;
                        index.insert(id / 3, id, ()).unwrap();
                    }
                    black_box(index);
                },
                BatchSize::LargeInput,
            );
        });

        let mut index = OrderedItemIndex::new();
        for i in 0..len {
            index.insert(i, i, ()).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("range_64", len), &len, |b, &len| {
            let mid = len / 2;
            b.iter(|| {
                let n = index
                    .range(Cursor::Including(black_box(&mid)), Direction::After, 64)
                    .count();
                black_box(n);
            });
        });
    }

    group.finish();
}

fn bench_scroll(c: &mut Criterion) {
    let mut group = c.benchmark_group("flyweight_list/scroll");
    group.measurement_time(Duration::from_secs(3));

    for len in [1_000_u64, 50_000] {
        group.bench_with_input(BenchmarkId::new("sweep", len), &len, |b, &len| {
            b.iter_batched(
                || loaded_list(len),
                |mut list| {
                    for step in 0..200 {
                        list.scroll_by(black_box(37.0 + f64::from(step % 5))).unwrap();
                    }
                    black_box(list.first_visible().copied());
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("scroll_to_item", len), &len, |b, &len| {
            b.iter_batched(
                || loaded_list(len),
                |mut list| {
                    for seq in [len / 2, len / 4, len - 1, 0] {
                        list.scroll_to_item(&seq, 0.0).unwrap();
                    }
                    black_box(list.materialized_len());
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("flyweight_list/edits");

    group.bench_function("insert_inside_window", |b| {
        b.iter_batched(
            || {
                let mut list = FlyweightList::new(Rows, ListConfig::default());
                list.set_viewport_size(Size::new(300.0, 600.0)).unwrap();
                let request = list
                    .take_events()
                    .into_iter()
                    .find_map(|e| match e {
                        ListEvent::Prefetch(r) => Some(r),
                        _ => None,
                    })
                    .unwrap();
                list.complete_prefetch(request.id, (0..200).map(|i| Item { seq: i * 1000 }))
                    .unwrap();
                list
            },
            |mut list| {
                for i in 1..100 {
                    list.insert_item(Item { seq: 5_000 + i }).unwrap();
                }
                black_box(list.materialized_len());
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("batched_insert", |b| {
        b.iter_batched(
            || loaded_list(200),
            |mut list| {
                let mut batch = list.begin_item_range_change();
                for i in 0..100 {
                    batch.insert_item(Item { seq: 10_000 + i }).unwrap();
                }
                batch.finish().unwrap();
                black_box(list.len());
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_index, bench_scroll, bench_edits);
criterion_main!(benches);
