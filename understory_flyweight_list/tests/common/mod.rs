// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures for the list integration tests: a message item, a counting
//! row factory, and an in-memory data source that answers prefetch requests.

#![allow(
    missing_docs,
    reason = "Integration-test helper module; not part of the public API."
)]
#![allow(
    dead_code,
    reason = "Each test binary uses a different subset of the fixtures."
)]

use kurbo::Size;
use understory_flyweight_list::{
    Direction, FlyweightList, Keyed, ListConfig, ListEvent, PrefetchRequest, RowFactory,
};

pub(crate) const ROW_HEIGHT: f64 = 10.0;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Msg {
    pub(crate) seq: u32,
    pub(crate) height: f64,
}

impl Msg {
    pub(crate) fn new(seq: u32) -> Self {
        Self {
            seq,
            height: ROW_HEIGHT,
        }
    }
}

impl Keyed for Msg {
    type SortKey = u32;
    type Id = u32;

    fn sort_key(&self) -> u32 {
        self.seq
    }

    fn id(&self) -> u32 {
        self.seq
    }
}

/// Row factory that counts builds and disposals and can be told to fail.
#[derive(Debug, Default)]
pub(crate) struct Counting {
    pub(crate) built: usize,
    pub(crate) disposed: usize,
    pub(crate) fail_on: Option<u32>,
}

impl Counting {
    pub(crate) fn live(&self) -> usize {
        self.built - self.disposed
    }
}

impl RowFactory<Msg> for Counting {
    type Row = (u32, f64);
    type Error = String;

    fn build(&mut self, data: &Msg) -> Result<(u32, f64), String> {
        if self.fail_on == Some(data.seq) {
            return Err(format!("cannot build {}", data.seq));
        }
        self.built += 1;
        Ok((data.seq, data.height))
    }

    fn size_of(&self, row: &(u32, f64)) -> Size {
        Size::new(100.0, row.1)
    }

    fn dispose(&mut self, _row: (u32, f64)) -> Result<(), String> {
        self.disposed += 1;
        Ok(())
    }
}

pub(crate) type List = FlyweightList<Msg, Counting>;

/// Ordered data set behind the list, answering requests the way a paging
/// backend would.
#[derive(Debug)]
pub(crate) struct Source {
    pub(crate) seqs: Vec<u32>,
}

impl Source {
    pub(crate) fn new(range: std::ops::Range<u32>) -> Self {
        Self {
            seqs: range.collect(),
        }
    }

    pub(crate) fn answer(&self, request: &PrefetchRequest<u32>) -> Vec<Msg> {
        let seqs: &[u32] = match (request.direction, request.anchor) {
            (Direction::After, None) => &self.seqs[..request.count.min(self.seqs.len())],
            (Direction::Before, None) => {
                &self.seqs[self.seqs.len().saturating_sub(request.count)..]
            }
            (Direction::After, Some(anchor)) => {
                let start = self.seqs.partition_point(|s| *s <= anchor);
                &self.seqs[start..(start + request.count).min(self.seqs.len())]
            }
            (Direction::Before, Some(anchor)) => {
                let end = self.seqs.partition_point(|s| *s < anchor);
                &self.seqs[end.saturating_sub(request.count)..end]
            }
        };
        seqs.iter().copied().map(Msg::new).collect()
    }

    /// Answers every queued request, repeating until the list stops asking.
    pub(crate) fn serve_all(&self, list: &mut List) {
        for _ in 0..64 {
            let requests = prefetches(list.take_events());
            if requests.is_empty() {
                return;
            }
            for request in requests {
                list.complete_prefetch(request.id, self.answer(&request))
                    .unwrap();
            }
        }
        panic!("list kept requesting items");
    }
}

pub(crate) fn prefetches(events: Vec<ListEvent<u32>>) -> Vec<PrefetchRequest<u32>> {
    events
        .into_iter()
        .filter_map(|event| match event {
            ListEvent::Prefetch(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub(crate) fn single_request(list: &mut List) -> PrefetchRequest<u32> {
    let mut requests = prefetches(list.take_events());
    assert_eq!(requests.len(), 1, "expected exactly one request: {requests:?}");
    requests.remove(0)
}

/// A list with a `height`-tall viewport that has answered nothing yet.
pub(crate) fn list_with(config: ListConfig, height: f64) -> List {
    let mut list = FlyweightList::new(Counting::default(), config);
    list.set_viewport_size(Size::new(100.0, height)).unwrap();
    list
}
