use crate::core::gfx::MarkerId;
use crate::core::input::{Lane, NUM_LANES};
use std::collections::VecDeque;

/// A note that has been spawned onto the field and is waiting for a press or
/// for its miss timeout.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeNote {
    pub lane: Lane,
    pub target_time_ms: f64,
    pub spawned_at_ms: f64,
    pub judged: bool,
    pub marker: Option<MarkerId>,
}

impl RuntimeNote {
    pub fn new(lane: Lane, target_time_ms: f64, spawned_at_ms: f64) -> Self {
        Self {
            lane,
            target_time_ms,
            spawned_at_ms,
            judged: false,
            marker: None,
        }
    }

    /// Travel ratio from spawn point (0.0) to hit line (1.0), continuing past
    /// 1.0 once the target time is behind us. A note spawned at or after its
    /// own target sits on the hit line.
    #[inline(always)]
    pub fn progress(&self, now_ms: f64) -> f64 {
        let span = self.target_time_ms - self.spawned_at_ms;
        if span <= 0.0 {
            return 1.0;
        }
        ((now_ms - self.spawned_at_ms) / span).max(0.0)
    }
}

/// One FIFO per lane. Heads are always the oldest live note of that lane.
#[derive(Debug, Default)]
pub struct LaneQueues {
    lanes: [VecDeque<RuntimeNote>; NUM_LANES],
}

impl LaneQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail. Callers enqueue in chart order, so target times
    /// within a lane never decrease.
    pub fn enqueue(&mut self, lane: Lane, note: RuntimeNote) {
        let q = &mut self.lanes[lane.index()];
        debug_assert!(
            q.back().is_none_or(|tail| tail.target_time_ms <= note.target_time_ms),
            "lane {lane:?} enqueued out of order"
        );
        q.push_back(note);
    }

    #[inline(always)]
    pub fn peek_oldest(&self, lane: Lane) -> Option<&RuntimeNote> {
        self.lanes[lane.index()].front()
    }

    #[inline(always)]
    pub fn pop_oldest(&mut self, lane: Lane) -> Option<RuntimeNote> {
        self.lanes[lane.index()].pop_front()
    }

    pub fn iter_lane(&self, lane: Lane) -> impl Iterator<Item = &RuntimeNote> {
        self.lanes[lane.index()].iter()
    }

    #[inline(always)]
    pub fn len(&self, lane: Lane) -> usize {
        self.lanes[lane.index()].len()
    }

    pub fn total_len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(VecDeque::is_empty)
    }

    /// Empties every lane, handing back what was still queued.
    pub fn drain_all(&mut self) -> Vec<RuntimeNote> {
        self.lanes.iter_mut().flat_map(|q| q.drain(..)).collect()
    }
}
