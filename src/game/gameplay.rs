use crate::core::gfx::{Rect, Renderer, Tag};
use crate::core::input::{DEFAULT_LANE_KEYS, Lane, LaneKey, NUM_LANES};
use crate::game::chart::Chart;
use crate::game::judgment::{self, Judgment};
use crate::game::lanes::{LaneQueues, RuntimeNote};
use crate::game::stage_stats::StageStats;
use crate::game::timing_windows::TimingWindowTable;
use crate::ui::color;
use log::{debug, info, warn};
use std::collections::VecDeque;

pub const NOTE_HEIGHT: f32 = 30.0;
const HIT_LINE_THICKNESS: f32 = 2.0;
const SCORE_LABEL_POS: (f32, f32) = (24.0, 24.0);
const STATUS_LOG_INTERVAL_MS: f64 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageLayout {
    pub screen_width: f32,
    pub screen_height: f32,
    pub lane_width: f32,
    pub lane_gap: f32,
    pub hit_line_offset: f32,
}

impl Default for StageLayout {
    fn default() -> Self {
        Self {
            screen_width: 1600.0,
            screen_height: 900.0,
            lane_width: 140.0,
            lane_gap: 20.0,
            hit_line_offset: 150.0,
        }
    }
}

impl StageLayout {
    #[inline(always)]
    pub fn lanes_width(&self) -> f32 {
        self.lane_width * NUM_LANES as f32 + self.lane_gap * (NUM_LANES - 1) as f32
    }

    #[inline(always)]
    pub fn lane_x(&self, lane: Lane) -> f32 {
        let start = self.screen_width / 2.0 - self.lanes_width() / 2.0;
        start + lane.index() as f32 * (self.lane_width + self.lane_gap)
    }

    #[inline(always)]
    pub fn hit_line_y(&self) -> f32 {
        self.screen_height - self.hit_line_offset
    }

    /// Spawn point is the top of the field; progress 1.0 is the hit line.
    #[inline(always)]
    pub fn note_y(&self, progress: f64) -> f32 {
        self.hit_line_y() * progress as f32
    }
}

/// Everything a stage needs to know up front. Built from the user config by
/// the host; gameplay never reads global settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageConfig {
    /// How long before its target time a note appears.
    pub approach_time_ms: f64,
    /// Largest press-to-target distance that still judges a note.
    pub max_hit_distance_ms: f64,
    /// How far past its target time an untouched note is dropped as a miss.
    pub miss_threshold_ms: f64,
    pub layout: StageLayout,
    pub keys: [LaneKey; NUM_LANES],
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            approach_time_ms: 600.0,
            max_hit_distance_ms: 200.0,
            miss_threshold_ms: 200.0,
            layout: StageLayout::default(),
            keys: DEFAULT_LANE_KEYS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Building,
    Running,
    Completing,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingNote {
    pub lane: Lane,
    pub target_time_ms: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StageEvent {
    Spawned { lane: Lane, target_time_ms: f64 },
    Judged(Judgment),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Finished,
}

/// Live state of one play-through. Created when a stage starts and dropped
/// when it completes or is cancelled.
#[derive(Debug)]
pub struct StageSession {
    pub config: StageConfig,
    pub windows: TimingWindowTable,
    pub lanes: LaneQueues,
    /// Not-yet-spawned suffix of the chart, in spawn order.
    pub pending: VecDeque<PendingNote>,
    pub current_time_ms: f64,
    pub stats: StageStats,
    pub events: Vec<StageEvent>,
    log_timer_ms: f64,
}

impl StageSession {
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.lanes.is_empty()
    }
}

/// Turns the chart's hit objects into the spawn sequence. Notes on columns
/// outside the 4-lane table are dropped; an out-of-order source is put back
/// in time order so each lane queue stays sorted.
fn pending_from_chart(chart: &Chart) -> VecDeque<PendingNote> {
    let mut dropped = 0usize;
    let mut pending: Vec<PendingNote> = chart
        .hit_objects
        .iter()
        .filter_map(|h| match h.lane.lane() {
            Some(lane) => Some(PendingNote {
                lane,
                target_time_ms: f64::from(h.time_ms),
            }),
            None => {
                dropped += 1;
                None
            }
        })
        .collect();
    if dropped > 0 {
        warn!("Dropped {dropped} hit objects on columns outside the 4-lane layout");
    }
    if !pending
        .windows(2)
        .all(|w| w[0].target_time_ms <= w[1].target_time_ms)
    {
        warn!("Chart hit objects are not in time order; sorting");
        pending.sort_by(|a, b| a.target_time_ms.total_cmp(&b.target_time_ms));
    }
    pending.into()
}

/// Building phase: lays out the static field and prepares the spawn queue.
/// No notes are visible yet.
pub fn init(chart: &Chart, config: StageConfig, renderer: &mut dyn Renderer) -> StageSession {
    debug!("Building stage...");
    let layout = config.layout;

    renderer.add_marker(
        Tag::Score,
        None,
        Rect {
            x: SCORE_LABEL_POS.0,
            y: SCORE_LABEL_POS.1,
            w: 0.0,
            h: 0.0,
        },
        color::SCORE_TEXT,
    );
    for lane in Lane::ALL {
        renderer.add_marker(
            Tag::Lane,
            Some(lane),
            Rect {
                x: layout.lane_x(lane),
                y: 0.0,
                w: layout.lane_width,
                h: layout.screen_height,
            },
            color::LANE_BG,
        );
    }
    renderer.add_marker(
        Tag::HitLine,
        None,
        Rect {
            x: layout.lane_x(Lane::Left),
            y: layout.hit_line_y(),
            w: layout.lanes_width(),
            h: HIT_LINE_THICKNESS,
        },
        color::HIT_LINE,
    );
    renderer.set_score(0, 0);

    let pending = pending_from_chart(chart);
    debug!("Stage built with {} notes queued for spawn", pending.len());

    StageSession {
        config,
        windows: TimingWindowTable::new(config.max_hit_distance_ms),
        lanes: LaneQueues::new(),
        stats: StageStats::new(pending.len() as u32),
        pending,
        current_time_ms: 0.0,
        events: Vec::new(),
        log_timer_ms: 0.0,
    }
}

#[inline(always)]
fn spawn_lookahead_notes(state: &mut StageSession, now_ms: f64, renderer: &mut dyn Renderer) {
    let approach = state.config.approach_time_ms;
    let layout = state.config.layout;
    while let Some(next) = state.pending.front().copied() {
        if next.target_time_ms - now_ms > approach {
            break;
        }
        state.pending.pop_front();
        let mut note = RuntimeNote::new(next.lane, next.target_time_ms, now_ms);
        note.marker = Some(renderer.add_marker(
            Tag::Note,
            Some(next.lane),
            Rect {
                x: layout.lane_x(next.lane),
                y: layout.note_y(note.progress(now_ms)),
                w: layout.lane_width,
                h: NOTE_HEIGHT,
            },
            color::NOTE,
        ));
        state.lanes.enqueue(next.lane, note);
        state.events.push(StageEvent::Spawned {
            lane: next.lane,
            target_time_ms: next.target_time_ms,
        });
    }
}

#[inline(always)]
fn move_notes(state: &mut StageSession, now_ms: f64, renderer: &mut dyn Renderer) {
    let layout = state.config.layout;
    for lane in Lane::ALL {
        for note in state.lanes.iter_lane(lane) {
            if let Some(id) = note.marker {
                renderer.move_marker(id, layout.lane_x(lane), layout.note_y(note.progress(now_ms)));
            }
        }
    }
}

/// Drops every queued note whose target time is more than the miss threshold
/// behind the clock. Queues are time-ordered, so only heads need checking.
#[inline(always)]
fn apply_timeout_misses(state: &mut StageSession, now_ms: f64, renderer: &mut dyn Renderer) {
    let threshold = state.config.miss_threshold_ms;
    for lane in Lane::ALL {
        while state
            .lanes
            .peek_oldest(lane)
            .is_some_and(|head| !head.judged && now_ms - head.target_time_ms > threshold)
        {
            let Some(note) = state.lanes.pop_oldest(lane) else {
                break;
            };
            info!(
                "MISSED (timeout): lane {:?}, target {:.0}ms, clock {:.0}ms",
                lane, note.target_time_ms, now_ms
            );
            judgment::record_timeout_miss(state, note, now_ms, renderer);
        }
    }
}

/// Expires everything still owed by the chart. Used when playback ends before
/// the last notes could come and go on their own.
pub fn flush_remaining_as_misses(state: &mut StageSession, renderer: &mut dyn Renderer) {
    let now_ms = state.current_time_ms;
    let queued = state.lanes.drain_all();
    let pending: Vec<PendingNote> = state.pending.drain(..).collect();
    if queued.is_empty() && pending.is_empty() {
        return;
    }
    info!(
        "Playback ended with {} queued and {} unspawned notes; counting them as misses",
        queued.len(),
        pending.len()
    );
    for note in queued {
        judgment::record_timeout_miss(state, note, now_ms, renderer);
    }
    for p in pending {
        let note = RuntimeNote::new(p.lane, p.target_time_ms, now_ms);
        judgment::record_timeout_miss(state, note, now_ms, renderer);
    }
}

/// One scheduler tick against the freshly read audio clock.
pub fn update(
    state: &mut StageSession,
    logical_time_ms: f64,
    delta_ms: f64,
    renderer: &mut dyn Renderer,
) -> TickOutcome {
    state.current_time_ms = logical_time_ms;

    spawn_lookahead_notes(state, logical_time_ms, renderer);
    move_notes(state, logical_time_ms, renderer);
    apply_timeout_misses(state, logical_time_ms, renderer);

    state.log_timer_ms += delta_ms.max(0.0);
    if state.log_timer_ms >= STATUS_LOG_INTERVAL_MS {
        info!(
            "Time: {:.0}ms, Score: {}, Combo: {}, Queued: {}, Pending: {}",
            logical_time_ms,
            state.stats.score,
            state.stats.combo,
            state.lanes.total_len(),
            state.pending.len()
        );
        state.log_timer_ms -= STATUS_LOG_INTERVAL_MS;
    }

    if state.is_drained() {
        return TickOutcome::Finished;
    }
    TickOutcome::Continue
}

/// Removes every visual the stage put up.
pub fn teardown(state: &mut StageSession, renderer: &mut dyn Renderer) {
    for note in state.lanes.drain_all() {
        if let Some(id) = note.marker {
            renderer.destroy(id);
        }
    }
    for tag in Tag::STAGE {
        renderer.destroy_tagged(tag);
    }
}

#[cfg(test)]
mod tests {
    use super::{StageConfig, StageEvent, StageLayout, TickOutcome, init, update};
    use crate::core::gfx::{HeadlessRenderer, Tag};
    use crate::core::input::Lane;
    use crate::game::chart::{Chart, HitObject, LaneCode};
    use crate::game::timing_windows::Tier;

    fn chart_of(notes: &[(u32, u32)]) -> Chart {
        Chart {
            hit_objects: notes
                .iter()
                .map(|&(lane, time_ms)| HitObject {
                    lane: LaneCode(lane),
                    time_ms,
                })
                .collect(),
            ..Chart::default()
        }
    }

    #[test]
    fn layout_matches_the_classic_field() {
        let layout = StageLayout::default();
        assert_eq!(layout.lanes_width(), 620.0);
        assert_eq!(layout.lane_x(Lane::Left), 490.0);
        assert_eq!(layout.lane_x(Lane::Right), 970.0);
        assert_eq!(layout.hit_line_y(), 750.0);
        assert_eq!(layout.note_y(0.0), 0.0);
        assert_eq!(layout.note_y(1.0), 750.0);
    }

    #[test]
    fn building_draws_the_field_but_no_notes() {
        let mut r = HeadlessRenderer::new();
        let state = init(&chart_of(&[(64, 1000), (7, 1100)]), StageConfig::default(), &mut r);
        assert_eq!(r.count(Tag::Lane), 4);
        assert_eq!(r.count(Tag::HitLine), 1);
        assert_eq!(r.count(Tag::Score), 1);
        assert_eq!(r.count(Tag::Note), 0);
        assert_eq!(state.pending.len(), 1, "unknown lane code is dropped");
        assert_eq!(state.stats.total_notes, 1);
    }

    #[test]
    fn spawns_exactly_at_the_approach_boundary() {
        let mut r = HeadlessRenderer::new();
        let mut state = init(&chart_of(&[(64, 1000)]), StageConfig::default(), &mut r);

        assert_eq!(update(&mut state, 350.0, 25.0, &mut r), TickOutcome::Continue);
        assert_eq!(state.lanes.total_len(), 0, "650ms out is beyond the 600ms lookahead");
        assert_eq!(update(&mut state, 399.0, 25.0, &mut r), TickOutcome::Continue);
        assert_eq!(state.lanes.total_len(), 0);
        update(&mut state, 400.0, 25.0, &mut r);
        assert_eq!(state.lanes.len(Lane::Left), 1, "spawns when target - now == lookahead");
        let note = state.lanes.peek_oldest(Lane::Left).cloned().expect("spawned");
        assert_eq!(note.spawned_at_ms, 400.0);
        let marker = r.marker(note.marker.expect("has a marker")).expect("live");
        assert_eq!(marker.rect.y, 0.0, "progress is zero at spawn");
        assert!(matches!(state.events[0], StageEvent::Spawned { lane: Lane::Left, .. }));

        update(&mut state, 1000.0, 25.0, &mut r);
        let marker = r.marker(note.marker.expect("has a marker")).expect("live");
        assert_eq!(marker.rect.y, StageLayout::default().hit_line_y(), "progress is one at target");
    }

    #[test]
    fn spawns_every_due_note_in_one_tick() {
        let mut r = HeadlessRenderer::new();
        let mut state = init(
            &chart_of(&[(64, 100), (192, 150), (320, 200), (448, 5000)]),
            StageConfig::default(),
            &mut r,
        );
        update(&mut state, 0.0, 25.0, &mut r);
        assert_eq!(state.lanes.total_len(), 3);
        assert_eq!(state.pending.len(), 1);
        assert_eq!(r.count(Tag::Note), 3);
    }

    #[test]
    fn out_of_order_source_is_spawned_in_time_order() {
        let mut r = HeadlessRenderer::new();
        let mut state = init(&chart_of(&[(64, 900), (64, 700)]), StageConfig::default(), &mut r);
        update(&mut state, 800.0, 25.0, &mut r);
        let times: Vec<f64> = state.lanes.iter_lane(Lane::Left).map(|n| n.target_time_ms).collect();
        assert_eq!(times, vec![700.0, 900.0]);
    }

    #[test]
    fn unplayed_note_times_out_then_stage_finishes() {
        let mut r = HeadlessRenderer::new();
        let mut state = init(&chart_of(&[(64, 1000)]), StageConfig::default(), &mut r);
        update(&mut state, 450.0, 25.0, &mut r);
        assert_eq!(update(&mut state, 1200.0, 25.0, &mut r), TickOutcome::Continue, "200ms late is still in reach");
        assert_eq!(state.lanes.total_len(), 1);

        assert_eq!(update(&mut state, 1201.0, 25.0, &mut r), TickOutcome::Finished);
        assert_eq!(state.stats.count(Tier::Miss), 1);
        assert_eq!(r.count(Tag::Note), 0, "expired note's visual is destroyed");
        assert!(r.notifications.iter().any(|n| n == "Miss!"));
        let timed_out = state.events.iter().any(|e| {
            matches!(e, StageEvent::Judged(j) if j.timed_out && j.tier == Tier::Miss && j.lane == Lane::Left)
        });
        assert!(timed_out, "expiry is reported as a timeout miss");
    }

    #[test]
    fn clock_jumping_far_ahead_spawns_and_expires_in_one_tick() {
        let mut r = HeadlessRenderer::new();
        let mut state = init(&chart_of(&[(64, 100), (192, 200)]), StageConfig::default(), &mut r);
        assert_eq!(update(&mut state, 10_000.0, 25.0, &mut r), TickOutcome::Finished);
        assert_eq!(state.stats.count(Tier::Miss), 2);
    }

    #[test]
    fn flush_counts_everything_left_as_missed() {
        let mut r = HeadlessRenderer::new();
        let mut state = init(&chart_of(&[(64, 500), (192, 9000)]), StageConfig::default(), &mut r);
        update(&mut state, 100.0, 25.0, &mut r);
        assert_eq!(state.lanes.total_len(), 1);
        super::flush_remaining_as_misses(&mut state, &mut r);
        assert!(state.is_drained());
        assert_eq!(state.stats.count(Tier::Miss), 2);
        assert_eq!(r.count(Tag::Note), 0);
    }

    #[test]
    fn teardown_clears_the_scene() {
        let mut r = HeadlessRenderer::new();
        let mut state = init(&chart_of(&[(64, 100)]), StageConfig::default(), &mut r);
        update(&mut state, 0.0, 25.0, &mut r);
        super::teardown(&mut state, &mut r);
        assert_eq!(r.live_markers(), 0);
        assert!(state.lanes.is_empty());
    }
}
