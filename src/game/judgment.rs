use crate::core::gfx::Renderer;
use crate::core::input::Lane;
use crate::game::gameplay::{StageEvent, StageSession};
use crate::game::lanes::RuntimeNote;
use crate::game::timing_windows::Tier;
use log::debug;

#[derive(Clone, Debug, PartialEq)]
pub struct Judgment {
    pub lane: Lane,
    pub tier: Tier,
    /// Press time (or expiry clock) minus target time; positive is late.
    pub time_error_ms: f64,
    pub points: u64,
    /// Expired by the scheduler rather than judged from a press.
    pub timed_out: bool,
}

fn report(state: &mut StageSession, judgment: Judgment, renderer: &mut dyn Renderer) {
    renderer.notify(judgment.tier.text(), judgment.tier.color());
    renderer.set_score(state.stats.score, state.stats.combo);
    state.events.push(StageEvent::Judged(judgment));
}

/// Judges a press on `lane` against the oldest queued note of that lane.
///
/// A press with nothing queued, or further than the max hit distance from
/// the head note, does nothing at all: no score change and no judgement. The
/// note then stays queued until it is hit or times out.
pub fn judge_press(
    state: &mut StageSession,
    lane: Lane,
    input_time_ms: f64,
    renderer: &mut dyn Renderer,
) -> Option<Judgment> {
    let head = state.lanes.peek_oldest(lane)?;
    let time_error_ms = input_time_ms - head.target_time_ms;
    let abs_err = time_error_ms.abs();
    if !abs_err.is_finite() || abs_err > state.windows.max_hit_distance_ms() {
        debug!(
            "Press on {lane:?} at {input_time_ms:.0}ms ignored: head note {:.0}ms away",
            abs_err
        );
        return None;
    }

    let mut note = state.lanes.pop_oldest(lane)?;
    note.judged = true;
    if let Some(id) = note.marker {
        renderer.destroy(id);
    }

    let tier = state.windows.classify(abs_err);
    let points = state.stats.record(tier, Some(time_error_ms));
    debug!(
        "JUDGED: lane {lane:?}, {tier:?}, error {time_error_ms:+.1}ms, +{points} (combo {})",
        state.stats.combo
    );
    let judgment = Judgment {
        lane,
        tier,
        time_error_ms,
        points,
        timed_out: false,
    };
    report(state, judgment.clone(), renderer);
    Some(judgment)
}

/// Books a note the scheduler has already removed from its queue as a Miss.
pub(crate) fn record_timeout_miss(
    state: &mut StageSession,
    mut note: RuntimeNote,
    now_ms: f64,
    renderer: &mut dyn Renderer,
) {
    note.judged = true;
    if let Some(id) = note.marker {
        renderer.destroy(id);
    }
    state.stats.record(Tier::Miss, None);
    report(
        state,
        Judgment {
            lane: note.lane,
            tier: Tier::Miss,
            time_error_ms: now_ms - note.target_time_ms,
            points: 0,
            timed_out: true,
        },
        renderer,
    );
}
