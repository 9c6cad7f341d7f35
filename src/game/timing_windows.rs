// Judgement windows shared by gameplay scoring and the judgement popups.

use crate::ui::color;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Perfect,
    Great,
    Good,
    Bad,
    Miss,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::Perfect, Tier::Great, Tier::Good, Tier::Bad, Tier::Miss];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Base points for the tier, before the combo multiplier.
    #[inline(always)]
    pub const fn weight(self) -> u64 {
        match self {
            Tier::Perfect => 300,
            Tier::Great => 200,
            Tier::Good => 100,
            Tier::Bad => 20,
            Tier::Miss => 0,
        }
    }

    pub const fn text(self) -> &'static str {
        match self {
            Tier::Perfect => "Perfect!",
            Tier::Great => "Great!",
            Tier::Good => "Good!",
            Tier::Bad => "Bad!",
            Tier::Miss => "Miss!",
        }
    }

    pub const fn color(self) -> [f32; 4] {
        match self {
            Tier::Perfect => color::JUDGE_PERFECT,
            Tier::Great => color::JUDGE_GREAT,
            Tier::Good => color::JUDGE_GOOD,
            Tier::Bad => color::JUDGE_BAD,
            Tier::Miss => color::JUDGE_MISS,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct TimingWindow {
    /// Upper bound (inclusive) as a fraction of the max hit distance.
    pub max_ratio: f64,
    pub tier: Tier,
}

// Tightest first. Anything past the last bound is a Miss.
pub const TIMING_WINDOWS: [TimingWindow; 4] = [
    TimingWindow { max_ratio: 0.30, tier: Tier::Perfect },
    TimingWindow { max_ratio: 0.50, tier: Tier::Great },
    TimingWindow { max_ratio: 0.75, tier: Tier::Good },
    TimingWindow { max_ratio: 1.00, tier: Tier::Bad },
];

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimingWindowTable {
    max_hit_distance_ms: f64,
}

impl TimingWindowTable {
    pub fn new(max_hit_distance_ms: f64) -> Self {
        Self { max_hit_distance_ms }
    }

    #[inline(always)]
    pub fn max_hit_distance_ms(&self) -> f64 {
        self.max_hit_distance_ms
    }

    /// Window width in milliseconds for a hit tier, `None` for `Miss`.
    pub fn window_ms(&self, tier: Tier) -> Option<f64> {
        TIMING_WINDOWS
            .iter()
            .find(|w| w.tier == tier)
            .map(|w| w.max_ratio * self.max_hit_distance_ms)
    }

    /// Walks the table top to bottom and returns the first window the error
    /// fits in. Sign is ignored.
    pub fn classify(&self, error_ms: f64) -> Tier {
        let error = error_ms.abs();
        if !error.is_finite() {
            return Tier::Miss;
        }
        for w in &TIMING_WINDOWS {
            if error <= w.max_ratio * self.max_hit_distance_ms {
                return w.tier;
            }
        }
        Tier::Miss
    }
}
