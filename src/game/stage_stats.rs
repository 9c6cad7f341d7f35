use crate::game::timing_windows::Tier;
use serde::{Deserialize, Serialize};

/// Running score/combo accumulators for one stage, and the summary handed
/// back when it ends.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StageStats {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    /// Indexed by `Tier::index()`.
    pub tier_counts: [u32; 5],
    pub total_notes: u32,
    /// Signed input-minus-target sum over every non-miss judgement.
    hit_error_sum_ms: f64,
}

impl StageStats {
    pub fn new(total_notes: u32) -> Self {
        Self {
            total_notes,
            ..Self::default()
        }
    }

    #[inline(always)]
    pub fn count(&self, tier: Tier) -> u32 {
        self.tier_counts[tier.index()]
    }

    pub fn judged(&self) -> u32 {
        self.tier_counts.iter().sum()
    }

    /// Applies one judgement. Points scale with the combo held *before* this
    /// note: `weight * (combo + 1)`. Returns the points awarded.
    pub fn record(&mut self, tier: Tier, signed_error_ms: Option<f64>) -> u64 {
        self.tier_counts[tier.index()] = self.tier_counts[tier.index()].saturating_add(1);
        if tier == Tier::Miss {
            self.combo = 0;
            return 0;
        }
        let points = tier.weight() * (u64::from(self.combo) + 1);
        self.score = self.score.saturating_add(points);
        self.combo = self.combo.saturating_add(1);
        self.max_combo = self.max_combo.max(self.combo);
        if let Some(err) = signed_error_ms.filter(|e| e.is_finite()) {
            self.hit_error_sum_ms += err;
        }
        points
    }

    /// Mean signed timing error of the hits; positive means late.
    pub fn mean_error_ms(&self) -> Option<f64> {
        let hits = self.judged() - self.count(Tier::Miss);
        (hits > 0).then(|| self.hit_error_sum_ms / f64::from(hits))
    }

    /// Weighted accuracy in percent, 100.0 when every judged note was Perfect.
    pub fn accuracy_percent(&self) -> f64 {
        let judged = self.judged();
        if judged == 0 {
            return 0.0;
        }
        let earned: u64 = Tier::ALL
            .iter()
            .map(|t| t.weight() * u64::from(self.count(*t)))
            .sum();
        let possible = Tier::Perfect.weight() * u64::from(judged);
        earned as f64 / possible as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::StageStats;
    use crate::game::timing_windows::Tier;

    #[test]
    fn combo_multiplies_points_and_miss_resets_it() {
        let mut stats = StageStats::new(4);
        assert_eq!(stats.record(Tier::Perfect, Some(5.0)), 300);
        assert_eq!(stats.record(Tier::Great, Some(-15.0)), 400);
        assert_eq!(stats.record(Tier::Miss, None), 0);
        assert_eq!(stats.combo, 0);
        assert_eq!(stats.record(Tier::Bad, Some(190.0)), 20);
        assert_eq!(stats.score, 720);
        assert_eq!(stats.max_combo, 2);
        assert_eq!(stats.judged(), 4);
        assert_eq!(stats.count(Tier::Miss), 1);
        assert_eq!(stats.mean_error_ms(), Some(60.0));
    }

    #[test]
    fn accuracy_is_weighted_against_all_perfect() {
        let mut stats = StageStats::new(2);
        assert_eq!(stats.accuracy_percent(), 0.0);
        assert_eq!(stats.mean_error_ms(), None);
        stats.record(Tier::Perfect, Some(0.0));
        stats.record(Tier::Miss, None);
        assert!((stats.accuracy_percent() - 50.0).abs() < 1e-9);
    }
}
