pub mod chart;
pub mod gameplay;
pub mod judgment;
pub mod lanes;
pub mod parsing;
pub mod stage;
pub mod stage_stats;
pub mod timing_windows;
