use crate::core::input::Lane;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type KeyValues = FxHashMap<String, String>;
/// One comma-split line of a list section, fields untouched.
pub type Record = Vec<String>;

/// Raw column code as written in a hit object line (the x coordinate of a
/// 4-key chart). Only the four codes in `LANE_CODES` are playable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaneCode(pub u32);

impl LaneCode {
    pub const LANE_CODES: [(u32, Lane); 4] = [
        (64, Lane::Left),
        (192, Lane::Down),
        (320, Lane::Up),
        (448, Lane::Right),
    ];

    #[inline(always)]
    pub fn lane(self) -> Option<Lane> {
        Self::LANE_CODES
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|&(_, lane)| lane)
    }

    #[inline(always)]
    pub const fn for_lane(lane: Lane) -> Self {
        Self(Self::LANE_CODES[lane.index()].0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitObject {
    pub lane: LaneCode,
    pub time_ms: u32,
}

/// A decoded chart. Known sections get their own field; any other key/value
/// section lands in `other_sections` under its literal header.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Chart {
    pub general: KeyValues,
    pub editor: KeyValues,
    pub metadata: KeyValues,
    pub difficulty: KeyValues,
    pub events: Vec<Record>,
    pub timing_points: Vec<Vec<f64>>,
    pub hit_objects: Vec<HitObject>,
    pub other_sections: BTreeMap<String, KeyValues>,
    /// Lines that were inside a section but could not be understood.
    pub skipped_lines: usize,
}

impl Chart {
    #[inline(always)]
    fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn audio_filename(&self) -> Option<&str> {
        self.general
            .get("AudioFilename")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Song-select preview start. Charts use -1 for "unset".
    pub fn preview_time_ms(&self) -> Option<u32> {
        self.general
            .get("PreviewTime")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|v| u32::try_from(v).ok())
    }

    pub fn title(&self) -> Option<&str> {
        self.meta("Title")
    }

    pub fn artist(&self) -> Option<&str> {
        self.meta("Artist")
    }

    pub fn creator(&self) -> Option<&str> {
        self.meta("Creator")
    }

    pub fn version(&self) -> Option<&str> {
        self.meta("Version")
    }

    /// Background image named by the first event, without its quotes.
    pub fn background_file(&self) -> Option<String> {
        self.events
            .first()
            .and_then(|e| e.get(2))
            .map(|f| f.replace('"', ""))
            .filter(|f| !f.is_empty())
    }

    /// Coarse difficulty rating: one point per hundred notes.
    #[inline(always)]
    pub fn rating(&self) -> u32 {
        (self.hit_objects.len() / 100) as u32
    }

    pub fn length_ms(&self) -> u32 {
        self.hit_objects.last().map_or(0, |h| h.time_ms)
    }

    /// Tempo of the first uninherited timing point.
    pub fn base_bpm(&self) -> Option<f64> {
        self.timing_points
            .iter()
            .find(|tp| tp.get(6).is_none_or(|&uninherited| uninherited != 0.0))
            .and_then(|tp| tp.get(1).copied())
            .filter(|&beat_len| beat_len.is_finite() && beat_len > 0.0)
            .map(|beat_len| 60_000.0 / beat_len)
    }
}

/// `m:ss` for a duration in milliseconds.
pub fn format_length(ms: u32) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
