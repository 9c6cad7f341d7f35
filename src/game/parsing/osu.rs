//! Decoder for the line-oriented `.osu` chart text.
//!
//! Decoding is best effort and never fails: lines that cannot be understood
//! are counted in `Chart::skipped_lines` and otherwise ignored, missing
//! sections simply stay empty.

use crate::game::chart::{Chart, HitObject, KeyValues, LaneCode};
use log::{debug, trace};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Section {
    General,
    Editor,
    Metadata,
    Difficulty,
    Events,
    TimingPoints,
    HitObjects,
    Other(String),
}

impl Section {
    fn from_header(header: &str) -> Self {
        match header {
            "[General]" => Self::General,
            "[Editor]" => Self::Editor,
            "[Metadata]" => Self::Metadata,
            "[Difficulty]" => Self::Difficulty,
            "[Events]" => Self::Events,
            "[TimingPoints]" => Self::TimingPoints,
            "[HitObjects]" => Self::HitObjects,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Splits at the first colon only; values may contain colons themselves.
/// `General` and `Editor` write `Key: Value`, so one space after the
/// separator is dropped there.
#[inline(always)]
fn split_key_value(line: &str, strip_one_space: bool) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim_end();
    if key.is_empty() {
        return None;
    }
    let value = if strip_one_space {
        value.strip_prefix(' ').unwrap_or(value)
    } else {
        value
    };
    Some((key, value))
}

#[inline(always)]
fn parse_non_negative(field: &str) -> Option<u32> {
    let field = field.trim();
    if let Ok(v) = field.parse::<u32>() {
        return Some(v);
    }
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0 && *v <= f64::from(u32::MAX))
        .map(|v| v.floor() as u32)
}

enum HitObjectLine {
    Note(HitObject),
    EmptyLane,
    Malformed,
}

fn parse_hit_object(line: &str) -> HitObjectLine {
    let fields: Vec<&str> = line.split(',').collect();
    if fields[0].is_empty() {
        return HitObjectLine::EmptyLane;
    }
    let lane = parse_non_negative(fields[0]);
    let time = fields.get(2).and_then(|f| parse_non_negative(f));
    match (lane, time) {
        (Some(lane), Some(time_ms)) => HitObjectLine::Note(HitObject {
            lane: LaneCode(lane),
            time_ms,
        }),
        _ => HitObjectLine::Malformed,
    }
}

fn kv_target<'a>(chart: &'a mut Chart, section: &Section) -> Option<&'a mut KeyValues> {
    match section {
        Section::General => Some(&mut chart.general),
        Section::Editor => Some(&mut chart.editor),
        Section::Metadata => Some(&mut chart.metadata),
        Section::Difficulty => Some(&mut chart.difficulty),
        Section::Other(name) => Some(chart.other_sections.entry(name.clone()).or_default()),
        Section::Events | Section::TimingPoints | Section::HitObjects => None,
    }
}

fn reset_section(chart: &mut Chart, section: &Section) {
    match section {
        Section::General => chart.general.clear(),
        Section::Editor => chart.editor.clear(),
        Section::Metadata => chart.metadata.clear(),
        Section::Difficulty => chart.difficulty.clear(),
        Section::Events => chart.events.clear(),
        Section::TimingPoints => chart.timing_points.clear(),
        Section::HitObjects => chart.hit_objects.clear(),
        Section::Other(name) => {
            chart.other_sections.insert(name.clone(), KeyValues::default());
        }
    }
}

/// Decodes chart text into a `Chart`. Total over any input.
pub fn decode(text: &str) -> Chart {
    let mut chart = Chart::default();
    let mut current: Option<Section> = None;

    // Any newline convention; blank lines carry nothing.
    for (line_no, line) in text
        .split(['\r', '\n'])
        .enumerate()
        .filter(|(_, l)| !l.is_empty())
    {
        if line.starts_with('[') {
            let section = Section::from_header(line.trim_end());
            reset_section(&mut chart, &section);
            current = Some(section);
            continue;
        }

        let Some(section) = current.as_ref() else {
            continue;
        };

        match section {
            Section::Events => {
                if line.starts_with("//") {
                    continue;
                }
                chart
                    .events
                    .push(line.split(',').map(str::to_string).collect());
            }
            Section::TimingPoints => {
                let fields: Result<Vec<f64>, _> =
                    line.split(',').map(|f| f.trim().parse::<f64>()).collect();
                match fields {
                    Ok(fields) => chart.timing_points.push(fields),
                    Err(_) => {
                        trace!("Skipping timing point on line {}: {line:?}", line_no + 1);
                        chart.skipped_lines += 1;
                    }
                }
            }
            Section::HitObjects => match parse_hit_object(line) {
                HitObjectLine::Note(note) => chart.hit_objects.push(note),
                HitObjectLine::EmptyLane => {
                    trace!("Dropping hit object without lane on line {}", line_no + 1);
                }
                HitObjectLine::Malformed => {
                    trace!("Skipping hit object on line {}: {line:?}", line_no + 1);
                    chart.skipped_lines += 1;
                }
            },
            kv => {
                let strip = matches!(kv, Section::General | Section::Editor);
                match split_key_value(line, strip) {
                    Some((key, value)) => {
                        if let Some(map) = kv_target(&mut chart, kv) {
                            map.insert(key.to_string(), value.to_string());
                        }
                    }
                    None => {
                        trace!("Skipping key/value on line {}: {line:?}", line_no + 1);
                        chart.skipped_lines += 1;
                    }
                }
            }
        }
    }

    debug!(
        "Decoded chart: {} hit objects, {} timing points, {} events, {} skipped lines",
        chart.hit_objects.len(),
        chart.timing_points.len(),
        chart.events.len(),
        chart.skipped_lines
    );
    chart
}

#[cfg(test)]
mod tests {
    use super::decode;
    use crate::game::chart::{HitObject, LaneCode};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SAMPLE: &str = "osu file format v14\r\n\
\r\n\
[General]\r\n\
AudioFilename: audio.mp3\r\n\
AudioLeadIn: 0\r\n\
PreviewTime: 61234\r\n\
Mode: 3\r\n\
\r\n\
[Editor]\r\n\
DistanceSpacing: 1\r\n\
\r\n\
[Metadata]\r\n\
Title:Night Drive\r\n\
Artist:Someone\r\n\
Creator:mapper\r\n\
Version:4K Hard\r\n\
Source:\r\n\
Tags:synth retro 10:30\r\n\
\r\n\
[Difficulty]\r\n\
HPDrainRate:8\r\n\
CircleSize:4\r\n\
OverallDifficulty:8\r\n\
\r\n\
[Events]\r\n\
//Background and Video events\r\n\
0,0,\"bg.jpg\",0,0\r\n\
//Break Periods\r\n\
\r\n\
[TimingPoints]\r\n\
250,400,4,2,1,40,1,0\r\n\
\r\n\
[Colours]\r\n\
Combo1 : 255,128,0\r\n\
\r\n\
[HitObjects]\r\n\
64,192,1000,1,0,0:0:0:0:\r\n\
192,192,1250,1,0,0:0:0:0:\r\n\
320,192,1500,128,0,1700:0:0:0:0:\r\n\
448,192,1500,1,0,0:0:0:0:\r\n";

    #[test]
    fn decodes_every_known_section() {
        let chart = decode(SAMPLE);
        assert_eq!(chart.audio_filename(), Some("audio.mp3"));
        assert_eq!(chart.general.get("Mode").map(String::as_str), Some("3"));
        assert_eq!(chart.preview_time_ms(), Some(61234));
        assert_eq!(chart.editor.get("DistanceSpacing").map(String::as_str), Some("1"));
        assert_eq!(chart.title(), Some("Night Drive"));
        assert_eq!(chart.version(), Some("4K Hard"));
        assert_eq!(chart.metadata.get("Source").map(String::as_str), Some(""));
        assert_eq!(chart.difficulty.get("CircleSize").map(String::as_str), Some("4"));
        assert_eq!(chart.events.len(), 1, "comment lines are not events");
        assert_eq!(chart.background_file().as_deref(), Some("bg.jpg"));
        assert_eq!(chart.timing_points, vec![vec![250.0, 400.0, 4.0, 2.0, 1.0, 40.0, 1.0, 0.0]]);
        assert_eq!(chart.base_bpm(), Some(150.0));
        assert_eq!(
            chart
                .other_sections
                .get("[Colours]")
                .and_then(|s| s.get("Combo1"))
                .map(String::as_str),
            Some(" 255,128,0")
        );
        assert_eq!(
            chart.hit_objects,
            vec![
                HitObject { lane: LaneCode(64), time_ms: 1000 },
                HitObject { lane: LaneCode(192), time_ms: 1250 },
                HitObject { lane: LaneCode(320), time_ms: 1500 },
                HitObject { lane: LaneCode(448), time_ms: 1500 },
            ]
        );
        assert_eq!(chart.skipped_lines, 0);
    }

    #[test]
    fn only_the_first_colon_separates_key_from_value() {
        let chart = decode("[General]\nAudioFilename: a: b.mp3\n[Metadata]\nTags:x:y:z\n");
        assert_eq!(chart.audio_filename(), Some("a: b.mp3"));
        assert_eq!(chart.metadata.get("Tags").map(String::as_str), Some("x:y:z"));
    }

    #[test]
    fn general_tolerates_a_missing_space_after_the_colon() {
        let chart = decode("[General]\nAudioFilename:song.ogg\n");
        assert_eq!(chart.audio_filename(), Some("song.ogg"));
    }

    #[test]
    fn lines_before_the_first_header_are_ignored() {
        let chart = decode("Title:Ghost\n64,0,100,1,0\n[Metadata]\nTitle:Real\n");
        assert_eq!(chart.title(), Some("Real"));
        assert!(chart.hit_objects.is_empty());
        assert_eq!(chart.skipped_lines, 0);
    }

    #[test]
    fn empty_lane_field_drops_the_record() {
        let chart = decode("[HitObjects]\n,192,1000,1,0\n64,192,2000,1,0\n");
        assert_eq!(chart.hit_objects, vec![HitObject { lane: LaneCode(64), time_ms: 2000 }]);
        assert_eq!(chart.skipped_lines, 0, "an empty lane is a drop, not a format error");
    }

    #[test]
    fn malformed_lines_are_skipped_and_counted() {
        let chart = decode(
            "[General]\nno separator here\n[TimingPoints]\n0,abc,4\n[HitObjects]\n64\nx,0,100\n64,0,-5\n320,0,750,1\n",
        );
        assert_eq!(chart.hit_objects, vec![HitObject { lane: LaneCode(320), time_ms: 750 }]);
        assert!(chart.timing_points.is_empty());
        assert_eq!(chart.skipped_lines, 5);
    }

    #[test]
    fn repeated_header_reinitializes_the_section() {
        let chart = decode("[HitObjects]\n64,0,100\n[Metadata]\nTitle:A\n[HitObjects]\n192,0,200\n");
        assert_eq!(chart.hit_objects, vec![HitObject { lane: LaneCode(192), time_ms: 200 }]);
        assert_eq!(chart.title(), Some("A"));
    }

    #[test]
    fn decoder_keeps_source_order() {
        let chart = decode("[HitObjects]\n64,0,300\n192,0,100\n");
        let times: Vec<u32> = chart.hit_objects.iter().map(|h| h.time_ms).collect();
        assert_eq!(times, vec![300, 100], "the decoder does not re-sort");
    }

    #[test]
    fn well_formed_hit_objects_keep_fields_zero_and_two() {
        let mut rng = StdRng::seed_from_u64(0x4b4b);
        for _ in 0..500 {
            let lane: u32 = rng.random_range(0..1024);
            let y: u32 = rng.random_range(0..512);
            let time: u32 = rng.random_range(0..600_000);
            let text = format!("[HitObjects]\n{lane},{y},{time},1,0,0:0:0:0:\n");
            let chart = decode(&text);
            assert_eq!(
                chart.hit_objects,
                vec![HitObject { lane: LaneCode(lane), time_ms: time }],
                "line {text:?}"
            );
        }
    }

    #[test]
    fn decode_is_total_under_random_edits() {
        const NOISE: &[&str] = &[
            "[",
            "[]",
            "[HitObjects",
            ":",
            ",,,,",
            "//",
            "\u{feff}[General]",
            "64,,",
            "é:ü",
            "[Events]",
            "999999999999999999999,0,1e400",
            "NaN,0,NaN",
            "\t",
        ];
        let base: Vec<&str> = SAMPLE.lines().collect();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2_000 {
            let mut lines: Vec<String> = base.iter().map(|l| l.to_string()).collect();
            for _ in 0..rng.random_range(1..12) {
                let at = rng.random_range(0..=lines.len());
                if rng.random_bool(0.5) && !lines.is_empty() && at < lines.len() {
                    lines.remove(at);
                } else {
                    let noise = NOISE[rng.random_range(0..NOISE.len())];
                    lines.insert(at, noise.to_string());
                }
            }
            let sep = if rng.random_bool(0.5) { "\n" } else { "\r\n" };
            let chart = decode(&lines.join(sep));
            assert!(chart.hit_objects.len() <= lines.len());
        }
    }
}
