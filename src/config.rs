use crate::core::input::{DEFAULT_LANE_KEYS, LaneKey, NUM_LANES};
use crate::game::gameplay::{StageConfig, StageLayout};
use log::{info, warn};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

const CONFIG_PATH: &str = "lanestage.ini";

// --- Minimal INI reader ---
#[derive(Debug, Default)]
pub struct SimpleIni {
    sections: FxHashMap<String, FxHashMap<String, String>>,
}

impl SimpleIni {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        self.parse(&content);
        Ok(())
    }

    pub fn parse(&mut self, content: &str) {
        self.sections.clear();
        let mut current_section: Option<String> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            // Section header: [SectionName]
            if line.starts_with('[') && line.ends_with(']') && line.len() >= 2 {
                let section = line[1..line.len() - 1].trim().to_string();
                current_section = Some(section.clone());
                self.sections.entry(section).or_default();
                continue;
            }

            // Key/value pair: key=value
            if let Some((key_raw, value_raw)) = line.split_once('=') {
                let key = key_raw.trim();
                if key.is_empty() {
                    continue;
                }
                let section = current_section.clone().unwrap_or_default();
                self.sections
                    .entry(section)
                    .or_default()
                    .insert(key.to_string(), value_raw.trim().to_string());
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section).and_then(|s| s.get(key)).cloned()
    }

    pub fn has(&self, section: &str, key: &str) -> bool {
        self.sections.get(section).is_some_and(|s| s.contains_key(key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// How long a note is visible before it reaches the hit line.
    pub approach_time_ms: u32,
    /// Distance in pixels from the bottom of the screen to the hit line.
    pub hit_line_offset: u32,
    pub lane_width: u32,
    pub lane_gap: u32,
    pub max_hit_distance_ms: u32,
    pub miss_threshold_ms: u32,
    /// Scheduler ticks per second (40 = one tick every 25ms).
    pub tick_rate_hz: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub log_level: LogLevel,
    pub lane_keys: [LaneKey; NUM_LANES],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            approach_time_ms: 600,
            hit_line_offset: 150,
            lane_width: 140,
            lane_gap: 20,
            max_hit_distance_ms: 200,
            miss_threshold_ms: 200,
            tick_rate_hz: 40,
            screen_width: 1600,
            screen_height: 900,
            log_level: LogLevel::Warn,
            lane_keys: DEFAULT_LANE_KEYS,
        }
    }
}

impl Config {
    /// The explicit settings handed to a stage at start. Gameplay never reads
    /// the global config itself.
    pub fn stage_config(&self) -> StageConfig {
        StageConfig {
            approach_time_ms: f64::from(self.approach_time_ms),
            max_hit_distance_ms: f64::from(self.max_hit_distance_ms),
            miss_threshold_ms: f64::from(self.miss_threshold_ms),
            layout: StageLayout {
                screen_width: self.screen_width as f32,
                screen_height: self.screen_height as f32,
                lane_width: self.lane_width as f32,
                lane_gap: self.lane_gap as f32,
                hit_line_offset: self.hit_line_offset as f32,
            },
            keys: self.lane_keys,
        }
    }

    #[inline(always)]
    pub fn tick_interval_ms(&self) -> f64 {
        1000.0 / f64::from(self.tick_rate_hz.max(1))
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

const OPTION_KEYS: [&str; 10] = [
    "ApproachTimeMs",
    "HitLineOffset",
    "LaneGap",
    "LaneWidth",
    "LogLevel",
    "MaxHitDistanceMs",
    "MissThresholdMs",
    "ScreenHeight",
    "ScreenWidth",
    "TickRateHz",
];

const KEYMAP_KEYS: [&str; NUM_LANES] = ["Lane1", "Lane2", "Lane3", "Lane4"];

// --- File I/O ---

fn render(cfg: &Config) -> String {
    let mut content = String::new();

    // [Options] section - keys in alphabetical order
    content.push_str("[Options]\n");
    content.push_str(&format!("ApproachTimeMs={}\n", cfg.approach_time_ms));
    content.push_str(&format!("HitLineOffset={}\n", cfg.hit_line_offset));
    content.push_str(&format!("LaneGap={}\n", cfg.lane_gap));
    content.push_str(&format!("LaneWidth={}\n", cfg.lane_width));
    content.push_str(&format!("LogLevel={}\n", cfg.log_level.as_str()));
    content.push_str(&format!("MaxHitDistanceMs={}\n", cfg.max_hit_distance_ms));
    content.push_str(&format!("MissThresholdMs={}\n", cfg.miss_threshold_ms));
    content.push_str(&format!("ScreenHeight={}\n", cfg.screen_height));
    content.push_str(&format!("ScreenWidth={}\n", cfg.screen_width));
    content.push_str(&format!("TickRateHz={}\n", cfg.tick_rate_hz));
    content.push('\n');

    content.push_str("[Keymaps]\n");
    for (name, key) in KEYMAP_KEYS.iter().zip(cfg.lane_keys) {
        content.push_str(&format!("{name}={key}\n"));
    }
    content.push('\n');
    content
}

fn create_default_config_file(path: &Path) -> Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    std::fs::write(path, render(&Config::default()))
}

#[inline(always)]
fn parse_or<T: FromStr>(conf: &SimpleIni, section: &str, key: &str, default: T) -> T {
    match conf.get(section, key) {
        Some(v) => v.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Invalid value '{v}' for {section}.{key}; using default.");
            default
        }),
        None => default,
    }
}

/// Builds a config from parsed INI contents, falling back to the default for
/// every key that is missing or malformed.
pub fn from_ini(conf: &SimpleIni) -> Config {
    let default = Config::default();
    let positive = |v: u32, d: u32| if v == 0 { d } else { v };

    let mut lane_keys = default.lane_keys;
    for (i, name) in KEYMAP_KEYS.iter().enumerate() {
        lane_keys[i] = parse_or(conf, "Keymaps", name, default.lane_keys[i]);
    }
    let mut seen: Vec<LaneKey> = Vec::with_capacity(NUM_LANES);
    for key in lane_keys {
        if seen.contains(&key) {
            warn!("Key '{key}' is bound to more than one lane; using default keymap.");
            lane_keys = default.lane_keys;
            break;
        }
        seen.push(key);
    }

    Config {
        approach_time_ms: positive(
            parse_or(conf, "Options", "ApproachTimeMs", default.approach_time_ms),
            default.approach_time_ms,
        ),
        hit_line_offset: parse_or(conf, "Options", "HitLineOffset", default.hit_line_offset),
        lane_width: positive(
            parse_or(conf, "Options", "LaneWidth", default.lane_width),
            default.lane_width,
        ),
        lane_gap: parse_or(conf, "Options", "LaneGap", default.lane_gap),
        max_hit_distance_ms: positive(
            parse_or(conf, "Options", "MaxHitDistanceMs", default.max_hit_distance_ms),
            default.max_hit_distance_ms,
        ),
        miss_threshold_ms: parse_or(conf, "Options", "MissThresholdMs", default.miss_threshold_ms),
        tick_rate_hz: positive(
            parse_or(conf, "Options", "TickRateHz", default.tick_rate_hz),
            default.tick_rate_hz,
        ),
        screen_width: positive(
            parse_or(conf, "Options", "ScreenWidth", default.screen_width),
            default.screen_width,
        ),
        screen_height: positive(
            parse_or(conf, "Options", "ScreenHeight", default.screen_height),
            default.screen_height,
        ),
        log_level: parse_or(conf, "Options", "LogLevel", default.log_level),
        lane_keys,
    }
}

fn is_missing_fields(conf: &SimpleIni) -> bool {
    OPTION_KEYS.iter().any(|k| !conf.has("Options", k))
        || KEYMAP_KEYS.iter().any(|k| !conf.has("Keymaps", k))
}

pub fn load() {
    load_from(Path::new(CONFIG_PATH));
}

fn load_from(path: &Path) {
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
    }

    let mut conf = SimpleIni::new();
    match conf.load(path) {
        Ok(()) => {
            let loaded = from_ini(&conf);
            *CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = loaded;
            if is_missing_fields(&conf) {
                if let Err(e) = std::fs::write(path, render(&loaded)) {
                    warn!("Failed to save config file: {e}");
                }
                info!("'{}' updated with default values for any missing fields.", path.display());
            } else {
                info!("Configuration OK; no write needed.");
            }
        }
        Err(e) => {
            warn!("Failed to load '{}': {e}. Using default values.", path.display());
        }
    }
}

pub fn get() -> Config {
    *CONFIG.lock().unwrap_or_else(PoisonError::into_inner)
}
