use lanestage::config;
use lanestage::core::audio::{AudioSource, SilentTrack};
use lanestage::core::gfx::HeadlessRenderer;
use lanestage::core::input::KeyBus;
use lanestage::game::chart::format_length;
use lanestage::game::gameplay::StageEvent;
use lanestage::game::stage_stats::StageStats;
use lanestage::game::timing_windows::Tier;
use lanestage::{Chart, Stage, StageAction, StartOutcome};
use log::{info, trace};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

// Silence kept after the last note so its timeout can still fire.
const TRACK_TAIL_MS: f64 = 2000.0;
const AUTOPLAY_JITTER_MS: f64 = 12.0;

const USAGE: &str =
    "usage: lanestage <chart.osu> [--dump] [--autoplay] [--json] [--cancel-after <ms>]";

#[derive(Debug, Default)]
struct Args {
    chart: PathBuf,
    dump: bool,
    autoplay: bool,
    json: bool,
    /// Abort the stage once playback reaches this position.
    cancel_after_ms: Option<f64>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut chart = None;
    let mut argv = std::env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--dump" => args.dump = true,
            "--autoplay" => args.autoplay = true,
            "--json" => args.json = true,
            "--cancel-after" => {
                let ms = argv
                    .next()
                    .and_then(|v| v.parse::<f64>().ok())
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .ok_or_else(|| format!("--cancel-after needs a position in ms\n{USAGE}"))?;
                args.cancel_after_ms = Some(ms);
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            s if s.starts_with("--") => return Err(format!("unknown flag '{s}'\n{USAGE}")),
            s => {
                if chart.replace(PathBuf::from(s)).is_some() {
                    return Err(format!("only one chart may be given\n{USAGE}"));
                }
            }
        }
    }
    args.chart = chart.ok_or_else(|| USAGE.to_string())?;
    Ok(args)
}

/// Press times a perfect-ish player would hit, sorted, with a little human
/// wobble on each.
fn autoplay_schedule(chart: &Chart) -> Vec<(f64, usize)> {
    let mut rng = rand::rng();
    let mut presses: Vec<(f64, usize)> = chart
        .hit_objects
        .iter()
        .filter_map(|h| {
            let lane = h.lane.lane()?;
            let jitter = rng.random_range(-AUTOPLAY_JITTER_MS..=AUTOPLAY_JITTER_MS);
            Some((f64::from(h.time_ms) + jitter, lane.index()))
        })
        .collect();
    presses.sort_by(|a, b| a.0.total_cmp(&b.0));
    presses
}

fn print_chart_header(chart: &Chart) {
    println!(
        "{} - {} [{}] by {}",
        chart.artist().unwrap_or("Unknown"),
        chart.title().unwrap_or("Untitled"),
        chart.version().unwrap_or("-"),
        chart.creator().unwrap_or("unknown")
    );
    let bpm = chart
        .base_bpm()
        .map_or_else(|| "?".to_string(), |b| format!("{b:.0}"));
    let preview = chart
        .preview_time_ms()
        .map_or_else(|| "-".to_string(), format_length);
    println!(
        "Length {} | {} notes | Rating {} | BPM {bpm} | Preview {preview}",
        format_length(chart.length_ms()),
        chart.hit_objects.len(),
        chart.rating()
    );
    if let Some(bg) = chart.background_file() {
        println!("Background: {bg}");
    }
}

fn report(chart: &Chart, stats: &StageStats, cancelled: bool, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }
    print_chart_header(chart);
    if cancelled {
        println!("(stage cancelled, {} of {} notes judged)", stats.judged(), stats.total_notes);
    }
    println!("Score:     {}", stats.score);
    println!("Max combo: {}", stats.max_combo);
    for tier in Tier::ALL {
        println!("{:<10} {}", format!("{tier:?}:"), stats.count(tier));
    }
    println!("Accuracy:  {:.2}%", stats.accuracy_percent());
    if let Some(mean) = stats.mean_error_ms() {
        println!("Mean err:  {mean:+.1}ms");
    }
    Ok(())
}

fn run_stage(args: &Args, chart: &Chart) -> Result<StageAction, Box<dyn std::error::Error>> {
    let cfg = config::get();
    let stage_cfg = cfg.stage_config();
    let song_dir = args.chart.parent().unwrap_or(Path::new("."));

    let track = SilentTrack::new(Some(f64::from(chart.length_ms()) + TRACK_TAIL_MS));
    let mut stage = Stage::new(track, HeadlessRenderer::new());
    let mut bus = KeyBus::new();

    if let StartOutcome::Completed(stats) = stage.start(chart, song_dir, stage_cfg, &mut bus)? {
        return Ok(StageAction::Completed(stats));
    }

    let presses = if args.autoplay {
        autoplay_schedule(chart)
    } else {
        Vec::new()
    };
    let mut next_press = 0;

    let interval_ms = cfg.tick_interval_ms();
    let interval = Duration::from_secs_f64(interval_ms / 1000.0);
    let mut next_tick = Instant::now();
    info!("Ticking every {interval_ms:.1}ms");

    loop {
        let now_ms = stage.audio().position_ms();
        if args.cancel_after_ms.is_some_and(|at| now_ms >= at) && stage.cancel() {
            return Ok(StageAction::Cancelled(
                stage.last_stats().cloned().unwrap_or_default(),
            ));
        }
        while let Some(&(at_ms, lane)) = presses.get(next_press) {
            if at_ms > now_ms {
                break;
            }
            bus.press(stage_cfg.keys[lane], now_ms);
            next_press += 1;
        }

        let action = stage.tick(interval_ms);
        for event in stage.take_events() {
            if let StageEvent::Judged(j) = event {
                trace!(
                    "{:?} {:?} {:+.1}ms (+{})",
                    j.lane, j.tier, j.time_error_ms, j.points
                );
            }
        }
        if action != StageAction::None {
            return Ok(action);
        }

        next_tick += interval;
        let now = Instant::now();
        if next_tick > now {
            std::thread::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    config::load();
    log::set_max_level(config::get().log_level.as_level_filter());

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let text = std::fs::read_to_string(&args.chart)?;
    let chart = lanestage::decode(&text);
    if chart.skipped_lines > 0 {
        log::warn!(
            "'{}': skipped {} malformed lines",
            args.chart.display(),
            chart.skipped_lines
        );
    }

    if args.dump {
        println!("{}", serde_json::to_string_pretty(&chart)?);
        return Ok(());
    }

    match run_stage(&args, &chart)? {
        StageAction::Completed(stats) => report(&chart, &stats, false, args.json)?,
        StageAction::Cancelled(stats) => report(&chart, &stats, true, args.json)?,
        StageAction::None => {}
    }
    Ok(())
}
