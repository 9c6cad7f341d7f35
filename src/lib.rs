//! Four-lane keyboard rhythm game core: `.osu` chart decoding and a stage
//! runtime driven by the audio clock.

pub mod config;
pub mod core;
pub mod game;
pub mod ui;

pub use game::chart::Chart;
pub use game::parsing::osu::decode;
pub use game::stage::{Stage, StageAction, StageError, StartOutcome};

#[cfg(test)]
mod tests {
    use crate::core::audio::ManualClock;
    use crate::core::gfx::HeadlessRenderer;
    use crate::core::input::{KeyBus, Lane};
    use crate::game::gameplay::{Phase, StageConfig};
    use crate::game::timing_windows::Tier;
    use crate::{Stage, StageAction, StartOutcome, decode};
    use std::path::Path;

    const CHART: &str = "[General]\nAudioFilename: song.ogg\nPreviewTime: 1500\n\
[Metadata]\nTitle:Drill\nCreator:someone\n\
[Events]\n0,0,\"bg.png\",0,0\n\
[TimingPoints]\n0,500,4,1,0,100,1,0\n\
[HitObjects]\n64,192,1000,1,0\n192,192,1500,1,0\n320,192,2000,1,0\n";

    #[test]
    fn decoded_chart_plays_pauses_and_cancels_through_the_public_api() {
        let chart = decode(CHART);
        assert_eq!(chart.creator(), Some("someone"));
        assert_eq!(chart.preview_time_ms(), Some(1500));
        assert_eq!(chart.background_file().as_deref(), Some("bg.png"));
        assert_eq!(chart.base_bpm(), Some(120.0));
        assert_eq!(chart.rating(), 0);

        let mut bus = KeyBus::new();
        let mut stage = Stage::new(ManualClock::new(), HeadlessRenderer::new());
        let outcome = stage
            .start(&chart, Path::new("songs"), StageConfig::default(), &mut bus)
            .expect("stage starts");
        assert_eq!(outcome, StartOutcome::Running);

        stage.audio_mut().set(1000.0);
        assert_eq!(stage.tick(25.0), StageAction::None);
        assert!(stage.pause());
        assert!(stage.is_paused());
        assert!(stage.on_input(Lane::Left, 1000.0).is_none(), "paused presses are dropped");
        assert!(stage.resume());
        let hit = stage.on_input(Lane::Left, 1000.0).expect("judged after resume");
        assert_eq!(hit.tier, Tier::Perfect);

        assert!(stage.cancel());
        assert_eq!(stage.phase(), Phase::Cancelled);
        let stats = stage.last_stats().expect("cancel records stats");
        assert_eq!((stats.judged(), stats.total_notes), (1, 3));
        assert_eq!(bus.listener_count(), 0);
    }
}
