use crate::core::audio::{AudioError, AudioSource};
use crate::core::gfx::{Renderer, Tag};
use crate::core::input::{InputEdge, KeyInput, Lane};
use crate::core::subscription::{Subscription, SubscriptionSet};
use crate::game::chart::Chart;
use crate::game::gameplay::{self, Phase, StageConfig, StageEvent, StageSession, TickOutcome};
use crate::game::judgment::{self, Judgment};
use crate::game::stage_stats::StageStats;
use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("chart does not name an audio file")]
    MissingAudioReference,
    #[error("could not start audio '{}': {source}", path.display())]
    MissingAudio {
        path: PathBuf,
        #[source]
        source: AudioError,
    },
    #[error("a stage is already running")]
    AlreadyActive,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StartOutcome {
    Running,
    /// Nothing to play; the stage went straight from building to completion.
    Completed(StageStats),
}

#[derive(Clone, Debug, PartialEq)]
pub enum StageAction {
    None,
    /// The chart ran out naturally; the caller should return to song select.
    Completed(StageStats),
    /// The ticker was cancelled from outside; the stage has been unwound.
    Cancelled(StageStats),
}

type EdgeQueue = Rc<RefCell<VecDeque<InputEdge>>>;

/// Owns a stage from start to finish and everything it subscribes to while
/// running: the frame ticker, one key listener per lane and the playing
/// track. Whether the stage completes or is cancelled, all of it is released
/// before the call returns.
pub struct Stage<A: AudioSource, R: Renderer> {
    audio: A,
    renderer: R,
    phase: Phase,
    paused: bool,
    session: Option<StageSession>,
    subscriptions: SubscriptionSet,
    ticker: Option<Subscription>,
    edges: EdgeQueue,
    events: Vec<StageEvent>,
    last_stats: Option<StageStats>,
}

impl<A: AudioSource, R: Renderer> Stage<A, R> {
    pub fn new(audio: A, renderer: R) -> Self {
        Self {
            audio,
            renderer,
            phase: Phase::Idle,
            paused: false,
            session: None,
            subscriptions: SubscriptionSet::new(),
            ticker: None,
            edges: Rc::new(RefCell::new(VecDeque::new())),
            events: Vec::new(),
            last_stats: None,
        }
    }

    #[inline(always)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn session(&self) -> Option<&StageSession> {
        self.session.as_ref()
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Stats of the most recent stage that ended, completed or cancelled.
    pub fn last_stats(&self) -> Option<&StageStats> {
        self.last_stats.as_ref()
    }

    /// A handle to the frame timer. The host loop keeps ticking only while it
    /// is active. Cancelling it stops the stage on the next `tick`.
    pub fn ticker(&self) -> Option<Subscription> {
        self.ticker.clone()
    }

    pub fn take_events(&mut self) -> Vec<StageEvent> {
        self.collect_session_events();
        std::mem::take(&mut self.events)
    }

    fn collect_session_events(&mut self) {
        if let Some(session) = self.session.as_mut() {
            self.events.append(&mut session.events);
        }
    }

    /// Builds the field, starts the song and hooks up keys and ticker.
    ///
    /// An empty chart completes immediately. A song that cannot be played is
    /// reported once and the stage is left idle.
    pub fn start(
        &mut self,
        chart: &Chart,
        song_dir: &Path,
        config: StageConfig,
        input: &mut dyn KeyInput,
    ) -> Result<StartOutcome, StageError> {
        if self.phase == Phase::Running {
            warn!("Stage start requested while one is already running");
            return Err(StageError::AlreadyActive);
        }
        self.events.clear();
        self.last_stats = None;
        self.paused = false;

        self.phase = Phase::Building;
        let mut session = gameplay::init(chart, config, &mut self.renderer);
        if session.pending.is_empty() {
            info!("Chart has no playable notes; completing immediately");
            self.session = Some(session);
            let stats = self.finish(Phase::Completing);
            return Ok(StartOutcome::Completed(stats));
        }

        let audio_path = match chart.audio_filename() {
            Some(name) => song_dir.join(name),
            None => {
                gameplay::teardown(&mut session, &mut self.renderer);
                self.phase = Phase::Idle;
                return Err(StageError::MissingAudioReference);
            }
        };
        if let Err(source) = self.audio.open(&audio_path).and_then(|()| self.audio.play()) {
            warn!("Failed to start '{}': {source}", audio_path.display());
            self.audio.stop();
            gameplay::teardown(&mut session, &mut self.renderer);
            self.phase = Phase::Idle;
            return Err(StageError::MissingAudio {
                path: audio_path,
                source,
            });
        }

        let ticker = Subscription::new("ticker");
        self.subscriptions.push(ticker.clone());
        self.ticker = Some(ticker);
        for lane in Lane::ALL {
            let key = config.keys[lane.index()];
            let edges = Rc::clone(&self.edges);
            let sub = input.subscribe(
                key,
                Box::new(move |t: f64| {
                    edges.borrow_mut().push_back(InputEdge {
                        lane,
                        event_music_time_ms: t,
                    });
                }),
            );
            self.subscriptions.push(sub);
        }

        session.current_time_ms = self.audio.position_ms();
        self.session = Some(session);
        self.phase = Phase::Running;
        info!(
            "Stage running: {} notes, {} subscriptions",
            self.session.as_ref().map_or(0, |s| s.pending.len()),
            self.subscriptions.len()
        );
        Ok(StartOutcome::Running)
    }

    /// Judges a press right away against the queues as of the last tick.
    pub fn on_input(&mut self, lane: Lane, input_time_ms: f64) -> Option<Judgment> {
        if self.phase != Phase::Running || self.paused {
            return None;
        }
        let session = self.session.as_mut()?;
        judgment::judge_press(session, lane, input_time_ms, &mut self.renderer)
    }

    fn process_input_edges(&mut self) {
        let edges: Vec<InputEdge> = self.edges.borrow_mut().drain(..).collect();
        if self.paused {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        for edge in edges {
            judgment::judge_press(session, edge.lane, edge.event_music_time_ms, &mut self.renderer);
        }
    }

    /// One fixed-rate step. Queued presses are judged first, then the clock
    /// is re-read from the audio source and the scheduler runs.
    pub fn tick(&mut self, delta_ms: f64) -> StageAction {
        if self.phase != Phase::Running {
            debug!("Tick ignored in phase {:?}", self.phase);
            return StageAction::None;
        }
        if self.ticker.as_ref().is_some_and(|t| !t.is_active()) {
            warn!("Stage ticker was cancelled externally; cancelling stage");
            return StageAction::Cancelled(self.finish(Phase::Cancelled));
        }

        self.process_input_edges();

        let now_ms = self.audio.position_ms();
        let ended = self.audio.has_ended();
        let outcome = match self.session.as_mut() {
            Some(session) => {
                let outcome = gameplay::update(session, now_ms, delta_ms, &mut self.renderer);
                if ended && outcome == TickOutcome::Continue {
                    gameplay::flush_remaining_as_misses(session, &mut self.renderer);
                    TickOutcome::Finished
                } else {
                    outcome
                }
            }
            None => TickOutcome::Finished,
        };

        match outcome {
            TickOutcome::Continue => StageAction::None,
            TickOutcome::Finished => StageAction::Completed(self.finish(Phase::Completing)),
        }
    }

    pub fn pause(&mut self) -> bool {
        if self.phase != Phase::Running || self.paused {
            return false;
        }
        self.audio.pause();
        self.paused = true;
        info!("Stage paused");
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.phase != Phase::Running || !self.paused {
            return false;
        }
        self.audio.resume();
        self.paused = false;
        info!("Stage resumed");
        true
    }

    /// Stops the stage. Returns `false`, doing nothing, when no stage is
    /// running.
    pub fn cancel(&mut self) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        self.finish(Phase::Cancelled);
        true
    }

    /// Shared unwind for completion and cancellation.
    fn finish(&mut self, phase: Phase) -> StageStats {
        if self.phase == Phase::Running {
            self.audio.stop();
        }
        let released = self.subscriptions.cancel_all();
        self.ticker = None;
        self.edges.borrow_mut().clear();
        self.paused = false;

        self.collect_session_events();
        let stats = match self.session.take() {
            Some(mut session) => {
                gameplay::teardown(&mut session, &mut self.renderer);
                session.stats
            }
            None => StageStats::default(),
        };
        for tag in Tag::STAGE {
            self.renderer.destroy_tagged(tag);
        }
        self.phase = phase;

        match phase {
            Phase::Cancelled => info!(
                "Stage cancelled ({released} subscriptions released, score {})",
                stats.score
            ),
            _ => info!(
                "Stage complete: score {}, max combo {}, accuracy {:.2}%",
                stats.score,
                stats.max_combo,
                stats.accuracy_percent()
            ),
        }
        self.last_stats = Some(stats.clone());
        stats
    }
}
