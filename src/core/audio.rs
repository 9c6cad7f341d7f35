use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/* ============================== Public API ============================== */

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio file '{}' not found", .0.display())]
    NotFound(PathBuf),
    #[error("audio file '{}' could not be read: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("audio file '{}' is empty", .0.display())]
    Empty(PathBuf),
    #[error("playback failed: {0}")]
    PlaybackFailed(String),
}

/// The narrow contract the stage needs from whatever plays the song. The
/// playback position is the only clock gameplay trusts.
pub trait AudioSource {
    /// Prepares `path` for playback. Called once per stage start.
    fn open(&mut self, path: &Path) -> Result<(), AudioError>;
    fn play(&mut self) -> Result<(), AudioError>;
    /// Current playback position in milliseconds. May jump backwards after a
    /// seek and stands still while paused.
    fn position_ms(&self) -> f64;
    fn pause(&mut self);
    fn resume(&mut self);
    fn seek(&mut self, ms: f64);
    fn stop(&mut self);
    /// End-of-playback notification, polled by the stage each tick.
    fn has_ended(&self) -> bool;
}

/* ============================ Silent track ============================ */

/// Headless playback: validates the file, then follows the wall clock while
/// "playing". Decoding is someone else's job; the stage only needs a position.
#[derive(Debug)]
pub struct SilentTrack {
    path: Option<PathBuf>,
    duration_ms: Option<f64>,
    // Position at the last play/resume/seek, plus the instant it was taken.
    base_ms: f64,
    anchor: Option<Instant>,
    playing: bool,
}

impl SilentTrack {
    pub fn new(duration_ms: Option<f64>) -> Self {
        Self {
            path: None,
            duration_ms: duration_ms.filter(|d| d.is_finite() && *d > 0.0),
            base_ms: 0.0,
            anchor: None,
            playing: false,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[inline(always)]
    fn clamp_to_duration(&self, ms: f64) -> f64 {
        match self.duration_ms {
            Some(d) => ms.clamp(0.0, d),
            None => ms.max(0.0),
        }
    }

    fn freeze(&mut self) {
        self.base_ms = self.position_ms();
        self.anchor = None;
    }
}

impl AudioSource for SilentTrack {
    fn open(&mut self, path: &Path) -> Result<(), AudioError> {
        let meta = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AudioError::NotFound(path.to_path_buf())
            } else {
                AudioError::Unreadable {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        if meta.len() == 0 {
            return Err(AudioError::Empty(path.to_path_buf()));
        }
        debug!("Opened '{}' ({} bytes)", path.display(), meta.len());
        self.path = Some(path.to_path_buf());
        self.base_ms = 0.0;
        self.anchor = None;
        self.playing = false;
        Ok(())
    }

    fn play(&mut self) -> Result<(), AudioError> {
        if self.path.is_none() {
            return Err(AudioError::PlaybackFailed("no track opened".to_string()));
        }
        self.base_ms = 0.0;
        self.anchor = Some(Instant::now());
        self.playing = true;
        info!("Playback started");
        Ok(())
    }

    fn position_ms(&self) -> f64 {
        let elapsed = match (self.playing, self.anchor) {
            (true, Some(anchor)) => anchor.elapsed().as_secs_f64() * 1000.0,
            _ => 0.0,
        };
        self.clamp_to_duration(self.base_ms + elapsed)
    }

    fn pause(&mut self) {
        if self.playing {
            self.freeze();
            self.playing = false;
        }
    }

    fn resume(&mut self) {
        if !self.playing && self.path.is_some() {
            self.anchor = Some(Instant::now());
            self.playing = true;
        }
    }

    fn seek(&mut self, ms: f64) {
        self.base_ms = self.clamp_to_duration(ms);
        if self.playing {
            self.anchor = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        if self.playing || self.anchor.is_some() {
            debug!("Playback stopped at {:.0}ms", self.position_ms());
        }
        self.playing = false;
        self.anchor = None;
        self.base_ms = 0.0;
    }

    fn has_ended(&self) -> bool {
        self.duration_ms
            .is_some_and(|d| self.playing && self.position_ms() >= d)
    }
}

/* ============================ Manual clock ============================ */

/// A clock the caller moves by hand. Lets gameplay be driven to exact
/// positions without any real time passing.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock {
    pub position_ms: f64,
    pub playing: bool,
    pub paused: bool,
    pub ended: bool,
    pub opened: Option<PathBuf>,
    pub fail_open: bool,
    pub stop_calls: u32,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, ms: f64) {
        self.position_ms = ms;
    }
}

#[cfg(test)]
impl AudioSource for ManualClock {
    fn open(&mut self, path: &Path) -> Result<(), AudioError> {
        if self.fail_open {
            return Err(AudioError::NotFound(path.to_path_buf()));
        }
        self.opened = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) -> Result<(), AudioError> {
        self.playing = true;
        Ok(())
    }

    fn position_ms(&self) -> f64 {
        self.position_ms
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn seek(&mut self, ms: f64) {
        self.position_ms = ms;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.stop_calls += 1;
    }

    fn has_ended(&self) -> bool {
        self.ended
    }
}

#[cfg(test)]
mod tests {
    use super::{AudioError, AudioSource, SilentTrack};
    use std::io::Write;

    fn temp_file(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "lanestage-audio-{}-{name}",
            std::process::id()
        ));
        let mut f = std::fs::File::create(&path).expect("create temp audio file");
        f.write_all(bytes).expect("write temp audio file");
        path
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let mut track = SilentTrack::new(None);
        let err = track
            .open(std::path::Path::new("/definitely/not/here/audio.mp3"))
            .expect_err("missing file must not open");
        assert!(matches!(err, AudioError::NotFound(_)), "got {err:?}");
        assert!(track.play().is_err(), "play without an opened track fails");
    }

    #[test]
    fn empty_file_is_rejected() {
        let path = temp_file("empty.mp3", b"");
        let mut track = SilentTrack::new(None);
        let err = track.open(&path).expect_err("empty file must not open");
        assert!(matches!(err, AudioError::Empty(_)), "got {err:?}");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn seek_and_pause_hold_the_position() {
        let path = temp_file("song.mp3", b"ID3");
        let mut track = SilentTrack::new(Some(10_000.0));
        track.open(&path).expect("open");
        track.play().expect("play");
        track.pause();
        track.seek(4_000.0);
        assert_eq!(track.position_ms(), 4_000.0, "paused track stays where it was sought");
        track.seek(50_000.0);
        assert_eq!(track.position_ms(), 10_000.0, "seek clamps to the duration");
        assert!(!track.has_ended(), "a paused track does not report its end");
        track.resume();
        assert!(track.has_ended());
        track.stop();
        assert_eq!(track.position_ms(), 0.0);
        let _ = std::fs::remove_file(path);
    }
}
