use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RecordError;

pub const DEFAULT_DURATION_SECS: f64 = 120.0;
pub const DEFAULT_FPS: u32 = 24;
pub const DEFAULT_RESOLUTION: Resolution = Resolution {
    width: 1280,
    height: 720,
};
pub const DEFAULT_FOLDER_NAME: &str = "recordings";
pub const DEFAULT_MAX_CLIPS: u32 = 1;
pub const CLIP_PAUSE: Duration = Duration::from_secs(1);

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Bytes in one packed RGB24 frame at this size.
    pub fn rgb_frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = RecordError;

    /// Parses `WIDTHxHEIGHT`, e.g. `1280x720`. The separator is case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || {
            RecordError::Config(format!(
                "resolution must be in the format WIDTHxHEIGHT (e.g. 1280x720), got '{}'",
                s
            ))
        };

        let lowered = s.trim().to_ascii_lowercase();
        let (w, h) = lowered.split_once('x').ok_or_else(malformed)?;
        let width: u32 = w.trim().parse().map_err(|_| malformed())?;
        let height: u32 = h.trim().parse().map_err(|_| malformed())?;
        if width == 0 || height == 0 {
            return Err(RecordError::Config(format!(
                "resolution dimensions must be non-zero, got '{}'",
                s
            )));
        }
        Ok(Resolution { width, height })
    }
}

/// How the capture loop spends the slack left in each frame interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PacingMode {
    /// Sleep `interval - elapsed` after each frame. Overruns accumulate as drift.
    #[default]
    PerFrame,
    /// Sleep until `start + (i + 1) * interval`, absorbing earlier overruns.
    Deadline,
}

impl fmt::Display for PacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacingMode::PerFrame => f.write_str("per-frame"),
            PacingMode::Deadline => f.write_str("deadline"),
        }
    }
}

/// Parameters of a single clip. Built once and never mutated while recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingConfig {
    pub output: Option<PathBuf>,
    pub duration_secs: f64,
    pub fps: u32,
    pub resolution: Resolution,
    pub pacing: PacingMode,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output: None,
            duration_secs: DEFAULT_DURATION_SECS,
            fps: DEFAULT_FPS,
            resolution: DEFAULT_RESOLUTION,
            pacing: PacingMode::default(),
        }
    }
}

impl RecordingConfig {
    pub fn total_frames(&self) -> u64 {
        (self.fps as f64 * self.duration_secs).round() as u64
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        if self.fps == 0 {
            return Err(RecordError::Config("fps must be at least 1".into()));
        }
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err(RecordError::Config(format!(
                "duration must be a non-negative number of seconds, got {}",
                self.duration_secs
            )));
        }
        Ok(())
    }
}

/// Settings of the clip sequencer used when no explicit output path is given.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerConfig {
    pub folder: PathBuf,
    pub max_clips: u32,
    pub pause: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            max_clips: DEFAULT_MAX_CLIPS,
            pause: CLIP_PAUSE,
        }
    }
}

/// `recordings/` next to the running executable, or relative to the working
/// directory when the executable path is unavailable.
pub fn default_folder() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_FOLDER_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FOLDER_NAME))
}
