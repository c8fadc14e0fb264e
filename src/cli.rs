use std::path::PathBuf;

use crate::config::{
    default_folder, PacingMode, RecordingConfig, Resolution, SequencerConfig, CLIP_PAUSE,
    DEFAULT_DURATION_SECS, DEFAULT_FPS, DEFAULT_MAX_CLIPS, DEFAULT_RESOLUTION,
};
use crate::error::RecordError;
use crate::modules::components::video_encoding::ffmpeg_sink_fl::resolve_ffmpeg;

#[derive(clap::Parser, Debug)]
#[command(version, about = "Screen Recorder", long_about = None)]
pub struct Args {
    /// Output path for the .mp4 file. Records exactly one clip when given.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Recording duration in seconds.
    #[arg(long, default_value_t = DEFAULT_DURATION_SECS, value_parser = parse_duration)]
    pub duration: f64,

    /// Frames per second.
    #[arg(long, default_value_t = DEFAULT_FPS, value_parser = clap::value_parser!(u32).range(1..))]
    pub fps: u32,

    /// Output resolution (format: WIDTHxHEIGHT, e.g. 1280x720).
    #[arg(long, default_value_t = DEFAULT_RESOLUTION, value_parser = parse_resolution)]
    pub resolution: Resolution,

    /// Folder for timestamped recordings when --output is not given.
    #[arg(long)]
    pub folder: Option<PathBuf>,

    /// Maximum number of back-to-back clips when --output is not given.
    #[arg(long, default_value_t = DEFAULT_MAX_CLIPS, value_parser = clap::value_parser!(u32).range(1..))]
    pub clips: u32,

    /// How to correct for slow frames.
    #[arg(long, value_enum, default_value_t = PacingMode::PerFrame)]
    pub pacing: PacingMode,

    /// ffmpeg executable to encode with.
    #[arg(long, env = "SCREEN_RECORDER_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,
}

pub fn parse_resolution(s: &str) -> Result<Resolution, RecordError> {
    s.parse()
}

fn parse_duration(s: &str) -> Result<f64, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", s))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("duration must be a non-negative number, got '{}'", s));
    }
    Ok(secs)
}

impl Args {
    pub fn recording_config(&self) -> RecordingConfig {
        RecordingConfig {
            output: self.output.clone(),
            duration_secs: self.duration,
            fps: self.fps,
            resolution: self.resolution,
            pacing: self.pacing,
        }
    }

    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            folder: self.folder.clone().unwrap_or_else(default_folder),
            max_clips: self.clips,
            pause: CLIP_PAUSE,
        }
    }

    pub fn ffmpeg_path(&self) -> PathBuf {
        resolve_ffmpeg(self.ffmpeg.clone())
    }
}
