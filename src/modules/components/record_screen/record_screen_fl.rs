use scrap::{Capturer, Display};
use std::io::ErrorKind::WouldBlock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{PacingMode, RecordingConfig};
use crate::error::RecordError;
use crate::modules::components::frame_transform::frame_transform_fl::{transform, CapturedFrame};
use crate::modules::components::video_encoding::ffmpeg_sink_fl::{EncoderSink, SinkOpener};
use crate::modules::helpers::file_names_fl::ensure_parent_folder;

/// Anything that can hand out one snapshot of the screen.
pub trait ScreenSource {
    fn capture(&mut self) -> Result<CapturedFrame, RecordError>;
}

/// Time source and sleeper used to pace the loop.
pub trait Pacer {
    fn now(&self) -> Instant;
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPacer;

impl Pacer for SystemPacer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

const BLOCK_BACKOFF: Duration = Duration::from_millis(2);
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Primary display captured through `scrap`.
///
/// The capture API reports `WouldBlock` until the display has a new image. When
/// that lasts longer than `max_wait` the previous snapshot is repeated, so a
/// still screen does not stall the clip.
pub struct ScrapSource {
    capturer: Capturer,
    width: u32,
    height: u32,
    max_wait: Duration,
    last: Option<CapturedFrame>,
}

impl ScrapSource {
    pub fn primary(max_wait: Duration) -> Result<Self, RecordError> {
        let display = Display::primary()
            .map_err(|e| RecordError::Capture(format!("no primary display: {}", e)))?;
        let capturer = Capturer::new(display)
            .map_err(|e| RecordError::Capture(format!("cannot create capturer: {}", e)))?;
        let (width, height) = (capturer.width() as u32, capturer.height() as u32);
        log::debug!("Capturing primary display {}x{}", width, height);
        Ok(Self {
            capturer,
            width,
            height,
            max_wait,
            last: None,
        })
    }
}

impl ScreenSource for ScrapSource {
    fn capture(&mut self) -> Result<CapturedFrame, RecordError> {
        let start = Instant::now();
        loop {
            match self.capturer.frame() {
                Ok(frame) => {
                    let stride = frame.len() / self.height.max(1) as usize;
                    let captured = CapturedFrame {
                        width: self.width,
                        height: self.height,
                        stride,
                        data: frame.to_vec(),
                    };
                    self.last = Some(captured.clone());
                    return Ok(captured);
                }
                Err(error) if error.kind() == WouldBlock => {
                    let waited = start.elapsed();
                    match &self.last {
                        Some(last) if waited >= self.max_wait => return Ok(last.clone()),
                        None if waited >= FIRST_FRAME_TIMEOUT => {
                            return Err(RecordError::Capture(format!(
                                "no frame from display after {:.1?}",
                                waited
                            )))
                        }
                        _ => thread::sleep(BLOCK_BACKOFF),
                    }
                }
                Err(error) => return Err(RecordError::Capture(error.to_string())),
            }
        }
    }
}

/// Outcome of one recorded clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipReport {
    pub path: PathBuf,
    pub frames_planned: u64,
    pub frames_written: u64,
    pub elapsed: Duration,
    pub interrupted: bool,
}

/// Records one clip to `path`.
///
/// The sink is finished exactly once whatever happens inside the loop: after the
/// last frame, after `stop` is raised, and after a capture or encode error. An
/// interruption is reported through [`ClipReport::interrupted`], not as an error.
pub fn record_clip<S, O, P>(
    config: &RecordingConfig,
    path: &Path,
    source: &mut S,
    opener: &mut O,
    pacer: &mut P,
    stop: &AtomicBool,
) -> Result<ClipReport, RecordError>
where
    S: ScreenSource,
    O: SinkOpener,
    P: Pacer,
{
    ensure_parent_folder(path).map_err(|e| RecordError::SinkOpen {
        path: path.to_path_buf(),
        reason: format!("cannot create folder: {}", e),
    })?;

    let mut sink = opener.open(path, config.fps, config.resolution)?;

    let frames_planned = config.total_frames();
    log::info!(
        "Recording clip: {} ({} frames at {} FPS, {}, {} pacing)",
        path.display(),
        frames_planned,
        config.fps,
        config.resolution,
        config.pacing
    );

    let started = pacer.now();
    let mut frames_written = 0;
    let pumped = pump_frames(config, source, &mut sink, pacer, stop, started, &mut frames_written);
    let closed = sink.finish();
    let elapsed = pacer.now().saturating_duration_since(started);

    let interrupted = match (pumped, closed) {
        (Ok(interrupted), Ok(())) => interrupted,
        (Ok(_), Err(e)) => return Err(e),
        (Err(e), Ok(())) => return Err(e),
        (Err(e), Err(close_err)) => {
            log::warn!("Closing {} after a failure also failed: {}", path.display(), close_err);
            return Err(e);
        }
    };

    if interrupted {
        log::info!(
            "Recording interrupted: {} ({} of {} frames, {:.2}s)",
            path.display(),
            frames_written,
            frames_planned,
            elapsed.as_secs_f64()
        );
    } else {
        log::info!(
            "Finished recording: {} (Actual duration: {:.2}s)",
            path.display(),
            elapsed.as_secs_f64()
        );
    }

    Ok(ClipReport {
        path: path.to_path_buf(),
        frames_planned,
        frames_written,
        elapsed,
        interrupted,
    })
}

/// Runs the capture/transform/write/pace cycle. Returns `true` if it stopped
/// because of `stop`.
fn pump_frames<S, K, P>(
    config: &RecordingConfig,
    source: &mut S,
    sink: &mut K,
    pacer: &mut P,
    stop: &AtomicBool,
    started: Instant,
    frames_written: &mut u64,
) -> Result<bool, RecordError>
where
    S: ScreenSource,
    K: EncoderSink,
    P: Pacer,
{
    let total_frames = config.total_frames();
    let interval = config.frame_interval();

    for index in 0..total_frames {
        if stop.load(Ordering::Acquire) {
            return Ok(true);
        }
        let frame_start = pacer.now();

        let captured = source.capture()?;
        let frame = transform(&captured, config.resolution)?;
        sink.write_frame(&frame)?;
        *frames_written += 1;

        let now = pacer.now();
        let pause = match config.pacing {
            PacingMode::PerFrame => interval.saturating_sub(now.saturating_duration_since(frame_start)),
            PacingMode::Deadline => {
                let due = started + Duration::from_secs_f64((index + 1) as f64 / config.fps as f64);
                due.saturating_duration_since(now)
            }
        };

        if pause.is_zero() {
            log::debug!("Frame {} overran its {:?} interval", index, interval);
        } else if !stop.load(Ordering::Acquire) {
            pacer.sleep(pause);
        }
    }

    Ok(stop.load(Ordering::Acquire) && *frames_written < total_frames)
}
