use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Resolution;
use crate::error::RecordError;
use crate::modules::components::frame_transform::frame_transform_fl::Frame;

/// An open video file accepting frames in playback order.
pub trait EncoderSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordError>;

    /// Flushes buffered frames and closes the file. Consumes the sink, so it can
    /// only ever happen once.
    fn finish(self) -> Result<(), RecordError>;
}

/// Opens one encoder sink per clip.
pub trait SinkOpener {
    type Sink: EncoderSink;

    fn open(
        &mut self,
        path: &Path,
        fps: u32,
        resolution: Resolution,
    ) -> Result<Self::Sink, RecordError>;
}

/// How long ffmpeg must stay up after spawning before the output counts as open.
pub const STARTUP_GRACE: Duration = Duration::from_millis(250);
const STARTUP_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    ffmpeg: PathBuf,
    startup_grace: Duration,
}

impl FfmpegOpener {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self {
            ffmpeg,
            startup_grace: STARTUP_GRACE,
        }
    }

    pub fn with_startup_grace(mut self, startup_grace: Duration) -> Self {
        self.startup_grace = startup_grace;
        self
    }
}

/// Arguments for raw RGB24 frames on stdin, H.264/MP4 out. The output path is
/// appended by the caller.
pub fn encoder_args(fps: u32, resolution: Resolution) -> Vec<String> {
    [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-f",
        "rawvideo",
        "-pixel_format",
        "rgb24",
        "-video_size",
        &resolution.to_string(),
        "-framerate",
        &fps.to_string(),
        "-i",
        "-",
        "-an",
        "-c:v",
        "libx264",
        "-preset",
        "ultrafast",
        "-pix_fmt",
        "yuv420p",
        "-movflags",
        "+faststart",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// The target file as found before ffmpeg touched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Created empty by us; removed again if the sink never opens.
    Placeholder,
    /// Belonged to the user already; left alone on failure.
    Existing,
}

/// Checks the target is writable without truncating an existing file.
fn claim_target(path: &Path) -> io::Result<Target> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(Target::Placeholder),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            OpenOptions::new().write(true).open(path)?;
            Ok(Target::Existing)
        }
        Err(e) => Err(e),
    }
}

/// Removes a placeholder we created, as long as nothing was written into it.
fn discard_placeholder(path: &Path, target: Target) {
    if target != Target::Placeholder {
        return;
    }
    let empty = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(false);
    if empty {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Failed to delete placeholder {}: {}", path.display(), e);
        }
    }
}

impl SinkOpener for FfmpegOpener {
    type Sink = FfmpegSink;

    fn open(
        &mut self,
        path: &Path,
        fps: u32,
        resolution: Resolution,
    ) -> Result<FfmpegSink, RecordError> {
        let sink_open = |reason: String| RecordError::SinkOpen {
            path: path.to_path_buf(),
            reason,
        };

        let target = claim_target(path).map_err(|e| sink_open(e.to_string()))?;

        let mut command = Command::new(&self.ffmpeg);
        command
            .args(encoder_args(fps, resolution))
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        isolate_from_console_signals(&mut command);

        log::debug!("FFmpeg path: {}", self.ffmpeg.display());
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                discard_placeholder(path, target);
                return Err(sink_open(format!(
                    "failed to start {}: {}",
                    self.ffmpeg.display(),
                    e
                )));
            }
        };

        // ffmpeg rejects an unusable output (unknown container, missing codec)
        // right after parsing its arguments, before reading any input.
        let spawned = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    discard_placeholder(path, target);
                    return Err(sink_open(format!("ffmpeg exited on startup with {}", status)));
                }
                Ok(None) if spawned.elapsed() >= self.startup_grace => break,
                Ok(None) => thread::sleep(STARTUP_POLL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    discard_placeholder(path, target);
                    return Err(sink_open(format!("cannot poll ffmpeg: {}", e)));
                }
            }
        }

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            discard_placeholder(path, target);
            return Err(sink_open("ffmpeg stdin was not captured".into()));
        };

        Ok(FfmpegSink {
            path: path.to_path_buf(),
            target,
            resolution,
            frames_accepted: 0,
            stdin: Some(stdin),
            child: Some(child),
        })
    }
}

/// A running ffmpeg process fed raw frames over its stdin.
pub struct FfmpegSink {
    path: PathBuf,
    target: Target,
    resolution: Resolution,
    frames_accepted: u64,
    stdin: Option<ChildStdin>,
    child: Option<Child>,
}

impl FfmpegSink {
    /// A failure before ffmpeg took a single frame means the output never opened.
    fn failure(&self, reason: String) -> RecordError {
        if self.frames_accepted == 0 {
            discard_placeholder(&self.path, self.target);
            RecordError::SinkOpen {
                path: self.path.clone(),
                reason,
            }
        } else {
            RecordError::Encode(reason)
        }
    }
}

impl EncoderSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordError> {
        if frame.resolution != self.resolution || frame.data.len() != self.resolution.rgb_frame_len()
        {
            return Err(RecordError::Encode(format!(
                "frame is {} ({} bytes), encoder expects {}",
                frame.resolution,
                frame.data.len(),
                self.resolution
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RecordError::Encode("encoder input already closed".into()))?;
        match stdin.write_all(&frame.data) {
            Ok(()) => {
                self.frames_accepted += 1;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                // Reap ffmpeg first so its output is gone before the placeholder check.
                drop(self.stdin.take());
                if let Some(mut child) = self.child.take() {
                    let _ = child.wait();
                }
                Err(self.failure(format!(
                    "ffmpeg stopped accepting frames for {}",
                    self.path.display()
                )))
            }
            Err(e) => Err(RecordError::Io(e)),
        }
    }

    fn finish(mut self) -> Result<(), RecordError> {
        // Closing stdin is ffmpeg's end-of-stream; it then writes the trailer.
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(self.failure(format!(
                "ffmpeg exited with status {} while finalizing {}",
                status,
                self.path.display()
            )))
        }
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}

/// Keeps a terminal Ctrl-C away from ffmpeg so the recorder decides when the
/// container gets finalized.
#[cfg(unix)]
fn isolate_from_console_signals(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn isolate_from_console_signals(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn isolate_from_console_signals(_command: &mut Command) {}

/// Picks the ffmpeg binary: an explicit path wins, then a bundled
/// `ffmpeg/ffmpeg[.exe]` beside the executable, then whatever is on `PATH`.
pub fn resolve_ffmpeg(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    bundled_ffmpeg_path()
        .filter(|path| path.is_file())
        .unwrap_or_else(|| PathBuf::from("ffmpeg"))
}

fn bundled_ffmpeg_path() -> Option<PathBuf> {
    let exe_dir = std::env::current_exe().ok()?.parent()?.to_path_buf();
    let name = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
    Some(exe_dir.join("ffmpeg").join(name))
}
