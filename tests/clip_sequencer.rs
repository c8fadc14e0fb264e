use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use screen_recorder::config::{PacingMode, RecordingConfig, Resolution, SequencerConfig};
use screen_recorder::error::RecordError;
use screen_recorder::modules::components::frame_transform::frame_transform_fl::{
    CapturedFrame, Frame,
};
use screen_recorder::modules::components::record_screen::record_screen_fl::{Pacer, ScreenSource};
use screen_recorder::modules::components::video_encoding::ffmpeg_sink_fl::{
    EncoderSink, SinkOpener,
};
use screen_recorder::run::record_clips;

struct InstantPacer {
    base: Instant,
    offset: Cell<Duration>,
    sleeps: Vec<Duration>,
}

impl InstantPacer {
    fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Cell::new(Duration::ZERO),
            sleeps: Vec::new(),
        }
    }
}

impl Pacer for InstantPacer {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        self.offset.set(self.offset.get() + duration);
    }
}

/// Returns a tiny grey frame; raises `stop` once `stop_at` frames were taken.
struct GreySource {
    taken: usize,
    stop_at: Option<(usize, Rc<AtomicBool>)>,
    fail_at: Option<usize>,
}

impl ScreenSource for GreySource {
    fn capture(&mut self) -> Result<CapturedFrame, RecordError> {
        self.taken += 1;
        if self.fail_at == Some(self.taken) {
            return Err(RecordError::Capture("display went away".into()));
        }
        if let Some((n, stop)) = &self.stop_at {
            if self.taken == *n {
                stop.store(true, Ordering::Release);
            }
        }
        Ok(CapturedFrame::packed(2, 2, vec![90; 16]))
    }
}

#[derive(Default)]
struct Ledger {
    opened: Vec<PathBuf>,
    frames: usize,
    closed: usize,
}

struct CountingSink(Rc<RefCell<Ledger>>);

impl EncoderSink for CountingSink {
    fn write_frame(&mut self, _frame: &Frame) -> Result<(), RecordError> {
        self.0.borrow_mut().frames += 1;
        Ok(())
    }

    fn finish(self) -> Result<(), RecordError> {
        self.0.borrow_mut().closed += 1;
        Ok(())
    }
}

#[derive(Default)]
struct CountingOpener(Rc<RefCell<Ledger>>);

impl SinkOpener for CountingOpener {
    type Sink = CountingSink;

    fn open(&mut self, path: &Path, _fps: u32, _res: Resolution) -> Result<CountingSink, RecordError> {
        self.0.borrow_mut().opened.push(path.to_path_buf());
        Ok(CountingSink(self.0.clone()))
    }
}

fn recording(output: Option<PathBuf>) -> RecordingConfig {
    RecordingConfig {
        output,
        duration_secs: 1.0,
        fps: 2,
        resolution: Resolution {
            width: 2,
            height: 2,
        },
        pacing: PacingMode::PerFrame,
    }
}

fn sequencer(tag: &str, max_clips: u32) -> SequencerConfig {
    SequencerConfig {
        folder: std::env::temp_dir().join(format!("screen_recorder_seq_{}_{}", tag, std::process::id())),
        max_clips,
        pause: Duration::from_secs(1),
    }
}

#[test]
fn explicit_output_records_exactly_one_clip_without_pause() {
    let seq = sequencer("explicit", 5);
    let output = seq.folder.join("fixed.mp4");
    let mut source = GreySource {
        taken: 0,
        stop_at: None,
        fail_at: None,
    };
    let mut opener = CountingOpener::default();
    let mut pacer = InstantPacer::new();

    let reports = record_clips(
        &recording(Some(output.clone())),
        &seq,
        &mut source,
        &mut opener,
        &mut pacer,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].path, output);
    let ledger = opener.0.borrow();
    assert_eq!(ledger.opened, vec![output]);
    assert_eq!((ledger.frames, ledger.closed), (2, 1));
    // Only the two in-clip pacing sleeps, no between-clip pause.
    assert!(pacer.sleeps.iter().all(|d| *d < Duration::from_secs(1)));
    let _ = std::fs::remove_dir_all(&seq.folder);
}

#[test]
fn generated_names_record_up_to_max_clips() {
    let seq = sequencer("loop", 3);
    let mut source = GreySource {
        taken: 0,
        stop_at: None,
        fail_at: None,
    };
    let mut opener = CountingOpener::default();
    let mut pacer = InstantPacer::new();

    let reports = record_clips(
        &recording(None),
        &seq,
        &mut source,
        &mut opener,
        &mut pacer,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(reports.len(), 3);
    let ledger = opener.0.borrow();
    assert_eq!(ledger.opened.len(), 3);
    assert_eq!((ledger.frames, ledger.closed), (6, 3));
    for path in &ledger.opened {
        assert_eq!(path.parent(), Some(seq.folder.as_path()));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("recording_") && name.ends_with(".mp4"), "{name}");
    }
    assert!(seq.folder.is_dir());

    // Pauses sit between clips only.
    let pauses = pacer
        .sleeps
        .iter()
        .filter(|d| **d == Duration::from_secs(1))
        .count();
    assert_eq!(pauses, 2);
    let _ = std::fs::remove_dir_all(&seq.folder);
}

#[test]
fn interruption_ends_the_sequence_after_closing_the_clip() {
    let seq = sequencer("interrupt", 4);
    let stop = Rc::new(AtomicBool::new(false));
    let mut source = GreySource {
        taken: 0,
        stop_at: Some((3, stop.clone())),
        fail_at: None,
    };
    let mut opener = CountingOpener::default();
    let mut pacer = InstantPacer::new();

    let reports = record_clips(
        &recording(None),
        &seq,
        &mut source,
        &mut opener,
        &mut pacer,
        &stop,
    )
    .unwrap();

    // Clip 1 completes, clip 2 is cut after its first frame.
    assert_eq!(reports.len(), 2);
    assert!(!reports[0].interrupted);
    assert!(reports[1].interrupted);
    let ledger = opener.0.borrow();
    assert_eq!(ledger.opened.len(), 2);
    assert_eq!(ledger.closed, 2);
    assert_eq!(ledger.frames, 3);
    let _ = std::fs::remove_dir_all(&seq.folder);
}

#[test]
fn failure_mid_sequence_keeps_the_finished_clips() {
    let seq = sequencer("failure", 4);
    let mut source = GreySource {
        taken: 0,
        stop_at: None,
        fail_at: Some(4),
    };
    let mut opener = CountingOpener::default();
    let mut pacer = InstantPacer::new();

    let err = record_clips(
        &recording(None),
        &seq,
        &mut source,
        &mut opener,
        &mut pacer,
        &AtomicBool::new(false),
    )
    .unwrap_err();

    // Clip 1 is complete; clip 2 fails on its second frame.
    assert!(matches!(err.source, RecordError::Capture(_)));
    assert!(!err.source.is_fatal());
    assert_eq!(err.completed.len(), 1);
    assert_eq!(err.completed[0].frames_written, 2);
    let ledger = opener.0.borrow();
    assert_eq!(ledger.opened.len(), 2);
    assert_eq!(ledger.closed, 2);
    assert_eq!(ledger.frames, 3);
    let _ = std::fs::remove_dir_all(&seq.folder);
}
