use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{RecordingConfig, SequencerConfig};
use crate::error::SequenceError;
use crate::modules::components::record_screen::record_screen_fl::{
    record_clip, ClipReport, Pacer, ScrapSource, ScreenSource, SystemPacer,
};
use crate::modules::components::video_encoding::ffmpeg_sink_fl::{FfmpegOpener, SinkOpener};
use crate::modules::helpers::file_names_fl::timestamped_filename;

pub const EXIT_OK: u8 = 0;
pub const EXIT_SINK_OPEN: u8 = 1;

/// Records the primary display with `scrap` and encodes through ffmpeg.
pub fn process_screen_recording(
    config: &RecordingConfig,
    sequencer: &SequencerConfig,
    ffmpeg: PathBuf,
    stop: &AtomicBool,
) -> Result<Vec<ClipReport>, SequenceError> {
    config.validate()?;
    let mut source = ScrapSource::primary(config.frame_interval())?;
    let mut opener = FfmpegOpener::new(ffmpeg);
    record_clips(
        config,
        sequencer,
        &mut source,
        &mut opener,
        &mut SystemPacer,
        stop,
    )
}

/// With an explicit output path, records that single clip. Otherwise records up
/// to `max_clips` clips with timestamped names under the sequencer folder,
/// pausing between them. Stops early after an interrupted clip. On failure the
/// clips finished so far travel with the error.
pub fn record_clips<S, O, P>(
    config: &RecordingConfig,
    sequencer: &SequencerConfig,
    source: &mut S,
    opener: &mut O,
    pacer: &mut P,
    stop: &AtomicBool,
) -> Result<Vec<ClipReport>, SequenceError>
where
    S: ScreenSource,
    O: SinkOpener,
    P: Pacer,
{
    if let Some(output) = &config.output {
        let report = record_clip(config, output, source, opener, pacer, stop)?;
        return Ok(vec![report]);
    }

    let mut reports = Vec::new();
    for clip in 1..=sequencer.max_clips {
        let path = timestamped_filename(&sequencer.folder);
        log::info!("Clip {}/{}", clip, sequencer.max_clips);
        let report = match record_clip(config, &path, source, opener, pacer, stop) {
            Ok(report) => report,
            Err(err) => {
                return Err(SequenceError {
                    completed: reports,
                    source: err,
                })
            }
        };
        let interrupted = report.interrupted;
        reports.push(report);

        if interrupted || stop.load(Ordering::Acquire) {
            log::info!("Recording interrupted by user.");
            break;
        }
        if clip < sequencer.max_clips {
            pacer.sleep(sequencer.pause);
        }
    }
    Ok(reports)
}

/// Logs how the run ended and picks the process exit status. Only a sink that
/// could not be opened is a failure; interruptions and runtime errors exit 0.
pub fn conclude(result: &Result<Vec<ClipReport>, SequenceError>) -> u8 {
    match result {
        Ok(reports) => {
            log_summary(reports);
            EXIT_OK
        }
        Err(e) => {
            log_summary(&e.completed);
            log::error!("Error: {}", e);
            if e.source.is_fatal() {
                EXIT_SINK_OPEN
            } else {
                EXIT_OK
            }
        }
    }
}

fn log_summary(reports: &[ClipReport]) {
    let frames: u64 = reports.iter().map(|r| r.frames_written).sum();
    log::info!("Recorded {} clip(s), {} frames", reports.len(), frames);
    for report in reports {
        log::info!(
            "  {} ({} frames, {:.2}s)",
            report.path.display(),
            report.frames_written,
            report.elapsed.as_secs_f64()
        );
    }
}
