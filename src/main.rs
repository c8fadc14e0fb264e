use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use screen_recorder::cli::Args;
use screen_recorder::run::{conclude, process_screen_recording};

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.recording_config();
    let sequencer = args.sequencer_config();

    let stop = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let stop = stop.clone();
        move || {
            log::info!("Interrupt received, finishing the current clip...");
            stop.store(true, Ordering::Release);
        }
    })
    .context("failed to install Ctrl-C handler")?;

    let result = process_screen_recording(&config, &sequencer, args.ffmpeg_path(), &stop);
    Ok(ExitCode::from(conclude(&result)))
}
