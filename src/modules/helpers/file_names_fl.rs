use chrono::{DateTime, Local, TimeZone};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const RECORDING_PREFIX: &str = "recording_";
pub const RECORDING_EXTENSION: &str = "mp4";

/// `<folder>/recording_<YYYYMMDD>_<HHMMSS>.mp4` for the current local time.
pub fn timestamped_filename(folder: &Path) -> PathBuf {
    timestamped_filename_at(folder, &Local::now())
}

pub fn timestamped_filename_at<Tz: TimeZone>(folder: &Path, at: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    let ts = at.format("%Y%m%d_%H%M%S").to_string();
    folder.join(format!("{}{}.{}", RECORDING_PREFIX, ts, RECORDING_EXTENSION))
}

/// Creates every missing ancestor directory of `path`.
pub fn ensure_parent_folder(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(folder) if !folder.as_os_str().is_empty() && !folder.exists() => {
            fs::create_dir_all(folder)?;
            log::debug!("Created folder {}", folder.display());
            Ok(())
        }
        _ => Ok(()),
    }
}
