use std::io;
use std::path::PathBuf;

use crate::modules::components::record_screen::record_screen_fl::ClipReport;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Config Error: {0}")]
    Config(String),

    #[error("Could not open video writer for {}: {reason}", path.display())]
    SinkOpen { path: PathBuf, reason: String },

    #[error("Capture Error: {0}")]
    Capture(String),

    #[error("Encode Error: {0}")]
    Encode(String),

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
}

impl RecordError {
    /// Sink-open failures end the process with a non-zero status; everything
    /// else is logged and the process exits normally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecordError::SinkOpen { .. })
    }
}

/// A failed recording run, along with the clips that were finished before the
/// failure.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct SequenceError {
    pub completed: Vec<ClipReport>,
    pub source: RecordError,
}

impl From<RecordError> for SequenceError {
    fn from(source: RecordError) -> Self {
        Self {
            completed: Vec::new(),
            source,
        }
    }
}
