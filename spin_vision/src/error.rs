// THEORY:
// The `error` module holds the single error type for the library. Only
// pipeline-level failures live here: a source that cannot be decoded, a frame
// the caller explicitly asked for that does not exist, parameters that fail
// validation, and the I/O around configs and tables. A frame in which a marker
// is simply not visible is *not* an error; the sampler skips it. Too few
// usable samples is not an error of the run either; it is reported through
// `Report::InsufficientData`.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, VisionError>;

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("cannot open video source {path}: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("frame {index} is not available (source has {total} frames)")]
    FrameUnavailable { index: usize, total: usize },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("malformed table at line {line}: {reason}")]
    Csv { line: usize, reason: String },
}

/// Fewer than two usable samples (or table rows) reached a reducer.
///
/// Kept separate from `VisionError`: it is an expected outcome of a run whose
/// colour ranges, crop or frame window were too strict, and callers surface it
/// as a warning rather than a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("insufficient data: {usable} usable sample(s), at least 2 required")]
pub struct InsufficientData {
    pub usable: usize,
}
