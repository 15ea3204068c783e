//! Error taxonomy for the fusion kernel.
//!
//! Every failure here is fatal for the run. Degenerate numeric input
//! (empty clouds, all-NaN ranges, no detections) is never an error; it is
//! expressed as data, see [`crate::Distance::Undefined`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatrolError {
    /// Malformed or missing configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The image, point-set and timestamp streams do not have equal length.
    #[error(
        "misaligned input: {images} images, {point_sets} point sets, {timestamps} timestamps"
    )]
    MisalignedInput {
        images: usize,
        point_sets: usize,
        timestamps: usize,
    },

    /// A configured directory or file does not exist.
    #[error("missing resource: {}", .0.display())]
    MissingResource(PathBuf),

    /// No point-set decoder is registered for the file extension.
    #[error("unsupported point set format '{extension}' for {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Caller asked for a frame outside `[0, len)`.
    #[error("frame index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// The file exists and has a known extension but its content is unreadable.
    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PatrolError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PatrolError>;
