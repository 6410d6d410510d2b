use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the sampling and redaction core.
///
/// `Input` is always reported back to the caller. `Decode` is raised for a
/// single frame or image and jobs record it as a skip instead of failing.
#[derive(Debug, Error)]
pub enum Error {
    #[error("input error: {0}")]
    Input(String),
    #[error("could not decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("detector error: {0}")]
    Detector(String),
    #[error("job cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn input(msg: impl Into<String>) -> Self {
        Error::Input(msg.into())
    }

    pub fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
