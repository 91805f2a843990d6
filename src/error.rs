use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while ripping a single image.
///
/// Everything before the output directory exists surfaces as-is. Once the
/// directory has been created, the first failure is wrapped in
/// [`RipError::JobAborted`] after the directory is torn down.
#[derive(Debug, Error)]
pub enum RipError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("metadata parse failed: {0}")]
    Parse(String),

    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image error: {0}")]
    Image(String),

    #[error("spawning tile worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("output directory already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("job for {image} aborted: {source}")]
    JobAborted {
        image: String,
        #[source]
        source: Box<RipError>,
    },
}

impl RipError {
    pub fn network(url: &str, message: impl std::fmt::Display) -> Self {
        Self::Network {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    pub fn filesystem(path: &Path, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }

    /// The underlying cause, looking through `JobAborted`.
    pub fn root_cause(&self) -> &RipError {
        match self {
            RipError::JobAborted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, RipError>;
