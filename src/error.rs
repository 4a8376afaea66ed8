use std::path::PathBuf;
use thiserror::Error;

/// Fatal tuner errors. Anything that ends up here moves the campaign into
/// the failed state; flaky rounds and odd PGN records are reported through
/// `RoundStatus` and log warnings instead.
#[derive(Debug, Error)]
pub enum TunerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid range for parameter '{name}': {reason}")]
    InvalidRange { name: String, reason: String },

    #[error("failed to parse config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn match runner '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sampling distribution error: {0}")]
    Distribution(String),
}

impl TunerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TunerError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, TunerError>;
