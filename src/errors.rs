// src/errors.rs

//! Crate-wide error type and result alias.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    /// The glob (or one of the ignore globs) cannot be compiled.
    #[error("invalid pattern '{pattern}': {source}")]
    Match {
        pattern: String,
        source: globset::Error,
    },

    #[error("no files matched pattern '{0}'")]
    NoMatch(String),

    /// Read/write/mkdir/unlink failure for one file.
    #[error("I/O error on {path:?}: {source}")]
    FileIo { path: PathBuf, source: io::Error },

    #[error("transform failed for {path:?}: {source}")]
    Transform { path: PathBuf, source: io::Error },

    #[error("file watch error: {0}")]
    Subscription(#[from] notify::Error),

    #[error("copy of {0:?} was interrupted before it reported an outcome")]
    Interrupted(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MirrorError {
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MirrorError::FileIo {
            path: path.into(),
            source,
        }
    }

    /// True for errors that are scoped to a single file and never abort a batch.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            MirrorError::FileIo { .. } | MirrorError::Transform { .. } | MirrorError::Interrupted(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
