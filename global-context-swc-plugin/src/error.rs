use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid plugin options: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid plugin configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed manifest {path}: {message}")]
    ManifestParse { path: PathBuf, message: String },

    #[error("manifest {path} has no usable `{field}` field")]
    ManifestField { path: PathBuf, field: &'static str },

    #[error("invalid package version: {0:?}")]
    InvalidVersion(String),

    #[error("context {key} was created with a different value type")]
    ContextTypeMismatch { key: String },
}

pub type Result<T> = std::result::Result<T, Error>;
