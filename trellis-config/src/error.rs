// Error types for options handling

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("options must be an object, got {0}")]
    InvalidOptions(String),

    #[error("path does not match any option: {0}")]
    UnknownPath(String),

    #[error("option file has no extension: {0}")]
    MissingExtension(String),

    #[error("unknown option file extension: {0}")]
    UnknownExtension(String),
}

impl From<ConfigError> for trellis_core::Error {
    fn from(err: ConfigError) -> Self {
        trellis_core::Error::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
