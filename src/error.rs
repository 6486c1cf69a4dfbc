//! Error types for repatch

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// repatch errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Rule parse error: {0}")]
    RuleParse(String),

    #[error("Unknown condition key: {0}")]
    UnknownCondition(String),

    #[error("Unknown operation key: {0}")]
    UnknownOperation(String),

    #[error("Version parse error: {0}")]
    VersionParse(String),

    #[error("Pattern error: {0}")]
    Pattern(String),

    #[error("Index corruption: {0}")]
    IndexCorrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_norway::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
