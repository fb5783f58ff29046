//! Error types for Pennywise

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Storage read/write failure. The only error kind the store lets
    /// cross its boundary, since it means the user may lose data.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap any displayable storage failure as a persistence error
    pub(crate) fn persistence(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Persistence(format!("{}: {}", context, err))
    }

    /// Whether this error represents a storage failure
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::persistence("sqlite", err)
    }
}

impl From<r2d2::Error> for Error {
    fn from(err: r2d2::Error) -> Self {
        Error::persistence("connection pool", err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
