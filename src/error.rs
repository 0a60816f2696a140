use std::io;
use thiserror::Error;

pub type BatchResult<T> = Result<T, Error>;

/// Enum for every failure a batch can run into
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Path string rejected by the path model
    #[error("{0}: path is invalid")]
    InvalidPath(String),
    /// Unknown command name or wrong argument count
    #[error("{0}: unsupported command")]
    UnsupportedCommand(String),
    /// Target missing where it is required to exist
    #[error("{0} does not exist")]
    NotFound(String),
    /// Target is a file where a directory is required
    #[error("{0}: path is not a directory")]
    NotADirectory(String),
    /// Any errors related to local I/O
    #[error("I/O: {0}")]
    IO(String),
    /// Failure reported by the remote directory service
    #[error("Remote: {0}")]
    Remote(String),
}

impl Error {
    /// Errors raised from the input alone, before any remote call is made.
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::InvalidPath(_) | Self::UnsupportedCommand(_))
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Self::IO(error.to_string())
    }
}
