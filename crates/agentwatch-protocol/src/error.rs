//! Errors reported by collaborator ports.

use thiserror::Error;

/// Failure returned by a session store, event log, or reporting service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("io error: {0}")]
    Io(String),
}

impl PortError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for PortError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for PortError {
    fn from(error: serde_json::Error) -> Self {
        Self::Malformed(error.to_string())
    }
}

/// Convenience result type for port operations.
pub type PortResult<T> = Result<T, PortError>;
