//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`Connection`] configuration is present but the service is unreachable
//!   or rejected the credentials.
//! - [`NotConnected`] a service call was attempted before the session was
//!   initialised.
//! - [`NotFound`] an expense or document is absent upstream.
//! - [`Download`] a document stream was unavailable or could not be written to
//!   the cache.
//! - [`Validation`] required form fields are missing. Raised before any I/O.
//!
//!  [`Connection`]: EngineError::Connection
//!  [`NotConnected`]: EngineError::NotConnected
//!  [`NotFound`]: EngineError::NotFound
//!  [`Download`]: EngineError::Download
//!  [`Validation`]: EngineError::Validation
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Service not connected")]
    NotConnected,
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Download failed: {0}")]
    Download(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Service error: {0}")]
    Service(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Wraps any non-connection error into [`EngineError::Connection`].
    pub(crate) fn into_connection(self) -> Self {
        match self {
            Self::Connection(_) => self,
            other => Self::Connection(other.to_string()),
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Connection(a), Self::Connection(b)) => a == b,
            (Self::NotConnected, Self::NotConnected) => true,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Download(a), Self::Download(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Service(a), Self::Service(b)) => a == b,
            (Self::Io(a), Self::Io(b)) => a.to_string() == b.to_string(),
            (Self::Json(a), Self::Json(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
