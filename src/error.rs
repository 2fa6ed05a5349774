//! Error types for qail-oracle.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::{AuthError, BackendError, DecodeError};
use crate::types::TypeError;

/// The main error type for Oracle driver operations.
///
/// `Clone` so a single fatal reason can resolve every pending task.
#[derive(Debug, Clone, Error)]
pub enum OraError {
    /// Transport could not be established or was lost.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Listener refused the connect request.
    #[error("Connection refused (ERR={code:?}): {message}")]
    Refused { code: Option<u32>, message: String },

    /// Listener redirected to another address.
    #[error("Connection redirected to {0}")]
    Redirected(String),

    /// Connection is closed or closing; the task never reached the server.
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed server packet. Fatal.
    #[error("Protocol error: {0}")]
    Protocol(#[from] DecodeError),

    /// Server sent a message the connection did not expect in its state.
    #[error("Unexpected {0} message")]
    UnexpectedMessage(&'static str),

    #[error("Server protocol version {0} is not supported")]
    UnsupportedServerVersion(u16),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Error reported by the server for this call. The connection stays usable.
    #[error("Server error: {0}")]
    Server(BackendError),

    /// Task was cancelled before it was sent.
    #[error("Task cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Type error: {0}")]
    Type(#[from] TypeError),
}

impl OraError {
    /// Server error number, if this came from the server.
    pub fn server_code(&self) -> Option<u32> {
        match self {
            OraError::Server(err) => Some(err.number),
            OraError::Refused { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<std::io::Error> for OraError {
    fn from(e: std::io::Error) -> Self {
        OraError::Io(Arc::new(e))
    }
}

/// Result type alias for Oracle driver operations.
pub type OraResult<T> = Result<T, OraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OraError::Server(BackendError {
            number: 942,
            message: Some("ORA-00942: table or view does not exist".into()),
            ..BackendError::default()
        });
        assert_eq!(
            err.to_string(),
            "Server error: ORA-00942: table or view does not exist"
        );
        assert_eq!(err.server_code(), Some(942));
    }

    #[test]
    fn test_io_error_is_shared() {
        let err: OraError = std::io::Error::other("reset").into();
        let copy = err.clone();
        assert_eq!(copy.to_string(), "I/O error: reset");
    }
}
