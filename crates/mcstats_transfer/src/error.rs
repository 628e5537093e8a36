//! Error types for the transfer layer.

use crate::retry::Retryable;
use thiserror::Error;

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors that can occur while talking to the remote file endpoint.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Transport or negotiation failure (TCP connect, SSH handshake,
    /// opening the SFTP subsystem).
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server rejected the configured credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The presented host key does not match the configured fingerprint.
    #[error("host key fingerprint mismatch: expected {expected}, got {actual}")]
    HostKeyMismatch {
        /// Configured fingerprint (normalized hex).
        expected: String,
        /// Fingerprint presented by the server (normalized hex).
        actual: String,
    },

    /// Remote file missing, unreadable, or failed the size integrity check.
    #[error("file error: {0}")]
    File(String),

    /// Generic transfer-protocol failure.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The operation exceeded its timeout.
    #[error("operation timed out")]
    Timeout,

    /// Local filesystem error while staging the download.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Retryable for TransferError {
    /// Authentication and host-key failures cannot succeed on retry;
    /// everything else is considered transient.
    fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TransferError::Authentication(_) | TransferError::HostKeyMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(TransferError::Connection("refused".into()).is_retryable());
        assert!(TransferError::Transfer("broken pipe".into()).is_retryable());
        assert!(TransferError::Timeout.is_retryable());
        assert!(TransferError::File("size mismatch".into()).is_retryable());

        assert!(!TransferError::Authentication("bad password".into()).is_retryable());
        assert!(!TransferError::HostKeyMismatch {
            expected: "aa".into(),
            actual: "bb".into(),
        }
        .is_retryable());
    }

    #[test]
    fn error_display() {
        let err = TransferError::HostKeyMismatch {
            expected: "aabb".into(),
            actual: "ccdd".into(),
        };
        let text = err.to_string();
        assert!(text.contains("aabb"));
        assert!(text.contains("ccdd"));

        assert_eq!(TransferError::Timeout.to_string(), "operation timed out");
    }

    #[test]
    fn io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TransferError::from(io);
        assert!(matches!(err, TransferError::Io(_)));
        assert!(err.is_retryable());
    }
}
