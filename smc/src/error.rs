/*!
Error types for SMC protocol operations.
*/

use std::time::Duration;
use thiserror::Error;

use crate::key::{SensorKey, TypeTag};

/// Common result type used throughout the SMC library
pub type Result<T> = std::result::Result<T, SmcError>;

/// Every failure mode of the session, reader and decoder layers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmcError {
    /// Service discovery yielded no matching instance
    #[error("SMC service '{0}' not found")]
    ServiceNotFound(String),

    /// The connection handshake with the service failed
    #[error("Failed to connect to SMC service: status {0:#010x}")]
    ConnectFailed(i32),

    /// A request/response call returned a non-success platform status
    #[error("SMC call failed: status {0:#010x}")]
    CallFailed(i32),

    /// Sensor keys are exactly four bytes
    #[error("Invalid key length: expected 4 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Sensor keys are plain ASCII
    #[error("Invalid key character: {0:?}")]
    InvalidKeyCharacter(char),

    /// The value's data type cannot be decoded by the requested path
    #[error("Unsupported data type '{0}'")]
    UnsupportedType(TypeTag),

    /// The controller returned a zero-size value
    #[error("Key returned no data")]
    NoData,

    /// The payload is shorter than its data type requires
    #[error("Truncated payload for '{tag}': need {expected} bytes, got {actual}")]
    TruncatedPayload {
        tag: TypeTag,
        expected: usize,
        actual: usize,
    },

    /// The controller declared a size larger than the payload buffer
    #[error("Invalid data size {0}: payload buffer holds 32 bytes")]
    InvalidDataSize(u32),

    /// The controller does not know the requested key
    #[error("Key '{0}' not found")]
    KeyNotFound(SensorKey),

    /// The controller answered with a non-zero result byte
    #[error("Controller returned status {0:#04x}")]
    ControllerStatus(u8),

    /// The session was closed, never opened, or poisoned by a timeout
    #[error("Session is closed")]
    SessionClosed,

    /// A call did not complete within the configured bound
    #[error("SMC call timed out after {0:?}")]
    Timeout(Duration),

    /// The session worker thread could not be started or has died
    #[error("Session worker error: {0}")]
    Worker(String),
}

impl SmcError {
    /// Create a new service-not-found error
    pub fn service_not_found(name: impl Into<String>) -> Self {
        Self::ServiceNotFound(name.into())
    }

    /// Create a new worker error
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Create a truncated payload error
    pub fn truncated(tag: TypeTag, expected: usize, actual: usize) -> Self {
        Self::TruncatedPayload { tag, expected, actual }
    }

    /// True for failures that leave the session unusable
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SessionClosed | Self::Timeout(_) | Self::Worker(_)
        )
    }
}
