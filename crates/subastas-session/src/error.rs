//! Errors raised between the coordinator and its transports.

use std::time::Duration;

use thiserror::Error;

use subastas_core::RegistrationError;

/// Why an armed reply did not resolve with a message.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// Cancelled by the owner, or superseded by a newer arm.
    #[error("reply wait cancelled")]
    Cancelled,
    /// The persistent connection dropped before a reply arrived.
    #[error("connection lost before reply")]
    ConnectionLost,
    /// The configured reply timeout elapsed.
    #[error("no reply within {0:?}")]
    TimedOut(Duration),
}

impl CorrelationError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::ConnectionLost => "connection_lost",
            Self::TimedOut(_) => "timed_out",
        }
    }
}

/// Result of a dispatch that did not produce a server verdict.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The dispatch was cancelled; its outcome, if any, is discarded.
    #[error("dispatch cancelled")]
    Cancelled,
    /// The attempt failed; carries what the user is shown.
    #[error(transparent)]
    Failed(#[from] RegistrationError),
}

impl From<CorrelationError> for DispatchError {
    fn from(err: CorrelationError) -> Self {
        match err {
            CorrelationError::Cancelled => Self::Cancelled,
            // An expired reply wait is reported like a dropped connection.
            CorrelationError::ConnectionLost | CorrelationError::TimedOut(_) => {
                Self::Failed(RegistrationError::ConnectionLost)
            }
        }
    }
}
