//! Registration error taxonomy.

use thiserror::Error;

use crate::constants::{
    MSG_CONNECTION_LOST, MSG_CONNECTION_UNAVAILABLE, MSG_NETWORK_ERROR, MSG_NO_ROLE,
    MSG_SERVER_REJECTED_DEFAULT,
};
use crate::registration::FormField;

/// Registration failures, all surfaced to the user as a message.
///
/// Local kinds (`NoRoleSelected`, `MissingField`, `ConnectionUnavailable`)
/// are raised before any identity is issued or transport touched. None of
/// them is retried automatically.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistrationError {
    // Local validation
    /// Submitted before choosing a role.
    #[error("no role selected")]
    NoRoleSelected,
    /// A field the role requires is blank.
    #[error("missing required field: {}", .0.key())]
    MissingField(FormField),
    /// Bidder path chosen while the persistent connection is down.
    #[error("persistent connection unavailable")]
    ConnectionUnavailable,

    // Remote
    /// The server answered `success: false`.
    #[error("server rejected registration: {}", .0.as_deref().unwrap_or("<no message>"))]
    ServerRejected(Option<String>),
    /// The connection dropped, or no reply came in time.
    #[error("connection lost while awaiting reply")]
    ConnectionLost,
    /// The admin endpoint could not be reached or gave no usable answer.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl RegistrationError {
    /// Message shown on the form.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoRoleSelected => MSG_NO_ROLE.to_owned(),
            Self::MissingField(field) => {
                format!("Por favor complete el campo {}.", field.label())
            }
            Self::ConnectionUnavailable => MSG_CONNECTION_UNAVAILABLE.to_owned(),
            Self::ServerRejected(Some(message)) if !message.is_empty() => message.clone(),
            Self::ServerRejected(_) => MSG_SERVER_REJECTED_DEFAULT.to_owned(),
            Self::ConnectionLost => MSG_CONNECTION_LOST.to_owned(),
            Self::NetworkError(_) => MSG_NETWORK_ERROR.to_owned(),
        }
    }

    /// Raised before dispatch, without side effects.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::NoRoleSelected | Self::MissingField(_) | Self::ConnectionUnavailable
        )
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NoRoleSelected => "no_role_selected",
            Self::MissingField(_) => "missing_field",
            Self::ConnectionUnavailable => "connection_unavailable",
            Self::ServerRejected(_) => "server_rejected",
            Self::ConnectionLost => "connection_lost",
            Self::NetworkError(_) => "network_error",
        }
    }
}
