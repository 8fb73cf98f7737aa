//! JSON messages exchanged with the auction server.
//!
//! Field names are the server's (Spanish, camelCase) and must not change.

use serde::{Deserialize, Serialize};

use crate::ids::Identity;
use crate::registration::{BidderDetails, ManagerCredentials, Role};

/// Payload sent on the `register_user` channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUserMessage {
    /// Identity issued for this attempt.
    #[serde(rename = "userId")]
    pub user_id: Identity,
    /// First name.
    pub nombre: String,
    /// Surname.
    pub apellido: String,
    /// Always [`Role::Bidder`] on this channel.
    pub role: Role,
}

impl RegisterUserMessage {
    /// Bidder registration for `user_id`.
    pub fn new(user_id: Identity, details: &BidderDetails) -> Self {
        Self {
            user_id,
            nombre: details.name.clone(),
            apellido: details.surname.clone(),
            role: Role::Bidder,
        }
    }
}

/// Body of the admin login request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminLoginRequest {
    /// Identity issued for this attempt.
    #[serde(rename = "userId")]
    pub user_id: Identity,
    #[allow(missing_docs)]
    pub username: String,
    #[allow(missing_docs)]
    pub password: String,
}

impl AdminLoginRequest {
    /// Login request for `user_id`.
    pub fn new(user_id: Identity, credentials: &ManagerCredentials) -> Self {
        Self {
            user_id,
            username: credentials.username.clone(),
            password: credentials.password.clone(),
        }
    }
}

impl std::fmt::Debug for AdminLoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminLoginRequest")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
