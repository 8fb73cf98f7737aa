//! Session identity type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-issued session identity.
///
/// A random UUID in hyphenated form, the format the auction server stores
/// and the auction floor expects in its `userId` parameter. Never mutated
/// once issued.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Generate a fresh random identity.
    ///
    /// UUID v4: 122 random bits, kept for compatibility with the identities
    /// the server already stores.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a previously issued identity, e.g. one read back from storage.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The identity as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
