//! Registration domain types.
//!
//! The form has two mutually exclusive shapes selected by [`Role`]. Raw input
//! is collected in a [`FormInput`] and only becomes a [`RegistrationPayload`]
//! once every field required by the role is present.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::RegistrationError;

/// Participant role chosen on the registration form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Joins the auction floor over the persistent connection.
    #[serde(rename = "postor")]
    Bidder,
    /// Operator authenticating against the admin endpoint.
    #[serde(rename = "manejador")]
    Manager,
}

impl Role {
    /// Wire and form value of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bidder => "postor",
            Self::Manager => "manejador",
        }
    }

    /// Fields the form shows, and requires, for this role.
    pub fn required_fields(self) -> &'static [FormField] {
        match self {
            Self::Bidder => &[FormField::Name, FormField::Surname],
            Self::Manager => &[FormField::Username, FormField::Password],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single input on the registration form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormField {
    /// Bidder first name.
    Name,
    /// Bidder surname.
    Surname,
    /// Manager login.
    Username,
    /// Manager password. Never logged.
    Password,
}

impl FormField {
    /// Input name used by the form.
    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "nombre",
            Self::Surname => "apellido",
            Self::Username => "usuario",
            Self::Password => "contrasena",
        }
    }

    /// Label shown next to the input.
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Nombre",
            Self::Surname => "Apellido",
            Self::Username => "Usuario",
            Self::Password => "Contraseña",
        }
    }
}

/// Raw form input as typed by the user.
///
/// Values for fields the current role does not use are kept but ignored, so
/// switching roles back and forth does not lose what was typed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    values: HashMap<FormField, String>,
}

impl FormInput {
    /// An empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        let _ = self.values.insert(field, value.into());
    }

    /// Builder-style variant of [`FormInput::set`].
    #[must_use]
    pub fn with(mut self, field: FormField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Current value of `field`, as typed.
    pub fn get(&self, field: FormField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Value of a required field, or `MissingField` when absent or blank.
    fn require(&self, field: FormField) -> Result<String, RegistrationError> {
        match self.get(field) {
            Some(v) if !v.trim().is_empty() => Ok(v.to_owned()),
            _ => Err(RegistrationError::MissingField(field)),
        }
    }
}

impl fmt::Debug for FormInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (field, value) in &self.values {
            if *field == FormField::Password {
                let _ = map.entry(&field.key(), &"<redacted>");
            } else {
                let _ = map.entry(&field.key(), value);
            }
        }
        map.finish()
    }
}

/// Bidder self-registration details.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BidderDetails {
    /// First name, as typed.
    pub name: String,
    /// Surname, as typed.
    pub surname: String,
}

/// Operator credentials.
#[derive(Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ManagerCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ManagerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validated registration request, keyed by role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationPayload {
    /// Sent over the persistent connection.
    Bidder(BidderDetails),
    /// Sent to the admin endpoint.
    Manager(ManagerCredentials),
}

impl RegistrationPayload {
    /// Build the payload for `role` from raw input.
    ///
    /// Fields are checked in form order; the first blank one is reported.
    pub fn build(role: Role, input: &FormInput) -> Result<Self, RegistrationError> {
        match role {
            Role::Bidder => Ok(Self::Bidder(BidderDetails {
                name: input.require(FormField::Name)?,
                surname: input.require(FormField::Surname)?,
            })),
            Role::Manager => Ok(Self::Manager(ManagerCredentials {
                username: input.require(FormField::Username)?,
                password: input.require(FormField::Password)?,
            })),
        }
    }

    /// The role this payload was built for.
    pub fn role(&self) -> Role {
        match self {
            Self::Bidder(_) => Role::Bidder,
            Self::Manager(_) => Role::Manager,
        }
    }
}

/// Server verdict on a registration, from either transport.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    /// Whether the registration was accepted.
    #[serde(default)]
    pub success: bool,
    /// Server-provided explanation, mostly on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RegistrationOutcome {
    /// A successful outcome with no message.
    pub fn accepted() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// A rejection carrying the server's message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Interpret an inbound reply.
    ///
    /// Anything that is not an object with a boolean `success: true` counts as
    /// a rejection. A non-string `message` is dropped.
    pub fn from_reply(value: &Value) -> Self {
        let success = value.get("success").and_then(Value::as_bool).unwrap_or(false);
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Self { success, message }
    }
}

/// Lifecycle of a registration form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SubmissionState {
    /// No role chosen yet.
    #[default]
    Idle,
    /// A role is chosen and nothing is in flight.
    RoleSelected,
    /// One attempt is in flight.
    Submitting,
    /// Registered. Terminal.
    Succeeded,
    /// The last attempt failed; the form may be submitted again.
    Failed,
}

impl SubmissionState {
    /// Whether a new submission may be dispatched from this state.
    pub fn accepts_submit(self) -> bool {
        matches!(self, Self::RoleSelected | Self::Failed)
    }

    /// Whether the role may still be changed.
    pub fn accepts_role_change(self) -> bool {
        matches!(self, Self::Idle | Self::RoleSelected | Self::Failed)
    }
}
