//! # subastas-core
//!
//! Shared vocabulary for the auction client's registration flow.
//!
//! - **Identity**: the client-issued session token handed to the auction floor
//! - **Registration types**: `Role`, `FormInput`, `RegistrationPayload`,
//!   `RegistrationOutcome`, `SubmissionState`
//! - **Errors**: the user-visible `RegistrationError` taxonomy
//! - **Wire**: the JSON messages exchanged with the auction server
//! - **Constants**: channel names, endpoint path, storage key, UI strings

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;
pub mod registration;
pub mod wire;

pub use errors::RegistrationError;
pub use ids::Identity;
pub use registration::{
    BidderDetails, FormField, FormInput, ManagerCredentials, RegistrationOutcome,
    RegistrationPayload, Role, SubmissionState,
};
