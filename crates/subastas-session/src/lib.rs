//! # subastas-session
//!
//! Registration session coordination:
//!
//! - [`IdentityIssuer`]: fresh session identity per attempt, persisted
//! - [`ResponseCorrelator`]: one armed reply listener at a time
//! - [`RegistrationTransport`]: bidder and admin dispatch behind one capability
//! - [`RegistrationCoordinator`]: the submission state machine
//! - [`SessionRouter`]: handoff to the auction floor

#![deny(unsafe_code)]

pub mod coordinator;
pub mod correlator;
pub mod error;
pub mod identity;
pub mod router;
pub mod transport;

pub use coordinator::{CoordinatorView, RegistrationCoordinator, SubmitOutcome};
pub use correlator::{PendingReply, ResponseCorrelator};
pub use error::{CorrelationError, DispatchError};
pub use identity::IdentityIssuer;
pub use router::{AuctionFloorRoute, ChannelRouter, SessionRouter};
pub use transport::{LiveRegistrationTransport, RegistrationTransport};
