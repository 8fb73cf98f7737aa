//! The registration state machine.
//!
//! ```text
//! Idle ──select_role──▶ RoleSelected ──submit──▶ Submitting ──success──▶ Succeeded
//!                            ▲   ▲                  │  │
//!                            │   └──── cancel ──────┘  └──failure──▶ Failed ──submit──▶ …
//! ```
//!
//! `Submitting` is the only mutual exclusion: a submit that finds it (or
//! `Succeeded`) does nothing. Every accepted submit gets a fresh attempt
//! generation and cancellation token, both set under the state lock. An
//! outcome whose generation is no longer current is discarded without
//! touching state or navigation, and a cancelled token stops the attempt
//! wherever it is, including before it reaches a transport.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use subastas_core::constants::{LABEL_SUBMIT, LABEL_SUBMITTING, MSG_REGISTERED};
use subastas_core::{
    FormInput, Identity, RegistrationError, RegistrationOutcome, RegistrationPayload, Role,
    SubmissionState,
};

use crate::error::DispatchError;
use crate::identity::IdentityIssuer;
use crate::router::SessionRouter;
use crate::transport::RegistrationTransport;

/// What a call to [`RegistrationCoordinator::submit`] amounted to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Registered; the router was handed this identity.
    Succeeded(Identity),
    /// A submission was already in flight or had already succeeded.
    Ignored,
    /// Cancelled before an outcome was applied.
    Cancelled,
}

/// Read-only view for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorView {
    /// Current lifecycle state.
    pub state: SubmissionState,
    /// Selected role, if any.
    pub role: Option<Role>,
    /// Error or success message to show on the form.
    pub message: Option<String>,
    /// Whether an attempt is in flight.
    pub loading: bool,
}

impl CoordinatorView {
    /// Text of the submit button.
    pub fn submit_label(&self) -> &'static str {
        if self.loading { LABEL_SUBMITTING } else { LABEL_SUBMIT }
    }
}

#[derive(Default)]
struct Inner {
    state: SubmissionState,
    role: Option<Role>,
    message: Option<String>,
    generation: u64,
    attempt: Option<CancellationToken>,
    torn_down: bool,
}

impl Inner {
    fn fail_locally(&mut self, err: RegistrationError) -> RegistrationError {
        self.message = Some(err.user_message());
        err
    }

    /// Start attempt `generation + 1` and hand out its token.
    fn begin_attempt(&mut self) -> (u64, CancellationToken) {
        self.state = SubmissionState::Submitting;
        self.message = None;
        self.generation += 1;
        let attempt = CancellationToken::new();
        self.attempt = Some(attempt.clone());
        (self.generation, attempt)
    }
}

/// Owns role selection and the submission lifecycle for one form.
pub struct RegistrationCoordinator {
    issuer: IdentityIssuer,
    transport: Arc<dyn RegistrationTransport>,
    router: Arc<dyn SessionRouter>,
    inner: Mutex<Inner>,
}

impl RegistrationCoordinator {
    /// A coordinator in `Idle`.
    pub fn new(
        issuer: IdentityIssuer,
        transport: Arc<dyn RegistrationTransport>,
        router: Arc<dyn SessionRouter>,
    ) -> Self {
        Self {
            issuer,
            transport,
            router,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Choose the role. Ignored while submitting, after success or after
    /// teardown; returns whether it was applied.
    pub fn select_role(&self, role: Role) -> bool {
        let mut inner = self.inner.lock();
        if inner.torn_down || !inner.state.accepts_role_change() {
            debug!(%role, state = ?inner.state, "role change ignored");
            return false;
        }
        inner.role = Some(role);
        if inner.state == SubmissionState::Idle {
            inner.state = SubmissionState::RoleSelected;
        }
        true
    }

    /// Validate, dispatch and apply the outcome of one registration attempt.
    ///
    /// Local failures (`NoRoleSelected`, `MissingField`,
    /// `ConnectionUnavailable`) leave the state unchanged and issue nothing.
    pub async fn submit(&self, input: &FormInput) -> Result<SubmitOutcome, RegistrationError> {
        let (payload, generation, attempt) = {
            let mut inner = self.inner.lock();
            if inner.torn_down {
                debug!("submit after teardown ignored");
                return Ok(SubmitOutcome::Ignored);
            }
            let Some(role) = inner.role else {
                return Err(inner.fail_locally(RegistrationError::NoRoleSelected));
            };
            if !inner.state.accepts_submit() {
                debug!(state = ?inner.state, "submit ignored");
                return Ok(SubmitOutcome::Ignored);
            }
            let payload = match RegistrationPayload::build(role, input) {
                Ok(payload) => payload,
                Err(e) => return Err(inner.fail_locally(e)),
            };
            if role == Role::Bidder && !self.transport.bidder_available() {
                return Err(inner.fail_locally(RegistrationError::ConnectionUnavailable));
            }
            let (generation, attempt) = inner.begin_attempt();
            (payload, generation, attempt)
        };

        let identity = self.issuer.issue();
        info!(
            role = %payload.role(),
            user_id = %identity,
            attempt = generation,
            "submitting registration"
        );

        let result = match &payload {
            RegistrationPayload::Bidder(details) => {
                self.transport
                    .submit_bidder(&identity, details, &attempt)
                    .await
            }
            RegistrationPayload::Manager(credentials) => {
                self.transport
                    .submit_admin(&identity, credentials, &attempt)
                    .await
            }
        };

        self.apply(generation, identity, result)
    }

    fn apply(
        &self,
        generation: u64,
        identity: Identity,
        result: Result<RegistrationOutcome, DispatchError>,
    ) -> Result<SubmitOutcome, RegistrationError> {
        {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state != SubmissionState::Submitting {
                debug!(attempt = generation, "discarding stale outcome");
                return Ok(SubmitOutcome::Cancelled);
            }
            inner.attempt = None;

            let err = match result {
                Ok(RegistrationOutcome { success: true, .. }) => {
                    inner.state = SubmissionState::Succeeded;
                    inner.message = Some(MSG_REGISTERED.to_owned());
                    None
                }
                Ok(RegistrationOutcome {
                    success: false,
                    message,
                }) => Some(RegistrationError::ServerRejected(message)),
                Err(DispatchError::Failed(e)) => Some(e),
                Err(DispatchError::Cancelled) => {
                    inner.state = SubmissionState::RoleSelected;
                    return Ok(SubmitOutcome::Cancelled);
                }
            };

            if let Some(err) = err {
                warn!(attempt = generation, kind = err.error_kind(), error = %err, "registration failed");
                inner.state = SubmissionState::Failed;
                inner.message = Some(err.user_message());
                return Err(err);
            }
        }

        info!(user_id = %identity, "registration succeeded");
        self.router.navigate_to_auction_floor(&identity);
        Ok(SubmitOutcome::Succeeded(identity))
    }

    /// Abandon the in-flight submission, if any. Its outcome will be
    /// discarded and the form returns to `RoleSelected`.
    ///
    /// The attempt's token fires before the lock is released, so a submit
    /// accepted afterwards never overlaps the abandoned one.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        if let Some(attempt) = inner.attempt.take() {
            attempt.cancel();
        }
        if inner.state == SubmissionState::Submitting {
            debug!("in-flight submission cancelled");
            inner.state = SubmissionState::RoleSelected;
        }
    }

    /// Cancel and refuse every later submit or role change.
    pub fn teardown(&self) {
        self.inner.lock().torn_down = true;
        self.cancel();
    }

    /// Current view of the form.
    pub fn snapshot(&self) -> CoordinatorView {
        let inner = self.inner.lock();
        CoordinatorView {
            state: inner.state,
            role: inner.role,
            message: inner.message.clone(),
            loading: inner.state == SubmissionState::Submitting,
        }
    }
}
