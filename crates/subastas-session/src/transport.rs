//! The dispatch capability the coordinator selects from by role.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use subastas_core::constants::{REGISTER_USER_CHANNEL, USER_REGISTERED_CHANNEL};
use subastas_core::wire::{AdminLoginRequest, RegisterUserMessage};
use subastas_core::{BidderDetails, Identity, ManagerCredentials, RegistrationError, RegistrationOutcome};
use subastas_transport::{AdminTransport, ConnectionGateway};

use crate::correlator::ResponseCorrelator;
use crate::error::DispatchError;

/// Both ways a registration can travel, behind one capability.
#[async_trait]
pub trait RegistrationTransport: Send + Sync {
    /// Whether the bidder path can be used right now.
    fn bidder_available(&self) -> bool;

    /// Send a bidder registration and wait for its reply.
    ///
    /// Resolves as [`DispatchError::Cancelled`] once `attempt` is cancelled,
    /// and sends nothing if it already is.
    async fn submit_bidder(
        &self,
        identity: &Identity,
        details: &BidderDetails,
        attempt: &CancellationToken,
    ) -> Result<RegistrationOutcome, DispatchError>;

    /// Authenticate an operator, abandoning the call once `attempt` is
    /// cancelled.
    async fn submit_admin(
        &self,
        identity: &Identity,
        credentials: &ManagerCredentials,
        attempt: &CancellationToken,
    ) -> Result<RegistrationOutcome, DispatchError>;
}

/// Production transport: persistent connection for bidders, HTTP for managers.
pub struct LiveRegistrationTransport {
    gateway: Arc<dyn ConnectionGateway>,
    correlator: ResponseCorrelator,
    admin: Arc<dyn AdminTransport>,
}

impl LiveRegistrationTransport {
    /// Compose the two paths. `correlator` must watch `gateway`.
    pub fn new(
        gateway: Arc<dyn ConnectionGateway>,
        correlator: ResponseCorrelator,
        admin: Arc<dyn AdminTransport>,
    ) -> Self {
        Self {
            gateway,
            correlator,
            admin,
        }
    }

    /// Listeners the bidder path currently holds on the reply channel.
    pub fn active_subscriptions(&self) -> usize {
        self.correlator.active_subscriptions()
    }
}

#[async_trait]
impl RegistrationTransport for LiveRegistrationTransport {
    fn bidder_available(&self) -> bool {
        self.gateway.is_connected()
    }

    #[instrument(skip_all, fields(user_id = %identity))]
    async fn submit_bidder(
        &self,
        identity: &Identity,
        details: &BidderDetails,
        attempt: &CancellationToken,
    ) -> Result<RegistrationOutcome, DispatchError> {
        let message = RegisterUserMessage::new(identity.clone(), details);
        let payload = serde_json::to_value(&message)
            .map_err(|e| RegistrationError::NetworkError(e.to_string()))?;

        // Listen before sending: the reply may arrive before send returns.
        let pending = self.correlator.arm(USER_REGISTERED_CHANNEL, attempt)?;
        if attempt.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        if let Err(e) = self.gateway.send(REGISTER_USER_CHANNEL, payload).await {
            warn!(error = %e, kind = e.error_kind(), "bidder registration send failed");
            return Err(RegistrationError::ConnectionLost.into());
        }
        debug!("bidder registration sent, awaiting reply");

        let reply = pending.recv().await?;
        Ok(RegistrationOutcome::from_reply(&reply))
    }

    #[instrument(skip_all, fields(user_id = %identity, username = %credentials.username))]
    async fn submit_admin(
        &self,
        identity: &Identity,
        credentials: &ManagerCredentials,
        attempt: &CancellationToken,
    ) -> Result<RegistrationOutcome, DispatchError> {
        if attempt.is_cancelled() {
            debug!("attempt cancelled before admin login");
            return Err(DispatchError::Cancelled);
        }
        let request = AdminLoginRequest::new(identity.clone(), credentials);

        tokio::select! {
            biased;
            () = attempt.cancelled() => Err(DispatchError::Cancelled),
            result = self.admin.login(&request) => match result {
                Ok(outcome) => Ok(outcome),
                Err(e) => {
                    warn!(error = %e, kind = e.error_kind(), "admin login failed");
                    Err(RegistrationError::NetworkError(e.to_string()).into())
                }
            },
        }
    }
}
