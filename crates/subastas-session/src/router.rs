//! Handoff to the auction floor after a successful registration.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{info, warn};

use subastas_core::Identity;
use subastas_core::constants::AUCTION_FLOOR_PATH;

/// Navigation target for a registered participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuctionFloorRoute {
    identity: Identity,
}

impl AuctionFloorRoute {
    /// Route for `identity`.
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    /// Identity the floor is opened with.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// `/auctions?userId=<identity>`
    pub fn path(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AuctionFloorRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{AUCTION_FLOOR_PATH}?userId={}", self.identity)
    }
}

/// Performs the handoff to the next screen.
pub trait SessionRouter: Send + Sync {
    /// Called once per successful submission, with the identity it issued.
    fn navigate_to_auction_floor(&self, identity: &Identity);
}

/// Router that hands the route to whoever owns the next screen.
#[derive(Clone, Debug)]
pub struct ChannelRouter {
    tx: mpsc::UnboundedSender<AuctionFloorRoute>,
}

impl ChannelRouter {
    /// A router and the receiving end the next screen reads routes from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AuctionFloorRoute>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionRouter for ChannelRouter {
    fn navigate_to_auction_floor(&self, identity: &Identity) {
        let route = AuctionFloorRoute::new(identity.clone());
        info!(route = %route, "handing off to auction floor");
        if self.tx.send(route).is_err() {
            warn!(user_id = %identity, "auction floor receiver gone, handoff dropped");
        }
    }
}
