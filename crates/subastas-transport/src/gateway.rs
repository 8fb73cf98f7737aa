//! The connection capability the session layer is written against.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::TransportError;

/// Callback invoked for every message arriving on a subscribed channel.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// The persistent, bidirectional connection to the auction server.
///
/// Owned and lifecycle-managed outside the registration flow; callers only
/// read availability, send and subscribe.
#[async_trait]
pub trait ConnectionGateway: Send + Sync {
    /// Whether the connection is currently usable.
    fn is_connected(&self) -> bool;

    /// Availability updates; the value flips to `false` when the connection drops.
    fn connection_state(&self) -> watch::Receiver<bool>;

    /// Emit `payload` on `channel`.
    async fn send(&self, channel: &str, payload: Value) -> Result<(), TransportError>;

    /// Register `handler` for `channel`. The handler stays registered until the
    /// returned [`Subscription`] is unsubscribed or dropped.
    fn subscribe(&self, channel: &str, handler: EventHandler) -> Subscription;
}

/// Registration guard returned by [`ConnectionGateway::subscribe`].
///
/// Unsubscribes exactly once, on [`Subscription::unsubscribe`] or drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    channel: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Guard for a handler on `channel`; `release` removes it.
    pub fn new(channel: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            channel: channel.into(),
            release: Some(Box::new(release)),
        }
    }

    /// Channel the handler listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Remove the handler now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("active", &self.release.is_some())
            .finish()
    }
}
