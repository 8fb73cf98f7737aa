//! One-shot reply correlation over the persistent connection.
//!
//! Replies on the registration channel carry no request identifier, so the
//! correlator keeps at most one listener armed at a time. The listener
//! forwards the first message it sees and removes itself; arming again, or
//! cancelling, tears down whatever is still armed, and anything that arrives
//! afterwards finds no listener.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use subastas_transport::{ConnectionGateway, EventHandler, Subscription};

use crate::error::CorrelationError;

struct Armed {
    id: u64,
    cancel: CancellationToken,
    subscription: Subscription,
}

#[derive(Default)]
struct Slot {
    next_id: u64,
    armed: Option<Armed>,
}

impl Slot {
    /// Take the armed listener if it is still `id`'s.
    fn take_if(&mut self, id: u64) -> Option<Armed> {
        if self.armed.as_ref().is_some_and(|a| a.id == id) {
            self.armed.take()
        } else {
            None
        }
    }
}

/// Bridges `subscribe(channel)` into a single-result future.
pub struct ResponseCorrelator {
    gateway: Arc<dyn ConnectionGateway>,
    reply_timeout: Option<Duration>,
    slot: Arc<Mutex<Slot>>,
}

impl ResponseCorrelator {
    /// Correlator over `gateway`. `reply_timeout` of `None` waits forever.
    pub fn new(gateway: Arc<dyn ConnectionGateway>, reply_timeout: Option<Duration>) -> Self {
        Self {
            gateway,
            reply_timeout,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Subscribe to `channel` for exactly one message on behalf of
    /// `attempt`.
    ///
    /// Must be called before the request is sent so a fast reply is not
    /// missed. A reply still pending from an earlier arm is cancelled first.
    /// An attempt that is already cancelled arms nothing and leaves the
    /// current listener in place. Cancelling `attempt` later resolves the
    /// reply as [`CorrelationError::Cancelled`].
    pub fn arm(
        &self,
        channel: &str,
        attempt: &CancellationToken,
    ) -> Result<PendingReply, CorrelationError> {
        let (tx, rx) = oneshot::channel::<Value>();

        // Held across the check and subscribe so two arms never leave two
        // listeners behind, and a cancelled attempt never displaces a live one.
        let mut slot = self.slot.lock();
        if attempt.is_cancelled() {
            debug!(channel, "attempt cancelled before arming");
            return Err(CorrelationError::Cancelled);
        }
        let cancel = attempt.child_token();
        slot.next_id += 1;
        let id = slot.next_id;
        if let Some(previous) = slot.armed.take() {
            debug!(channel, id = previous.id, "superseding pending reply");
            previous.cancel.cancel();
        }

        let sender = Mutex::new(Some(tx));
        let weak_slot: Weak<Mutex<Slot>> = Arc::downgrade(&self.slot);
        let handler: EventHandler = Arc::new(move |payload: &Value| {
            let Some(tx) = sender.lock().take() else {
                return;
            };
            // Unsubscribe before handing the reply over.
            let released = weak_slot.upgrade().and_then(|slot| {
                let mut slot = slot.lock();
                slot.take_if(id)
            });
            drop(released);
            let _ = tx.send(payload.clone());
        });

        let subscription = self.gateway.subscribe(channel, handler);
        trace!(channel, id, "reply armed");
        slot.armed = Some(Armed {
            id,
            cancel: cancel.clone(),
            subscription,
        });
        drop(slot);

        Ok(PendingReply {
            id,
            slot: Arc::clone(&self.slot),
            rx,
            cancel,
            state: self.gateway.connection_state(),
            reply_timeout: self.reply_timeout,
        })
    }

    /// Cancel the armed reply, if any, and remove its listener.
    pub fn cancel(&self) {
        let armed = self.slot.lock().armed.take();
        if let Some(armed) = armed {
            debug!(id = armed.id, "pending reply cancelled");
            armed.cancel.cancel();
        }
    }

    /// Listeners currently registered by this correlator (0 or 1).
    pub fn active_subscriptions(&self) -> usize {
        usize::from(self.slot.lock().armed.is_some())
    }
}

impl Drop for ResponseCorrelator {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// An armed, not yet resolved reply. Dropping it removes the listener.
pub struct PendingReply {
    id: u64,
    slot: Arc<Mutex<Slot>>,
    rx: oneshot::Receiver<Value>,
    cancel: CancellationToken,
    state: watch::Receiver<bool>,
    reply_timeout: Option<Duration>,
}

impl PendingReply {
    /// Wait for the reply.
    pub async fn recv(mut self) -> Result<Value, CorrelationError> {
        let reply_timeout = self.reply_timeout;
        let Self {
            rx, cancel, state, ..
        } = &mut self;

        let wait = async {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(CorrelationError::Cancelled),
                reply = rx => reply.map_err(|_| CorrelationError::Cancelled),
                () = connection_lost(state) => Err(CorrelationError::ConnectionLost),
            }
        };
        let result = match reply_timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .unwrap_or(Err(CorrelationError::TimedOut(limit))),
            None => wait.await,
        };

        self.release();
        result
    }

    fn release(&mut self) {
        let armed = self.slot.lock().take_if(self.id);
        drop(armed);
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.release();
    }
}

/// Resolves once the connection is reported down or its publisher is gone.
async fn connection_lost(state: &mut watch::Receiver<bool>) {
    let _ = state.wait_for(|connected| !*connected).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use subastas_transport::testing::LoopbackGateway;

    const CHANNEL: &str = "user_registered";

    fn setup(timeout: Option<Duration>) -> (Arc<LoopbackGateway>, ResponseCorrelator) {
        let gateway = Arc::new(LoopbackGateway::new(true));
        let correlator = ResponseCorrelator::new(gateway.clone(), timeout);
        (gateway, correlator)
    }

    fn arm(correlator: &ResponseCorrelator) -> PendingReply {
        correlator.arm(CHANNEL, &CancellationToken::new()).unwrap()
    }

    #[tokio::test]
    async fn first_message_resolves_and_unsubscribes() {
        let (gateway, correlator) = setup(None);
        let pending = arm(&correlator);
        assert_eq!(gateway.subscriber_count(CHANNEL), 1);

        assert_eq!(gateway.deliver(CHANNEL, json!({"success": true})), 1);
        assert_eq!(gateway.subscriber_count(CHANNEL), 0);
        assert_eq!(correlator.active_subscriptions(), 0);

        // A duplicate finds no listener.
        assert_eq!(gateway.deliver(CHANNEL, json!({"success": false})), 0);
        assert_eq!(pending.recv().await.unwrap(), json!({"success": true}));
    }

    #[tokio::test]
    async fn cancel_before_reply_discards_late_message() {
        let (gateway, correlator) = setup(None);
        let pending = arm(&correlator);
        correlator.cancel();

        assert_eq!(gateway.subscriber_count(CHANNEL), 0);
        assert_eq!(gateway.deliver(CHANNEL, json!({"success": true})), 0);
        assert_eq!(pending.recv().await, Err(CorrelationError::Cancelled));
    }

    #[tokio::test]
    async fn rearming_supersedes_previous_reply() {
        let (gateway, correlator) = setup(None);
        let first = arm(&correlator);
        let second = arm(&correlator);
        assert_eq!(gateway.subscriber_count(CHANNEL), 1);

        let _ = gateway.deliver(CHANNEL, json!({"success": true}));
        assert_eq!(first.recv().await, Err(CorrelationError::Cancelled));
        assert_eq!(second.recv().await.unwrap(), json!({"success": true}));
    }

    #[tokio::test]
    async fn superseded_reply_does_not_release_new_listener() {
        let (gateway, correlator) = setup(None);
        let first = arm(&correlator);
        let _second = arm(&correlator);
        drop(first);
        assert_eq!(correlator.active_subscriptions(), 1);
        assert_eq!(gateway.subscriber_count(CHANNEL), 1);
    }

    #[tokio::test]
    async fn dropping_pending_reply_unsubscribes() {
        let (gateway, correlator) = setup(None);
        let pending = arm(&correlator);
        drop(pending);
        assert_eq!(gateway.subscriber_count(CHANNEL), 0);
        assert_eq!(correlator.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn connection_drop_resolves_as_lost() {
        let (gateway, correlator) = setup(None);
        let pending = arm(&correlator);
        let waiter = tokio::spawn(pending.recv());
        tokio::task::yield_now().await;

        gateway.set_connected(false);
        assert_eq!(waiter.await.unwrap(), Err(CorrelationError::ConnectionLost));
        assert_eq!(gateway.subscriber_count(CHANNEL), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_times_out() {
        let (gateway, correlator) = setup(Some(Duration::from_secs(30)));
        let pending = arm(&correlator);
        assert_eq!(
            pending.recv().await,
            Err(CorrelationError::TimedOut(Duration::from_secs(30)))
        );
        assert_eq!(gateway.subscriber_count(CHANNEL), 0);
    }

    #[tokio::test]
    async fn reply_during_send_is_not_missed() {
        let (gateway, correlator) = setup(None);
        gateway.reply_on_send(CHANNEL, json!({"success": true}));

        let pending = arm(&correlator);
        gateway.send("register_user", json!({})).await.unwrap();
        assert_eq!(pending.recv().await.unwrap(), json!({"success": true}));
    }

    #[tokio::test]
    async fn cancelled_attempt_arms_nothing() {
        let (gateway, correlator) = setup(None);
        let live = arm(&correlator);

        let stale = CancellationToken::new();
        stale.cancel();
        assert!(matches!(
            correlator.arm(CHANNEL, &stale),
            Err(CorrelationError::Cancelled)
        ));

        // The live listener is untouched.
        assert_eq!(gateway.subscriber_count(CHANNEL), 1);
        let _ = gateway.deliver(CHANNEL, json!({"success": true}));
        assert_eq!(live.recv().await.unwrap(), json!({"success": true}));
    }

    #[tokio::test]
    async fn cancelling_attempt_resolves_reply() {
        let (gateway, correlator) = setup(None);
        let attempt = CancellationToken::new();
        let pending = correlator.arm(CHANNEL, &attempt).unwrap();

        attempt.cancel();
        assert_eq!(pending.recv().await, Err(CorrelationError::Cancelled));
        assert_eq!(gateway.subscriber_count(CHANNEL), 0);
        assert_eq!(gateway.deliver(CHANNEL, json!({"success": true})), 0);
    }
}
