//! Handler registry used by every gateway.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;

use crate::gateway::{EventHandler, Subscription};

/// Channel name → handler registry shared by gateway implementations.
#[derive(Clone, Default)]
pub struct ChannelHub {
    inner: Arc<Mutex<HubInner>>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    handlers: HashMap<String, Vec<(u64, EventHandler)>>,
}

impl ChannelHub {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Dropping the returned guard removes it.
    pub fn subscribe(&self, channel: &str, handler: EventHandler) -> Subscription {
        let id = {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = inner.next_id;
            inner
                .handlers
                .entry(channel.to_owned())
                .or_default()
                .push((id, handler));
            id
        };
        tracing::trace!(channel, id, "handler subscribed");

        let weak: Weak<Mutex<HubInner>> = Arc::downgrade(&self.inner);
        let owned = channel.to_owned();
        Subscription::new(channel, move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock();
                if let Some(list) = inner.handlers.get_mut(&owned) {
                    list.retain(|(h, _)| *h != id);
                    if list.is_empty() {
                        let _ = inner.handlers.remove(&owned);
                    }
                }
                tracing::trace!(channel = %owned, id, "handler unsubscribed");
            }
        })
    }

    /// Invoke every handler registered on `channel`; returns how many ran.
    ///
    /// Handlers run outside the registry lock, so they may unsubscribe.
    pub fn dispatch(&self, channel: &str, payload: &Value) -> usize {
        let handlers: Vec<EventHandler> = {
            let inner = self.inner.lock();
            inner
                .handlers
                .get(channel)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };
        if handlers.is_empty() {
            tracing::debug!(channel, "no handler for inbound event");
        }
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// Number of live handlers on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner.lock().handlers.get(channel).map_or(0, Vec::len)
    }
}
