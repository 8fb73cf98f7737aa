//! In-process fakes for exercising code that depends on the transports.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, watch};

use subastas_core::wire::AdminLoginRequest;
use subastas_core::RegistrationOutcome;

use crate::error::TransportError;
use crate::gateway::{ConnectionGateway, EventHandler, Subscription};
use crate::hub::ChannelHub;

/// Gateway that records sends and lets the test inject inbound events.
pub struct LoopbackGateway {
    hub: ChannelHub,
    state: watch::Sender<bool>,
    sent: Mutex<Vec<(String, Value)>>,
    auto_reply: Mutex<Option<(String, Value)>>,
    fail_sends: AtomicBool,
}

impl LoopbackGateway {
    /// A gateway starting connected or not.
    pub fn new(connected: bool) -> Self {
        let (state, _) = watch::channel(connected);
        Self {
            hub: ChannelHub::new(),
            state,
            sent: Mutex::new(Vec::new()),
            auto_reply: Mutex::new(None),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Flip availability, as a connection drop or recovery would.
    pub fn set_connected(&self, connected: bool) {
        let _ = self.state.send_replace(connected);
    }

    /// Deliver an inbound event; returns how many handlers ran.
    pub fn deliver(&self, channel: &str, payload: Value) -> usize {
        self.hub.dispatch(channel, &payload)
    }

    /// Answer every subsequent send synchronously with `payload` on `channel`,
    /// before `send` returns.
    pub fn reply_on_send(&self, channel: &str, payload: Value) {
        *self.auto_reply.lock() = Some((channel.to_owned(), payload));
    }

    /// Make sends fail with [`TransportError::Closed`].
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Every `(channel, payload)` sent so far, in order.
    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().clone()
    }

    /// Number of sends recorded.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Handlers currently registered on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.hub.subscriber_count(channel)
    }
}

#[async_trait]
impl ConnectionGateway for LoopbackGateway {
    fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    fn connection_state(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    async fn send(&self, channel: &str, payload: Value) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent.lock().push((channel.to_owned(), payload));
        let reply = self.auto_reply.lock().clone();
        if let Some((reply_channel, reply_payload)) = reply {
            let _ = self.hub.dispatch(&reply_channel, &reply_payload);
        }
        Ok(())
    }

    fn subscribe(&self, channel: &str, handler: EventHandler) -> Subscription {
        self.hub.subscribe(channel, handler)
    }
}

enum Scripted {
    Ready(Result<RegistrationOutcome, TransportError>),
    Deferred(oneshot::Receiver<Result<RegistrationOutcome, TransportError>>),
}

/// Admin transport answering from a queue of scripted results.
#[derive(Default)]
pub struct ScriptedAdminTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<AdminLoginRequest>>,
    calls: AtomicUsize,
}

impl ScriptedAdminTransport {
    /// An empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a verdict.
    pub fn push_outcome(&self, outcome: RegistrationOutcome) {
        self.script.lock().push_back(Scripted::Ready(Ok(outcome)));
    }

    /// Queue a transport failure.
    pub fn push_error(&self, error: TransportError) {
        self.script.lock().push_back(Scripted::Ready(Err(error)));
    }

    /// Queue an answer the test releases later through the returned sender.
    pub fn push_deferred(&self) -> oneshot::Sender<Result<RegistrationOutcome, TransportError>> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().push_back(Scripted::Deferred(rx));
        tx
    }

    /// Logins attempted so far, answered or not.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every login request received, in order.
    pub fn requests(&self) -> Vec<AdminLoginRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl crate::admin::AdminTransport for ScriptedAdminTransport {
    async fn login(&self, request: &AdminLoginRequest) -> Result<RegistrationOutcome, TransportError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted::Ready(result)) => result,
            Some(Scripted::Deferred(rx)) => rx.await.unwrap_or(Err(TransportError::Closed)),
            None => Err(TransportError::Http("no scripted response".into())),
        }
    }
}
