//! Socket.IO gateway over `tokio-tungstenite`.
//!
//! One background task owns the WebSocket. It forwards queued outbound
//! frames, answers Engine.IO pings, completes the namespace handshake and
//! dispatches inbound events to the [`ChannelHub`]. Availability is published
//! on a `watch` channel and drops to `false` for good when the task exits.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::codec::{self, Packet};
use crate::error::TransportError;
use crate::gateway::{ConnectionGateway, EventHandler, Subscription};
use crate::hub::ChannelHub;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const OUTBOUND_QUEUE: usize = 64;

/// Persistent connection to the auction server.
pub struct SocketGateway {
    hub: ChannelHub,
    outbound: Option<mpsc::Sender<String>>,
    state: watch::Receiver<bool>,
    // Keeps the offline gateway's channel open; the live one is owned by the I/O task.
    _state_tx: Option<watch::Sender<bool>>,
    io_task: Option<JoinHandle<()>>,
}

impl SocketGateway {
    /// Open the WebSocket and wait for the Socket.IO connect acknowledgement.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let (ws, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let hub = ChannelHub::new();
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (state_tx, mut state_rx) = watch::channel(false);
        let (handshake_tx, mut handshake_rx) = mpsc::channel::<String>(1);

        let io_task = tokio::spawn(io_loop(ws, out_rx, hub.clone(), state_tx, handshake_tx));

        let ready = tokio::time::timeout(timeout, async {
            tokio::select! {
                biased;
                Some(reason) = handshake_rx.recv() => Err(TransportError::Handshake(reason)),
                res = state_rx.wait_for(|connected| *connected) => {
                    res.map(|_| ()).map_err(|_| TransportError::Closed)
                }
            }
        })
        .await;

        match ready {
            Ok(Ok(())) => {
                info!(url, "socket gateway connected");
                Ok(Self {
                    hub,
                    outbound: Some(out_tx),
                    state: state_rx,
                    _state_tx: None,
                    io_task: Some(io_task),
                })
            }
            Ok(Err(e)) => {
                io_task.abort();
                Err(e)
            }
            Err(_) => {
                io_task.abort();
                Err(TransportError::Timeout(timeout))
            }
        }
    }

    /// A gateway that is never available, used when the connection could not
    /// be opened. Sends fail with [`TransportError::NotConnected`].
    pub fn offline() -> Self {
        let (state_tx, state_rx) = watch::channel(false);
        Self {
            hub: ChannelHub::new(),
            outbound: None,
            state: state_rx,
            _state_tx: Some(state_tx),
            io_task: None,
        }
    }

    /// Live handler count on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.hub.subscriber_count(channel)
    }
}

impl Drop for SocketGateway {
    fn drop(&mut self) {
        if let Some(task) = self.io_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl ConnectionGateway for SocketGateway {
    fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    fn connection_state(&self) -> watch::Receiver<bool> {
        self.state.clone()
    }

    async fn send(&self, channel: &str, payload: Value) -> Result<(), TransportError> {
        let Some(outbound) = &self.outbound else {
            return Err(TransportError::NotConnected);
        };
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let frame = codec::encode_event(channel, &payload);
        trace!(channel, len = frame.len(), "queueing event");
        outbound.send(frame).await.map_err(|_| TransportError::Closed)
    }

    fn subscribe(&self, channel: &str, handler: EventHandler) -> Subscription {
        self.hub.subscribe(channel, handler)
    }
}

async fn io_loop(
    ws: WsStream,
    mut outbound: mpsc::Receiver<String>,
    hub: ChannelHub,
    state: watch::Sender<bool>,
    handshake_errors: mpsc::Sender<String>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let reply = match codec::decode(&text) {
                    Ok(Packet::Open(handshake)) => {
                        debug!(sid = ?handshake.get("sid"), "engine.io open");
                        Some(codec::encode_connect())
                    }
                    Ok(Packet::Ping(probe)) => Some(codec::encode_pong(&probe)),
                    Ok(Packet::Connect(_)) => {
                        let _ = state.send_replace(true);
                        None
                    }
                    Ok(Packet::Event { name, data }) => {
                        let _ = hub.dispatch(&name, &data);
                        None
                    }
                    Ok(Packet::ConnectError(reason)) => {
                        warn!(%reason, "socket.io connect refused");
                        let _ = handshake_errors.try_send(reason.to_string());
                        break;
                    }
                    Ok(Packet::Disconnect | Packet::Close) => break,
                    Ok(Packet::Pong(_) | Packet::Unsupported(_)) => None,
                    Err(e) => {
                        debug!(error = %e, "ignoring undecodable frame");
                        None
                    }
                };
                if let Some(reply) = reply {
                    if ws_tx.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    if state.send_replace(false) {
        warn!("socket gateway disconnected");
    }
    let _ = ws_tx.close().await;
}
