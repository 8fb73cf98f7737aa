//! # subastas-transport
//!
//! The two transports a registration can travel over:
//!
//! - [`ConnectionGateway`]: the process-wide persistent connection, exposing
//!   availability plus `send(channel, payload)` / `subscribe(channel, handler)`.
//!   [`SocketGateway`] implements it over Socket.IO on a WebSocket.
//! - [`AdminTransport`]: a single call/response login. [`HttpAdminTransport`]
//!   implements it with `reqwest`.
//!
//! Connection establishment happens once at startup; reconnecting is left to
//! the owner of the gateway.

#![deny(unsafe_code)]

pub mod admin;
pub mod codec;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod socket;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use admin::{AdminTransport, HttpAdminTransport};
pub use error::TransportError;
pub use gateway::{ConnectionGateway, EventHandler, Subscription};
pub use hub::ChannelHub;
pub use socket::SocketGateway;
