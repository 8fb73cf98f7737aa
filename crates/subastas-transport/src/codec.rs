//! Socket.IO v4 text framing over Engine.IO v4.
//!
//! Only the packets the gateway needs are understood: the Engine.IO
//! open/close/ping/pong envelope and the Socket.IO connect, disconnect,
//! event and connect-error packets on the default namespace. Binary
//! attachments and acknowledgements are reported as [`Packet::Unsupported`].

use serde_json::Value;

use crate::error::TransportError;

/// A decoded text frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake (`0{...}`).
    Open(Value),
    /// Engine.IO close (`1`).
    Close,
    /// Engine.IO ping (`2`), with optional probe payload.
    Ping(String),
    /// Engine.IO pong (`3`).
    Pong(String),
    /// Socket.IO connect acknowledgement (`40{...}`).
    Connect(Option<Value>),
    /// Socket.IO disconnect (`41`).
    Disconnect,
    /// Socket.IO event (`42["name", data]`).
    Event { name: String, data: Value },
    /// Socket.IO connect error (`44{...}`).
    ConnectError(Value),
    /// Anything else (upgrade, noop, acks, binary packets).
    Unsupported(String),
}

/// Client → server namespace connect request.
pub fn encode_connect() -> String {
    "40".to_owned()
}

/// Answer to an Engine.IO ping.
pub fn encode_pong(payload: &str) -> String {
    format!("3{payload}")
}

/// Event frame: `42["name",data]`.
pub fn encode_event(name: &str, data: &Value) -> String {
    let frame = Value::Array(vec![Value::String(name.to_owned()), data.clone()]);
    format!("42{frame}")
}

/// Decode a text frame.
pub fn decode(frame: &str) -> Result<Packet, TransportError> {
    let mut chars = frame.chars();
    let Some(engine_type) = chars.next() else {
        return Err(TransportError::Decode("empty frame".into()));
    };
    let rest = chars.as_str();

    match engine_type {
        '0' => Ok(Packet::Open(parse_json(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping(rest.to_owned())),
        '3' => Ok(Packet::Pong(rest.to_owned())),
        '4' => decode_socket(rest),
        '5' | '6' => Ok(Packet::Unsupported(frame.to_owned())),
        other => Err(TransportError::Decode(format!(
            "unknown engine packet type {other:?}"
        ))),
    }
}

fn decode_socket(packet: &str) -> Result<Packet, TransportError> {
    let mut chars = packet.chars();
    let Some(socket_type) = chars.next() else {
        return Err(TransportError::Decode("empty socket packet".into()));
    };
    let body = strip_namespace(chars.as_str());

    match socket_type {
        '0' => {
            if body.is_empty() {
                Ok(Packet::Connect(None))
            } else {
                Ok(Packet::Connect(Some(parse_json(body)?)))
            }
        }
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(body),
        '4' => Ok(Packet::ConnectError(parse_json(body)?)),
        _ => Ok(Packet::Unsupported(format!("4{packet}"))),
    }
}

fn decode_event(body: &str) -> Result<Packet, TransportError> {
    // Optional ack id precedes the JSON array.
    let json = body.trim_start_matches(|c: char| c.is_ascii_digit());
    let Value::Array(mut items) = parse_json(json)? else {
        return Err(TransportError::Decode("event payload is not an array".into()));
    };
    if items.is_empty() {
        return Err(TransportError::Decode("event without a name".into()));
    }
    let Value::String(name) = items.remove(0) else {
        return Err(TransportError::Decode("event name is not a string".into()));
    };
    let data = if items.is_empty() {
        Value::Null
    } else {
        items.remove(0)
    };
    Ok(Packet::Event { name, data })
}

/// Drop a leading `/namespace,` prefix.
fn strip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        body.split_once(',').map_or("", |(_, rest)| rest)
    } else {
        body
    }
}

fn parse_json(text: &str) -> Result<Value, TransportError> {
    serde_json::from_str(text).map_err(|e| TransportError::Decode(e.to_string()))
}
