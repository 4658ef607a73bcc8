//! obs-websocket v5 message framing.
//!
//! Every frame on the wire is `{ "op": <u8>, "d": { ... } }`. Incoming frames
//! are decoded into [`ServerMessage`]; outgoing frames are built from
//! [`ClientMessage`]. Field names follow the protocol's camelCase.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Error;

/// RPC version this client speaks.
pub const RPC_VERSION: u32 = 1;

/// Every event category except the high-volume ones (input volume meters,
/// active/show state changes, scene item transforms).
pub const EVENT_SUBSCRIPTION_ALL: u32 = 0x7FF;

// ── Opcodes ──────────────────────────────────────────────────────────

mod op {
    pub const HELLO: u8 = 0;
    pub const IDENTIFY: u8 = 1;
    pub const IDENTIFIED: u8 = 2;
    pub const EVENT: u8 = 5;
    pub const REQUEST: u8 = 6;
    pub const REQUEST_RESPONSE: u8 = 7;
}

// ── Server → client ──────────────────────────────────────────────────

/// Authentication challenge carried by `Hello` when the server has a password.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_web_socket_version: Option<String>,
    pub rpc_version: u32,
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

/// An asynchronous change notification pushed by the production tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsEvent {
    /// Event name, e.g. `"CurrentProgramSceneChanged"`.
    pub event_type: String,

    /// Subscription bit the event belongs to.
    #[serde(default)]
    pub event_intent: u32,

    /// Type-specific payload. `Null` when the event carries none.
    #[serde(default)]
    pub event_data: serde_json::Value,
}

impl ObsEvent {
    /// Convenience constructor used by tests and synthetic events.
    pub fn new(event_type: impl Into<String>, event_data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            event_intent: 0,
            event_data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<serde_json::Value>,
}

impl RequestResponse {
    /// Unwrap the response into its payload, or a [`Error::RequestFailed`].
    pub fn into_result(self) -> Result<serde_json::Value, Error> {
        if self.request_status.result {
            Ok(self.response_data.unwrap_or(serde_json::Value::Null))
        } else {
            Err(Error::RequestFailed {
                request_type: self.request_type,
                code: self.request_status.code,
                comment: self.request_status.comment,
            })
        }
    }
}

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Hello(Hello),
    Identified(Identified),
    Event(ObsEvent),
    RequestResponse(RequestResponse),
    /// Opcodes this client never acts on (e.g. batch responses).
    Other(u8),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    op: u8,
    #[serde(default)]
    d: serde_json::Value,
}

impl ServerMessage {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, Error> {
        let frame: RawFrame = serde_json::from_str(text).map_err(|e| Error::decode(&e, text))?;
        let d = frame.d;
        let msg = match frame.op {
            op::HELLO => Self::Hello(from_payload(d, text)?),
            op::IDENTIFIED => Self::Identified(from_payload(d, text)?),
            op::EVENT => Self::Event(from_payload(d, text)?),
            op::REQUEST_RESPONSE => Self::RequestResponse(from_payload(d, text)?),
            other => Self::Other(other),
        };
        Ok(msg)
    }
}

fn from_payload<T: serde::de::DeserializeOwned>(
    d: serde_json::Value,
    text: &str,
) -> Result<T, Error> {
    serde_json::from_value(d).map_err(|e| Error::decode(&e, text))
}

// ── Client → server ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    pub event_subscriptions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_type: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Identify(Identify),
    Request(Request),
}

impl ClientMessage {
    /// Encode into the `{op, d}` text frame.
    pub fn encode(&self) -> String {
        let (op, d) = match self {
            Self::Identify(m) => (op::IDENTIFY, serde_json::to_value(m)),
            Self::Request(m) => (op::REQUEST, serde_json::to_value(m)),
        };
        // Both payloads are plain structs of strings/numbers; serialization is infallible.
        let d = d.unwrap_or(serde_json::Value::Null);
        serde_json::json!({ "op": op, "d": d }).to_string()
    }
}

// ── Authentication ───────────────────────────────────────────────────

/// Compute the Identify authentication string:
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`.
pub fn authentication_string(password: &str, challenge: &AuthChallenge) -> String {
    let secret = BASE64.encode(Sha256::digest(format!("{password}{}", challenge.salt)));
    BASE64.encode(Sha256::digest(format!("{secret}{}", challenge.challenge)))
}

// ── Tests ────────────────────────────────────────────────────────────
