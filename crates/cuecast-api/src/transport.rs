// Transport seam between the wire clients and the connection layer.
//
// `cuecast-core` owns reconnection, queueing and caching; it only needs a way
// to open one authenticated session and to talk over it. Those two
// capabilities are expressed as traits so the core can be driven by the real
// WebSocket client or by an in-memory fake.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::broadcast;
use url::Url;

use crate::error::Error;
use crate::obs::protocol::{EVENT_SUBSCRIPTION_ALL, ObsEvent};

/// Where and how to open a production-tool session.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    /// WebSocket URL, e.g. `ws://127.0.0.1:4455`.
    pub url: Url,
    /// Server password, if authentication is enabled.
    pub password: Option<SecretString>,
    /// obs-websocket event subscription bitmask.
    pub event_subscriptions: u32,
    /// Upper bound on socket open + Hello/Identify exchange.
    pub handshake_timeout: Duration,
}

impl ConnectTarget {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            password: None,
            event_subscriptions: EVENT_SUBSCRIPTION_ALL,
            handshake_timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: Option<SecretString>) -> Self {
        self.password = password;
        self
    }
}

/// Why a live session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    /// Close without a close frame (socket reset, stream ended).
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: 1006,
            reason: reason.into(),
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        self.code == crate::error::CLOSE_AUTHENTICATION_FAILED
    }
}

/// Opens identified sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a socket and complete the handshake. Resolves only once the
    /// session is ready to carry requests.
    async fn connect(&self, target: &ConnectTarget) -> Result<Arc<dyn Session>, Error>;
}

/// One live, identified session.
#[async_trait]
pub trait Session: Send + Sync {
    /// Send a request and wait for its correlated response.
    ///
    /// No timeout is applied here; callers race this against their own.
    /// Dropping the future abandons the request and frees its slot.
    async fn request(
        &self,
        request_type: &str,
        request_data: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, Error>;

    /// Subscribe to pushed events.
    fn events(&self) -> broadcast::Receiver<Arc<ObsEvent>>;

    /// Resolves once the session has ended, for whatever reason.
    async fn closed(&self) -> CloseReason;

    /// Close the session from our side.
    async fn close(&self);

    /// Requests still waiting for a reply.
    fn in_flight(&self) -> usize {
        0
    }
}
