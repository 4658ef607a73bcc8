//! Streamer.bot WebSocket client.
//!
//! Streamer.bot speaks a flat JSON protocol: every request is
//! `{"request": "<Name>", "id": "<uuid>", ...}` and the reply echoes the `id`
//! with `"status": "ok" | "error"`. Events arrive unsolicited as
//! `{"event": {"source", "type"}, "data": {...}}`.
//!
//! The client owns at most one link at a time. [`StreamerBotClient::connect`]
//! retries a bounded number of times with capped exponential backoff; once
//! connected, requests are correlated by id and raced against a fixed
//! response timeout.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::rpc::PendingRequests;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const OUTGOING_CHANNEL_CAPACITY: usize = 32;

// ── Config ───────────────────────────────────────────────────────────

/// Connection parameters for a Streamer.bot WebSocket server.
#[derive(Debug, Clone)]
pub struct StreamerBotConfig {
    /// e.g. `ws://127.0.0.1:8080/`
    pub url: Url,
    /// Extra attempts after the first failed one.
    pub max_retries: u32,
    /// Upper bound on a single socket open.
    pub connect_timeout: Duration,
    /// How long a request waits for its correlated reply.
    pub request_timeout: Duration,
}

impl StreamerBotConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            max_retries: 2,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Delay before retry `attempt` (1-based): `min(1s * 2^(attempt-1), 5s)`.
pub fn retry_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    Duration::from_millis(1000_u64.saturating_mul(1 << exp)).min(Duration::from_secs(5))
}

// ── Wire types ───────────────────────────────────────────────────────

/// One configured Streamer.bot action, as listed by `GetActions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotAction {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

/// A pushed Streamer.bot event.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamerBotEvent {
    /// Event source, e.g. `"Twitch"`.
    pub source: String,
    /// Event type within the source, e.g. `"Follow"`.
    pub event_type: String,
    pub data: Value,
}

/// How `DoAction` addresses its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRef<'a> {
    Id(&'a str),
    Name(&'a str),
}

impl<'a> ActionRef<'a> {
    /// Identifiers that look like a 36-char UUID are sent as `id`, anything
    /// else as `name`.
    pub fn parse(identifier: &'a str) -> Self {
        let looks_like_uuid = identifier.len() == 36
            && identifier
                .chars()
                .all(|c| c.is_ascii_hexdigit() || c == '-');
        if looks_like_uuid {
            Self::Id(identifier)
        } else {
            Self::Name(identifier)
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Id(id) => json!({ "id": id }),
            Self::Name(name) => json!({ "name": name }),
        }
    }
}

// ── Link ─────────────────────────────────────────────────────────────

/// One live socket plus its background reader/writer.
struct Link {
    outgoing: mpsc::Sender<String>,
    pending: Arc<PendingRequests>,
    cancel: CancellationToken,
}

impl Link {
    fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Handle to the automation tool. Cheap to clone.
#[derive(Clone)]
pub struct StreamerBotClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: StreamerBotConfig,
    link: Mutex<Option<Link>>,
    event_tx: broadcast::Sender<StreamerBotEvent>,
}

impl StreamerBotClient {
    pub fn new(config: StreamerBotConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ClientInner {
                config,
                link: Mutex::new(None),
                event_tx,
            }),
        }
    }

    pub fn config(&self) -> &StreamerBotConfig {
        &self.inner.config
    }

    /// Connect, retrying up to `max_retries` extra times.
    ///
    /// Concurrent callers serialize on the link lock; whoever arrives second
    /// finds the link already up and returns immediately.
    pub async fn connect(&self) -> Result<(), Error> {
        let mut link = self.inner.link.lock().await;
        if link.as_ref().is_some_and(Link::is_alive) {
            tracing::debug!("Already connected to Streamer.bot");
            return Ok(());
        }
        if let Some(stale) = link.take() {
            stale.cancel.cancel();
        }

        let config = &self.inner.config;
        let mut last_err = None;
        for attempt in 0..=config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_delay(attempt)).await;
            }
            match self.open_link().await {
                Ok(new_link) => {
                    tracing::info!(url = %config.url, attempt, "Connected to Streamer.bot");
                    *link = Some(new_link);
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(url = %config.url, attempt, error = %e, "Streamer.bot connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        let attempts = config.max_retries + 1;
        tracing::warn!(url = %config.url, attempts, "Could not connect to Streamer.bot");
        Err(last_err.unwrap_or(Error::SessionClosed))
    }

    async fn open_link(&self) -> Result<Link, Error> {
        let config = &self.inner.config;
        let timeout_ms = u64::try_from(config.connect_timeout.as_millis()).unwrap_or(u64::MAX);

        let (ws_stream, _) = tokio::time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(config.url.as_str()),
        )
        .await
        .map_err(|_| Error::Timeout {
            operation: "Streamer.bot connect".into(),
            timeout_ms,
        })?
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::channel::<String>(OUTGOING_CHANNEL_CAPACITY);
        let pending = Arc::new(PendingRequests::new());
        let cancel = CancellationToken::new();

        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = writer_cancel.cancelled() => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    frame = outgoing_rx.recv() => {
                        let Some(frame) = frame else { break };
                        if write.send(Message::text(frame)).await.is_err() {
                            writer_cancel.cancel();
                            break;
                        }
                    }
                }
            }
        });

        let reader_cancel = cancel.clone();
        let reader_pending = Arc::clone(&pending);
        let event_tx = self.inner.event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = reader_cancel.cancelled() => break,
                    frame = read.next() => match frame {
                        Some(Ok(Message::Text(text))) => route_frame(&text, &reader_pending, &event_tx),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "Streamer.bot read error");
                            break;
                        }
                    }
                }
            }
            reader_pending.fail_all(&Error::SessionClosed);
            reader_cancel.cancel();
            tracing::info!("Streamer.bot link closed");
        });

        Ok(Link {
            outgoing,
            pending,
            cancel,
        })
    }

    /// Whether a live link exists.
    pub async fn is_connected(&self) -> bool {
        self.inner.link.lock().await.as_ref().is_some_and(Link::is_alive)
    }

    /// Drop the link. Pending requests fail with [`Error::SessionClosed`].
    pub async fn disconnect(&self) {
        if let Some(link) = self.inner.link.lock().await.take() {
            link.cancel.cancel();
            link.pending.fail_all(&Error::SessionClosed);
            tracing::info!("Disconnected from Streamer.bot");
        }
    }

    /// Subscribe to pushed events. Survives reconnects.
    pub fn events(&self) -> broadcast::Receiver<StreamerBotEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Send a raw request. `fields` must be a JSON object; `request` and `id`
    /// are added to it.
    pub async fn request(&self, request: &str, fields: Value) -> Result<Value, Error> {
        let id = uuid::Uuid::new_v4().to_string();

        let mut body = match fields {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(Error::Protocol(format!(
                    "request fields must be an object, got {other}"
                )));
            }
        };
        body.insert("request".into(), Value::String(request.to_owned()));
        body.insert("id".into(), Value::String(id.clone()));

        let (outgoing, pending) = {
            let link = self.inner.link.lock().await;
            match link.as_ref() {
                Some(l) if l.is_alive() => (l.outgoing.clone(), Arc::clone(&l.pending)),
                _ => return Err(Error::SessionClosed),
            }
        };

        let reply = pending.register(&id);
        if outgoing.send(Value::Object(body).to_string()).await.is_err() {
            return Err(Error::SessionClosed);
        }

        let timeout = self.inner.config.request_timeout;
        match tokio::time::timeout(timeout, reply.reply()).await {
            Ok(Ok(result)) => result.map_err(|e| match e {
                Error::AutomationRequest { message, .. } => Error::AutomationRequest {
                    request: request.to_owned(),
                    message,
                },
                other => other,
            }),
            Ok(Err(_)) => Err(Error::SessionClosed),
            Err(_) => {
                Err(Error::Timeout {
                    operation: format!("Streamer.bot {request}"),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Run an action by name or id with arguments.
    pub async fn do_action(
        &self,
        identifier: &str,
        args: serde_json::Map<String, Value>,
    ) -> Result<(), Error> {
        let action = ActionRef::parse(identifier);
        tracing::debug!(?action, "DoAction");
        self.request("DoAction", json!({ "action": action.to_json(), "args": args }))
            .await
            .map(|_| ())
    }

    /// List configured actions. A reply without an `actions` array yields
    /// an empty list.
    pub async fn get_actions(&self) -> Result<Vec<BotAction>, Error> {
        let reply = self.request("GetActions", Value::Null).await?;
        match reply.get("actions") {
            Some(actions @ Value::Array(_)) => serde_json::from_value(actions.clone())
                .map_err(|e| Error::decode(&e, &reply.to_string())),
            _ => Ok(Vec::new()),
        }
    }

    /// Broadcaster / platform info.
    pub async fn get_broadcaster(&self) -> Result<Value, Error> {
        self.request("GetBroadcaster", Value::Null).await
    }
}

/// Dispatch one inbound frame to a waiting request or the event channel.
fn route_frame(
    text: &str,
    pending: &PendingRequests,
    event_tx: &broadcast::Sender<StreamerBotEvent>,
) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Undecodable Streamer.bot frame");
            return;
        }
    };

    if let Some(event) = frame.get("event") {
        let field = |k: &str| event.get(k).and_then(Value::as_str).unwrap_or_default().to_owned();
        let _ = event_tx.send(StreamerBotEvent {
            source: field("source"),
            event_type: field("type"),
            data: frame.get("data").cloned().unwrap_or(Value::Null),
        });
        return;
    }

    let Some(id) = frame.get("id").and_then(Value::as_str) else {
        tracing::trace!("Streamer.bot frame without id or event");
        return;
    };

    let reply = if frame.get("status").and_then(Value::as_str) == Some("error") {
        Err(Error::AutomationRequest {
            request: String::new(),
            message: frame
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_owned(),
        })
    } else {
        Ok(frame.clone())
    };
    pending.resolve(id, reply);
}
