//! WebSocket session against obs-websocket v5.
//!
//! [`WebSocketConnector`] opens the socket, performs the Hello → Identify →
//! Identified handshake, then spawns a reader and a writer task. The reader
//! fans events out through a [`tokio::sync::broadcast`] channel and resolves
//! pending requests by `requestId`; when the socket ends, every pending
//! request is failed and the close reason is published.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::obs::protocol::{
    ClientMessage, Hello, Identify, ObsEvent, RPC_VERSION, Request, ServerMessage,
    authentication_string,
};
use crate::rpc::PendingRequests;
use crate::transport::{CloseReason, ConnectTarget, Connector, Session};

// ── Channel capacities ───────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const OUTGOING_CHANNEL_CAPACITY: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

// ── WebSocketConnector ───────────────────────────────────────────────

/// Real [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<Arc<dyn Session>, Error> {
        let timeout_ms = u64::try_from(target.handshake_timeout.as_millis()).unwrap_or(u64::MAX);
        let session = tokio::time::timeout(target.handshake_timeout, open_session(target))
            .await
            .map_err(|_| Error::Timeout {
                operation: "obs-websocket handshake".into(),
                timeout_ms,
            })??;
        Ok(Arc::new(session))
    }
}

async fn open_session(target: &ConnectTarget) -> Result<ObsSession, Error> {
    tracing::info!(url = %target.url, "Connecting to obs-websocket");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(target.url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    let hello: Hello = match next_message(&mut read).await? {
        ServerMessage::Hello(hello) => hello,
        other => return Err(Error::Protocol(format!("expected Hello, got {other:?}"))),
    };
    tracing::debug!(
        version = hello.obs_web_socket_version.as_deref().unwrap_or("unknown"),
        rpc_version = hello.rpc_version,
        auth_required = hello.authentication.is_some(),
        "Received Hello"
    );

    let authentication = match (&hello.authentication, &target.password) {
        (Some(challenge), Some(password)) => {
            Some(authentication_string(password.expose_secret(), challenge))
        }
        (Some(_), None) => {
            return Err(Error::Authentication {
                message: "server requires a password but none is configured".into(),
            });
        }
        (None, _) => None,
    };

    let identify = ClientMessage::Identify(Identify {
        rpc_version: RPC_VERSION.min(hello.rpc_version),
        authentication,
        event_subscriptions: target.event_subscriptions,
    });
    write
        .send(Message::text(identify.encode()))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    loop {
        match next_message(&mut read).await? {
            ServerMessage::Identified(identified) => {
                tracing::info!(
                    rpc_version = identified.negotiated_rpc_version,
                    "obs-websocket identified"
                );
                break;
            }
            other => tracing::trace!(?other, "Ignoring frame before Identified"),
        }
    }

    Ok(ObsSession::spawn(write, read))
}

/// Read frames until one decodes into a [`ServerMessage`]. A close frame
/// during the handshake becomes an error carrying its code.
async fn next_message(read: &mut WsRead) -> Result<ServerMessage, Error> {
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => return ServerMessage::decode(&text),
            Some(Ok(Message::Close(frame))) => {
                let reason = close_reason(frame.as_ref());
                if reason.is_auth_failure() {
                    return Err(Error::Authentication {
                        message: reason.reason,
                    });
                }
                return Err(Error::WebSocketClosed {
                    code: reason.code,
                    reason: reason.reason,
                });
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
            None => {
                return Err(Error::WebSocketClosed {
                    code: 1006,
                    reason: "stream ended during handshake".into(),
                });
            }
        }
    }
}

fn close_reason(frame: Option<&CloseFrame>) -> CloseReason {
    frame.map_or_else(
        || CloseReason::abnormal("closed without a close frame"),
        |cf| CloseReason {
            code: u16::from(cf.code),
            reason: cf.reason.as_str().to_owned(),
        },
    )
}

// ── ObsSession ───────────────────────────────────────────────────────

/// A live, identified obs-websocket session.
pub struct ObsSession {
    outgoing: mpsc::Sender<String>,
    pending: Arc<PendingRequests>,
    event_tx: broadcast::Sender<Arc<ObsEvent>>,
    closed_rx: watch::Receiver<Option<CloseReason>>,
    cancel: CancellationToken,
}

impl ObsSession {
    fn spawn(write: WsWrite, read: WsRead) -> Self {
        let (outgoing, outgoing_rx) = mpsc::channel(OUTGOING_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (closed_tx, closed_rx) = watch::channel(None);
        let pending = Arc::new(PendingRequests::new());
        let cancel = CancellationToken::new();

        tokio::spawn(write_loop(write, outgoing_rx, cancel.clone()));
        tokio::spawn(read_loop(
            read,
            Arc::clone(&pending),
            event_tx.clone(),
            closed_tx,
            cancel.clone(),
        ));

        Self {
            outgoing,
            pending,
            event_tx,
            closed_rx,
            cancel,
        }
    }

    fn closed_error(&self) -> Option<Error> {
        self.closed_rx.borrow().as_ref().map(|r| Error::WebSocketClosed {
            code: r.code,
            reason: r.reason.clone(),
        })
    }
}

#[async_trait]
impl Session for ObsSession {
    async fn request(
        &self,
        request_type: &str,
        request_data: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, Error> {
        if let Some(err) = self.closed_error() {
            return Err(err);
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let reply = self.pending.register(&request_id);

        // The reader may have failed everything between the check above and
        // the registration; re-check so this request cannot hang.
        if let Some(err) = self.closed_error() {
            return Err(err);
        }

        let frame = ClientMessage::Request(Request {
            request_type: request_type.to_owned(),
            request_id: request_id.clone(),
            request_data,
        })
        .encode();

        tracing::trace!(request_type, %request_id, "Sending request");
        if self.outgoing.send(frame).await.is_err() {
            return Err(Error::SessionClosed);
        }

        reply.reply().await.map_err(|_| Error::SessionClosed)?
    }

    fn events(&self) -> broadcast::Receiver<Arc<ObsEvent>> {
        self.event_tx.subscribe()
    }

    async fn closed(&self) -> CloseReason {
        let mut rx = self.closed_rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(reason) => reason
                .clone()
                .unwrap_or_else(|| CloseReason::abnormal("session ended")),
            Err(_) => CloseReason::abnormal("session task dropped"),
        }
    }

    async fn close(&self) {
        self.cancel.cancel();
    }

    fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for ObsSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn write_loop(mut write: WsWrite, mut outgoing: mpsc::Receiver<String>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            frame = outgoing.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = write.send(Message::text(frame)).await {
                    tracing::warn!(error = %e, "obs-websocket write failed");
                    break;
                }
            }
        }
    }
    tracing::debug!("obs-websocket writer exiting");
}

async fn read_loop(
    mut read: WsRead,
    pending: Arc<PendingRequests>,
    event_tx: broadcast::Sender<Arc<ObsEvent>>,
    closed_tx: watch::Sender<Option<CloseReason>>,
    cancel: CancellationToken,
) {
    let reason = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break CloseReason { code: 1000, reason: "closed by client".into() },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match ServerMessage::decode(&text) {
                    Ok(ServerMessage::Event(event)) => {
                        tracing::trace!(event_type = %event.event_type, "Event");
                        // No subscribers is fine
                        let _ = event_tx.send(Arc::new(event));
                    }
                    Ok(ServerMessage::RequestResponse(resp)) => {
                        let id = resp.request_id.clone();
                        if !pending.resolve(&id, resp.into_result()) {
                            tracing::debug!(request_id = %id, "Response for unknown request");
                        }
                    }
                    Ok(other) => tracing::trace!(?other, "Ignoring frame"),
                    Err(e) => tracing::debug!(error = %e, "Failed to decode frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = close_reason(frame.as_ref());
                    tracing::info!(code = reason.code, reason = %reason.reason, "obs-websocket close frame received");
                    break reason;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break CloseReason::abnormal(e.to_string()),
                None => break CloseReason::abnormal("stream ended"),
            }
        }
    };

    pending.fail_all(&Error::WebSocketClosed {
        code: reason.code,
        reason: reason.reason.clone(),
    });
    let _ = closed_tx.send(Some(reason));
    cancel.cancel();
}
