// ── Connection client ──
//
// Owns the single OBS session: connect/reconnect lifecycle, request
// multiplexing, the offline call queue, the response cache and event
// fan-out. Cheaply cloneable; every clone drives the same session.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cuecast_api::{CloseReason, ConnectTarget, Connector, ObsEvent, Session, WebSocketConnector};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use secrecy::SecretString;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::model::{InputInfo, Output, StateSnapshot, VideoSettings};
use crate::store::{CacheKey, ResponseCache, StateTracker, StateWithChanges};
use crate::subscriptions::{Subscription, SubscriptionRegistry};

const EVENT_CHANNEL_SIZE: usize = 1024;
const STATE_CHANNEL_SIZE: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────

/// Why the client landed in [`ConnectionState::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// OBS rejected the password. Never retried.
    Authentication,
    /// Reconnect budget exhausted. Never retried.
    RetriesExhausted,
    /// A single attempt failed; a retry may already be armed.
    Transport,
}

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Error { kind: FailureKind, message: String },
}

impl ConnectionState {
    /// Errors that only an explicit `connect()` can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Error {
                kind: FailureKind::Authentication | FailureKind::RetriesExhausted,
                ..
            }
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Error { kind, message } => write!(f, "error ({kind}): {message}"),
        }
    }
}

// ── Internal bookkeeping ─────────────────────────────────────────

type SharedAttempt = Shared<BoxFuture<'static, Result<(), CoreError>>>;

/// A call parked while the session is down.
struct QueuedCommand {
    id: Uuid,
    method: String,
    params: Option<Value>,
    created_at: Instant,
    reply: oneshot::Sender<Result<Value, CoreError>>,
}

/// Everything that changes together with the session. Guarded by one lock
/// so state transitions, queue decisions and reconnect scheduling never
/// interleave.
#[derive(Default)]
struct Link {
    session: Option<Arc<dyn Session>>,
    /// Bumped on every attempt and on disconnect; stale tasks compare
    /// against it and back off.
    generation: u64,
    /// Where to (re)connect. `None` means no reconnection intent.
    target: Option<ConnectTarget>,
    pending_connect: Option<SharedAttempt>,
    reconnect_timer: Option<CancellationToken>,
    attempt: u32,
    queue: VecDeque<QueuedCommand>,
    /// Set while the queue replays after a connect; new calls keep queueing
    /// until it finishes so arrival order holds.
    draining: bool,
}

struct ClientInner {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
    event_tx: broadcast::Sender<Arc<ObsEvent>>,
    cache: ResponseCache,
    tracker: Mutex<StateTracker>,
    subscriptions: SubscriptionRegistry,
    link: Mutex<Link>,
}

// ── ConnectionClient ─────────────────────────────────────────────

/// Handle to the OBS connection.
///
/// Construct one per process and share clones. Does not connect until
/// [`connect()`](Self::connect) is called.
#[derive(Clone)]
pub struct ConnectionClient {
    inner: Arc<ClientInner>,
}

impl ConnectionClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, Arc::new(WebSocketConnector))
    }

    /// Build a client over a custom transport (used by tests).
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (transitions, _) = broadcast::channel(STATE_CHANNEL_SIZE);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let cache = ResponseCache::new(config.cache_ttl.clone());

        Self {
            inner: Arc::new(ClientInner {
                config,
                connector,
                state,
                transitions,
                event_tx,
                cache,
                tracker: Mutex::new(StateTracker::new()),
                subscriptions: SubscriptionRegistry::new(),
                link: Mutex::new(Link::default()),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.inner.state.borrow(), ConnectionState::Connected)
    }

    /// Latest-value view of the connection state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Every transition, in order.
    pub fn state_changes(&self) -> broadcast::Receiver<ConnectionState> {
        self.inner.transitions.subscribe()
    }

    /// Raw OBS events, after cache invalidation has run for them.
    pub fn events(&self) -> broadcast::Receiver<Arc<ObsEvent>> {
        self.inner.event_tx.subscribe()
    }

    /// Register a callback for one event name (or `"*"`). Dropping the
    /// returned guard unsubscribes.
    pub fn subscribe<F>(&self, event: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&ObsEvent) + Send + Sync + 'static,
    {
        self.inner.subscriptions.subscribe(event, handler)
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// Calls currently parked in the offline queue.
    pub async fn queued_calls(&self) -> usize {
        self.inner.link.lock().await.queue.len()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.inner.state.send_replace(next.clone());
        if prev != next {
            debug!(from = %prev, to = %next, "connection state changed");
            let _ = self.inner.transitions.send(next);
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect to the configured URL.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let config = &self.inner.config;
        self.connect_to(config.url.clone(), config.password.clone())
            .await
    }

    /// Connect to `url`. Idempotent: resolves immediately when connected,
    /// and joins the in-flight attempt when one is already running.
    pub async fn connect_to(
        &self,
        url: Url,
        password: Option<SecretString>,
    ) -> Result<(), CoreError> {
        let attempt = {
            let mut link = self.inner.link.lock().await;
            if self.is_connected() {
                return Ok(());
            }
            if let Some(pending) = &link.pending_connect {
                debug!("joining in-flight connect attempt");
                pending.clone()
            } else {
                if let Some(timer) = link.reconnect_timer.take() {
                    timer.cancel();
                }
                let mut target = ConnectTarget::new(url).with_password(password);
                target.handshake_timeout = self.inner.config.handshake_timeout;
                link.target = Some(target.clone());
                link.attempt = 0;
                self.start_attempt(&mut link, target)
            }
        };
        attempt.await
    }

    /// Arm one connect attempt and return a future every caller can share.
    /// The attempt is driven by its own task, so dropping the returned
    /// future never cancels it.
    fn start_attempt(&self, link: &mut Link, target: ConnectTarget) -> SharedAttempt {
        link.generation += 1;
        let generation = link.generation;
        self.set_state(ConnectionState::Connecting);
        info!(url = %target.url, generation, "connecting to OBS");

        let client = self.clone();
        let attempt = async move { client.run_attempt(target, generation).await }
            .boxed()
            .shared();
        link.pending_connect = Some(attempt.clone());
        tokio::spawn(attempt.clone().map(drop));
        attempt
    }

    async fn run_attempt(self, target: ConnectTarget, generation: u64) -> Result<(), CoreError> {
        let result = self.inner.connector.connect(&target).await;

        let mut link = self.inner.link.lock().await;
        if link.generation != generation {
            // disconnect() (or a newer attempt) superseded this one.
            if let Ok(session) = result {
                session.close().await;
            }
            return Err(CoreError::ManuallyClosed);
        }
        link.pending_connect = None;

        match result {
            Ok(session) => {
                link.session = Some(Arc::clone(&session));
                link.attempt = 0;
                link.draining = true;
                self.set_state(ConnectionState::Connected);
                info!(url = %target.url, "connected to OBS");

                // Subscribed here: events may arrive before the watcher runs.
                let events = session.events();
                tokio::spawn(self.clone().watch_session(Arc::clone(&session), events, generation));
                tokio::spawn(self.clone().drain_queue(session, generation));
                Ok(())
            }
            Err(e) => {
                let err = with_url(CoreError::from(e), &target.url);
                warn!(url = %target.url, error = %err, "OBS connect attempt failed");
                self.handle_failure(&mut link, &err);
                Err(err)
            }
        }
    }

    /// Route a failed attempt: terminal on bad credentials, otherwise
    /// back off and retry if allowed.
    fn handle_failure(&self, link: &mut Link, err: &CoreError) {
        if let CoreError::AuthenticationRejected { message } = err {
            link.target = None;
            self.set_state(ConnectionState::Error {
                kind: FailureKind::Authentication,
                message: message.clone(),
            });
            reject_queue(link, err);
            return;
        }

        self.set_state(ConnectionState::Error {
            kind: FailureKind::Transport,
            message: err.to_string(),
        });
        if self.inner.config.auto_reconnect && link.target.is_some() {
            self.schedule_reconnect(link);
        } else {
            reject_queue(link, err);
        }
    }

    fn schedule_reconnect(&self, link: &mut Link) {
        let policy = &self.inner.config.reconnect;
        if link.attempt >= policy.max_attempts {
            let err = CoreError::MaxReconnectAttempts {
                attempts: link.attempt,
            };
            warn!(attempts = link.attempt, "giving up on OBS reconnect");
            link.target = None;
            self.set_state(ConnectionState::Error {
                kind: FailureKind::RetriesExhausted,
                message: err.to_string(),
            });
            reject_queue(link, &err);
            return;
        }

        let delay = policy.delay(link.attempt);
        link.attempt += 1;
        self.set_state(ConnectionState::Reconnecting {
            attempt: link.attempt,
        });
        info!(
            attempt = link.attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling OBS reconnect"
        );

        let timer = CancellationToken::new();
        link.reconnect_timer = Some(timer.clone());
        let client = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = timer.cancelled() => {}
                () = tokio::time::sleep(delay) => client.reconnect_now(&timer).await,
            }
        });
    }

    async fn reconnect_now(&self, timer: &CancellationToken) {
        let mut link = self.inner.link.lock().await;
        if timer.is_cancelled() {
            return;
        }
        link.reconnect_timer = None;
        let Some(target) = link.target.clone() else {
            return;
        };
        // Driven by its own task; the outcome lands in the state machine.
        drop(self.start_attempt(&mut link, target));
    }

    /// Tear everything down and forget the target. Queued calls fail with
    /// [`CoreError::ManuallyClosed`].
    pub async fn disconnect(&self) {
        {
            let mut link = self.inner.link.lock().await;
            if let Some(timer) = link.reconnect_timer.take() {
                timer.cancel();
            }
            link.target = None;
            link.pending_connect = None;
            link.generation += 1;
            link.attempt = 0;
            link.draining = false;
            reject_queue(&mut link, &CoreError::ManuallyClosed);
            if let Some(session) = link.session.take() {
                session.close().await;
            }
            self.set_state(ConnectionState::Disconnected);
        }
        self.inner.cache.clear();
        self.inner.tracker.lock().await.reset();
        info!("disconnected from OBS");
    }

    // ── Session supervision ──────────────────────────────────────

    async fn watch_session(
        self,
        session: Arc<dyn Session>,
        mut events: broadcast::Receiver<Arc<ObsEvent>>,
        generation: u64,
    ) {
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Ok(event) => self.on_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event receiver lagged; dropping cached state");
                        self.inner.cache.clear();
                    }
                    Err(RecvError::Closed) => {
                        let reason = session.closed().await;
                        self.on_session_closed(generation, reason).await;
                        return;
                    }
                },
                reason = session.closed() => {
                    self.on_session_closed(generation, reason).await;
                    return;
                }
            }
        }
    }

    fn on_event(&self, event: Arc<ObsEvent>) {
        self.inner.cache.invalidate_for_event(&event.event_type);
        self.inner.subscriptions.dispatch(&event);
        let _ = self.inner.event_tx.send(event);
    }

    async fn on_session_closed(&self, generation: u64, reason: CloseReason) {
        let mut link = self.inner.link.lock().await;
        if link.generation != generation {
            return;
        }
        link.session = None;
        link.draining = false;
        self.inner.cache.clear();
        warn!(code = reason.code, reason = %reason.reason, "OBS connection lost");

        if reason.is_auth_failure() {
            let err = CoreError::AuthenticationRejected {
                message: reason.reason,
            };
            self.handle_failure(&mut link, &err);
            return;
        }

        if self.inner.config.auto_reconnect && link.target.is_some() {
            self.schedule_reconnect(&mut link);
        } else {
            let err = CoreError::ConnectionFailed {
                url: self.inner.config.url.to_string(),
                reason: format!("socket closed (code {}): {}", reason.code, reason.reason),
            };
            self.set_state(ConnectionState::Error {
                kind: FailureKind::Transport,
                message: err.to_string(),
            });
            reject_queue(&mut link, &err);
        }
    }

    /// Replay parked calls one by one in arrival order.
    async fn drain_queue(self, session: Arc<dyn Session>, generation: u64) {
        let call_timeout = self.inner.config.call_timeout;
        let mut sent = 0_usize;
        loop {
            let command = {
                let mut link = self.inner.link.lock().await;
                if link.generation != generation {
                    return;
                }
                let Some(command) = link.queue.pop_front() else {
                    link.draining = false;
                    break;
                };
                command
            };

            if command.reply.is_closed() {
                continue;
            }
            let waited = command.created_at.elapsed();
            if waited >= call_timeout {
                let _ = command.reply.send(Err(queue_timeout(&command.method, waited)));
                continue;
            }

            let result = self
                .send(&session, &command.method, command.params)
                .await;
            let _ = command.reply.send(result);
            sent += 1;
        }
        if sent > 0 {
            debug!(sent, "offline queue drained");
        }
    }

    // ── Calls ────────────────────────────────────────────────────

    /// Send one obs-websocket request.
    ///
    /// Connected: sent immediately, racing the response against the call
    /// timeout. Connecting or reconnecting: parked until the session is up,
    /// for at most the call timeout. Otherwise rejected.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CoreError> {
        let (id, mut reply) = {
            let mut link = self.inner.link.lock().await;
            let state = self.state();
            match state {
                ConnectionState::Connected if !link.draining => {
                    let Some(session) = link.session.clone() else {
                        return Err(CoreError::Internal("connected without a session".into()));
                    };
                    drop(link);
                    return self.send(&session, method, params).await;
                }
                ConnectionState::Connected
                | ConnectionState::Connecting
                | ConnectionState::Reconnecting { .. } => {
                    let (tx, rx) = oneshot::channel();
                    let id = Uuid::new_v4();
                    link.queue.push_back(QueuedCommand {
                        id,
                        method: method.to_owned(),
                        params,
                        created_at: Instant::now(),
                        reply: tx,
                    });
                    debug!(%id, method, queued = link.queue.len(), "call queued until connected");
                    (id, rx)
                }
                ConnectionState::Disconnected | ConnectionState::Error { .. } => {
                    return Err(CoreError::NotConnected {
                        state: state.to_string(),
                    });
                }
            }
        };

        let call_timeout = self.inner.config.call_timeout;
        match tokio::time::timeout(call_timeout, &mut reply).await {
            Ok(result) => result.unwrap_or_else(|_| Err(dropped_call())),
            Err(_) => {
                let mut link = self.inner.link.lock().await;
                if let Some(pos) = link.queue.iter().position(|c| c.id == id) {
                    link.queue.remove(pos);
                    debug!(%id, method, "queued call expired");
                    return Err(queue_timeout(method, call_timeout));
                }
                drop(link);
                // Already handed to the session; its own timeout applies.
                reply.await.unwrap_or_else(|_| Err(dropped_call()))
            }
        }
    }

    async fn send(
        &self,
        session: &Arc<dyn Session>,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, CoreError> {
        let call_timeout = self.inner.config.call_timeout;
        debug!(method, "sending OBS request");
        tokio::time::timeout(call_timeout, session.request(method, params))
            .await
            .map_err(|_| CoreError::timeout(method, call_timeout))?
            .map_err(CoreError::from)
    }

    // ── Cached queries ───────────────────────────────────────────

    async fn cached(&self, key: CacheKey, request: &str) -> Result<Value, CoreError> {
        if let Some(value) = self.inner.cache.get(key) {
            return Ok(value);
        }
        let value = self.call(request, None).await?;
        self.inner.cache.insert(key, value.clone());
        Ok(value)
    }

    /// Scene names, in the order OBS reports them.
    pub async fn scene_list(&self) -> Result<Vec<String>, CoreError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Scene {
            scene_name: String,
        }
        #[derive(Deserialize)]
        struct SceneList {
            #[serde(default)]
            scenes: Vec<Scene>,
        }

        let value = self.cached(CacheKey::SceneList, "GetSceneList").await?;
        let list: SceneList = decode("GetSceneList", value)?;
        Ok(list.scenes.into_iter().map(|s| s.scene_name).collect())
    }

    pub async fn current_program_scene(&self) -> Result<Option<String>, CoreError> {
        let value = self
            .cached(CacheKey::CurrentProgramScene, "GetCurrentProgramScene")
            .await?;
        Ok(scene_name_field(&value, "currentProgramSceneName"))
    }

    /// Preview scene, or `None` when studio mode is off.
    pub async fn current_preview_scene(&self) -> Result<Option<String>, CoreError> {
        match self
            .cached(CacheKey::CurrentPreviewScene, "GetCurrentPreviewScene")
            .await
        {
            Ok(value) => Ok(scene_name_field(&value, "currentPreviewSceneName")),
            Err(CoreError::Remote { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn inputs(&self) -> Result<Vec<InputInfo>, CoreError> {
        #[derive(Deserialize)]
        struct InputList {
            #[serde(default)]
            inputs: Vec<InputInfo>,
        }

        let value = self.cached(CacheKey::InputList, "GetInputList").await?;
        let list: InputList = decode("GetInputList", value)?;
        Ok(list.inputs)
    }

    /// Whether `output` is running. Virtual camera and replay buffer report
    /// inactive when OBS has them unavailable.
    pub async fn output_active(&self, output: Output) -> Result<bool, CoreError> {
        let (key, request) = match output {
            Output::Stream => (CacheKey::StreamStatus, "GetStreamStatus"),
            Output::Record => (CacheKey::RecordStatus, "GetRecordStatus"),
            Output::VirtualCam => (CacheKey::VirtualCamStatus, "GetVirtualCamStatus"),
            Output::ReplayBuffer => (CacheKey::ReplayBufferStatus, "GetReplayBufferStatus"),
        };
        match self.cached(key, request).await {
            Ok(value) => Ok(value
                .get("outputActive")
                .and_then(Value::as_bool)
                .unwrap_or(false)),
            Err(CoreError::Remote { .. })
                if matches!(output, Output::VirtualCam | Output::ReplayBuffer) =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn video_settings(&self) -> Result<VideoSettings, CoreError> {
        let value = self
            .cached(CacheKey::VideoSettings, "GetVideoSettings")
            .await?;
        decode("GetVideoSettings", value)
    }

    /// Assemble a full snapshot from (mostly cached) queries. Video settings
    /// are optional; everything else must succeed.
    pub async fn snapshot(&self) -> Result<StateSnapshot, CoreError> {
        let (scenes, program, preview, inputs, streaming, recording, virtual_cam, replay, video) = tokio::join!(
            self.scene_list(),
            self.current_program_scene(),
            self.current_preview_scene(),
            self.inputs(),
            self.output_active(Output::Stream),
            self.output_active(Output::Record),
            self.output_active(Output::VirtualCam),
            self.output_active(Output::ReplayBuffer),
            self.video_settings(),
        );

        Ok(StateSnapshot {
            current_program_scene: program?,
            current_preview_scene: preview?,
            scenes: scenes?,
            inputs: inputs?,
            streaming: streaming?,
            recording: recording?,
            virtual_cam: virtual_cam?,
            replay_buffer: replay?,
            video: video.ok(),
        })
    }

    /// Snapshot plus what changed since the previous call.
    pub async fn state_with_changes(&self) -> Result<StateWithChanges, CoreError> {
        let snapshot = self.snapshot().await?;
        Ok(self.inner.tracker.lock().await.observe(snapshot))
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn reject_queue(link: &mut Link, err: &CoreError) {
    if link.queue.is_empty() {
        return;
    }
    debug!(count = link.queue.len(), error = %err, "rejecting queued calls");
    for command in link.queue.drain(..) {
        let _ = command.reply.send(Err(err.clone()));
    }
}

fn queue_timeout(method: &str, waited: Duration) -> CoreError {
    CoreError::QueueTimeout {
        method: method.to_owned(),
        waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
    }
}

fn dropped_call() -> CoreError {
    CoreError::Internal("queued call dropped without a reply".into())
}

/// Fill in the URL on connection errors coming up from the transport.
fn with_url(err: CoreError, url: &Url) -> CoreError {
    match err {
        CoreError::ConnectionFailed { url: u, reason } if u.is_empty() => {
            CoreError::ConnectionFailed {
                url: url.to_string(),
                reason,
            }
        }
        other => other,
    }
}

/// Older obs-websocket builds only send the `*Name` field; newer ones add
/// `sceneName` alongside.
fn scene_name_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .or_else(|| value.get("sceneName"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn decode<T: DeserializeOwned>(request: &str, value: Value) -> Result<T, CoreError> {
    serde_json::from_value(value)
        .map_err(|e| CoreError::Internal(format!("Unexpected {request} response: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(
            ConnectionState::Error {
                kind: FailureKind::Authentication,
                message: String::new(),
            }
            .is_terminal()
        );
        assert!(
            !ConnectionState::Error {
                kind: FailureKind::Transport,
                message: String::new(),
            }
            .is_terminal()
        );
        assert!(!ConnectionState::Reconnecting { attempt: 2 }.is_terminal());
    }

    #[test]
    fn state_display() {
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 3 }.to_string(),
            "reconnecting (attempt 3)"
        );
        assert_eq!(
            ConnectionState::Error {
                kind: FailureKind::RetriesExhausted,
                message: "Gave up".into(),
            }
            .to_string(),
            "error (retries_exhausted): Gave up"
        );
    }

    #[test]
    fn scene_name_prefers_specific_field() {
        let value = serde_json::json!({
            "currentProgramSceneName": "Main",
            "sceneName": "Other"
        });
        assert_eq!(
            scene_name_field(&value, "currentProgramSceneName").as_deref(),
            Some("Main")
        );
        assert_eq!(scene_name_field(&serde_json::json!({}), "x"), None);
    }

    #[test]
    fn connection_errors_get_the_target_url() {
        let url = Url::parse("ws://127.0.0.1:4455").unwrap();
        let err = with_url(
            CoreError::ConnectionFailed {
                url: String::new(),
                reason: "refused".into(),
            },
            &url,
        );
        assert_eq!(
            err.to_string(),
            "Cannot connect to OBS at ws://127.0.0.1:4455/: refused"
        );
    }
}
