// In-memory stand-in for OBS behind the `Connector`/`Session` seam.
#![allow(clippy::unwrap_used, dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cuecast_api::{CloseReason, ConnectTarget, Connector, Error, ObsEvent, Session};
use cuecast_core::{ClientConfig, ConnectionClient};
use serde_json::{Value, json};
use tokio::sync::{broadcast, watch};
use url::Url;

// ── Remote state ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ObsState {
    pub scenes: Vec<String>,
    pub program_scene: String,
    pub inputs: Vec<(String, String)>,
    pub streaming: bool,
    pub recording: bool,
}

impl Default for ObsState {
    fn default() -> Self {
        Self {
            scenes: vec!["Main".into(), "BRB".into()],
            program_scene: "Main".into(),
            inputs: vec![("Mic".into(), "wasapi_input_capture".into())],
            streaming: false,
            recording: false,
        }
    }
}

/// Shared between the connector and every session it opens.
#[derive(Default)]
struct Shared {
    state: Mutex<ObsState>,
    requests: Mutex<Vec<(String, Option<Value>)>>,
    failing: Mutex<HashSet<String>>,
}

impl Shared {
    fn handle(&self, request_type: &str, data: Option<Value>) -> Result<Value, Error> {
        self.requests
            .lock()
            .unwrap()
            .push((request_type.to_owned(), data.clone()));

        if self.failing.lock().unwrap().contains(request_type) {
            return Err(Error::RequestFailed {
                request_type: request_type.to_owned(),
                code: 600,
                comment: Some("Injected failure".into()),
            });
        }

        let data = data.unwrap_or(Value::Null);
        let field = |key: &str| data.get(key).and_then(Value::as_str).unwrap_or_default().to_owned();
        let mut state = self.state.lock().unwrap();
        let reply = match request_type {
            "GetSceneList" => json!({
                "currentProgramSceneName": state.program_scene,
                "scenes": state.scenes.iter().map(|s| json!({ "sceneName": s })).collect::<Vec<_>>(),
            }),
            "GetCurrentProgramScene" => json!({ "currentProgramSceneName": state.program_scene }),
            "GetCurrentPreviewScene" => {
                return Err(Error::RequestFailed {
                    request_type: request_type.to_owned(),
                    code: 506,
                    comment: Some("Studio mode is not active.".into()),
                });
            }
            "GetInputList" => json!({
                "inputs": state
                    .inputs
                    .iter()
                    .map(|(name, kind)| json!({ "inputName": name, "inputKind": kind }))
                    .collect::<Vec<_>>(),
            }),
            "GetStreamStatus" => json!({ "outputActive": state.streaming }),
            "GetRecordStatus" => json!({ "outputActive": state.recording }),
            "GetVirtualCamStatus" | "GetReplayBufferStatus" => json!({ "outputActive": false }),
            "GetVideoSettings" => json!({
                "baseWidth": 1920, "baseHeight": 1080,
                "outputWidth": 1280, "outputHeight": 720,
                "fpsNumerator": 60, "fpsDenominator": 1,
            }),
            "CreateScene" => {
                state.scenes.push(field("sceneName"));
                json!({})
            }
            "RemoveScene" => {
                let name = field("sceneName");
                state.scenes.retain(|s| *s != name);
                json!({})
            }
            "CreateInput" => {
                state.inputs.push((field("inputName"), field("inputKind")));
                json!({ "sceneItemId": 7 })
            }
            "RemoveInput" => {
                let name = field("inputName");
                state.inputs.retain(|(n, _)| *n != name);
                json!({})
            }
            "SetCurrentProgramScene" => {
                state.program_scene = field("sceneName");
                json!({})
            }
            "GetSceneItemId" => json!({ "sceneItemId": 7 }),
            "StartStream" => {
                state.streaming = true;
                json!({})
            }
            "StopStream" => {
                state.streaming = false;
                json!({})
            }
            _ => json!({}),
        };
        Ok(reply)
    }
}

// ── Session ─────────────────────────────────────────────────────────

pub struct FakeSession {
    shared: Arc<Shared>,
    events: broadcast::Sender<Arc<ObsEvent>>,
    closed: watch::Sender<Option<CloseReason>>,
}

impl FakeSession {
    fn new(shared: Arc<Shared>) -> Self {
        let (events, _) = broadcast::channel(256);
        let (closed, _) = watch::channel(None);
        Self {
            shared,
            events,
            closed,
        }
    }

    pub fn emit(&self, event_type: &str, data: Value) {
        let _ = self.events.send(Arc::new(ObsEvent::new(event_type, data)));
    }

    pub fn kill(&self, code: u16, reason: &str) {
        self.closed.send_replace(Some(CloseReason {
            code,
            reason: reason.to_owned(),
        }));
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn request(&self, request_type: &str, request_data: Option<Value>) -> Result<Value, Error> {
        if self.closed.borrow().is_some() {
            return Err(Error::SessionClosed);
        }
        self.shared.handle(request_type, request_data)
    }

    fn events(&self) -> broadcast::Receiver<Arc<ObsEvent>> {
        self.events.subscribe()
    }

    async fn closed(&self) -> CloseReason {
        let mut rx = self.closed.subscribe();
        let reason = rx.wait_for(Option::is_some).await.unwrap().clone();
        reason.unwrap()
    }

    async fn close(&self) {
        self.kill(1000, "client closed");
    }
}

// ── Connector ───────────────────────────────────────────────────────

/// Scriptable connector: queue failures for upcoming attempts, or fail
/// every attempt.
#[derive(Default)]
pub struct FakeObs {
    shared: Arc<Shared>,
    connects: AtomicUsize,
    failures: Mutex<VecDeque<Error>>,
    always_fail: AtomicBool,
    connect_delay: Mutex<Duration>,
    current: Mutex<Option<Arc<FakeSession>>>,
}

impl FakeObs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, err: Error) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn fail_always(&self) {
        self.always_fail.store(true, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = delay;
    }

    /// Make every future request of this type fail remotely.
    pub fn fail_request(&self, request_type: &str) {
        self.shared
            .failing
            .lock()
            .unwrap()
            .insert(request_type.to_owned());
    }

    pub fn state(&self) -> ObsState {
        self.shared.state.lock().unwrap().clone()
    }

    pub fn set_state(&self, state: ObsState) {
        *self.shared.state.lock().unwrap() = state;
    }

    /// Request types received so far, across sessions.
    pub fn requests(&self) -> Vec<String> {
        self.shared
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Requests excluding the read-only `Get*` queries.
    pub fn writes(&self) -> Vec<(String, Option<Value>)> {
        self.shared
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| !t.starts_with("Get"))
            .cloned()
            .collect()
    }

    pub fn session(&self) -> Arc<FakeSession> {
        self.current.lock().unwrap().clone().unwrap()
    }
}

#[async_trait]
impl Connector for FakeObs {
    async fn connect(&self, _target: &ConnectTarget) -> Result<Arc<dyn Session>, Error> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.always_fail.load(Ordering::SeqCst) {
            return Err(Error::WebSocketConnect("connection refused".into()));
        }
        let scripted = self.failures.lock().unwrap().pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }
        let session = Arc::new(FakeSession::new(Arc::clone(&self.shared)));
        *self.current.lock().unwrap() = Some(Arc::clone(&session));
        Ok(session)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

pub fn config() -> ClientConfig {
    ClientConfig::new(Url::parse("ws://127.0.0.1:4455").unwrap())
}

pub fn client(fake: &Arc<FakeObs>) -> ConnectionClient {
    ConnectionClient::with_connector(config(), Arc::clone(fake) as Arc<dyn Connector>)
}

pub fn client_with(fake: &Arc<FakeObs>, config: ClientConfig) -> ConnectionClient {
    ConnectionClient::with_connector(config, Arc::clone(fake) as Arc<dyn Connector>)
}
