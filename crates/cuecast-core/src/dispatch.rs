// ── Action dispatch ──
//
// The capability the executor and rule engine use to carry out work:
// `ActionDispatcher` sends typed OBS actions, `AutomationTarget` runs
// Streamer.bot actions. Both are traits so tests can substitute recorders.

use async_trait::async_trait;
use cuecast_api::StreamerBotClient;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::client::ConnectionClient;
use crate::error::CoreError;
use crate::model::{Action, Output, SceneItemRef};

pub const OBS_SERVICE: &str = "OBS";
pub const STREAMERBOT_SERVICE: &str = "Streamer.bot";

/// Sends typed actions to the production tool.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Send one action; returns the response payload (`Null` when OBS
    /// returns none).
    async fn dispatch(&self, action: &Action) -> Result<Value, CoreError>;

    /// Whether a dispatch right now has a chance of reaching the remote.
    async fn is_available(&self) -> bool;
}

/// Runs actions on the automation tool.
#[async_trait]
pub trait AutomationTarget: Send + Sync {
    /// Run an action by name or id with arguments.
    async fn run_action(&self, identifier: &str, args: Map<String, Value>)
    -> Result<(), CoreError>;

    async fn is_available(&self) -> bool;
}

/// Outcome of one externally submitted action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            data,
        }
    }

    pub fn failed(message: impl Into<String>, error: &CoreError) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.to_string()),
            data: Value::Null,
        }
    }
}

/// Success line for an applied action.
pub fn describe(action: &Action) -> String {
    match action {
        Action::CreateScene { scene_name } => format!("Created scene \"{scene_name}\""),
        Action::RemoveScene { scene_name } => format!("Removed scene \"{scene_name}\""),
        Action::CreateInput {
            scene_name,
            input_name,
            input_kind,
            ..
        } => format!("Created {input_kind} \"{input_name}\" in scene \"{scene_name}\""),
        Action::RemoveInput { input_name } => format!("Removed input \"{input_name}\""),
        Action::SetInputSettings { input_name, .. } => {
            format!("Updated settings of \"{input_name}\"")
        }
        Action::SetInputVolume {
            input_name,
            volume_db,
            volume_mul,
        } => match (volume_db, volume_mul) {
            (Some(db), _) => format!("Set \"{input_name}\" volume to {db} dB"),
            (None, Some(mul)) => format!("Set \"{input_name}\" volume to {mul}x"),
            (None, None) => format!("Set \"{input_name}\" volume"),
        },
        Action::SetInputMute { input_name, muted } => {
            let verb = if *muted { "Muted" } else { "Unmuted" };
            format!("{verb} \"{input_name}\"")
        }
        Action::SetSceneItemEnabled {
            scene_name,
            item,
            enabled,
        } => {
            let verb = if *enabled { "Showed" } else { "Hid" };
            format!("{verb} {} in scene \"{scene_name}\"", item_label(item))
        }
        Action::SetSceneItemTransform {
            scene_name, item, ..
        } => format!("Transformed {} in scene \"{scene_name}\"", item_label(item)),
        Action::SetProgramScene { scene_name } => format!("Switched to scene \"{scene_name}\""),
        Action::SetPreviewScene { scene_name } => {
            format!("Previewing scene \"{scene_name}\"")
        }
        Action::StartOutput(output) => format!("{} started", output.noun()),
        Action::StopOutput(output) => format!("{} stopped", output.noun()),
        Action::SaveReplayBuffer => format!("{} saved", Output::ReplayBuffer.noun()),
        Action::GetSourceScreenshot { source_name, .. } => {
            format!("Captured screenshot of \"{source_name}\"")
        }
        Action::SetVideoSettings { .. } => "Updated video settings".into(),
    }
}

fn item_label(item: &SceneItemRef) -> String {
    match item {
        SceneItemRef::Id(id) => format!("item #{id}"),
        SceneItemRef::Source(name) => format!("\"{name}\""),
    }
}

// ── OBS ──────────────────────────────────────────────────────────

/// Dispatches through the shared [`ConnectionClient`].
#[derive(Clone)]
pub struct ObsDispatcher {
    client: ConnectionClient,
}

impl ObsDispatcher {
    pub fn new(client: ConnectionClient) -> Self {
        Self { client }
    }

    /// Scene items addressed by source name need an id first.
    async fn resolve(&self, action: &Action) -> Result<Option<Action>, CoreError> {
        let (Action::SetSceneItemEnabled {
            scene_name,
            item: SceneItemRef::Source(source_name),
            ..
        }
        | Action::SetSceneItemTransform {
            scene_name,
            item: SceneItemRef::Source(source_name),
            ..
        }) = action
        else {
            return Ok(None);
        };

        let reply = self
            .client
            .call(
                "GetSceneItemId",
                Some(json!({ "sceneName": scene_name, "sourceName": source_name })),
            )
            .await?;
        let id = reply
            .get("sceneItemId")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                CoreError::Internal(format!(
                    "GetSceneItemId returned no id for \"{source_name}\" in \"{scene_name}\""
                ))
            })?;
        debug!(scene = %scene_name, source = %source_name, id, "resolved scene item");
        Ok(Some(action.with_scene_item_id(id)))
    }
}

#[async_trait]
impl ActionDispatcher for ObsDispatcher {
    async fn dispatch(&self, action: &Action) -> Result<Value, CoreError> {
        let resolved = self.resolve(action).await?;
        let action = resolved.as_ref().unwrap_or(action);
        self.client
            .call(action.request_type(), action.request_data())
            .await
    }

    async fn is_available(&self) -> bool {
        self.client.is_connected()
    }
}

// ── Streamer.bot ─────────────────────────────────────────────────

#[async_trait]
impl AutomationTarget for StreamerBotClient {
    async fn run_action(
        &self,
        identifier: &str,
        args: Map<String, Value>,
    ) -> Result<(), CoreError> {
        self.do_action(identifier, args)
            .await
            .map_err(|e| match CoreError::from(e) {
                CoreError::ConnectionFailed { .. } => CoreError::ServiceUnavailable {
                    service: STREAMERBOT_SERVICE.into(),
                },
                other => other,
            })
    }

    async fn is_available(&self) -> bool {
        self.is_connected().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_name_the_subject() {
        assert_eq!(
            describe(&Action::SetProgramScene {
                scene_name: "BRB".into()
            }),
            "Switched to scene \"BRB\""
        );
        assert_eq!(
            describe(&Action::SetSceneItemEnabled {
                scene_name: "Main".into(),
                item: SceneItemRef::Source("Overlay".into()),
                enabled: false,
            }),
            "Hid \"Overlay\" in scene \"Main\""
        );
        assert_eq!(
            describe(&Action::StartOutput(Output::Record)),
            "Recording started"
        );
    }

    #[test]
    fn failed_result_carries_error_text() {
        let result = ActionResult::failed(
            "Could not switch scene",
            &CoreError::NotConnected {
                state: "disconnected".into(),
            },
        );
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Not connected to OBS (state: disconnected)")
        );
    }
}
