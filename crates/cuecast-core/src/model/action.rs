// ── Typed actions ──
//
// Callers submit loose `{type, parameters}` descriptors. Everything past the
// parse boundary works with `Action`, a closed enum matched exhaustively by
// the validator, the executor and the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::validator::{Suggestion, ValidationIssue};

// ── Descriptor ───────────────────────────────────────────────────────

/// Raw action as produced by a caller (chat layer, rules file, CLI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ActionDescriptor {
    pub fn new(action_type: impl Into<String>, parameters: Value) -> Self {
        Self {
            action_type: action_type.into(),
            parameters: match parameters {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

// ── Supporting types ─────────────────────────────────────────────────

/// The four on/off outputs OBS exposes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
pub enum Output {
    Stream,
    Record,
    VirtualCam,
    ReplayBuffer,
}

impl Output {
    fn start_request(self) -> &'static str {
        match self {
            Self::Stream => "StartStream",
            Self::Record => "StartRecord",
            Self::VirtualCam => "StartVirtualCam",
            Self::ReplayBuffer => "StartReplayBuffer",
        }
    }

    fn stop_request(self) -> &'static str {
        match self {
            Self::Stream => "StopStream",
            Self::Record => "StopRecord",
            Self::VirtualCam => "StopVirtualCam",
            Self::ReplayBuffer => "StopReplayBuffer",
        }
    }

    /// Human name used in validation messages.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Stream => "Stream",
            Self::Record => "Recording",
            Self::VirtualCam => "Virtual camera",
            Self::ReplayBuffer => "Replay buffer",
        }
    }

    pub fn is_active(self, snapshot: &crate::model::StateSnapshot) -> bool {
        match self {
            Self::Stream => snapshot.streaming,
            Self::Record => snapshot.recording,
            Self::VirtualCam => snapshot.virtual_cam,
            Self::ReplayBuffer => snapshot.replay_buffer,
        }
    }
}

/// How a scene item is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneItemRef {
    Id(i64),
    /// Resolved to an id with `GetSceneItemId` before sending.
    Source(String),
}

/// Execution bucket. Batches are stable-sorted by phase so that resources
/// exist before they are configured, configured before they are shown, and
/// removed only once everything else has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum ActionPhase {
    CreateScene,
    CreateInput,
    Configure,
    Toggle,
    Select,
    Output,
    Remove,
}

// ── Action ───────────────────────────────────────────────────────────

/// A state-changing (or state-reading) command for OBS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ActionDescriptor", into = "ActionDescriptor")]
pub enum Action {
    CreateScene {
        scene_name: String,
    },
    RemoveScene {
        scene_name: String,
    },
    CreateInput {
        scene_name: String,
        input_name: String,
        input_kind: String,
        input_settings: Option<Map<String, Value>>,
        enabled: Option<bool>,
    },
    RemoveInput {
        input_name: String,
    },
    SetInputSettings {
        input_name: String,
        input_settings: Map<String, Value>,
        overlay: Option<bool>,
    },
    SetInputVolume {
        input_name: String,
        volume_db: Option<f64>,
        volume_mul: Option<f64>,
    },
    SetInputMute {
        input_name: String,
        muted: bool,
    },
    SetSceneItemEnabled {
        scene_name: String,
        item: SceneItemRef,
        enabled: bool,
    },
    SetSceneItemTransform {
        scene_name: String,
        item: SceneItemRef,
        transform: Map<String, Value>,
    },
    SetProgramScene {
        scene_name: String,
    },
    SetPreviewScene {
        scene_name: String,
    },
    StartOutput(Output),
    StopOutput(Output),
    SaveReplayBuffer,
    GetSourceScreenshot {
        source_name: String,
        image_format: String,
        image_width: Option<u32>,
        image_height: Option<u32>,
    },
    SetVideoSettings {
        base_width: Option<u32>,
        base_height: Option<u32>,
        output_width: Option<u32>,
        output_height: Option<u32>,
        fps_numerator: Option<u32>,
        fps_denominator: Option<u32>,
    },
}

impl Action {
    /// obs-websocket request type this action sends.
    pub fn request_type(&self) -> &'static str {
        match self {
            Self::CreateScene { .. } => "CreateScene",
            Self::RemoveScene { .. } => "RemoveScene",
            Self::CreateInput { .. } => "CreateInput",
            Self::RemoveInput { .. } => "RemoveInput",
            Self::SetInputSettings { .. } => "SetInputSettings",
            Self::SetInputVolume { .. } => "SetInputVolume",
            Self::SetInputMute { .. } => "SetInputMute",
            Self::SetSceneItemEnabled { .. } => "SetSceneItemEnabled",
            Self::SetSceneItemTransform { .. } => "SetSceneItemTransform",
            Self::SetProgramScene { .. } => "SetCurrentProgramScene",
            Self::SetPreviewScene { .. } => "SetCurrentPreviewScene",
            Self::StartOutput(o) => o.start_request(),
            Self::StopOutput(o) => o.stop_request(),
            Self::SaveReplayBuffer => "SaveReplayBuffer",
            Self::GetSourceScreenshot { .. } => "GetSourceScreenshot",
            Self::SetVideoSettings { .. } => "SetVideoSettings",
        }
    }

    /// Request payload. Scene items addressed by source name carry
    /// `sceneItemName`; the dispatcher swaps it for a resolved id.
    pub fn request_data(&self) -> Option<Value> {
        let data = match self {
            Self::CreateScene { scene_name }
            | Self::RemoveScene { scene_name }
            | Self::SetProgramScene { scene_name }
            | Self::SetPreviewScene { scene_name } => json!({ "sceneName": scene_name }),
            Self::CreateInput {
                scene_name,
                input_name,
                input_kind,
                input_settings,
                enabled,
            } => {
                let mut d = json!({
                    "sceneName": scene_name,
                    "inputName": input_name,
                    "inputKind": input_kind,
                });
                insert_opt(&mut d, "inputSettings", input_settings.clone().map(Value::Object));
                insert_opt(&mut d, "sceneItemEnabled", enabled.map(Value::Bool));
                d
            }
            Self::RemoveInput { input_name } => json!({ "inputName": input_name }),
            Self::SetInputSettings {
                input_name,
                input_settings,
                overlay,
            } => {
                let mut d = json!({ "inputName": input_name, "inputSettings": input_settings });
                insert_opt(&mut d, "overlay", overlay.map(Value::Bool));
                d
            }
            Self::SetInputVolume {
                input_name,
                volume_db,
                volume_mul,
            } => {
                let mut d = json!({ "inputName": input_name });
                insert_opt(&mut d, "inputVolumeDb", volume_db.map(Value::from));
                insert_opt(&mut d, "inputVolumeMul", volume_mul.map(Value::from));
                d
            }
            Self::SetInputMute { input_name, muted } => {
                json!({ "inputName": input_name, "inputMuted": muted })
            }
            Self::SetSceneItemEnabled {
                scene_name,
                item,
                enabled,
            } => {
                let mut d = json!({ "sceneName": scene_name, "sceneItemEnabled": enabled });
                insert_item(&mut d, item);
                d
            }
            Self::SetSceneItemTransform {
                scene_name,
                item,
                transform,
            } => {
                let mut d = json!({ "sceneName": scene_name, "sceneItemTransform": transform });
                insert_item(&mut d, item);
                d
            }
            Self::StartOutput(_) | Self::StopOutput(_) | Self::SaveReplayBuffer => return None,
            Self::GetSourceScreenshot {
                source_name,
                image_format,
                image_width,
                image_height,
            } => {
                let mut d = json!({ "sourceName": source_name, "imageFormat": image_format });
                insert_opt(&mut d, "imageWidth", image_width.map(Value::from));
                insert_opt(&mut d, "imageHeight", image_height.map(Value::from));
                d
            }
            Self::SetVideoSettings {
                base_width,
                base_height,
                output_width,
                output_height,
                fps_numerator,
                fps_denominator,
            } => {
                let mut d = json!({});
                insert_opt(&mut d, "baseWidth", base_width.map(Value::from));
                insert_opt(&mut d, "baseHeight", base_height.map(Value::from));
                insert_opt(&mut d, "outputWidth", output_width.map(Value::from));
                insert_opt(&mut d, "outputHeight", output_height.map(Value::from));
                insert_opt(&mut d, "fpsNumerator", fps_numerator.map(Value::from));
                insert_opt(&mut d, "fpsDenominator", fps_denominator.map(Value::from));
                d
            }
        };
        Some(data)
    }

    /// Short human label for progress output and logs.
    pub fn label(&self) -> String {
        match self.subject() {
            Some(subject) => format!("{} \"{subject}\"", self.request_type()),
            None => self.request_type().to_owned(),
        }
    }

    /// The resource the action is about, if any.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::CreateScene { scene_name }
            | Self::RemoveScene { scene_name }
            | Self::SetProgramScene { scene_name }
            | Self::SetPreviewScene { scene_name } => Some(scene_name),
            Self::CreateInput { input_name, .. }
            | Self::RemoveInput { input_name }
            | Self::SetInputSettings { input_name, .. }
            | Self::SetInputVolume { input_name, .. }
            | Self::SetInputMute { input_name, .. } => Some(input_name),
            Self::SetSceneItemEnabled { item, .. } | Self::SetSceneItemTransform { item, .. } => {
                match item {
                    SceneItemRef::Source(name) => Some(name),
                    SceneItemRef::Id(_) => None,
                }
            }
            Self::GetSourceScreenshot { source_name, .. } => Some(source_name),
            Self::StartOutput(_)
            | Self::StopOutput(_)
            | Self::SaveReplayBuffer
            | Self::SetVideoSettings { .. } => None,
        }
    }

    pub fn phase(&self) -> ActionPhase {
        match self {
            Self::CreateScene { .. } => ActionPhase::CreateScene,
            Self::CreateInput { .. } => ActionPhase::CreateInput,
            Self::SetInputSettings { .. }
            | Self::SetInputVolume { .. }
            | Self::SetInputMute { .. }
            | Self::SetSceneItemTransform { .. }
            | Self::SetVideoSettings { .. } => ActionPhase::Configure,
            Self::SetSceneItemEnabled { .. } | Self::GetSourceScreenshot { .. } => {
                ActionPhase::Toggle
            }
            Self::SetProgramScene { .. } | Self::SetPreviewScene { .. } => ActionPhase::Select,
            Self::StartOutput(_) | Self::StopOutput(_) | Self::SaveReplayBuffer => {
                ActionPhase::Output
            }
            Self::RemoveInput { .. } | Self::RemoveScene { .. } => ActionPhase::Remove,
        }
    }

    /// Compensating action that undoes this one, given the state before the
    /// batch started. `None` when there is nothing sensible to undo.
    pub fn inverse(&self, before: &crate::model::StateSnapshot) -> Option<Action> {
        match self {
            Self::CreateScene { scene_name } => Some(Self::RemoveScene {
                scene_name: scene_name.clone(),
            }),
            Self::CreateInput { input_name, .. } => Some(Self::RemoveInput {
                input_name: input_name.clone(),
            }),
            Self::SetSceneItemEnabled {
                scene_name,
                item,
                enabled,
            } => Some(Self::SetSceneItemEnabled {
                scene_name: scene_name.clone(),
                item: item.clone(),
                enabled: !enabled,
            }),
            Self::SetProgramScene { .. } => {
                before
                    .current_program_scene
                    .clone()
                    .map(|scene_name| Self::SetProgramScene { scene_name })
            }
            Self::SetPreviewScene { .. } => {
                before
                    .current_preview_scene
                    .clone()
                    .map(|scene_name| Self::SetPreviewScene { scene_name })
            }
            Self::StartOutput(output) => Some(Self::StopOutput(*output)),
            Self::RemoveScene { .. }
            | Self::RemoveInput { .. }
            | Self::SetInputSettings { .. }
            | Self::SetInputVolume { .. }
            | Self::SetInputMute { .. }
            | Self::SetSceneItemTransform { .. }
            | Self::StopOutput(_)
            | Self::SaveReplayBuffer
            | Self::GetSourceScreenshot { .. }
            | Self::SetVideoSettings { .. } => None,
        }
    }

    /// Copy of this action with a named scene item replaced by its id.
    pub fn with_scene_item_id(&self, id: i64) -> Action {
        let mut resolved = self.clone();
        if let Self::SetSceneItemEnabled { item, .. } | Self::SetSceneItemTransform { item, .. } =
            &mut resolved
        {
            *item = SceneItemRef::Id(id);
        }
        resolved
    }

    /// Parse a raw descriptor. Missing or mistyped parameters come back as
    /// a [`ValidationIssue`] with a hint.
    pub fn parse(descriptor: &ActionDescriptor) -> Result<Action, ValidationIssue> {
        let p = Params(&descriptor.parameters);
        let action = match descriptor.action_type.as_str() {
            "CreateScene" => Self::CreateScene {
                scene_name: p.string("sceneName")?,
            },
            "RemoveScene" => Self::RemoveScene {
                scene_name: p.string("sceneName")?,
            },
            "CreateInput" => {
                if !p.has("inputName") || !p.has("inputKind") {
                    return Err(ValidationIssue::new("Missing inputName or inputKind parameter")
                        .with_suggestion(Suggestion::Hint(
                            "Both inputName and inputKind are required".into(),
                        )));
                }
                Self::CreateInput {
                    scene_name: p.string("sceneName")?,
                    input_name: p.string("inputName")?,
                    input_kind: p.string("inputKind")?,
                    input_settings: p.opt_object("inputSettings")?,
                    enabled: p.opt_bool("sceneItemEnabled")?,
                }
            }
            "RemoveInput" => Self::RemoveInput {
                input_name: p.string("inputName")?,
            },
            "SetInputSettings" => Self::SetInputSettings {
                input_name: p.string("inputName")?,
                input_settings: p.opt_object("inputSettings")?.ok_or_else(|| {
                    ValidationIssue::missing("inputSettings")
                })?,
                overlay: p.opt_bool("overlay")?,
            },
            "SetInputVolume" => {
                let input_name = p.string("inputName")?;
                let volume_db = p.opt_f64("inputVolumeDb")?;
                let volume_mul = p.opt_f64("inputVolumeMul")?;
                if volume_db.is_none() && volume_mul.is_none() {
                    return Err(ValidationIssue::new(
                        "Missing volume parameter (inputVolumeDb or inputVolumeMul)",
                    )
                    .with_suggestion(Suggestion::Hint(
                        "Use inputVolumeDb (e.g., -20.0 to 0.0) or inputVolumeMul (0.0 to 1.0)"
                            .into(),
                    )));
                }
                Self::SetInputVolume {
                    input_name,
                    volume_db,
                    volume_mul,
                }
            }
            "SetInputMute" => Self::SetInputMute {
                input_name: p.string("inputName")?,
                muted: p.bool("inputMuted", "Use true to mute, false to unmute")?,
            },
            "SetSceneItemEnabled" => Self::SetSceneItemEnabled {
                scene_name: p.string("sceneName")?,
                item: p.scene_item()?,
                enabled: p.bool("sceneItemEnabled", "Use true to show, false to hide")?,
            },
            "SetSceneItemTransform" => Self::SetSceneItemTransform {
                scene_name: p.string("sceneName")?,
                item: p.scene_item()?,
                transform: p
                    .opt_object("sceneItemTransform")?
                    .ok_or_else(|| ValidationIssue::missing("sceneItemTransform"))?,
            },
            "SetCurrentProgramScene" => Self::SetProgramScene {
                scene_name: p.string("sceneName")?,
            },
            "SetCurrentPreviewScene" => Self::SetPreviewScene {
                scene_name: p.string("sceneName")?,
            },
            "StartStream" => Self::StartOutput(Output::Stream),
            "StopStream" => Self::StopOutput(Output::Stream),
            "StartRecord" => Self::StartOutput(Output::Record),
            "StopRecord" => Self::StopOutput(Output::Record),
            "StartVirtualCam" => Self::StartOutput(Output::VirtualCam),
            "StopVirtualCam" => Self::StopOutput(Output::VirtualCam),
            "StartReplayBuffer" => Self::StartOutput(Output::ReplayBuffer),
            "StopReplayBuffer" => Self::StopOutput(Output::ReplayBuffer),
            "SaveReplayBuffer" => Self::SaveReplayBuffer,
            "GetSourceScreenshot" => Self::GetSourceScreenshot {
                source_name: p.string("sourceName")?,
                image_format: p.opt_string("imageFormat")?.unwrap_or_else(|| "png".into()),
                image_width: p.opt_u32("imageWidth")?,
                image_height: p.opt_u32("imageHeight")?,
            },
            "SetVideoSettings" => Self::SetVideoSettings {
                base_width: p.opt_u32("baseWidth")?,
                base_height: p.opt_u32("baseHeight")?,
                output_width: p.opt_u32("outputWidth")?,
                output_height: p.opt_u32("outputHeight")?,
                fps_numerator: p.opt_u32("fpsNumerator")?,
                fps_denominator: p.opt_u32("fpsDenominator")?,
            },
            "" => return Err(ValidationIssue::new("Action type is required")),
            other => {
                return Err(
                    ValidationIssue::new(format!("Unknown action type: {other}")).with_suggestion(
                        Suggestion::Hint(
                            "Supported: scene, input, scene item, output and video requests"
                                .into(),
                        ),
                    ),
                );
            }
        };
        Ok(action)
    }
}

impl TryFrom<ActionDescriptor> for Action {
    type Error = ValidationIssue;

    fn try_from(descriptor: ActionDescriptor) -> Result<Self, Self::Error> {
        Self::parse(&descriptor)
    }
}

impl From<&Action> for ActionDescriptor {
    fn from(action: &Action) -> Self {
        ActionDescriptor::new(
            action.request_type(),
            action.request_data().unwrap_or(Value::Null),
        )
    }
}

impl From<Action> for ActionDescriptor {
    fn from(action: Action) -> Self {
        Self::from(&action)
    }
}

// ── Payload helpers ──────────────────────────────────────────────────

fn insert_opt(target: &mut Value, key: &str, value: Option<Value>) {
    if let (Some(map), Some(value)) = (target.as_object_mut(), value) {
        map.insert(key.to_owned(), value);
    }
}

fn insert_item(target: &mut Value, item: &SceneItemRef) {
    let (key, value) = match item {
        SceneItemRef::Id(id) => ("sceneItemId", Value::from(*id)),
        SceneItemRef::Source(name) => ("sceneItemName", Value::from(name.as_str())),
    };
    insert_opt(target, key, Some(value));
}

/// Typed accessors over a descriptor's parameter map.
struct Params<'a>(&'a Map<String, Value>);

impl Params<'_> {
    fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    fn string(&self, key: &str) -> Result<String, ValidationIssue> {
        self.opt_string(key)?
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ValidationIssue::missing(key))
    }

    fn opt_string(&self, key: &str) -> Result<Option<String>, ValidationIssue> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ValidationIssue::new(format!("{key} must be a string"))),
        }
    }

    fn bool(&self, key: &str, hint: &str) -> Result<bool, ValidationIssue> {
        match self.0.get(key) {
            Some(Value::Bool(b)) => Ok(*b),
            _ => Err(ValidationIssue::new(format!("{key} must be a boolean"))
                .with_suggestion(Suggestion::Hint(hint.to_owned()))),
        }
    }

    fn opt_bool(&self, key: &str) -> Result<Option<bool>, ValidationIssue> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(ValidationIssue::new(format!("{key} must be a boolean"))),
        }
    }

    fn opt_f64(&self, key: &str) -> Result<Option<f64>, ValidationIssue> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| ValidationIssue::new(format!("{key} must be a number"))),
        }
    }

    fn opt_u32(&self, key: &str) -> Result<Option<u32>, ValidationIssue> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| {
                    ValidationIssue::new(format!("{key} must be a non-negative integer"))
                }),
        }
    }

    fn opt_object(&self, key: &str) -> Result<Option<Map<String, Value>>, ValidationIssue> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(_) => Err(ValidationIssue::new(format!("{key} must be an object"))),
        }
    }

    fn scene_item(&self) -> Result<SceneItemRef, ValidationIssue> {
        if let Some(v) = self.0.get("sceneItemId").filter(|v| !v.is_null()) {
            return v
                .as_i64()
                .map(SceneItemRef::Id)
                .ok_or_else(|| ValidationIssue::new("sceneItemId must be an integer"));
        }
        for key in ["sceneItemName", "sourceName"] {
            if let Some(name) = self.opt_string(key)?.filter(|s| !s.is_empty()) {
                return Ok(SceneItemRef::Source(name));
            }
        }
        Err(
            ValidationIssue::new("Missing sceneItemId or sceneItemName parameter").with_suggestion(
                Suggestion::Hint(
                    "Provide either sceneItemId (number) or sceneItemName (string)".into(),
                ),
            ),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::StateSnapshot;

    fn parse(value: Value) -> Result<Action, ValidationIssue> {
        let descriptor: ActionDescriptor = serde_json::from_value(value).unwrap();
        Action::parse(&descriptor)
    }

    #[test]
    fn parses_create_input_with_settings() {
        let action = parse(json!({
            "type": "CreateInput",
            "parameters": {
                "sceneName": "Main",
                "inputName": "Overlay",
                "inputKind": "browser_source",
                "inputSettings": { "url": "https://example.com" }
            }
        }))
        .unwrap();

        assert_eq!(action.request_type(), "CreateInput");
        assert_eq!(action.phase(), ActionPhase::CreateInput);
        assert_eq!(
            action.request_data().unwrap()["inputSettings"]["url"],
            "https://example.com"
        );
    }

    #[test]
    fn mute_requires_boolean() {
        let issue = parse(json!({
            "type": "SetInputMute",
            "parameters": { "inputName": "Mic", "inputMuted": "yes" }
        }))
        .unwrap_err();
        assert_eq!(issue.message, "inputMuted must be a boolean");
        assert!(issue.suggestion.is_some());
    }

    #[test]
    fn scene_item_by_name_or_id() {
        let by_name = parse(json!({
            "type": "SetSceneItemEnabled",
            "parameters": { "sceneName": "Main", "sceneItemName": "Cam", "sceneItemEnabled": true }
        }))
        .unwrap();
        let by_id = parse(json!({
            "type": "SetSceneItemEnabled",
            "parameters": { "sceneName": "Main", "sceneItemId": 7, "sceneItemEnabled": true }
        }))
        .unwrap();

        assert!(matches!(
            by_name,
            Action::SetSceneItemEnabled { item: SceneItemRef::Source(ref n), .. } if n == "Cam"
        ));
        assert_eq!(by_name.with_scene_item_id(7), by_id);
        assert_eq!(by_id.request_data().unwrap()["sceneItemId"], 7);
    }

    #[test]
    fn volume_needs_one_of_db_or_mul() {
        let issue = parse(json!({
            "type": "SetInputVolume",
            "parameters": { "inputName": "Mic" }
        }))
        .unwrap_err();
        assert!(issue.message.starts_with("Missing volume parameter"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let issue = parse(json!({ "type": "Teleport" })).unwrap_err();
        assert_eq!(issue.message, "Unknown action type: Teleport");
    }

    #[test]
    fn serde_goes_through_descriptor() {
        let action = Action::SetProgramScene {
            scene_name: "BRB".into(),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({ "type": "SetCurrentProgramScene", "parameters": { "sceneName": "BRB" } })
        );
        let back: Action = serde_json::from_value(value).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn inverses() {
        let before = StateSnapshot {
            current_program_scene: Some("Main".into()),
            ..StateSnapshot::default()
        };

        let create = Action::CreateInput {
            scene_name: "Main".into(),
            input_name: "Overlay".into(),
            input_kind: "color_source".into(),
            input_settings: None,
            enabled: None,
        };
        assert_eq!(
            create.inverse(&before),
            Some(Action::RemoveInput {
                input_name: "Overlay".into()
            })
        );

        let switch = Action::SetProgramScene {
            scene_name: "BRB".into(),
        };
        assert_eq!(
            switch.inverse(&before),
            Some(Action::SetProgramScene {
                scene_name: "Main".into()
            })
        );

        assert_eq!(
            Action::StartOutput(Output::Stream).inverse(&before),
            Some(Action::StopOutput(Output::Stream))
        );
        assert_eq!(Action::StopOutput(Output::Stream).inverse(&before), None);
    }

    #[test]
    fn phases_are_ordered() {
        assert!(ActionPhase::CreateScene < ActionPhase::CreateInput);
        assert!(ActionPhase::CreateInput < ActionPhase::Configure);
        assert!(ActionPhase::Configure < ActionPhase::Toggle);
        assert!(ActionPhase::Toggle < ActionPhase::Select);
        assert!(ActionPhase::Select < ActionPhase::Output);
        assert!(ActionPhase::Output < ActionPhase::Remove);
    }
}
