// ── Remote state snapshot ──

use serde::{Deserialize, Serialize};

/// One input (source) as reported by `GetInputList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputInfo {
    #[serde(rename = "inputName")]
    pub name: String,
    #[serde(rename = "inputKind", default)]
    pub kind: String,
}

impl InputInfo {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Canvas and output resolution plus frame rate, as `GetVideoSettings`
/// reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSettings {
    pub base_width: u32,
    pub base_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub fps_numerator: u32,
    pub fps_denominator: u32,
}

/// Last-known remote state.
///
/// Built by the connection client from (cached) queries; read-only to the
/// validator, executor and rule engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub current_program_scene: Option<String>,
    pub current_preview_scene: Option<String>,
    pub scenes: Vec<String>,
    pub inputs: Vec<InputInfo>,
    pub streaming: bool,
    pub recording: bool,
    pub virtual_cam: bool,
    pub replay_buffer: bool,
    pub video: Option<VideoSettings>,
}

impl StateSnapshot {
    pub fn has_scene(&self, name: &str) -> bool {
        self.scenes.iter().any(|s| s == name)
    }

    pub fn input(&self, name: &str) -> Option<&InputInfo> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.input(name).is_some()
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|i| i.name.clone()).collect()
    }

    /// Whether a scene or an input answers to `name`. Screenshots and scene
    /// items accept either.
    pub fn has_source(&self, name: &str) -> bool {
        self.has_scene(name) || self.has_input(name)
    }
}
