// ── Action validation ──
//
// Checks a proposed action against the last-known remote state before it
// is ever sent. Pure functions of (action, snapshot): no I/O, no clock.

use std::fmt;

use serde::Serialize;

use crate::model::{Action, ActionDescriptor, Output, SceneItemRef, StateSnapshot};

/// Input kinds the validator accepts for `CreateInput`.
pub const VALID_INPUT_KINDS: &[&str] = &[
    "browser_source",
    "image_source",
    "color_source",
    "text_gdiplus_v2",
    "ffmpeg_source",
    "vlc_source",
    "wasapi_input_capture",
    "wasapi_output_capture",
    "dshow_input",
    "game_capture",
    "window_capture",
    "monitor_capture",
];

/// Screenshot formats the validator accepts.
pub const IMAGE_FORMATS: &[&str] = &["png", "jpg", "jpeg"];

const MIN_VOLUME_DB: f64 = -100.0;
const MAX_VOLUME_DB: f64 = 0.0;
const MAX_VOLUME_MUL: f64 = 20.0;

// ── Result types ─────────────────────────────────────────────────────

/// A correction offered alongside a validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Suggestion {
    /// An existing name close to the one given.
    ClosestMatch(String),
    /// The remote is already in the requested state.
    NoActionNeeded,
    /// Free-form guidance.
    Hint(String),
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClosestMatch(name) => write!(f, "Did you mean \"{name}\"?"),
            Self::NoActionNeeded => f.write_str("No action needed"),
            Self::Hint(hint) => f.write_str(hint),
        }
    }
}

/// What is wrong with an action, plus an optional fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub message: String,
    pub suggestion: Option<Suggestion>,
}

impl ValidationIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn missing(param: &str) -> Self {
        Self::new(format!("Missing {param} parameter"))
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestion = Some(suggestion);
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suggestion {
            Some(s) => write!(f, "{} ({s})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Outcome of validating one action.
///
/// A no-op is its own kind so callers can tell "impossible" from "already
/// done"; both are not valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(ValidationIssue),
    Redundant(ValidationIssue),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn is_redundant(&self) -> bool {
        matches!(self, Self::Redundant(_))
    }

    pub fn issue(&self) -> Option<&ValidationIssue> {
        match self {
            Self::Valid => None,
            Self::Invalid(issue) | Self::Redundant(issue) => Some(issue),
        }
    }

    fn redundant(message: impl Into<String>) -> Self {
        Self::Redundant(
            ValidationIssue::new(message).with_suggestion(Suggestion::NoActionNeeded),
        )
    }
}

impl From<Result<(), ValidationIssue>> for ValidationResult {
    fn from(r: Result<(), ValidationIssue>) -> Self {
        match r {
            Ok(()) => Self::Valid,
            Err(issue) => Self::Invalid(issue),
        }
    }
}

/// One failing action inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchError {
    /// Position in the submitted order.
    pub index: usize,
    pub label: String,
    pub issue: ValidationIssue,
    pub redundant: bool,
}

/// A non-fatal observation about a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchWarning {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchValidation {
    pub errors: Vec<BatchError>,
    pub warnings: Vec<BatchWarning>,
}

impl BatchValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Every error is a no-op; nothing impossible was asked for.
    pub fn only_redundant(&self) -> bool {
        self.errors.iter().all(|e| e.redundant)
    }

    /// One line per error, for logs and error messages.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.label, e.issue))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ── Single-action validation ─────────────────────────────────────────

/// Parse and validate a raw descriptor.
pub fn validate_descriptor(
    descriptor: &ActionDescriptor,
    snapshot: &StateSnapshot,
) -> ValidationResult {
    match Action::parse(descriptor) {
        Ok(action) => validate(&action, snapshot),
        Err(issue) => ValidationResult::Invalid(issue),
    }
}

/// Validate one typed action against `snapshot`.
pub fn validate(action: &Action, snapshot: &StateSnapshot) -> ValidationResult {
    match action {
        Action::CreateScene { scene_name } => {
            if snapshot.has_source(scene_name) {
                return ValidationResult::Invalid(
                    ValidationIssue::new(format!("Scene \"{scene_name}\" already exists"))
                        .with_suggestion(Suggestion::Hint("Use a different scene name".into())),
                );
            }
            ValidationResult::Valid
        }
        Action::RemoveScene { scene_name } => {
            if let Err(issue) = require_scene(scene_name, snapshot) {
                return ValidationResult::Invalid(issue);
            }
            if snapshot.scenes.len() <= 1 {
                return ValidationResult::Invalid(
                    ValidationIssue::new(format!(
                        "Cannot remove \"{scene_name}\": it is the last remaining scene"
                    ))
                    .with_suggestion(Suggestion::Hint("Create another scene first".into())),
                );
            }
            ValidationResult::Valid
        }
        Action::CreateInput {
            scene_name,
            input_name,
            input_kind,
            input_settings,
            ..
        } => validate_create_input(scene_name, input_name, input_kind, input_settings.as_ref(), snapshot)
            .into(),
        Action::RemoveInput { input_name } => {
            if snapshot.has_input(input_name) {
                return ValidationResult::Valid;
            }
            let suggestion = closest_match(input_name, &snapshot.input_names()).map_or_else(
                || Suggestion::Hint("Cannot remove non-existent source".into()),
                Suggestion::ClosestMatch,
            );
            ValidationResult::Invalid(
                ValidationIssue::new(format!("Source \"{input_name}\" not found"))
                    .with_suggestion(suggestion),
            )
        }
        Action::SetInputSettings { input_name, .. } | Action::SetInputMute { input_name, .. } => {
            require_input(input_name, snapshot).into()
        }
        Action::SetInputVolume {
            input_name,
            volume_db,
            volume_mul,
        } => require_input(input_name, snapshot)
            .and_then(|()| check_volume(*volume_db, *volume_mul))
            .into(),
        Action::SetSceneItemEnabled {
            scene_name, item, ..
        }
        | Action::SetSceneItemTransform {
            scene_name, item, ..
        } => require_scene(scene_name, snapshot)
            .and_then(|()| match item {
                SceneItemRef::Id(_) => Ok(()),
                SceneItemRef::Source(source) => require_source(source, snapshot),
            })
            .into(),
        Action::SetProgramScene { scene_name } => {
            if let Err(issue) = require_scene(scene_name, snapshot) {
                return ValidationResult::Invalid(issue);
            }
            if snapshot.current_program_scene.as_deref() == Some(scene_name.as_str()) {
                return ValidationResult::redundant(format!("Already on scene \"{scene_name}\""));
            }
            ValidationResult::Valid
        }
        Action::SetPreviewScene { scene_name } => require_scene(scene_name, snapshot).into(),
        Action::StartOutput(output) => {
            if output.is_active(snapshot) {
                return ValidationResult::redundant(format!("{} is already active", output.noun()));
            }
            ValidationResult::Valid
        }
        Action::StopOutput(output) => {
            if output.is_active(snapshot) {
                ValidationResult::Valid
            } else {
                ValidationResult::redundant(format!("{} is not active", output.noun()))
            }
        }
        Action::SaveReplayBuffer => {
            if Output::ReplayBuffer.is_active(snapshot) {
                ValidationResult::Valid
            } else {
                ValidationResult::Invalid(
                    ValidationIssue::new("Replay buffer is not active")
                        .with_suggestion(Suggestion::Hint("Start the replay buffer first".into())),
                )
            }
        }
        Action::GetSourceScreenshot {
            source_name,
            image_format,
            ..
        } => require_source(source_name, snapshot)
            .and_then(|()| check_image_format(image_format))
            .into(),
        Action::SetVideoSettings {
            base_width,
            base_height,
            output_width,
            output_height,
            fps_numerator,
            fps_denominator,
        } => check_video_settings(&[
            ("baseWidth", *base_width, "baseHeight", *base_height),
            ("outputWidth", *output_width, "outputHeight", *output_height),
            ("fpsNumerator", *fps_numerator, "fpsDenominator", *fps_denominator),
        ])
        .into(),
    }
}

fn validate_create_input(
    scene_name: &str,
    input_name: &str,
    input_kind: &str,
    input_settings: Option<&serde_json::Map<String, serde_json::Value>>,
    snapshot: &StateSnapshot,
) -> Result<(), ValidationIssue> {
    require_scene(scene_name, snapshot)?;

    if snapshot.has_source(input_name) {
        return Err(
            ValidationIssue::new(format!("Source \"{input_name}\" already exists")).with_suggestion(
                Suggestion::Hint("Use a different name or remove existing source first".into()),
            ),
        );
    }

    if !VALID_INPUT_KINDS.contains(&input_kind) {
        return Err(
            ValidationIssue::new(format!("Unknown input kind: {input_kind}")).with_suggestion(
                Suggestion::Hint(format!("Common types: {}, ...", VALID_INPUT_KINDS[..5].join(", "))),
            ),
        );
    }

    if input_kind == "browser_source" {
        if let Some(settings) = input_settings {
            if !settings.get("url").is_some_and(|u| u.as_str().is_some_and(|s| !s.is_empty())) {
                return Err(
                    ValidationIssue::new("browser_source requires url in inputSettings")
                        .with_suggestion(Suggestion::Hint(
                            "Add inputSettings: { url: \"https://...\" }".into(),
                        )),
                );
            }
        }
    }

    Ok(())
}

fn require_scene(scene_name: &str, snapshot: &StateSnapshot) -> Result<(), ValidationIssue> {
    if snapshot.has_scene(scene_name) {
        return Ok(());
    }
    let suggestion = closest_match(scene_name, &snapshot.scenes).map_or_else(
        || Suggestion::Hint(format!("Available: {}", snapshot.scenes.join(", "))),
        Suggestion::ClosestMatch,
    );
    Err(ValidationIssue::new(format!("Scene \"{scene_name}\" not found")).with_suggestion(suggestion))
}

fn require_input(input_name: &str, snapshot: &StateSnapshot) -> Result<(), ValidationIssue> {
    if snapshot.has_input(input_name) {
        return Ok(());
    }
    let issue = ValidationIssue::new(format!("Source \"{input_name}\" not found"));
    Err(match closest_match(input_name, &snapshot.input_names()) {
        Some(name) => issue.with_suggestion(Suggestion::ClosestMatch(name)),
        None => issue,
    })
}

/// Scene or input, for requests that accept either.
fn require_source(source_name: &str, snapshot: &StateSnapshot) -> Result<(), ValidationIssue> {
    if snapshot.has_source(source_name) {
        return Ok(());
    }
    let mut names = snapshot.scenes.clone();
    names.extend(snapshot.input_names());
    let issue = ValidationIssue::new(format!("Source \"{source_name}\" not found"));
    Err(match closest_match(source_name, &names) {
        Some(name) => issue.with_suggestion(Suggestion::ClosestMatch(name)),
        None => issue,
    })
}

fn check_volume(volume_db: Option<f64>, volume_mul: Option<f64>) -> Result<(), ValidationIssue> {
    if let Some(db) = volume_db {
        if !(MIN_VOLUME_DB..=MAX_VOLUME_DB).contains(&db) {
            return Err(ValidationIssue::new(format!("Invalid volume: {db}dB")).with_suggestion(
                Suggestion::Hint("Volume should be between -100dB and 0dB".into()),
            ));
        }
    }
    if let Some(mul) = volume_mul {
        if !(0.0..=MAX_VOLUME_MUL).contains(&mul) {
            return Err(ValidationIssue::new(format!("Invalid volume multiplier: {mul}"))
                .with_suggestion(Suggestion::Hint(
                    "inputVolumeMul should be between 0.0 and 20.0".into(),
                )));
        }
    }
    Ok(())
}

fn check_image_format(format: &str) -> Result<(), ValidationIssue> {
    if IMAGE_FORMATS.contains(&format.to_lowercase().as_str()) {
        return Ok(());
    }
    Err(
        ValidationIssue::new(format!("Invalid image format: {format}")).with_suggestion(
            Suggestion::Hint(format!("Use one of: {}", IMAGE_FORMATS.join(", "))),
        ),
    )
}

/// Every given dimension must be positive, and each pair must be given
/// together.
fn check_video_settings(
    pairs: &[(&str, Option<u32>, &str, Option<u32>)],
) -> Result<(), ValidationIssue> {
    if pairs.iter().all(|(_, a, _, b)| a.is_none() && b.is_none()) {
        return Err(ValidationIssue::new("SetVideoSettings needs at least one setting")
            .with_suggestion(Suggestion::Hint(
                "Provide baseWidth/baseHeight, outputWidth/outputHeight or fpsNumerator/fpsDenominator"
                    .into(),
            )));
    }
    for (name_a, a, name_b, b) in pairs {
        match (a, b) {
            (Some(0), _) => return Err(ValidationIssue::new(format!("{name_a} must be positive"))),
            (_, Some(0)) => return Err(ValidationIssue::new(format!("{name_b} must be positive"))),
            (Some(_), None) | (None, Some(_)) => {
                return Err(ValidationIssue::new(format!(
                    "{name_a} and {name_b} must be provided together"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

// ── Batch validation ─────────────────────────────────────────────────

/// Validate a batch.
///
/// Actions are checked in execution (phase) order against a projection of
/// the snapshot that includes the effects of earlier actions, so a scene
/// created in the batch can be switched to later in the same batch.
/// Conflicts are reported as warnings only.
pub fn validate_batch(actions: &[Action], snapshot: &StateSnapshot) -> BatchValidation {
    let mut report = BatchValidation {
        errors: Vec::new(),
        warnings: detect_conflicts(actions),
    };

    let mut order: Vec<usize> = (0..actions.len()).collect();
    order.sort_by_key(|&i| actions[i].phase());

    let mut projected = snapshot.clone();
    for index in order {
        let action = &actions[index];
        match validate(action, &projected) {
            ValidationResult::Valid => {}
            ValidationResult::Invalid(issue) => report.errors.push(BatchError {
                index,
                label: action.label(),
                issue,
                redundant: false,
            }),
            ValidationResult::Redundant(issue) => report.errors.push(BatchError {
                index,
                label: action.label(),
                issue,
                redundant: true,
            }),
        }
        project(action, &mut projected);
    }

    report.errors.sort_by_key(|e| e.index);
    report
}

/// Apply the expected effect of `action` to `snapshot`.
fn project(action: &Action, snapshot: &mut StateSnapshot) {
    match action {
        Action::CreateScene { scene_name } => {
            if !snapshot.has_scene(scene_name) {
                snapshot.scenes.push(scene_name.clone());
            }
        }
        Action::RemoveScene { scene_name } => snapshot.scenes.retain(|s| s != scene_name),
        Action::CreateInput {
            input_name,
            input_kind,
            ..
        } => {
            if !snapshot.has_input(input_name) {
                snapshot
                    .inputs
                    .push(crate::model::InputInfo::new(input_name, input_kind));
            }
        }
        Action::RemoveInput { input_name } => snapshot.inputs.retain(|i| &i.name != input_name),
        Action::SetProgramScene { scene_name } => {
            snapshot.current_program_scene = Some(scene_name.clone());
        }
        Action::SetPreviewScene { scene_name } => {
            snapshot.current_preview_scene = Some(scene_name.clone());
        }
        Action::StartOutput(output) | Action::StopOutput(output) => {
            let on = matches!(action, Action::StartOutput(_));
            match output {
                Output::Stream => snapshot.streaming = on,
                Output::Record => snapshot.recording = on,
                Output::VirtualCam => snapshot.virtual_cam = on,
                Output::ReplayBuffer => snapshot.replay_buffer = on,
            }
        }
        Action::SetInputSettings { .. }
        | Action::SetInputVolume { .. }
        | Action::SetInputMute { .. }
        | Action::SetSceneItemEnabled { .. }
        | Action::SetSceneItemTransform { .. }
        | Action::SaveReplayBuffer
        | Action::GetSourceScreenshot { .. }
        | Action::SetVideoSettings { .. } => {}
    }
}

fn detect_conflicts(actions: &[Action]) -> Vec<BatchWarning> {
    let mut warnings = Vec::new();

    for output in [
        Output::Stream,
        Output::Record,
        Output::VirtualCam,
        Output::ReplayBuffer,
    ] {
        let start = actions
            .iter()
            .position(|a| *a == Action::StartOutput(output));
        let stop = actions.iter().position(|a| *a == Action::StopOutput(output));
        if let (Some(start), Some(stop)) = (start, stop) {
            let first = output.as_ref();
            warnings.push(BatchWarning {
                index: start.max(stop),
                message: format!(
                    "Conflicting actions: Start{first} and Stop{first} in same batch"
                ),
            });
        }
    }

    let switches: Vec<usize> = actions
        .iter()
        .enumerate()
        .filter(|(_, a)| matches!(a, Action::SetProgramScene { .. }))
        .map(|(i, _)| i)
        .collect();
    if let Some(&last) = switches.last() {
        if switches.len() > 1 {
            warnings.push(BatchWarning {
                index: last,
                message: format!(
                    "Multiple scene changes detected ({}). Only the last will take effect.",
                    switches.len()
                ),
            });
        }
    }

    let mut overlap = Vec::new();
    for action in actions {
        let removed = match action {
            Action::CreateInput { input_name, .. } => actions.iter().any(
                |a| matches!(a, Action::RemoveInput { input_name: n } if n == input_name),
            ),
            Action::CreateScene { scene_name } => actions.iter().any(
                |a| matches!(a, Action::RemoveScene { scene_name: n } if n == scene_name),
            ),
            _ => false,
        };
        if removed {
            if let Some(name) = action.subject() {
                overlap.push(name.to_owned());
            }
        }
    }
    if !overlap.is_empty() {
        warnings.push(BatchWarning {
            index: 0,
            message: format!(
                "Resources both created and removed in same batch: {}",
                overlap.join(", ")
            ),
        });
    }

    warnings
}

// ── Fuzzy matching ───────────────────────────────────────────────────

/// Closest existing name to `target`: case-insensitive exact match, then
/// the first option containing `target`, then the smallest edit distance
/// if it is within `max(3, len/2)`.
pub fn closest_match(target: &str, options: &[String]) -> Option<String> {
    if options.is_empty() || target.is_empty() {
        return None;
    }
    let needle = target.to_lowercase();

    if let Some(exact) = options.iter().find(|o| o.to_lowercase() == needle) {
        return Some(exact.clone());
    }
    if let Some(contains) = options.iter().find(|o| o.to_lowercase().contains(&needle)) {
        return Some(contains.clone());
    }

    let (best, distance) = options
        .iter()
        .map(|o| (o, levenshtein(&needle, &o.to_lowercase())))
        .min_by_key(|(_, d)| *d)?;

    let len = target.chars().count();
    (distance <= 3 || distance * 2 <= len).then(|| best.clone())
}

/// Edit distance over Unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
