// ── Automation rules ──
//
// If-this-then-that rules as stored in the rules file: an event trigger
// with an optional payload filter, conditions over live state or the event
// payload, and the actions to run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{Action, StateSnapshot};

/// Event that arms a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub event_name: String,
    /// Fields the event payload must carry. Empty strings and nulls are
    /// wildcards.
    #[serde(default)]
    pub event_data: Map<String, Value>,
}

impl Trigger {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            event_data: Map::new(),
        }
    }

    /// Whether `payload` satisfies every non-wildcard filter field.
    pub fn matches(&self, payload: &Value) -> bool {
        self.event_data.iter().all(|(key, expected)| {
            is_wildcard(expected)
                || payload
                    .get(key)
                    .is_some_and(|actual| loose_eq(actual, expected))
        })
    }
}

fn is_wildcard(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Where a condition reads its left-hand value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConditionKind {
    /// Program or preview scene from live state.
    Scene,
    /// A source field carried by the event payload.
    Source,
    /// Output flags from live state.
    Stream,
    /// Any field of the event payload.
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    /// Case-insensitive substring on the string forms.
    Contains,
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Condition {
    pub fn new(
        kind: ConditionKind,
        field: impl Into<String>,
        operator: Operator,
        value: Value,
    ) -> Self {
        Self {
            id: None,
            kind,
            field: field.into(),
            operator,
            value,
            description: None,
        }
    }

    /// Evaluate against live state and the event payload. Unknown fields
    /// read as `null`; comparisons that cannot be made are false.
    pub fn evaluate(&self, state: &StateSnapshot, payload: &Value) -> bool {
        let actual = self.resolve(state, payload);
        apply(self.operator, &actual, &self.value)
    }

    fn resolve(&self, state: &StateSnapshot, payload: &Value) -> Value {
        match self.kind {
            ConditionKind::Scene => match self.field.as_str() {
                "currentProgramScene" => state.current_program_scene.clone().into(),
                "currentPreviewScene" => state.current_preview_scene.clone().into(),
                _ => Value::Null,
            },
            ConditionKind::Stream => match self.field.as_str() {
                "streamActive" => state.streaming.into(),
                "recordActive" => state.recording.into(),
                "virtualCamActive" => state.virtual_cam.into(),
                "replayBufferActive" => state.replay_buffer.into(),
                _ => Value::Null,
            },
            ConditionKind::Source | ConditionKind::Custom => {
                payload.get(&self.field).cloned().unwrap_or(Value::Null)
            }
        }
    }
}

fn apply(operator: Operator, actual: &Value, expected: &Value) -> bool {
    match operator {
        Operator::Equals => loose_eq(actual, expected),
        Operator::NotEquals => !loose_eq(actual, expected),
        Operator::Contains => string_form(actual)
            .to_lowercase()
            .contains(&string_form(expected).to_lowercase()),
        Operator::GreaterThan => numeric_pair(actual, expected).is_some_and(|(a, b)| a > b),
        Operator::LessThan => numeric_pair(actual, expected).is_some_and(|(a, b)| a < b),
    }
}

/// JSON equality, except that numbers compare by value (`1 == 1.0`).
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn numeric_pair(a: &Value, b: &Value) -> Option<(f64, f64)> {
    Some((as_number(a)?, as_number(b)?))
}

/// Streamer.bot action reference plus arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotActionData {
    /// Action name, or its id when it looks like a UUID.
    pub action_name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// One step of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum RuleAction {
    Obs(Action),
    #[serde(rename = "streamerbot")]
    StreamerBot(BotActionData),
}

impl RuleAction {
    pub fn label(&self) -> String {
        match self {
            Self::Obs(action) => action.label(),
            Self::StreamerBot(data) => format!("Streamer.bot \"{}\"", data.action_name),
        }
    }
}

/// A user-defined rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationRule {
    pub id: String,
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub trigger: Trigger,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub actions: Vec<RuleAction>,
    #[serde(default)]
    pub trigger_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<DateTime<Utc>>,
    /// Minimum seconds between two firings.
    #[serde(default)]
    pub cooldown: f64,
}

fn enabled_by_default() -> bool {
    true
}

impl AutomationRule {
    pub fn new(id: impl Into<String>, name: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            trigger,
            conditions: Vec::new(),
            actions: Vec::new(),
            trigger_count: 0,
            last_triggered: None,
            cooldown: 0.0,
        }
    }

    /// Still inside the cooldown window at `now`.
    pub fn cooling_down(&self, now: DateTime<Utc>) -> bool {
        if self.cooldown <= 0.0 {
            return false;
        }
        let Some(last) = self.last_triggered else {
            return false;
        };
        let Ok(window) = std::time::Duration::try_from_secs_f64(self.cooldown) else {
            return false;
        };
        // A negative span means the clock moved back; keep cooling down.
        (now - last).to_std().map_or(true, |elapsed| elapsed < window)
    }

    pub fn conditions_hold(&self, state: &StateSnapshot, payload: &Value) -> bool {
        self.conditions.iter().all(|c| c.evaluate(state, payload))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_fields_are_wildcards() {
        let mut trigger = Trigger::new("CurrentProgramSceneChanged");
        trigger.event_data.insert("sceneName".into(), json!(""));
        assert!(trigger.matches(&json!({ "sceneName": "Gaming" })));

        trigger.event_data.insert("sceneName".into(), json!("Gaming"));
        assert!(trigger.matches(&json!({ "sceneName": "Gaming" })));
        assert!(!trigger.matches(&json!({ "sceneName": "Chat" })));
        assert!(!trigger.matches(&json!({})));
    }

    #[test]
    fn operators() {
        let state = StateSnapshot {
            current_program_scene: Some("Gaming".into()),
            streaming: true,
            ..StateSnapshot::default()
        };
        let payload = json!({ "inputName": "Mic/Aux", "viewers": "42" });

        let cond = |kind, field: &str, op, value| Condition::new(kind, field, op, value);
        assert!(cond(ConditionKind::Scene, "currentProgramScene", Operator::Equals, json!("Gaming")).evaluate(&state, &payload));
        assert!(cond(ConditionKind::Stream, "streamActive", Operator::Equals, json!(true)).evaluate(&state, &payload));
        assert!(cond(ConditionKind::Source, "inputName", Operator::Contains, json!("mic")).evaluate(&state, &payload));
        assert!(cond(ConditionKind::Custom, "viewers", Operator::GreaterThan, json!(10)).evaluate(&state, &payload));
        assert!(!cond(ConditionKind::Custom, "viewers", Operator::LessThan, json!(10)).evaluate(&state, &payload));
        assert!(cond(ConditionKind::Custom, "missing", Operator::NotEquals, json!("x")).evaluate(&state, &payload));
        assert!(!cond(ConditionKind::Custom, "inputName", Operator::GreaterThan, json!(1)).evaluate(&state, &payload));
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(loose_eq(&json!(1), &json!(1.0)));
        assert!(!loose_eq(&json!(1), &json!("1")));
    }

    #[test]
    fn parses_rules_file_shape() {
        let rule: AutomationRule = serde_json::from_value(json!({
            "id": "r1",
            "name": "Stream started",
            "trigger": {
                "eventName": "StreamStateChanged",
                "eventData": { "outputState": "OBS_WEBSOCKET_OUTPUT_STARTED" }
            },
            "conditions": [
                { "type": "scene", "field": "currentProgramScene", "operator": "not_equals", "value": "BRB" }
            ],
            "actions": [
                { "type": "streamerbot", "data": { "actionName": "Stream Started" } },
                { "type": "obs", "data": { "type": "SetCurrentProgramScene", "parameters": { "sceneName": "Intro" } } }
            ],
            "cooldown": 30
        }))
        .unwrap();

        assert!(rule.enabled);
        assert_eq!(rule.trigger_count, 0);
        assert_eq!(rule.actions.len(), 2);
        assert_eq!(
            rule.actions[1],
            RuleAction::Obs(Action::SetProgramScene {
                scene_name: "Intro".into()
            })
        );
        assert_eq!(rule.conditions[0].operator, Operator::NotEquals);
    }

    #[test]
    fn cooldown_window() {
        let mut rule = AutomationRule::new("r", "r", Trigger::new("X"));
        let now = Utc::now();
        assert!(!rule.cooling_down(now));
        rule.cooldown = 10.0;
        rule.last_triggered = Some(now);
        assert!(rule.cooling_down(now + chrono::Duration::seconds(5)));
        assert!(!rule.cooling_down(now + chrono::Duration::seconds(11)));
    }
}
