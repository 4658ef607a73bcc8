// ── State tracker ──
//
// Diffs successive snapshots so callers (the CLI `status` command, an
// assistant prompt builder) can see what moved since the last look.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::model::{Output, StateSnapshot};

const MAX_CHANGE_HISTORY: usize = 10;
const RECENT_CHANGES: usize = 3;

/// One observed difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateChange {
    SceneChanged {
        from: Option<String>,
        to: Option<String>,
    },
    ScenesAdded(Vec<String>),
    ScenesRemoved(Vec<String>),
    SourcesAdded(Vec<String>),
    SourcesRemoved(Vec<String>),
    Output { output: Output, started: bool },
}

impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SceneChanged { from, to } => write!(
                f,
                "Scene: {} \u{2192} {}",
                from.as_deref().unwrap_or("none"),
                to.as_deref().unwrap_or("none")
            ),
            Self::ScenesAdded(names) => write!(f, "Added scenes: {}", names.join(", ")),
            Self::ScenesRemoved(names) => write!(f, "Removed scenes: {}", names.join(", ")),
            Self::SourcesAdded(names) => write!(f, "Added sources: {}", names.join(", ")),
            Self::SourcesRemoved(names) => write!(f, "Removed sources: {}", names.join(", ")),
            Self::Output { output, started } => {
                let verb = if *started { "started" } else { "stopped" };
                write!(f, "{} {verb}", output.noun())
            }
        }
    }
}

/// Coarse bucket of a change record, taken from its first matching change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeCategory {
    Scene,
    Source,
    Output,
    Config,
}

/// A batch of changes observed by one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub at: DateTime<Utc>,
    pub category: ChangeCategory,
    pub changes: Vec<StateChange>,
}

/// Snapshot plus what changed since the previous query.
#[derive(Debug, Clone, Serialize)]
pub struct StateWithChanges {
    pub snapshot: StateSnapshot,
    /// `None` on the first query after construction or reset.
    pub changes: Option<Vec<StateChange>>,
    pub recent_changes: Vec<ChangeRecord>,
    pub is_first_query: bool,
    pub version: u64,
}

/// Change detector over successive snapshots.
#[derive(Debug, Default)]
pub struct StateTracker {
    previous: Option<StateSnapshot>,
    log: VecDeque<ChangeRecord>,
    version: u64,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current` and report what changed since the last call.
    pub fn observe(&mut self, current: StateSnapshot) -> StateWithChanges {
        self.version += 1;

        let Some(previous) = self.previous.replace(current.clone()) else {
            return StateWithChanges {
                snapshot: current,
                changes: None,
                recent_changes: Vec::new(),
                is_first_query: true,
                version: self.version,
            };
        };

        let changes = detect_changes(&previous, &current);
        if !changes.is_empty() {
            info!(
                count = changes.len(),
                summary = %summary(&changes),
                "state changes detected"
            );
            self.log.push_back(ChangeRecord {
                at: Utc::now(),
                category: categorize(&changes),
                changes: changes.clone(),
            });
            while self.log.len() > MAX_CHANGE_HISTORY {
                self.log.pop_front();
            }
        }

        let skip = self.log.len().saturating_sub(RECENT_CHANGES);
        StateWithChanges {
            snapshot: current,
            changes: Some(changes),
            recent_changes: self.log.iter().skip(skip).cloned().collect(),
            is_first_query: false,
            version: self.version,
        }
    }

    /// Full change log, oldest first.
    pub fn history(&self) -> Vec<ChangeRecord> {
        self.log.iter().cloned().collect()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Forget everything. Called on disconnect.
    pub fn reset(&mut self) {
        self.previous = None;
        self.log.clear();
        self.version = 0;
        debug!("state tracking reset");
    }
}

/// Human-readable one-liner, `" | "`-separated.
pub fn summary(changes: &[StateChange]) -> String {
    if changes.is_empty() {
        return "No changes".into();
    }
    changes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

fn detect_changes(prev: &StateSnapshot, curr: &StateSnapshot) -> Vec<StateChange> {
    let mut changes = Vec::new();

    if prev.current_program_scene != curr.current_program_scene {
        changes.push(StateChange::SceneChanged {
            from: prev.current_program_scene.clone(),
            to: curr.current_program_scene.clone(),
        });
    }

    let (added, removed) = set_diff(&prev.scenes, &curr.scenes);
    if !added.is_empty() {
        changes.push(StateChange::ScenesAdded(added));
    }
    if !removed.is_empty() {
        changes.push(StateChange::ScenesRemoved(removed));
    }

    let (added, removed) = set_diff(&prev.input_names(), &curr.input_names());
    if !added.is_empty() {
        changes.push(StateChange::SourcesAdded(added));
    }
    if !removed.is_empty() {
        changes.push(StateChange::SourcesRemoved(removed));
    }

    for output in [
        Output::Stream,
        Output::Record,
        Output::VirtualCam,
        Output::ReplayBuffer,
    ] {
        let started = output.is_active(curr);
        if output.is_active(prev) != started {
            changes.push(StateChange::Output { output, started });
        }
    }

    changes
}

/// Names in `curr` but not `prev`, and in `prev` but not `curr`, each in
/// their original order.
fn set_diff(prev: &[String], curr: &[String]) -> (Vec<String>, Vec<String>) {
    let before: HashSet<&str> = prev.iter().map(String::as_str).collect();
    let after: HashSet<&str> = curr.iter().map(String::as_str).collect();
    let added = curr
        .iter()
        .filter(|n| !before.contains(n.as_str()))
        .cloned()
        .collect();
    let removed = prev
        .iter()
        .filter(|n| !after.contains(n.as_str()))
        .cloned()
        .collect();
    (added, removed)
}

fn categorize(changes: &[StateChange]) -> ChangeCategory {
    let any = |pred: fn(&StateChange) -> bool| changes.iter().any(pred);
    if any(|c| {
        matches!(
            c,
            StateChange::SceneChanged { .. }
                | StateChange::ScenesAdded(_)
                | StateChange::ScenesRemoved(_)
        )
    }) {
        ChangeCategory::Scene
    } else if any(|c| {
        matches!(
            c,
            StateChange::SourcesAdded(_) | StateChange::SourcesRemoved(_)
        )
    }) {
        ChangeCategory::Source
    } else if any(|c| matches!(c, StateChange::Output { .. })) {
        ChangeCategory::Output
    } else {
        ChangeCategory::Config
    }
}
