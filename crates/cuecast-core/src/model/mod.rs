// ── Domain model ──
//
// Typed actions the control plane can apply to OBS, the raw descriptors
// callers submit, and the last-known remote state those actions are checked
// against.

pub mod action;
pub mod snapshot;

pub use action::{Action, ActionDescriptor, ActionPhase, Output, SceneItemRef};
pub use snapshot::{InputInfo, StateSnapshot, VideoSettings};
