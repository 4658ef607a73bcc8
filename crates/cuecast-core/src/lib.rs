// cuecast-core: Resilient control plane between cuecast-api and consumers (CLI, chat, widgets).

pub mod automation;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod model;
pub mod plane;
pub mod store;
pub mod subscriptions;
pub mod validator;

// ── Primary re-exports ──────────────────────────────────────────────
pub use automation::{AutomationEngine, AutomationNotice, AutomationRule, EventOutcome};
pub use client::{ConnectionClient, ConnectionState, FailureKind};
pub use config::{
    CacheTtl, ClientConfig, ExecutorConfig, ReconnectPolicy, RetryPolicy, ThrottleConfig,
};
pub use dispatch::{ActionDispatcher, ActionResult, AutomationTarget, ObsDispatcher};
pub use error::CoreError;
pub use executor::{ActionExecutor, ExecutionResult, StepResult};
pub use plane::ControlPlane;
pub use store::{StateChange, StateWithChanges};
pub use subscriptions::{Subscription, SubscriptionRegistry};
pub use validator::{BatchValidation, Suggestion, ValidationIssue, ValidationResult};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Action, ActionDescriptor, ActionPhase, InputInfo, Output, SceneItemRef, StateSnapshot,
    VideoSettings,
};
