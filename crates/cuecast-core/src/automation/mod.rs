// ── Automation ──
//
// Event-driven rules: rule model, per-event throttle, and the engine that
// ties them to the dispatchers.

pub mod engine;
pub mod rule;
pub mod throttle;

pub use engine::{AutomationEngine, AutomationNotice, EventOutcome, RuleStatistics, RuleTest};
pub use rule::{
    AutomationRule, BotActionData, Condition, ConditionKind, Operator, RuleAction, Trigger,
};
pub use throttle::EventThrottle;
