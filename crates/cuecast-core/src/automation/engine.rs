// ── Automation rule engine ──
//
// Matches OBS events against user rules and carries out the actions of the
// ones that fire. Events are throttled per name; each action retries on its
// own and a failing action never stops the rest of the rule.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::rule::{AutomationRule, RuleAction};
use super::throttle::EventThrottle;
use crate::client::ConnectionClient;
use crate::config::{RetryPolicy, ThrottleConfig};
use crate::dispatch::{
    ActionDispatcher, AutomationTarget, OBS_SERVICE, STREAMERBOT_SERVICE, describe,
};
use crate::error::CoreError;
use crate::model::StateSnapshot;

const NOTICE_CHANNEL_SIZE: usize = 256;

// ── Notices ──────────────────────────────────────────────────────

/// Human-facing log line emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AutomationNotice {
    RuleTriggered {
        rule_id: String,
        rule_name: String,
        actions: usize,
    },
    ActionSucceeded {
        rule_name: String,
        action: String,
        message: String,
    },
    ActionFailed {
        rule_name: String,
        action: String,
        attempts: u32,
        error: String,
    },
    /// Sent once per outage, not once per skipped event.
    ServiceUnavailable { services: Vec<String> },
}

impl fmt::Display for AutomationNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RuleTriggered {
                rule_name, actions, ..
            } => write!(f, "Rule \"{rule_name}\" triggered: {actions} action(s)"),
            Self::ActionSucceeded {
                rule_name, message, ..
            } => write!(f, "[{rule_name}] {message}"),
            Self::ActionFailed {
                rule_name,
                action,
                attempts,
                error,
            } => write!(
                f,
                "[{rule_name}] {action} failed after {attempts} attempt(s): {error}"
            ),
            Self::ServiceUnavailable { services } => write!(
                f,
                "Service unavailable: {}. Check the connection.",
                services.join(", ")
            ),
        }
    }
}

/// What one call to [`AutomationEngine::process_event`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Another event of the same name ran a pass inside the window.
    Throttled,
    /// No enabled rule listens for this event.
    NoMatch,
    /// A target the matching rules need is down; nothing ran.
    Unavailable,
    /// Matching pass ran; ids of the rules that fired.
    Processed { fired: Vec<String> },
}

/// Dry-run verdict from [`AutomationEngine::test_rule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleTest {
    pub would_trigger: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleStatistics {
    pub total_rules: usize,
    pub enabled_rules: usize,
    pub total_triggers: u64,
}

// ── Engine ───────────────────────────────────────────────────────

struct EngineInner {
    rules: Mutex<Vec<AutomationRule>>,
    state: ArcSwap<StateSnapshot>,
    throttle: EventThrottle,
    retry: RetryPolicy,
    obs: Arc<dyn ActionDispatcher>,
    bot: Option<Arc<dyn AutomationTarget>>,
    notices: broadcast::Sender<AutomationNotice>,
    unavailable: AtomicBool,
}

/// Rule engine handle. Cheap to clone.
#[derive(Clone)]
pub struct AutomationEngine {
    inner: Arc<EngineInner>,
}

impl AutomationEngine {
    pub fn new(
        obs: Arc<dyn ActionDispatcher>,
        bot: Option<Arc<dyn AutomationTarget>>,
        retry: RetryPolicy,
        throttle: ThrottleConfig,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);
        Self {
            inner: Arc::new(EngineInner {
                rules: Mutex::new(Vec::new()),
                state: ArcSwap::from_pointee(StateSnapshot::default()),
                throttle: EventThrottle::new(throttle),
                retry,
                obs,
                bot,
                notices,
                unavailable: AtomicBool::new(false),
            }),
        }
    }

    // ── Rules ────────────────────────────────────────────────────

    pub async fn set_rules(&self, rules: Vec<AutomationRule>) {
        info!(count = rules.len(), "automation rules loaded");
        *self.inner.rules.lock().await = rules;
    }

    pub async fn add_rule(&self, rule: AutomationRule) {
        self.inner.rules.lock().await.push(rule);
    }

    /// Remove by id. Returns whether a rule was removed.
    pub async fn remove_rule(&self, id: &str) -> bool {
        let mut rules = self.inner.rules.lock().await;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        rules.len() != before
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut rules = self.inner.rules.lock().await;
        match rules.iter_mut().find(|r| r.id == id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Current rules, including firing statistics.
    pub async fn rules(&self) -> Vec<AutomationRule> {
        self.inner.rules.lock().await.clone()
    }

    pub async fn statistics(&self) -> RuleStatistics {
        let rules = self.inner.rules.lock().await;
        RuleStatistics {
            total_rules: rules.len(),
            enabled_rules: rules.iter().filter(|r| r.enabled).count(),
            total_triggers: rules.iter().map(|r| r.trigger_count).sum(),
        }
    }

    // ── Live state and notices ───────────────────────────────────

    /// Replace the state conditions are evaluated against.
    pub fn update_state(&self, snapshot: StateSnapshot) {
        self.inner.state.store(Arc::new(snapshot));
    }

    pub fn state(&self) -> Arc<StateSnapshot> {
        self.inner.state.load_full()
    }

    pub fn notices(&self) -> broadcast::Receiver<AutomationNotice> {
        self.inner.notices.subscribe()
    }

    fn notify(&self, notice: AutomationNotice) {
        debug!(notice = %notice, "automation notice");
        let _ = self.inner.notices.send(notice);
    }

    // ── Evaluation ───────────────────────────────────────────────

    /// Throttled entry point: at most one matching pass per event name per
    /// window.
    pub async fn process_event(&self, event_name: &str, payload: &Value) -> EventOutcome {
        if !self.inner.throttle.admit(event_name) {
            trace!(event = event_name, "event throttled");
            return EventOutcome::Throttled;
        }
        self.run_pass(event_name, payload).await
    }

    async fn has_listeners(&self, event_name: &str) -> bool {
        self.inner
            .rules
            .lock()
            .await
            .iter()
            .any(|r| r.enabled && r.trigger.event_name == event_name)
    }

    async fn run_pass(&self, event_name: &str, payload: &Value) -> EventOutcome {
        let candidates: Vec<AutomationRule> = self
            .inner
            .rules
            .lock()
            .await
            .iter()
            .filter(|r| r.enabled && r.trigger.event_name == event_name)
            .cloned()
            .collect();
        if candidates.is_empty() {
            return EventOutcome::NoMatch;
        }

        let missing = self.unavailable_services(&candidates).await;
        if !missing.is_empty() {
            if !self.inner.unavailable.swap(true, Ordering::SeqCst) {
                warn!(services = ?missing, "required services unavailable; skipping automation");
                self.notify(AutomationNotice::ServiceUnavailable { services: missing });
            }
            return EventOutcome::Unavailable;
        }
        self.inner.unavailable.store(false, Ordering::SeqCst);

        info!(event = event_name, rules = candidates.len(), "processing event");
        let state = self.inner.state.load_full();
        let mut fired = Vec::new();
        for rule in candidates {
            if !rule.trigger.matches(payload) {
                debug!(rule = %rule.name, "trigger data does not match");
                continue;
            }
            if !rule.conditions_hold(&state, payload) {
                debug!(rule = %rule.name, "conditions not met");
                continue;
            }
            let Some(rule) = self.mark_fired(&rule.id).await else {
                continue;
            };
            self.execute_rule(&rule).await;
            fired.push(rule.id);
        }
        EventOutcome::Processed { fired }
    }

    /// Every configured target must be up for a pass to run. A rule that
    /// needs Streamer.bot when none is configured also blocks the pass.
    async fn unavailable_services(&self, rules: &[AutomationRule]) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.inner.obs.is_available().await {
            missing.push(OBS_SERVICE.to_owned());
        }
        let bot_up = match &self.inner.bot {
            Some(bot) => bot.is_available().await,
            None => !rules
                .iter()
                .flat_map(|r| r.actions.iter())
                .any(|a| matches!(a, RuleAction::StreamerBot(_))),
        };
        if !bot_up {
            missing.push(STREAMERBOT_SERVICE.to_owned());
        }
        missing
    }

    /// Record a firing unless the rule is cooling down. Returns the updated
    /// rule.
    async fn mark_fired(&self, id: &str) -> Option<AutomationRule> {
        let mut rules = self.inner.rules.lock().await;
        let rule = rules.iter_mut().find(|r| r.id == id)?;
        let now = Utc::now();
        if rule.cooling_down(now) {
            debug!(rule = %rule.name, cooldown = rule.cooldown, "rule cooling down");
            return None;
        }
        rule.trigger_count += 1;
        rule.last_triggered = Some(now);
        Some(rule.clone())
    }

    async fn execute_rule(&self, rule: &AutomationRule) {
        info!(rule = %rule.name, actions = rule.actions.len(), "executing rule");
        self.notify(AutomationNotice::RuleTriggered {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            actions: rule.actions.len(),
        });

        for action in &rule.actions {
            self.execute_with_retry(rule, action).await;
        }
    }

    async fn execute_with_retry(&self, rule: &AutomationRule, action: &RuleAction) {
        let max_attempts = self.inner.retry.max_attempts.max(1);
        let label = action.label();
        for attempt in 1..=max_attempts {
            match self.execute_action(action).await {
                Ok(message) => {
                    self.notify(AutomationNotice::ActionSucceeded {
                        rule_name: rule.name.clone(),
                        action: label,
                        message,
                    });
                    return;
                }
                Err(e) if attempt < max_attempts => {
                    warn!(rule = %rule.name, action = %label, attempt, error = %e, "action failed; retrying");
                    tokio::time::sleep(self.inner.retry.delay).await;
                }
                Err(e) => {
                    warn!(rule = %rule.name, action = %label, attempts = attempt, error = %e, "action failed");
                    self.notify(AutomationNotice::ActionFailed {
                        rule_name: rule.name.clone(),
                        action: label,
                        attempts: attempt,
                        error: e.to_string(),
                    });
                    return;
                }
            }
        }
    }

    async fn execute_action(&self, action: &RuleAction) -> Result<String, CoreError> {
        match action {
            RuleAction::Obs(action) => {
                self.inner.obs.dispatch(action).await?;
                Ok(describe(action))
            }
            RuleAction::StreamerBot(data) => {
                let bot = self
                    .inner
                    .bot
                    .as_ref()
                    .ok_or_else(|| CoreError::ServiceUnavailable {
                        service: STREAMERBOT_SERVICE.into(),
                    })?;
                bot.run_action(&data.action_name, data.args.clone()).await?;
                Ok(format!("Executed action \"{}\"", data.action_name))
            }
        }
    }

    /// Would `rule` fire for `payload` right now? Ignores throttling,
    /// cooldown and service availability.
    pub fn test_rule(&self, rule: &AutomationRule, payload: &Value) -> RuleTest {
        let verdict = |would_trigger, reason: &str| RuleTest {
            would_trigger,
            reason: reason.to_owned(),
        };
        if !rule.enabled {
            return verdict(false, "Rule is disabled");
        }
        if !rule.trigger.matches(payload) {
            return verdict(false, "Trigger data does not match");
        }
        if !rule.conditions_hold(&self.inner.state.load(), payload) {
            return verdict(false, "Conditions not met");
        }
        verdict(true, "All conditions met")
    }

    // ── Event loop ───────────────────────────────────────────────

    /// Feed OBS events from `client` into the engine until `cancel` fires.
    /// Live state is refreshed from the client before each pass.
    pub async fn run(&self, client: ConnectionClient, cancel: CancellationToken) {
        let mut events = client.events();
        info!("automation engine started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => {
                        let name = event.event_type.as_str();
                        if !self.inner.throttle.admit(name) || !self.has_listeners(name).await {
                            continue;
                        }
                        match client.snapshot().await {
                            Ok(snapshot) => self.update_state(snapshot),
                            Err(e) => debug!(error = %e, "state refresh failed; using last known state"),
                        }
                        self.run_pass(name, &event.event_data).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "automation engine lagged behind OBS events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        info!("automation engine stopped");
    }
}
