#![allow(clippy::unwrap_used)]
// Integration tests for the automation engine: throttling, retries,
// isolation between actions, the availability guard, and the live event
// loop over a connected client.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::FakeObs;
use cuecast_core::automation::{
    AutomationEngine, AutomationNotice, AutomationRule, BotActionData, Condition, ConditionKind,
    EventOutcome, Operator, RuleAction, Trigger,
};
use cuecast_core::dispatch::{ActionDispatcher, AutomationTarget, ObsDispatcher};
use cuecast_core::{Action, CoreError, Output, RetryPolicy, ThrottleConfig};
use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ── Fakes ────────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingObs {
    sent: AtomicU32,
}

#[async_trait]
impl ActionDispatcher for CountingObs {
    async fn dispatch(&self, _action: &Action) -> Result<Value, CoreError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Streamer.bot stand-in that fails the first `failures` runs.
struct FlakyBot {
    failures: u32,
    runs: AtomicU32,
    online: AtomicBool,
}

impl FlakyBot {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            runs: AtomicU32::new(0),
            online: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl AutomationTarget for FlakyBot {
    async fn run_action(&self, identifier: &str, _args: Map<String, Value>) -> Result<(), CoreError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if run <= self.failures {
            return Err(CoreError::Automation {
                service: "Streamer.bot".into(),
                message: format!("DoAction {identifier}: busy"),
            });
        }
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn engine(obs: Arc<dyn ActionDispatcher>, bot: Option<Arc<dyn AutomationTarget>>) -> AutomationEngine {
    AutomationEngine::new(obs, bot, RetryPolicy::default(), ThrottleConfig::default())
}

fn bot_action(name: &str) -> RuleAction {
    RuleAction::StreamerBot(BotActionData {
        action_name: name.into(),
        args: Map::new(),
    })
}

fn rule_on(event: &str, actions: Vec<RuleAction>) -> AutomationRule {
    let mut rule = AutomationRule::new(format!("rule-{event}"), format!("On {event}"), Trigger::new(event));
    rule.actions = actions;
    rule
}

fn drain(rx: &mut broadcast::Receiver<AutomationNotice>) -> Vec<AutomationNotice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}

// ── Throttling ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_burst_of_events_runs_one_pass() {
    let obs = Arc::new(CountingObs::default());
    let engine = engine(obs.clone(), None);
    engine
        .add_rule(rule_on(
            "InputCreated",
            vec![RuleAction::Obs(Action::StartOutput(Output::Record))],
        ))
        .await;

    let mut processed = 0;
    for _ in 0..100 {
        if matches!(
            engine.process_event("InputCreated", &json!({})).await,
            EventOutcome::Processed { .. }
        ) {
            processed += 1;
        }
    }

    assert_eq!(processed, 1);
    assert_eq!(obs.sent.load(Ordering::SeqCst), 1);
    assert_eq!(engine.statistics().await.total_triggers, 1);
}

// ── Retries and isolation ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_action_succeeds_on_third_attempt() {
    let bot = FlakyBot::new(2);
    let engine = engine(Arc::new(CountingObs::default()), Some(bot.clone() as Arc<dyn AutomationTarget>));
    engine
        .add_rule(rule_on("StreamStateChanged", vec![bot_action("Shoutout")]))
        .await;
    let mut notices = engine.notices();

    let started = Instant::now();
    engine
        .process_event("StreamStateChanged", &json!({ "outputActive": true }))
        .await;

    assert_eq!(bot.runs.load(Ordering::SeqCst), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    let notices = drain(&mut notices);
    assert!(matches!(notices[0], AutomationNotice::RuleTriggered { .. }));
    assert_eq!(
        notices[1].to_string(),
        "[On StreamStateChanged] Executed action \"Shoutout\""
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_action_does_not_stop_the_rest() {
    let obs = Arc::new(CountingObs::default());
    let bot = FlakyBot::new(u32::MAX);
    let engine = engine(obs.clone(), Some(bot.clone() as Arc<dyn AutomationTarget>));
    engine
        .add_rule(rule_on(
            "SceneCreated",
            vec![
                bot_action("Alert"),
                RuleAction::Obs(Action::StartOutput(Output::Stream)),
            ],
        ))
        .await;
    let mut notices = engine.notices();

    let outcome = engine.process_event("SceneCreated", &json!({})).await;

    assert_eq!(
        outcome,
        EventOutcome::Processed {
            fired: vec!["rule-SceneCreated".into()]
        }
    );
    assert_eq!(bot.runs.load(Ordering::SeqCst), 3);
    assert_eq!(obs.sent.load(Ordering::SeqCst), 1);

    let notices = drain(&mut notices);
    assert!(matches!(
        notices[1],
        AutomationNotice::ActionFailed { attempts: 3, .. }
    ));
    assert!(matches!(notices[2], AutomationNotice::ActionSucceeded { .. }));
}

// ── Availability guard ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_unavailable_service_is_reported_once() {
    let bot = FlakyBot::new(0);
    bot.online.store(false, Ordering::SeqCst);
    let engine = engine(Arc::new(CountingObs::default()), Some(bot.clone() as Arc<dyn AutomationTarget>));
    engine
        .add_rule(rule_on("SceneCreated", vec![bot_action("Alert")]))
        .await;
    let mut notices = engine.notices();

    for _ in 0..3 {
        let outcome = engine.process_event("SceneCreated", &json!({})).await;
        assert_eq!(outcome, EventOutcome::Unavailable);
        tokio::time::advance(Duration::from_secs(1)).await;
    }

    assert_eq!(
        drain(&mut notices),
        vec![AutomationNotice::ServiceUnavailable {
            services: vec!["Streamer.bot".into()]
        }]
    );
    assert_eq!(bot.runs.load(Ordering::SeqCst), 0);

    // Back online: rules run again.
    bot.online.store(true, Ordering::SeqCst);
    let outcome = engine.process_event("SceneCreated", &json!({})).await;
    assert!(matches!(outcome, EventOutcome::Processed { .. }));
}

#[tokio::test]
async fn test_missing_automation_target_counts_as_unavailable() {
    let engine = engine(Arc::new(CountingObs::default()), None);
    engine
        .add_rule(rule_on("SceneCreated", vec![bot_action("Alert")]))
        .await;

    let outcome = engine.process_event("SceneCreated", &json!({})).await;
    assert_eq!(outcome, EventOutcome::Unavailable);
}

#[tokio::test(start_paused = true)]
async fn test_offline_bot_blocks_obs_only_rules() {
    let obs = Arc::new(CountingObs::default());
    let bot = FlakyBot::new(0);
    bot.online.store(false, Ordering::SeqCst);
    let engine = engine(obs.clone(), Some(bot.clone() as Arc<dyn AutomationTarget>));
    engine
        .add_rule(rule_on(
            "SceneCreated",
            vec![RuleAction::Obs(Action::StartOutput(Output::Record))],
        ))
        .await;
    let mut notices = engine.notices();

    let outcome = engine.process_event("SceneCreated", &json!({})).await;

    assert_eq!(outcome, EventOutcome::Unavailable);
    assert_eq!(obs.sent.load(Ordering::SeqCst), 0);
    assert_eq!(
        drain(&mut notices),
        vec![AutomationNotice::ServiceUnavailable {
            services: vec!["Streamer.bot".into()]
        }]
    );
}

// ── Rule management ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_disabled_and_removed_rules_stop_firing() {
    let obs = Arc::new(CountingObs::default());
    let engine = engine(obs.clone(), None);
    engine
        .add_rule(rule_on(
            "SceneCreated",
            vec![RuleAction::Obs(Action::StartOutput(Output::Record))],
        ))
        .await;

    assert!(engine.set_enabled("rule-SceneCreated", false).await);
    assert!(!engine.set_enabled("no-such-rule", false).await);
    assert_eq!(
        engine.process_event("SceneCreated", &json!({})).await,
        EventOutcome::NoMatch
    );
    assert_eq!(engine.statistics().await.enabled_rules, 0);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(engine.set_enabled("rule-SceneCreated", true).await);
    assert!(matches!(
        engine.process_event("SceneCreated", &json!({})).await,
        EventOutcome::Processed { .. }
    ));

    assert!(engine.remove_rule("rule-SceneCreated").await);
    assert!(!engine.remove_rule("rule-SceneCreated").await);
    assert!(engine.rules().await.is_empty());
    assert_eq!(obs.sent.load(Ordering::SeqCst), 1);
}

// ── Cooldown ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_cooldown_suppresses_second_firing() {
    let obs = Arc::new(CountingObs::default());
    let engine = engine(obs.clone(), None);
    let mut rule = rule_on(
        "SceneCreated",
        vec![RuleAction::Obs(Action::StartOutput(Output::Record))],
    );
    rule.cooldown = 3600.0;
    engine.add_rule(rule).await;

    engine.process_event("SceneCreated", &json!({})).await;
    tokio::time::advance(Duration::from_secs(1)).await;
    let second = engine.process_event("SceneCreated", &json!({})).await;

    assert_eq!(second, EventOutcome::Processed { fired: vec![] });
    assert_eq!(obs.sent.load(Ordering::SeqCst), 1);
    assert_eq!(engine.rules().await[0].trigger_count, 1);
}

// ── Event loop ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_event_loop_runs_rules_from_obs_events() {
    let fake = FakeObs::new();
    let client = common::client(&fake);
    client.connect().await.unwrap();

    let obs = Arc::new(ObsDispatcher::new(client.clone()));
    let engine = engine(obs, None);

    let mut trigger = Trigger::new("CurrentProgramSceneChanged");
    trigger.event_data.insert("sceneName".into(), json!("Live"));
    let mut rule = AutomationRule::new("go-live", "Go live", trigger);
    rule.conditions.push(Condition::new(
        ConditionKind::Stream,
        "streamActive",
        Operator::Equals,
        json!(false),
    ));
    rule.actions
        .push(RuleAction::Obs(Action::StartOutput(Output::Stream)));
    engine.add_rule(rule).await;
    let mut notices = engine.notices();

    let cancel = CancellationToken::new();
    let running = tokio::spawn({
        let engine = engine.clone();
        let client = client.clone();
        let cancel = cancel.clone();
        async move { engine.run(client, cancel).await }
    });
    tokio::task::yield_now().await;

    let session = fake.session();
    session.emit("CurrentProgramSceneChanged", json!({ "sceneName": "Intro" }));
    session.emit("CurrentProgramSceneChanged", json!({ "sceneName": "Live" }));
    // The first event opened the throttle window; wait it out.
    tokio::time::sleep(Duration::from_millis(600)).await;
    session.emit("CurrentProgramSceneChanged", json!({ "sceneName": "Live" }));

    loop {
        if let AutomationNotice::ActionSucceeded { message, .. } = notices.recv().await.unwrap() {
            assert_eq!(message, "Stream started");
            break;
        }
    }
    assert!(fake.state().streaming);

    cancel.cancel();
    running.await.unwrap();
}
