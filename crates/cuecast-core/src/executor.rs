// ── Transactional batch executor ──
//
// Runs a batch all-or-nothing: validate, order by phase, apply one step at
// a time, and on the first failure unwind every applied step that has a
// compensating action, newest first.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::dispatch::ActionDispatcher;
use crate::model::{Action, StateSnapshot};
use crate::validator::{BatchValidation, validate_batch};

/// Progress callback: `(completed, total, label)`, invoked after each step.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize, &str) + Send + Sync);

/// One applied step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    /// Position in the submitted batch.
    pub index: usize,
    pub label: String,
    pub response: Value,
}

/// Outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Steps that were applied before the failure (or all of them).
    pub partial_results: Vec<StepResult>,
    /// Position, in execution order, of the step that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<usize>,
    /// Compensations that ran successfully, in the order they ran.
    pub rolled_back: Vec<String>,
    /// Compensations that failed. Logged, never fatal.
    pub rollback_errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Present when the batch was refused before anything was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<BatchValidation>,
}

/// Per-batch bookkeeping. The rollback stack only ever holds compensations
/// for steps that succeeded.
struct ExecutionContext {
    executed: Vec<StepResult>,
    rollback_stack: Vec<(String, Action)>,
    original_state: StateSnapshot,
}

#[derive(Debug, Clone, Default)]
pub struct ActionExecutor {
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Validate, order and apply `actions`. Never sends anything when
    /// validation fails; always rolls back before reporting a step failure.
    pub async fn execute_transaction(
        &self,
        actions: &[Action],
        dispatcher: &dyn ActionDispatcher,
        snapshot: &StateSnapshot,
        on_progress: Option<ProgressFn<'_>>,
    ) -> ExecutionResult {
        let mut warnings = Vec::new();
        let report = validate_batch(actions, snapshot);
        for warning in &report.warnings {
            warn!(index = warning.index, message = %warning.message, "batch conflict");
            warnings.push(warning.message.clone());
        }

        let mut selected: Vec<usize> = (0..actions.len()).collect();
        if !report.is_valid() {
            if self.config.skip_redundant && report.only_redundant() {
                for error in &report.errors {
                    info!(label = %error.label, "skipping no-op action");
                    warnings.push(format!("Skipped {}: {}", error.label, error.issue));
                }
                selected.retain(|i| !report.errors.iter().any(|e| e.index == *i));
            } else {
                warn!(errors = report.errors.len(), "batch failed validation");
                return ExecutionResult {
                    success: false,
                    error: Some(format!("Validation failed:\n{}", report.summary())),
                    warnings,
                    validation: Some(report),
                    ..ExecutionResult::default()
                };
            }
        }

        // Stable: equal phases keep their submitted order.
        selected.sort_by_key(|&i| actions[i].phase());

        let mut ctx = ExecutionContext {
            executed: Vec::with_capacity(selected.len()),
            rollback_stack: Vec::new(),
            original_state: snapshot.clone(),
        };
        let total = selected.len();
        info!(steps = total, "executing batch");

        for (position, &index) in selected.iter().enumerate() {
            if position > 0 && !self.config.step_delay.is_zero() {
                tokio::time::sleep(self.config.step_delay).await;
            }

            let action = &actions[index];
            let label = action.label();
            debug!(step = position + 1, total, label = %label, "applying step");

            match dispatcher.dispatch(action).await {
                Ok(response) => {
                    if let Some(inverse) = action.inverse(&ctx.original_state) {
                        ctx.rollback_stack.push((label.clone(), inverse));
                    }
                    ctx.executed.push(StepResult {
                        index,
                        label: label.clone(),
                        response,
                    });
                    if let Some(progress) = on_progress {
                        progress(position + 1, total, &label);
                    }
                }
                Err(e) => {
                    warn!(step = position + 1, label = %label, error = %e, "step failed; rolling back");
                    let (rolled_back, rollback_errors) = rollback(&mut ctx, dispatcher, self.config.step_delay).await;
                    return ExecutionResult {
                        success: false,
                        error: Some(format!("{label} failed: {e}")),
                        partial_results: ctx.executed,
                        failed_at: Some(position),
                        rolled_back,
                        rollback_errors,
                        warnings,
                        validation: None,
                    };
                }
            }
        }

        info!(steps = total, "batch applied");
        ExecutionResult {
            success: true,
            partial_results: ctx.executed,
            warnings,
            ..ExecutionResult::default()
        }
    }
}

/// Unwind the rollback stack newest first, one step delay before each
/// compensation. Every compensation is attempted even when an earlier one
/// fails.
async fn rollback(
    ctx: &mut ExecutionContext,
    dispatcher: &dyn ActionDispatcher,
    step_delay: Duration,
) -> (Vec<String>, Vec<String>) {
    let mut done = Vec::new();
    let mut failed = Vec::new();
    while let Some((original, compensation)) = ctx.rollback_stack.pop() {
        if !step_delay.is_zero() {
            tokio::time::sleep(step_delay).await;
        }
        let label = compensation.label();
        match dispatcher.dispatch(&compensation).await {
            Ok(_) => {
                debug!(undo = %label, of = %original, "rolled back");
                done.push(label);
            }
            Err(e) => {
                warn!(undo = %label, of = %original, error = %e, "rollback step failed");
                failed.push(format!("{label}: {e}"));
            }
        }
    }
    (done, failed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::model::{Output, SceneItemRef};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Records every dispatched request type; fails the listed ones.
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
        fail_on: Vec<&'static str>,
    }

    impl Recorder {
        fn failing(fail_on: &[&'static str]) -> Self {
            Self {
                fail_on: fail_on.to_vec(),
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActionDispatcher for Recorder {
        async fn dispatch(&self, action: &Action) -> Result<Value, CoreError> {
            self.sent.lock().unwrap().push(action.label());
            if self.fail_on.contains(&action.request_type()) {
                return Err(CoreError::Remote {
                    request_type: action.request_type().into(),
                    code: 600,
                    message: "boom".into(),
                });
            }
            Ok(Value::Null)
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    fn snapshot() -> StateSnapshot {
        StateSnapshot {
            current_program_scene: Some("Main".into()),
            scenes: vec!["Main".into(), "BRB".into()],
            ..StateSnapshot::default()
        }
    }

    fn executor() -> ActionExecutor {
        ActionExecutor::new(ExecutorConfig {
            step_delay: std::time::Duration::ZERO,
            skip_redundant: false,
        })
    }

    #[tokio::test]
    async fn orders_by_phase_and_reports_progress() {
        let recorder = Recorder::default();
        let progress = Mutex::new(Vec::new());
        let on_progress = |done: usize, total: usize, label: &str| {
            progress.lock().unwrap().push(format!("{done}/{total} {label}"));
        };
        let actions = vec![
            Action::StartOutput(Output::Record),
            Action::SetProgramScene {
                scene_name: "Intro".into(),
            },
            Action::CreateScene {
                scene_name: "Intro".into(),
            },
        ];

        let result = executor()
            .execute_transaction(&actions, &recorder, &snapshot(), Some(&on_progress))
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            recorder.sent(),
            vec![
                "CreateScene \"Intro\"",
                "SetCurrentProgramScene \"Intro\"",
                "StartRecord"
            ]
        );
        assert_eq!(
            progress.into_inner().unwrap(),
            vec![
                "1/3 CreateScene \"Intro\"",
                "2/3 SetCurrentProgramScene \"Intro\"",
                "3/3 StartRecord"
            ]
        );
        let indices: Vec<usize> = result.partial_results.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn invalid_batch_sends_nothing() {
        let recorder = Recorder::default();
        let actions = vec![Action::SetProgramScene {
            scene_name: "Nope".into(),
        }];
        let result = executor()
            .execute_transaction(&actions, &recorder, &snapshot(), None)
            .await;
        assert!(!result.success);
        assert!(result.validation.is_some());
        assert!(recorder.sent().is_empty());
    }

    #[tokio::test]
    async fn failure_unwinds_successful_steps_in_reverse() {
        let recorder = Recorder::failing(&["StartStream"]);
        let actions = vec![
            Action::CreateScene {
                scene_name: "Intro".into(),
            },
            Action::SetSceneItemEnabled {
                scene_name: "Main".into(),
                item: SceneItemRef::Id(4),
                enabled: true,
            },
            Action::SetProgramScene {
                scene_name: "BRB".into(),
            },
            Action::StartOutput(Output::Stream),
        ];

        let result = executor()
            .execute_transaction(&actions, &recorder, &snapshot(), None)
            .await;

        assert!(!result.success);
        assert_eq!(result.failed_at, Some(3));
        assert_eq!(result.partial_results.len(), 3);
        assert_eq!(
            result.rolled_back,
            vec![
                "SetCurrentProgramScene \"Main\"",
                "SetSceneItemEnabled",
                "RemoveScene \"Intro\""
            ]
        );
        assert_eq!(recorder.sent().len(), 7);
    }

    #[tokio::test]
    async fn rollback_failures_are_not_fatal() {
        let recorder = Recorder::failing(&["StartStream", "RemoveScene"]);
        let actions = vec![
            Action::CreateScene {
                scene_name: "A".into(),
            },
            Action::CreateScene {
                scene_name: "B".into(),
            },
            Action::StartOutput(Output::Stream),
        ];
        let result = executor()
            .execute_transaction(&actions, &recorder, &snapshot(), None)
            .await;
        assert_eq!(result.failed_at, Some(2));
        assert!(result.rolled_back.is_empty());
        assert_eq!(result.rollback_errors.len(), 2);
        assert_eq!(
            recorder.sent()[3..],
            ["RemoveScene \"B\"".to_owned(), "RemoveScene \"A\"".to_owned()]
        );
    }

    #[tokio::test]
    async fn skip_redundant_drops_no_ops() {
        let recorder = Recorder::default();
        let exec = ActionExecutor::new(ExecutorConfig {
            step_delay: std::time::Duration::ZERO,
            skip_redundant: true,
        });
        let actions = vec![
            Action::SetProgramScene {
                scene_name: "Main".into(),
            },
            Action::StartOutput(Output::Record),
        ];
        let result = exec
            .execute_transaction(&actions, &recorder, &snapshot(), None)
            .await;
        assert!(result.success);
        assert_eq!(recorder.sent(), vec!["StartRecord"]);
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn steps_are_paced() {
        let recorder = Recorder::default();
        let actions = vec![
            Action::StartOutput(Output::Record),
            Action::StartOutput(Output::Stream),
        ];
        let started = tokio::time::Instant::now();
        let result = ActionExecutor::default()
            .execute_transaction(&actions, &recorder, &snapshot(), None)
            .await;
        assert!(result.success);
        assert_eq!(started.elapsed(), std::time::Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_is_paced_like_the_batch() {
        let recorder = Recorder::failing(&["StartStream"]);
        let actions = vec![
            Action::CreateScene {
                scene_name: "A".into(),
            },
            Action::CreateScene {
                scene_name: "B".into(),
            },
            Action::StartOutput(Output::Stream),
        ];
        let started = tokio::time::Instant::now();
        let result = ActionExecutor::default()
            .execute_transaction(&actions, &recorder, &snapshot(), None)
            .await;
        assert_eq!(result.rolled_back.len(), 2);
        // Three forward steps, then two compensations, 100 ms apart.
        assert_eq!(started.elapsed(), std::time::Duration::from_millis(400));
    }
}
