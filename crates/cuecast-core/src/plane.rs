// ── Control plane facade ──
//
// What callers (CLI, chat layer, widgets) talk to: submit a single action or
// a transactional batch. Batches run one at a time against a freshly read
// snapshot.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::ConnectionClient;
use crate::config::ExecutorConfig;
use crate::dispatch::{ActionDispatcher, ActionResult, ObsDispatcher, describe};
use crate::error::CoreError;
use crate::executor::{ActionExecutor, ExecutionResult, ProgressFn};
use crate::model::{Action, ActionDescriptor};
use crate::validator::{self, BatchError, BatchValidation, ValidationResult};

pub struct ControlPlane {
    client: ConnectionClient,
    dispatcher: Arc<dyn ActionDispatcher>,
    executor: ActionExecutor,
    batch_lock: Mutex<()>,
}

impl ControlPlane {
    pub fn new(client: ConnectionClient, executor: ExecutorConfig) -> Self {
        let dispatcher = Arc::new(ObsDispatcher::new(client.clone()));
        Self::with_dispatcher(client, dispatcher, executor)
    }

    pub fn with_dispatcher(
        client: ConnectionClient,
        dispatcher: Arc<dyn ActionDispatcher>,
        executor: ExecutorConfig,
    ) -> Self {
        Self {
            client,
            dispatcher,
            executor: ActionExecutor::new(executor),
            batch_lock: Mutex::new(()),
        }
    }

    pub fn client(&self) -> &ConnectionClient {
        &self.client
    }

    /// Shared dispatcher, for wiring the automation engine.
    pub fn dispatcher(&self) -> Arc<dyn ActionDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Parse, validate and send one action. Invalid and no-op actions never
    /// reach OBS.
    pub async fn submit(&self, descriptor: &ActionDescriptor) -> ActionResult {
        match Action::parse(descriptor) {
            Ok(action) => self.submit_action(&action).await,
            Err(issue) => ActionResult::failed(
                format!("Invalid {} action", descriptor.action_type),
                &CoreError::Validation(issue),
            ),
        }
    }

    pub async fn submit_action(&self, action: &Action) -> ActionResult {
        let label = action.label();
        let snapshot = match self.client.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => return ActionResult::failed(format!("{label} not sent"), &e),
        };

        match validator::validate(action, &snapshot) {
            ValidationResult::Valid => {}
            ValidationResult::Redundant(issue) => {
                debug!(label = %label, "no-op action not sent");
                return ActionResult::failed(issue.message.clone(), &CoreError::Validation(issue));
            }
            ValidationResult::Invalid(issue) => {
                return ActionResult::failed(
                    format!("{label} rejected"),
                    &CoreError::Validation(issue),
                );
            }
        }

        match self.dispatcher.dispatch(action).await {
            Ok(data) => ActionResult::ok(describe(action), data),
            Err(e) => ActionResult::failed(format!("{label} failed"), &e),
        }
    }

    /// Validate a batch without sending anything.
    pub async fn validate(
        &self,
        descriptors: &[ActionDescriptor],
    ) -> Result<BatchValidation, CoreError> {
        let (actions, parse_errors) = parse_all(descriptors);
        if !parse_errors.is_empty() {
            return Ok(BatchValidation {
                errors: parse_errors,
                warnings: Vec::new(),
            });
        }
        let snapshot = self.client.snapshot().await?;
        Ok(validator::validate_batch(&actions, &snapshot))
    }

    /// Run a batch transactionally. Batches are serialized; a second caller
    /// waits for the first to finish.
    pub async fn submit_batch(
        &self,
        descriptors: &[ActionDescriptor],
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<ExecutionResult, CoreError> {
        let (actions, parse_errors) = parse_all(descriptors);
        if !parse_errors.is_empty() {
            let validation = BatchValidation {
                errors: parse_errors,
                warnings: Vec::new(),
            };
            return Ok(ExecutionResult {
                success: false,
                error: Some(format!("Validation failed:\n{}", validation.summary())),
                validation: Some(validation),
                ..ExecutionResult::default()
            });
        }

        let _serialized = self.batch_lock.lock().await;
        self.client.cache().clear();
        let snapshot = self.client.snapshot().await?;
        info!(actions = actions.len(), "submitting batch");
        Ok(self
            .executor
            .execute_transaction(&actions, self.dispatcher.as_ref(), &snapshot, on_progress)
            .await)
    }
}

fn parse_all(descriptors: &[ActionDescriptor]) -> (Vec<Action>, Vec<BatchError>) {
    let mut actions = Vec::with_capacity(descriptors.len());
    let mut errors = Vec::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        match Action::parse(descriptor) {
            Ok(action) => actions.push(action),
            Err(issue) => errors.push(BatchError {
                index,
                label: descriptor.action_type.clone(),
                issue,
                redundant: false,
            }),
        }
    }
    (actions, errors)
}
