//! Plan Execution
//!
//! Applies a reconciliation plan against the remote API, strictly in
//! plan order, one operation at a time. A failing operation is recorded
//! and the rest of the plan still runs; only the per-operation outcome
//! carries the failure.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ValueSource;
use crate::error::{Error, Result};
use crate::github::RemoteOps;
use crate::plan::{Action, EntityKind, Operation, Payload, ReconciliationPlan, SecretPayload};
use crate::seal::{seal, SealedSecret};

/// Configuration for exponential backoff retry of transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum attempts per operation, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Cap for exponential growth
    pub max_delay: Duration,

    /// Backoff multiplier
    pub multiplier: f64,
}

impl RetryConfig {
    /// 3 attempts with 2s, 4s delays between them
    pub const DEFAULT: Self = Self {
        max_attempts: 3,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(16),
        multiplier: 2.0,
    };

    /// Delay before retry number `attempt` (0-indexed), capped
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Execution options
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorConfig {
    pub retry: RetryConfig,

    /// Overall deadline for the run; operations not started before it
    /// expires are skipped
    pub timeout: Option<Duration>,
}

/// Why an operation was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The plan itself called for no change
    Planned,

    /// The run deadline expired before the operation started
    TimedOut,

    /// The user interrupted the run
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::Planned => "no change needed",
            SkipReason::TimedOut => "run timeout reached",
            SkipReason::Cancelled => "cancelled",
        })
    }
}

/// Outcome of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped(SkipReason),
    Failed(String),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// One operation paired with what happened to it
#[derive(Debug, Clone)]
pub struct OperationReport {
    pub operation: Operation,
    pub outcome: Outcome,
}

/// Per-operation outcomes for an executed plan
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub results: Vec<OperationReport>,
}

impl ExecutionReport {
    pub fn applied(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == Outcome::Applied)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Skipped(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_failed()).count()
    }

    /// Whether every operation was applied or skipped
    pub fn success(&self) -> bool {
        self.failed() == 0
    }
}

/// Plan Executor
///
/// Drives a plan to completion against a [`RemoteOps`] implementation.
pub struct PlanExecutor<'a, R: RemoteOps> {
    api: &'a R,
    config: ExecutorConfig,
    cancel: Arc<AtomicBool>,

    /// Cached per-repository public key, fetched on the first secret upload
    public_key_id: Option<(String, String)>,
}

impl<'a, R: RemoteOps> PlanExecutor<'a, R> {
    pub fn new(api: &'a R, config: ExecutorConfig) -> Self {
        Self {
            api,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            public_key_id: None,
        }
    }

    /// Flag that stops the run before the next operation when set.
    /// Interruption never aborts an in-flight API call.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Use an externally owned cancellation flag (e.g. wired to SIGINT)
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Apply the plan, returning a per-operation report.
    ///
    /// Never fails as a whole: fetch-phase problems surface before this
    /// point, and apply-phase problems are isolated per operation.
    pub async fn apply(mut self, plan: &ReconciliationPlan) -> ExecutionReport {
        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        let mut results = Vec::with_capacity(plan.operations.len());

        for op in &plan.operations {
            // Cancellation and deadline are observed only at operation
            // boundaries
            let outcome = if self.cancel.load(Ordering::SeqCst) {
                Outcome::Skipped(SkipReason::Cancelled)
            } else if deadline.is_some_and(|d| Instant::now() >= d) {
                Outcome::Skipped(SkipReason::TimedOut)
            } else if op.action == Action::Skip {
                Outcome::Skipped(SkipReason::Planned)
            } else {
                match self.execute(op).await {
                    Ok(()) => Outcome::Applied,
                    Err(e) => Outcome::Failed(e.to_string()),
                }
            };

            results.push(OperationReport {
                operation: op.clone(),
                outcome,
            });
        }

        ExecutionReport { results }
    }

    /// Run one operation with bounded retry on transient failures.
    ///
    /// Seal errors are precondition failures and are never transient, so
    /// a failed seal is reported after a single attempt.
    async fn execute(&mut self, op: &Operation) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match self.dispatch(op).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt + 1 < self.config.retry.max_attempts => {
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn dispatch(&mut self, op: &Operation) -> Result<()> {
        match (&op.payload, op.action) {
            (Payload::Label(payload), Action::Create) => self.api.create_label(payload).await,
            (Payload::Label(payload), Action::Update) => {
                let from = payload.rename_from.as_deref().unwrap_or(&payload.name);
                self.api.update_label(from, payload).await
            }
            (Payload::None, Action::Delete) if op.kind == EntityKind::Label => {
                self.api.delete_label(&op.target).await
            }
            (Payload::Protection(rule), Action::Create | Action::Update) => {
                self.api.put_protection(&op.target, rule).await
            }
            (Payload::None, Action::Delete) if op.kind == EntityKind::BranchProtection => {
                self.api.delete_protection(&op.target).await
            }
            (Payload::Topics(names), Action::Update) => self.api.replace_topics(names).await,
            (Payload::Settings(settings), Action::Update) => {
                self.api.update_settings(settings).await
            }
            (Payload::Secret(payload), Action::Update) => self.upload_secret(payload).await,
            (Payload::None, Action::Delete) if op.kind == EntityKind::Secret => {
                self.api.delete_secret(&op.target).await
            }
            _ => Err(Error::validation(
                format!("{} {}", op.kind, op.target),
                format!("cannot {} this entity", op.action),
            )),
        }
    }

    /// Resolve, seal and upload one secret
    async fn upload_secret(&mut self, payload: &SecretPayload) -> Result<()> {
        let plaintext = resolve_value(&payload.name, &payload.value_source)?;

        let (key, key_id) = match &self.public_key_id {
            Some((key, key_id)) => (key.clone(), key_id.clone()),
            None => {
                let fetched = self.api.secrets_public_key().await?;
                self.public_key_id = Some((fetched.key.clone(), fetched.key_id.clone()));
                (fetched.key, fetched.key_id)
            }
        };

        let sealed = SealedSecret {
            encrypted_value: seal(&payload.name, &key, &plaintext)?,
            key_id,
        };
        self.api.put_secret(&payload.name, &sealed).await
    }
}

/// Resolve a secret's plaintext from its configured source.
///
/// Failures here are seal-category: preconditions of the upload,
/// isolated to the one secret and never retried.
fn resolve_value(name: &str, source: &ValueSource) -> Result<String> {
    match source {
        ValueSource::Env(var) => std::env::var(var)
            .map_err(|_| Error::seal(name, format!("environment variable {var} is not set"))),
        ValueSource::File(path) => std::fs::read_to_string(path)
            .map(|content| content.trim_end_matches(['\r', '\n']).to_string())
            .map_err(|e| Error::seal(name, format!("cannot read {path}: {e}"))),
        ValueSource::Literal(value) => Ok(value.clone()),
    }
}
