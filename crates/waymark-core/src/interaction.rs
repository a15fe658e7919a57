//! The host's interactive surface and progress notifications.
//!
//! [`Interaction`] answers the two questions the engine cannot decide on
//! its own: whether a command may run, and what to do about a failed step.
//! Both answers are optional; a dismissed prompt returns `Ok(None)`.
//!
//! [`ExecutionObserver`] receives fire-and-forget progress notifications.
//! Every method has a no-op default so hosts implement only what they show.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    error::Result,
    generation::GenerationListener,
    models::{ErrorClass, ExecutionPlan, PlanStep, RunCommandStep, RunReport, StepExecutionResult},
};

/// Answer to a command consent prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandConsent {
    Allow,
    Skip,
}

/// Answer to a failure escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDecision {
    /// Attempt the step again with a fresh auto-retry budget
    Retry,
    /// Mark the step complete without effect and continue
    Skip,
    /// Abort the whole run
    Cancel,
}

/// A failed step that needs a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    /// 1-based position of the failing step
    pub step_number: usize,
    pub total_steps: usize,
    pub step_label: String,
    pub error_class: ErrorClass,
    /// Formatted error of the last attempt
    pub message: String,
}

impl Escalation {
    /// One-line headline, e.g. `Step 2/5 failed (modify_file: src/lib.rs)`.
    pub fn headline(&self) -> String {
        format!(
            "Step {}/{} failed ({})",
            self.step_number, self.total_steps, self.step_label
        )
    }
}

/// Consent and failure decisions, provided by the host.
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Asks whether the command of step `step_number` may run.
    async fn command_consent(
        &self,
        step_number: usize,
        total_steps: usize,
        step: &RunCommandStep,
    ) -> Result<Option<CommandConsent>>;

    /// Asks how to proceed after a failed step.
    async fn failure_decision(&self, escalation: &Escalation) -> Result<Option<FailureDecision>>;
}

/// Progress notifications emitted during a run.
#[allow(unused_variables)]
pub trait ExecutionObserver: Send + Sync {
    fn run_started(&self, plan: &ExecutionPlan) {}

    fn step_started(&self, step_number: usize, total_steps: usize, step: &PlanStep) {}

    fn step_completed(&self, step_number: usize, total_steps: usize, result: &StepExecutionResult) {
    }

    fn step_skipped(&self, step_number: usize, total_steps: usize) {}

    /// A transient failure is about to be retried automatically.
    fn step_retrying(&self, step_number: usize, attempt: u32, delay: Duration, message: &str) {}

    fn credential_switched(&self, from: usize, to: usize, pool_size: usize) {}

    /// Fires exactly once per run, whatever the outcome.
    fn run_completed(&self, report: &RunReport) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}

/// Forwards resilience-layer notifications to an [`ExecutionObserver`].
pub struct ObserverListener<'a> {
    observer: &'a dyn ExecutionObserver,
}

impl<'a> ObserverListener<'a> {
    pub fn new(observer: &'a dyn ExecutionObserver) -> Self {
        Self { observer }
    }
}

impl GenerationListener for ObserverListener<'_> {
    fn credential_switched(&self, from: usize, to: usize, pool_size: usize) {
        self.observer.credential_switched(from, to, pool_size);
    }
}
