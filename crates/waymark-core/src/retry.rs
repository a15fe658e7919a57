//! Per-step retry and escalation.
//!
//! Each step runs through a small state machine:
//!
//! ```text
//! Attempting ──success──────────────────────────▶ Completed
//!     │ transient, auto-retries left ─▶ AutoRetry (sleep) ─▶ Attempting
//!     │ cancellation ───────────────────────────▶ Cancelled
//!     └ otherwise ─▶ Escalated ─┬ retry ─▶ Attempting (budget reset)
//!                               ├ skip ──▶ Skipped
//!                               └ cancel / no answer ─▶ Cancelled
//! ```
//!
//! Transient failures are retried silently up to
//! [`RetryPolicy::max_transient_step_retries`] times with a growing delay
//! before the user is asked. Everything else is escalated immediately.

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::{
    cancel::CancellationScope,
    config::RetryPolicy,
    error::Result,
    interaction::{Escalation, ExecutionObserver, FailureDecision, Interaction},
    models::{ErrorClass, PlanStep, StepExecutionResult},
};

/// One attempt at a step. Implemented by the engine over the step handlers.
#[async_trait]
pub trait StepAttempt: Send {
    async fn attempt(&mut self) -> Result<StepExecutionResult>;
}

/// How the controller resolved a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResolution {
    Completed(StepExecutionResult),
    Skipped,
    Cancelled,
}

/// A resolution together with the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRun {
    pub resolution: StepResolution,
    pub attempts: u32,
}

impl StepRun {
    fn new(resolution: StepResolution, attempts: u32) -> Self {
        Self {
            resolution,
            attempts,
        }
    }
}

pub struct RetryController<'a> {
    policy: &'a RetryPolicy,
    interaction: &'a dyn Interaction,
    observer: &'a dyn ExecutionObserver,
}

impl<'a> RetryController<'a> {
    pub fn new(
        policy: &'a RetryPolicy,
        interaction: &'a dyn Interaction,
        observer: &'a dyn ExecutionObserver,
    ) -> Self {
        Self {
            policy,
            interaction,
            observer,
        }
    }

    /// Drives `attempt` until the step completes, is skipped or the run is
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Only errors the step cannot be resolved around propagate: a failing
    /// interaction surface, or any non-cancellation error an attempt returns
    /// instead of a failed result.
    pub async fn run_step(
        &self,
        step_number: usize,
        total_steps: usize,
        step: &PlanStep,
        cancel: &CancellationScope,
        attempt: &mut dyn StepAttempt,
    ) -> Result<StepRun> {
        let mut attempts = 0u32;
        let mut auto_retries = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(StepRun::new(StepResolution::Cancelled, attempts));
            }

            attempts += 1;
            debug!("Step {step_number}/{total_steps} attempt {attempts}");
            let result = match attempt.attempt().await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => {
                    return Ok(StepRun::new(StepResolution::Cancelled, attempts))
                }
                Err(e) => return Err(e),
            };

            if result.success {
                return Ok(StepRun::new(StepResolution::Completed(result), attempts));
            }

            let class = result.error_class.unwrap_or(ErrorClass::NonTransient);
            let message = result.message.unwrap_or_default();

            match class {
                ErrorClass::Cancellation => {
                    return Ok(StepRun::new(StepResolution::Cancelled, attempts))
                }
                ErrorClass::Transient if auto_retries < self.policy.max_transient_step_retries => {
                    auto_retries += 1;
                    let delay = self.policy.delay_for(auto_retries);
                    warn!(
                        "Step {step_number}/{total_steps} failed transiently, auto-retry {auto_retries}/{} in {delay:?}: {message}",
                        self.policy.max_transient_step_retries
                    );
                    self.observer
                        .step_retrying(step_number, auto_retries, delay, &message);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Ok(StepRun::new(StepResolution::Cancelled, attempts));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
                _ => {}
            }

            let escalation = Escalation {
                step_number,
                total_steps,
                step_label: step.label(),
                error_class: class,
                message,
            };
            warn!("{}: {}", escalation.headline(), escalation.message);

            match self.interaction.failure_decision(&escalation).await? {
                Some(FailureDecision::Retry) => {
                    info!("Retrying step {step_number}/{total_steps} at the user's request");
                    auto_retries = 0;
                }
                Some(FailureDecision::Skip) => {
                    info!("Skipping step {step_number}/{total_steps}");
                    return Ok(StepRun::new(StepResolution::Skipped, attempts));
                }
                Some(FailureDecision::Cancel) | None => {
                    info!("Run cancelled at step {step_number}/{total_steps}");
                    return Ok(StepRun::new(StepResolution::Cancelled, attempts));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{
        error::WaymarkError,
        models::{RunCommandStep, StepEffect},
        test_support::{RecordingObserver, ScriptedInteraction},
    };

    struct Scripted {
        results: VecDeque<Result<StepExecutionResult>>,
        calls: u32,
    }

    impl Scripted {
        fn new(results: Vec<Result<StepExecutionResult>>) -> Self {
            Self {
                results: results.into(),
                calls: 0,
            }
        }
    }

    #[async_trait]
    impl StepAttempt for Scripted {
        async fn attempt(&mut self) -> Result<StepExecutionResult> {
            self.calls += 1;
            self.results
                .pop_front()
                .unwrap_or_else(|| Ok(StepExecutionResult::succeeded(StepEffect::None, "done")))
        }
    }

    fn transient() -> Result<StepExecutionResult> {
        Ok(StepExecutionResult::failed(
            ErrorClass::Transient,
            "429 Too Many Requests",
        ))
    }

    fn fatal() -> Result<StepExecutionResult> {
        Ok(StepExecutionResult::failed(
            ErrorClass::NonTransient,
            "File not found: src/lib.rs",
        ))
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_transient_step_retries: 3,
            base_delay_ms: 0,
            delay_increment_ms: 0,
        }
    }

    fn step() -> PlanStep {
        PlanStep::RunCommand(RunCommandStep {
            description: "Run it".to_string(),
            command: "true".to_string(),
        })
    }

    #[tokio::test]
    async fn test_transient_failures_retry_silently() {
        let policy = fast_policy();
        let interaction = ScriptedInteraction::new();
        let observer = RecordingObserver::default();
        let controller = RetryController::new(&policy, &interaction, &observer);
        let mut attempt = Scripted::new(vec![transient(), transient()]);

        let run = controller
            .run_step(1, 1, &step(), &CancellationScope::detached(), &mut attempt)
            .await
            .unwrap();

        assert!(matches!(run.resolution, StepResolution::Completed(_)));
        assert_eq!(run.attempts, 3);
        assert_eq!(observer.retries(), 2);
        assert!(interaction.escalations().is_empty());
    }

    #[tokio::test]
    async fn test_auto_retries_are_bounded_before_escalation() {
        let policy = fast_policy();
        let interaction = ScriptedInteraction::new().with_decisions([Some(FailureDecision::Skip)]);
        let observer = RecordingObserver::default();
        let controller = RetryController::new(&policy, &interaction, &observer);
        let mut attempt = Scripted::new((0..10).map(|_| transient()).collect());

        let run = controller
            .run_step(2, 4, &step(), &CancellationScope::detached(), &mut attempt)
            .await
            .unwrap();

        assert_eq!(run.resolution, StepResolution::Skipped);
        assert_eq!(observer.retries(), 3);
        assert_eq!(attempt.calls, 4);

        let escalations = interaction.escalations();
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].step_number, 2);
        assert_eq!(escalations[0].total_steps, 4);
        assert_eq!(escalations[0].error_class, ErrorClass::Transient);
    }

    #[tokio::test]
    async fn test_non_transient_escalates_immediately() {
        let policy = fast_policy();
        let interaction = ScriptedInteraction::new().with_decisions([Some(FailureDecision::Cancel)]);
        let observer = RecordingObserver::default();
        let controller = RetryController::new(&policy, &interaction, &observer);
        let mut attempt = Scripted::new(vec![fatal()]);

        let run = controller
            .run_step(1, 1, &step(), &CancellationScope::detached(), &mut attempt)
            .await
            .unwrap();

        assert_eq!(run.resolution, StepResolution::Cancelled);
        assert_eq!(observer.retries(), 0);
        assert!(interaction.escalations()[0].message.contains("File not found"));
    }

    #[tokio::test]
    async fn test_user_retry_resets_auto_retry_budget() {
        let policy = RetryPolicy {
            max_transient_step_retries: 1,
            ..fast_policy()
        };
        let interaction = ScriptedInteraction::new().with_decisions([Some(FailureDecision::Retry)]);
        let observer = RecordingObserver::default();
        let controller = RetryController::new(&policy, &interaction, &observer);
        let mut attempt = Scripted::new(vec![transient(), transient(), transient()]);

        let run = controller
            .run_step(1, 1, &step(), &CancellationScope::detached(), &mut attempt)
            .await
            .unwrap();

        // attempt 1 fails, auto-retry, attempt 2 fails, escalate and retry,
        // attempt 3 fails, auto-retry again, attempt 4 succeeds
        assert!(matches!(run.resolution, StepResolution::Completed(_)));
        assert_eq!(run.attempts, 4);
        assert_eq!(observer.retries(), 2);
        assert_eq!(interaction.escalations().len(), 1);
    }

    #[tokio::test]
    async fn test_dismissed_decision_cancels() {
        let policy = fast_policy();
        let interaction = ScriptedInteraction::new().with_decisions([None]);
        let observer = RecordingObserver::default();
        let controller = RetryController::new(&policy, &interaction, &observer);
        let mut attempt = Scripted::new(vec![fatal()]);

        let run = controller
            .run_step(1, 1, &step(), &CancellationScope::detached(), &mut attempt)
            .await
            .unwrap();
        assert_eq!(run.resolution, StepResolution::Cancelled);
    }

    #[tokio::test]
    async fn test_cancellation_propagates_without_retry() {
        let policy = fast_policy();
        let interaction = ScriptedInteraction::new();
        let observer = RecordingObserver::default();
        let controller = RetryController::new(&policy, &interaction, &observer);
        let mut attempt = Scripted::new(vec![Err(WaymarkError::Cancelled)]);

        let run = controller
            .run_step(1, 1, &step(), &CancellationScope::detached(), &mut attempt)
            .await
            .unwrap();

        assert_eq!(run.resolution, StepResolution::Cancelled);
        assert_eq!(attempt.calls, 1);
        assert!(interaction.escalations().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_retrying() {
        let policy = RetryPolicy {
            max_transient_step_retries: 3,
            base_delay_ms: 60_000,
            delay_increment_ms: 0,
        };
        let interaction = ScriptedInteraction::new();
        let observer = RecordingObserver::default();
        let controller = RetryController::new(&policy, &interaction, &observer);
        let mut attempt = Scripted::new(vec![transient()]);

        let source = CancellationToken::new();
        let scope = CancellationScope::new(vec![source.clone()]);
        let trigger = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            source.cancel();
        });

        let run = controller
            .run_step(1, 1, &step(), &scope, &mut attempt)
            .await
            .unwrap();
        trigger.await.unwrap();

        assert_eq!(run.resolution, StepResolution::Cancelled);
        assert_eq!(attempt.calls, 1);
    }

    #[tokio::test]
    async fn test_interaction_failure_propagates() {
        let policy = fast_policy();
        let interaction = ScriptedInteraction::new().failing_decisions();
        let observer = RecordingObserver::default();
        let controller = RetryController::new(&policy, &interaction, &observer);
        let mut attempt = Scripted::new(vec![fatal()]);

        let result = controller
            .run_step(1, 1, &step(), &CancellationScope::detached(), &mut attempt)
            .await;
        assert!(matches!(result, Err(WaymarkError::Interaction { .. })));
    }
}
