//! The workflow execution engine.
//!
//! [`WorkflowEngine::execute`] drives one [`ExecutionPlan`] to a terminal
//! [`RunOutcome`]. Steps run strictly in plan order; each goes through the
//! [`RetryController`] which owns auto-retry and escalation. Successful
//! mutations are appended to the run's [`ChangeLog`].
//!
//! Whatever the outcome, a run ends the same way: the change log is flushed
//! into the [`ChangeHistory`](crate::db::ChangeHistory), still-running
//! commands are killed and `run_completed` fires exactly once.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use waymark_core::{
//!     cancel::CancellationScope, engine::EngineBuilder, models::ExecutionPlan,
//! };
//! # use waymark_core::interaction::Interaction;
//! # async fn example(interaction: Arc<dyn Interaction>) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = EngineBuilder::new("/path/to/project")
//!     .with_interaction(interaction)
//!     .build()?;
//!
//! let plan = ExecutionPlan::from_json(&std::fs::read_to_string("plan.json")?)?;
//! let report = engine.execute(&plan, &CancellationScope::detached()).await;
//! println!("{}", report.outcome.with_icon());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;
use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::{
    cancel::CancellationScope,
    change_log::ChangeLog,
    error::Result,
    handlers::{execute_step, StepContext},
    models::{
        CompletedPlanChangeSet, ExecutionPlan, PlanStep, RunOutcome, RunReport, StepDisposition,
        StepExecutionResult, StepRecord,
    },
    retry::{RetryController, StepAttempt, StepResolution},
};

pub mod builder;
pub mod context;

pub use builder::EngineBuilder;
pub use context::RunContext;

/// Executes plans against one workspace, one at a time.
pub struct WorkflowEngine {
    context: RunContext,
    change_log: Mutex<ChangeLog>,
}

/// Runs the step handlers for one step, sharing the run's affected paths.
struct HandlerAttempt<'a> {
    step: &'a PlanStep,
    ctx: &'a StepContext<'a>,
    affected: &'a mut BTreeSet<PathBuf>,
}

#[async_trait]
impl StepAttempt for HandlerAttempt<'_> {
    async fn attempt(&mut self) -> Result<StepExecutionResult> {
        execute_step(self.step, self.ctx, self.affected).await
    }
}

/// Mutable state of the run in progress.
struct RunState {
    steps: Vec<StepRecord>,
    affected: BTreeSet<PathBuf>,
}

impl WorkflowEngine {
    pub(crate) fn new(context: RunContext) -> Self {
        let change_log = ChangeLog::with_root(context.root.clone());
        Self {
            context,
            change_log: Mutex::new(change_log),
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Change sets completed by this engine, oldest first.
    pub async fn completed_plan_change_sets(&self) -> Vec<CompletedPlanChangeSet> {
        self.change_log
            .lock()
            .await
            .completed_plan_change_sets()
            .to_vec()
    }

    /// Executes `plan` to completion.
    ///
    /// Never returns an error: engine-level failures (a failing interaction
    /// surface or history store, or a run already in progress) are reported
    /// as [`RunOutcome::Failed`] with a description in
    /// [`RunReport::failure`].
    pub async fn execute(&self, plan: &ExecutionPlan, cancel: &CancellationScope) -> RunReport {
        let Ok(mut log) = self.change_log.try_lock() else {
            warn!("Refusing to execute '{}': another plan is running", plan.description);
            let report = RunReport {
                outcome: RunOutcome::Failed,
                plan_description: plan.description.clone(),
                total_steps: plan.len(),
                steps: Vec::new(),
                change_set: CompletedPlanChangeSet::empty(&plan.description, RunOutcome::Failed),
                affected_paths: BTreeSet::new(),
                failure: Some("Another plan is already executing".to_string()),
            };
            self.context.observer.run_completed(&report);
            return report;
        };

        info!(
            "Executing plan '{}' ({} steps) in {}",
            plan.description,
            plan.len(),
            self.context.root.display()
        );
        self.context.observer.run_started(plan);

        let mut state = RunState {
            steps: Vec::with_capacity(plan.len()),
            affected: BTreeSet::new(),
        };
        let (mut outcome, mut failure) = match self.run_steps(plan, cancel, &mut log, &mut state).await
        {
            Ok(outcome) => (outcome, None),
            Err(e) => {
                error!("Plan '{}' failed: {e}", plan.description);
                (RunOutcome::Failed, Some(e.to_string()))
            }
        };

        self.context.commands.kill_all();

        let mut change_set = log.complete_plan(plan.description.clone(), outcome);
        match self.context.history.record(&change_set).await {
            Ok(id) => {
                change_set.id = id;
                log.mark_persisted(id);
            }
            Err(e) => {
                error!("Failed to record change history: {e}");
                if outcome == RunOutcome::Success {
                    outcome = RunOutcome::Failed;
                    change_set.outcome = outcome;
                }
                failure.get_or_insert_with(|| format!("Failed to record change history: {e}"));
            }
        }
        drop(log);

        info!(
            "Plan '{}' finished: {} ({} change(s))",
            plan.description,
            outcome.as_str(),
            change_set.changes.len()
        );
        let report = RunReport {
            outcome,
            plan_description: plan.description.clone(),
            total_steps: plan.len(),
            steps: state.steps,
            change_set,
            affected_paths: state.affected,
            failure,
        };
        self.context.observer.run_completed(&report);
        report
    }

    async fn run_steps(
        &self,
        plan: &ExecutionPlan,
        cancel: &CancellationScope,
        log: &mut ChangeLog,
        state: &mut RunState,
    ) -> Result<RunOutcome> {
        let total = plan.len();
        let controller = RetryController::new(
            &self.context.retry,
            self.context.interaction.as_ref(),
            self.context.observer.as_ref(),
        );

        for (index, step) in plan.steps.iter().enumerate() {
            let number = index + 1;
            if cancel.is_cancelled() {
                info!("Cancelled before step {number}/{total}");
                return Ok(RunOutcome::Cancelled);
            }

            self.context.observer.step_started(number, total, step);
            let ctx = StepContext::new(&self.context, cancel, number, total);
            let mut attempt = HandlerAttempt {
                step,
                ctx: &ctx,
                affected: &mut state.affected,
            };
            let run = match controller
                .run_step(number, total, step, cancel, &mut attempt)
                .await
            {
                Ok(run) => run,
                Err(e) => {
                    error!("Step {number}/{total} could not be resolved: {e}");
                    return Err(e);
                }
            };

            let disposition = match run.resolution {
                StepResolution::Completed(result) => {
                    if let Some(entry) = result.change() {
                        log.log_change(entry.clone());
                    }
                    self.context.observer.step_completed(number, total, &result);
                    StepDisposition::Completed(result)
                }
                StepResolution::Skipped => {
                    self.context.observer.step_skipped(number, total);
                    StepDisposition::Skipped
                }
                StepResolution::Cancelled => StepDisposition::Cancelled,
            };
            let cancelled = matches!(disposition, StepDisposition::Cancelled);
            state.steps.push(StepRecord {
                number,
                kind: step.kind(),
                description: step.description().to_string(),
                attempts: run.attempts,
                disposition,
            });
            if cancelled {
                return Ok(RunOutcome::Cancelled);
            }
        }

        Ok(RunOutcome::Success)
    }
}
