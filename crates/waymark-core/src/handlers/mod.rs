//! Step handlers, one per [`PlanStep`] variant.
//!
//! Every handler receives the step, a [`StepContext`] and the run's set of
//! affected paths, and performs exactly one attempt. Handlers report errors
//! by returning `Err`; [`execute_step`] then folds every error except
//! cancellation and interaction failures into a failed
//! [`StepExecutionResult`] carrying its [`ErrorClass`].
//!
//! ```text
//! RetryController → execute_step → create_directory | create_file
//!                                  | modify_file | run_command
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::debug;

use crate::{
    cancel::CancellationScope,
    engine::RunContext,
    error::{Result, WaymarkError},
    generation::GenerationRequest,
    interaction::ObserverListener,
    models::{validate_relative_path, ErrorClass, PlanStep, StepExecutionResult},
};

pub mod content;
pub mod create_directory;
pub mod create_file;
pub mod modify_file;
pub mod run_command;

pub use create_directory::create_directory;
pub use create_file::create_file;
pub use modify_file::modify_file;
pub use run_command::run_command;

/// Everything a handler needs for one attempt at one step.
pub struct StepContext<'a> {
    pub run: &'a RunContext,
    pub cancel: &'a CancellationScope,
    /// 1-based position of the step
    pub step_number: usize,
    pub total_steps: usize,
}

impl<'a> StepContext<'a> {
    pub fn new(
        run: &'a RunContext,
        cancel: &'a CancellationScope,
        step_number: usize,
        total_steps: usize,
    ) -> Self {
        Self {
            run,
            cancel,
            step_number,
            total_steps,
        }
    }

    pub fn root(&self) -> &Path {
        &self.run.root
    }

    /// Resolves a workspace-relative plan path against the root.
    ///
    /// Plans are validated on parse, but hosts may construct steps directly,
    /// so paths that would escape the root are rejected here too.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        validate_relative_path(path)
            .map_err(|reason| WaymarkError::invalid_plan(self.step_number).with_reason(reason))?;
        Ok(self.run.root.join(path))
    }

    /// Returns `Err(Cancelled)` once the scope has fired.
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(WaymarkError::Cancelled);
        }
        Ok(())
    }

    /// Runs one generation request through the resilience layer, forwarding
    /// credential switches to the run's observer.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.ensure_active()?;
        let listener = ObserverListener::new(self.run.observer.as_ref());
        let text = self
            .run
            .generator
            .generate(
                &self.run.credentials,
                &self.run.model,
                request,
                self.cancel,
                &listener,
            )
            .await?;
        Ok(text)
    }
}

/// Performs one attempt at `step`.
///
/// # Errors
///
/// Returns `WaymarkError::Cancelled` when the attempt observed cancellation
/// and `WaymarkError::Interaction` when the host could not be asked for
/// consent. Every other failure comes back as `Ok` with `success == false`.
pub async fn execute_step(
    step: &PlanStep,
    ctx: &StepContext<'_>,
    affected: &mut BTreeSet<PathBuf>,
) -> Result<StepExecutionResult> {
    ctx.ensure_active()?;

    let attempt = match step {
        PlanStep::CreateDirectory(step) => create_directory(step, ctx, affected).await,
        PlanStep::CreateFile(step) => create_file(step, ctx, affected).await,
        PlanStep::ModifyFile(step) => modify_file(step, ctx, affected).await,
        PlanStep::RunCommand(step) => run_command(step, ctx, affected).await,
    };

    let error = match attempt {
        Ok(result) => return Ok(result),
        Err(error @ WaymarkError::Interaction { .. }) => return Err(error),
        Err(error) => error,
    };

    // Failures caused by a fired scope (killed commands, aborted streams)
    // count as cancellation whatever their message says.
    if ctx.cancel.is_cancelled() {
        return Err(WaymarkError::Cancelled);
    }

    let class = ctx.run.classifier.classify(&error);
    debug!(
        "Step {}/{} attempt failed ({class}): {error}",
        ctx.step_number, ctx.total_steps
    );
    match class {
        ErrorClass::Cancellation => Err(WaymarkError::Cancelled),
        class => Ok(StepExecutionResult::failed(class, error.to_string())),
    }
}
