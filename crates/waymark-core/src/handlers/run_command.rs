use std::collections::BTreeSet;
use std::path::PathBuf;

use log::info;

use super::StepContext;
use crate::{
    error::{Result, WaymarkError},
    interaction::CommandConsent,
    models::{RunCommandStep, StepEffect, StepExecutionResult},
};

/// Runs a shell command in the workspace root after explicit consent.
///
/// Skipping (or dismissing the prompt) completes the step without effect.
/// A non-zero exit is an error carrying the full captured output.
pub async fn run_command(
    step: &RunCommandStep,
    ctx: &StepContext<'_>,
    affected: &mut BTreeSet<PathBuf>,
) -> Result<StepExecutionResult> {
    let consent = ctx
        .run
        .interaction
        .command_consent(ctx.step_number, ctx.total_steps, step)
        .await?;

    if consent != Some(CommandConsent::Allow) {
        info!("Command `{}` skipped at the consent prompt", step.command);
        return Ok(StepExecutionResult::succeeded(
            StepEffect::Declined,
            format!("Skipped `{}`", step.command),
        ));
    }

    ctx.ensure_active()?;
    let output = ctx
        .run
        .commands
        .run(&step.command, ctx.root(), ctx.cancel)
        .await?;
    affected.insert(ctx.root().to_path_buf());

    if !output.success() {
        return Err(WaymarkError::CommandFailed {
            command: step.command.clone(),
            exit_code: output.exit_code,
            output: output.combined(),
        });
    }

    let message = format!("`{}` exited with code 0", step.command);
    Ok(StepExecutionResult::succeeded(
        StepEffect::Command(output),
        message,
    ))
}
