use std::collections::BTreeSet;
use std::path::PathBuf;

use jiff::Timestamp;
use log::debug;

use super::{content, StepContext};
use crate::{
    error::Result,
    models::{ChangeLogEntry, ChangeType, ModifyFileStep, StepEffect, StepExecutionResult},
    workspace::TextEdit,
};

/// Rewrites an existing file through the generation service.
///
/// The generated content is applied as one minimal [`TextEdit`] covering
/// only the range between the common prefix and suffix, so editor-backed
/// storage keeps cursor and undo state. A result with no added or removed
/// lines is a no-op.
pub async fn modify_file(
    step: &ModifyFileStep,
    ctx: &StepContext<'_>,
    affected: &mut BTreeSet<PathBuf>,
) -> Result<StepExecutionResult> {
    let path = ctx.resolve(&step.path)?;
    let storage = ctx.run.storage.as_ref();

    let current = storage.read_to_string(&path).await?;
    let raw = ctx
        .generate(&content::modify_file_request(
            &step.path,
            &step.modification_prompt,
            &current,
        ))
        .await?;
    let updated = content::normalize_generated(&step.path, &raw, &current)?;
    affected.insert(path.clone());

    let diff = ctx.run.diff.summarize(&step.path, &current, &updated);
    if diff.is_unchanged() {
        return Ok(StepExecutionResult::succeeded(
            StepEffect::AlreadyCorrect,
            format!("{} is already correct", step.path),
        ));
    }

    ctx.ensure_active()?;
    if let Some(edit) = TextEdit::minimal(&current, &updated) {
        debug!(
            "Replacing bytes {}..{} of {}",
            edit.start, edit.end, step.path
        );
        storage.apply_edit(&path, &edit).await?;
    }

    let entry = ChangeLogEntry {
        file_path: step.path.clone(),
        change_type: ChangeType::Modified,
        summary: diff.summary.clone(),
        diff_content: diff.diff,
        timestamp: Timestamp::now(),
        original_content: Some(current),
        new_content: Some(updated),
    };
    Ok(StepExecutionResult::succeeded(
        StepEffect::Changed(entry),
        diff.summary,
    ))
}
