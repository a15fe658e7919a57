use std::collections::BTreeSet;
use std::path::PathBuf;

use jiff::Timestamp;
use log::debug;

use super::{content, StepContext};
use crate::{
    error::Result,
    models::{ChangeLogEntry, ChangeType, CreateFileStep, FileSource, StepEffect, StepExecutionResult},
};

/// Writes a file from literal or generated content.
///
/// If the file already holds exactly that content the step is a no-op.
/// Otherwise missing parent directories are created, the file is written
/// and the change is recorded with a full-file diff against empty content.
pub async fn create_file(
    step: &CreateFileStep,
    ctx: &StepContext<'_>,
    affected: &mut BTreeSet<PathBuf>,
) -> Result<StepExecutionResult> {
    let path = ctx.resolve(&step.path)?;
    let storage = ctx.run.storage.as_ref();

    let content = match &step.source {
        FileSource::Literal(content) => content.clone(),
        FileSource::Generate { prompt } => {
            debug!("Generating content for {}", step.path);
            let raw = ctx
                .generate(&content::create_file_request(&step.path, prompt))
                .await?;
            content::normalize_generated(&step.path, &raw, "")?
        }
    };

    let existing = match storage.read_to_string(&path).await {
        Ok(existing) => Some(existing),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    if existing.as_deref() == Some(content.as_str()) {
        affected.insert(path);
        return Ok(StepExecutionResult::succeeded(
            StepEffect::AlreadyCorrect,
            format!("{} already has the requested content", step.path),
        ));
    }

    ctx.ensure_active()?;
    if let Some(parent) = path.parent() {
        storage.create_dir_all(parent).await?;
    }
    storage.write(&path, &content).await?;
    affected.insert(path);

    let diff = ctx.run.diff.summarize(&step.path, "", &content);
    let change_type = if existing.is_some() {
        ChangeType::Modified
    } else {
        ChangeType::Created
    };
    let entry = ChangeLogEntry {
        file_path: step.path.clone(),
        change_type,
        summary: diff.summary.clone(),
        diff_content: diff.diff,
        timestamp: Timestamp::now(),
        original_content: existing,
        new_content: Some(content),
    };
    Ok(StepExecutionResult::succeeded(
        StepEffect::Changed(entry),
        diff.summary,
    ))
}
