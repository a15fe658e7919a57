use std::collections::BTreeSet;
use std::path::PathBuf;

use jiff::Timestamp;

use super::StepContext;
use crate::{
    error::Result,
    models::{ChangeLogEntry, ChangeType, CreateDirectoryStep, StepEffect, StepExecutionResult},
    workspace::StorageError,
};

/// Creates the directory and any missing parents.
///
/// A directory that already exists is not an error; it yields
/// [`StepEffect::AlreadyCorrect`] and no change log entry.
pub async fn create_directory(
    step: &CreateDirectoryStep,
    ctx: &StepContext<'_>,
    affected: &mut BTreeSet<PathBuf>,
) -> Result<StepExecutionResult> {
    let path = ctx.resolve(&step.path)?;
    let storage = ctx.run.storage.as_ref();

    let existed = match storage.stat(&path).await {
        Ok(stat) if stat.is_dir => true,
        Ok(_) => {
            return Err(StorageError::Io {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "a file already exists at this path",
                ),
            }
            .into())
        }
        Err(e) if e.is_not_found() => false,
        Err(e) => return Err(e.into()),
    };

    if existed {
        affected.insert(path);
        return Ok(StepExecutionResult::succeeded(
            StepEffect::AlreadyCorrect,
            format!("Directory {} already exists", step.path),
        ));
    }

    ctx.ensure_active()?;
    storage.create_dir_all(&path).await?;
    affected.insert(path);

    let summary = format!("Created directory {}", step.path);
    let entry = ChangeLogEntry {
        file_path: step.path.clone(),
        change_type: ChangeType::Created,
        summary: summary.clone(),
        diff_content: String::new(),
        timestamp: Timestamp::now(),
        original_content: None,
        new_content: None,
    };
    Ok(StepExecutionResult::succeeded(
        StepEffect::Changed(entry),
        summary,
    ))
}
