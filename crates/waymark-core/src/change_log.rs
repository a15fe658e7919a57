//! Append-only record of the mutations made by a run.
//!
//! The engine appends one [`ChangeLogEntry`] per successful, non-no-op
//! mutating step. Entries are never edited or removed mid-run. At run end
//! [`ChangeLog::complete_plan`] moves them into a [`CompletedPlanChangeSet`]
//! and clears the live log, whatever the outcome.

use std::path::{Path, PathBuf};

use jiff::Timestamp;
use log::{debug, warn};

use crate::{
    error::Result,
    models::{ChangeLogEntry, ChangeType, CompletedPlanChangeSet, RunOutcome},
    workspace::WorkspaceStorage,
};

#[derive(Debug, Default)]
pub struct ChangeLog {
    root: Option<PathBuf>,
    entries: Vec<ChangeLogEntry>,
    completed: Vec<CompletedPlanChangeSet>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log whose completed sets remember the workspace root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    pub fn log_change(&mut self, entry: ChangeLogEntry) {
        debug!(
            "Logged {} of {}",
            entry.change_type.as_str(),
            entry.file_path
        );
        self.entries.push(entry);
    }

    /// Entries of the current run, oldest first.
    pub fn entries(&self) -> &[ChangeLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Flushes the live entries into a completed change set, records it in
    /// this session's list and returns it for persistence.
    pub fn complete_plan(
        &mut self,
        description: impl Into<String>,
        outcome: RunOutcome,
    ) -> CompletedPlanChangeSet {
        let set = CompletedPlanChangeSet {
            id: 0,
            plan_description: description.into(),
            outcome,
            completed_at: Timestamp::now(),
            root: self.root.clone(),
            changes: std::mem::take(&mut self.entries),
            reverted_at: None,
        };
        self.completed.push(set.clone());
        set
    }

    /// Records the id the history store assigned to the latest completed set.
    pub fn mark_persisted(&mut self, id: u64) {
        if let Some(last) = self.completed.last_mut() {
            last.id = id;
        }
    }

    /// Completed change sets of this session, oldest first.
    pub fn completed_plan_change_sets(&self) -> &[CompletedPlanChangeSet] {
        &self.completed
    }
}

/// What [`revert_change_set`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevertReport {
    /// Paths restored to their state before the run
    pub reverted: Vec<String>,
    /// Paths left alone, with the reason
    pub skipped: Vec<(String, String)>,
}

/// Undoes a completed change set, newest entry first.
///
/// Created files are removed, modified files get their original content
/// back and deleted files are re-created. A file whose current content no
/// longer matches what the run left behind is skipped rather than
/// overwritten. Created directories are left in place.
pub async fn revert_change_set(
    set: &CompletedPlanChangeSet,
    storage: &dyn WorkspaceStorage,
    root: &Path,
) -> Result<RevertReport> {
    let mut report = RevertReport::default();

    for entry in set.changes.iter().rev() {
        let path = root.join(&entry.file_path);
        let current = match storage.read_to_string(&path).await {
            Ok(content) => Some(content),
            Err(e) if e.is_not_found() => None,
            Err(e) => match storage.stat(&path).await {
                Ok(stat) if stat.is_dir => None,
                _ => return Err(e.into()),
            },
        };

        let skip = |report: &mut RevertReport, reason: &str| {
            warn!("Not reverting {}: {reason}", entry.file_path);
            report
                .skipped
                .push((entry.file_path.clone(), reason.to_string()));
        };

        match entry.change_type {
            ChangeType::Created => {
                let Some(created) = &entry.new_content else {
                    skip(&mut report, "directories are left in place");
                    continue;
                };
                match current {
                    None => skip(&mut report, "already removed"),
                    Some(content) if &content != created => {
                        skip(&mut report, "modified since the run")
                    }
                    Some(_) => {
                        storage.remove_file(&path).await?;
                        report.reverted.push(entry.file_path.clone());
                    }
                }
            }
            ChangeType::Modified => {
                let Some(original) = &entry.original_content else {
                    skip(&mut report, "original content was not recorded");
                    continue;
                };
                match (&current, &entry.new_content) {
                    (None, _) => skip(&mut report, "file no longer exists"),
                    (Some(content), Some(expected)) if content != expected => {
                        skip(&mut report, "modified since the run")
                    }
                    _ => {
                        storage.write(&path, original).await?;
                        report.reverted.push(entry.file_path.clone());
                    }
                }
            }
            ChangeType::Deleted => {
                let Some(original) = &entry.original_content else {
                    skip(&mut report, "original content was not recorded");
                    continue;
                };
                if current.is_some() {
                    skip(&mut report, "file exists again");
                    continue;
                }
                if let Some(parent) = path.parent() {
                    storage.create_dir_all(parent).await?;
                }
                storage.write(&path, original).await?;
                report.reverted.push(entry.file_path.clone());
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::workspace::LocalWorkspace;

    fn entry(
        path: &str,
        change_type: ChangeType,
        original: Option<&str>,
        new: Option<&str>,
    ) -> ChangeLogEntry {
        ChangeLogEntry {
            file_path: path.to_string(),
            change_type,
            summary: format!("{path}: changed"),
            diff_content: String::new(),
            timestamp: Timestamp::now(),
            original_content: original.map(String::from),
            new_content: new.map(String::from),
        }
    }

    #[test]
    fn test_complete_plan_flushes_and_clears() {
        let mut log = ChangeLog::with_root("/work");
        log.log_change(entry("a.txt", ChangeType::Created, None, Some("a")));
        log.log_change(entry("b.txt", ChangeType::Modified, Some("b"), Some("B")));
        assert_eq!(log.len(), 2);

        let set = log.complete_plan("Two changes", RunOutcome::Success);
        assert_eq!(set.changes.len(), 2);
        assert_eq!(set.changes[0].file_path, "a.txt");
        assert_eq!(set.root.as_deref(), Some(Path::new("/work")));
        assert!(log.is_empty());

        log.mark_persisted(7);
        assert_eq!(log.completed_plan_change_sets().len(), 1);
        assert_eq!(log.completed_plan_change_sets()[0].id, 7);
    }

    #[test]
    fn test_complete_plan_with_no_changes() {
        let mut log = ChangeLog::new();
        let set = log.complete_plan("Nothing", RunOutcome::Cancelled);
        assert!(set.is_empty());
        assert_eq!(set.outcome, RunOutcome::Cancelled);
        assert_eq!(log.completed_plan_change_sets().len(), 1);
    }

    #[tokio::test]
    async fn test_revert_restores_workspace() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/new.txt"), "fresh\n").unwrap();
        std::fs::write(root.join("src/lib.rs"), "after\n").unwrap();

        let mut log = ChangeLog::new();
        log.log_change(entry("src", ChangeType::Created, None, None));
        log.log_change(entry("src/new.txt", ChangeType::Created, None, Some("fresh\n")));
        log.log_change(entry(
            "src/lib.rs",
            ChangeType::Modified,
            Some("before\n"),
            Some("after\n"),
        ));
        log.log_change(entry("old.txt", ChangeType::Deleted, Some("old\n"), None));
        let set = log.complete_plan("Revert me", RunOutcome::Success);

        let report = revert_change_set(&set, &LocalWorkspace, root)
            .await
            .expect("Revert should succeed");

        assert_eq!(report.reverted, vec!["old.txt", "src/lib.rs", "src/new.txt"]);
        assert_eq!(report.skipped.len(), 1);
        assert!(!root.join("src/new.txt").exists());
        assert!(root.join("src").is_dir());
        assert_eq!(std::fs::read_to_string(root.join("src/lib.rs")).unwrap(), "before\n");
        assert_eq!(std::fs::read_to_string(root.join("old.txt")).unwrap(), "old\n");
    }

    #[tokio::test]
    async fn test_revert_skips_files_changed_since() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();
        std::fs::write(root.join("a.txt"), "edited by hand\n").unwrap();

        let mut log = ChangeLog::new();
        log.log_change(entry("a.txt", ChangeType::Modified, Some("v1\n"), Some("v2\n")));
        let set = log.complete_plan("Conflict", RunOutcome::Success);

        let report = revert_change_set(&set, &LocalWorkspace, root).await.unwrap();
        assert!(report.reverted.is_empty());
        assert_eq!(report.skipped[0].1, "modified since the run");
        assert_eq!(
            std::fs::read_to_string(root.join("a.txt")).unwrap(),
            "edited by hand\n"
        );
    }
}
