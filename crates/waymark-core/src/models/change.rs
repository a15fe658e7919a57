//! Change log entries and completed change sets.

use std::path::PathBuf;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::RunOutcome;

/// Type-safe enumeration of workspace mutations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(ChangeType::Created),
            "modified" => Ok(ChangeType::Modified),
            "deleted" => Ok(ChangeType::Deleted),
            _ => Err(format!("Invalid change type: {s}")),
        }
    }
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
        }
    }

    /// Get the change type with a leading marker for display.
    ///
    /// ```rust
    /// use waymark_core::models::ChangeType;
    ///
    /// assert_eq!(ChangeType::Created.with_icon(), "+ Created");
    /// assert_eq!(ChangeType::Modified.with_icon(), "~ Modified");
    /// assert_eq!(ChangeType::Deleted.with_icon(), "- Deleted");
    /// ```
    pub fn with_icon(&self) -> &'static str {
        match self {
            ChangeType::Created => "+ Created",
            ChangeType::Modified => "~ Modified",
            ChangeType::Deleted => "- Deleted",
        }
    }
}

/// Record of one successful workspace mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    /// Workspace-relative path of the affected file or directory
    pub file_path: String,

    pub change_type: ChangeType,

    /// Human-readable summary from the diff service
    pub summary: String,

    /// Unified-diff-style text; empty for directories
    pub diff_content: String,

    /// When the mutation was applied (UTC)
    pub timestamp: Timestamp,

    /// Content before the mutation, when there was any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,

    /// Content after the mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
}

/// Durable record of every change made by one finished run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPlanChangeSet {
    /// Identifier assigned by the history store (0 until persisted)
    pub id: u64,

    pub plan_description: String,

    pub outcome: RunOutcome,

    /// When the run finished (UTC)
    pub completed_at: Timestamp,

    /// Workspace root the entry paths are relative to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Entries in the order they were logged
    pub changes: Vec<ChangeLogEntry>,

    /// Set once the changes have been reverted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverted_at: Option<Timestamp>,
}

impl CompletedPlanChangeSet {
    /// A set with no changes, for runs that never got to execute.
    pub fn empty(plan_description: &str, outcome: RunOutcome) -> Self {
        Self {
            id: 0,
            plan_description: plan_description.to_string(),
            outcome,
            completed_at: Timestamp::now(),
            root: None,
            changes: Vec::new(),
            reverted_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
