//! Run outcomes and per-run reports.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{CompletedPlanChangeSet, StepExecutionResult, StepKind};

/// Terminal outcome of a workflow run. Exactly one per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Cancelled,
    Failed,
}

impl FromStr for RunOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(RunOutcome::Success),
            "cancelled" | "canceled" => Ok(RunOutcome::Cancelled),
            "failed" => Ok(RunOutcome::Failed),
            _ => Err(format!("Invalid run outcome: {s}")),
        }
    }
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Failed => "failed",
        }
    }

    /// ```rust
    /// use waymark_core::models::RunOutcome;
    ///
    /// assert_eq!(RunOutcome::Success.with_icon(), "✓ Success");
    /// assert_eq!(RunOutcome::Cancelled.with_icon(), "■ Cancelled");
    /// assert_eq!(RunOutcome::Failed.with_icon(), "✗ Failed");
    /// ```
    pub fn with_icon(&self) -> &'static str {
        match self {
            RunOutcome::Success => "✓ Success",
            RunOutcome::Cancelled => "■ Cancelled",
            RunOutcome::Failed => "✗ Failed",
        }
    }
}

/// How a step ended within a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StepDisposition {
    /// The final attempt succeeded
    Completed(StepExecutionResult),
    /// The user chose to skip after a failure
    Skipped,
    /// The run was cancelled while this step was current
    Cancelled,
}

/// Record of one step the engine reached.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// 1-based position in the plan
    pub number: usize,
    pub kind: StepKind,
    pub description: String,
    /// Attempts made, including auto-retries and user retries
    pub attempts: u32,
    pub disposition: StepDisposition,
}

/// Everything a host needs after a run finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub plan_description: String,
    pub total_steps: usize,
    /// Steps the engine reached, in order
    pub steps: Vec<StepRecord>,
    /// The flushed change log for this run
    pub change_set: CompletedPlanChangeSet,
    /// Absolute paths touched by any handler during the run
    pub affected_paths: BTreeSet<PathBuf>,
    /// Engine-level failure description when `outcome` is `Failed`
    pub failure: Option<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    /// Number of steps that ended `Completed`.
    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|record| matches!(record.disposition, StepDisposition::Completed(_)))
            .count()
    }
}
