//! Display wrappers for operation results.

use std::fmt;
use std::path::PathBuf;

use crate::{change_log::RevertReport, generation::task_pool::TaskOutcome, models::ExecutionPlan};

/// Result of reverting one change set.
pub struct RevertResult {
    pub change_set_id: u64,
    pub report: RevertReport,
}

impl fmt::Display for RevertResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Reverted {} path(s) from change set {}.",
            self.report.reverted.len(),
            self.change_set_id
        )?;
        for path in &self.report.reverted {
            writeln!(f, "- `{path}`")?;
        }
        if !self.report.skipped.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped:")?;
            for (path, reason) in &self.report.skipped {
                writeln!(f, "- `{path}`: {reason}")?;
            }
        }
        Ok(())
    }
}

/// A plan that parsed and passed structural validation.
pub struct ValidationResult<'a>(pub &'a ExecutionPlan);

impl fmt::Display for ValidationResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plan is valid: {} step(s).", self.0.len())?;
        writeln!(f)?;
        write!(f, "{}", self.0)
    }
}

/// Per-file results of a pooled analysis batch, in input order.
pub struct AnalysisResults(pub Vec<(PathBuf, TaskOutcome<String>)>);

impl fmt::Display for AnalysisResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No files analysed.");
        }

        for (index, (path, outcome)) in self.0.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "## {}", path.display())?;
            writeln!(f)?;
            match outcome {
                TaskOutcome::Completed(text) => writeln!(f, "{}", text.trim_end())?,
                TaskOutcome::Failed { attempts, error } => {
                    writeln!(f, "Failed after {attempts} attempt(s): {error}")?
                }
                TaskOutcome::TimedOut { attempts } => {
                    writeln!(f, "Timed out after {attempts} attempt(s).")?
                }
                TaskOutcome::Cancelled => writeln!(f, "Cancelled.")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_result_lists_skips() {
        let result = RevertResult {
            change_set_id: 4,
            report: RevertReport {
                reverted: vec!["a.txt".to_string()],
                skipped: vec![("b.txt".to_string(), "modified since the run".to_string())],
            },
        };
        let output = result.to_string();

        assert!(output.starts_with("Reverted 1 path(s) from change set 4."));
        assert!(output.contains("- `a.txt`"));
        assert!(output.contains("- `b.txt`: modified since the run"));
    }

    #[test]
    fn test_analysis_results() {
        let results = AnalysisResults(vec![
            (PathBuf::from("a.rs"), TaskOutcome::Completed("Looks fine.\n".to_string())),
            (PathBuf::from("b.rs"), TaskOutcome::TimedOut { attempts: 2 }),
            (
                PathBuf::from("c.rs"),
                TaskOutcome::Failed {
                    attempts: 1,
                    error: anyhow::anyhow!("boom"),
                },
            ),
        ]);
        let output = results.to_string();

        assert!(output.contains("## a.rs\n\nLooks fine.\n"));
        assert!(output.contains("Timed out after 2 attempt(s)."));
        assert!(output.contains("Failed after 1 attempt(s): boom"));
    }
}
