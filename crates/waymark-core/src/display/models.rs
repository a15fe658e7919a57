//! Display implementations for domain models.

use std::fmt;

use super::LocalDateTime;
use crate::models::{
    ChangeLogEntry, ChangeType, CompletedPlanChangeSet, ExecutionPlan, FileSource, PlanStep,
    RunOutcome, RunReport, StepDisposition, StepEffect, StepExecutionResult, StepRecord,
};

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "**{}** {}", self.kind(), self.description())?;
        match self {
            PlanStep::CreateDirectory(step) => write!(f, " (`{}`)", step.path),
            PlanStep::CreateFile(step) => match &step.source {
                FileSource::Literal(content) => {
                    write!(f, " (`{}`, {} bytes)", step.path, content.len())
                }
                FileSource::Generate { .. } => write!(f, " (`{}`, generated)", step.path),
            },
            PlanStep::ModifyFile(step) => write!(f, " (`{}`)", step.path),
            PlanStep::RunCommand(step) => write!(f, " (`{}`)", step.command),
        }
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}", self.description)?;
        writeln!(f)?;
        if self.steps.is_empty() {
            return writeln!(f, "No steps.");
        }
        for (index, step) in self.steps.iter().enumerate() {
            writeln!(f, "{}. {step}", index + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ChangeLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "- {} `{}` at {}",
            self.change_type.with_icon(),
            self.file_path,
            LocalDateTime(&self.timestamp)
        )?;
        if !self.summary.is_empty() {
            writeln!(f, "  - {}", self.summary)?;
        }
        Ok(())
    }
}

impl fmt::Display for CompletedPlanChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Change set {}", self.id)?;
        writeln!(f)?;
        writeln!(f, "- **Plan**: {}", self.plan_description)?;
        writeln!(f, "- **Outcome**: {}", self.outcome.with_icon())?;
        writeln!(f, "- **Completed**: {}", LocalDateTime(&self.completed_at))?;
        if let Some(root) = &self.root {
            writeln!(f, "- **Workspace**: `{}`", root.display())?;
        }
        if let Some(reverted_at) = &self.reverted_at {
            writeln!(f, "- **Reverted**: {}", LocalDateTime(reverted_at))?;
        }
        writeln!(f)?;

        if self.changes.is_empty() {
            return writeln!(f, "No changes recorded.");
        }

        writeln!(f, "## Changes")?;
        writeln!(f)?;
        for entry in &self.changes {
            write!(f, "{entry}")?;
        }
        for entry in self.changes.iter().filter(|e| !e.diff_content.is_empty()) {
            writeln!(f)?;
            writeln!(f, "### {}", entry.file_path)?;
            writeln!(f)?;
            writeln!(f, "```diff")?;
            write!(f, "{}", entry.diff_content)?;
            if !entry.diff_content.ends_with('\n') {
                writeln!(f)?;
            }
            writeln!(f, "```")?;
        }
        Ok(())
    }
}

impl fmt::Display for StepExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message.as_deref().unwrap_or_default();
        if !self.success {
            let class = self
                .error_class
                .map(|class| class.as_str())
                .unwrap_or("unclassified");
            return write!(f, "failed ({class}): {message}");
        }
        match &self.effect {
            StepEffect::AlreadyCorrect => write!(f, "already up to date"),
            StepEffect::Declined => write!(f, "skipped by user"),
            StepEffect::Changed(entry) => {
                write!(f, "{} `{}`", entry.change_type, entry.file_path)
            }
            StepEffect::Command(output) => {
                write!(f, "command exited with code {}", output.exit_code)
            }
            StepEffect::None => f.write_str(message),
        }
    }
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &self.disposition {
            StepDisposition::Completed(result) => format!("✓ {result}"),
            StepDisposition::Skipped => "↷ skipped after failure".to_string(),
            StepDisposition::Cancelled => "■ cancelled".to_string(),
        };
        write!(
            f,
            "{}. **{}** {}: {status}",
            self.number, self.kind, self.description
        )?;
        if self.attempts > 1 {
            write!(f, " ({} attempts)", self.attempts)?;
        }
        Ok(())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}", self.plan_description)?;
        writeln!(f)?;
        writeln!(f, "- **Outcome**: {}", self.outcome.with_icon())?;
        writeln!(
            f,
            "- **Steps completed**: {} of {}",
            self.completed_steps(),
            self.total_steps
        )?;
        writeln!(f, "- **Changes recorded**: {}", self.change_set.changes.len())?;
        if self.change_set.id > 0 {
            writeln!(f, "- **Change set**: {}", self.change_set.id)?;
        }
        if let Some(failure) = &self.failure {
            writeln!(f, "- **Error**: {failure}")?;
        }

        if !self.steps.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Steps")?;
            writeln!(f)?;
            for record in &self.steps {
                writeln!(f, "{record}")?;
            }
        }

        if !self.change_set.changes.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Changes")?;
            writeln!(f)?;
            for entry in &self.change_set.changes {
                write!(f, "{entry}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use jiff::Timestamp;

    use super::*;
    use crate::models::{ErrorClass, RunCommandStep, StepKind};

    fn entry(path: &str, diff: &str) -> ChangeLogEntry {
        ChangeLogEntry {
            file_path: path.to_string(),
            change_type: ChangeType::Created,
            summary: "Created with 1 line".to_string(),
            diff_content: diff.to_string(),
            timestamp: Timestamp::now(),
            original_content: None,
            new_content: Some("hello\n".to_string()),
        }
    }

    fn change_set(changes: Vec<ChangeLogEntry>) -> CompletedPlanChangeSet {
        CompletedPlanChangeSet {
            id: 7,
            plan_description: "Add greeting".to_string(),
            outcome: RunOutcome::Success,
            completed_at: Timestamp::now(),
            root: None,
            changes,
            reverted_at: None,
        }
    }

    #[test]
    fn test_change_set_display_includes_diffs() {
        let set = change_set(vec![entry("hello.txt", "+hello\n"), entry("dir", "")]);
        let output = set.to_string();

        assert!(output.contains("# Change set 7"));
        assert!(output.contains("✓ Success"));
        assert!(output.contains("+ Created `hello.txt`"));
        assert!(output.contains("### hello.txt"));
        assert!(output.contains("```diff\n+hello\n```"));
        // Directories carry no diff block.
        assert!(!output.contains("### dir"));
    }

    #[test]
    fn test_empty_change_set_display() {
        let output = change_set(Vec::new()).to_string();
        assert!(output.contains("No changes recorded."));
    }

    #[test]
    fn test_step_result_display() {
        let failed = StepExecutionResult::failed(ErrorClass::Transient, "rate limited");
        assert_eq!(failed.to_string(), "failed (transient): rate limited");

        let no_op = StepExecutionResult::succeeded(StepEffect::AlreadyCorrect, "ok");
        assert_eq!(no_op.to_string(), "already up to date");
    }

    #[test]
    fn test_run_report_display() {
        let report = RunReport {
            outcome: RunOutcome::Cancelled,
            plan_description: "Build it".to_string(),
            total_steps: 3,
            steps: vec![
                StepRecord {
                    number: 1,
                    kind: StepKind::RunCommand,
                    description: "Run tests".to_string(),
                    attempts: 3,
                    disposition: StepDisposition::Completed(StepExecutionResult::succeeded(
                        StepEffect::Declined,
                        "declined",
                    )),
                },
                StepRecord {
                    number: 2,
                    kind: StepKind::CreateFile,
                    description: "Write file".to_string(),
                    attempts: 1,
                    disposition: StepDisposition::Cancelled,
                },
            ],
            change_set: change_set(vec![entry("a.txt", "+a\n")]),
            affected_paths: BTreeSet::new(),
            failure: None,
        };

        let output = report.to_string();
        assert!(output.contains("■ Cancelled"));
        assert!(output.contains("**Steps completed**: 1 of 3"));
        assert!(output.contains("1. **run_command** Run tests: ✓ skipped by user (3 attempts)"));
        assert!(output.contains("2. **create_file** Write file: ■ cancelled"));
        assert!(output.contains("**Change set**: 7"));
    }

    #[test]
    fn test_plan_display() {
        let plan = ExecutionPlan {
            description: "Check".to_string(),
            steps: vec![PlanStep::RunCommand(RunCommandStep {
                description: "Run the suite".to_string(),
                command: "make test".to_string(),
            })],
        };
        assert_eq!(
            plan.to_string(),
            "# Check\n\n1. **run_command** Run the suite (`make test`)\n"
        );
    }
}
