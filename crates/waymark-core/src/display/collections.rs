//! Display wrappers for collections of domain models.

use std::fmt;

use super::LocalDateTime;
use crate::models::CompletedPlanChangeSet;

/// Newtype wrapper for a history listing, newest first.
///
/// Shows one line per change set with its id, outcome and change count;
/// use the set's own `Display` for the full diff view.
pub struct ChangeSetSummaries(pub Vec<CompletedPlanChangeSet>);

impl fmt::Display for ChangeSetSummaries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No change sets recorded.");
        }

        writeln!(f, "# Change History")?;
        writeln!(f)?;
        for set in &self.0 {
            let reverted = if set.reverted_at.is_some() {
                " (reverted)"
            } else {
                ""
            };
            writeln!(
                f,
                "- **{}**: {} {} ({} change{}) {}{reverted}",
                set.id,
                set.outcome.with_icon(),
                set.plan_description,
                set.changes.len(),
                if set.changes.len() == 1 { "" } else { "s" },
                LocalDateTime(&set.completed_at),
            )?;
        }
        Ok(())
    }
}
