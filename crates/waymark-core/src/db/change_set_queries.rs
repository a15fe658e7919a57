//! Change set inserts and queries.

use std::path::PathBuf;

use jiff::Timestamp;
use rusqlite::{params, OptionalExtension, Row};

use super::utils::{parse_text, parse_timestamp};
use crate::{
    error::{DatabaseResultExt, Result, WaymarkError},
    models::{ChangeLogEntry, ChangeType, CompletedPlanChangeSet, RunOutcome},
};

const INSERT_CHANGE_SET_SQL: &str =
    "INSERT INTO change_sets (plan_description, outcome, root, completed_at) VALUES (?1, ?2, ?3, ?4)";
const INSERT_CHANGE_SQL: &str = "INSERT INTO changes (change_set_id, position, file_path, change_type, summary, diff_content, timestamp, original_content, new_content) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
const SELECT_CHANGE_SET_SQL: &str = "SELECT id, plan_description, outcome, root, completed_at, reverted_at FROM change_sets WHERE id = ?1";
const LIST_CHANGE_SETS_SQL: &str = "SELECT id, plan_description, outcome, root, completed_at, reverted_at FROM change_sets ORDER BY id DESC LIMIT ?1";
const SELECT_CHANGES_SQL: &str = "SELECT file_path, change_type, summary, diff_content, timestamp, original_content, new_content FROM changes WHERE change_set_id = ?1 ORDER BY position";
const MARK_REVERTED_SQL: &str = "UPDATE change_sets SET reverted_at = ?1 WHERE id = ?2";

fn change_set_from_row(row: &Row<'_>) -> rusqlite::Result<CompletedPlanChangeSet> {
    let outcome: String = row.get(2)?;
    let root: Option<String> = row.get(3)?;
    let reverted_at = row
        .get::<_, Option<String>>(5)?
        .map(|value| parse_timestamp(5, value))
        .transpose()?;

    Ok(CompletedPlanChangeSet {
        id: row.get::<_, i64>(0)? as u64,
        plan_description: row.get(1)?,
        outcome: parse_text::<RunOutcome>(2, &outcome)?,
        completed_at: parse_timestamp(4, row.get(4)?)?,
        root: root.map(PathBuf::from),
        changes: Vec::new(),
        reverted_at,
    })
}

fn change_from_row(row: &Row<'_>) -> rusqlite::Result<ChangeLogEntry> {
    let change_type: String = row.get(1)?;
    Ok(ChangeLogEntry {
        file_path: row.get(0)?,
        change_type: parse_text::<ChangeType>(1, &change_type)?,
        summary: row.get(2)?,
        diff_content: row.get(3)?,
        timestamp: parse_timestamp(4, row.get(4)?)?,
        original_content: row.get(5)?,
        new_content: row.get(6)?,
    })
}

impl super::Database {
    /// Inserts a completed change set with all its entries and returns the
    /// assigned id.
    pub fn insert_change_set(&mut self, set: &CompletedPlanChangeSet) -> Result<u64> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let root = set
            .root
            .as_ref()
            .map(|root| root.to_string_lossy().into_owned());
        tx.execute(
            INSERT_CHANGE_SET_SQL,
            params![
                set.plan_description,
                set.outcome.as_str(),
                root,
                set.completed_at.to_string()
            ],
        )
        .db_context("Failed to insert change set")?;
        let id = tx.last_insert_rowid();

        {
            let mut stmt = tx
                .prepare(INSERT_CHANGE_SQL)
                .db_context("Failed to prepare change insert")?;
            for (position, change) in set.changes.iter().enumerate() {
                stmt.execute(params![
                    id,
                    position as i64,
                    change.file_path,
                    change.change_type.as_str(),
                    change.summary,
                    change.diff_content,
                    change.timestamp.to_string(),
                    change.original_content,
                    change.new_content,
                ])
                .db_context("Failed to insert change")?;
            }
        }

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(id as u64)
    }

    /// Retrieves a change set with its entries.
    pub fn get_change_set(&self, id: u64) -> Result<Option<CompletedPlanChangeSet>> {
        let set = self
            .connection
            .query_row(SELECT_CHANGE_SET_SQL, params![id as i64], change_set_from_row)
            .optional()
            .db_context("Failed to query change set")?;

        match set {
            Some(mut set) => {
                set.changes = self.load_changes(set.id)?;
                Ok(Some(set))
            }
            None => Ok(None),
        }
    }

    /// Lists the most recent change sets, newest first.
    pub fn list_change_sets(&self, limit: usize) -> Result<Vec<CompletedPlanChangeSet>> {
        let mut stmt = self
            .connection
            .prepare(LIST_CHANGE_SETS_SQL)
            .db_context("Failed to prepare query")?;

        let mut sets = stmt
            .query_map(params![limit as i64], change_set_from_row)
            .db_context("Failed to query change sets")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch change sets")?;

        for set in &mut sets {
            set.changes = self.load_changes(set.id)?;
        }
        Ok(sets)
    }

    /// Stamps a change set as reverted.
    pub fn mark_reverted(&self, id: u64, at: Timestamp) -> Result<()> {
        let updated = self
            .connection
            .execute(MARK_REVERTED_SQL, params![at.to_string(), id as i64])
            .db_context("Failed to mark change set reverted")?;
        if updated == 0 {
            return Err(WaymarkError::ChangeSetNotFound { id });
        }
        Ok(())
    }

    fn load_changes(&self, change_set_id: u64) -> Result<Vec<ChangeLogEntry>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_CHANGES_SQL)
            .db_context("Failed to prepare query")?;

        let changes = stmt
            .query_map(params![change_set_id as i64], change_from_row)
            .db_context("Failed to query changes")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch changes")?;
        Ok(changes)
    }
}
