//! Persisted history of completed change sets.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::task;

use super::Database;
use crate::{
    error::{Result, WaymarkError},
    models::CompletedPlanChangeSet,
};

/// Durable store the engine flushes each run's change log into.
#[async_trait]
pub trait ChangeHistory: Send + Sync {
    /// Persists a completed change set and returns its id.
    async fn record(&self, set: &CompletedPlanChangeSet) -> Result<u64>;

    /// Most recent change sets first.
    async fn list(&self, limit: usize) -> Result<Vec<CompletedPlanChangeSet>>;

    async fn get(&self, id: u64) -> Result<Option<CompletedPlanChangeSet>>;

    async fn mark_reverted(&self, id: u64, at: Timestamp) -> Result<()>;
}

/// [`ChangeHistory`] backed by a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteChangeHistory {
    db_path: PathBuf,
}

impl SqliteChangeHistory {
    /// Opens the history at `path`, or at the XDG default
    /// (`$XDG_DATA_HOME/waymark/history.db`) when `None`.
    ///
    /// # Errors
    ///
    /// Returns `WaymarkError::XdgDirectory` if the default location cannot
    /// be determined, `WaymarkError::FileSystem` if its directory cannot be
    /// created and `WaymarkError::Database` if initialization fails.
    pub async fn open<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let db_path = match path {
            Some(path) => path.as_ref().to_path_buf(),
            None => Self::default_database_path()?,
        };

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WaymarkError::FileSystem {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let db_path_clone = db_path.clone();
        task::spawn_blocking(move || {
            let _db = Database::new(&db_path_clone)?;
            Ok::<(), WaymarkError>(())
        })
        .await
        .map_err(join_error)??;

        Ok(Self { db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Returns the default database path following the XDG Base Directory
    /// specification.
    pub fn default_database_path() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix("waymark")
            .place_data_file("history.db")
            .map_err(|e| WaymarkError::XdgDirectory(e.to_string()))
    }
}

fn join_error(e: task::JoinError) -> WaymarkError {
    WaymarkError::Configuration {
        message: format!("Task join error: {e}"),
    }
}

#[async_trait]
impl ChangeHistory for SqliteChangeHistory {
    async fn record(&self, set: &CompletedPlanChangeSet) -> Result<u64> {
        let db_path = self.db_path.clone();
        let set = set.clone();

        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            db.insert_change_set(&set)
        })
        .await
        .map_err(join_error)?
    }

    async fn list(&self, limit: usize) -> Result<Vec<CompletedPlanChangeSet>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let db = Database::new(&db_path)?;
            db.list_change_sets(limit)
        })
        .await
        .map_err(join_error)?
    }

    async fn get(&self, id: u64) -> Result<Option<CompletedPlanChangeSet>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let db = Database::new(&db_path)?;
            db.get_change_set(id)
        })
        .await
        .map_err(join_error)?
    }

    async fn mark_reverted(&self, id: u64, at: Timestamp) -> Result<()> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let db = Database::new(&db_path)?;
            db.mark_reverted(id, at)
        })
        .await
        .map_err(join_error)?
    }
}

/// In-process [`ChangeHistory`] for tests and embedding hosts that keep
/// history elsewhere.
#[derive(Debug, Default)]
pub struct MemoryChangeHistory {
    sets: Mutex<Vec<CompletedPlanChangeSet>>,
}

impl MemoryChangeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, oldest first.
    pub fn snapshot(&self) -> Vec<CompletedPlanChangeSet> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CompletedPlanChangeSet>> {
        match self.sets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ChangeHistory for MemoryChangeHistory {
    async fn record(&self, set: &CompletedPlanChangeSet) -> Result<u64> {
        let mut sets = self.lock();
        let id = sets.len() as u64 + 1;
        let mut stored = set.clone();
        stored.id = id;
        sets.push(stored);
        Ok(id)
    }

    async fn list(&self, limit: usize) -> Result<Vec<CompletedPlanChangeSet>> {
        Ok(self.lock().iter().rev().take(limit).cloned().collect())
    }

    async fn get(&self, id: u64) -> Result<Option<CompletedPlanChangeSet>> {
        Ok(self.lock().iter().find(|set| set.id == id).cloned())
    }

    async fn mark_reverted(&self, id: u64, at: Timestamp) -> Result<()> {
        let mut sets = self.lock();
        let set = sets
            .iter_mut()
            .find(|set| set.id == id)
            .ok_or(WaymarkError::ChangeSetNotFound { id })?;
        set.reverted_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::models::RunOutcome;

    fn empty_set(description: &str) -> CompletedPlanChangeSet {
        CompletedPlanChangeSet {
            id: 0,
            plan_description: description.to_string(),
            outcome: RunOutcome::Failed,
            completed_at: Timestamp::now(),
            root: None,
            changes: Vec::new(),
            reverted_at: None,
        }
    }

    #[tokio::test]
    async fn test_sqlite_history_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let history = SqliteChangeHistory::open(Some(temp_dir.path().join("nested/history.db")))
            .await
            .expect("Failed to open history");

        let id = history.record(&empty_set("first")).await.unwrap();
        let stored = history.get(id).await.unwrap().expect("Set should exist");
        assert_eq!(stored.plan_description, "first");
        assert_eq!(stored.outcome, RunOutcome::Failed);

        history.mark_reverted(id, Timestamp::now()).await.unwrap();
        let listed = history.list(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].reverted_at.is_some());
    }

    #[tokio::test]
    async fn test_memory_history_assigns_ids() {
        let history = MemoryChangeHistory::new();
        let first = history.record(&empty_set("a")).await.unwrap();
        let second = history.record(&empty_set("b")).await.unwrap();

        assert_eq!((first, second), (1, 2));
        let newest: Vec<_> = history
            .list(1)
            .await
            .unwrap()
            .into_iter()
            .map(|set| set.plan_description)
            .collect();
        assert_eq!(newest, vec!["b"]);
        assert!(matches!(
            history.mark_reverted(9, Timestamp::now()).await,
            Err(WaymarkError::ChangeSetNotFound { id: 9 })
        ));
    }
}
