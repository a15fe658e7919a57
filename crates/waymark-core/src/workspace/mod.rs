//! Workspace collaborators: storage, command execution and diffing.
//!
//! The engine never touches the file system or spawns processes directly.
//! It goes through these narrow traits, each with a local default
//! implementation, so hosts can substitute editor buffers, remote
//! workspaces or test doubles.
//!
//! - [`WorkspaceStorage`] / [`LocalWorkspace`]: directory creation and file
//!   read/write/stat, with "not found" distinguished from other I/O errors
//! - [`CommandRunner`] / [`ShellCommandRunner`]: cancellable process spawning
//! - [`DiffService`] / [`LineDiff`]: before/after summaries and unified diffs

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

pub mod command;
pub mod diff;

pub use command::{CommandOutput, CommandRunner, ShellCommandRunner};
pub use diff::{DiffService, DiffSummary, LineDiff, TextEdit};

/// Storage failures, with "not found" kept distinct from everything else.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{}' is not valid UTF-8 text", path.display())]
    NotText { path: PathBuf },
    #[error("Edit range {start}..{end} is out of bounds for '{}'", path.display())]
    InvalidEdit {
        path: PathBuf,
        start: usize,
        end: usize,
    },
}

impl StorageError {
    fn from_io(path: &Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::InvalidData => StorageError::NotText {
                path: path.to_path_buf(),
            },
            _ => StorageError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Metadata returned by [`WorkspaceStorage::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub len: u64,
}

/// File system access as provided by the workspace host.
#[async_trait]
pub trait WorkspaceStorage: Send + Sync {
    /// Creates a directory and all missing parents. Existing directories are
    /// not an error.
    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError>;

    async fn read_to_string(&self, path: &Path) -> Result<String, StorageError>;

    /// Writes the full content, creating or truncating the file.
    async fn write(&self, path: &Path, content: &str) -> Result<(), StorageError>;

    async fn stat(&self, path: &Path) -> Result<FileStat, StorageError>;

    async fn remove_file(&self, path: &Path) -> Result<(), StorageError>;

    /// Replaces a byte range of a file's content.
    ///
    /// Hosts backed by editor buffers override this to keep cursor and undo
    /// state; the default reads, splices and writes back.
    async fn apply_edit(&self, path: &Path, edit: &TextEdit) -> Result<(), StorageError> {
        let mut content = self.read_to_string(path).await?;
        if edit.end > content.len()
            || edit.start > edit.end
            || !content.is_char_boundary(edit.start)
            || !content.is_char_boundary(edit.end)
        {
            return Err(StorageError::InvalidEdit {
                path: path.to_path_buf(),
                start: edit.start,
                end: edit.end,
            });
        }
        content.replace_range(edit.start..edit.end, &edit.replacement);
        self.write(path, &content).await
    }
}

/// [`WorkspaceStorage`] over the local file system via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalWorkspace;

#[async_trait]
impl WorkspaceStorage for LocalWorkspace {
    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, StorageError> {
        fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    async fn write(&self, path: &Path, content: &str) -> Result<(), StorageError> {
        fs::write(path, content)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, StorageError> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))?;
        Ok(FileStat {
            is_dir: metadata.is_dir(),
            len: metadata.len(),
        })
    }

    async fn remove_file(&self, path: &Path) -> Result<(), StorageError> {
        fs::remove_file(path)
            .await
            .map_err(|e| StorageError::from_io(path, e))
    }
}
