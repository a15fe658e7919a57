//! SQLite persistence for completed change sets.
//!
//! [`Database`] wraps a single rusqlite connection and is used from blocking
//! contexts only. [`SqliteChangeHistory`] is the async facade the engine
//! talks to: every call opens the database inside
//! `tokio::task::spawn_blocking`.

use std::path::Path;

use rusqlite::Connection;

use crate::error::{DatabaseResultExt, Result};

pub mod change_set_queries;
pub mod history;
pub mod migrations;
pub mod utils;

pub use history::{ChangeHistory, MemoryChangeHistory, SqliteChangeHistory};

/// Database connection and operations handler.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Opens (or creates) the database and brings the schema up to date.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).db_context("Failed to open database connection")?;

        let db = Self { connection };
        db.initialize_schema()?;
        Ok(db)
    }
}
