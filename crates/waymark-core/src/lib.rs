//! Core library for the Waymark workflow engine.
//!
//! Waymark executes an [`ExecutionPlan`], an ordered list of typed workspace
//! mutations (create a directory, create or modify a file, run a shell
//! command), against a project directory. Failed steps are classified and
//! either retried automatically or escalated to the user, every successful
//! mutation lands in an append-only change log, and each finished run is
//! flushed into a durable history that can later be reverted.
//!
//! # Architecture
//!
//! - **Engine** ([`engine`]): sequential plan execution and run lifecycle
//! - **Step handlers** ([`handlers`]): one idempotent handler per step kind
//! - **Retry and escalation** ([`retry`], [`classify`]): transient failures
//!   back off and retry, everything else asks the user
//! - **Cancellation** ([`cancel`]): one scope per run combining every
//!   cancellation source
//! - **Generation** ([`generation`]): streaming text generation with API key
//!   rotation and a bounded task pool
//! - **History** ([`change_log`], [`db`]): in-run change log and SQLite
//!   change set storage
//! - **Display** ([`display`]): Markdown formatting of reports and history
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use waymark_core::{
//!     CancellationScope, EngineBuilder, EngineConfig, ExecutionPlan, SqliteChangeHistory,
//! };
//! # use waymark_core::interaction::Interaction;
//! # async fn example(interaction: Arc<dyn Interaction>) -> waymark_core::Result<()> {
//! let config = EngineConfig::load_default()?;
//! let history = SqliteChangeHistory::open(None::<&str>).await?;
//!
//! let engine = EngineBuilder::new(".")
//!     .with_config(config)
//!     .with_history(Arc::new(history))
//!     .with_interaction(interaction)
//!     .build()?;
//!
//! let plan = ExecutionPlan::from_json(r#"{
//!     "planDescription": "Add a readme",
//!     "steps": [{ "step": 1, "action": "create_file", "description": "Readme",
//!                 "path": "README.md", "content": "hello" }]
//! }"#)?;
//!
//! let report = engine.execute(&plan, &CancellationScope::detached()).await;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod change_log;
pub mod classify;
pub mod config;
pub mod db;
pub mod display;
pub mod engine;
pub mod error;
pub mod generation;
pub mod handlers;
pub mod interaction;
pub mod models;
pub mod retry;
pub mod text;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use cancel::CancellationScope;
pub use change_log::{revert_change_set, ChangeLog, RevertReport};
pub use config::EngineConfig;
pub use db::{ChangeHistory, MemoryChangeHistory, SqliteChangeHistory};
pub use display::{ChangeSetSummaries, LocalDateTime, OperationStatus};
pub use engine::{EngineBuilder, WorkflowEngine};
pub use error::{Result, WaymarkError};
pub use interaction::{CommandConsent, ExecutionObserver, FailureDecision, Interaction};
pub use models::{CompletedPlanChangeSet, ExecutionPlan, PlanStep, RunOutcome, RunReport};
