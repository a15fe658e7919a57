//! Data models for plans, step results and change records.
//!
//! This module contains the domain types the engine consumes and produces.
//! Display implementations live in [`crate::display`] to keep presentation
//! separate from the data.
//!
//! # Model Overview
//!
//! - [`ExecutionPlan`] / [`PlanStep`]: the validated, ordered input of a run,
//!   parsed from the JSON wire format via [`ExecutionPlan::from_json`]
//! - [`StepExecutionResult`]: one per attempt, carrying the [`ErrorClass`] of
//!   a failure or the [`StepEffect`] of a success
//! - [`ChangeLogEntry`] / [`CompletedPlanChangeSet`]: the append-only audit
//!   trail of a run and its durable, flushed form
//! - [`RunOutcome`] / [`RunReport`]: the terminal result handed to the host
//!
//! # Examples
//!
//! ```rust
//! use waymark_core::models::{ExecutionPlan, PlanStep, StepKind};
//!
//! let plan = ExecutionPlan::from_json(
//!     r#"{
//!         "planDescription": "Scaffold a module",
//!         "steps": [
//!             { "step": 1, "action": "create_directory",
//!               "description": "Create the module directory", "path": "src/x" },
//!             { "step": 2, "action": "create_file",
//!               "description": "Add a file", "path": "src/x/a.txt", "content": "hello" }
//!         ]
//!     }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(plan.len(), 2);
//! assert_eq!(plan.steps[1].kind(), StepKind::CreateFile);
//! assert!(matches!(plan.steps[0], PlanStep::CreateDirectory(_)));
//! ```

pub mod change;
pub mod outcome;
pub mod plan;
pub mod result;


pub use change::{ChangeLogEntry, ChangeType, CompletedPlanChangeSet};
pub use outcome::{RunOutcome, RunReport, StepDisposition, StepRecord};
pub use plan::{
    CreateDirectoryStep, CreateFileStep, ExecutionPlan, FileSource, ModifyFileStep, PlanStep,
    RunCommandStep, StepKind, validate_relative_path,
};
pub use result::{ErrorClass, StepEffect, StepExecutionResult};
